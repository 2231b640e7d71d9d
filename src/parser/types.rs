use crate::client::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A parsed scenario table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suite {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    /// Actor names referenced by any step, in first-use order
    pub fn referenced_actors(&self) -> Vec<String> {
        let mut actors: Vec<String> = Vec::new();
        for step in self.scenarios.iter().flat_map(|s| s.steps.iter()) {
            if let Some(actor) = &step.actor {
                if !actors.contains(actor) {
                    actors.push(actor.clone());
                }
            }
        }
        actors
    }
}

/// One feature behavior under test: an ordered list of calls plus checks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub name: String,

    /// Reporter category the scenario's checks are counted under
    pub category: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Scenario-local variables, templated before the first step runs
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// Saved variables handed off to later scenarios
    #[serde(default)]
    pub exports: Vec<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

/// A single call and the check recorded for it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,

    pub method: HttpMethod,

    /// Relative endpoint, templated (`test-series/${seriesId}`)
    pub path: String,

    /// Actor whose token is attached; anonymous when absent
    #[serde(default)]
    pub actor: Option<String>,

    #[serde(default)]
    pub body: Option<Value>,

    #[serde(default)]
    pub multipart: Option<MultipartSpec>,

    pub expect: Expectation,

    /// variable name -> response field path
    #[serde(default)]
    pub save: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    pub status: StatusExpectation,

    #[serde(default)]
    pub fields: Vec<FieldCheck>,
}

/// `status: 200` or `status: [200, 201]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum StatusExpectation {
    One(u16),
    AnyOf(Vec<u16>),
}

impl StatusExpectation {
    pub fn accepts(&self, status: u16) -> bool {
        match self {
            StatusExpectation::One(s) => *s == status,
            StatusExpectation::AnyOf(list) => list.contains(&status),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, StatusExpectation::AnyOf(list) if list.is_empty())
    }
}

impl std::fmt::Display for StatusExpectation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusExpectation::One(s) => write!(f, "{}", s),
            StatusExpectation::AnyOf(list) => {
                let joined: Vec<String> = list.iter().map(|s| s.to_string()).collect();
                write!(f, "{}", joined.join("/"))
            }
        }
    }
}

/// Rules applied to one field of the response body. Several rules may be set at once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCheck {
    pub path: String,

    #[serde(default)]
    pub exists: Option<bool>,

    #[serde(default)]
    pub equals: Option<Value>,

    #[serde(default)]
    pub not_equals: Option<Value>,

    /// Case-insensitive substring of a string field
    #[serde(default)]
    pub contains_text: Option<String>,

    /// Regular expression a string field must match
    #[serde(default)]
    pub matches: Option<String>,

    #[serde(default)]
    pub is_array: Option<bool>,

    #[serde(default)]
    pub len: Option<usize>,

    #[serde(default)]
    pub min_len: Option<usize>,

    #[serde(default)]
    pub contains_item: Option<ItemMatch>,

    #[serde(default)]
    pub lacks_item: Option<ItemMatch>,
}

impl FieldCheck {
    pub fn has_rule(&self) -> bool {
        self.exists.is_some()
            || self.equals.is_some()
            || self.not_equals.is_some()
            || self.contains_text.is_some()
            || self.matches.is_some()
            || self.is_array.is_some()
            || self.len.is_some()
            || self.min_len.is_some()
            || self.contains_item.is_some()
            || self.lacks_item.is_some()
    }
}

/// Array element selector: the element whose `key` field equals `value`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMatch {
    pub key: String,
    pub value: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartSpec {
    #[serde(default)]
    pub fields: BTreeMap<String, String>,

    #[serde(default)]
    pub files: Vec<FilePart>,
}

/// File part content is given either as text or as base64-encoded bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilePart {
    pub field: String,
    pub filename: String,

    #[serde(default = "default_content_type")]
    pub content_type: String,

    #[serde(default)]
    pub text: Option<String>,

    #[serde(default)]
    pub base64: Option<String>,
}

fn default_content_type() -> String {
    "application/octet-stream".to_string()
}
