use serde::{Deserialize, Serialize};

/// Outcome of one logical assertion. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub test_name: String,
    pub success: bool,
    pub message: String,

    /// Response excerpt, kept only for failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    #[serde(default)]
    pub duration_ms: Option<u64>,
}

impl CheckResult {
    pub fn passed(test_name: &str, message: impl Into<String>) -> Self {
        Self {
            test_name: test_name.to_string(),
            success: true,
            message: message.into(),
            response: None,
            duration_ms: None,
        }
    }

    pub fn failed(test_name: &str, message: impl Into<String>) -> Self {
        Self {
            test_name: test_name.to_string(),
            success: false,
            message: message.into(),
            response: None,
            duration_ms: None,
        }
    }

    pub fn with_response(mut self, snapshot: Option<String>) -> Self {
        self.response = snapshot;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}

/// Pass/fail tally and ordered results for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResults {
    pub name: String,
    pub passed: u32,
    pub failed: u32,
    pub results: Vec<CheckResult>,
}

impl CategoryResults {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            passed: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &CheckResult> {
        self.results.iter().filter(|r| !r.success)
    }

    /// `test_series` -> `TEST SERIES`
    pub fn display_name(&self) -> String {
        self.name.replace(['_', '-'], " ").to_uppercase()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub session_id: String,
    pub total_categories: u32,
    pub total_checks: u32,
    pub passed: u32,
    pub failed: u32,
    pub total_duration_ms: Option<u64>,
}

impl RunSummary {
    /// No partial credit: any failed check fails the run
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_checks == 0 {
            0.0
        } else {
            self.passed as f64 / self.total_checks as f64 * 100.0
        }
    }
}

/// Everything a finished run produced, as written to `results.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub session_id: String,
    pub base_url: String,
    pub categories: Vec<CategoryResults>,
    pub summary: RunSummary,
    pub generated_at: String,
}
