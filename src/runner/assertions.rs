//! Status and payload checks applied to one response

use crate::client::{lookup, ApiResponse};
use crate::parser::{Expectation, FieldCheck, ItemMatch, StatusExpectation};
use regex::Regex;
use serde_json::Value;

/// Every failed rule of `expect` against `response`. Empty means the step passed.
///
/// Field rules are only looked at once the status matched: an error payload
/// rarely has the success shape and would bury the real cause.
pub fn evaluate(expect: &Expectation, response: &ApiResponse) -> Vec<String> {
    if let Some(failure) = check_status(&expect.status, response) {
        return vec![failure];
    }
    expect
        .fields
        .iter()
        .flat_map(|check| check_field(check, &response.body))
        .collect()
}

pub fn check_status(expect: &StatusExpectation, response: &ApiResponse) -> Option<String> {
    if expect.accepts(response.status) {
        return None;
    }
    Some(match response.error_message() {
        Some(err) => format!("expected status {}, got {} ({})", expect, response.status, err),
        None => format!("expected status {}, got {}", expect, response.status),
    })
}

/// Null counts as absent, so `exists: false` also holds for `"photo": null`
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

pub fn check_field(check: &FieldCheck, body: &Value) -> Vec<String> {
    let path = if check.path.is_empty() { "<body>" } else { check.path.as_str() };
    let actual = present(lookup(body, &check.path));
    let mut failures = Vec::new();

    match (check.exists, actual) {
        (Some(true), None) => failures.push(format!("field '{}' is missing", path)),
        (Some(false), Some(v)) => {
            failures.push(format!("field '{}' should be absent, found {}", path, brief(v)))
        }
        _ => {}
    }

    let needs_value = check.equals.is_some()
        || check.not_equals.is_some()
        || check.contains_text.is_some()
        || check.matches.is_some()
        || check.is_array.is_some()
        || check.len.is_some()
        || check.min_len.is_some()
        || check.contains_item.is_some()
        || check.lacks_item.is_some();

    let actual = match actual {
        Some(v) => v,
        None => {
            if needs_value && check.exists != Some(true) {
                failures.push(format!("field '{}' is missing", path));
            }
            return failures;
        }
    };

    if let Some(expected) = &check.equals {
        if !loosely_equal(actual, expected) {
            failures.push(format!(
                "field '{}': expected {}, got {}",
                path,
                brief(expected),
                brief(actual)
            ));
        }
    }

    if let Some(unexpected) = &check.not_equals {
        if loosely_equal(actual, unexpected) {
            failures.push(format!("field '{}' must not be {}", path, brief(unexpected)));
        }
    }

    if let Some(needle) = &check.contains_text {
        let haystack = as_text(actual).to_lowercase();
        if !haystack.contains(&needle.to_lowercase()) {
            failures.push(format!(
                "field '{}' does not mention '{}': {}",
                path,
                needle,
                brief(actual)
            ));
        }
    }

    if let Some(pattern) = &check.matches {
        match Regex::new(pattern) {
            Ok(re) if re.is_match(&as_text(actual)) => {}
            Ok(_) => failures.push(format!(
                "field '{}' does not match /{}/: {}",
                path,
                pattern,
                brief(actual)
            )),
            Err(e) => failures.push(format!("invalid pattern /{}/: {}", pattern, e)),
        }
    }

    if let Some(want_array) = check.is_array {
        if actual.is_array() != want_array {
            let what = if want_array { "an array" } else { "not an array" };
            failures.push(format!("field '{}' should be {}, got {}", path, what, brief(actual)));
        }
    }

    if check.len.is_some() || check.min_len.is_some() {
        match length(actual) {
            Some(n) => {
                if let Some(expected) = check.len {
                    if n != expected {
                        failures.push(format!(
                            "field '{}': expected length {}, got {}",
                            path, expected, n
                        ));
                    }
                }
                if let Some(min) = check.min_len {
                    if n < min {
                        failures.push(format!(
                            "field '{}': expected at least {} entries, got {}",
                            path, min, n
                        ));
                    }
                }
            }
            None => failures.push(format!("field '{}' has no length: {}", path, brief(actual))),
        }
    }

    if let Some(item) = &check.contains_item {
        match find_item(actual, item) {
            Some(true) => {}
            Some(false) => failures.push(format!(
                "'{}' has no entry with {} = {}",
                path,
                item.key,
                brief(&item.value)
            )),
            None => failures.push(format!("field '{}' is not an array", path)),
        }
    }

    if let Some(item) = &check.lacks_item {
        match find_item(actual, item) {
            Some(false) => {}
            Some(true) => failures.push(format!(
                "'{}' still has an entry with {} = {}",
                path,
                item.key,
                brief(&item.value)
            )),
            None => failures.push(format!("field '{}' is not an array", path)),
        }
    }

    failures
}

/// JSON equality that treats `2` and `2.0` alike and compares a string with a
/// scalar by its text, since services are not always consistent about ids.
pub fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
        (Value::String(a), Value::Number(_) | Value::Bool(_)) => *a == expected.to_string(),
        (Value::Number(_) | Value::Bool(_), Value::String(b)) => actual.to_string() == *b,
        _ => actual == expected,
    }
}

fn find_item(actual: &Value, item: &ItemMatch) -> Option<bool> {
    let items = actual.as_array()?;
    Some(items.iter().any(|entry| {
        lookup(entry, &item.key)
            .map(|v| loosely_equal(v, &item.value))
            .unwrap_or(false)
    }))
}

fn length(value: &Value) -> Option<usize> {
    match value {
        Value::Array(a) => Some(a.len()),
        Value::Object(o) => Some(o.len()),
        Value::String(s) => Some(s.chars().count()),
        _ => None,
    }
}

fn as_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Value rendered for a message, cut short so arrays do not flood the output
fn brief(value: &Value) -> String {
    const LIMIT: usize = 80;
    let text = value.to_string();
    if text.chars().count() > LIMIT {
        let cut: String = text.chars().take(LIMIT).collect();
        format!("{}...", cut)
    } else {
        text
    }
}
