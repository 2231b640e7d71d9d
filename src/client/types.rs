use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// Longest response excerpt kept in a failure snapshot
const SNAPSHOT_LIMIT: usize = 500;

/// HTTP methods the service under test is exercised with
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        }
    }

    pub(crate) fn as_reqwest(&self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single call against the service, path relative to the base URL
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub body: Option<Value>,
    pub token: Option<String>,
    pub multipart: Option<MultipartPayload>,
}

impl ApiRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            token: None,
            multipart: None,
        }
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn bearer(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn multipart(mut self, payload: MultipartPayload) -> Self {
        self.multipart = Some(payload);
        self
    }
}

/// Form fields and files sent as multipart/form-data
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<FileUpload>,
}

#[derive(Debug, Clone)]
pub struct FileUpload {
    pub field: String,
    pub filename: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Response envelope: status plus the parsed body.
///
/// `body` is `Value::Null` when the payload is empty or not JSON; the raw text is
/// always kept so failures can show what the service actually sent.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
    pub text: String,
    pub elapsed_ms: u64,
}

impl ApiResponse {
    pub fn from_text(status: u16, text: String, elapsed_ms: u64) -> Self {
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };
        Self {
            status,
            body,
            text,
            elapsed_ms,
        }
    }

    pub fn with_json(status: u16, body: Value) -> Self {
        Self {
            status,
            text: body.to_string(),
            body,
            elapsed_ms: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Field of the parsed body, see [`lookup`]
    pub fn field(&self, path: &str) -> Option<&Value> {
        lookup(&self.body, path)
    }

    /// `error` message of a JSON error payload, if any
    pub fn error_message(&self) -> Option<&str> {
        self.field("error").and_then(Value::as_str)
    }

    /// Short, bounded excerpt used in failure reports
    pub fn snapshot(&self) -> String {
        let excerpt: String = self.text.chars().take(SNAPSHOT_LIMIT).collect();
        if self.text.chars().count() > SNAPSHOT_LIMIT {
            format!("HTTP {}: {}...", self.status, excerpt)
        } else {
            format!("HTTP {}: {}", self.status, excerpt)
        }
    }
}

/// Resolve a dot path (`user.userId`, `detailedResults.0.isCorrect`) or a JSON
/// pointer (`/user/userId`). An empty path, `$` or `.` selects the whole value.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() || path == "$" || path == "." {
        return Some(value);
    }
    let pointer = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path.replace('.', "/"))
    };
    value.pointer(&pointer)
}

/// Transport-level failure: the call never produced an HTTP status.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    #[error("invalid request {method} {path}: {message}")]
    InvalidRequest {
        method: HttpMethod,
        path: String,
        message: String,
    },

    #[error("{method} {path} timed out after {timeout_secs}s")]
    Timeout {
        method: HttpMethod,
        path: String,
        timeout_secs: u64,
    },

    #[error("{method} {path} failed: {message}")]
    Transport {
        method: HttpMethod,
        path: String,
        message: String,
    },
}
