//! HTTP client wrapper
//!
//! One request at a time against the service under test. No retries and no caching:
//! whatever the service does is what gets reported.

pub mod types;

pub use types::*;

use async_trait::async_trait;
use std::time::{Duration, Instant};

/// Anything that can carry an [`ApiRequest`] to the service
#[async_trait]
pub trait ApiTransport: Send + Sync {
    /// Send the request. `Err` means the call never completed; any HTTP status,
    /// including 4xx/5xx, comes back as `Ok`.
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ClientError>;

    /// Base URL requests are resolved against
    fn base_url(&self) -> &str;
}

/// reqwest-backed transport with a fixed per-request timeout
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn transport_error(&self, method: HttpMethod, path: &str, err: reqwest::Error) -> ClientError {
        if err.is_timeout() {
            ClientError::Timeout {
                method,
                path: path.to_string(),
                timeout_secs: self.timeout.as_secs(),
            }
        } else {
            ClientError::Transport {
                method,
                path: path.to_string(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl ApiTransport for HttpClient {
    async fn request(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let method = request.method;
        let url = self.url_for(&request.path);
        let mut req = self.client.request(method.as_reqwest(), &url);

        if let Some(token) = &request.token {
            req = req.bearer_auth(token);
        }

        if let Some(payload) = request.multipart {
            req = req.multipart(build_form(method, &request.path, payload)?);
        } else if let Some(body) = &request.body {
            req = req.json(body);
        }

        log::debug!("-> {} {}", method, url);
        let started = Instant::now();

        let res = req
            .send()
            .await
            .map_err(|e| self.transport_error(method, &request.path, e))?;
        let status = res.status().as_u16();
        let text = res
            .text()
            .await
            .map_err(|e| self.transport_error(method, &request.path, e))?;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        log::debug!("<- {} {} {} ({}ms)", status, method, url, elapsed_ms);
        Ok(ApiResponse::from_text(status, text, elapsed_ms))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

fn build_form(
    method: HttpMethod,
    path: &str,
    payload: MultipartPayload,
) -> Result<reqwest::multipart::Form, ClientError> {
    let mut form = reqwest::multipart::Form::new();
    for (name, value) in payload.fields {
        form = form.text(name, value);
    }
    for file in payload.files {
        let part = reqwest::multipart::Part::bytes(file.bytes)
            .file_name(file.filename)
            .mime_str(&file.content_type)
            .map_err(|e| ClientError::InvalidRequest {
                method,
                path: path.to_string(),
                message: format!("bad content type '{}': {}", file.content_type, e),
            })?;
        form = form.part(file.field, part);
    }
    Ok(form)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_join_ignores_extra_slashes() {
        let client = HttpClient::new("http://localhost:3000/api/", Duration::from_secs(30)).unwrap();
        assert_eq!(
            client.url_for("/test-series?includeUnpublished=true"),
            "http://localhost:3000/api/test-series?includeUnpublished=true"
        );
        assert_eq!(client.base_url(), "http://localhost:3000/api");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        // Port 9 (discard) on loopback is closed on any sane CI box
        let client = HttpClient::new("http://127.0.0.1:9/api", Duration::from_secs(2)).unwrap();
        let err = client
            .request(ApiRequest::new(HttpMethod::Get, "categories"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Transport { .. } | ClientError::Timeout { .. }
        ));
    }
}
