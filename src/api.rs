//! Authenticated requests to the Chec API.
//!
//! Every call carries the stored secret key. Failures are never retried;
//! callers decide how to present them.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;

/// The API version this client speaks.
const API_VERSION: &str = "2021-06-02";

/// The API host used when no `--domain` override is given.
pub const DEFAULT_DOMAIN: &str = "chec.io";

/// Shown for a 403 instead of the bare status code.
pub const AUTH_ERROR: &str = "Authentication error, try logging out and back in again.";

/// A successful response.
#[derive(Debug, Clone, Default)]
pub struct ApiResponse {
    pub body: String,
    #[allow(dead_code)]
    pub headers: HashMap<String, String>,
}

/// Errors that can occur while talking to the API.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("request failed with status {status}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),
}

impl RequestError {
    /// The HTTP status the server answered with, if it answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Json(_) => None,
        }
    }

    /// One-line message for the user.
    ///
    /// A 403 always becomes [`AUTH_ERROR`]. Anything else goes through `render`
    /// with the status code, or the error text when there is no status.
    pub fn describe(&self, render: impl FnOnce(&str) -> String) -> String {
        match self.status_code() {
            Some(403) => AUTH_ERROR.to_string(),
            Some(status) => render(&status.to_string()),
            None => render(&self.to_string()),
        }
    }
}

/// Issues requests against the API.
#[async_trait]
pub trait Requester: Send + Sync {
    /// Send `payload` to `path` on `api.{domain}`.
    ///
    /// GET payloads are encoded as query parameters, anything else as a JSON body.
    async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        domain: &str,
    ) -> Result<ApiResponse, RequestError>;
}

/// [`Requester`] backed by reqwest.
pub struct ApiClient {
    http: reqwest::Client,
    api_key: Option<String>,
}

impl ApiClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("chec/cli"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Chec-Version", HeaderValue::from_static(API_VERSION));
        if let Some(key) = &self.api_key
            && let Ok(value) = HeaderValue::from_str(key)
        {
            headers.insert("x-authorization", value);
        }
        headers
    }
}

#[async_trait]
impl Requester for ApiClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Option<&Value>,
        domain: &str,
    ) -> Result<ApiResponse, RequestError> {
        let url = format!("http://api.{domain}{path}");
        tracing::debug!(%method, %url, "sending request");

        let mut request = self.http.request(method.clone(), &url).headers(self.headers());
        if let Some(payload) = payload {
            request = if method == Method::GET {
                request.query(&query_pairs(payload))
            } else {
                request.json(payload)
            };
        }

        let response = request.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), %url, "request failed");
            return Err(RequestError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ApiResponse { body, headers })
    }
}

/// Flatten a JSON object into query parameters.
///
/// Arrays use the bracket form (`ids[]=a&ids[]=b`) and nulls are dropped.
fn query_pairs(payload: &Value) -> Vec<(String, String)> {
    let Value::Object(map) = payload else {
        return Vec::new();
    };

    let mut pairs = Vec::new();
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let name = format!("{key}[]");
                pairs.extend(items.iter().filter_map(scalar).map(|v| (name.clone(), v)));
            }
            other => {
                if let Some(v) = scalar(other) {
                    pairs.push((key.clone(), v));
                }
            }
        }
    }
    pairs
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn query_pairs_encode_scalars_and_arrays() {
        let pairs = query_pairs(&json!({
            "limit": 5,
            "sandbox": false,
            "ids": ["a", "b"],
            "skip": null,
        }));

        assert_eq!(
            pairs,
            vec![
                ("limit".to_string(), "5".to_string()),
                ("sandbox".to_string(), "false".to_string()),
                ("ids[]".to_string(), "a".to_string()),
                ("ids[]".to_string(), "b".to_string()),
            ]
        );
    }

    #[test]
    fn query_pairs_ignore_non_objects() {
        assert!(query_pairs(&json!([1, 2])).is_empty());
    }

    #[test]
    fn forbidden_is_described_as_auth_error() {
        let err = RequestError::Status {
            status: 403,
            body: String::new(),
        };
        assert_eq!(err.describe(|s| format!("failed ({s})")), AUTH_ERROR);
    }

    #[test]
    fn other_statuses_keep_their_code() {
        let err = RequestError::Status {
            status: 500,
            body: String::new(),
        };
        assert_eq!(err.status_code(), Some(500));
        assert_eq!(err.describe(|s| format!("failed ({s})")), "failed (500)");
    }

    #[test]
    fn sends_key_and_version_headers() {
        let client = ApiClient::new(Some("sk_test_123".into()));
        let headers = client.headers();

        assert_eq!(headers["x-authorization"], "sk_test_123");
        assert_eq!(headers["chec-version"], API_VERSION);
        assert_eq!(headers[USER_AGENT], "chec/cli");
    }
}
