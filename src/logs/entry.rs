//! A single API request log as reported by Chec.
//!
//! Entries arrive as summaries (from the feed or the history endpoint) and are
//! upgraded to the full record, with request and response bodies, on demand.

use colored::Colorize;
use jiff::Timestamp;
use jiff::tz::TimeZone;
use reqwest::Method;
use serde_json::Value;

use crate::api::{RequestError, Requester};

use super::pretty;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The record has no usable `id`.
#[derive(Debug, thiserror::Error)]
#[error("log entry must be given a raw entry that at least contains the `id`")]
pub struct InvalidEntry;

/// How a status code is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// 2xx
    Success,
    /// 3xx
    Redirect,
    /// Everything else, including a missing code.
    Error,
}

impl StatusClass {
    pub fn of(status: Option<u64>) -> Self {
        match status {
            Some(200..=299) => Self::Success,
            Some(300..=399) => Self::Redirect,
            _ => Self::Error,
        }
    }
}

/// One log record plus the bookkeeping the session needs.
#[derive(Debug, Clone)]
pub struct LogEntry {
    id: String,
    raw: Value,
    domain: String,
    full: bool,
    printed: bool,
}

impl LogEntry {
    /// Wrap a raw record. `domain` is the API host to fetch details from.
    ///
    /// The record counts as full when it already carries a `response`.
    pub fn new(raw: Value, domain: impl Into<String>) -> Result<Self, InvalidEntry> {
        let id = raw.get("id").and_then(id_text).ok_or(InvalidEntry)?;
        let full = raw.get("response").is_some();

        Ok(Self {
            id,
            raw,
            domain: domain.into(),
            full,
            printed: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_full(&self) -> bool {
        self.full
    }

    pub fn is_printed(&self) -> bool {
        self.printed
    }

    pub fn set_printed(&mut self, printed: bool) {
        self.printed = printed;
    }

    /// The record as currently known: a summary until the full log is fetched.
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn status_code(&self) -> Option<u64> {
        self.raw.get("status_code").and_then(Value::as_u64)
    }

    pub fn url(&self) -> &str {
        self.raw.get("url").and_then(Value::as_str).unwrap_or_default()
    }

    /// Seconds since the epoch.
    pub fn created(&self) -> Option<i64> {
        self.raw.get("created").and_then(Value::as_i64)
    }

    /// The full record, fetching it once if only the summary is known.
    pub async fn full_log(&mut self, requester: &dyn Requester) -> Result<&Value, RequestError> {
        if !self.full {
            let path = format!("/v1/developer/logs/{}", self.id);
            let response = requester
                .request(Method::GET, &path, None, &self.domain)
                .await?;
            self.raw = serde_json::from_str(&response.body)?;
            self.full = true;
            tracing::debug!(id = %self.id, "fetched full log");
        }
        Ok(&self.raw)
    }

    /// Colourised pretty JSON of the full record.
    pub async fn formatted_log(&mut self, requester: &dyn Requester) -> Result<String, RequestError> {
        Ok(pretty::colorize(self.full_log(requester).await?))
    }

    /// `created` as `yyyy-MM-dd HH:mm:ss`, in UTC or the local zone.
    pub fn formatted_date(&self, utc: bool) -> String {
        let Some(ts) = self.created().and_then(|s| Timestamp::from_second(s).ok()) else {
            return "unknown date".to_string();
        };

        if utc {
            ts.strftime(DATE_FORMAT).to_string()
        } else {
            ts.to_zoned(TimeZone::system())
                .strftime(DATE_FORMAT)
                .to_string()
        }
    }

    /// One line: `[date] status id url`, with the status coloured by class.
    pub fn formatted_summary(&self, utc: bool) -> String {
        let date = format!("[{}]", self.formatted_date(utc)).dimmed();
        let code = self
            .status_code()
            .map_or_else(|| "---".to_string(), |c| c.to_string());
        let badge = format!(" {} ", code.black());
        let badge = match StatusClass::of(self.status_code()) {
            StatusClass::Success => badge.on_green(),
            StatusClass::Redirect => badge.on_yellow(),
            StatusClass::Error => badge.on_red(),
        };

        format!("{date} {badge} {} {}", self.id.yellow(), self.url())
    }
}

/// Ids arrive as strings or numbers. Empty strings, zero and anything else are rejected.
fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_i64() != Some(0) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::json;

    use crate::api::ApiResponse;

    /// One recorded call to [`StubRequester`].
    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct Call {
        pub method: Method,
        pub path: String,
        pub payload: Option<Value>,
        pub domain: String,
    }

    /// Answers every request with the next queued result and records the call.
    #[derive(Default)]
    pub(crate) struct StubRequester {
        pub calls: Mutex<Vec<Call>>,
        responses: Mutex<Vec<Result<String, u16>>>,
    }

    impl StubRequester {
        pub fn responding(responses: Vec<Result<String, u16>>) -> Self {
            Self {
                calls: Mutex::default(),
                responses: Mutex::new(responses),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Requester for StubRequester {
        async fn request(
            &self,
            method: Method,
            path: &str,
            payload: Option<&Value>,
            domain: &str,
        ) -> Result<ApiResponse, RequestError> {
            self.calls.lock().unwrap().push(Call {
                method,
                path: path.to_string(),
                payload: payload.cloned(),
                domain: domain.to_string(),
            });
            let mut responses = self.responses.lock().unwrap();
            assert!(!responses.is_empty(), "unexpected request to {path}");
            match responses.remove(0) {
                Ok(body) => Ok(ApiResponse {
                    body,
                    ..ApiResponse::default()
                }),
                Err(status) => Err(RequestError::Status {
                    status,
                    body: String::new(),
                }),
            }
        }
    }

    pub(crate) fn sample_partial_log() -> Value {
        json!({
            "id": "log_123",
            "status_code": 201,
            "url": "/v1/fake/endpoint",
            "created": 1_572_304_602,
        })
    }

    pub(crate) fn sample_full_log() -> Value {
        let mut log = sample_partial_log();
        log["response"] = json!({"content": "test response"});
        log
    }

    #[test]
    fn requires_an_id() {
        assert!(LogEntry::new(json!({}), "chec.io").is_err());
        assert!(LogEntry::new(json!({"id": ""}), "chec.io").is_err());
        assert!(LogEntry::new(json!({"id": null}), "chec.io").is_err());
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let entry = LogEntry::new(json!({"id": 123}), "chec.io").unwrap();
        assert_eq!(entry.id(), "123");
    }

    #[test]
    fn full_when_response_is_present() {
        assert!(!LogEntry::new(sample_partial_log(), "chec.io").unwrap().is_full());
        assert!(LogEntry::new(sample_full_log(), "chec.io").unwrap().is_full());
    }

    #[test]
    fn printed_flag_toggles() {
        let mut entry = LogEntry::new(sample_partial_log(), "chec.io").unwrap();
        assert!(!entry.is_printed());
        entry.set_printed(true);
        assert!(entry.is_printed());
        entry.set_printed(false);
        assert!(!entry.is_printed());
    }

    #[tokio::test]
    async fn full_log_skips_request_when_already_full() {
        let requester = StubRequester::default();
        let mut entry = LogEntry::new(sample_full_log(), "chec.io").unwrap();

        assert_eq!(entry.full_log(&requester).await.unwrap(), &sample_full_log());
        assert!(requester.calls().is_empty());
    }

    #[tokio::test]
    async fn full_log_fetches_once() {
        let body = sample_full_log().to_string();
        let requester = StubRequester::responding(vec![Ok(body)]);
        let mut entry = LogEntry::new(sample_partial_log(), "chec.io").unwrap();

        assert_eq!(entry.full_log(&requester).await.unwrap(), &sample_full_log());
        assert!(entry.is_full());
        entry.full_log(&requester).await.unwrap();

        assert_eq!(
            requester.calls(),
            vec![Call {
                method: Method::GET,
                path: "/v1/developer/logs/log_123".into(),
                payload: None,
                domain: "chec.io".into(),
            }]
        );
    }

    #[tokio::test]
    async fn full_log_failure_keeps_status() {
        let requester = StubRequester::responding(vec![Err(404)]);
        let mut entry = LogEntry::new(sample_partial_log(), "example.test").unwrap();

        let err = entry.full_log(&requester).await.unwrap_err();

        assert_eq!(err.status_code(), Some(404));
        assert!(!entry.is_full());
        assert_eq!(requester.calls()[0].domain, "example.test");
    }

    #[tokio::test]
    async fn formatted_log_is_pretty_json() {
        colored::control::set_override(false);
        let requester = StubRequester::default();
        let mut entry = LogEntry::new(sample_full_log(), "chec.io").unwrap();

        let formatted = entry.formatted_log(&requester).await.unwrap();

        assert_eq!(formatted, serde_json::to_string_pretty(&sample_full_log()).unwrap());
    }

    #[test]
    fn utc_date_has_no_offset() {
        let entry = LogEntry::new(sample_partial_log(), "chec.io").unwrap();
        assert_eq!(entry.formatted_date(true), "2019-10-28 23:16:42");
    }

    #[test]
    fn local_date_uses_same_layout() {
        let entry = LogEntry::new(sample_partial_log(), "chec.io").unwrap();
        let local = entry.formatted_date(false);
        assert_eq!(local.len(), "2019-10-28 23:16:42".len());
        assert_eq!(&local[4..5], "-");
    }

    #[test]
    fn summary_contains_date_status_id_and_url() {
        colored::control::set_override(false);
        let entry = LogEntry::new(sample_partial_log(), "chec.io").unwrap();

        assert_eq!(
            entry.formatted_summary(true),
            "[2019-10-28 23:16:42]  201  log_123 /v1/fake/endpoint"
        );
    }

    #[test]
    fn status_classes() {
        assert_eq!(StatusClass::of(Some(204)), StatusClass::Success);
        assert_eq!(StatusClass::of(Some(301)), StatusClass::Redirect);
        assert_eq!(StatusClass::of(Some(404)), StatusClass::Error);
        assert_eq!(StatusClass::of(Some(500)), StatusClass::Error);
        assert_eq!(StatusClass::of(Some(100)), StatusClass::Error);
        assert_eq!(StatusClass::of(None), StatusClass::Error);
    }
}
