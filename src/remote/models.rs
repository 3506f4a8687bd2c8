// ABOUTME: Wire types for the diagnostic worker's start, stop and status endpoints
// ABOUTME: ServerSnapshot is the worker's list of running targets, authoritative for existence only

use serde::{Deserialize, Serialize};

use crate::config::JobConfig;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest<'a> {
    pub target: &'a str,
    pub port: u16,
    pub max_connections: u32,
    pub thread_count: u32,
    #[serde(rename = "timeout")]
    pub timeout_secs: u32,
}

impl<'a> From<&'a JobConfig> for StartRequest<'a> {
    fn from(config: &'a JobConfig) -> Self {
        Self {
            target: config.target(),
            port: config.port(),
            max_connections: config.max_connections(),
            thread_count: config.thread_count(),
            timeout_secs: config.timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StopRequest<'a> {
    pub target: &'a str,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusResponse {
    #[serde(default)]
    pub active_processes: Option<Vec<String>>,
}

/// Error body returned by the worker on non-2xx responses. `detail` is
/// usually a string but request-validation failures send a structured value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    pub fn message(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

/// Targets the worker currently reports as running, in the worker's order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerSnapshot {
    targets: Vec<String>,
}

impl ServerSnapshot {
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

impl From<StatusResponse> for ServerSnapshot {
    fn from(response: StatusResponse) -> Self {
        Self::new(response.active_processes.unwrap_or_default())
    }
}

impl<S: Into<String>> FromIterator<S> for ServerSnapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobDraft;

    #[test]
    fn test_start_request_field_names() {
        let config = JobDraft::new("example.com").validate().unwrap();
        let body = serde_json::to_value(StartRequest::from(&config)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "target": "example.com",
                "port": 80,
                "maxConnections": 500,
                "threadCount": 10,
                "timeout": 4,
            })
        );
    }

    #[test]
    fn test_status_response_missing_or_null_field_is_empty() {
        let missing: StatusResponse = serde_json::from_str("{}").unwrap();
        assert!(ServerSnapshot::from(missing).is_empty());

        let null: StatusResponse =
            serde_json::from_str(r#"{"active_processes": null}"#).unwrap();
        assert!(ServerSnapshot::from(null).is_empty());
    }

    #[test]
    fn test_error_body_message() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail": "No active process on this target"}"#).unwrap();
        assert_eq!(
            body.message().as_deref(),
            Some("No active process on this target")
        );

        let body: ErrorBody = serde_json::from_str(r#"{"detail": [{"msg": "field required"}]}"#)
            .unwrap();
        assert_eq!(
            body.message().as_deref(),
            Some(r#"[{"msg":"field required"}]"#)
        );

        let body: ErrorBody = serde_json::from_str(r#"{"detail": ""}"#).unwrap();
        assert_eq!(body.message(), None);
    }
}
