//! Request and response DTOs for the verbose recording API, plus published documents.

use crate::CheckEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One named document handed to a [`crate::Publisher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    pub content: String,
}

impl Document {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Start-session request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionRequest {
    /// User requesting the capture; shown in the report metadata.
    pub user: String,
    #[serde(default)]
    pub filter: Option<String>,
    /// Send a notification line to `user` for every matching check.
    #[serde(default)]
    pub notify: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartSessionData {
    pub session_id: String,
}

/// Batch of checks fed into a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRequest {
    pub checks: Vec<CheckEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestData {
    pub accepted: usize,
}

/// Live counters of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session_id: String,
    pub user: String,
    pub filter: String,
    pub started_at: DateTime<Utc>,
    pub seen: u64,
    pub matched: u64,
    pub retained: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadData {
    pub url: String,
    pub seen: u64,
    pub matched: u64,
    pub retained: usize,
}

/// Base response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseResponse<T> {
    #[serde(default = "default_code")]
    pub code: i32,
    pub message: String,
    #[serde(default)]
    pub data: Option<T>,
}

fn default_code() -> i32 {
    200
}

impl<T> BaseResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            code: 200,
            message: "Success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

pub type StartSessionResponse = BaseResponse<StartSessionData>;
pub type IngestResponse = BaseResponse<IngestData>;
pub type SessionStatusResponse = BaseResponse<SessionStatus>;
pub type UploadResponse = BaseResponse<UploadData>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_request_defaults() {
        let req: StartSessionRequest = serde_json::from_str(r#"{"user":"admin"}"#).unwrap();
        assert_eq!(req.user, "admin");
        assert!(req.filter.is_none());
        assert!(!req.notify);
    }

    #[test]
    fn ingest_request_parses_outcomes() {
        let req: IngestRequest = serde_json::from_str(
            r#"{"checks":[{"subject":"u1","permission":"perm.a","outcome":"true"}]}"#,
        )
        .unwrap();
        assert_eq!(req.checks.len(), 1);
        assert_eq!(req.checks[0].outcome, crate::Tristate::True);
    }

    #[test]
    fn error_response_has_no_data() {
        let res: UploadResponse = BaseResponse::error(502, "boom");
        let json = serde_json::to_value(&res).unwrap();
        assert_eq!(json["code"], 502);
        assert!(json["data"].is_null());
    }
}
