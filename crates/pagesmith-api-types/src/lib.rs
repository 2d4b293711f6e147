//! Wire types for the Pagesmith task API.
//!
//! These mirror the JSON accepted by `POST /handle_task`, the responses it returns and the
//! evaluation callback body posted to the caller afterwards. Validation happens in the
//! server's domain layer; this crate only describes shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body accepted by `POST /handle_task`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskPayload {
    pub email: String,
    pub secret: String,
    #[serde(rename = "task", alias = "task_id")]
    pub task_id: String,
    /// Kept wide so out-of-range rounds reach validation instead of failing to parse.
    pub round: i64,
    pub brief: String,
    #[serde(default)]
    pub checks: Vec<String>,
    pub evaluation_url: String,
    #[serde(default)]
    pub attachments: Vec<AttachmentPayload>,
    pub nonce: String,
}

/// An attachment reference plus free-form metadata.
///
/// `{"name": "logo.png", "url": "data:image/png;base64,..."}` deserializes with `url` as the
/// reference and `name` kept in `metadata`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttachmentPayload {
    #[serde(alias = "url")]
    pub reference: String,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

/// Acknowledgement returned once the publish pipeline has finished.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskAcceptedResponse {
    pub status: String,
    pub repo: String,
}

/// Error body shared by every non-success response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Liveness body served at `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusMessage {
    pub message: String,
}

/// Callback body posted to the caller's evaluation URL.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationBody {
    pub email: String,
    pub task: String,
    pub round: u8,
    pub nonce: String,
    pub repo_url: String,
    pub commit_sha: String,
    pub pages_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_accepts_url_alias_and_keeps_metadata() {
        let attachment: AttachmentPayload = serde_json::from_str(
            r#"{"name":"sample.png","url":"data:image/png;base64,AAAA","size":4}"#,
        )
        .expect("attachment parses");

        assert_eq!(attachment.reference, "data:image/png;base64,AAAA");
        assert_eq!(attachment.metadata["name"], "sample.png");
        assert_eq!(attachment.metadata["size"], 4);
        assert!(!attachment.metadata.contains_key("url"));
    }

    #[test]
    fn task_payload_reads_task_field_and_defaults_lists() {
        let payload: TaskPayload = serde_json::from_str(
            r#"{
                "email": "student@example.com",
                "secret": "s3cret",
                "task": "calc-app",
                "round": 3,
                "brief": "Build a calculator",
                "evaluation_url": "https://eval.example.com/notify",
                "nonce": "abcdef123456"
            }"#,
        )
        .expect("payload parses");

        assert_eq!(payload.task_id, "calc-app");
        assert_eq!(payload.round, 3);
        assert!(payload.checks.is_empty());
        assert!(payload.attachments.is_empty());
    }
}
