//! Remote roster service: resolve scanned codes, save attendance.
//!
//! The service is a black box reached through `AttendanceEndpoint`. Resolve
//! answers structured JSON; save may answer JSON or plain text, and both
//! shapes are accepted.

use anyhow::Result;
use serde::Deserialize;
use serde_json::Value;

use crate::confirmation::ComplianceState;

pub mod http;
pub mod scripted;

pub use http::HttpEndpoint;
pub use scripted::{EndpointCall, ScriptedEndpoint};

/// Plain-text save bodies containing this phrase count as success.
pub const SAVE_SUCCESS_MARKER: &str = "Attendance recorded";

/// Body of a `action=parse` response.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvePayload {
    #[serde(default)]
    pub success: bool,
    pub multiple_names: Option<bool>,
    pub names: Option<Vec<String>>,
    pub single_name: Option<bool>,
    pub name: Option<String>,
    pub error: Option<String>,
}

/// Structured body of a `action=save` response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveResponse {
    pub success: bool,
    pub message: Option<String>,
}

/// What the operator confirmed, ready to persist.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttendanceRecord {
    pub identity: String,
    pub compliance: ComplianceState,
}

pub trait AttendanceEndpoint {
    /// Look up the identities encoded by a scanned code.
    fn resolve(&self, raw_text: &str) -> Result<ResolvePayload>;

    /// Persist a record. Returns the raw response body.
    fn save(&self, record: &AttendanceRecord) -> Result<String>;
}

/// Interpret a save body. Any valid JSON is structured and succeeds only with
/// `"success": true`; unparseable text is judged by `SAVE_SUCCESS_MARKER`.
pub fn interpret_save_body(body: &str) -> SaveResponse {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => SaveResponse {
            success: value.get("success") == Some(&Value::Bool(true)),
            message: value
                .get("message")
                .and_then(Value::as_str)
                .or_else(|| value.as_str())
                .map(str::to_string),
        },
        Err(_) => SaveResponse {
            success: body.contains(SAVE_SUCCESS_MARKER),
            message: Some(body.trim().to_string()).filter(|text| !text.is_empty()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structured_save_bodies() {
        let ok = interpret_save_body(r#"{"success":true,"message":"saved row 14"}"#);
        assert!(ok.success);
        assert_eq!(ok.message.as_deref(), Some("saved row 14"));

        let rejected = interpret_save_body(r#"{"success":false,"message":"sheet locked"}"#);
        assert!(!rejected.success);

        let rejected = interpret_save_body(r#"{"success":"true"}"#);
        assert!(!rejected.success);
    }

    #[test]
    fn json_string_body_is_structured_not_plain_text() {
        let response = interpret_save_body(r#""Save failed: Attendance recorded already""#);
        assert!(!response.success);
        assert_eq!(
            response.message.as_deref(),
            Some("Save failed: Attendance recorded already")
        );
        assert!(!interpret_save_body("42").success);
    }

    #[test]
    fn plain_text_save_bodies() {
        assert!(interpret_save_body("Attendance recorded OK").success);
        assert!(!interpret_save_body("Script error: quota exceeded").success);
        assert!(!interpret_save_body("").success);
    }

    #[test]
    fn resolve_payload_tolerates_nulls_and_missing_fields() {
        let payload: ResolvePayload = serde_json::from_str(
            r#"{"success":true,"multipleNames":true,"names":["Alice","Bob"],"name":null}"#,
        )
        .unwrap();
        assert_eq!(payload.multiple_names, Some(true));
        assert_eq!(payload.names.unwrap(), vec!["Alice", "Bob"]);

        let payload: ResolvePayload = serde_json::from_str(r#"{"error":"bad code"}"#).unwrap();
        assert!(!payload.success);
        assert_eq!(payload.error.as_deref(), Some("bad code"));
    }
}
