//! Decoded text → candidate identities.

use std::sync::Arc;

use crate::error::capture_error;
use crate::remote::{AttendanceEndpoint, ResolvePayload};

/// Shown when the service rejects a code without saying why.
pub const DEFAULT_REJECTION: &str = "Invalid QR code";
/// Shown when the service could not be reached or answered garbage.
pub const TRANSPORT_REJECTION: &str = "Scanning error";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionResult {
    Single(String),
    /// Never empty.
    Ambiguous(Vec<String>),
    Rejected(String),
}

/// Classify a resolve payload.
///
/// A success payload that names nobody is treated as a rejection rather than
/// leaving the operator with an empty choice.
pub fn classify(payload: ResolvePayload) -> ResolutionResult {
    if !payload.success {
        let reason = payload
            .error
            .filter(|error| !error.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_REJECTION.to_string());
        return ResolutionResult::Rejected(reason);
    }
    if payload.multiple_names == Some(true) {
        let names: Vec<String> = payload.names.unwrap_or_default();
        if !names.is_empty() {
            return ResolutionResult::Ambiguous(names);
        }
    } else if payload.single_name == Some(true) {
        if let Some(name) = payload.name.filter(|name| !name.is_empty()) {
            return ResolutionResult::Single(name);
        }
    }
    ResolutionResult::Rejected(DEFAULT_REJECTION.to_string())
}

/// Resolves scanned codes against the roster service. Failures are never
/// retried here; the controller re-presents the scanner instead.
pub struct ResolutionPipeline {
    endpoint: Arc<dyn AttendanceEndpoint>,
}

impl ResolutionPipeline {
    pub fn new(endpoint: Arc<dyn AttendanceEndpoint>) -> Self {
        Self { endpoint }
    }

    pub fn resolve(&self, raw_text: &str) -> ResolutionResult {
        match self.endpoint.resolve(raw_text) {
            Ok(payload) => classify(payload),
            Err(err) => {
                log::warn!(
                    "resolve failed ({:?}): {:#}",
                    capture_error(&err),
                    err
                );
                ResolutionResult::Rejected(TRANSPORT_REJECTION.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ScriptedEndpoint;

    fn payload(json: &str) -> ResolvePayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn single_name_resolves_directly() {
        assert_eq!(
            classify(payload(r#"{"success":true,"singleName":true,"name":"Alice"}"#)),
            ResolutionResult::Single("Alice".into())
        );
    }

    #[test]
    fn multiple_names_are_ambiguous() {
        assert_eq!(
            classify(payload(
                r#"{"success":true,"multipleNames":true,"names":["Alice","Bob"]}"#
            )),
            ResolutionResult::Ambiguous(vec!["Alice".into(), "Bob".into()])
        );
    }

    #[test]
    fn failure_uses_server_message_or_default() {
        assert_eq!(
            classify(payload(r#"{"success":false,"error":"bad code"}"#)),
            ResolutionResult::Rejected("bad code".into())
        );
        assert_eq!(
            classify(payload(r#"{"success":false}"#)),
            ResolutionResult::Rejected(DEFAULT_REJECTION.into())
        );
    }

    #[test]
    fn success_without_names_is_rejected() {
        assert_eq!(
            classify(payload(r#"{"success":true,"multipleNames":true,"names":[]}"#)),
            ResolutionResult::Rejected(DEFAULT_REJECTION.into())
        );
        assert_eq!(
            classify(payload(r#"{"success":true}"#)),
            ResolutionResult::Rejected(DEFAULT_REJECTION.into())
        );
    }

    #[test]
    fn transport_failure_is_a_scanning_error() {
        let endpoint = Arc::new(ScriptedEndpoint::new());
        endpoint.push_resolve_failure("connection reset");
        let pipeline = ResolutionPipeline::new(endpoint.clone());
        assert_eq!(
            pipeline.resolve("EMP-7"),
            ResolutionResult::Rejected(TRANSPORT_REJECTION.into())
        );
        assert_eq!(endpoint.resolve_count(), 1);
    }
}
