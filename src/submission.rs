//! Guarded attendance submission.
//!
//! One process-wide debounce timestamp: an accepted submission for one
//! identity also blocks a different identity for the rest of the window.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::confirmation::ConfirmationState;
use crate::error::{capture_error, CaptureError};
use crate::remote::{interpret_save_body, AttendanceEndpoint, AttendanceRecord};

/// Minimum spacing between accepted submissions.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(2000);

/// A submission that did not record anything. The selections come back so
/// the caller decides whether to keep them.
#[derive(Debug)]
pub struct SubmissionRejected {
    pub state: ConfirmationState,
    pub error: CaptureError,
}

impl fmt::Display for SubmissionRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for SubmissionRejected {}

pub struct SubmissionGuard {
    endpoint: Arc<dyn AttendanceEndpoint>,
    debounce: Duration,
    last_attempt: Option<Instant>,
}

impl SubmissionGuard {
    pub fn new(endpoint: Arc<dyn AttendanceEndpoint>) -> Self {
        Self {
            endpoint,
            debounce: DEBOUNCE_WINDOW,
            last_attempt: None,
        }
    }

    /// Submit completed selections at time `now`.
    ///
    /// Returns `DuplicateSuppressed` without touching the network when inside
    /// the debounce window or when either selection is missing. Saves are
    /// single-flight through `&mut self`: the call blocks until the response.
    pub fn submit(
        &mut self,
        state: ConfirmationState,
        now: Instant,
    ) -> Result<AttendanceRecord, SubmissionRejected> {
        if self.within_window(now) {
            log::debug!("submission suppressed inside debounce window");
            return Err(SubmissionRejected {
                state,
                error: CaptureError::DuplicateSuppressed,
            });
        }
        let (Some(identity), Some(compliance)) = (state.identity.clone(), state.compliance) else {
            log::debug!("submission suppressed: selections incomplete");
            return Err(SubmissionRejected {
                state,
                error: CaptureError::DuplicateSuppressed,
            });
        };

        self.last_attempt = Some(now);
        let record = AttendanceRecord {
            identity,
            compliance,
        };
        let result = self.endpoint.save(&record);

        let body = match result {
            Ok(body) => body,
            Err(err) => {
                let error = capture_error(&err)
                    .cloned()
                    .unwrap_or_else(|| CaptureError::TransportError(format!("{:#}", err)));
                return Err(SubmissionRejected { state, error });
            }
        };
        let response = interpret_save_body(&body);
        if response.success {
            log::info!(
                "attendance recorded: {} ({})",
                record.identity,
                record.compliance
            );
            Ok(record)
        } else {
            let reason = response
                .message
                .unwrap_or_else(|| "Save rejected by server".to_string());
            Err(SubmissionRejected {
                state,
                error: CaptureError::SaveRejected(reason),
            })
        }
    }

    fn within_window(&self, now: Instant) -> bool {
        self.last_attempt
            .is_some_and(|last| now.saturating_duration_since(last) < self.debounce)
    }

    pub fn last_attempt(&self) -> Option<Instant> {
        self.last_attempt
    }
}
