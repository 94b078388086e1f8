//! In-memory roster endpoint with queued answers.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use super::{AttendanceEndpoint, AttendanceRecord, ResolvePayload};
use crate::error::CaptureError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EndpointCall {
    Resolve(String),
    Save(AttendanceRecord),
}

#[derive(Default)]
struct Script {
    resolves: VecDeque<Result<ResolvePayload, String>>,
    saves: VecDeque<Result<String, String>>,
    calls: Vec<EndpointCall>,
}

/// Answers queued with `push_*`; an `Err(reason)` entry becomes a transport
/// failure. An empty queue answers with a transport failure as well.
#[derive(Default)]
pub struct ScriptedEndpoint {
    script: Mutex<Script>,
}

impl ScriptedEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a resolve answer given as the JSON the service would send.
    pub fn push_resolve_json(&self, json: &str) -> Result<()> {
        let payload: ResolvePayload = serde_json::from_str(json)?;
        self.script().resolves.push_back(Ok(payload));
        Ok(())
    }

    pub fn push_resolve_failure(&self, reason: &str) {
        self.script().resolves.push_back(Err(reason.to_string()));
    }

    pub fn push_save_body(&self, body: &str) {
        self.script().saves.push_back(Ok(body.to_string()));
    }

    pub fn push_save_failure(&self, reason: &str) {
        self.script().saves.push_back(Err(reason.to_string()));
    }

    pub fn calls(&self) -> Vec<EndpointCall> {
        self.script().calls.clone()
    }

    pub fn resolve_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, EndpointCall::Resolve(_)))
            .count()
    }

    pub fn saves(&self) -> Vec<AttendanceRecord> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                EndpointCall::Save(record) => Some(record),
                EndpointCall::Resolve(_) => None,
            })
            .collect()
    }
}

impl AttendanceEndpoint for ScriptedEndpoint {
    fn resolve(&self, raw_text: &str) -> Result<ResolvePayload> {
        let mut script = self.script();
        script.calls.push(EndpointCall::Resolve(raw_text.to_string()));
        match script.resolves.pop_front() {
            Some(Ok(payload)) => Ok(payload),
            Some(Err(reason)) => Err(anyhow!(CaptureError::TransportError(reason))),
            None => Err(anyhow!(CaptureError::TransportError(
                "no scripted resolve answer".to_string()
            ))),
        }
    }

    fn save(&self, record: &AttendanceRecord) -> Result<String> {
        let mut script = self.script();
        script.calls.push(EndpointCall::Save(record.clone()));
        match script.saves.pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(reason)) => Err(anyhow!(CaptureError::TransportError(reason))),
            None => Err(anyhow!(CaptureError::TransportError(
                "no scripted save answer".to_string()
            ))),
        }
    }
}
