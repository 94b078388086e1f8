//! Two-step operator confirmation: identity, then uniform compliance.
//!
//! Both steps are single-select and auto-advance after a short delay. The
//! delay itself is owned by the caller: a selection returns a `FlowTimer`,
//! and the caller hands it back through `on_timer` once it is due. Timers are
//! tagged with the flow epoch, so a timer that outlived a reselection or a
//! dismissal is ignored.

use anyhow::{anyhow, Result};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Delay between picking a name and showing the compliance step.
pub const IDENTITY_ADVANCE_DELAY: Duration = Duration::from_millis(500);
/// Delay between picking a compliance state and submitting.
pub const COMPLIANCE_SUBMIT_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComplianceState {
    Full,
    Partial,
    Absent,
}

impl ComplianceState {
    pub const ALL: [ComplianceState; 3] = [
        ComplianceState::Full,
        ComplianceState::Partial,
        ComplianceState::Absent,
    ];

    /// Value sent as `uniformCompliance`.
    pub fn as_wire(self) -> &'static str {
        match self {
            ComplianceState::Full => "Full Uniform",
            ComplianceState::Partial => "Partial Uniform",
            ComplianceState::Absent => "No Uniform",
        }
    }
}

impl fmt::Display for ComplianceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for ComplianceState {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "full" | "full uniform" => Ok(ComplianceState::Full),
            "partial" | "partial uniform" => Ok(ComplianceState::Partial),
            "none" | "absent" | "no uniform" => Ok(ComplianceState::Absent),
            other => Err(anyhow!(
                "unknown compliance state '{}'; expected full, partial or none",
                other
            )),
        }
    }
}

/// In-progress selections.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConfirmationState {
    pub identity: Option<String>,
    pub compliance: Option<ComplianceState>,
}

impl ConfirmationState {
    pub fn is_complete(&self) -> bool {
        self.identity.is_some() && self.compliance.is_some()
    }
}

/// Which selection step is on screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FlowStep {
    Closed,
    Identity {
        candidates: Vec<String>,
        highlighted: Option<usize>,
    },
    Compliance {
        identity: String,
        highlighted: Option<ComplianceState>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlowTimer {
    AdvanceToCompliance { epoch: u64 },
    Submit { epoch: u64 },
}

impl FlowTimer {
    pub fn delay(self) -> Duration {
        match self {
            FlowTimer::AdvanceToCompliance { .. } => IDENTITY_ADVANCE_DELAY,
            FlowTimer::Submit { .. } => COMPLIANCE_SUBMIT_DELAY,
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The timer belongs to a superseded selection or a closed flow.
    Stale,
    Advanced,
    /// Completed selections, moved out for submission.
    Submit(ConfirmationState),
}

#[derive(Debug)]
pub struct ConfirmationFlow {
    step: FlowStep,
    state: ConfirmationState,
    epoch: u64,
}

impl ConfirmationFlow {
    pub fn new() -> Self {
        Self {
            step: FlowStep::Closed,
            state: ConfirmationState::default(),
            epoch: 0,
        }
    }

    /// Open the identity step over `candidates`.
    pub fn begin_ambiguous(&mut self, candidates: Vec<String>) -> Result<()> {
        if candidates.is_empty() {
            return Err(anyhow!("identity step needs at least one candidate"));
        }
        self.epoch += 1;
        self.state = ConfirmationState::default();
        self.step = FlowStep::Identity {
            candidates,
            highlighted: None,
        };
        Ok(())
    }

    /// Skip the identity step: go straight to compliance for `identity`.
    pub fn begin_single(&mut self, identity: String) {
        self.epoch += 1;
        self.state = ConfirmationState {
            identity: Some(identity.clone()),
            compliance: None,
        };
        self.step = FlowStep::Compliance {
            identity,
            highlighted: None,
        };
    }

    /// Highlight candidate `index` and arm the advance timer.
    pub fn select_candidate(&mut self, index: usize) -> Result<FlowTimer> {
        let FlowStep::Identity {
            candidates,
            highlighted,
        } = &mut self.step
        else {
            return Err(anyhow!("no name selection is open"));
        };
        let name = candidates
            .get(index)
            .cloned()
            .ok_or_else(|| anyhow!("no candidate at position {}", index + 1))?;
        *highlighted = Some(index);
        self.state.identity = Some(name);
        self.epoch += 1;
        Ok(FlowTimer::AdvanceToCompliance { epoch: self.epoch })
    }

    /// Highlight `compliance` and arm the submit timer.
    pub fn select_compliance(&mut self, compliance: ComplianceState) -> Result<FlowTimer> {
        let FlowStep::Compliance { highlighted, .. } = &mut self.step else {
            return Err(anyhow!("no compliance selection is open"));
        };
        *highlighted = Some(compliance);
        self.state.compliance = Some(compliance);
        self.epoch += 1;
        Ok(FlowTimer::Submit { epoch: self.epoch })
    }

    pub fn on_timer(&mut self, timer: FlowTimer) -> FlowOutcome {
        match timer {
            FlowTimer::AdvanceToCompliance { epoch } if epoch == self.epoch => {
                let Some(identity) = self.state.identity.clone() else {
                    return FlowOutcome::Stale;
                };
                self.epoch += 1;
                self.state.compliance = None;
                self.step = FlowStep::Compliance {
                    identity,
                    highlighted: None,
                };
                FlowOutcome::Advanced
            }
            FlowTimer::Submit { epoch } if epoch == self.epoch => {
                FlowOutcome::Submit(std::mem::take(&mut self.state))
            }
            _ => FlowOutcome::Stale,
        }
    }

    /// Put selections back after a failed submission so the operator can retry.
    pub fn restore(&mut self, state: ConfirmationState) {
        if let FlowStep::Compliance { .. } = self.step {
            self.state = state;
        }
    }

    /// Close any open step and discard selections. Returns whether a step was
    /// open.
    pub fn dismiss(&mut self) -> bool {
        let was_open = self.is_open();
        self.reset();
        was_open
    }

    pub fn reset(&mut self) {
        self.epoch += 1;
        self.state = ConfirmationState::default();
        self.step = FlowStep::Closed;
    }

    pub fn is_open(&self) -> bool {
        self.step != FlowStep::Closed
    }

    pub fn step(&self) -> &FlowStep {
        &self.step
    }

    pub fn state(&self) -> &ConfirmationState {
        &self.state
    }
}

impl Default for ConfirmationFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn ambiguous_flow_picks_name_then_compliance() {
        let mut flow = ConfirmationFlow::new();
        flow.begin_ambiguous(names(&["Alice", "Bob"])).unwrap();

        let timer = flow.select_candidate(1).unwrap();
        assert_eq!(timer.delay(), IDENTITY_ADVANCE_DELAY);
        assert_eq!(
            flow.step(),
            &FlowStep::Identity {
                candidates: names(&["Alice", "Bob"]),
                highlighted: Some(1)
            }
        );
        assert_eq!(flow.on_timer(timer), FlowOutcome::Advanced);
        assert_eq!(
            flow.step(),
            &FlowStep::Compliance {
                identity: "Bob".into(),
                highlighted: None
            }
        );

        let timer = flow.select_compliance(ComplianceState::Full).unwrap();
        assert_eq!(timer.delay(), COMPLIANCE_SUBMIT_DELAY);
        assert_eq!(
            flow.on_timer(timer),
            FlowOutcome::Submit(ConfirmationState {
                identity: Some("Bob".into()),
                compliance: Some(ComplianceState::Full),
            })
        );
    }

    #[test]
    fn reselecting_supersedes_the_pending_advance() {
        let mut flow = ConfirmationFlow::new();
        flow.begin_ambiguous(names(&["Alice", "Bob", "Carol"])).unwrap();
        let first = flow.select_candidate(0).unwrap();
        let second = flow.select_candidate(2).unwrap();

        assert_eq!(flow.on_timer(first), FlowOutcome::Stale);
        assert_eq!(flow.on_timer(second), FlowOutcome::Advanced);
        assert_eq!(flow.state().identity.as_deref(), Some("Carol"));
    }

    #[test]
    fn dismissal_discards_state_and_pending_timers() {
        let mut flow = ConfirmationFlow::new();
        flow.begin_single("Alice".into());
        let timer = flow.select_compliance(ComplianceState::Partial).unwrap();

        assert!(flow.dismiss());
        assert_eq!(flow.on_timer(timer), FlowOutcome::Stale);
        assert_eq!(flow.state(), &ConfirmationState::default());
        assert!(!flow.dismiss());
    }

    #[test]
    fn selections_outside_their_step_fail() {
        let mut flow = ConfirmationFlow::new();
        assert!(flow.select_candidate(0).is_err());
        assert!(flow.select_compliance(ComplianceState::Full).is_err());

        flow.begin_ambiguous(names(&["Alice"])).unwrap();
        assert!(flow.select_candidate(3).is_err());
        assert!(flow.select_compliance(ComplianceState::Full).is_err());
        assert!(flow.begin_ambiguous(Vec::new()).is_err());
    }

    #[test]
    fn restore_keeps_selection_for_retry() {
        let mut flow = ConfirmationFlow::new();
        flow.begin_single("Alice".into());
        let timer = flow.select_compliance(ComplianceState::Absent).unwrap();
        let FlowOutcome::Submit(state) = flow.on_timer(timer) else {
            panic!("expected submit");
        };
        assert_eq!(flow.state(), &ConfirmationState::default());

        flow.restore(state.clone());
        assert_eq!(flow.state(), &state);
        assert!(flow.state().is_complete());
    }

    #[test]
    fn parses_compliance_words() {
        assert_eq!("full".parse::<ComplianceState>().unwrap(), ComplianceState::Full);
        assert_eq!("No Uniform".parse::<ComplianceState>().unwrap(), ComplianceState::Absent);
        assert!("maybe".parse::<ComplianceState>().is_err());
    }
}
