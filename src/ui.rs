//! Terminal presentation: progress stages, notifications, and a text
//! rendering of the capture state.
//!
//! Nothing here holds state of its own; `ViewState` is a snapshot taken from
//! the controller and rendered as-is.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

use crate::confirmation::ComplianceState;
use crate::notify::{Notifier, Severity};

/// Blocking service round-trips that get a loading indicator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    ResolvingCode,
    SavingAttendance,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::ResolvingCode => "Resolving scanned code",
            Stage::SavingAttendance => "Saving attendance",
        }
    }
}

/// Requested presentation; `auto` picks a spinner only for interactive use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    fn parse(flag: Option<&str>) -> Self {
        match flag.map(str::trim) {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            Some("auto") | None => UiMode::Auto,
            Some(other) => {
                log::warn!("unknown ui mode '{}', using auto", other);
                UiMode::Auto
            }
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Indicator {
    Spinner,
    Lines,
}

#[derive(Clone, Debug)]
pub struct Ui {
    indicator: Indicator,
}

impl Ui {
    /// `piped` is true when stdout is redirected; the spinner would then
    /// interleave with captured output.
    pub fn new(mode: UiMode, stderr_is_tty: bool, piped: bool) -> Self {
        let spinner = stderr_is_tty
            && match mode {
                UiMode::Pretty => true,
                UiMode::Auto => !piped,
                UiMode::Plain => false,
            };
        Self {
            indicator: if spinner {
                Indicator::Spinner
            } else {
                Indicator::Lines
            },
        }
    }

    pub fn from_args(ui_flag: Option<&str>, stderr_is_tty: bool, piped: bool) -> Self {
        Self::new(UiMode::parse(ui_flag), stderr_is_tty, piped)
    }

    /// Shows `stage` until the returned guard is dropped.
    pub fn stage(&self, stage: Stage) -> StageGuard {
        let spinner = match self.indicator {
            Indicator::Spinner => Some(stage_spinner(stage)),
            Indicator::Lines => {
                eprintln!("... {}", stage.label());
                None
            }
        };
        StageGuard {
            stage,
            started: Instant::now(),
            spinner,
        }
    }
}

fn stage_spinner(stage: Stage) -> ProgressBar {
    let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(stage.label());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

pub struct StageGuard {
    stage: Stage,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl StageGuard {
    pub fn stage(&self) -> Stage {
        self.stage
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let took = format_duration(self.started.elapsed());
        log::debug!("{} finished in {}", self.stage.label(), took);
        match self.spinner.take() {
            Some(spinner) => spinner.finish_and_clear(),
            None => eprintln!("... {} done ({})", self.stage.label(), took),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Prints notifications to stderr with a severity icon.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalNotifier;

impl Notifier for TerminalNotifier {
    fn notify(&self, message: &str, severity: Severity, _duration: Duration) {
        eprintln!("{} {}", severity.icon(), message);
    }
}

/// Open confirmation step, if any.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModalView {
    Closed,
    Names {
        candidates: Vec<String>,
        highlighted: Option<usize>,
    },
    Compliance {
        identity: String,
        options: Vec<ComplianceState>,
        highlighted: Option<ComplianceState>,
    },
}

/// Everything the presentation layer needs to draw the capture screen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ViewState {
    pub scanning: bool,
    pub placeholder: Option<&'static str>,
    pub camera_label: Option<String>,
    /// Whether the switch-camera control is enabled.
    pub can_switch: bool,
    pub last_scan: Option<String>,
    pub modal: ModalView,
}

pub fn render_view(view: &ViewState) -> String {
    let mut out = String::new();
    match (&view.camera_label, view.placeholder) {
        (Some(label), _) if view.scanning => {
            let _ = writeln!(out, "[scanning] {}", label);
        }
        (_, Some(placeholder)) => {
            let _ = writeln!(out, "[idle] {}", placeholder);
        }
        _ => {
            let _ = writeln!(out, "[idle]");
        }
    }
    if view.can_switch {
        let _ = writeln!(out, "  (switch camera available)");
    }
    match &view.modal {
        ModalView::Closed => {}
        ModalView::Names {
            candidates,
            highlighted,
        } => {
            let _ = writeln!(out, "Select your name:");
            for (index, name) in candidates.iter().enumerate() {
                let marker = if *highlighted == Some(index) { '*' } else { ' ' };
                let _ = writeln!(out, " {} {}. {}", marker, index + 1, name);
            }
        }
        ModalView::Compliance {
            identity,
            options,
            highlighted,
        } => {
            let _ = writeln!(out, "Uniform check for {}:", identity);
            for option in options {
                let marker = if *highlighted == Some(*option) { '*' } else { ' ' };
                let _ = writeln!(out, " {} {}", marker, option);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_name_selection_with_highlight() {
        let view = ViewState {
            scanning: false,
            placeholder: Some("Ready to scan"),
            camera_label: None,
            can_switch: true,
            last_scan: Some("EMP-1".into()),
            modal: ModalView::Names {
                candidates: vec!["Alice".into(), "Bob".into()],
                highlighted: Some(1),
            },
        };
        let text = render_view(&view);
        assert!(text.starts_with("[idle] Ready to scan"));
        assert!(text.contains("   1. Alice"));
        assert!(text.contains(" * 2. Bob"));
    }

    #[test]
    fn renders_active_camera() {
        let view = ViewState {
            scanning: true,
            placeholder: None,
            camera_label: Some("Back Camera".into()),
            can_switch: false,
            last_scan: None,
            modal: ModalView::Closed,
        };
        assert_eq!(render_view(&view), "[scanning] Back Camera\n");
    }

    #[test]
    fn stages_carry_their_labels() {
        assert_eq!(Stage::ResolvingCode.label(), "Resolving scanned code");
        assert_eq!(Stage::SavingAttendance.label(), "Saving attendance");
    }

    #[test]
    fn spinner_only_for_interactive_stderr() {
        assert_eq!(Ui::from_args(None, true, false).indicator, Indicator::Spinner);
        assert_eq!(Ui::from_args(None, true, true).indicator, Indicator::Lines);
        assert_eq!(Ui::from_args(Some("pretty"), true, true).indicator, Indicator::Spinner);
        assert_eq!(Ui::from_args(Some("pretty"), false, false).indicator, Indicator::Lines);
        assert_eq!(Ui::from_args(Some("plain"), true, false).indicator, Indicator::Lines);
        assert_eq!(Ui::from_args(Some("fancy"), true, false).indicator, Indicator::Spinner);
    }

    #[test]
    fn line_stage_guard_keeps_its_stage_until_dropped() {
        let ui = Ui::new(UiMode::Plain, false, true);
        let guard = ui.stage(Stage::SavingAttendance);
        assert_eq!(guard.stage(), Stage::SavingAttendance);
        assert!(guard.spinner.is_none());
        drop(guard);
    }

    #[test]
    fn formats_stage_durations() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
