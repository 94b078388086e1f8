//! attendance_scan - operator console for QR attendance capture
//!
//! This console:
//! 1. Loads the scanner config (file + env) and connects to the roster service
//! 2. Enumerates the configured cameras (simulated; codes are typed in)
//! 3. Feeds operator commands into the capture controller
//! 4. Pumps decodes and timers, re-rendering the capture screen on change
//!
//! `scan <text>` stands in for the camera seeing a code. Everything after the
//! decode (resolve, confirmation, debounced save, restarts) is the real
//! pipeline.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::{BufRead, IsTerminal};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use attendance_scan::ui::{render_view, TerminalNotifier, Ui};
use attendance_scan::{
    CaptureController, ComplianceState, HttpEndpoint, LogNotifier, Notifier, ScannerConfig,
    StubCamera, SystemClock,
};

const TICK: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(
    name = "attendance_scan",
    about = "QR attendance capture console (simulated camera)"
)]
struct Args {
    /// Roster service URL (overrides config and ATTENDANCE_API_URL).
    #[arg(long, value_name = "URL")]
    api_url: Option<String>,

    /// Simulated camera label; repeat for several cameras.
    #[arg(long = "camera", value_name = "LABEL")]
    cameras: Vec<String>,

    /// Start scanning right away instead of waiting for `start`.
    #[arg(long)]
    auto_start: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, env = "ATTENDANCE_UI", default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Debug, PartialEq)]
enum Command {
    Start,
    Stop,
    Switch,
    Scan(String),
    Pick(usize),
    Uniform(ComplianceState),
    Close,
    Status,
    Visible,
    Cameras,
    Help,
    Quit,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ScannerConfig::load()?;
    if let Some(url) = args.api_url {
        cfg.api_url = url;
    }
    if !args.cameras.is_empty() {
        cfg.camera_labels = args.cameras;
    }

    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let labels: Vec<&str> = cfg.camera_labels.iter().map(String::as_str).collect();
    let camera = StubCamera::with_labels(&labels);
    let endpoint = Arc::new(HttpEndpoint::new(&cfg.api_url, cfg.http_timeout)?);
    log::info!("roster service: {}", endpoint.base_url());

    // Piped sessions get notifications through the log instead of toasts.
    let notifier: Box<dyn Notifier> = if is_tty {
        Box::new(TerminalNotifier)
    } else {
        Box::new(LogNotifier)
    };
    let mut controller = CaptureController::new(
        Box::new(camera.clone()),
        endpoint,
        notifier,
        Arc::new(SystemClock),
    )
    .with_scan_config(cfg.scan.clone())
    .with_ui(ui);

    // Camera list up front; scanning waits for the operator.
    if let Err(err) = controller.refresh_cameras() {
        log::warn!("camera enumeration failed: {:#}", err);
    }
    if args.auto_start {
        if let Err(err) = controller.start_scanning() {
            log::warn!("auto start failed: {:#}", err);
        }
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_flag = shutdown.clone();
    ctrlc::set_handler(move || shutdown_flag.store(true, Ordering::SeqCst))
        .map_err(|e| anyhow!("failed to install ctrl-c handler: {}", e))?;

    let (line_tx, line_rx) = mpsc::channel();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line_tx.send(line).is_err() {
                break;
            }
        }
    });

    print_help();
    print!("{}", render_view(&controller.view()));
    let mut stdin_open = true;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        let wait = controller
            .next_deadline()
            .map_or(TICK, |due| due.saturating_duration_since(Instant::now()).min(TICK));
        if stdin_open {
            match line_rx.recv_timeout(wait) {
                Ok(line) => match parse_command(&line) {
                    Ok(Some(Command::Quit)) => break,
                    Ok(Some(command)) => {
                        if let Err(err) = dispatch(&mut controller, &camera, command) {
                            eprintln!("error: {:#}", err);
                        }
                        print!("{}", render_view(&controller.view()));
                    }
                    Ok(None) => {}
                    Err(err) => eprintln!("{:#}", err),
                },
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => stdin_open = false,
            }
        } else if controller.pending_timers() == 0 {
            // Input is exhausted and nothing is left to fire.
            break;
        } else {
            std::thread::sleep(wait);
        }

        if controller.pump() > 0 {
            print!("{}", render_view(&controller.view()));
        }
    }

    controller.shutdown();
    Ok(())
}

fn dispatch(controller: &mut CaptureController, camera: &StubCamera, command: Command) -> Result<()> {
    match command {
        Command::Start => controller.start_scanning()?,
        Command::Stop => controller.stop_scanning(),
        Command::Switch => controller.switch_camera()?,
        Command::Scan(text) => {
            if !camera.emit_decode(&text) {
                return Err(anyhow!("camera is not running; use 'start' first"));
            }
        }
        Command::Pick(position) => {
            let index = position
                .checked_sub(1)
                .ok_or_else(|| anyhow!("positions start at 1"))?;
            controller.select_candidate(index)?;
        }
        Command::Uniform(compliance) => controller.select_compliance(compliance)?,
        Command::Close => controller.dismiss(),
        Command::Status => println!("session: {:?}", controller.session_state()),
        Command::Visible => controller.on_visibility_restored(),
        Command::Cameras => {
            for (index, device) in controller.cameras().iter().enumerate() {
                println!("{}. {} ({})", index + 1, device.label, device.id);
            }
        }
        Command::Help => print_help(),
        Command::Quit => {}
    }
    Ok(())
}

fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };
    let command = match word.to_lowercase().as_str() {
        "start" => Command::Start,
        "stop" => Command::Stop,
        "switch" => Command::Switch,
        "scan" if !rest.is_empty() => Command::Scan(rest.to_string()),
        "scan" => return Err(anyhow!("usage: scan <code text>")),
        "pick" => Command::Pick(
            rest.parse()
                .map_err(|_| anyhow!("usage: pick <number>"))?,
        ),
        "uniform" => Command::Uniform(rest.parse()?),
        "close" | "esc" => Command::Close,
        "status" => Command::Status,
        "visible" => Command::Visible,
        "cameras" => Command::Cameras,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(anyhow!("unknown command '{}'; try 'help'", other)),
    };
    Ok(Some(command))
}

fn print_help() {
    println!("commands:");
    println!("  start | stop | switch      camera control");
    println!("  scan <text>                simulate the camera decoding a code");
    println!("  pick <n>                   choose a name from the list");
    println!("  uniform <full|partial|none>");
    println!("  close                      dismiss the open selection");
    println!("  visible                    the console came back to the foreground");
    println!("  status | cameras | help | quit");
}
