//! Supervisor/Lifecycle: startup sequence, signal forwarding, shutdown,
//! and exit-code mapping. Bounded wait-then-escalate shutdown: forward the
//! signal, wait `shutdown_grace_secs` for the child to exit, then SIGKILL.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use ay_core::{AssistantProfile, CoreError, Pid, SupervisorConfig};
use ay_pty::{LogSinks, Pipeline, PtyDriver};
use ay_registry::{RegistryManager, Status};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::inputmux::{InputMux, MuxEvent, Source};

fn build_argv(profile: &AssistantProfile, extra_args: &[String], prompt: Option<&str>) -> Vec<String> {
    let mut argv = profile.argv_prefix.clone();
    argv.extend(extra_args.iter().cloned());
    if let Some(p) = prompt {
        argv.push("--".to_string());
        argv.push(p.to_string());
    }
    argv
}

pub async fn run(args: RunArgs) -> Result<i32> {
    let profile = match AssistantProfile::resolve(&args.assistant) {
        Ok(p) => p,
        Err(CoreError::InvalidProfile { .. }) => {
            eprintln!(
                "unknown assistant {:?}; {}",
                args.assistant,
                AssistantProfile::claude_default()
                    .install_hint
                    .unwrap_or_default()
            );
            return Ok(1);
        }
        Err(e) => return Err(e.into()),
    };

    let cwd = std::env::current_dir().context("resolve current directory")?;
    let config = SupervisorConfig {
        auto_yes: args.auto_yes,
        verbose: args.verbose,
        ..SupervisorConfig::default()
    };
    let argv = build_argv(&profile, &args.extra_args, args.prompt.as_deref());

    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));

    let ready = Arc::new(AtomicBool::new(false));
    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<Option<i32>>();

    // Registry + Log Sinks need the pid before the driver even finishes
    // spawning, so the driver's `on_data`/`on_exit` closures below can
    // already capture a fully-formed pipeline; that pipeline is built
    // once we know the pid, inside the spawn call's closures via an
    // `Option` cell populated synchronously before any bytes can arrive.
    let pipeline_cell: Arc<Mutex<Option<Arc<Mutex<Pipeline>>>>> = Arc::new(Mutex::new(None));
    let pipeline_for_data = Arc::clone(&pipeline_cell);
    let responder_tx_cell: Arc<Mutex<Option<mpsc::UnboundedSender<MuxEvent>>>> =
        Arc::new(Mutex::new(None));
    let responder_tx_for_data = Arc::clone(&responder_tx_cell);

    let driver = match PtyDriver::spawn(
        &argv,
        &cwd,
        cols,
        rows,
        move |bytes| {
            let _ = std::io::Write::write_all(&mut std::io::stdout(), bytes);
            let _ = std::io::Write::flush(&mut std::io::stdout());

            let Some(pipeline) = pipeline_for_data.lock().unwrap().clone() else {
                return;
            };
            let outcome = pipeline.lock().unwrap().on_chunk(bytes, Instant::now());
            if let Some(injection) = outcome.injection {
                if let Some(tx) = responder_tx_for_data.lock().unwrap().as_ref() {
                    let _ = tx.send(MuxEvent::Write(injection.into_bytes(), Source::Responder));
                }
            }
        },
        move |code| {
            let _ = exit_tx.send(code);
        },
    ) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("failed to start {}: {e}", args.assistant);
            return Ok(1);
        }
    };

    let pid = driver.pid();
    info!(pid, assistant = %args.assistant, "spawned assistant");

    let registry = RegistryManager::init(&cwd).context("open registry")?;
    if registry.is_degraded() {
        warn!("registry degraded to in-memory — history will not survive restart");
    }
    let logs = LogSinks::open(&cwd, Pid(pid)).context("open log sinks")?;
    let log_file = cwd
        .join(".agent-yes/logs")
        .join(format!("{pid}.raw.log"))
        .to_string_lossy()
        .into_owned();
    let fifo_path = ay_registry::ipc::endpoint_path(&cwd, pid);
    let fifo_file = fifo_path.to_string_lossy().into_owned();

    registry.register(
        pid,
        &args.assistant,
        &argv,
        args.prompt.as_deref(),
        &log_file,
        &fifo_file,
    )?;
    if let Err(e) = ay_registry::ipc::create(&fifo_path) {
        warn!(error = %e, "IPC endpoint creation failed; out-of-band input disabled");
    }

    let pipeline = Arc::new(Mutex::new(
        Pipeline::new(&profile, logs, config.auto_yes).context("build pipeline")?,
    ));
    *pipeline_cell.lock().unwrap() = Some(Arc::clone(&pipeline));

    let mux = InputMux::start(Arc::clone(&ready), Some(fifo_path.clone()))
        .context("acquire terminal raw mode")?;
    *responder_tx_cell.lock().unwrap() = Some(mux.responder_sender());

    if let Some(prompt) = &args.prompt {
        driver.write(format!("{prompt}\n").as_bytes())?;
    }

    let outcome = main_loop(&driver, &pipeline, &ready, mux, &mut exit_rx, &config).await;

    pipeline.lock().unwrap().terminate();
    let _ = ay_registry::ipc::remove(&fifo_path);

    let (exit_reason, exit_code, final_status) = match &outcome {
        ShutdownOutcome::PreReadyAbort => ("user-abort", 130, Status::Exited),
        ShutdownOutcome::SignalForwarded { code } => {
            ("user-abort", code.unwrap_or(128 + libc::SIGTERM), Status::Exited)
        }
        ShutdownOutcome::ChildExited { code: Some(0) } => ("normal", 0, Status::Exited),
        ShutdownOutcome::ChildExited { code: Some(c) } => ("crash", *c, Status::Exited),
        ShutdownOutcome::ChildExited { code: None } => ("crash", 128 + libc::SIGKILL, Status::Exited),
    };
    registry.update_status(pid, final_status, Some(exit_reason), Some(exit_code))?;

    Ok(exit_code)
}

enum ShutdownOutcome {
    PreReadyAbort,
    SignalForwarded { code: Option<i32> },
    ChildExited { code: Option<i32> },
}

async fn main_loop(
    driver: &PtyDriver,
    pipeline: &Arc<Mutex<Pipeline>>,
    ready: &Arc<AtomicBool>,
    mut mux: InputMux,
    exit_rx: &mut mpsc::UnboundedReceiver<Option<i32>>,
    config: &SupervisorConfig,
) -> ShutdownOutcome {
    let mut sigint = signal(SignalKind::interrupt()).expect("install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    let mut sigwinch = signal(SignalKind::window_change()).expect("install SIGWINCH handler");
    let mut ready_check = tokio::time::interval(Duration::from_millis(100));

    loop {
        tokio::select! {
            Some(event) = mux.recv() => {
                match event {
                    MuxEvent::Write(bytes, source) => {
                        if driver.write(&bytes).is_err() {
                            continue;
                        }
                        if source == Source::Terminal {
                            let mut p = pipeline.lock().unwrap();
                            if p.match_state() == ay_core::MatchState::AwaitingDangerousConfirmation {
                                p.mark_working();
                            }
                        }
                    }
                    MuxEvent::PreReadyAbort => {
                        println!("User aborted: SIGINT");
                        let _ = driver.kill(libc::SIGTERM);
                        return ShutdownOutcome::PreReadyAbort;
                    }
                }
            }
            _ = sigint.recv() => {
                let code = forward_and_wait(driver, exit_rx, libc::SIGINT, config).await;
                return ShutdownOutcome::SignalForwarded { code };
            }
            _ = sigterm.recv() => {
                let code = forward_and_wait(driver, exit_rx, libc::SIGTERM, config).await;
                return ShutdownOutcome::SignalForwarded { code };
            }
            _ = sigwinch.recv() => {
                if let Ok((cols, rows)) = crossterm::terminal::size() {
                    let _ = driver.resize(cols, rows);
                }
            }
            _ = ready_check.tick() => {
                let mut p = pipeline.lock().unwrap();
                let _ = p.tick(Instant::now());
                if !ready.load(Ordering::Acquire) {
                    p.force_ready_after_timeout(
                        Instant::now(),
                        Duration::from_secs(config.ready_timeout_secs),
                    );
                    if p.has_reached_ready() {
                        ready.store(true, Ordering::Release);
                    }
                }
            }
            Some(code) = exit_rx.recv() => {
                return ShutdownOutcome::ChildExited { code };
            }
            else => {
                return ShutdownOutcome::ChildExited { code: None };
            }
        }
    }
}

async fn forward_and_wait(
    driver: &PtyDriver,
    exit_rx: &mut mpsc::UnboundedReceiver<Option<i32>>,
    signal: i32,
    config: &SupervisorConfig,
) -> Option<i32> {
    let _ = driver.kill(signal);
    match tokio::time::timeout(
        Duration::from_secs(config.shutdown_grace_secs),
        exit_rx.recv(),
    )
    .await
    {
        Ok(Some(code)) => code,
        _ => {
            let _ = driver.kill(libc::SIGKILL);
            None
        }
    }
}

/// Out-of-band sender path: find the active session in `cwd` and forward
/// `message` into its stdin, framed as `"<text>\r"`.
pub fn send(cwd: &std::path::Path, message: &str) -> Result<()> {
    let registry = RegistryManager::init(cwd)?;
    let Some(record) = registry.find_active_ipc()? else {
        return Err(anyhow!("no active session in {}", cwd.display()));
    };
    write_frame(&PathBuf::from(&record.fifo_file), message)
}

#[cfg(unix)]
fn write_frame(path: &std::path::Path, message: &str) -> Result<()> {
    use std::io::Write;
    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .open(path)
        .with_context(|| format!("open IPC endpoint {}", path.display()))?;
    write!(f, "{message}\r")?;
    Ok(())
}

#[cfg(not(unix))]
fn write_frame(_path: &std::path::Path, _message: &str) -> Result<()> {
    Err(anyhow!("out-of-band send is POSIX-only in this build"))
}
