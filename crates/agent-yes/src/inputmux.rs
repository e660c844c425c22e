//! Input Mux: merges terminal stdin, the out-of-band IPC endpoint, and
//! Auto-Responder injections into one ordered write stream to the PTY.
//! The raw-mode scoped-acquisition idiom (RAII guard plus a shared panic
//! hook so terminal state is restored on every exit path, including
//! panics) is adapted from `jguida941-voiceterm/rust/src/terminal_restore.rs`.

use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use tokio::sync::mpsc;
use tracing::warn;

/// Control-C.
const CTRL_C: u8 = 0x03;

/// Where a `Write` originated, so the Supervisor can decide whether it
/// counts as the "user input" event that moves a dangerous-confirmation
/// state to `Working` (only terminal input does; an Auto-Responder
/// injection already drives its own `Working` transition).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Terminal,
    Ipc,
    Responder,
}

#[derive(Debug)]
pub enum MuxEvent {
    Write(Vec<u8>, Source),
    /// A Control-C arrived on the terminal before the Match Engine ever
    /// reached `Idle/Ready`.
    PreReadyAbort,
}

static RAW_MODE_ENABLED: AtomicBool = AtomicBool::new(false);
static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

fn restore_terminal() {
    if RAW_MODE_ENABLED.swap(false, Ordering::SeqCst) {
        let _ = disable_raw_mode();
    }
}

fn install_panic_hook() {
    PANIC_HOOK_INSTALLED.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            restore_terminal();
            previous(info);
        }));
    });
}

/// Scoped acquisition of terminal raw mode. Released on `Drop` and on any
/// panic, regardless of which exit path is taken.
pub struct RawModeGuard {
    _private: (),
}

impl RawModeGuard {
    pub fn acquire() -> std::io::Result<Self> {
        install_panic_hook();
        enable_raw_mode()?;
        RAW_MODE_ENABLED.store(true, Ordering::SeqCst);
        Ok(Self { _private: () })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        restore_terminal();
    }
}

/// Owns the merged event stream and the raw-mode guard for its lifetime.
pub struct InputMux {
    rx: mpsc::UnboundedReceiver<MuxEvent>,
    responder_tx: mpsc::UnboundedSender<MuxEvent>,
    _raw_guard: RawModeGuard,
}

impl InputMux {
    /// Start the terminal-reader and IPC-reader background threads and
    /// return the merged receiver. `ready` is flipped by the Supervisor
    /// once the Match Engine first reaches `Idle/Ready`.
    pub fn start(ready: Arc<AtomicBool>, ipc_path: Option<PathBuf>) -> std::io::Result<Self> {
        let raw_guard = RawModeGuard::acquire()?;
        let (tx, rx) = mpsc::unbounded_channel();

        spawn_terminal_reader(tx.clone(), ready);
        if let Some(path) = ipc_path {
            spawn_ipc_reader(tx.clone(), path);
        }

        Ok(Self {
            rx,
            responder_tx: tx,
            _raw_guard: raw_guard,
        })
    }

    /// Sender the Auto-Responder (driven from the PTY reader thread, via
    /// the Output Pipeline) uses to inject replies — never writes to the
    /// PTY directly, so it interleaves correctly with user typing.
    pub fn responder_sender(&self) -> mpsc::UnboundedSender<MuxEvent> {
        self.responder_tx.clone()
    }

    pub async fn recv(&mut self) -> Option<MuxEvent> {
        self.rx.recv().await
    }
}

fn spawn_terminal_reader(tx: mpsc::UnboundedSender<MuxEvent>, ready: Arc<AtomicBool>) {
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            let n = match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) => {
                    warn!(error = %e, "terminal stdin read failed");
                    break;
                }
            };
            let chunk = &buf[..n];

            if !ready.load(Ordering::Acquire) {
                if let Some(pos) = chunk.iter().position(|&b| b == CTRL_C) {
                    if pos > 0 {
                        let _ = tx.send(MuxEvent::Write(chunk[..pos].to_vec(), Source::Terminal));
                    }
                    let _ = tx.send(MuxEvent::PreReadyAbort);
                    break;
                }
            }

            if tx.send(MuxEvent::Write(chunk.to_vec(), Source::Terminal)).is_err() {
                break;
            }
        }
    });
}

#[cfg(unix)]
fn spawn_ipc_reader(tx: mpsc::UnboundedSender<MuxEvent>, path: PathBuf) {
    std::thread::spawn(move || loop {
        let mut file = match std::fs::File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "IPC endpoint open failed, retiring reader");
                return;
            }
        };
        let mut contents = Vec::new();
        if file.read_to_end(&mut contents).is_err() {
            continue;
        }
        if contents.is_empty() {
            continue;
        }
        if tx.send(MuxEvent::Write(contents, Source::Ipc)).is_err() {
            return;
        }
    });
}

#[cfg(not(unix))]
fn spawn_ipc_reader(_tx: mpsc::UnboundedSender<MuxEvent>, _path: PathBuf) {
    // Windows named-pipe server loop is not implemented in this exercise;
    // out-of-band forwarding is POSIX-only for now.
}
