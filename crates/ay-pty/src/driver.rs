//! PTY Driver: spawns the assistant child behind a pseudo-terminal and
//! exposes a callback-driven read side. A blocking reader thread hands
//! bytes off a `portable-pty` master straight to `on_data` as they arrive,
//! rather than requiring callers to poll `read()` themselves.

use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tracing::{debug, warn};

use crate::error::{PtyError, Result};

/// Columns below this are rejected by `resize` — most TUIs render garbage
/// narrower than this.
const MIN_COLS: u16 = 20;

/// A running assistant process behind a PTY. One `PtyDriver` per supervised
/// child; the workspace has no notion of a multi-session pool.
pub struct PtyDriver {
    writer: Mutex<Box<dyn Write + Send>>,
    master: Mutex<Box<dyn MasterPty + Send>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
    pid: u32,
    alive: Arc<AtomicBool>,
}

impl PtyDriver {
    /// Spawn `argv[0]` with the remaining elements of `argv` as arguments,
    /// in `cwd`, behind a new pseudo-terminal sized to `cols`x`rows`.
    ///
    /// `on_data` is invoked from a dedicated reader thread with each chunk
    /// of raw bytes as they're read off the PTY master — ANSI included,
    /// undecoded. `on_exit` fires exactly once, after the reader sees EOF
    /// and the child has been reaped, with its exit code (`None` if the
    /// child was killed by a signal rather than exiting normally).
    pub fn spawn(
        argv: &[String],
        cwd: &Path,
        cols: u16,
        rows: u16,
        mut on_data: impl FnMut(&[u8]) + Send + 'static,
        on_exit: impl FnOnce(Option<i32>) + Send + 'static,
    ) -> Result<Self> {
        let Some((program, args)) = argv.split_first() else {
            return Err(PtyError::PtySpawn("empty argv".into()));
        };

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols: cols.max(MIN_COLS),
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::PtySpawn(e.to_string()))?;

        let mut cmd = CommandBuilder::new(program);
        cmd.args(args);
        cmd.cwd(cwd);
        cmd.env("TERM", "xterm-color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::PtySpawn(e.to_string()))?;
        let pid = child.process_id().unwrap_or(0);
        let child = Arc::new(Mutex::new(child));

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::PtySpawn(e.to_string()))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::PtySpawn(e.to_string()))?;

        let alive = Arc::new(AtomicBool::new(true));
        let alive_clone = Arc::clone(&alive);
        let child_for_thread = Arc::clone(&child);

        std::thread::spawn(move || {
            let mut raw = [0u8; 4096];
            loop {
                match reader.read(&mut raw) {
                    Ok(0) => break,
                    Ok(n) => on_data(&raw[..n]),
                    Err(e) => {
                        warn!(error = %e, "PTY reader error");
                        break;
                    }
                }
            }
            alive_clone.store(false, Ordering::Release);

            let exit_code = child_for_thread
                .lock()
                .unwrap()
                .wait()
                .ok()
                .and_then(|status| status.exit_code().try_into().ok());
            debug!(?exit_code, "PTY child reaped");
            on_exit(exit_code);
        });

        Ok(Self {
            writer: Mutex::new(writer),
            master: Mutex::new(pair.master),
            child,
            pid,
            alive,
        })
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Write raw bytes to the child's stdin (the PTY slave).
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.writer.lock().unwrap();
        guard.write_all(bytes)?;
        guard.flush()?;
        Ok(())
    }

    /// Resize the PTY. `cols` below [`MIN_COLS`] is clamped rather than
    /// rejected, since a transient narrow terminal shouldn't fail the call.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        let guard = self.master.lock().unwrap();
        guard
            .resize(PtySize {
                rows,
                cols: cols.max(MIN_COLS),
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| PtyError::Io(std::io::Error::other(e.to_string())))
    }

    /// Send `signal` (e.g. `libc::SIGTERM`, `libc::SIGKILL`) to the child.
    #[cfg(unix)]
    pub fn kill(&self, signal: i32) -> Result<()> {
        if self.pid == 0 {
            return Ok(());
        }
        let rc = unsafe { libc::kill(self.pid as libc::pid_t, signal) };
        if rc != 0 && std::io::Error::last_os_error().raw_os_error() != Some(libc::ESRCH) {
            return Err(PtyError::Io(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    #[cfg(not(unix))]
    pub fn kill(&self, _signal: i32) -> Result<()> {
        let mut guard = self.child.lock().unwrap();
        guard
            .kill()
            .map_err(|e| PtyError::Io(std::io::Error::other(e.to_string())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn spawn_true_reports_exit_code_zero() {
        let (tx, rx) = mpsc::channel();
        let driver = PtyDriver::spawn(
            &["true".to_string()],
            Path::new("."),
            80,
            24,
            |_bytes| {},
            move |code| {
                let _ = tx.send(code);
            },
        )
        .expect("spawn true");
        assert!(driver.pid() > 0);
        let code = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(code, Some(0));
    }

    #[test]
    fn resize_clamps_narrow_cols() {
        let (tx, _rx) = mpsc::channel::<Option<i32>>();
        let driver = PtyDriver::spawn(
            &["sleep".to_string(), "2".to_string()],
            Path::new("."),
            80,
            24,
            |_| {},
            move |code| {
                let _ = tx.send(code);
            },
        )
        .expect("spawn sleep");
        assert!(driver.resize(1, 24).is_ok());
        let _ = driver.kill(libc::SIGKILL);
    }
}
