//! Three append-only log sinks per session, rooted at `<cwd>/.agent-yes/`.
//!
//! Debug-log entries are passed through
//! [`crate::truncate::truncate_output`] before being written, so a child
//! dumping an enormous single line cannot blow up the debug trace.

use crate::truncate;
use ay_core::Pid;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

const DEBUG_LINE_MAX_CHARS: usize = 4_000;

/// The three append-only writers for one session, plus the workspace-level
/// `.gitignore` that is created (once) alongside the first session's logs.
pub struct LogSinks {
    raw: File,
    lines: File,
    debug: File,
}

impl LogSinks {
    /// Open (create if absent) the three log files for `pid` under
    /// `<cwd>/.agent-yes/logs/`, generating the workspace `.gitignore` if it
    /// does not already exist.
    pub fn open(cwd: &Path, pid: Pid) -> std::io::Result<Self> {
        let root = cwd.join(".agent-yes");
        let logs_dir = root.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        ensure_gitignore(&root)?;

        let raw = append_file(&logs_dir.join(format!("{pid}.raw.log")))?;
        let lines = append_file(&logs_dir.join(format!("{pid}.lines.log")))?;
        let debug = append_file(&logs_dir.join(format!("{pid}.debug.log")))?;

        Ok(Self { raw, lines, debug })
    }

    /// Append raw bytes exactly as received from the PTY (ANSI included).
    pub fn write_raw(&mut self, chunk: &[u8]) {
        if let Err(e) = self.raw.write_all(chunk) {
            warn!(error = %e, "raw log write failed");
        }
    }

    /// Append one decoded, ANSI-stripped line (newline-terminated).
    pub fn write_line(&mut self, line: &str) {
        if let Err(e) = writeln!(self.lines, "{line}") {
            warn!(error = %e, "line log write failed");
        }
    }

    /// Append a structured debug trace entry from the Match Engine or
    /// Supervisor, bounded by middle-omission truncation.
    pub fn write_debug(&mut self, entry: &str) {
        let bounded = truncate::truncate_output(entry, DEBUG_LINE_MAX_CHARS);
        if let Err(e) = writeln!(self.debug, "{bounded}") {
            warn!(error = %e, "debug log write failed");
        }
    }

    pub fn flush(&mut self) {
        let _ = self.raw.flush();
        let _ = self.lines.flush();
        let _ = self.debug.flush();
    }
}

fn append_file(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

/// Generate `.agent-yes/.gitignore` excluding `logs/`, `fifo/`, `*.sqlite*`,
/// but only if it does not already exist (create-if-absent, never overwrite).
fn ensure_gitignore(root: &Path) -> std::io::Result<()> {
    let path: PathBuf = root.join(".gitignore");
    if path.exists() {
        return Ok(());
    }
    let mut f = File::create(path)?;
    writeln!(f, "logs/")?;
    writeln!(f, "fifo/")?;
    writeln!(f, "*.sqlite*")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_three_log_files_and_gitignore() {
        let dir = tempdir();
        let pid = Pid(12345);
        let mut sinks = LogSinks::open(&dir, pid).expect("open sinks");
        sinks.write_raw(b"\x1b[31mred\x1b[0m\n");
        sinks.write_line("red");
        sinks.write_debug("trace entry");
        sinks.flush();

        let logs_dir = dir.join(".agent-yes").join("logs");
        assert!(logs_dir.join("12345.raw.log").exists());
        assert!(logs_dir.join("12345.lines.log").exists());
        assert!(logs_dir.join("12345.debug.log").exists());
        assert!(dir.join(".agent-yes").join(".gitignore").exists());
    }

    #[test]
    fn gitignore_is_never_overwritten() {
        let dir = tempdir();
        let root = dir.join(".agent-yes");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join(".gitignore"), "custom content\n").unwrap();

        let _ = LogSinks::open(&dir, Pid(1)).expect("open sinks");
        let contents = std::fs::read_to_string(root.join(".gitignore")).unwrap();
        assert_eq!(contents, "custom content\n");
    }

    fn tempdir() -> PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!("ay-pty-logs-test-{}", uuid_like()));
        std::fs::create_dir_all(&p).unwrap();
        p
    }

    fn uuid_like() -> u64 {
        use std::time::{SystemTime, UNIX_EPOCH};
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos() as u64
    }
}
