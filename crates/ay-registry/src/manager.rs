//! `RegistryManager`: the Process Registry's single entry point. Keyed by
//! OS pid via a real `UNIQUE(pid)` upsert (`ON CONFLICT(pid) DO UPDATE`)
//! rather than insert-or-ignore-then-read-back — pid reuse by the OS is
//! exactly the "same key, new facts" case that clause exists for.

use std::path::Path;
use std::sync::Mutex;

use ay_core::Pid;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{instrument, warn};

use crate::db::init_db;
use crate::error::{RegistryError, Result};
use crate::record::{PidRecord, Status};

/// Wraps a single SQLite connection backing `<cwd>/.agent-yes/pid.sqlite`.
/// Falls back to an in-memory, non-durable connection if the file cannot
/// be opened (read-only filesystem, permissions) — storage errors degrade
/// rather than abort the supervised session.
pub struct RegistryManager {
    db: Mutex<Connection>,
    degraded: bool,
}

impl RegistryManager {
    /// Open (creating if absent) the registry rooted at `<cwd>/.agent-yes/`,
    /// ensure its schema, and run stale-record cleanup.
    pub fn init(cwd: &Path) -> Result<Self> {
        let root = cwd.join(".agent-yes");
        std::fs::create_dir_all(&root).ok();
        ensure_gitignore(&root).ok();

        let db_path = root.join("pid.sqlite");
        let (conn, degraded) = match Connection::open(&db_path) {
            Ok(conn) => (conn, false),
            Err(e) => {
                warn!(error = %e, "registry database unavailable, degrading to in-memory");
                (Connection::open_in_memory()?, true)
            }
        };
        init_db(&conn)?;

        let manager = Self {
            db: Mutex::new(conn),
            degraded,
        };
        manager.stale_cleanup()?;
        Ok(manager)
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Insert a new record or, if `pid` already has one (OS pid reuse),
    /// update it in place. `pid` is `UNIQUE` in the schema.
    #[instrument(skip(self, args, prompt), fields(pid))]
    pub fn register(
        &self,
        pid: u32,
        cli: &str,
        args: &[String],
        prompt: Option<&str>,
        log_file: &str,
        fifo_file: &str,
    ) -> Result<PidRecord> {
        let args_json = serde_json::to_string(args)?;
        let now = now_millis();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO pid_records
                (pid, cli, args, prompt, logFile, fifoFile, status, exitReason, exitCode, startedAt, updatedAt)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'active', '', NULL, ?7, ?7)
             ON CONFLICT(pid) DO UPDATE SET
                cli = excluded.cli,
                args = excluded.args,
                prompt = excluded.prompt,
                logFile = excluded.logFile,
                fifoFile = excluded.fifoFile,
                status = 'active',
                exitReason = '',
                exitCode = NULL,
                startedAt = excluded.startedAt,
                updatedAt = excluded.updatedAt",
            params![pid, cli, args_json, prompt, log_file, fifo_file, now],
        )?;

        self.find_by_pid(pid)?.ok_or(RegistryError::NotFound { pid })
    }

    /// Partial update of the trailing status/exit fields.
    #[instrument(skip(self))]
    pub fn update_status(
        &self,
        pid: u32,
        status: Status,
        exit_reason: Option<&str>,
        exit_code: Option<i32>,
    ) -> Result<()> {
        let now = now_millis();
        let db = self.db.lock().unwrap();
        let rows = db.execute(
            "UPDATE pid_records
             SET status = ?1, exitReason = COALESCE(?2, exitReason), exitCode = ?3, updatedAt = ?4
             WHERE pid = ?5",
            params![status.as_str(), exit_reason, exit_code, now, pid],
        )?;
        if rows == 0 {
            return Err(RegistryError::NotFound { pid });
        }
        Ok(())
    }

    /// Most-recently-started record that isn't `exited`, for an out-of-band
    /// sender that wants to forward a line into whatever session is live.
    #[instrument(skip(self))]
    pub fn find_active_ipc(&self) -> Result<Option<PidRecord>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT pid, cli, args, prompt, logFile, fifoFile, status, exitReason, exitCode, startedAt, updatedAt
             FROM pid_records WHERE status != 'exited' ORDER BY startedAt DESC LIMIT 1",
            [],
            row_to_record,
        )
        .optional()
        .map_err(RegistryError::Database)
    }

    #[instrument(skip(self))]
    pub fn find_by_pid(&self, pid: u32) -> Result<Option<PidRecord>> {
        let db = self.db.lock().unwrap();
        db.query_row(
            "SELECT pid, cli, args, prompt, logFile, fifoFile, status, exitReason, exitCode, startedAt, updatedAt
             FROM pid_records WHERE pid = ?1",
            params![pid],
            row_to_record,
        )
        .optional()
        .map_err(RegistryError::Database)
    }

    /// Every non-exited row whose pid is no longer alive is force-updated
    /// to `exited`/`"stale-cleanup"`. Idempotent: a second run with no
    /// external state change touches zero rows.
    fn stale_cleanup(&self) -> Result<()> {
        let stale_pids: Vec<u32> = {
            let db = self.db.lock().unwrap();
            let mut stmt =
                db.prepare("SELECT pid FROM pid_records WHERE status != 'exited'")?;
            let pids = stmt.query_map([], |row| row.get::<_, u32>(0))?;
            pids.filter_map(|p| p.ok())
                .filter(|pid| !Pid::from(*pid).is_alive())
                .collect()
        };

        for pid in stale_pids {
            self.update_status(pid, Status::Exited, Some("stale-cleanup"), None)?;
        }
        Ok(())
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<PidRecord> {
    let args_json: String = row.get(2)?;
    let args: Vec<String> = serde_json::from_str(&args_json).unwrap_or_default();
    let status_str: String = row.get(6)?;
    let status = Status::parse(&status_str).unwrap_or(Status::Exited);

    Ok(PidRecord {
        pid: row.get(0)?,
        cli: row.get(1)?,
        args,
        prompt: row.get(3)?,
        log_file: row.get(4)?,
        fifo_file: row.get(5)?,
        status,
        exit_reason: row.get(7)?,
        exit_code: row.get(8)?,
        started_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Create-if-absent `.gitignore` under `.agent-yes/`. Duplicated (rather
/// than shared) with `ay_pty::logs`'s copy: both components independently
/// need `.agent-yes/` ignored by git and neither depends on the other to
/// have run first.
fn ensure_gitignore(root: &Path) -> std::io::Result<()> {
    let path = root.join(".gitignore");
    if path.exists() {
        return Ok(());
    }
    use std::io::Write;
    let mut f = std::fs::File::create(path)?;
    writeln!(f, "logs/")?;
    writeln!(f, "fifo/")?;
    writeln!(f, "*.sqlite*")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tempdir() -> std::path::PathBuf {
        let mut p = std::env::temp_dir();
        p.push(format!(
            "ay-registry-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).unwrap();
        p
    }

    #[test]
    fn register_then_find_by_pid_round_trips() {
        let dir = tempdir();
        let mgr = RegistryManager::init(&dir).unwrap();
        let rec = mgr
            .register(4242, "claude", &["--foo".into()], Some("hi"), "logs/4242.raw.log", "fifo/4242.stdin")
            .unwrap();
        assert_eq!(rec.pid, 4242);
        assert_eq!(rec.status, Status::Active);

        let found = mgr.find_by_pid(4242).unwrap().unwrap();
        assert_eq!(found.cli, "claude");
        assert_eq!(found.args, vec!["--foo".to_string()]);
    }

    #[test]
    fn re_registering_same_pid_updates_single_row() {
        let dir = tempdir();
        let mgr = RegistryManager::init(&dir).unwrap();
        mgr.register(77, "claude", &[], None, "a", "b").unwrap();
        mgr.register(77, "codex", &[], None, "c", "d").unwrap();

        let db = mgr.db.lock().unwrap();
        let count: i64 = db
            .query_row("SELECT COUNT(*) FROM pid_records WHERE pid = 77", [], |r| r.get(0))
            .unwrap();
        drop(db);
        assert_eq!(count, 1);
        assert_eq!(mgr.find_by_pid(77).unwrap().unwrap().cli, "codex");
    }

    #[test]
    fn update_status_on_unknown_pid_errs() {
        let dir = tempdir();
        let mgr = RegistryManager::init(&dir).unwrap();
        let err = mgr.update_status(999, Status::Exited, None, None);
        assert!(matches!(err, Err(RegistryError::NotFound { pid: 999 })));
    }

    #[test]
    fn find_active_ipc_ignores_exited_rows() {
        let dir = tempdir();
        let mgr = RegistryManager::init(&dir).unwrap();
        mgr.register(10, "claude", &[], None, "a", "b").unwrap();
        mgr.update_status(10, Status::Exited, Some("normal"), Some(0))
            .unwrap();
        assert!(mgr.find_active_ipc().unwrap().is_none());
    }

    #[test]
    fn stale_cleanup_marks_dead_pid_exited() {
        let dir = tempdir();
        let mgr = RegistryManager::init(&dir).unwrap();
        // pid 999999 is very unlikely to be alive in a test sandbox.
        mgr.register(999_999, "claude", &[], None, "a", "b").unwrap();
        mgr.stale_cleanup().unwrap();
        let rec = mgr.find_by_pid(999_999).unwrap().unwrap();
        assert_eq!(rec.status, Status::Exited);
        assert_eq!(rec.exit_reason, "stale-cleanup");
    }

    #[test]
    fn second_init_is_idempotent_on_already_exited_rows() {
        let dir = tempdir();
        {
            let mgr = RegistryManager::init(&dir).unwrap();
            mgr.register(55, "claude", &[], None, "a", "b").unwrap();
            mgr.update_status(55, Status::Exited, Some("normal"), Some(0))
                .unwrap();
        }
        let mgr2 = RegistryManager::init(&dir).unwrap();
        let rec = mgr2.find_by_pid(55).unwrap().unwrap();
        assert_eq!(rec.exit_reason, "normal");
    }
}
