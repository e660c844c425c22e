use rusqlite::Connection;

use crate::error::Result;

/// Create the `pid_records` table and its index if absent, and switch on
/// WAL journaling so concurrent out-of-band readers don't block the writer.
///
/// Safe to call on every startup.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS pid_records (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            pid         INTEGER NOT NULL UNIQUE,
            cli         TEXT NOT NULL,
            args        TEXT NOT NULL,
            prompt      TEXT,
            logFile     TEXT NOT NULL,
            fifoFile    TEXT NOT NULL,
            status      TEXT NOT NULL CHECK (status IN ('idle', 'active', 'exited')),
            exitReason  TEXT NOT NULL DEFAULT '',
            exitCode    INTEGER,
            startedAt   INTEGER NOT NULL,
            updatedAt   INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_pid_records_status
            ON pid_records(status, startedAt DESC);",
    )?;
    Ok(())
}
