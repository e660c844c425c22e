//! Per-session IPC endpoint: a named FIFO on POSIX, a named pipe on Windows.

use std::path::{Path, PathBuf};

/// Where `<cwd>/.agent-yes/fifo/<pid>.stdin` lives on POSIX, or the
/// `\\.\pipe\agent-yes-<pid>` name on Windows. Computed without touching
/// the filesystem, so the Supervisor can pass it to `register` before the
/// endpoint itself is created.
pub fn endpoint_path(cwd: &Path, pid: u32) -> PathBuf {
    if cfg!(windows) {
        PathBuf::from(format!(r"\\.\pipe\agent-yes-{pid}"))
    } else {
        cwd.join(".agent-yes").join("fifo").join(format!("{pid}.stdin"))
    }
}

/// Create the IPC endpoint. On POSIX this is a real named FIFO via
/// `mkfifo(2)`; on Windows the named pipe is created lazily by the first
/// `ConnectNamedPipe` call in the Input Mux, so this is a no-op there.
#[cfg(unix)]
pub fn create(path: &Path) -> std::io::Result<()> {
    use std::ffi::CString;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let c_path = CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::AlreadyExists {
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn create(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Remove the IPC endpoint. Idempotent: a missing path is not an error.
#[cfg(unix)]
pub fn remove(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
pub fn remove(_path: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_path_on_unix_is_under_fifo_dir() {
        if cfg!(unix) {
            let p = endpoint_path(Path::new("/tmp/proj"), 123);
            assert_eq!(p, Path::new("/tmp/proj/.agent-yes/fifo/123.stdin"));
        }
    }

    #[cfg(unix)]
    #[test]
    fn create_then_remove_is_idempotent() {
        let mut dir = std::env::temp_dir();
        dir.push(format!(
            "ay-registry-ipc-test-{}",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        let path = dir.join("fifo").join("1.stdin");
        create(&path).unwrap();
        assert!(path.exists());
        create(&path).unwrap(); // second create must not error
        remove(&path).unwrap();
        remove(&path).unwrap(); // second remove must not error
        assert!(!path.exists());
    }
}
