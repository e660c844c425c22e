use std::fmt;

/// Operating-system process id of a supervised child. Sessions are keyed by
/// this value directly rather than by a generated UUID — the Registry's
/// `UNIQUE(pid)` constraint relies on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(pub u32);

impl Pid {
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Probe whether this pid still refers to a live process, via signal 0
    /// (POSIX kill(2) with no signal delivered — only existence/permission
    /// is checked).
    #[cfg(unix)]
    pub fn is_alive(self) -> bool {
        // SAFETY: signal 0 sends no signal; kill() only reports whether the
        // pid exists and is reachable by this process's privileges.
        unsafe { libc::kill(self.0 as libc::pid_t, 0) == 0 }
    }

    #[cfg(not(unix))]
    pub fn is_alive(self) -> bool {
        true
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for Pid {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_raw_value() {
        assert_eq!(Pid(4242).to_string(), "4242");
    }

    #[test]
    fn current_process_is_alive() {
        let pid = Pid(std::process::id());
        assert!(pid.is_alive());
    }

    #[test]
    fn pid_one_is_conventionally_alive_on_unix() {
        // pid 1 (init/systemd) always exists on a running unix system.
        #[cfg(unix)]
        assert!(Pid(1).is_alive());
    }
}
