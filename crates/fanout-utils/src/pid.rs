//! Process liveness probing used by stale-lock and stale-state reclamation
//! (spec §4.7 "Stale locks are reclaimed ... when the recorded process id
//! is not alive").

/// Best-effort check for whether `pid` names a live process on this host.
/// Unix sends signal 0 (`kill(pid, 0)`), which performs permission and
/// existence checks without actually signalling anything. On platforms
/// without that probe, conservatively assume the process is alive so
/// callers fall back to TTL-only reclamation.
#[must_use]
pub fn is_process_alive(pid: u32) -> bool {
    imp::is_process_alive(pid)
}

#[cfg(unix)]
mod imp {
    pub fn is_process_alive(pid: u32) -> bool {
        if pid == 0 {
            return false;
        }
        // SAFETY: kill(pid, 0) performs no signal delivery, only existence
        // and permission checks; pid is a plain integer argument.
        let result = unsafe { libc::kill(pid as libc::pid_t, 0) };
        if result == 0 {
            return true;
        }
        // EPERM means the process exists but we lack permission to signal
        // it -- still alive from our point of view.
        std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
}

#[cfg(not(unix))]
mod imp {
    pub fn is_process_alive(_pid: u32) -> bool {
        true
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(std::process::id()));
    }

    #[test]
    fn pid_zero_is_not_alive() {
        assert!(!is_process_alive(0));
    }
}
