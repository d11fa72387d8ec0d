//! Process liveness probe

use std::io;

/// Answers whether a process id refers to a running process
#[cfg_attr(test, mockall::automock)]
pub trait LivenessProbe: Send + Sync {
    fn is_running(&self, pid: Option<u32>) -> io::Result<bool>;
}

/// Probe backed by `kill(pid, 0)`
#[derive(Debug, Clone, Copy, Default)]
pub struct SignalProbe;

impl LivenessProbe for SignalProbe {
    fn is_running(&self, pid: Option<u32>) -> io::Result<bool> {
        pid_is_running(pid)
    }
}

/// Signal-zero liveness check.
///
/// `ESRCH` means no such process. `EPERM` means the process exists but belongs
/// to someone else, so it still counts as running. Anything else is returned.
pub fn pid_is_running(pid: Option<u32>) -> io::Result<bool> {
    let pid = match pid {
        // pid 0 would probe our own process group
        None | Some(0) => return Ok(false),
        Some(pid) => pid,
    };

    // Negative pid_t values address process groups, never probe those
    let pid = libc::pid_t::try_from(pid).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, format!("pid {} out of range", pid))
    })?;

    // SAFETY: signal 0 performs only the existence and permission checks
    let rc = unsafe { libc::kill(pid, 0) };
    if rc == 0 {
        return Ok(true);
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        Some(libc::ESRCH) => Ok(false),
        Some(libc::EPERM) => Ok(true),
        _ => Err(err),
    }
}
