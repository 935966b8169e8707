use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TERMINATE_POLL: Duration = Duration::from_millis(100);

fn to_pid(pid: u32) -> Option<Pid> {
    i32::try_from(pid)
        .ok()
        .filter(|raw| *raw > 0)
        .map(Pid::from_raw)
}

/// Signal-0 probe. EPERM means the process exists under another user.
pub fn is_process_alive(pid: u32) -> bool {
    let Some(target) = to_pid(pid) else {
        return false;
    };
    match kill(target, None) {
        Ok(()) => !is_zombie(pid),
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// True while any member of the process group led by `pgid` exists.
pub fn is_group_alive(pgid: u32) -> bool {
    let Some(target) = to_pid(pgid) else {
        return false;
    };
    match killpg(target, None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(Errno::ESRCH) => is_process_alive(pgid),
        Err(_) => false,
    }
}

#[cfg(target_os = "linux")]
fn is_zombie(pid: u32) -> bool {
    let Ok(stat) = std::fs::read_to_string(format!("/proc/{pid}/stat")) else {
        return false;
    };
    // Field 3 follows the parenthesised command name, which may itself contain spaces.
    stat.rsplit_once(')')
        .and_then(|(_, rest)| rest.trim_start().chars().next())
        .map(|state| state == 'Z')
        .unwrap_or(false)
}

#[cfg(not(target_os = "linux"))]
fn is_zombie(_pid: u32) -> bool {
    false
}

/// Signals every member of the group led by `pgid`, falling back to the leader alone.
pub(crate) fn signal_group(pgid: u32, signal: Signal) -> Result<(), Errno> {
    let target = to_pid(pgid).ok_or(Errno::ESRCH)?;
    match killpg(target, signal) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => kill(target, signal),
        Err(err) => Err(err),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    AlreadyGone,
    Terminated,
    Killed,
}

/// SIGTERM the group led by `pgid`, wait up to `grace`, then SIGKILL whatever is left.
pub fn terminate_group(pgid: u32, grace: Duration) -> Termination {
    match signal_group(pgid, Signal::SIGTERM) {
        Ok(()) => {}
        Err(Errno::ESRCH) => return Termination::AlreadyGone,
        Err(err) => warn!(pgid, "SIGTERM failed: {err}"),
    }

    let deadline = Instant::now() + grace;
    while Instant::now() < deadline {
        if !is_group_alive(pgid) {
            return Termination::Terminated;
        }
        thread::sleep(TERMINATE_POLL);
    }

    if !is_group_alive(pgid) {
        return Termination::Terminated;
    }
    debug!(pgid, "escalating to SIGKILL");
    if let Err(err) = signal_group(pgid, Signal::SIGKILL) {
        if err != Errno::ESRCH {
            warn!(pgid, "SIGKILL failed: {err}");
        }
    }
    Termination::Killed
}

pub fn hostname() -> Option<String> {
    nix::unistd::gethostname()
        .ok()
        .map(|name| name.to_string_lossy().to_string())
}
