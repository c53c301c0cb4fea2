//! Bounded termination of tool server subprocesses.

use std::fmt;
use std::time::Duration;
use tokio::process::Child;
use tokio::time::timeout;

/// How a subprocess ended during shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Termination {
    /// It exited on its own after stdin closed.
    Exited,
    /// It exited after `SIGTERM`.
    Terminated,
    /// It had to be force-killed.
    Killed,
}

impl fmt::Display for Termination {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Exited => "exited",
            Self::Terminated => "terminated",
            Self::Killed => "killed",
        })
    }
}

/// Waits for `child` to exit, escalating to `SIGTERM` and then a forced
/// kill, each after `grace`. The child is always reaped on success.
///
/// Callers close stdin first; that is the polite request to exit.
pub(crate) async fn terminate(child: &mut Child, grace: Duration) -> std::io::Result<Termination> {
    if exited_within(child, grace).await? {
        return Ok(Termination::Exited);
    }

    if send_terminate(child) && exited_within(child, grace).await? {
        return Ok(Termination::Terminated);
    }

    child.kill().await?;
    Ok(Termination::Killed)
}

async fn exited_within(child: &mut Child, grace: Duration) -> std::io::Result<bool> {
    match timeout(grace, child.wait()).await {
        Ok(status) => status.map(|_| true),
        Err(_) => Ok(false),
    }
}

#[cfg(unix)]
fn send_terminate(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(raw_pid) = child.id().and_then(|pid| i32::try_from(pid).ok()) else {
        return false;
    };
    kill(Pid::from_raw(raw_pid), Signal::SIGTERM).is_ok()
}

#[cfg(not(unix))]
const fn send_terminate(_child: &Child) -> bool {
    false
}
