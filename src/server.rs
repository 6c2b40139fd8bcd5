//! Server-under-test lifecycle management.
//!
//! This module owns the whole life of an emulator process: allocating an
//! ephemeral port for it, spawning it with the right mode flags, waiting for
//! its listener to come up, and guaranteeing it is gone again afterwards.
//! The driver threads the resulting [`ServerHandle`] explicitly through its
//! control flow; there is no ambient global process state.
//!
//! Termination is two-stage: SIGTERM, a bounded grace period, then SIGKILL.
//! As a last resort the child is spawned with `kill_on_drop`, so even a
//! panicking driver cannot leave an orphaned emulator bound to a port.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::credentials::{DEV_ACCOUNT, DEV_ACCOUNT_KEY};
use crate::defaults;
use crate::error::HarnessError;

/// How to launch one server implementation.
///
/// The port is deliberately not part of the spec: it is allocated per run
/// and passed to [`start`], so the same spec can be reused across passes.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Implementation label, used in results and diagnostics.
    pub label: String,
    /// Program to execute (a binary path, or `node` for the baseline).
    pub program: OsString,
    /// Flag that selects the blob listener port, e.g. `--blob-port`.
    pub port_flag: String,
    /// Remaining startup arguments (entry script, in-memory persistence,
    /// reduced logging, version-check skip).
    pub extra_args: Vec<String>,
    /// Working directory for the child, when it matters.
    pub cwd: Option<PathBuf>,
}

impl LaunchSpec {
    /// Build the ready-to-spawn command for a given port.
    fn command(&self, port: u16) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg(&self.port_flag)
            .arg(port.to_string())
            .args(&self.extra_args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Backstop for panic and interrupt paths; the normal path goes
            // through [`stop`].
            .kill_on_drop(true);
        cmd
    }
}

/// A running server-under-test.
///
/// Exactly one handle's process is live at a time during a comparison run.
/// Created by [`start`], consumed by [`stop`].
#[derive(Debug)]
pub struct ServerHandle {
    /// Implementation label this process was launched as.
    pub label: String,
    /// Port the blob listener is bound to.
    pub port: u16,
    /// Account name every spawned emulator serves.
    pub account: String,
    /// Shared key paired with the account.
    pub key: String,
    child: Child,
    stdout_task: JoinHandle<String>,
    stderr_task: JoinHandle<String>,
}

/// Obtain a currently-unused ephemeral port on the loopback interface.
///
/// Binds port 0, reads back the OS assignment, and releases the socket.
/// There is a window in which another process could claim the port before
/// the server binds it; that is the accepted limitation of the technique.
pub fn allocate_port() -> Result<u16> {
    let listener = TcpListener::bind((defaults::LOOPBACK_HOST, 0))
        .context("failed to bind an ephemeral loopback port")?;
    let port = listener
        .local_addr()
        .context("failed to read back the allocated port")?
        .port();
    Ok(port)
}

/// Poll `host:port` until a TCP connection succeeds or `total` elapses.
///
/// Connection refusal and per-attempt timeout both mean "not yet ready";
/// only the overall deadline turns into `false`.
pub async fn wait_ready(host: &str, port: u16, total: Duration) -> bool {
    let deadline = Instant::now() + total;
    let addr = format!("{host}:{port}");
    while Instant::now() < deadline {
        match timeout(defaults::CONNECT_TIMEOUT, TcpStream::connect(&addr)).await {
            Ok(Ok(_)) => return true,
            Ok(Err(_)) | Err(_) => sleep(defaults::READY_POLL_INTERVAL).await,
        }
    }
    false
}

/// Spawn a server and block until it accepts connections on `port`.
///
/// Both std streams are piped and drained by background tasks: a child
/// blocked on a full pipe would stall the run, and the buffered output is
/// attached to [`HarnessError::Startup`] when readiness is never reached.
/// On readiness timeout the child is torn down before the error returns.
pub async fn start(spec: &LaunchSpec, port: u16, ready_timeout: Duration) -> Result<ServerHandle> {
    let mut command = spec.command(port);
    debug!("spawning {} on port {}", spec.label, port);
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to spawn {}", spec.label))?;

    let stdout = child
        .stdout
        .take()
        .context("child stdout was not piped")?;
    let stderr = child
        .stderr
        .take()
        .context("child stderr was not piped")?;
    let stdout_task = tokio::spawn(drain(stdout));
    let stderr_task = tokio::spawn(drain(stderr));

    if !wait_ready(defaults::LOOPBACK_HOST, port, ready_timeout).await {
        let _ = child.start_kill();
        let _ = child.wait().await;
        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();
        return Err(HarnessError::Startup {
            label: spec.label.clone(),
            port,
            timeout: ready_timeout,
            stdout,
            stderr,
        }
        .into());
    }

    debug!("{} is ready on port {}", spec.label, port);
    Ok(ServerHandle {
        label: spec.label.clone(),
        port,
        account: DEV_ACCOUNT.to_string(),
        key: DEV_ACCOUNT_KEY.to_string(),
        child,
        stdout_task,
        stderr_task,
    })
}

/// Terminate a server: graceful signal, bounded grace period, forced kill.
///
/// Consumes the handle, so double-stop cannot happen by construction, and
/// a process that already exited is simply reaped. All kill failures are
/// swallowed: they mean the process is already gone.
pub async fn stop(mut handle: ServerHandle) {
    if let Ok(Some(status)) = handle.child.try_wait() {
        debug!("{} already exited with {}", handle.label, status);
        drain_tasks(handle).await;
        return;
    }

    #[cfg(unix)]
    if let Some(pid) = handle.child.id() {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
        match timeout(defaults::STOP_GRACE, handle.child.wait()).await {
            Ok(_) => {
                debug!("{} exited after SIGTERM", handle.label);
                drain_tasks(handle).await;
                return;
            }
            Err(_) => warn!(
                "{} did not exit within {:?}, killing",
                handle.label,
                defaults::STOP_GRACE
            ),
        }
    }

    let _ = handle.child.start_kill();
    let _ = handle.child.wait().await;
    debug!("{} killed", handle.label);
    drain_tasks(handle).await;
}

/// Let the pipe readers finish once the child is dead, so the process
/// leaves no dangling tasks behind.
async fn drain_tasks(handle: ServerHandle) {
    let _ = handle.stdout_task.await;
    let _ = handle.stderr_task.await;
}

/// Collect everything a child writes to one of its std streams.
///
/// Runs until the pipe closes (i.e. the child exits); losing a partial
/// read on a broken pipe is acceptable for diagnostics.
async fn drain<R>(mut reader: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::new();
    let _ = reader.read_to_end(&mut buf).await;
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_port_is_ephemeral() {
        let port = allocate_port().unwrap();
        assert!(port >= 1024);
    }

    #[test]
    fn test_allocate_port_can_be_rebound() {
        // The released port must be immediately usable by a server.
        let port = allocate_port().unwrap();
        let listener = TcpListener::bind((defaults::LOOPBACK_HOST, port));
        assert!(listener.is_ok());
    }

    #[tokio::test]
    async fn test_wait_ready_times_out_on_dead_port() {
        let port = allocate_port().unwrap();
        let ready = wait_ready(
            defaults::LOOPBACK_HOST,
            port,
            Duration::from_millis(300),
        )
        .await;
        assert!(!ready);
    }

    #[tokio::test]
    async fn test_wait_ready_sees_live_listener() {
        let listener = tokio::net::TcpListener::bind((defaults::LOOPBACK_HOST, 0))
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();
        let ready = wait_ready(defaults::LOOPBACK_HOST, port, Duration::from_secs(2)).await;
        assert!(ready);
        drop(listener);
    }
}
