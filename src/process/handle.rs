//! # Process handle seam.
//!
//! The supervisor never launches processes itself. A collaborator hands it a
//! [`ProcessHandle`] that exposes:
//! - a process identifier (required at registration),
//! - optional stdout/stderr readers,
//! - a two-level stop control ([`ProcessControl`] + [`StopLevel`]),
//! - a lifecycle channel delivering exit and spawn-error notifications.
//!
//! ```text
//!  collaborator                         ProcessSupervisor
//!  ────────────                         ─────────────────
//!  ProcessHandle::spawn(cmd) ──► handle ──► register_process()
//!     └─ waiter task: child.wait() ──► LifecycleSender ──► exit observer
//!  ProcessHandle::new(pid, ctl) ──► (handle, LifecycleSender)   (synthetic)
//! ```
//!
//! ## Stop levels
//! | Level      | unix      | other platforms        |
//! |------------|-----------|------------------------|
//! | `Graceful` | `SIGTERM` | `Child::start_kill()`  |
//! | `Force`    | `SIGKILL` | `Child::start_kill()`  |

use std::io;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::AsyncRead;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Boxed output stream of a process.
pub type OutputReader = Pin<Box<dyn AsyncRead + Send>>;

/// Escalation level of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopLevel {
    /// Ask the process to exit (SIGTERM).
    Graceful,
    /// Kill the process (SIGKILL).
    Force,
}

/// Control surface of a running process.
pub trait ProcessControl: Send + Sync + 'static {
    /// Sends a stop request; returns whether delivery succeeded.
    fn signal(&self, level: StopLevel) -> bool;

    /// True once the process has reported exit.
    fn has_exited(&self) -> bool;
}

/// Lifecycle notification delivered by a handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    /// The process exited with a code and/or a terminating signal.
    Exited {
        code: Option<i32>,
        signal: Option<String>,
    },
    /// Spawn-level or wait failure.
    Error(String),
}

/// Producer side of a handle's lifecycle channel.
#[derive(Clone, Debug)]
pub struct LifecycleSender {
    tx: mpsc::UnboundedSender<Lifecycle>,
}

impl LifecycleSender {
    /// Reports exit; returns `false` if nobody observes the handle anymore.
    pub fn exited(&self, code: Option<i32>, signal: Option<String>) -> bool {
        self.tx.send(Lifecycle::Exited { code, signal }).is_ok()
    }

    /// Reports a spawn-level failure.
    pub fn error(&self, message: impl Into<String>) -> bool {
        self.tx.send(Lifecycle::Error(message.into())).is_ok()
    }
}

/// Everything the supervisor needs from a launched process.
pub struct ProcessHandle {
    pid: Option<u32>,
    stdout: Option<OutputReader>,
    stderr: Option<OutputReader>,
    control: Arc<dyn ProcessControl>,
    lifecycle: mpsc::UnboundedReceiver<Lifecycle>,
}

/// Handle decomposed for the supervisor's observers.
pub(crate) struct HandleParts {
    pub(crate) stdout: Option<OutputReader>,
    pub(crate) stderr: Option<OutputReader>,
    pub(crate) control: Arc<dyn ProcessControl>,
    pub(crate) lifecycle: mpsc::UnboundedReceiver<Lifecycle>,
}

impl ProcessHandle {
    /// Creates a handle around an arbitrary control surface.
    ///
    /// The returned [`LifecycleSender`] is how the owner reports exit or errors.
    pub fn new(pid: Option<u32>, control: Arc<dyn ProcessControl>) -> (Self, LifecycleSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = Self {
            pid,
            stdout: None,
            stderr: None,
            control,
            lifecycle: rx,
        };
        (handle, LifecycleSender { tx })
    }

    /// Attaches a stdout reader.
    pub fn with_stdout(mut self, reader: impl AsyncRead + Send + 'static) -> Self {
        self.stdout = Some(Box::pin(reader));
        self
    }

    /// Attaches a stderr reader.
    pub fn with_stderr(mut self, reader: impl AsyncRead + Send + 'static) -> Self {
        self.stderr = Some(Box::pin(reader));
        self
    }

    /// Launches `cmd` with piped stdout/stderr and wires a waiter task.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(cmd: &mut Command) -> io::Result<Self> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        let mut child = cmd.spawn()?;

        let pid = child.id();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let exited = Arc::new(AtomicBool::new(false));

        let (stop_tx, stop_rx) = mpsc::unbounded_channel();
        let control = ChildControl {
            exited: exited.clone(),
            stop_tx,
        };
        let waiter = wait_child(child, stop_rx);

        let (mut handle, sender) = Self::new(pid, Arc::new(control));
        handle.stdout = stdout.map(|s| Box::pin(s) as OutputReader);
        handle.stderr = stderr.map(|s| Box::pin(s) as OutputReader);

        tokio::spawn(async move {
            let outcome = waiter.await;
            exited.store(true, Ordering::SeqCst);
            match outcome {
                Ok(status) => {
                    let (code, signal) = describe(status);
                    debug!(?pid, ?code, ?signal, "child exited");
                    sender.exited(code, signal);
                }
                Err(e) => {
                    sender.error(format!("wait failed: {e}"));
                }
            }
        });

        Ok(handle)
    }

    /// Process identifier, if the process was actually launched.
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Shared control surface.
    pub fn control(&self) -> Arc<dyn ProcessControl> {
        self.control.clone()
    }

    pub(crate) fn into_parts(self) -> HandleParts {
        HandleParts {
            stdout: self.stdout,
            stderr: self.stderr,
            control: self.control,
            lifecycle: self.lifecycle,
        }
    }
}

impl std::fmt::Debug for ProcessHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessHandle")
            .field("pid", &self.pid)
            .field("stdout", &self.stdout.is_some())
            .field("stderr", &self.stderr.is_some())
            .finish()
    }
}

/// Control surface of a `tokio::process::Child`.
///
/// Stop requests are executed by the waiter task that owns the child, so a
/// signal only ever reaches a child that has not been reaped yet.
struct ChildControl {
    exited: Arc<AtomicBool>,
    stop_tx: mpsc::UnboundedSender<StopLevel>,
}

impl ProcessControl for ChildControl {
    fn signal(&self, level: StopLevel) -> bool {
        !self.has_exited() && self.stop_tx.send(level).is_ok()
    }

    fn has_exited(&self) -> bool {
        self.exited.load(Ordering::SeqCst)
    }
}

async fn wait_child(
    mut child: Child,
    mut stop_rx: mpsc::UnboundedReceiver<StopLevel>,
) -> io::Result<ExitStatus> {
    loop {
        let request = tokio::select! {
            status = child.wait() => return status,
            req = stop_rx.recv() => req,
        };
        match request {
            Some(level) => deliver(&mut child, level),
            None => return child.wait().await,
        }
    }
}

#[cfg(unix)]
fn deliver(child: &mut Child, level: StopLevel) {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    // `id()` is `None` once the child has been reaped.
    let Some(pid) = child.id().and_then(|p| i32::try_from(p).ok()) else {
        return;
    };
    let sig = match level {
        StopLevel::Graceful => Signal::SIGTERM,
        StopLevel::Force => Signal::SIGKILL,
    };
    if let Err(e) = kill(Pid::from_raw(pid), sig) {
        warn!(pid, ?level, error = %e, "stop signal not delivered");
    }
}

#[cfg(not(unix))]
fn deliver(child: &mut Child, level: StopLevel) {
    if let Err(e) = child.start_kill() {
        warn!(?level, error = %e, "stop request not delivered");
    }
}

/// Splits an exit status into `(code, signal name)`.
fn describe(status: ExitStatus) -> (Option<i32>, Option<String>) {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        (status.code(), status.signal().map(signal_name))
    }
    #[cfg(not(unix))]
    {
        (status.code(), None)
    }
}

#[cfg(unix)]
fn signal_name(signo: i32) -> String {
    nix::sys::signal::Signal::try_from(signo)
        .map(|s| s.as_str().to_string())
        .unwrap_or_else(|_| format!("SIG{signo}"))
}
