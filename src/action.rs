//! Macro actions bound to key, dial and touch events
//!
//! An action is either an in-process callback or a shell command line.
//! Running an action never fails from the caller's point of view: errors
//! and panics are logged so one broken binding cannot take down the input
//! thread that dispatched it.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::process::{Command, Stdio};
use std::sync::Arc;

use macrodeck_transport::TouchPayload;
use tracing::{debug, error, warn};

/// Callback form of an action
pub type ActionFn<A> = Arc<dyn Fn(A) -> anyhow::Result<()> + Send + Sync>;

/// A bound macro action
///
/// `A` is the event value handed to callbacks: `()` for keys, the dial
/// value for dials, the touch payload for touch events. Shell commands
/// ignore it.
pub enum Action<A> {
    /// Invoked synchronously on the input thread; must not block
    Callback(ActionFn<A>),
    /// Spawned through the system shell, detached
    Shell(String),
}

/// Key press action
pub type KeyAction = Action<()>;
/// Dial push/turn action, receives the event value
pub type DialAction = Action<i32>;
/// Touch action, receives the touch position
pub type TouchAction = Action<TouchPayload>;

impl<A> Action<A> {
    /// Wrap a closure
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(A) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Action::Callback(Arc::new(f))
    }

    pub fn shell(command: impl Into<String>) -> Self {
        Action::Shell(command.into())
    }

    pub fn is_shell(&self) -> bool {
        matches!(self, Action::Shell(_))
    }

    /// Run the action with the event value
    pub fn run(&self, value: A) {
        match self {
            Action::Callback(f) => {
                match panic::catch_unwind(AssertUnwindSafe(|| f(value))) {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => warn!("Macro action failed: {:#}", e),
                    Err(_) => error!("Macro action panicked"),
                }
            }
            Action::Shell(command) => spawn_shell(command),
        }
    }
}

fn shell_command(command: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    }
    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

/// Fire-and-forget; the exit status is only logged
fn spawn_shell(command: &str) {
    let child = shell_command(command)
        .stdin(Stdio::null())
        .spawn();
    let mut child = match child {
        Ok(child) => child,
        Err(e) => {
            warn!("Failed to spawn macro command {:?}: {}", command, e);
            return;
        }
    };
    debug!("Spawned macro command {:?} (pid {})", command, child.id());

    // Reap the child so it does not linger as a zombie
    let command = command.to_string();
    let reaper = std::thread::Builder::new()
        .name("macro-reaper".into())
        .spawn(move || match child.wait() {
            Ok(status) if !status.success() => {
                debug!("Macro command {:?} exited with {}", command, status)
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to wait for macro command {:?}: {}", command, e),
        });
    if let Err(e) = reaper {
        warn!("Failed to spawn reaper thread: {}", e);
    }
}

impl<A> Clone for Action<A> {
    fn clone(&self) -> Self {
        match self {
            Action::Callback(f) => Action::Callback(Arc::clone(f)),
            Action::Shell(s) => Action::Shell(s.clone()),
        }
    }
}

/// Callbacks compare by identity, shell commands by text
impl<A> PartialEq for Action<A> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Action::Callback(a), Action::Callback(b)) => Arc::ptr_eq(a, b),
            (Action::Shell(a), Action::Shell(b)) => a == b,
            _ => false,
        }
    }
}

impl<A> fmt::Debug for Action<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Callback(cb) => write!(f, "Callback({:p})", Arc::as_ptr(cb)),
            Action::Shell(s) => f.debug_tuple("Shell").field(s).finish(),
        }
    }
}

impl<A> From<&str> for Action<A> {
    fn from(command: &str) -> Self {
        Action::Shell(command.to_string())
    }
}

impl<A> From<String> for Action<A> {
    fn from(command: String) -> Self {
        Action::Shell(command)
    }
}
