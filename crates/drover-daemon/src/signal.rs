//! Signal dispatch.
//!
//! Exactly three signals are intercepted: SIGTERM (graceful shutdown),
//! SIGHUP (configuration rehash) and SIGUSR1 (stack dump). Deliveries
//! are consumed on a dedicated thread, one at a time; a callback runs
//! to completion there before the next signal is taken, so the handler
//! never overlaps with itself.

use std::fmt;

use tracing::{debug, info};

use crate::diagnostics;
use crate::error::DaemonError;
use crate::lifecycle::LifecycleController;

#[cfg(unix)]
use signal_hook::consts::{SIGHUP, SIGTERM, SIGUSR1};

/// The closed set of lifecycle actions a delivered signal maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleSignal {
    /// Graceful shutdown request (SIGTERM).
    Terminate,
    /// Configuration rehash request (SIGHUP).
    Rehash,
    /// Stack dump request (SIGUSR1).
    Diagnostic,
}

impl fmt::Display for LifecycleSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleSignal::Terminate => write!(f, "SIGTERM"),
            LifecycleSignal::Rehash => write!(f, "SIGHUP"),
            LifecycleSignal::Diagnostic => write!(f, "SIGUSR1"),
        }
    }
}

/// Classify a raw signal number into a lifecycle action.
#[cfg(unix)]
pub fn classify(signum: i32) -> Option<LifecycleSignal> {
    match signum {
        SIGTERM => Some(LifecycleSignal::Terminate),
        SIGHUP => Some(LifecycleSignal::Rehash),
        SIGUSR1 => Some(LifecycleSignal::Diagnostic),
        _ => None,
    }
}

/// Run the action for one delivered signal.
///
/// TERMINATE and REHASH invoke the registered callback synchronously,
/// or log a no-op when the slot is empty. DIAGNOSTIC always dumps the
/// live thread stacks and never touches user callbacks.
pub fn dispatch(controller: &LifecycleController, kind: LifecycleSignal) {
    info!("Signal received: {}", kind);
    match kind {
        LifecycleSignal::Terminate => match controller.shutdown_handler() {
            Some(handler) => {
                debug!("Calling shutdown handler");
                handler();
            }
            None => info!("No shutdown handler registered"),
        },
        LifecycleSignal::Rehash => match controller.rehash_handler() {
            Some(handler) => {
                debug!("Calling rehash handler");
                handler();
            }
            None => info!("No rehash handler registered"),
        },
        LifecycleSignal::Diagnostic => diagnostics::dump_all_stacks(),
    }
}

/// Install the OS signal handlers and start the dispatch thread.
///
/// Call once at startup, after daemonizing and before entering the main
/// loop. The returned listener keeps the dispatch thread alive.
#[cfg(unix)]
pub fn install_signal_handlers(
    controller: &LifecycleController,
) -> Result<SignalListener, DaemonError> {
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGTERM, SIGHUP, SIGUSR1])
        .map_err(|e| DaemonError::SignalSetup(e.to_string()))?;
    let handle = signals.handle();
    let controller = controller.clone();

    let thread = std::thread::Builder::new()
        .name("signal-dispatch".to_string())
        .spawn(move || {
            for signum in signals.forever() {
                match classify(signum) {
                    Some(kind) => dispatch(&controller, kind),
                    None => info!("No valid signal handler defined: {}", signum),
                }
            }
        })
        .map_err(|e| DaemonError::SignalSetup(format!("failed to spawn dispatch thread: {e}")))?;

    info!("Signal handlers installed for PID {}", std::process::id());
    Ok(SignalListener {
        handle,
        thread: Some(thread),
    })
}

/// Install the OS signal handlers (non-Unix fallback).
#[cfg(not(unix))]
pub fn install_signal_handlers(
    _controller: &LifecycleController,
) -> Result<SignalListener, DaemonError> {
    Err(DaemonError::SignalSetup(
        "signal dispatch is not supported on this platform".to_string(),
    ))
}

/// Keeps the dispatch thread alive; closing or dropping it detaches the
/// handlers and joins the thread.
#[cfg(unix)]
pub struct SignalListener {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalListener {
    /// Stop consuming signals and join the dispatch thread.
    pub fn close(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[cfg(unix)]
impl Drop for SignalListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Keeps the dispatch thread alive (non-Unix fallback).
#[cfg(not(unix))]
pub struct SignalListener {}

#[cfg(not(unix))]
impl SignalListener {
    /// Stop consuming signals.
    pub fn close(self) {}
}
