//! Point-in-time stack dumps of live threads.
//!
//! Rust has no runtime-level thread enumeration, so participating
//! threads register themselves when they start. A dump pokes each
//! registered thread with an internal capture signal; the poked thread
//! captures its own backtrace and hands it back over a channel. A
//! thread that never answers is skipped, so the dump as a whole always
//! completes.

use std::backtrace::Backtrace;

use tracing::info;

#[cfg(unix)]
use std::sync::mpsc::SyncSender;
#[cfg(unix)]
use std::time::Duration;

#[cfg(unix)]
use nix::sys::pthread::{pthread_kill, pthread_self, Pthread};
#[cfg(unix)]
use nix::sys::signal::Signal;
#[cfg(unix)]
use once_cell::sync::Lazy;
#[cfg(unix)]
use parking_lot::Mutex;
#[cfg(unix)]
use tracing::debug;

/// One thread's captured stack.
#[derive(Debug)]
pub struct ThreadStack {
    name: String,
    backtrace: String,
}

impl ThreadStack {
    /// The name the thread registered under (or carries natively).
    pub fn thread_name(&self) -> &str {
        &self.name
    }

    /// Frame lines, top of stack first. Frames the runtime cannot
    /// resolve to a source location keep only their function entry.
    pub fn frames(&self) -> impl Iterator<Item = &str> {
        self.backtrace
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.is_empty())
    }
}

fn current_thread_name() -> String {
    std::thread::current()
        .name()
        .unwrap_or("<unnamed>")
        .to_string()
}

#[cfg(unix)]
const CAPTURE_SIGNAL: i32 = libc::SIGPROF;

#[cfg(unix)]
const CAPTURE_TIMEOUT: Duration = Duration::from_millis(500);

/// Registered threads, in registration order.
#[cfg(unix)]
static REGISTRY: Lazy<Mutex<Vec<(String, Pthread)>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Reply channel for in-flight capture requests.
#[cfg(unix)]
static REPLY: Lazy<Mutex<Option<SyncSender<ThreadStack>>>> = Lazy::new(|| Mutex::new(None));

/// Serializes whole dumps; concurrent requests would stomp on [`REPLY`].
#[cfg(unix)]
static DUMP_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[cfg(unix)]
static CAPTURE_HANDLER: Lazy<()> = Lazy::new(|| {
    // SAFETY: formatting a backtrace allocates, which is not strictly
    // async-signal-safe. The capture signal is only ever raised by a
    // dump request against a registered thread, never by the kernel,
    // and a lost or garbled capture degrades the dump, not the daemon.
    unsafe {
        if let Err(e) = signal_hook::low_level::register(CAPTURE_SIGNAL, capture_current_stack) {
            tracing::warn!("Could not register the stack capture handler: {}", e);
        }
    }
});

#[cfg(unix)]
fn capture_current_stack() {
    let reply = match REPLY.try_lock() {
        Some(guard) => guard.clone(),
        None => None,
    };
    if let Some(tx) = reply {
        let _ = tx.try_send(ThreadStack {
            name: current_thread_name(),
            backtrace: Backtrace::force_capture().to_string(),
        });
    }
}

/// Make the calling thread visible to stack dumps.
///
/// Re-registering under a new name replaces the previous entry.
#[cfg(unix)]
pub fn register_current_thread(name: &str) {
    Lazy::force(&CAPTURE_HANDLER);
    let thread = pthread_self();
    let mut registry = REGISTRY.lock();
    registry.retain(|(_, t)| *t != thread);
    registry.push((name.to_string(), thread));
    debug!("Thread {} registered for stack dumps", name);
}

/// Remove the calling thread from the dump registry. Call before the
/// thread exits; a stale entry costs a capture timeout per dump.
#[cfg(unix)]
pub fn deregister_current_thread() {
    let thread = pthread_self();
    REGISTRY.lock().retain(|(_, t)| *t != thread);
}

/// Capture the stack of the calling thread and of every registered
/// thread that answers in time.
#[cfg(unix)]
pub fn capture_all_stacks() -> Vec<ThreadStack> {
    use std::sync::mpsc::sync_channel;

    Lazy::force(&CAPTURE_HANDLER);
    let _dump = DUMP_LOCK.lock();

    let own = pthread_self();
    let targets: Vec<(String, Pthread)> = REGISTRY
        .lock()
        .iter()
        .filter(|(_, t)| *t != own)
        .cloned()
        .collect();

    let mut stacks = Vec::with_capacity(targets.len() + 1);

    // The dumping thread reads its own stack directly.
    stacks.push(ThreadStack {
        name: current_thread_name(),
        backtrace: Backtrace::force_capture().to_string(),
    });

    let (tx, rx) = sync_channel(targets.len().max(1));
    *REPLY.lock() = Some(tx);
    for (name, thread) in &targets {
        if pthread_kill(*thread, Signal::SIGPROF).is_err() {
            // The thread is already gone; a stale registration.
            continue;
        }
        match rx.recv_timeout(CAPTURE_TIMEOUT) {
            Ok(stack) => stacks.push(stack),
            Err(_) => info!("Thread {} did not answer the stack dump request", name),
        }
    }
    *REPLY.lock() = None;

    stacks
}

/// Make the calling thread visible to stack dumps (non-Unix fallback).
#[cfg(not(unix))]
pub fn register_current_thread(_name: &str) {}

/// Remove the calling thread from the dump registry (non-Unix
/// fallback).
#[cfg(not(unix))]
pub fn deregister_current_thread() {}

/// Capture the stack of the calling thread; other threads cannot be
/// reached without the capture signal (non-Unix fallback).
#[cfg(not(unix))]
pub fn capture_all_stacks() -> Vec<ThreadStack> {
    vec![ThreadStack {
        name: current_thread_name(),
        backtrace: Backtrace::force_capture().to_string(),
    }]
}

/// Log every captured stack, one log line per frame.
pub fn dump_all_stacks() {
    for stack in capture_all_stacks() {
        info!("Stack for thread {}:", stack.thread_name());
        for frame in stack.frames() {
            info!("  {}", frame);
        }
    }
}

#[cfg(test)]
#[path = "diagnostics_tests.rs"]
mod tests;
