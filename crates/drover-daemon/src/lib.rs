//! # Drover Daemon
//!
//! Daemonization and signal-driven lifecycle control for long-running
//! consumer processes.
//!
//! ## Features
//!
//! - Process detachment (double fork, session leadership, PID file)
//! - Optional privilege dropping to a configured user
//! - Signal dispatch (SIGTERM shutdown, SIGHUP rehash, SIGUSR1 stack dump)
//! - Cooperative thread stack dumps for live diagnostics
//! - YAML configuration with legacy-spelling compatibility
//! - Logging backend construction (console, file or syslog sinks)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use drover_daemon::daemonize::{daemonize, DaemonRequest};
//! use drover_daemon::lifecycle::LifecycleController;
//! use drover_daemon::signal::install_signal_handlers;
//!
//! let detached = daemonize(DaemonRequest::new().run_as_user("drover"))?;
//! let controller = LifecycleController::new();
//! let _listener = install_signal_handlers(&controller)?;
//! controller.set_shutdown_handler({
//!     let controller = controller.clone();
//!     move || controller.set_running(false)
//! });
//! controller.set_running(true);
//! while controller.is_running() {
//!     // main loop
//! }
//! ```

pub mod config;
pub mod daemonize;
pub mod diagnostics;
pub mod error;
pub mod ident;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod signal;
pub mod user;

// Re-exports
pub use config::{load_config, Config};
pub use daemonize::{daemonize, DaemonRequest, Detached};
pub use error::{ConfigError, DaemonError, LoggingError, RegistryError};
pub use lifecycle::LifecycleController;
pub use logging::{setup_logging, LoggingConfig};
pub use registry::HandleRegistry;
pub use signal::{install_signal_handlers, LifecycleSignal, SignalListener};
