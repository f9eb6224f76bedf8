//! Lifecycle controller errors.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while detaching or wiring up signal delivery.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// The configured run-as user does not exist in the user database.
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// The user database could not be queried.
    #[error("User lookup for {name} failed: {reason}")]
    UserLookup { name: String, reason: String },

    /// This platform has no user database to resolve names against.
    #[error("User lookup is not supported on this platform")]
    UserLookupUnsupported,

    /// Process fork failed.
    #[error("Failed to fork process: {0}")]
    ForkFailed(String),

    /// The detached process could not become a session leader.
    #[error("Failed to create a new session: {0}")]
    SessionFailed(String),

    /// The PID file could not be written or handed to its owner.
    #[error("Failed to record PID file at {path:?}: {reason}")]
    PidFileWrite { path: PathBuf, reason: String },

    /// The intermediate process reported failure before the detached
    /// process was allowed to continue.
    #[error("Daemonization aborted: the PID file was not recorded")]
    DetachAborted,

    /// A standard stream could not be pointed at the null device.
    #[error("Failed to redirect standard streams: {0}")]
    StreamRedirect(String),

    /// Failed to set up signal handlers.
    #[error("Failed to set up signal handlers: {0}")]
    SignalSetup(String),

    /// Daemonization is not available on this platform.
    #[error("Daemonization is not supported on this platform")]
    Unsupported,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors raised while loading the YAML configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read from disk.
    #[error("Error when trying to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    /// The file is not valid YAML.
    #[error("Invalid configuration file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yml::Error,
    },

    /// The file parsed to nothing at all.
    #[error("Configuration file {0:?} is empty")]
    Empty(PathBuf),
}

/// Errors raised while building the logging backend.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// A global subscriber was installed before this one.
    #[error("A global logging subscriber is already installed")]
    AlreadyInitialized,
}

/// Errors raised by the consumer handle registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No handle was registered under the requested dotted name.
    #[error("Could not resolve {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_error() {
        let err = DaemonError::UnknownUser("nobody-here".to_string());
        let msg = err.to_string();
        assert!(msg.contains("Unknown user"));
        assert!(msg.contains("nobody-here"));
    }

    #[test]
    fn test_pid_file_write_error() {
        let err = DaemonError::PidFileWrite {
            path: PathBuf::from("/tmp/test.pid"),
            reason: "permission denied".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("test.pid"));
        assert!(msg.contains("permission denied"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let daemon_err: DaemonError = io_err.into();
        assert!(daemon_err.to_string().contains("file not found"));
    }

    #[test]
    fn test_config_read_error() {
        let err = ConfigError::Read {
            path: PathBuf::from("/etc/drover.yaml"),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("drover.yaml"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn test_registry_not_found_error() {
        let err = RegistryError::NotFound("app.consumers.Indexer".to_string());
        assert!(err.to_string().contains("app.consumers.Indexer"));
    }
}
