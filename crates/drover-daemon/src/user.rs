//! Run-as user resolution.
//!
//! Platforms without a user database cannot resolve names at all; that
//! case is reported distinctly from an unknown user so callers can
//! decide whether to hard-fail or skip privilege dropping.

use crate::error::DaemonError;

/// Group id assigned to files created on behalf of a resolved user.
pub const DEFAULT_PID_FILE_GID: u32 = 1;

/// Resolve a user name to its numeric uid.
#[cfg(unix)]
pub fn resolve_user(name: &str) -> Result<u32, DaemonError> {
    use nix::unistd::User;

    match User::from_name(name) {
        Ok(Some(user)) => Ok(user.uid.as_raw()),
        Ok(None) => Err(DaemonError::UnknownUser(name.to_string())),
        Err(errno) => Err(DaemonError::UserLookup {
            name: name.to_string(),
            reason: errno.to_string(),
        }),
    }
}

/// Resolve a user name to its numeric uid.
#[cfg(not(unix))]
pub fn resolve_user(_name: &str) -> Result<u32, DaemonError> {
    Err(DaemonError::UserLookupUnsupported)
}
