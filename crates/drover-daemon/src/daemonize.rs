//! Process detachment.
//!
//! [`daemonize`] performs the classic double fork: the invoking process
//! exits as soon as the first fork succeeds, an intermediate process
//! records the grandchild's pid on disk and exits, and only the
//! detached grandchild ever returns. A successful return therefore
//! means "you are now the daemon"; there is no parent branch a caller
//! could mishandle.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use std::process::exit;

use tracing::{debug, error, info};

use crate::error::DaemonError;
use crate::ident::program_name;

#[cfg(unix)]
use crate::user::{resolve_user, DEFAULT_PID_FILE_GID};

/// Input to [`daemonize`]; consumed once.
#[derive(Debug, Clone, Default)]
pub struct DaemonRequest {
    pid_file: Option<PathBuf>,
    run_as_user: Option<String>,
}

impl DaemonRequest {
    /// Creates a request with no PID file override and no run-as user.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets an explicit PID file path instead of the derived default.
    pub fn pid_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.pid_file = Some(path.into());
        self
    }

    /// Sets the user the daemon should run as.
    pub fn run_as_user(mut self, name: &str) -> Self {
        self.run_as_user = Some(name.to_string());
        self
    }

    /// The configured PID file override, if any.
    pub fn pid_file_path(&self) -> Option<&Path> {
        self.pid_file.as_deref()
    }

    /// The configured run-as user, if any.
    pub fn user(&self) -> Option<&str> {
        self.run_as_user.as_deref()
    }
}

/// Proof that the calling process is the detached grandchild.
#[derive(Debug)]
pub struct Detached {
    pid_file: PathBuf,
}

impl Detached {
    /// The PID file recorded for this process.
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }
}

/// Default PID file location for a daemon with the given pid.
pub fn default_pid_path(pid: u32) -> PathBuf {
    std::env::temp_dir().join(format!("{}-{}.pid", program_name(), pid))
}

fn pid_file_err(path: &Path, reason: impl std::fmt::Display) -> DaemonError {
    DaemonError::PidFileWrite {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Write `pid` into the PID file as a single newline-terminated line,
/// handing ownership to `owner_uid` when one was resolved.
pub(crate) fn write_pid_record(
    path: &Path,
    pid: u32,
    owner_uid: Option<u32>,
) -> Result<(), DaemonError> {
    let mut file = File::create(path).map_err(|e| pid_file_err(path, e))?;
    writeln!(file, "{pid}").map_err(|e| pid_file_err(path, e))?;

    #[cfg(unix)]
    if let Some(uid) = owner_uid {
        use nix::unistd::{fchown, Gid, Uid};
        use std::os::fd::AsRawFd;

        fchown(
            file.as_raw_fd(),
            Some(Uid::from_raw(uid)),
            Some(Gid::from_raw(DEFAULT_PID_FILE_GID)),
        )
        .map_err(|e| pid_file_err(path, format_args!("chown failed: {e}")))?;
    }

    #[cfg(not(unix))]
    let _ = owner_uid;

    Ok(())
}

/// Detach the current process from its terminal and session.
///
/// Fatal steps: user resolution, both forks, the PID file write (and
/// its ownership handoff), session creation, and the stream
/// redirection. Switching the effective uid afterwards is best effort;
/// on failure the daemon keeps running under its original privileges.
#[cfg(unix)]
pub fn daemonize(request: DaemonRequest) -> Result<Detached, DaemonError> {
    use nix::unistd::{chdir, fork, setsid, ForkResult, Uid};

    // Control of the standard streams is about to be severed; whatever
    // the parent buffered goes out now.
    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    let uid = match request.run_as_user.as_deref() {
        Some(name) => Some(resolve_user(name)?),
        None => None,
    };

    // First fork: the invoking process is done as soon as it succeeds.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => return Err(DaemonError::ForkFailed(e.to_string())),
    }

    // The grandchild must not run ahead of the PID file, so the
    // intermediate process reports the write outcome over a pipe.
    let (handshake_rx, handshake_tx) =
        nix::unistd::pipe().map_err(|e| DaemonError::Io(io::Error::from(e)))?;
    let mut handshake_rx = File::from(handshake_rx);
    let mut handshake_tx = File::from(handshake_tx);

    // Second fork: decouples the daemon from the first child's session
    // so it can never reacquire a controlling terminal.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { child }) => {
            drop(handshake_rx);
            let pid = child.as_raw() as u32;
            let path = request
                .pid_file
                .clone()
                .unwrap_or_else(|| default_pid_path(pid));
            let status = match write_pid_record(&path, pid, uid) {
                Ok(()) => {
                    debug!("PID file recorded at {}", path.display());
                    let _ = handshake_tx.write_all(b"+");
                    0
                }
                Err(e) => {
                    error!("Could not record the PID file: {}", e);
                    let _ = handshake_tx.write_all(b"-");
                    1
                }
            };
            let _ = handshake_tx.flush();
            exit(status);
        }
        Ok(ForkResult::Child) => {}
        Err(e) => return Err(DaemonError::ForkFailed(e.to_string())),
    }

    drop(handshake_tx);
    let mut outcome = [0u8; 1];
    let confirmed = handshake_rx.read_exact(&mut outcome).is_ok() && outcome[0] == b'+';
    drop(handshake_rx);
    if !confirmed {
        return Err(DaemonError::DetachAborted);
    }

    let pid = std::process::id();
    let pid_file = request.pid_file.unwrap_or_else(|| default_pid_path(pid));

    // Detach from the parent environment: never hold an unmount hostage,
    // create files unmasked, lead a fresh session.
    chdir("/").map_err(|e| DaemonError::Io(io::Error::from(e)))?;
    unsafe { libc::umask(0) };
    setsid().map_err(|e| DaemonError::SessionFailed(e.to_string()))?;

    redirect_standard_streams()?;

    if let Some(uid) = uid {
        let target = Uid::from_raw(uid);
        if target != nix::unistd::geteuid() {
            match nix::unistd::seteuid(target) {
                Ok(()) => debug!("Effective uid changed to {}", uid),
                Err(e) => error!("Could not set the user: {}", e),
            }
        }
    }

    info!(pid, pid_file = %pid_file.display(), "Process detached");
    Ok(Detached { pid_file })
}

/// Detach the current process from its terminal and session.
#[cfg(not(unix))]
pub fn daemonize(_request: DaemonRequest) -> Result<Detached, DaemonError> {
    Err(DaemonError::Unsupported)
}

/// Point stdin, stdout and stderr at the null device, each through its
/// own descriptor so no inherited terminal fd stays reachable.
#[cfg(unix)]
fn redirect_standard_streams() -> Result<(), DaemonError> {
    use nix::unistd::dup2;
    use std::fs::OpenOptions;
    use std::os::fd::AsRawFd;

    fn open_err(e: io::Error) -> DaemonError {
        DaemonError::StreamRedirect(e.to_string())
    }
    fn dup_err(e: nix::Error) -> DaemonError {
        DaemonError::StreamRedirect(e.to_string())
    }

    let stdin = File::open("/dev/null").map_err(open_err)?;
    let stdout = OpenOptions::new()
        .append(true)
        .open("/dev/null")
        .map_err(open_err)?;
    let stderr = OpenOptions::new()
        .append(true)
        .open("/dev/null")
        .map_err(open_err)?;

    dup2(stdin.as_raw_fd(), libc::STDIN_FILENO).map_err(dup_err)?;
    dup2(stdout.as_raw_fd(), libc::STDOUT_FILENO).map_err(dup_err)?;
    dup2(stderr.as_raw_fd(), libc::STDERR_FILENO).map_err(dup_err)?;

    Ok(())
}

#[cfg(test)]
#[path = "daemonize_tests.rs"]
mod tests;
