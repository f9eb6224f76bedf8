//! Identity probes for the running process and its host.

use std::env;
use std::path::Path;

/// Used when argv is empty or carries no file-name component.
const FALLBACK_PROGRAM_NAME: &str = "drover";

/// Returns the base name of the invoking executable.
pub fn program_name() -> String {
    env::args()
        .next()
        .and_then(|arg0| {
            Path::new(&arg0)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| FALLBACK_PROGRAM_NAME.to_string())
}

/// Returns the machine hostname with any domain suffix removed.
#[cfg(unix)]
pub fn short_hostname() -> String {
    let name = nix::unistd::gethostname().unwrap_or_default();
    truncate_domain(&name.to_string_lossy()).to_string()
}

/// Returns the machine hostname with any domain suffix removed.
#[cfg(not(unix))]
pub fn short_hostname() -> String {
    let name = env::var("COMPUTERNAME").unwrap_or_default();
    truncate_domain(&name).to_string()
}

/// Everything before the first '.', or the whole name when there is none.
fn truncate_domain(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
