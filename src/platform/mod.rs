//! Host environment probing.
//!
//! The server frequently runs inside WSL while FreeCAD runs as a Windows GUI
//! application. This module finds the Windows host's address and rewrites
//! paths so that FreeCAD can open files the server names.

mod detect;
mod paths;

pub use detect::{
    detect_host, is_wsl, parse_default_gateway, parse_nameserver, wsl_conf_is_mirrored,
    DefaultRoute,
};
pub use paths::{expand_tilde, is_windows_path, windows_temp_path, wsl_to_windows_path};

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;

/// Upper bound for helper processes such as `wslpath`.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Runs a helper program and returns its trimmed stdout on success.
///
/// A missing program, a non-zero exit or a timeout all yield `None`.
async fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).kill_on_drop(true).output();
    match tokio::time::timeout(PROBE_TIMEOUT, output).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(Ok(output)) => {
            tracing::debug!(program, status = %output.status, "Helper exited with failure");
            None
        }
        Ok(Err(e)) => {
            tracing::debug!(program, error = %e, "Helper could not be started");
            None
        }
        Err(_) => {
            tracing::warn!(program, "Helper timed out");
            None
        }
    }
}

/// Finds an executable on `PATH`.
#[must_use]
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}
