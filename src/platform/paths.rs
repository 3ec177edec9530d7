//! WSL to Windows path translation.

use crate::platform::{command_stdout, is_wsl};

/// Returns true for `X:\...`, `X:/...` and UNC paths.
#[must_use]
pub fn is_windows_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && (bytes[2] == b'\\' || bytes[2] == b'/');
    drive || path.starts_with(r"\\")
}

/// Expands a leading `~` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) => format!("{}{rest}", home.display()),
        None => path.to_string(),
    }
}

/// Maps `/tmp/<rest>` into the Windows temp directory.
///
/// Returns `None` for paths outside `/tmp` or an unexpanded `%TEMP%`.
#[must_use]
pub fn windows_temp_path(path: &str, windows_temp: &str, forward_slashes: bool) -> Option<String> {
    let rest = path.strip_prefix("/tmp/")?;
    let temp = windows_temp.trim();
    if temp.is_empty() || temp.starts_with('%') {
        return None;
    }
    if forward_slashes {
        Some(format!("{}/{rest}", temp.replace('\\', "/")))
    } else {
        Some(format!("{temp}\\{}", rest.replace('/', "\\")))
    }
}

/// Translates a path so a Windows FreeCAD can use it.
///
/// Outside WSL, and for paths that are already Windows paths, the input is
/// returned unchanged. Inside WSL the path is converted with `wslpath`
/// (`-m` for forward slashes, `-w` for backslashes). If that fails, paths
/// under `/tmp` are mapped into `%TEMP%`; anything else is returned as is.
pub async fn wsl_to_windows_path(path: &str, forward_slashes: bool) -> String {
    if path.is_empty() || is_windows_path(path) || !is_wsl() {
        return path.to_string();
    }

    let expanded = expand_tilde(path);
    let flag = if forward_slashes { "-m" } else { "-w" };
    if let Some(converted) = command_stdout("wslpath", &[flag, &expanded]).await {
        if !converted.is_empty() {
            tracing::debug!(from = %path, to = %converted, "Translated path");
            return converted;
        }
    }

    if expanded.starts_with("/tmp/") {
        if let Some(temp) = command_stdout("cmd.exe", &["/c", "echo", "%TEMP%"]).await {
            if let Some(converted) = windows_temp_path(&expanded, &temp, forward_slashes) {
                tracing::debug!(from = %path, to = %converted, "Translated path via %TEMP%");
                return converted;
            }
        }
    }

    tracing::warn!(path, "Could not translate path for Windows");
    path.to_string()
}
