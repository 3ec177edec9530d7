//! Locating the Windows host from inside WSL.

use std::path::Path;

use crate::platform::command_stdout;

const WSL_INTEROP: &str = "/proc/sys/fs/binfmt_misc/WSLInterop";
const PROC_VERSION: &str = "/proc/version";
const WSL_CONF: &str = "/etc/wsl.conf";
const RESOLV_CONF: &str = "/etc/resolv.conf";

const LOCALHOST: &str = "localhost";

/// Returns true when running under Windows Subsystem for Linux.
#[must_use]
pub fn is_wsl() -> bool {
    Path::new(WSL_INTEROP).exists()
        || std::fs::read_to_string(PROC_VERSION)
            .is_ok_and(|version| version.to_lowercase().contains("microsoft"))
}

/// What `ip route show default` says about the default route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultRoute {
    /// A usable gateway address.
    Gateway(String),
    /// No gateway at all, which means mirrored networking.
    NoGateway,
    /// A gateway that cannot be the Windows host (loopback).
    Unusable,
}

/// Parses the output of `ip route show default`.
#[must_use]
pub fn parse_default_gateway(output: &str) -> DefaultRoute {
    let mut words = output.split_whitespace();
    if !words.any(|w| w == "via") {
        return DefaultRoute::NoGateway;
    }
    match words.next() {
        Some(ip) if !ip.starts_with("127.") => DefaultRoute::Gateway(ip.to_string()),
        _ => DefaultRoute::Unusable,
    }
}

/// Returns the first non-loopback `nameserver` in a resolv.conf.
#[must_use]
pub fn parse_nameserver(resolv_conf: &str) -> Option<String> {
    resolv_conf
        .lines()
        .filter_map(|line| line.strip_prefix("nameserver"))
        .filter_map(|rest| rest.split_whitespace().next())
        .find(|ip| !ip.starts_with("127."))
        .map(str::to_string)
}

/// Returns true if a wsl.conf enables mirrored networking.
#[must_use]
pub fn wsl_conf_is_mirrored(wsl_conf: &str) -> bool {
    let lower = wsl_conf.to_lowercase();
    lower.contains("networkingmode") && lower.contains("mirrored")
}

/// Finds the address of the machine running FreeCAD.
///
/// An explicit override wins. Outside WSL FreeCAD is local. Inside WSL,
/// mirrored networking also means local; otherwise the default gateway or
/// the resolver address is the Windows host.
pub async fn detect_host(override_host: Option<&str>) -> String {
    if let Some(host) = override_host.filter(|h| !h.is_empty()) {
        return host.to_string();
    }
    if !is_wsl() {
        return LOCALHOST.to_string();
    }

    if std::fs::read_to_string(WSL_CONF).is_ok_and(|conf| wsl_conf_is_mirrored(&conf)) {
        tracing::info!("WSL mirrored networking; using localhost");
        return LOCALHOST.to_string();
    }

    if let Some(routes) = command_stdout("ip", &["route", "show", "default"]).await {
        match parse_default_gateway(&routes) {
            DefaultRoute::Gateway(ip) => {
                tracing::info!(host = %ip, "Using WSL default gateway as FreeCAD host");
                return ip;
            }
            DefaultRoute::NoGateway => {
                tracing::info!("No default gateway; assuming mirrored networking");
                return LOCALHOST.to_string();
            }
            DefaultRoute::Unusable => {}
        }
    }

    if let Some(ip) = std::fs::read_to_string(RESOLV_CONF)
        .ok()
        .and_then(|conf| parse_nameserver(&conf))
    {
        tracing::info!(host = %ip, "Using resolv.conf nameserver as FreeCAD host");
        return ip;
    }

    LOCALHOST.to_string()
}
