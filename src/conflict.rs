//! Port-conflict diagnostics
//!
//! Best-effort attribution for failed create/start attempts: recognize the
//! known "address in use" phrasings, pull the host port out of the error
//! text, and name the existing container publishing that port. Heuristic by
//! design; when nothing matches, the raw runtime error stands on its own.

use std::sync::OnceLock;

use regex::Regex;

use crate::runtime::ContainerInfo;

/// What blocked a create/start, as far as the error text reveals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    pub port: Option<u16>,
    /// Identity of the container already publishing the port.
    pub holder: Option<String>,
}

impl std::fmt::Display for Conflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.port, &self.holder) {
            (Some(port), Some(holder)) => write!(
                f,
                "port {} is already taken by '{}' (stop it or pick another port)",
                port, holder
            ),
            (Some(port), None) => write!(
                f,
                "port {} is already in use by another process",
                port
            ),
            _ => write!(f, "another process is already using the requested address"),
        }
    }
}

/// Ordered candidate patterns for the conflicting host port; first match
/// wins. Docker and podman phrase these differently across versions.
fn port_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // Bind for 0.0.0.0:8080 failed: port is already allocated
            r"(?i)bind for \S*?:(\d+)\s+failed",
            // listen tcp4 0.0.0.0:8080: bind: address already in use
            r"(?i):(\d+): bind: address already in use",
            // rootlesskit: listen tcp :::8080: address already in use
            r"(?i):(\d+): address already in use",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

fn host_port_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    // host port in a ps PORTS column: "0.0.0.0:8080->8080/tcp"
    PATTERN.get_or_init(|| Regex::new(r"(\d+)->").ok()).as_ref()
}

fn is_conflict(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("port is already allocated")
        || lower.contains("bind: address already in use")
        || lower.contains("address already in use")
}

fn extract_port(text: &str) -> Option<u16> {
    for pattern in port_patterns() {
        if let Some(captures) = pattern.captures(text) {
            if let Some(port) = captures.get(1).and_then(|m| m.as_str().parse().ok()) {
                return Some(port);
            }
        }
    }
    None
}

/// Does this container publish `port` on the host?
fn publishes(info: &ContainerInfo, port: u16) -> bool {
    match host_port_pattern() {
        Some(pattern) => pattern
            .captures_iter(&info.ports)
            .filter_map(|c| c.get(1))
            .any(|m| m.as_str().parse() == Ok(port)),
        None => false,
    }
}

/// Diagnose a failed transition from its error text and the live listing.
pub fn diagnose(error_text: &str, listing: &[ContainerInfo]) -> Option<Conflict> {
    if !is_conflict(error_text) {
        return None;
    }
    let port = extract_port(error_text);
    let holder = port.and_then(|p| {
        listing
            .iter()
            .find(|info| publishes(info, p))
            .map(|info| info.name.clone())
    });
    Some(Conflict { port, holder })
}
