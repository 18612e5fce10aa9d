//! Volume normalization
//!
//! User-facing volume entries are either mounts (`source:target`) or bare
//! markers (`source` alone, excluding a path from the project auto-mount).
//! Normalization turns them into runtime-ready mounts: relative sources are
//! expanded, bare mount sources become managed named volumes namespaced by
//! the owning identity, and the runtime-socket bind is stripped out (socket
//! sharing is controlled by its own flag, never by a volume entry).

use std::path::{Path, PathBuf};

use crate::error::{FdevcError, Result};
use crate::identity::{EnvId, IDENTITY_PREFIX};
use crate::store::paths;

/// Bind path of the runtime control socket.
pub const RUNTIME_SOCKET: &str = "/var/run/docker.sock";

/// One volume entry as the user (or the store) wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeSpec {
    Mount { source: String, target: String },
    Marker(String),
}

impl VolumeSpec {
    pub fn parse(spec: &str) -> Result<VolumeSpec> {
        let mut parts = spec.split(':');
        let source = parts.next().unwrap_or_default();
        let target = parts.next();
        if source.is_empty() || parts.next().is_some() {
            return Err(FdevcError::ConfigInvalid(format!(
                "invalid volume spec '{}' (expected SOURCE or SOURCE:TARGET)",
                spec
            )));
        }
        Ok(match target {
            Some(t) if t.is_empty() => {
                return Err(FdevcError::ConfigInvalid(format!(
                    "invalid volume spec '{}' (empty target)",
                    spec
                )))
            }
            Some(t) => VolumeSpec::Mount {
                source: source.to_string(),
                target: t.to_string(),
            },
            None => VolumeSpec::Marker(source.to_string()),
        })
    }

    pub fn to_spec_string(&self) -> String {
        match self {
            VolumeSpec::Mount { source, target } => format!("{}:{}", source, target),
            VolumeSpec::Marker(source) => source.clone(),
        }
    }

    fn names_the_socket(&self) -> bool {
        match self {
            VolumeSpec::Mount { source, target } => {
                source == RUNTIME_SOCKET || target == RUNTIME_SOCKET
            }
            VolumeSpec::Marker(source) => source == RUNTIME_SOCKET,
        }
    }
}

/// A mount ready to hand to the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedVolume {
    pub source: String,
    pub target: String,
    /// Named volume managed by the runtime, as opposed to a host bind.
    pub managed: bool,
    /// Managed volumes mount as an empty root; the target directory is
    /// created inside the environment after start.
    pub precreate_target: bool,
}

/// Outcome of normalization: runtime mounts, exclusion markers, warnings.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct NormalizedVolumes {
    pub mounts: Vec<NormalizedVolume>,
    /// Bare markers: project-relative paths shadowed by anonymous volumes.
    pub excluded: Vec<String>,
    pub warnings: Vec<String>,
}

/// Normalize merged volume specs for one environment.
///
/// Total over every legal spec: absolute sources pass through, relative
/// sources expand against the project path (or `cwd` without one), bare
/// tokens become `<identity>.<token>` managed volumes.
pub fn normalize(
    specs: &[VolumeSpec],
    identity: &EnvId,
    project_path: Option<&Path>,
    cwd: &Path,
) -> NormalizedVolumes {
    let mut out = NormalizedVolumes::default();
    for spec in specs {
        if spec.names_the_socket() {
            out.warnings.push(format!(
                "volume entry '{}' is controlled by the socket flag; ignoring it",
                spec.to_spec_string()
            ));
            continue;
        }
        match spec {
            VolumeSpec::Mount { source, target } => {
                let (source, managed) = normalize_source(source, identity, project_path, cwd);
                out.mounts.push(NormalizedVolume {
                    source,
                    target: target.clone(),
                    managed,
                    precreate_target: managed,
                });
            }
            VolumeSpec::Marker(source) => out.excluded.push(source.clone()),
        }
    }
    out
}

fn normalize_source(
    source: &str,
    identity: &EnvId,
    project_path: Option<&Path>,
    cwd: &Path,
) -> (String, bool) {
    if source.starts_with('/') {
        return (source.to_string(), false);
    }
    if source.contains('/') {
        let base = project_path.unwrap_or(cwd);
        let joined = base.join(source.strip_prefix("./").unwrap_or(source));
        return (normalize_dots(&joined), false);
    }
    if source.starts_with(IDENTITY_PREFIX) {
        return (source.to_string(), true);
    }
    (format!("{}.{}", identity.as_str(), source), true)
}

/// Lexically resolve `.` and `..` components (the path need not exist).
fn normalize_dots(path: &Path) -> String {
    let mut parts: Vec<std::ffi::OsString> = Vec::new();
    for comp in path.components() {
        match comp {
            std::path::Component::CurDir => {}
            std::path::Component::ParentDir => {
                parts.pop();
            }
            other => parts.push(other.as_os_str().to_os_string()),
        }
    }
    let mut out = PathBuf::new();
    for part in parts {
        out.push(part);
    }
    out.to_string_lossy().to_string()
}

/// Collapse merged specs into their storable form: mounts first, then bare
/// markers, host paths in portable form, socket binds dropped.
pub fn collapse(
    specs: &[VolumeSpec],
    project_root: Option<&Path>,
    home: Option<&Path>,
) -> Vec<String> {
    let mut mounts = Vec::new();
    let mut markers = Vec::new();
    for spec in specs {
        if spec.names_the_socket() {
            continue;
        }
        match spec {
            VolumeSpec::Mount { source, target } => {
                let source = collapse_source(source, project_root, home);
                mounts.push(format!("{}:{}", source, target));
            }
            VolumeSpec::Marker(source) => markers.push(source.clone()),
        }
    }
    mounts.extend(markers);
    mounts
}

fn collapse_source(source: &str, project_root: Option<&Path>, home: Option<&Path>) -> String {
    if source.starts_with('/') {
        return paths::collapse(Path::new(source), project_root, home);
    }
    if source.contains('/') {
        if let Some(root) = project_root {
            let joined = root.join(source.strip_prefix("./").unwrap_or(source));
            return paths::collapse(Path::new(&normalize_dots(&joined)), project_root, home);
        }
    }
    source.to_string()
}

/// Parse stored spec strings back into concrete specs.
pub fn expand(
    stored: &[String],
    project_root: Option<&Path>,
    home: Option<&Path>,
) -> Result<Vec<VolumeSpec>> {
    stored
        .iter()
        .map(|s| {
            let spec = VolumeSpec::parse(s)?;
            Ok(match spec {
                VolumeSpec::Mount { source, target } => VolumeSpec::Mount {
                    source: paths::expand(&source, project_root, home)
                        .to_string_lossy()
                        .to_string(),
                    target,
                },
                marker => marker,
            })
        })
        .collect()
}
