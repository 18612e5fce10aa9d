//! Configuration value types

use std::path::{Path, PathBuf};

use crate::error::{FdevcError, Result};
use crate::volume::VolumeSpec;

/// Base directory under which project trees are mounted in an environment.
pub const WORKSPACE_BASE: &str = "/workspace";

/// Three-state CLI override: not given, explicitly "none", or a value.
///
/// "None" and "not given" must stay distinct so an anonymous environment
/// (`Absent` project) never falls through to the stored or default tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Override<T> {
    #[default]
    Unset,
    Absent,
    Set(T),
}

impl<T> Override<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Override::Unset)
    }
}

/// One host:container port pair. A bare port `P` publishes `P:P`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub container: u16,
}

impl PortMapping {
    pub fn parse(spec: &str) -> Result<PortMapping> {
        let invalid = || {
            FdevcError::ConfigInvalid(format!(
                "invalid port spec '{}' (expected PORT or HOST:CONTAINER)",
                spec
            ))
        };
        match spec.split_once(':') {
            Some((host, container)) => Ok(PortMapping {
                host: host.parse().map_err(|_| invalid())?,
                container: container.parse().map_err(|_| invalid())?,
            }),
            None => {
                let port: u16 = spec.parse().map_err(|_| invalid())?;
                Ok(PortMapping {
                    host: port,
                    container: port,
                })
            }
        }
    }
}

impl std::fmt::Display for PortMapping {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.container)
    }
}

/// Where the environment's image comes from: a registry reference or a
/// build recipe on disk. Decided by filesystem existence at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    Registry(String),
    Recipe(PathBuf),
}

impl ImageSource {
    /// Classify `value`, canonicalizing recipe paths so later invocations
    /// from other directories still find them.
    pub fn resolve(value: &str, cwd: &Path) -> ImageSource {
        let candidate = if value.starts_with('/') {
            PathBuf::from(value)
        } else {
            cwd.join(value)
        };
        if candidate.is_file() {
            let absolute = candidate.canonicalize().unwrap_or(candidate);
            ImageSource::Recipe(absolute)
        } else {
            ImageSource::Registry(value.to_string())
        }
    }

    /// The string form stored and shown for this source.
    pub fn reference(&self) -> String {
        match self {
            ImageSource::Registry(name) => name.clone(),
            ImageSource::Recipe(path) => path.to_string_lossy().to_string(),
        }
    }
}

/// Everything the CLI layer collected for one invocation.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub ports: Vec<PortMapping>,
    pub image: Option<String>,
    pub runtime_cmd: Option<Vec<String>>,
    pub project: Override<PathBuf>,
    /// Saved startup-command variant: runs now and is persisted.
    pub startup_cmd: Option<String>,
    /// Session variant: runs once this invocation, never persisted.
    pub session_cmd: Option<String>,
    pub socket: Option<bool>,
    pub persist: Option<bool>,
    pub volumes: Vec<VolumeSpec>,
}

/// The resolved settings one lifecycle transition runs with.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectiveConfig {
    pub ports: Vec<PortMapping>,
    pub image: ImageSource,
    pub runtime_cmd: Vec<String>,
    pub project_path: Option<PathBuf>,
    /// Command to run on attach this invocation, if any.
    pub startup_cmd: Option<String>,
    pub socket_enabled: bool,
    pub persist: bool,
    pub volumes: Vec<VolumeSpec>,
}

impl EffectiveConfig {
    /// In-environment directory the project mounts at, when there is one.
    pub fn workspace_dir(&self) -> Option<String> {
        let base = self.project_path.as_ref()?.file_name()?;
        Some(format!("{}/{}", WORKSPACE_BASE, base.to_string_lossy()))
    }

    /// Working directory for execs inside the environment.
    pub fn exec_dir(&self) -> String {
        self.workspace_dir().unwrap_or_else(|| "/".to_string())
    }
}
