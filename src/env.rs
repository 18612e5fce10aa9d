//! Invocation environment for fdevc
//!
//! Everything the core reads from the outside world (working directory,
//! home directory, store location, runtime defaults) is captured here once
//! at startup and threaded through every call. No module below the CLI
//! boundary consults ambient process state.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};

/// Context for a single fdevc invocation
#[derive(Debug, Clone)]
pub struct Environment {
    /// Current working directory at invocation time
    pub cwd: PathBuf,
    /// User home directory, if one could be determined
    pub home: Option<PathBuf>,
    /// Path of the JSON configuration store
    pub store_path: PathBuf,
    /// Default runtime invocation (`FDEVC_DOCKER`, falls back to `docker`)
    pub runtime_cmd: Vec<String>,
    /// Default image reference or recipe path (`FDEVC_IMAGE`)
    pub default_image: String,
    /// Whether stdin and stdout are attached to an interactive terminal
    pub interactive: bool,
}

/// Image used when neither the store, the overrides, nor `FDEVC_IMAGE`
/// name one and no local recipe exists.
pub const FALLBACK_IMAGE: &str = "debian:stable-slim";

/// Recipe filename probed in the project directory during image resolution.
pub const LOCAL_RECIPE: &str = "Dockerfile";

impl Environment {
    /// Capture the ambient process environment.
    pub fn from_process() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
        let home = dirs::home_dir();

        let store_path = std::env::var_os("FDEVC_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| default_store_path(home.as_deref()));

        let runtime_cmd = std::env::var("FDEVC_DOCKER")
            .ok()
            .map(|raw| split_command(&raw))
            .filter(|tokens| !tokens.is_empty())
            .unwrap_or_else(|| vec!["docker".to_string()]);

        let default_image = std::env::var("FDEVC_IMAGE")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| FALLBACK_IMAGE.to_string());

        let interactive = std::io::stdin().is_terminal() && std::io::stdout().is_terminal();

        Self {
            cwd,
            home,
            store_path,
            runtime_cmd,
            default_image,
            interactive,
        }
    }

    /// Base name of the working directory, used for default identities.
    pub fn cwd_base_name(&self) -> String {
        self.cwd
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string())
    }

    /// Home directory as a path, when known.
    pub fn home_dir(&self) -> Option<&Path> {
        self.home.as_deref()
    }
}

fn default_store_path(home: Option<&Path>) -> PathBuf {
    let base = home.map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("/"));
    base.join(".config").join("fdevc").join("containers.json")
}

/// Split a runtime command override into tokens (`"sudo podman"` is two).
pub fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}
