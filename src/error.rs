//! Error types for fdevc

use thiserror::Error;

use crate::conflict::Conflict;

#[derive(Error, Debug)]
pub enum FdevcError {
    #[error("no dev container matches '{0}' (run `fdevc ls` to see what exists)")]
    IdentityNotFound(String),

    #[error("container runtime '{0}' is not available. Is it installed and on PATH?")]
    RuntimeUnavailable(String),

    #[error("failed to {action} '{name}': {detail}{}", conflict_suffix(.conflict))]
    TransitionFailed {
        action: &'static str,
        name: String,
        detail: String,
        conflict: Option<Conflict>,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("attach to '{name}' failed: {detail} (the container was left as-is)")]
    AttachFailed { name: String, detail: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn conflict_suffix(conflict: &Option<Conflict>) -> String {
    match conflict {
        Some(c) => format!("\n{}", c),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, FdevcError>;
