//! Effective-configuration resolution: value types and the merge engine.

mod merge;
mod types;

pub use merge::{merge, Merged};
pub use types::{EffectiveConfig, ImageSource, Override, Overrides, PortMapping, WORKSPACE_BASE};
