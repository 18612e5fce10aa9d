//! rm handler

use crate::commands::{open_store, resolve_reference, runtime_for};
use crate::env::Environment;
use crate::error::Result;
use crate::lifecycle::Lifecycle;

pub fn rm(env: &Environment, reference: Option<&str>, purge: bool) -> Result<()> {
    let (store, snapshot) = open_store(env);
    let identity = resolve_reference(env, reference, &snapshot)?;
    let runtime = runtime_for(env, &snapshot, &identity);
    let lifecycle = Lifecycle::new(&runtime, &store, runtime.display_name());
    lifecycle.remove_env(&identity, purge)
}
