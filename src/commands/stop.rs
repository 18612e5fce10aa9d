//! stop handler

use crate::commands::{open_store, resolve_reference, runtime_for};
use crate::env::Environment;
use crate::error::Result;
use crate::lifecycle::Lifecycle;

pub fn stop(env: &Environment, reference: Option<&str>) -> Result<()> {
    let (store, snapshot) = open_store(env);
    let identity = resolve_reference(env, reference, &snapshot)?;
    let runtime = runtime_for(env, &snapshot, &identity);
    let lifecycle = Lifecycle::new(&runtime, &store, runtime.display_name());
    lifecycle.stop_env(&identity)
}
