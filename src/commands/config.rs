//! config handler

use crate::commands::open_store;
use crate::env::Environment;
use crate::error::{FdevcError, Result};
use crate::identity;
use crate::output;

/// Show, delete, or clear saved configurations. Operates on the store
/// alone; no runtime is needed.
pub fn config(env: &Environment, rm: Option<&str>, clear: bool) -> Result<()> {
    let (store, snapshot) = open_store(env);

    if clear {
        store.clear()?;
        println!("Removed all saved configurations");
        return Ok(());
    }

    if let Some(reference) = rm {
        let saved: Vec<String> = snapshot.records().keys().cloned().collect();
        let identity = identity::resolve(Some(reference), &saved, &env.cwd)?;
        if store.delete(identity.as_str())? {
            println!("Removed saved configuration for '{}'", identity.short());
            return Ok(());
        }
        return Err(FdevcError::IdentityNotFound(reference.to_string()));
    }

    let default_runtime = env.runtime_cmd.join(" ");
    match output::config_table(snapshot.records(), &default_runtime) {
        Some(table) => print!("{}", table),
        None => println!("No saved configurations."),
    }
    Ok(())
}
