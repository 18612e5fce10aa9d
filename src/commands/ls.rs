//! ls handler

use crate::commands::open_store;
use crate::env::Environment;
use crate::error::Result;
use crate::identity::IDENTITY_PREFIX;
use crate::output;
use crate::runtime::{CliRuntime, ContainerRuntime};

/// List live environments merged with saved-only configurations. A missing
/// runtime degrades to the saved side instead of failing.
pub fn ls(env: &Environment) -> Result<()> {
    let (_store, snapshot) = open_store(env);
    let runtime = CliRuntime::new(&env.runtime_cmd);

    let containers = if runtime.available() {
        runtime.list(IDENTITY_PREFIX)?
    } else {
        eprintln!(
            "warning: {} is not available; showing saved configurations only",
            runtime.display_name()
        );
        Vec::new()
    };

    let default_runtime = env.runtime_cmd.join(" ");
    match output::ls_table(&containers, snapshot.records(), &default_runtime) {
        Some(table) => print!("{}", table),
        None => println!("No dev containers found."),
    }
    Ok(())
}
