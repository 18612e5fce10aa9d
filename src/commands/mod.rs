//! Command handlers
//!
//! One handler per user-facing subcommand. Each resolves an identity,
//! consults the store, and drives the lifecycle, printing progress lines
//! as it goes. Handlers return `Result<()>`; `main` maps that onto the
//! process exit status.

mod config;
mod ls;
mod rm;
mod start;
mod stop;

pub use config::config;
pub use ls::ls;
pub use rm::rm;
pub use start::{new_disposable, start, vm, LaunchOptions};
pub use stop::stop;

use crate::env::{split_command, Environment};
use crate::identity::{self, EnvId, IDENTITY_PREFIX};
use crate::runtime::{CliRuntime, ContainerRuntime};
use crate::store::{ConfigStore, StoreSnapshot};

/// Names an index can resolve against: live environments merged with
/// saved-only ones, sorted. The runtime being down just means no live
/// names.
fn known_names(runtime: &dyn ContainerRuntime, snapshot: &StoreSnapshot) -> Vec<String> {
    let live: Vec<String> = if runtime.available() {
        runtime
            .list(IDENTITY_PREFIX)
            .map(|rows| rows.into_iter().map(|r| r.name).collect())
            .unwrap_or_default()
    } else {
        Vec::new()
    };
    let saved: Vec<String> = snapshot.records().keys().cloned().collect();
    identity::indexed_union(&live, &saved)
}

fn resolve_reference(
    env: &Environment,
    reference: Option<&str>,
    snapshot: &StoreSnapshot,
) -> crate::error::Result<EnvId> {
    let ambient = CliRuntime::new(&env.runtime_cmd);
    let names = known_names(&ambient, snapshot);
    identity::resolve(reference, &names, &env.cwd)
}

/// Runtime bound to the identity's recorded command, falling back to the
/// ambient default.
fn runtime_for(env: &Environment, snapshot: &StoreSnapshot, id: &EnvId) -> CliRuntime {
    let cmd = snapshot
        .get(id.as_str())
        .and_then(|r| r.docker_cmd.as_deref())
        .map(split_command)
        .filter(|tokens| !tokens.is_empty())
        .unwrap_or_else(|| env.runtime_cmd.clone());
    CliRuntime::new(&cmd)
}

fn open_store(env: &Environment) -> (ConfigStore, StoreSnapshot) {
    let store = ConfigStore::new(&env.store_path);
    let snapshot = store.snapshot();
    if let Some(warning) = snapshot.warning() {
        eprintln!("warning: {}", warning);
    }
    (store, snapshot)
}
