//! start / new / vm handlers
//!
//! All three share one launch path: merge configuration, normalize
//! volumes, bring the environment to Running, then attach. They differ
//! only in how the identity is chosen and which defaults apply.

use crate::commands::{open_store, resolve_reference};
use crate::config::{self, Override, Overrides};
use crate::env::Environment;
use crate::error::Result;
use crate::identity::EnvId;
use crate::lifecycle::Lifecycle;
use crate::runtime::CliRuntime;
use crate::session::{self, AttachRequest};
use crate::store::{ConfigStore, StoreSnapshot};
use crate::volume;

/// Options shared by the launching subcommands.
pub struct LaunchOptions {
    pub overrides: Overrides,
    pub detach: bool,
    pub force: bool,
}

/// `fdevc start [ref]`: resolve (or derive, with `name`) an identity and
/// bring it up.
pub fn start(
    env: &Environment,
    reference: Option<&str>,
    name: Option<&str>,
    opts: LaunchOptions,
) -> Result<()> {
    let (store, snapshot) = open_store(env);
    let identity = match name {
        Some(n) => EnvId::named(n),
        None => resolve_reference(env, reference, &snapshot)?,
    };
    launch(env, &store, &snapshot, &identity, opts)
}

/// `fdevc new`: a disposable timestamped environment for this directory.
/// It merges against the base identity's record but lives its own life.
pub fn new_disposable(env: &Environment, opts: LaunchOptions) -> Result<()> {
    let (store, snapshot) = open_store(env);
    let identity = EnvId::disposable(&env.cwd);
    launch(env, &store, &snapshot, &identity, opts)
}

/// `fdevc vm`: an anonymous environment under a random label, with no
/// project mount unless one is asked for.
pub fn vm(env: &Environment, mut opts: LaunchOptions) -> Result<()> {
    if opts.overrides.project.is_unset() {
        opts.overrides.project = Override::Absent;
    }
    let (store, snapshot) = open_store(env);
    let identity = EnvId::random_vm();
    launch(env, &store, &snapshot, &identity, opts)
}

fn launch(
    env: &Environment,
    store: &ConfigStore,
    snapshot: &StoreSnapshot,
    identity: &EnvId,
    opts: LaunchOptions,
) -> Result<()> {
    let merged = config::merge(identity, &opts.overrides, env, snapshot)?;
    let volumes = volume::normalize(
        &merged.config.volumes,
        identity,
        merged.config.project_path.as_deref(),
        &env.cwd,
    );
    for warning in &volumes.warnings {
        eprintln!("warning: {}", warning);
    }

    let runtime = CliRuntime::new(&merged.config.runtime_cmd);
    let lifecycle = Lifecycle::new(&runtime, store, runtime.display_name());
    lifecycle.ensure_running(identity, &merged, &volumes, opts.force)?;

    let exec_dir = merged.config.exec_dir();
    let session_live = env.interactive
        && !opts.detach
        && session::session_exists(&runtime, identity, &exec_dir);
    let request = AttachRequest {
        startup_cmd: merged.config.startup_cmd.as_deref(),
        persist: merged.config.persist,
        run_on_reattach: opts.overrides.session_cmd.is_some(),
        detach_requested: opts.detach,
        interactive: env.interactive,
    };
    let plan = session::plan(&request, session_live);
    session::run(&runtime, identity, &merged.config, &plan)?;

    if plan.stop_after {
        lifecycle.stop_env(identity)?;
    }
    Ok(())
}
