//! Lifecycle state machine
//!
//! An environment is `Missing`, `Stopped`, or `Running`. The decision step
//! is a pure function of (state, drift, force); the apply step drives the
//! runtime and persists the refreshed record before any attach happens, so
//! configuration survives a failed attach.

use std::path::Path;

use chrono::Utc;

use crate::config::{EffectiveConfig, ImageSource, Merged};
use crate::conflict;
use crate::error::{FdevcError, Result};
use crate::identity::{EnvId, IDENTITY_PREFIX};
use crate::output::parse_created;
use crate::runtime::{ContainerRuntime, CreateSpec};
use crate::store::{ConfigStore, StoredRecord};
use crate::volume::{NormalizedVolumes, RUNTIME_SOCKET};

/// Label recording whether the socket was shared at create time.
pub const SOCKET_LABEL: &str = "fdevc.socket";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvState {
    Missing,
    Stopped,
    Running,
}

/// What one invocation decided to do with the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Create,
    Start { warn_drift: bool },
    Recreate,
    Reuse { warn_drift: bool },
}

/// What actually happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Created,
    Started,
    Recreated,
    Reused,
}

/// Observe the current state of `name`.
pub fn observe(runtime: &dyn ContainerRuntime, name: &str) -> Result<EnvState> {
    if !runtime.exists(name)? {
        return Ok(EnvState::Missing);
    }
    if runtime.running(name)? {
        Ok(EnvState::Running)
    } else {
        Ok(EnvState::Stopped)
    }
}

/// The recreate-vs-reuse decision. Recreation needs both a force flag and
/// detected drift; drift alone is warned about and ignored.
pub fn decide(state: EnvState, drift: bool, force: bool) -> Decision {
    match state {
        EnvState::Missing => Decision::Create,
        EnvState::Stopped if force && drift => Decision::Recreate,
        EnvState::Stopped => Decision::Start { warn_drift: drift },
        EnvState::Running if force && drift => Decision::Recreate,
        EnvState::Running => Decision::Reuse { warn_drift: drift },
    }
}

/// Fields on which the refreshed record differs from the stored one.
///
/// Ports, image, and runtime command enter the record only from an
/// override or the record itself, never from tier-3 defaults, so a value
/// appearing where the record held none is an explicit override and
/// counts as drift. Project path is recorded on every save; a previous
/// record without one predates this tool writing it, so its appearance
/// alone is not drift.
pub fn drift_fields(previous: &StoredRecord, refreshed: &StoredRecord) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if previous.ports != refreshed.ports {
        fields.push("ports");
    }
    if previous.image != refreshed.image {
        fields.push("image");
    }
    if previous.docker_cmd != refreshed.docker_cmd {
        fields.push("runtime command");
    }
    if recorded_changed(&previous.project_path, &refreshed.project_path) {
        fields.push("project path");
    }
    if previous.socket.unwrap_or(true) != refreshed.socket.unwrap_or(true) {
        fields.push("socket");
    }
    fields
}

fn recorded_changed<T: PartialEq>(previous: &Option<T>, refreshed: &Option<T>) -> bool {
    match (previous, refreshed) {
        (Some(a), Some(b)) => a != b,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

/// Drives lifecycle transitions against one runtime and one store.
pub struct Lifecycle<'a> {
    runtime: &'a dyn ContainerRuntime,
    store: &'a ConfigStore,
    /// Runtime invocation as typed, for unavailability errors.
    runtime_name: String,
}

impl<'a> Lifecycle<'a> {
    pub fn new(
        runtime: &'a dyn ContainerRuntime,
        store: &'a ConfigStore,
        runtime_name: String,
    ) -> Self {
        Lifecycle {
            runtime,
            store,
            runtime_name,
        }
    }

    fn ensure_available(&self) -> Result<()> {
        if self.runtime.available() {
            Ok(())
        } else {
            Err(FdevcError::RuntimeUnavailable(self.runtime_name.clone()))
        }
    }

    /// Bring the environment to `Running`, creating or recreating as the
    /// decision table dictates, and persist the record that describes it.
    pub fn ensure_running(
        &self,
        id: &EnvId,
        merged: &Merged,
        volumes: &NormalizedVolumes,
        force: bool,
    ) -> Result<Applied> {
        self.ensure_available()?;
        let state = observe(self.runtime, id.as_str())?;
        let drift = merged
            .previous
            .as_ref()
            .map(|p| drift_fields(p, &merged.record))
            .unwrap_or_default();
        let decision = decide(state, !drift.is_empty(), force);

        let applied = match decision {
            Decision::Create => {
                println!("Creating '{}'...", id.short());
                self.create_flow(id, &merged.config, volumes, false)?;
                Applied::Created
            }
            Decision::Recreate => {
                println!("Recreating '{}' ({} changed)...", id.short(), drift.join(", "));
                self.runtime.remove(id.as_str(), false)?;
                self.create_flow(id, &merged.config, volumes, true)?;
                Applied::Recreated
            }
            Decision::Start { warn_drift } => {
                if warn_drift {
                    eprintln!(
                        "warning: requested settings for '{}' differ from what it was created with ({}); pass --force to recreate",
                        id.short(),
                        drift.join(", ")
                    );
                }
                println!("Starting '{}'...", id.short());
                self.runtime
                    .start(id.as_str())
                    .map_err(|e| self.with_diagnosis(e))?;
                Applied::Started
            }
            Decision::Reuse { warn_drift } => {
                if warn_drift {
                    eprintln!(
                        "warning: '{}' is running with different settings ({}); stop it or pass --force to recreate",
                        id.short(),
                        drift.join(", ")
                    );
                } else {
                    println!("'{}' is already running", id.short());
                }
                Applied::Reused
            }
        };

        if applied != Applied::Reused {
            let record = match decision {
                // Rejected overrides must not leak into the record.
                Decision::Start { warn_drift: true } => match &merged.previous {
                    Some(previous) => keep_recorded_settings(previous, &merged.record),
                    None => merged.record.clone(),
                },
                _ => merged.record.clone(),
            };
            self.persist(id, record, merged.previous.as_ref())?;
        }
        Ok(applied)
    }

    /// Stop the environment. Disposable (`.tmp`) environments are removed
    /// outright and their record reaped.
    pub fn stop_env(&self, id: &EnvId) -> Result<()> {
        self.ensure_available()?;
        match observe(self.runtime, id.as_str())? {
            EnvState::Missing => {
                if self.store.snapshot().get(id.as_str()).is_some() {
                    println!("'{}' is not running (configuration kept)", id.short());
                    Ok(())
                } else {
                    Err(FdevcError::IdentityNotFound(id.short().to_string()))
                }
            }
            _ if id.is_tmp() => self.remove_disposable(id),
            EnvState::Stopped => {
                println!("'{}' is already stopped", id.short());
                Ok(())
            }
            EnvState::Running => {
                self.runtime.stop(id.as_str())?;
                println!("Stopped '{}'", id.short());
                Ok(())
            }
        }
    }

    /// Remove the environment. Without `purge` the saved configuration is
    /// kept (a later `rm` of the saved-only entry reaps it); with `purge`
    /// the record, named volumes, and any built image go too.
    pub fn remove_env(&self, id: &EnvId, purge: bool) -> Result<()> {
        self.ensure_available()?;
        let state = observe(self.runtime, id.as_str())?;
        let has_record = self.store.snapshot().get(id.as_str()).is_some();

        if state == EnvState::Missing {
            if !has_record {
                return Err(FdevcError::IdentityNotFound(id.short().to_string()));
            }
            self.store.delete(id.as_str())?;
            println!("Removed saved configuration for '{}'", id.short());
            return Ok(());
        }

        self.runtime.remove(id.as_str(), purge)?;
        if purge || id.is_tmp() {
            self.store.delete(id.as_str())?;
            if self.runtime.image_exists(&id.image_tag()).unwrap_or(false) {
                if let Err(e) = self.runtime.remove_image(&id.image_tag()) {
                    eprintln!("warning: could not remove image {}: {}", id.image_tag(), e);
                }
            }
        }
        println!("Removed '{}'", id.short());
        Ok(())
    }

    fn remove_disposable(&self, id: &EnvId) -> Result<()> {
        self.runtime.remove(id.as_str(), true)?;
        self.store.delete(id.as_str())?;
        println!("Removed disposable '{}'", id.short());
        Ok(())
    }

    /// Create and start: build the image if it comes from a recipe, then
    /// assemble the full mount set and bring the container up.
    fn create_flow(
        &self,
        id: &EnvId,
        config: &EffectiveConfig,
        volumes: &NormalizedVolumes,
        rebuild: bool,
    ) -> Result<()> {
        let image = match &config.image {
            ImageSource::Registry(name) => name.clone(),
            ImageSource::Recipe(path) => {
                let tag = id.image_tag();
                if rebuild || !self.runtime.image_exists(&tag)? {
                    println!("Building image {} from {}...", tag, path.display());
                    let context = path.parent().unwrap_or(Path::new("."));
                    self.runtime.build_image(path, context, &tag)?;
                }
                tag
            }
        };

        let workspace = config.workspace_dir();
        let mut mounts = Vec::new();
        if let (Some(project), Some(target)) = (&config.project_path, &workspace) {
            mounts.push((project.to_string_lossy().to_string(), target.clone()));
        }
        for mount in &volumes.mounts {
            mounts.push((mount.source.clone(), mount.target.clone()));
        }
        if config.socket_enabled {
            mounts.push((RUNTIME_SOCKET.to_string(), RUNTIME_SOCKET.to_string()));
        }

        let anonymous_volumes = match &workspace {
            Some(ws) => volumes
                .excluded
                .iter()
                .map(|marker| format!("{}/{}", ws, marker))
                .collect(),
            None => {
                if !volumes.excluded.is_empty() {
                    eprintln!("warning: exclusion markers need a project mount; ignoring them");
                }
                Vec::new()
            }
        };

        let spec = CreateSpec {
            name: id.as_str().to_string(),
            image,
            ports: config.ports.iter().map(|p| p.to_string()).collect(),
            mounts,
            anonymous_volumes,
            labels: vec![(SOCKET_LABEL.to_string(), config.socket_enabled.to_string())],
            workdir: workspace,
            command: vec!["sleep".to_string(), "infinity".to_string()],
        };
        self.runtime
            .create(&spec)
            .map_err(|e| self.with_diagnosis(e))?;
        self.runtime
            .start(id.as_str())
            .map_err(|e| self.with_diagnosis(e))?;
        self.precreate_targets(id, config, volumes);
        Ok(())
    }

    /// Managed volumes mount as an empty root; make their targets exist.
    fn precreate_targets(
        &self,
        id: &EnvId,
        config: &EffectiveConfig,
        volumes: &NormalizedVolumes,
    ) {
        for mount in volumes.mounts.iter().filter(|m| m.precreate_target) {
            let command = vec![
                "mkdir".to_string(),
                "-p".to_string(),
                mount.target.clone(),
            ];
            match self.runtime.exec_batch(id.as_str(), &config.exec_dir(), &command) {
                Ok(out) if out.success() => {}
                Ok(out) => eprintln!(
                    "warning: could not create {} in '{}': {}",
                    mount.target,
                    id.short(),
                    out.stderr.trim()
                ),
                Err(e) => eprintln!(
                    "warning: could not create {} in '{}': {}",
                    mount.target,
                    id.short(),
                    e
                ),
            }
        }
    }

    fn persist(
        &self,
        id: &EnvId,
        mut record: StoredRecord,
        previous: Option<&StoredRecord>,
    ) -> Result<()> {
        record.created_at = self
            .runtime
            .created_at(id.as_str())
            .ok()
            .and_then(|raw| parse_created(&raw))
            .or_else(|| previous.and_then(|p| p.created_at))
            .or_else(|| Some(Utc::now()));
        self.store.save(id.as_str(), record)
    }

    /// Attach a conflict diagnosis to a failed create/start, when the error
    /// text reveals one.
    fn with_diagnosis(&self, err: FdevcError) -> FdevcError {
        if let FdevcError::TransitionFailed {
            action,
            name,
            detail,
            conflict: None,
        } = err
        {
            let listing = self.runtime.list(IDENTITY_PREFIX).unwrap_or_default();
            let conflict = conflict::diagnose(&detail, &listing);
            FdevcError::TransitionFailed {
                action,
                name,
                detail,
                conflict,
            }
        } else {
            err
        }
    }
}

/// Record to persist when overrides were rejected: the recorded settings
/// stand, only the non-drift fields refresh.
fn keep_recorded_settings(previous: &StoredRecord, refreshed: &StoredRecord) -> StoredRecord {
    StoredRecord {
        created_at: refreshed.created_at,
        docker_cmd: previous.docker_cmd.clone(),
        image: previous.image.clone(),
        persist: refreshed.persist,
        ports: previous.ports.clone(),
        project_path: previous.project_path.clone(),
        socket: previous.socket,
        startup_cmd: refreshed.startup_cmd.clone(),
        volumes: refreshed.volumes.clone(),
    }
}
