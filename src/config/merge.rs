//! Three-tier configuration merge
//!
//! Per field, strictly: explicit override, then stored record, then computed
//! default. The project path resolves first because every other path-shaped
//! field collapses and expands relative to it. Pure given its inputs; the
//! runtime is never consulted here.

use std::path::{Path, PathBuf};

use crate::config::types::{EffectiveConfig, ImageSource, Override, Overrides, PortMapping};
use crate::env::{split_command, Environment, LOCAL_RECIPE};
use crate::error::Result;
use crate::identity::EnvId;
use crate::store::{paths, StoreSnapshot, StoredRecord};
use crate::volume::{self, VolumeSpec};

#[derive(Debug)]
pub struct Merged {
    pub config: EffectiveConfig,
    /// Whether a stored record (own or `.tmp` base) fed this merge.
    pub stored_present: bool,
    /// The record found under the identity's own key, for drift checks.
    pub previous: Option<StoredRecord>,
    /// Refreshed record to persist after a successful transition.
    pub record: StoredRecord,
}

pub fn merge(
    identity: &EnvId,
    overrides: &Overrides,
    env: &Environment,
    snapshot: &StoreSnapshot,
) -> Result<Merged> {
    let stored = lookup(identity, snapshot);
    let home = env.home_dir();

    let project_path: Option<PathBuf> = match &overrides.project {
        Override::Set(p) => Some(absolutize(p, &env.cwd)),
        Override::Absent => None,
        Override::Unset => match stored.and_then(|r| r.project_path.as_ref()) {
            Some(Some(token)) => Some(paths::expand(token, None, home)),
            Some(None) => None,
            None => Some(env.cwd.clone()),
        },
    };
    let root = project_path.as_deref();

    let ports: Vec<PortMapping> = if !overrides.ports.is_empty() {
        overrides.ports.clone()
    } else if let Some(r) = stored {
        r.ports
            .iter()
            .map(|s| PortMapping::parse(s))
            .collect::<Result<_>>()?
    } else {
        Vec::new()
    };

    let (image, record_image) = if let Some(value) = &overrides.image {
        let src = ImageSource::resolve(value, &env.cwd);
        let reference = collapse_image(&src, root, home);
        (src, Some(reference))
    } else if let Some(stored_ref) = stored.and_then(|r| r.image.clone()) {
        let expanded = paths::expand(&stored_ref, root, home);
        let src = ImageSource::resolve(&expanded.to_string_lossy(), &env.cwd);
        (src, Some(stored_ref))
    } else {
        (default_image(env), None)
    };

    let (runtime_cmd, record_docker) =
        if let Some(cmd) = overrides.runtime_cmd.as_ref().filter(|c| !c.is_empty()) {
            (cmd.clone(), Some(cmd.join(" ")))
        } else if let Some(stored_cmd) = stored.and_then(|r| r.docker_cmd.clone()) {
            (split_command(&stored_cmd), Some(stored_cmd))
        } else {
            (env.runtime_cmd.clone(), None)
        };

    let saved_startup: Option<String> = match &overrides.startup_cmd {
        Some(cmd) => Some(paths::collapse_command(cmd, root, home)),
        None => stored.and_then(|r| r.startup_cmd.clone()),
    };
    let startup_cmd = overrides.session_cmd.clone().or_else(|| {
        saved_startup
            .as_ref()
            .map(|c| paths::expand_command(c, root, home))
    });

    let record_socket = overrides.socket.or_else(|| stored.and_then(|r| r.socket));
    let socket_enabled = record_socket.unwrap_or(true);

    let persist = overrides
        .persist
        .or_else(|| stored.map(|r| r.persist))
        .unwrap_or(false);

    let volumes: Vec<VolumeSpec> = if !overrides.volumes.is_empty() {
        overrides.volumes.clone()
    } else if let Some(r) = stored {
        volume::expand(&r.volumes, root, home)?
    } else {
        Vec::new()
    };

    let record = StoredRecord {
        created_at: None,
        docker_cmd: record_docker,
        image: record_image,
        persist,
        ports: ports.iter().map(|p| p.to_string()).collect(),
        project_path: Some(root.map(|p| paths::collapse(p, None, home))),
        socket: record_socket,
        startup_cmd: saved_startup,
        volumes: volume::collapse(&volumes, root, home),
    };

    Ok(Merged {
        config: EffectiveConfig {
            ports,
            image,
            runtime_cmd,
            project_path,
            startup_cmd,
            socket_enabled,
            persist,
            volumes,
        },
        stored_present: stored.is_some(),
        previous: snapshot.get(identity.as_str()).cloned(),
        record,
    })
}

/// Record feeding the merge: the identity's own, or for `.tmp` identities
/// with none of their own, the record under the base identity.
fn lookup<'a>(identity: &EnvId, snapshot: &'a StoreSnapshot) -> Option<&'a StoredRecord> {
    if let Some(record) = snapshot.get(identity.as_str()) {
        return Some(record);
    }
    identity
        .base()
        .and_then(|base| snapshot.get(base.as_str()))
}

/// Tier-3 image: a recipe in the working directory wins over the configured
/// default, which itself may be a recipe path or a registry reference.
fn default_image(env: &Environment) -> ImageSource {
    let local = env.cwd.join(LOCAL_RECIPE);
    if local.is_file() {
        let absolute = local.canonicalize().unwrap_or(local);
        return ImageSource::Recipe(absolute);
    }
    ImageSource::resolve(&env.default_image, &env.cwd)
}

fn collapse_image(image: &ImageSource, root: Option<&Path>, home: Option<&Path>) -> String {
    match image {
        ImageSource::Registry(name) => name.clone(),
        ImageSource::Recipe(path) => paths::collapse(path, root, home),
    }
}

fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    joined.canonicalize().unwrap_or(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::FALLBACK_IMAGE;
    use crate::store::ConfigStore;
    use tempfile::TempDir;

    fn test_env(cwd: &Path) -> Environment {
        Environment {
            cwd: cwd.to_path_buf(),
            home: Some(PathBuf::from("/home/u")),
            store_path: PathBuf::from("/unused"),
            runtime_cmd: vec!["docker".to_string()],
            default_image: FALLBACK_IMAGE.to_string(),
            interactive: false,
        }
    }

    fn snapshot_with(id: &str, record: StoredRecord) -> (TempDir, StoreSnapshot) {
        let dir = TempDir::new().unwrap();
        let store = ConfigStore::new(dir.path().join("store.json"));
        store.save(id, record).unwrap();
        let snap = store.snapshot();
        (dir, snap)
    }

    fn empty_snapshot() -> StoreSnapshot {
        ConfigStore::new("/nonexistent/store.json").snapshot()
    }

    #[test]
    fn test_defaults_when_nothing_is_stored() {
        let dir = TempDir::new().unwrap();
        let env = test_env(dir.path());
        let id = EnvId::named("proj");

        let merged = merge(&id, &Overrides::default(), &env, &empty_snapshot()).unwrap();
        let config = merged.config;
        assert_eq!(config.project_path.as_deref(), Some(dir.path()));
        assert!(config.socket_enabled);
        assert!(!config.persist);
        assert!(config.ports.is_empty());
        assert_eq!(
            config.image,
            ImageSource::Registry(FALLBACK_IMAGE.to_string())
        );
        assert_eq!(config.runtime_cmd, vec!["docker".to_string()]);
        assert!(!merged.stored_present);
        assert!(merged.record.image.is_none());
    }

    #[test]
    fn test_override_beats_store_per_field() {
        let record = StoredRecord {
            ports: vec!["8080:8080".to_string()],
            socket: Some(false),
            ..Default::default()
        };
        let (_dir, snap) = snapshot_with("fdevc.proj", record);
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());

        let overrides = Overrides {
            ports: vec![PortMapping::parse("9090").unwrap()],
            ..Default::default()
        };
        let merged = merge(&EnvId::named("proj"), &overrides, &env, &snap).unwrap();
        assert_eq!(merged.config.ports[0].to_string(), "9090:9090");
        assert!(!merged.config.socket_enabled, "stored socket=false survives");
        assert!(merged.stored_present);
    }

    #[test]
    fn test_stored_values_beat_defaults() {
        let record = StoredRecord {
            docker_cmd: Some("sudo podman".to_string()),
            image: Some("alpine:3".to_string()),
            persist: true,
            ..Default::default()
        };
        let (_dir, snap) = snapshot_with("fdevc.proj", record);
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());

        let merged = merge(&EnvId::named("proj"), &Overrides::default(), &env, &snap).unwrap();
        assert_eq!(
            merged.config.runtime_cmd,
            vec!["sudo".to_string(), "podman".to_string()]
        );
        assert_eq!(
            merged.config.image,
            ImageSource::Registry("alpine:3".to_string())
        );
        assert!(merged.config.persist);
    }

    #[test]
    fn test_absent_project_short_circuits_store_and_default() {
        let record = StoredRecord {
            project_path: Some(Some("$HOME/work/proj".to_string())),
            ..Default::default()
        };
        let (_dir, snap) = snapshot_with("fdevc.proj", record);
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());

        let overrides = Overrides {
            project: Override::Absent,
            ..Default::default()
        };
        let merged = merge(&EnvId::named("proj"), &overrides, &env, &snap).unwrap();
        assert_eq!(merged.config.project_path, None);
        assert_eq!(merged.record.project_path, Some(None));
    }

    #[test]
    fn test_stored_project_expands_home_placeholder() {
        let record = StoredRecord {
            project_path: Some(Some("$HOME/work/proj".to_string())),
            ..Default::default()
        };
        let (_dir, snap) = snapshot_with("fdevc.proj", record);
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());

        let merged = merge(&EnvId::named("proj"), &Overrides::default(), &env, &snap).unwrap();
        assert_eq!(
            merged.config.project_path,
            Some(PathBuf::from("/home/u/work/proj"))
        );
    }

    #[test]
    fn test_tmp_identity_merges_against_base_record() {
        let record = StoredRecord {
            ports: vec!["3000:3000".to_string()],
            ..Default::default()
        };
        let (_dir, snap) = snapshot_with("fdevc.proj", record);
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());

        let id = EnvId::new("fdevc.proj.20260101-120000.tmp");
        let merged = merge(&id, &Overrides::default(), &env, &snap).unwrap();
        assert_eq!(merged.config.ports[0].to_string(), "3000:3000");
        assert!(merged.stored_present);
        assert!(merged.previous.is_none(), "no record under the tmp key itself");
    }

    #[test]
    fn test_local_recipe_beats_default_image_but_not_override() {
        let cwd = TempDir::new().unwrap();
        std::fs::write(cwd.path().join(LOCAL_RECIPE), "FROM debian").unwrap();
        let env = test_env(cwd.path());

        let merged = merge(
            &EnvId::named("proj"),
            &Overrides::default(),
            &env,
            &empty_snapshot(),
        )
        .unwrap();
        assert!(matches!(merged.config.image, ImageSource::Recipe(_)));

        let overrides = Overrides {
            image: Some("alpine:3".to_string()),
            ..Default::default()
        };
        let merged = merge(&EnvId::named("proj"), &overrides, &env, &empty_snapshot()).unwrap();
        assert_eq!(
            merged.config.image,
            ImageSource::Registry("alpine:3".to_string())
        );
    }

    #[test]
    fn test_session_command_runs_but_is_never_persisted() {
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());
        let overrides = Overrides {
            session_cmd: Some("make test".to_string()),
            ..Default::default()
        };

        let merged = merge(&EnvId::named("proj"), &overrides, &env, &empty_snapshot()).unwrap();
        assert_eq!(merged.config.startup_cmd.as_deref(), Some("make test"));
        assert_eq!(merged.record.startup_cmd, None);
    }

    #[test]
    fn test_saved_startup_command_is_stored_portably() {
        let cwd = TempDir::new().unwrap();
        let env = test_env(cwd.path());
        let script = format!("{}/setup.sh --fast", cwd.path().display());
        let overrides = Overrides {
            startup_cmd: Some(script.clone()),
            ..Default::default()
        };

        let merged = merge(&EnvId::named("proj"), &overrides, &env, &empty_snapshot()).unwrap();
        assert_eq!(merged.config.startup_cmd, Some(script));
        assert_eq!(
            merged.record.startup_cmd.as_deref(),
            Some("$PROJECT_ROOT/setup.sh --fast")
        );
    }

    #[test]
    fn test_refreshed_record_normalizes_ports_and_collapses_project() {
        let cwd = TempDir::new().unwrap();
        let env = Environment {
            home: Some(cwd.path().to_path_buf()),
            ..test_env(&cwd.path().join("proj"))
        };
        let overrides = Overrides {
            ports: vec![PortMapping::parse("8080").unwrap()],
            ..Default::default()
        };

        let merged = merge(&EnvId::named("proj"), &overrides, &env, &empty_snapshot()).unwrap();
        assert_eq!(merged.record.ports, vec!["8080:8080".to_string()]);
        assert_eq!(
            merged.record.project_path,
            Some(Some("$HOME/proj".to_string()))
        );
        assert_eq!(merged.record.socket, None, "unset socket is not persisted");
    }
}
