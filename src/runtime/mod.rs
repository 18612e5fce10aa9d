//! Container runtime access
//!
//! Everything the lifecycle needs from docker/podman, behind one trait so
//! the state machine and session protocol are testable without a runtime.

mod cli;

pub use cli::CliRuntime;

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// One row of the runtime's container listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerInfo {
    pub name: String,
    /// Raw status text (`Up 3 hours`, `Exited (0) 2 days ago`, `Created`).
    pub status: String,
    pub image: String,
    /// Mount sources (host paths and volume names).
    pub mounts: Vec<String>,
    pub labels: BTreeMap<String, String>,
    /// Raw creation timestamp as the runtime prints it.
    pub created_at: String,
    /// Raw published-ports column.
    pub ports: String,
}

impl ContainerInfo {
    pub fn is_running(&self) -> bool {
        self.status.starts_with("Up")
    }
}

/// Everything needed to create one container.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreateSpec {
    pub name: String,
    pub image: String,
    /// `host:container` pairs.
    pub ports: Vec<String>,
    /// `(source, target)` binds and named volumes.
    pub mounts: Vec<(String, String)>,
    /// In-container paths shadowed by anonymous volumes.
    pub anonymous_volumes: Vec<String>,
    pub labels: Vec<(String, String)>,
    pub workdir: Option<String>,
    /// Long-running command keeping the container alive.
    pub command: Vec<String>,
}

/// Captured output of a non-interactive exec.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

pub trait ContainerRuntime {
    /// Whether the runtime can serve requests at all.
    fn available(&self) -> bool;
    /// All containers (running or not) whose name starts with `name_prefix`.
    fn list(&self, name_prefix: &str) -> Result<Vec<ContainerInfo>>;
    fn exists(&self, name: &str) -> Result<bool>;
    fn running(&self, name: &str) -> Result<bool>;
    /// Create a container, leaving it stopped.
    fn create(&self, spec: &CreateSpec) -> Result<()>;
    fn start(&self, name: &str) -> Result<()>;
    /// Bounded-wait stop.
    fn stop(&self, name: &str) -> Result<()>;
    fn remove(&self, name: &str, volumes_too: bool) -> Result<()>;
    /// Foreground exec with the caller's terminal attached.
    fn exec_interactive(&self, name: &str, dir: &str, command: &[String]) -> Result<()>;
    /// Exec with captured output.
    fn exec_batch(&self, name: &str, dir: &str, command: &[String]) -> Result<ExecOutput>;
    /// Creation timestamp as reported by the runtime.
    fn created_at(&self, name: &str) -> Result<String>;
    fn build_image(&self, recipe: &Path, context_dir: &Path, tag: &str) -> Result<()>;
    fn image_exists(&self, tag: &str) -> Result<bool>;
    fn remove_image(&self, tag: &str) -> Result<()>;
}

#[cfg(test)]
pub mod mock {
    //! Scriptable in-memory runtime recording every call.

    use super::*;
    use crate::error::FdevcError;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub struct MockRuntime {
        pub containers: RefCell<HashMap<String, ContainerInfo>>,
        pub calls: RefCell<Vec<String>>,
        /// Every spec handed to `create`, in order.
        pub created_specs: RefCell<Vec<CreateSpec>>,
        /// Error detail injected into the next `start`.
        pub fail_start: RefCell<Option<String>>,
        /// Error detail injected into the next `create`.
        pub fail_create: RefCell<Option<String>>,
        /// Exit status by joined batch command; unlisted commands succeed.
        pub batch_status: RefCell<HashMap<String, i32>>,
        pub images: RefCell<Vec<String>>,
        pub offline: bool,
    }

    impl MockRuntime {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_container(self, name: &str, running: bool) -> Self {
            let info = ContainerInfo {
                name: name.to_string(),
                status: if running {
                    "Up 5 minutes".to_string()
                } else {
                    "Exited (0) 2 hours ago".to_string()
                },
                image: "debian:stable-slim".to_string(),
                created_at: "2026-01-01 12:00:00 +0000 UTC".to_string(),
                ..Default::default()
            };
            self.containers.borrow_mut().insert(name.to_string(), info);
            self
        }

        pub fn with_published_ports(self, name: &str, ports: &str) -> Self {
            if let Some(info) = self.containers.borrow_mut().get_mut(name) {
                info.ports = ports.to_string();
            }
            self
        }

        pub fn with_batch_status(self, command: &str, status: i32) -> Self {
            self.batch_status
                .borrow_mut()
                .insert(command.to_string(), status);
            self
        }

        pub fn call_log(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn set_running(&self, name: &str, running: bool) {
            if let Some(info) = self.containers.borrow_mut().get_mut(name) {
                info.status = if running {
                    "Up 1 second".to_string()
                } else {
                    "Exited (0) 1 second ago".to_string()
                };
            }
        }
    }

    impl ContainerRuntime for MockRuntime {
        fn available(&self) -> bool {
            !self.offline
        }

        fn list(&self, name_prefix: &str) -> Result<Vec<ContainerInfo>> {
            let mut rows: Vec<ContainerInfo> = self
                .containers
                .borrow()
                .values()
                .filter(|c| c.name.starts_with(name_prefix))
                .cloned()
                .collect();
            rows.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(rows)
        }

        fn exists(&self, name: &str) -> Result<bool> {
            Ok(self.containers.borrow().contains_key(name))
        }

        fn running(&self, name: &str) -> Result<bool> {
            Ok(self
                .containers
                .borrow()
                .get(name)
                .map(|c| c.is_running())
                .unwrap_or(false))
        }

        fn create(&self, spec: &CreateSpec) -> Result<()> {
            self.record(format!("create {}", spec.name));
            self.created_specs.borrow_mut().push(spec.clone());
            if let Some(detail) = self.fail_create.borrow_mut().take() {
                return Err(FdevcError::TransitionFailed {
                    action: "create",
                    name: spec.name.clone(),
                    detail,
                    conflict: None,
                });
            }
            let info = ContainerInfo {
                name: spec.name.clone(),
                status: "Created".to_string(),
                image: spec.image.clone(),
                mounts: spec.mounts.iter().map(|(s, _)| s.clone()).collect(),
                labels: spec
                    .labels
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                created_at: "2026-01-01 12:00:00 +0000 UTC".to_string(),
                ports: spec.ports.join(", "),
            };
            self.containers
                .borrow_mut()
                .insert(spec.name.clone(), info);
            Ok(())
        }

        fn start(&self, name: &str) -> Result<()> {
            self.record(format!("start {}", name));
            if let Some(detail) = self.fail_start.borrow_mut().take() {
                return Err(FdevcError::TransitionFailed {
                    action: "start",
                    name: name.to_string(),
                    detail,
                    conflict: None,
                });
            }
            self.set_running(name, true);
            Ok(())
        }

        fn stop(&self, name: &str) -> Result<()> {
            self.record(format!("stop {}", name));
            self.set_running(name, false);
            Ok(())
        }

        fn remove(&self, name: &str, volumes_too: bool) -> Result<()> {
            self.record(format!("remove {} volumes={}", name, volumes_too));
            self.containers.borrow_mut().remove(name);
            Ok(())
        }

        fn exec_interactive(&self, name: &str, dir: &str, command: &[String]) -> Result<()> {
            self.record(format!("exec-it {} {} {}", name, dir, command.join(" ")));
            Ok(())
        }

        fn exec_batch(&self, name: &str, dir: &str, command: &[String]) -> Result<ExecOutput> {
            let joined = command.join(" ");
            self.record(format!("exec {} {} {}", name, dir, joined));
            let status = self
                .batch_status
                .borrow()
                .get(&joined)
                .copied()
                .unwrap_or(0);
            Ok(ExecOutput {
                status,
                ..Default::default()
            })
        }

        fn created_at(&self, name: &str) -> Result<String> {
            Ok(self
                .containers
                .borrow()
                .get(name)
                .map(|c| c.created_at.clone())
                .unwrap_or_default())
        }

        fn build_image(&self, recipe: &Path, _context_dir: &Path, tag: &str) -> Result<()> {
            self.record(format!("build {} {}", recipe.display(), tag));
            self.images.borrow_mut().push(tag.to_string());
            Ok(())
        }

        fn image_exists(&self, tag: &str) -> Result<bool> {
            Ok(self.images.borrow().iter().any(|t| t == tag))
        }

        fn remove_image(&self, tag: &str) -> Result<()> {
            self.record(format!("rmi {}", tag));
            self.images.borrow_mut().retain(|t| t != tag);
            Ok(())
        }
    }
}
