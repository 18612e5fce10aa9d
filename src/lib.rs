//! fdevc - fast, reusable dev containers per working directory
//!
//! fdevc keeps one named, sandboxed dev environment per project directory,
//! remembers how each was configured, and reproduces that environment on
//! every start. The heavy lifting is configuration resolution (override >
//! stored > default), drift detection, and the attach session protocol;
//! the container runtime itself stays external.
//!
//! # Example
//!
//! ```no_run
//! use fdevc::env::Environment;
//! use fdevc::store::ConfigStore;
//!
//! let env = Environment::from_process();
//! let store = ConfigStore::new(&env.store_path);
//! for (name, record) in store.snapshot().records() {
//!     println!("{} persist={}", name, record.persist);
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod conflict;
pub mod env;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod output;
pub mod runtime;
pub mod session;
pub mod store;
pub mod volume;

pub use config::{EffectiveConfig, Overrides};
pub use env::Environment;
pub use error::{FdevcError, Result};
pub use identity::EnvId;
pub use runtime::{CliRuntime, ContainerRuntime};
pub use store::{ConfigStore, StoredRecord};
