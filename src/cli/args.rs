//! CLI argument parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{Override, Overrides, PortMapping};
use crate::env::split_command;
use crate::error::Result;
use crate::volume::VolumeSpec;

#[derive(Parser)]
#[command(name = "fdevc")]
#[command(author, version, about = "Fast, reusable dev containers per directory", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: SubCommand,

    /// Path of the configuration store
    #[arg(long, global = true, env = "FDEVC_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum SubCommand {
    /// Start (or create) an environment and attach to it
    Start {
        /// Environment name or listing index (defaults to this directory's)
        reference: Option<String>,

        /// Create under an explicit name instead of resolving the reference
        #[arg(long, value_name = "NAME", conflicts_with = "reference")]
        name: Option<String>,

        /// Recreate the environment if its settings drifted
        #[arg(short, long)]
        force: bool,

        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Start a disposable copy of this directory's environment
    New {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Start an anonymous environment with no project mount
    Vm {
        #[command(flatten)]
        launch: LaunchArgs,
    },

    /// Stop an environment (disposable ones are removed)
    Stop {
        /// Environment name or listing index
        reference: Option<String>,
    },

    /// Remove an environment
    Rm {
        /// Environment name or listing index
        reference: Option<String>,

        /// Also delete the saved configuration, named volumes, and any built image
        #[arg(long)]
        purge: bool,
    },

    /// List environments and saved configurations
    Ls,

    /// Show saved configurations
    Config {
        /// Delete one saved configuration
        #[arg(long, value_name = "REF", conflicts_with = "clear")]
        rm: Option<String>,

        /// Delete all saved configurations
        #[arg(long)]
        clear: bool,
    },
}

/// Flags shared by the launching subcommands (start, new, vm).
#[derive(clap::Args, Default)]
pub struct LaunchArgs {
    /// Publish a port (HOST:CONTAINER, or PORT for PORT:PORT); repeatable
    #[arg(short, long = "port", value_name = "PORT")]
    pub ports: Vec<String>,

    /// Image reference, or path to a build recipe
    #[arg(short, long, value_name = "IMAGE")]
    pub image: Option<String>,

    /// Runtime invocation to use (e.g. "sudo podman")
    #[arg(long, value_name = "CMD")]
    pub docker: Option<String>,

    /// Directory to mount as the project (defaults to the current one)
    #[arg(long, value_name = "DIR", conflicts_with = "no_project")]
    pub project: Option<PathBuf>,

    /// Mount no project directory
    #[arg(long)]
    pub no_project: bool,

    /// Command to run on attach, this invocation only
    #[arg(short = 'c', long = "cmd", value_name = "COMMAND")]
    pub cmd: Option<String>,

    /// Command to run on every attach, saved in the configuration
    #[arg(long = "save-cmd", value_name = "COMMAND")]
    pub save_cmd: Option<String>,

    /// Share the runtime socket with the environment
    #[arg(long, conflicts_with = "no_socket")]
    pub socket: bool,

    /// Do not share the runtime socket
    #[arg(long)]
    pub no_socket: bool,

    /// Keep the session alive after detaching
    #[arg(long, conflicts_with = "no_persist")]
    pub persist: bool,

    /// Stop the environment when the session ends
    #[arg(long)]
    pub no_persist: bool,

    /// Volume spec (SOURCE:TARGET, or a bare name to keep out of the
    /// project mount); repeatable
    #[arg(short, long = "volume", value_name = "SPEC")]
    pub volumes: Vec<String>,

    /// Bring the environment up without attaching
    #[arg(short, long)]
    pub detach: bool,
}

impl LaunchArgs {
    /// Validate the raw flag values into typed overrides.
    pub fn overrides(&self) -> Result<Overrides> {
        let ports = self
            .ports
            .iter()
            .map(|p| PortMapping::parse(p))
            .collect::<Result<Vec<_>>>()?;
        let volumes = self
            .volumes
            .iter()
            .map(|v| VolumeSpec::parse(v))
            .collect::<Result<Vec<_>>>()?;

        let project = if self.no_project {
            Override::Absent
        } else {
            match &self.project {
                Some(dir) => Override::Set(dir.clone()),
                None => Override::Unset,
            }
        };

        Ok(Overrides {
            ports,
            image: self.image.clone().filter(|s| !s.trim().is_empty()),
            runtime_cmd: self
                .docker
                .as_deref()
                .map(split_command)
                .filter(|tokens| !tokens.is_empty()),
            project,
            startup_cmd: self.save_cmd.clone(),
            session_cmd: self.cmd.clone(),
            socket: flag_pair(self.socket, self.no_socket),
            persist: flag_pair(self.persist, self.no_persist),
            volumes,
        })
    }
}

fn flag_pair(yes: bool, no: bool) -> Option<bool> {
    match (yes, no) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}
