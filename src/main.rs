//! fdevc CLI - fast, reusable dev containers per working directory

use clap::Parser;
use fdevc::cli::{Args, LaunchArgs, SubCommand};
use fdevc::commands::{self, LaunchOptions};
use fdevc::env::Environment;

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> fdevc::Result<()> {
    let mut env = Environment::from_process();
    if let Some(path) = args.config {
        env.store_path = path;
    }

    match args.command {
        SubCommand::Start {
            reference,
            name,
            force,
            launch,
        } => {
            let opts = launch_options(&launch, force)?;
            commands::start(&env, reference.as_deref(), name.as_deref(), opts)
        }

        SubCommand::New { launch } => {
            let opts = launch_options(&launch, false)?;
            commands::new_disposable(&env, opts)
        }

        SubCommand::Vm { launch } => {
            let opts = launch_options(&launch, false)?;
            commands::vm(&env, opts)
        }

        SubCommand::Stop { reference } => commands::stop(&env, reference.as_deref()),

        SubCommand::Rm { reference, purge } => {
            commands::rm(&env, reference.as_deref(), purge)
        }

        SubCommand::Ls => commands::ls(&env),

        SubCommand::Config { rm, clear } => commands::config(&env, rm.as_deref(), clear),
    }
}

fn launch_options(launch: &LaunchArgs, force: bool) -> fdevc::Result<LaunchOptions> {
    Ok(LaunchOptions {
        overrides: launch.overrides()?,
        detach: launch.detach,
        force,
    })
}
