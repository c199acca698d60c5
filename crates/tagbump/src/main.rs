//! tagbump CLI
#![deny(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use owo_colors::OwoColorize;
use tagbump::{Cli, Commands, commands};
use tagbump_core::ci::CiEnvironment;
use tagbump_core::config::ConfigLoader;
use tracing::debug;

mod observability;

fn main() -> ExitCode {
    // Usage errors exit 1 like every other failure; help and version exit 0.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };
    cli.color.apply();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!(
                "{}  {}{err:#}",
                "✖".red(),
                format!("{:<10}", "fatal").red().bold()
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    // -C is resolved here and threaded through; the process directory never changes.
    let cwd = match cli.chdir {
        Some(ref dir) => cwd.join(dir),
        None => cwd,
    };
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "working directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    anyhow::ensure!(cwd.is_dir(), "failed to change directory to {cwd}");

    let mut loader = ConfigLoader::new().with_project_search(&cwd);
    if let Some(ref config_path) = cli.config {
        let config_path = Utf8PathBuf::try_from(config_path.clone()).map_err(|e| {
            anyhow::anyhow!(
                "config path is not valid UTF-8: {}",
                e.into_path_buf().display()
            )
        })?;
        loader = loader.with_file(cwd.join(config_path));
    }
    let config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::from_env_with_overrides(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
    );
    let env_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let _guard = observability::init_observability(&obs_config, env_filter)
        .context("failed to initialize logging/tracing")?;

    let mut ci = CiEnvironment::from_env(&cwd);
    if cli.chdir.is_some() {
        ci.workspace = cwd.clone();
    }

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        %cwd,
        ?ci,
        "CLI initialized"
    );

    let result = match cli.command {
        Commands::Run(args) => commands::run::cmd_run(args, cli.json, &config, &ci),
        Commands::Plan(args) => commands::plan::cmd_plan(args, cli.json, &config, &ci),
        Commands::Doctor(args) => commands::doctor::cmd_doctor(args, cli.json, &cwd, &ci),
    };
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}
