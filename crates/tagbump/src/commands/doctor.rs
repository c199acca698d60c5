//! Doctor command: diagnose configuration, tools and CI environment.

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tagbump_core::ci::CiEnvironment;
use tagbump_core::config;
use tagbump_core::exec::{self, REQUIRED_PROGRAMS};

/// Arguments for the `doctor` subcommand.
#[derive(Args, Debug, Default)]
pub struct DoctorArgs {
    // No subcommand-specific arguments; uses global --json flag
}

#[derive(Serialize)]
struct DoctorReport {
    config: ConfigStatus,
    tools: Vec<ToolStatus>,
    environment: EnvironmentInfo,
}

#[derive(Serialize)]
struct ConfigStatus {
    /// Path to the project config file, if any
    file: Option<String>,
    /// Whether a config file was found
    found: bool,
    /// User config directory
    user_dir: Option<String>,
}

#[derive(Serialize)]
struct ToolStatus {
    name: &'static str,
    path: Option<String>,
}

#[derive(Serialize)]
struct EnvironmentInfo {
    /// Directory commands run in
    project_dir: String,
    /// Relevant environment variables
    env_vars: Vec<EnvVar>,
}

#[derive(Serialize)]
struct EnvVar {
    name: &'static str,
    value: Option<String>,
    description: &'static str,
}

impl EnvVar {
    fn new(name: &'static str, value: Option<&str>, description: &'static str) -> Self {
        Self {
            name,
            value: value.map(str::to_string),
            description,
        }
    }
}

impl DoctorReport {
    fn gather(cwd: &camino::Utf8Path, ci: &CiEnvironment) -> Self {
        let config_file = config::find_project_config(cwd);
        let tools = REQUIRED_PROGRAMS
            .iter()
            .map(|&name| ToolStatus {
                name,
                path: exec::find_program(name).map(|p| p.to_string()),
            })
            .collect();

        Self {
            config: ConfigStatus {
                found: config_file.is_some(),
                file: config_file.map(|p| p.to_string()),
                user_dir: config::user_config_dir().map(|p| p.to_string()),
            },
            tools,
            environment: EnvironmentInfo {
                project_dir: ci.project_dir().to_string(),
                env_vars: vec![
                    EnvVar::new(
                        "GITHUB_EVENT_PATH",
                        ci.event_path.as_ref().map(|p| p.as_str()),
                        "Event payload",
                    ),
                    EnvVar::new("GITHUB_REF", ci.git_ref.as_deref(), "Triggering ref"),
                    EnvVar::new(
                        "GITHUB_HEAD_REF",
                        ci.head_ref.as_deref(),
                        "Pull request head branch",
                    ),
                    EnvVar::new(
                        "GITHUB_REPOSITORY",
                        ci.repository.as_deref(),
                        "Repository for authenticated pushes",
                    ),
                    EnvVar::new("GITHUB_ACTOR", ci.actor.as_deref(), "Push user"),
                    EnvVar::new(
                        "GITHUB_TOKEN",
                        ci.token.as_ref().map(|_| "(set)"),
                        "Push and API token",
                    ),
                    EnvVar::new(
                        "PACKAGEJSON_DIR",
                        ci.manifest_dir.as_deref(),
                        "Manifest sub-directory",
                    ),
                    EnvVar::new("CURRENT_TAG", ci.current_tag.as_deref(), "Tag version source"),
                    EnvVar::new(
                        "GITHUB_OUTPUT",
                        ci.output_file.as_ref().map(|p| p.as_str()),
                        "Step output file",
                    ),
                    EnvVar::new(
                        "RUST_LOG",
                        std::env::var("RUST_LOG").ok().as_deref(),
                        "Log filter directive",
                    ),
                ],
            },
        }
    }
}

/// Run diagnostics and report configuration status.
///
/// # Arguments
/// * `global_json` - Global `--json` flag from CLI
/// * `cwd` - Current working directory
/// * `ci` - CI environment read at startup
#[instrument(name = "cmd_doctor", skip_all, fields(json_output))]
pub fn cmd_doctor(
    _args: DoctorArgs,
    global_json: bool,
    cwd: &camino::Utf8Path,
    ci: &CiEnvironment,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing doctor command");

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message("Gathering diagnostics...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));

    let report = DoctorReport::gather(cwd, ci);
    spinner.finish_and_clear();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Configuration".bold().underline());
    if let Some(ref file) = report.config.file {
        println!("  {} Config file: {}", "✓".green(), file.cyan());
    } else {
        println!("  {} No config file found", "○".yellow());
        offer_config_creation()?;
    }
    print_path("  User config dir", report.config.user_dir.as_deref());
    println!();

    println!("{}", "Tools".bold().underline());
    for tool in &report.tools {
        match tool.path {
            Some(ref path) => println!("  {} {}: {}", "✓".green(), tool.name, path.cyan()),
            None => println!("  {} {}: {}", "✗".red(), tool.name, "not on PATH".yellow()),
        }
    }
    println!();

    println!("{}", "Environment".bold().underline());
    println!(
        "  {}: {}",
        "Project directory".dimmed(),
        report.environment.project_dir.cyan()
    );
    let set_vars: Vec<_> = report
        .environment
        .env_vars
        .iter()
        .filter(|v| v.value.is_some())
        .collect();
    if set_vars.is_empty() {
        println!("  {} No CI variables set", "○".dimmed());
    } else {
        for var in set_vars {
            println!(
                "  {}: {}",
                var.name.dimmed(),
                var.value.as_deref().unwrap_or("").cyan()
            );
        }
    }

    Ok(())
}

fn print_path(label: &str, path: Option<&str>) {
    print!("{}: ", label.dimmed());
    match path {
        Some(p) => println!("{}", p.cyan()),
        None => println!("{}", "(unavailable)".yellow()),
    }
}

/// Offer to create a default config file when none exists.
fn offer_config_creation() -> anyhow::Result<()> {
    let Some(config_dir) = config::user_config_dir() else {
        return Ok(());
    };
    let config_path = config_dir.join("config.yaml");

    // Don't prompt if running non-interactively (always the case in CI)
    if !std::io::IsTerminal::is_terminal(&std::io::stdin()) || config_path.exists() {
        return Ok(());
    }

    let create = Confirm::new("Create a default config file?")
        .with_default(false)
        .with_help_message(&format!("Will create {config_path}"))
        .prompt();

    if let Ok(true) = create {
        std::fs::create_dir_all(&config_dir)?;
        let yaml = serde_saphyr::to_string(&config::Config::default())?;
        std::fs::write(&config_path, yaml)?;
        println!("  {} Created {}", "✓".green(), config_path.cyan());
    }

    Ok(())
}
