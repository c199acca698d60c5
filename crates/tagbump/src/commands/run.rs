//! Run command: thin CLI layer over `tagbump_core::release`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, info, instrument};

use tagbump_core::ci::CiEnvironment;
use tagbump_core::config::Config;
use tagbump_core::exec::SystemRunner;
use tagbump_core::release::{self, ReleaseContext, ReleasePlan, ReleaseStage, StageOutcome};

use super::{ReleaseArgs, report_success};

/// Step output that receives the new tag.
const NEW_TAG_OUTPUT: &str = "newTag";

/// Arguments for the `run` subcommand.
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Commit, version and classification inputs.
    #[command(flatten)]
    pub release: ReleaseArgs,

    /// Branch to land the bump on (overrides the ref or pull request branch)
    #[arg(long, value_name = "BRANCH")]
    pub target_branch: Option<String>,

    /// Do not create the bump commit
    #[arg(long)]
    pub skip_commit: bool,

    /// Do not create the tag
    #[arg(long)]
    pub skip_tag: bool,

    /// Do not push
    #[arg(long)]
    pub skip_push: bool,

    /// Preview what would happen without running any command
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the run command.
#[instrument(name = "cmd_run", skip_all)]
pub fn cmd_run(
    args: RunArgs,
    global_json: bool,
    config: &Config,
    ci: &CiEnvironment,
) -> anyhow::Result<()> {
    debug!(
        json_output = global_json,
        dry_run = args.dry_run,
        "executing run command"
    );

    let prepared = super::prepare(&args.release, config, ci)?;
    let mut options = prepared.options;
    options.skip_commit |= args.skip_commit;
    options.skip_tag |= args.skip_tag;
    options.skip_push |= args.skip_push;
    options.dry_run = args.dry_run;
    let is_dry = options.dry_run;

    let plan = release::plan_release(&prepared.batch, options, prepared.versions.as_ref())
        .context("release planning failed")?;

    let ready = match plan {
        ReleasePlan::AlreadyBumped => {
            return finish_without_release(
                global_json,
                "No action necessary because we found a previous bump!",
            );
        }
        ReleasePlan::NoRelease => {
            return finish_without_release(global_json, "No version keywords found, skipping bump.");
        }
        ReleasePlan::Ready(ready) => ready,
    };

    if !global_json {
        if is_dry {
            println!("\n{}", "DRY RUN: no changes will be made".yellow().bold());
        }
        println!(
            "\n{}: {} → {} ({})",
            "Release".bold(),
            ready.current.to_string().dimmed(),
            ready.next.to_string().green().bold(),
            ready.action,
        );
        println!();
    }

    let target_branch = args.target_branch.or_else(|| config.target_branch.clone());
    let branches = ci.branch_source(target_branch.as_deref());
    let remote = ci.push_remote();
    let ctx = ReleaseContext {
        runner: &SystemRunner,
        workdir: &prepared.workdir,
        branches: &branches,
        versions: prepared.versions.as_ref(),
        remote: &remote,
    };

    let outcome = ready
        .execute(&ctx, |stage, outcome| {
            if !global_json {
                print_stage(stage, outcome, is_dry);
            }
        })
        .context("release failed")?;

    if !is_dry {
        let written = ci
            .write_output(NEW_TAG_OUTPUT, &outcome.tag)
            .context("failed to write step output")?;
        if !written && !global_json {
            println!("::set-output name={NEW_TAG_OUTPUT}::{}", outcome.tag);
        }
        info!(tag = %outcome.tag, written, "new tag published as step output");
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        if is_dry {
            report_success(&format!(
                "Dry run complete: {} stages previewed for {}",
                outcome.stages.len(),
                outcome.tag
            ));
        } else {
            report_success(&format!("Version bumped to {}!", outcome.tag));
        }
    }

    Ok(())
}

fn finish_without_release(global_json: bool, message: &str) -> anyhow::Result<()> {
    info!(message, "no release");
    if global_json {
        let report = serde_json::json!({ "released": false, "reason": message });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        report_success(message);
    }
    Ok(())
}

fn print_stage(stage: ReleaseStage, outcome: &StageOutcome, is_dry: bool) {
    match outcome {
        StageOutcome::Success { message } => {
            let prefix = if is_dry { "○" } else { "✓" };
            println!(
                "  {} {} {}",
                prefix.green(),
                stage.to_string().bold(),
                message.dimmed()
            );
        }
        StageOutcome::Skipped { reason } => {
            println!(
                "  {} {} {}",
                "–".yellow(),
                stage.to_string().bold(),
                format!("skipped: {reason}").dimmed()
            );
        }
    }
}
