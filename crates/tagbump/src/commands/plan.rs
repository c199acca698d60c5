//! Plan command: classify the commits and compute the next version only.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::{debug, instrument};

use tagbump_core::ci::CiEnvironment;
use tagbump_core::classify::ReleaseAction;
use tagbump_core::config::Config;
use tagbump_core::event::EventSource;
use tagbump_core::release::{self, ReleasePlan};

use super::ReleaseArgs;

/// Arguments for the `plan` subcommand.
#[derive(Args, Debug, Default)]
pub struct PlanArgs {
    /// Commit, version and classification inputs.
    #[command(flatten)]
    pub release: ReleaseArgs,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
enum Decision {
    AlreadyBumped,
    NoRelease,
    Release,
}

#[derive(Serialize)]
struct PlanReport {
    decision: Decision,
    commits: usize,
    source: EventSource,
    version_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<ReleaseAction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    current: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    commit_message: Option<String>,
}

/// Execute the plan command.
#[instrument(name = "cmd_plan", skip_all)]
pub fn cmd_plan(
    args: PlanArgs,
    global_json: bool,
    config: &Config,
    ci: &CiEnvironment,
) -> anyhow::Result<()> {
    debug!(json_output = global_json, "executing plan command");

    let prepared = super::prepare(&args.release, config, ci)?;
    let plan = release::plan_release(
        &prepared.batch,
        prepared.options,
        prepared.versions.as_ref(),
    )
    .context("release planning failed")?;

    let mut report = PlanReport {
        decision: Decision::NoRelease,
        commits: prepared.batch.messages.len(),
        source: prepared.batch.source,
        version_source: prepared.versions.describe(),
        action: None,
        current: None,
        next: None,
        tag: None,
        commit_message: None,
    };
    match plan {
        ReleasePlan::AlreadyBumped => report.decision = Decision::AlreadyBumped,
        ReleasePlan::NoRelease => {}
        ReleasePlan::Ready(ready) => {
            report.decision = Decision::Release;
            report.action = Some(ready.action);
            report.current = Some(ready.current.to_string());
            report.next = Some(ready.next.version.to_string());
            report.tag = Some(ready.next.tag());
            report.commit_message = Some(ready.commit_message);
        }
    }

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{}: {} commit{} from {}",
        "Commits".dimmed(),
        report.commits,
        if report.commits == 1 { "" } else { "s" },
        describe_source(report.source),
    );
    println!("{}: {}", "Version source".dimmed(), report.version_source);
    match report.decision {
        Decision::AlreadyBumped => println!(
            "{}",
            "Already bumped: the commits contain a previous bump commit".yellow()
        ),
        Decision::NoRelease => println!("{}", "No release: no version keywords found".yellow()),
        Decision::Release => {
            println!(
                "{}: {} → {} ({})",
                "Release".bold(),
                report.current.as_deref().unwrap_or("?").dimmed(),
                report.tag.as_deref().unwrap_or("?").green().bold(),
                report
                    .action
                    .map(|a| a.to_string())
                    .unwrap_or_default(),
            );
            println!(
                "{}: {}",
                "Commit message".dimmed(),
                report.commit_message.as_deref().unwrap_or("").cyan()
            );
        }
    }

    Ok(())
}

fn describe_source(source: EventSource) -> String {
    match source {
        EventSource::Empty => "no event".to_string(),
        EventSource::Push => "push".to_string(),
        EventSource::PullRequest { number } => format!("pull request #{number}"),
    }
}
