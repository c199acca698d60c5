//! Command implementations

pub mod doctor;

pub mod plan;

pub mod run;

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::info;

use tagbump_core::ci::CiEnvironment;
use tagbump_core::classify::ReleaseAction;
use tagbump_core::config::Config;
use tagbump_core::event::{self, CommitBatch};
use tagbump_core::exec::SystemRunner;
use tagbump_core::manifest::{ManifestVersionSource, TagVersionSource, VersionSource};
use tagbump_core::release::{Committer, ReleaseOptions};

/// Where the current version is read from.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum VersionSourceKind {
    /// `version` field of package.json
    #[default]
    Manifest,
    /// `CURRENT_TAG` environment variable; no file is written
    Tag,
}

/// Inputs shared by `run` and `plan`.
#[derive(Args, Debug, Default, Clone)]
pub struct ReleaseArgs {
    /// Release type, bypassing keyword detection
    #[arg(long, value_enum, value_name = "TYPE")]
    pub release_type: Option<ReleaseAction>,

    /// Prefix for tags and versions in commit messages (e.g. "v")
    #[arg(long, value_name = "PREFIX")]
    pub tag_prefix: Option<String>,

    /// Where the current version comes from
    #[arg(long, value_enum, default_value_t)]
    pub version_source: VersionSourceKind,

    /// Event payload to read commits from (defaults to GITHUB_EVENT_PATH)
    #[arg(long, value_name = "FILE")]
    pub event: Option<Utf8PathBuf>,

    /// Classify this commit message instead of the event's commits (repeatable)
    #[arg(short, long = "message", value_name = "MSG")]
    pub messages: Vec<String>,
}

/// Everything a release needs before planning.
pub(crate) struct Prepared {
    pub batch: CommitBatch,
    pub versions: Box<dyn VersionSource>,
    pub options: ReleaseOptions,
    pub workdir: Utf8PathBuf,
}

/// Resolve configuration, CI environment and flags into release inputs.
pub(crate) fn prepare(
    args: &ReleaseArgs,
    config: &Config,
    ci: &CiEnvironment,
) -> anyhow::Result<Prepared> {
    let workdir = ci.project_dir();

    let mut options = ReleaseOptions::from_config(config, &ci_committer(ci));
    if args.release_type.is_some() {
        options.explicit = args.release_type;
    }
    if let Some(ref prefix) = args.tag_prefix {
        options.tag_prefix.clone_from(prefix);
    }

    let versions: Box<dyn VersionSource> = match args.version_source {
        VersionSourceKind::Manifest => Box::new(ManifestVersionSource::in_workspace(&workdir)),
        VersionSourceKind::Tag => {
            let current = ci
                .current_tag
                .as_deref()
                .context("CURRENT_TAG must be set when the version source is `tag`")?;
            Box::new(TagVersionSource::new(current))
        }
    };

    let batch = load_commits(args, ci, &workdir)?;

    Ok(Prepared {
        batch,
        versions,
        options,
        workdir,
    })
}

fn load_commits(
    args: &ReleaseArgs,
    ci: &CiEnvironment,
    workdir: &Utf8Path,
) -> anyhow::Result<CommitBatch> {
    if !args.messages.is_empty() {
        return Ok(CommitBatch::from_messages(args.messages.iter().cloned()));
    }
    let Some(path) = args.event.as_ref().or(ci.event_path.as_ref()) else {
        info!("no event payload given, nothing to inspect");
        return Ok(CommitBatch::empty());
    };
    let payload = event::load_event(path).context("failed to load event payload")?;
    event::commit_batch(&payload, &SystemRunner, workdir).context("failed to list event commits")
}

/// Committer identity from `GITHUB_USER`/`GITHUB_EMAIL`, else the built-in one.
fn ci_committer(ci: &CiEnvironment) -> Committer {
    let defaults = Committer::default();
    Committer {
        name: ci.user.clone().unwrap_or(defaults.name),
        email: ci.email.clone().unwrap_or(defaults.email),
    }
}

/// Print the final success line.
pub(crate) fn report_success(message: &str) {
    println!(
        "{}  {}{message}",
        "✔".green(),
        format!("{:<10}", "success").green().bold()
    );
}
