//! Release orchestrator: the full commit-driven bump.
//!
//! # Two-phase workflow
//!
//! 1. **Plan** ([`plan_release`]): short-circuit on a prior bump, classify
//!    the commits and compute the next version. Nothing is touched.
//! 2. **Execute** ([`ReadyRelease::execute`]): write the version in the
//!    checkout, commit, switch to the target branch, write it again, commit,
//!    tag and push. Stages run strictly in order and the first failure
//!    aborts the run.
//!
//! CI checkouts are frequently a detached `HEAD`, which is why the version is
//! applied twice: once where the job started and once on the branch the
//! release must land on. Both applications must agree on the result.

use camino::Utf8Path;
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::branch::{BranchError, BranchSource};
use crate::classify::{self, BumpScope, KeywordPolicy, ReleaseAction};
use crate::config::{Config, DEFAULT_COMMITTER_EMAIL, DEFAULT_COMMITTER_NAME};
use crate::custom;
use crate::event::CommitBatch;
use crate::exec::CommandRunner;
use crate::git::{Git, GitError, PushRemote};
use crate::guard;
use crate::manifest::{ManifestError, VersionSource};
use crate::version::{self, NextVersion, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// Version resolution failed.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// Reading or writing the project version failed.
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// The target branch could not be determined.
    #[error(transparent)]
    Branch(#[from] BranchError),

    /// A git command failed.
    #[error(transparent)]
    Git(#[from] GitError),

    /// A context ended up with a different version than was computed.
    #[error("{context} holds version {actual} after the bump, expected {expected}")]
    ContextDivergence {
        /// Which context diverged.
        context: &'static str,
        /// Computed version.
        expected: Version,
        /// Version found after writing.
        actual: Version,
    },
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Options
// ──────────────────────────────────────────────

/// Identity recorded on the bump commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Committer {
    /// `user.name`.
    pub name: String,
    /// `user.email`.
    pub email: String,
}

impl Default for Committer {
    fn default() -> Self {
        Self {
            name: DEFAULT_COMMITTER_NAME.to_string(),
            email: DEFAULT_COMMITTER_EMAIL.to_string(),
        }
    }
}

/// Options controlling classification and which stages run.
#[derive(Debug, Clone, Default)]
pub struct ReleaseOptions {
    /// Action that bypasses classification.
    pub explicit: Option<ReleaseAction>,
    /// Keyword lists.
    pub policy: KeywordPolicy,
    /// Messages scanned for a previous bump.
    pub bump_policy: BumpScope,
    /// Messages scanned for keywords.
    pub keyword_scope: BumpScope,
    /// Prefix for tags and commit messages.
    pub tag_prefix: String,
    /// Commit message template with `{{version}}`.
    pub commit_message: String,
    /// Identity for the bump commit.
    pub committer: Committer,
    /// Do not commit.
    pub skip_commit: bool,
    /// Do not tag.
    pub skip_tag: bool,
    /// Do not push.
    pub skip_push: bool,
    /// Report the stages without running any command.
    pub dry_run: bool,
}

impl ReleaseOptions {
    /// Options taken from loaded configuration.
    ///
    /// The committer falls back to `fallback` (typically the CI user) and then
    /// to the built-in identity.
    pub fn from_config(config: &Config, fallback: &Committer) -> Self {
        Self {
            explicit: config.version_type,
            policy: config.keyword_policy(),
            bump_policy: config.bump_policy,
            keyword_scope: config.keyword_scope,
            tag_prefix: config.tag_prefix.clone(),
            commit_message: config.commit_message.clone(),
            committer: Committer {
                name: config
                    .committer_name
                    .clone()
                    .unwrap_or_else(|| fallback.name.clone()),
                email: config
                    .committer_email
                    .clone()
                    .unwrap_or_else(|| fallback.email.clone()),
            },
            skip_commit: config.skip_commit,
            skip_tag: config.skip_tag,
            skip_push: config.skip_push,
            dry_run: false,
        }
    }
}

// ──────────────────────────────────────────────
// Stages
// ──────────────────────────────────────────────

/// Stages of the release, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReleaseStage {
    /// Committer identity set.
    IdentityConfigured,
    /// Version written in the starting checkout.
    CurrentContextVersioned,
    /// Bump committed in the starting checkout.
    CurrentContextCommitted,
    /// Target branch resolved and checked out.
    TargetBranchResolved,
    /// Version written on the target branch.
    TargetContextVersioned,
    /// Bump committed on the target branch.
    TargetContextCommitted,
    /// Release tag created.
    Tagged,
    /// Branch (and tags) pushed.
    Pushed,
}

impl std::fmt::Display for ReleaseStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::IdentityConfigured => write!(f, "identity"),
            Self::CurrentContextVersioned => write!(f, "version (checkout)"),
            Self::CurrentContextCommitted => write!(f, "commit (checkout)"),
            Self::TargetBranchResolved => write!(f, "branch"),
            Self::TargetContextVersioned => write!(f, "version (target)"),
            Self::TargetContextCommitted => write!(f, "commit (target)"),
            Self::Tagged => write!(f, "tag"),
            Self::Pushed => write!(f, "push"),
        }
    }
}

/// Outcome of a single stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StageOutcome {
    /// Stage ran.
    Success {
        /// What happened.
        message: String,
    },
    /// Stage was skipped.
    Skipped {
        /// Why.
        reason: String,
    },
}

impl StageOutcome {
    fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
        }
    }

    fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Whether the stage ran.
    pub const fn ran(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Outcome of a completed release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// Version before the run.
    pub previous_version: Version,
    /// Version after the run.
    pub version: Version,
    /// Tag name (also the `newTag` output).
    pub tag: String,
    /// Branch the release landed on.
    pub branch: String,
    /// Each stage and what happened.
    pub stages: Vec<(ReleaseStage, StageOutcome)>,
    /// Whether this was a dry run.
    pub dry_run: bool,
}

impl ReleaseOutcome {
    /// Outcome recorded for `stage`, if it was reached.
    pub fn stage(&self, stage: ReleaseStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find_map(|(s, outcome)| (*s == stage).then_some(outcome))
    }
}

// ──────────────────────────────────────────────
// Plan
// ──────────────────────────────────────────────

/// What the commits ask for.
#[derive(Debug)]
pub enum ReleasePlan {
    /// A previous bump commit is in the batch; nothing to do.
    AlreadyBumped,
    /// Nothing asks for a release.
    NoRelease,
    /// Version resolved, ready to execute.
    Ready(ReadyRelease),
}

/// A release whose version is fully determined.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyRelease {
    /// How the commits were classified.
    pub action: ReleaseAction,
    /// Current version.
    pub current: Version,
    /// Next version and tag.
    pub next: NextVersion,
    /// Rendered bump commit message.
    pub commit_message: String,
    /// Options carried into execution.
    #[serde(skip)]
    pub options: ReleaseOptions,
}

/// Plan a release from a batch of commit messages.
///
/// # Errors
///
/// Fails when the current version cannot be read, or when a custom version
/// is requested and no usable directive exists.
#[instrument(skip_all, fields(commits = batch.messages.len(), source = %source.describe()))]
pub fn plan_release(
    batch: &CommitBatch,
    options: ReleaseOptions,
    source: &dyn VersionSource,
) -> ReleaseResult<ReleasePlan> {
    let current = source.current_version()?;
    debug!(%current, "current version");

    if guard::is_already_bumped(
        &batch.messages,
        &options.commit_message,
        &options.tag_prefix,
        options.bump_policy,
    ) {
        info!("commit is already a version bump, skipping");
        return Ok(ReleasePlan::AlreadyBumped);
    }

    let action = classify::classify(
        &batch.messages,
        &options.policy,
        options.explicit,
        options.keyword_scope,
    );
    if action == ReleaseAction::Skip {
        info!("no version keywords found, skipping bump");
        return Ok(ReleasePlan::NoRelease);
    }

    let candidate = if action == ReleaseAction::Custom {
        // An explicit `custom` with keyword scanning off still reads every directive.
        let scanned = match options.keyword_scope {
            BumpScope::Ignore => batch.messages.as_slice(),
            scope => scope.select(&batch.messages),
        };
        Some(custom::select_candidate(&custom::extract_candidates(scanned))?)
    } else {
        None
    };

    let next = version::resolve_next(&current, action, candidate.as_ref(), &options.tag_prefix)?;
    let commit_message = guard::render_commit_message(&options.commit_message, &next.tag());
    info!(%action, %current, next = %next, "release planned");

    Ok(ReleasePlan::Ready(ReadyRelease {
        action,
        current,
        next,
        commit_message,
        options,
    }))
}

// ──────────────────────────────────────────────
// Execute
// ──────────────────────────────────────────────

/// Collaborators a release executes against.
pub struct ReleaseContext<'a> {
    /// Runs git and the version writer.
    pub runner: &'a dyn CommandRunner,
    /// Working tree every command runs in.
    pub workdir: &'a Utf8Path,
    /// Names the branch the release lands on.
    pub branches: &'a dyn BranchSource,
    /// Reads and writes the project version.
    pub versions: &'a dyn VersionSource,
    /// Where pushes go.
    pub remote: &'a PushRemote,
}

impl ReadyRelease {
    /// Execute every stage in order.
    ///
    /// `on_stage` is called as each stage completes so the CLI can report
    /// progress.
    #[instrument(skip_all, fields(version = %self.next, dry_run = self.options.dry_run))]
    pub fn execute(
        self,
        ctx: &ReleaseContext<'_>,
        mut on_stage: impl FnMut(ReleaseStage, &StageOutcome),
    ) -> ReleaseResult<ReleaseOutcome> {
        let opts = &self.options;
        let is_dry = opts.dry_run;
        let git = Git::new(ctx.runner, ctx.workdir);
        let target = &self.next.version;
        let tag = self.next.tag();
        let mut stages = Vec::new();
        let mut record = |stage: ReleaseStage, outcome: StageOutcome| {
            on_stage(stage, &outcome);
            stages.push((stage, outcome));
        };

        // ── Identity ──
        let outcome = if is_dry {
            StageOutcome::success(format!(
                "would set committer {} <{}>",
                opts.committer.name, opts.committer.email
            ))
        } else {
            git.configure_identity(&opts.committer.name, &opts.committer.email)?;
            StageOutcome::success(format!(
                "{} <{}>",
                opts.committer.name, opts.committer.email
            ))
        };
        record(ReleaseStage::IdentityConfigured, outcome);

        // ── Starting checkout ──
        let outcome = apply_version(ctx, target, "current checkout", is_dry)?;
        record(ReleaseStage::CurrentContextVersioned, outcome);
        let outcome = commit(&git, &self.commit_message, opts.skip_commit, is_dry)?;
        record(ReleaseStage::CurrentContextCommitted, outcome);

        // ── Target branch ──
        let branch = ctx.branches.resolve_target_branch()?;
        let outcome = if is_dry {
            StageOutcome::success(format!("would check out {}", branch.name))
        } else {
            if branch.pull_request {
                git.fetch()?;
            }
            git.checkout(&branch.name)?;
            StageOutcome::success(format!("checked out {}", branch.name))
        };
        record(ReleaseStage::TargetBranchResolved, outcome);

        let outcome = apply_version(ctx, target, "target branch", is_dry)?;
        record(ReleaseStage::TargetContextVersioned, outcome);
        let outcome = commit(&git, &self.commit_message, opts.skip_commit, is_dry)?;
        record(ReleaseStage::TargetContextCommitted, outcome);

        // ── Tag ──
        let outcome = if opts.skip_tag {
            StageOutcome::skipped("tagging disabled")
        } else if is_dry {
            StageOutcome::success(format!("would tag {tag}"))
        } else {
            git.tag(&tag)?;
            StageOutcome::success(format!("tagged {tag}"))
        };
        record(ReleaseStage::Tagged, outcome);

        // ── Push ──
        let outcome = if opts.skip_push {
            StageOutcome::skipped("pushing disabled")
        } else if is_dry {
            StageOutcome::success(format!("would push {} to {}", branch.name, ctx.remote))
        } else if opts.skip_tag {
            git.push(ctx.remote)?;
            StageOutcome::success(format!("pushed {} to {}", branch.name, ctx.remote))
        } else {
            let branch_pushed = git.push_follow_tags(ctx.remote);
            git.push_tags(ctx.remote)?;
            if branch_pushed {
                StageOutcome::success(format!(
                    "pushed {} and {tag} to {}",
                    branch.name, ctx.remote
                ))
            } else {
                warn!(branch = %branch.name, "branch push failed, only tags were pushed");
                StageOutcome::success(format!(
                    "pushed {tag} to {}; push of {} with --follow-tags failed, commit not pushed",
                    ctx.remote, branch.name
                ))
            }
        };
        record(ReleaseStage::Pushed, outcome);

        info!(tag = %tag, branch = %branch.name, "release complete");
        Ok(ReleaseOutcome {
            previous_version: self.current,
            version: self.next.version,
            tag,
            branch: branch.name,
            stages,
            dry_run: is_dry,
        })
    }
}

fn apply_version(
    ctx: &ReleaseContext<'_>,
    target: &Version,
    context: &'static str,
    is_dry: bool,
) -> ReleaseResult<StageOutcome> {
    if is_dry {
        return Ok(StageOutcome::success(format!(
            "would write {target} to {}",
            ctx.versions.describe()
        )));
    }
    let actual = ctx.versions.apply(ctx.runner, ctx.workdir, target)?;
    if actual != *target {
        return Err(ReleaseError::ContextDivergence {
            context,
            expected: target.clone(),
            actual,
        });
    }
    Ok(StageOutcome::success(format!(
        "wrote {target} to {}",
        ctx.versions.describe()
    )))
}

fn commit<R: CommandRunner>(
    git: &Git<R>,
    message: &str,
    skip: bool,
    is_dry: bool,
) -> ReleaseResult<StageOutcome> {
    if skip {
        return Ok(StageOutcome::skipped("committing disabled"));
    }
    if is_dry {
        return Ok(StageOutcome::success(format!("would commit \"{message}\"")));
    }
    // The starting checkout's commit may already be on the target branch.
    if git.is_clean()? {
        return Ok(StageOutcome::skipped("nothing to commit"));
    }
    git.commit_all(message)?;
    Ok(StageOutcome::success(format!("committed \"{message}\"")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::CiBranchSource;
    use crate::exec::{ExecError, ExecResult};
    use crate::manifest::{ManifestResult, ManifestVersionSource};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Records every command; `git status` answers from a queue.
    #[derive(Default)]
    struct Script {
        calls: RefCell<Vec<String>>,
        status: RefCell<VecDeque<&'static str>>,
        fail_on: Option<&'static str>,
    }

    impl Script {
        fn with_status(status: &[&'static str]) -> Self {
            Self {
                status: RefCell::new(status.iter().copied().collect()),
                ..Self::default()
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.borrow().clone()
        }

        fn mutating_calls(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter(|c| !c.starts_with("git status"))
                .collect()
        }
    }

    impl CommandRunner for Script {
        fn run(&self, program: &str, args: &[&str], _workdir: &Utf8Path) -> ExecResult<String> {
            let line = format!("{program} {}", args.join(" "));
            self.calls.borrow_mut().push(line.clone());
            if self.fail_on.is_some_and(|needle| line.contains(needle)) {
                return Err(ExecError::Failed {
                    program: program.into(),
                    subcommand: args.first().copied().unwrap_or("").into(),
                    stderr: "remote rejected".into(),
                    exit_code: Some(1),
                });
            }
            if args.first() == Some(&"status") {
                let next = self.status.borrow_mut().pop_front();
                return Ok(next.unwrap_or(" M package.json\n").into());
            }
            Ok(String::new())
        }
    }

    /// In-memory version source.
    struct Fixed {
        current: Version,
        applied: RefCell<Vec<Version>>,
        diverge_on: Option<usize>,
    }

    impl Fixed {
        fn new(current: &str) -> Self {
            Self {
                current: version::parse_version(current).unwrap(),
                applied: RefCell::new(Vec::new()),
                diverge_on: None,
            }
        }
    }

    impl VersionSource for Fixed {
        fn current_version(&self) -> ManifestResult<Version> {
            Ok(self.current.clone())
        }

        fn apply(
            &self,
            _runner: &dyn CommandRunner,
            _workdir: &Utf8Path,
            version: &Version,
        ) -> ManifestResult<Version> {
            let mut applied = self.applied.borrow_mut();
            applied.push(version.clone());
            if self.diverge_on == Some(applied.len()) {
                return Ok(self.current.clone());
            }
            Ok(version.clone())
        }

        fn describe(&self) -> String {
            "memory".into()
        }
    }

    fn options() -> ReleaseOptions {
        ReleaseOptions {
            tag_prefix: "v".into(),
            commit_message: guard::DEFAULT_COMMIT_MESSAGE.into(),
            ..ReleaseOptions::default()
        }
    }

    fn push_branch(name: &str) -> CiBranchSource {
        CiBranchSource {
            git_ref: Some(format!("refs/heads/{name}")),
            ..CiBranchSource::default()
        }
    }

    fn ready(plan: ReleasePlan) -> ReadyRelease {
        match plan {
            ReleasePlan::Ready(ready) => ready,
            other => panic!("expected a ready plan, got {other:?}"),
        }
    }

    fn origin() -> PushRemote {
        PushRemote::Named("origin".into())
    }

    #[test]
    fn breaking_change_releases_major() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["feat: x\nbreaking change"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        assert_eq!(plan.action, ReleaseAction::Major);
        assert_eq!(plan.next.tag(), "v2.0.0");

        let runner = Script::default();
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let outcome = plan.execute(&ctx, |_, _| {}).unwrap();

        assert_eq!(outcome.tag, "v2.0.0");
        assert_eq!(outcome.branch, "main");
        assert_eq!(
            runner.mutating_calls(),
            vec![
                format!("git config user.name {DEFAULT_COMMITTER_NAME}"),
                format!("git config user.email {DEFAULT_COMMITTER_EMAIL}"),
                "git commit -a -m ci: version bump to v2.0.0".to_string(),
                "git checkout main".to_string(),
                "git commit -a -m ci: version bump to v2.0.0".to_string(),
                "git tag v2.0.0".to_string(),
                "git push origin --follow-tags".to_string(),
                "git push origin --tags".to_string(),
            ]
        );
        // both contexts received the same version
        assert_eq!(
            *source.applied.borrow(),
            vec![Version::new(2, 0, 0), Version::new(2, 0, 0)]
        );
    }

    #[test]
    fn prior_bump_commit_is_a_no_op() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["ci: version bump to v1.0.0"]);
        let plan = plan_release(&batch, options(), &source).unwrap();
        assert!(matches!(plan, ReleasePlan::AlreadyBumped));
        assert!(source.applied.borrow().is_empty());
    }

    #[test]
    fn custom_without_directive_fails_before_mutation() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["docs only"]);
        let opts = ReleaseOptions {
            explicit: Some(ReleaseAction::Custom),
            ..options()
        };
        let err = plan_release(&batch, opts, &source).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Version(VersionError::NoCandidateFound)
        ));
        assert!(source.applied.borrow().is_empty());
    }

    #[test]
    fn custom_directive_sets_version() {
        let source = Fixed::new("1.2.0");
        let batch = CommitBatch::from_messages([
            "chore: SET VERSION NUMBER {1.10.0}",
            "SET VERSION NUMBER {1.3.0}",
        ]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        assert_eq!(plan.action, ReleaseAction::Custom);
        assert_eq!(plan.next.version, Version::new(1, 10, 0));
    }

    #[test]
    fn custom_directive_must_increase() {
        let source = Fixed::new("2.0.0");
        let batch = CommitBatch::from_messages(["SET VERSION NUMBER {v2.0.0}"]);
        let err = plan_release(&batch, options(), &source).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::Version(VersionError::NonMonotonic { .. })
        ));
    }

    #[test]
    fn no_keywords_is_no_release() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["fix: typo"]);
        let plan = plan_release(&batch, options(), &source).unwrap();
        assert!(matches!(plan, ReleasePlan::NoRelease));
    }

    #[test]
    fn pull_request_fetches_before_checkout() {
        let source = Fixed::new("0.1.0");
        let batch = CommitBatch::from_messages(["new feature"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        let runner = Script::default();
        let branches = CiBranchSource {
            head_ref: Some("feature/x".into()),
            git_ref: Some("refs/pull/3/merge".into()),
            ..CiBranchSource::default()
        };
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        plan.execute(&ctx, |_, _| {}).unwrap();

        let calls = runner.calls();
        let fetch = calls.iter().position(|c| c == "git fetch").unwrap();
        let checkout = calls
            .iter()
            .position(|c| c == "git checkout feature/x")
            .unwrap();
        assert!(fetch < checkout);
    }

    #[test]
    fn clean_target_tree_skips_second_commit() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["minor"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        let runner = Script::with_status(&[" M package.json\n", ""]);
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let outcome = plan.execute(&ctx, |_, _| {}).unwrap();

        assert!(
            outcome
                .stage(ReleaseStage::CurrentContextCommitted)
                .unwrap()
                .ran()
        );
        assert_eq!(
            outcome.stage(ReleaseStage::TargetContextCommitted),
            Some(&StageOutcome::skipped("nothing to commit"))
        );
        let commits = runner
            .calls()
            .into_iter()
            .filter(|c| c.starts_with("git commit"))
            .count();
        assert_eq!(commits, 1);
    }

    #[test]
    fn skipped_tag_pushes_branch_only() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["minor"]);
        let opts = ReleaseOptions {
            skip_tag: true,
            ..options()
        };
        let plan = ready(plan_release(&batch, opts, &source).unwrap());
        let runner = Script::default();
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        plan.execute(&ctx, |_, _| {}).unwrap();

        let calls = runner.calls();
        assert!(calls.iter().all(|c| !c.starts_with("git tag")));
        assert_eq!(calls.last().map(String::as_str), Some("git push origin"));
    }

    #[test]
    fn skip_switches_leave_only_version_writes() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["major"]);
        let opts = ReleaseOptions {
            skip_commit: true,
            skip_tag: true,
            skip_push: true,
            ..options()
        };
        let plan = ready(plan_release(&batch, opts, &source).unwrap());
        let runner = Script::default();
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let outcome = plan.execute(&ctx, |_, _| {}).unwrap();

        assert_eq!(
            runner.mutating_calls(),
            vec![
                format!("git config user.name {DEFAULT_COMMITTER_NAME}"),
                format!("git config user.email {DEFAULT_COMMITTER_EMAIL}"),
                "git checkout main".to_string(),
            ]
        );
        assert!(!outcome.stage(ReleaseStage::Pushed).unwrap().ran());
    }

    #[test]
    fn follow_tags_failure_does_not_abort() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["patch it"]);
        let opts = ReleaseOptions {
            policy: KeywordPolicy {
                patch: Some(vec!["patch".into()]),
                ..KeywordPolicy::default()
            },
            ..options()
        };
        let plan = ready(plan_release(&batch, opts, &source).unwrap());
        let runner = Script {
            fail_on: Some("--follow-tags"),
            ..Script::default()
        };
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let outcome = plan.execute(&ctx, |_, _| {}).unwrap();
        assert_eq!(outcome.tag, "v1.0.1");
        assert_eq!(
            runner.calls().last().map(String::as_str),
            Some("git push origin --tags")
        );
        match outcome.stage(ReleaseStage::Pushed) {
            Some(StageOutcome::Success { message }) => {
                assert!(message.contains("commit not pushed"), "{message}");
                assert!(!message.contains("pushed main and"), "{message}");
            }
            other => panic!("unexpected push outcome: {other:?}"),
        }
    }

    #[test]
    fn explicit_custom_reads_directives_when_keyword_scan_is_off() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages([
            "SET VERSION NUMBER {1.4.0}",
            "docs: readme",
        ]);
        let opts = ReleaseOptions {
            explicit: Some(ReleaseAction::Custom),
            keyword_scope: BumpScope::Ignore,
            ..options()
        };
        let plan = ready(plan_release(&batch, opts, &source).unwrap());
        assert_eq!(plan.next.version, Version::new(1, 4, 0));
    }

    #[test]
    fn failing_command_aborts_run() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["minor"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        let runner = Script {
            fail_on: Some("checkout"),
            ..Script::default()
        };
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let err = plan.execute(&ctx, |_, _| {}).unwrap_err();
        assert!(err.to_string().contains("remote rejected"));
        assert!(runner.calls().iter().all(|c| !c.starts_with("git tag")));
    }

    #[test]
    fn missing_branch_is_fatal() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["minor"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        let runner = Script::default();
        let branches = CiBranchSource::default();
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let err = plan.execute(&ctx, |_, _| {}).unwrap_err();
        assert!(matches!(err, ReleaseError::Branch(BranchError::NoBranchFound)));
    }

    #[test]
    fn diverging_target_context_fails() {
        let source = Fixed {
            diverge_on: Some(2),
            ..Fixed::new("1.0.0")
        };
        let batch = CommitBatch::from_messages(["minor"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        let runner = Script::default();
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let err = plan.execute(&ctx, |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::ContextDivergence {
                context: "target branch",
                ..
            }
        ));
    }

    #[test]
    fn manifest_left_unchanged_by_writer_diverges() {
        let tmp = tempfile::TempDir::new().unwrap();
        let ws = camino::Utf8PathBuf::try_from(tmp.path().to_path_buf()).unwrap();
        std::fs::write(ws.join("package.json"), r#"{"version":"1.0.0"}"#).unwrap();
        let source = ManifestVersionSource::in_workspace(&ws);
        let batch = CommitBatch::from_messages(["minor"]);
        let plan = ready(plan_release(&batch, options(), &source).unwrap());
        // the fake runner never rewrites package.json
        let runner = Script::default();
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: &ws,
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let err = plan.execute(&ctx, |_, _| {}).unwrap_err();
        assert!(matches!(
            err,
            ReleaseError::ContextDivergence {
                context: "current checkout",
                ..
            }
        ));
        assert!(
            runner
                .calls()
                .contains(&"npm version --allow-same-version=true --git-tag-version=false 1.1.0".to_string())
        );
    }

    #[test]
    fn dry_run_runs_nothing() {
        let source = Fixed::new("1.0.0");
        let batch = CommitBatch::from_messages(["major"]);
        let opts = ReleaseOptions {
            dry_run: true,
            ..options()
        };
        let plan = ready(plan_release(&batch, opts, &source).unwrap());
        let runner = Script::default();
        let branches = push_branch("main");
        let remote = origin();
        let ctx = ReleaseContext {
            runner: &runner,
            workdir: Utf8Path::new("/work"),
            branches: &branches,
            versions: &source,
            remote: &remote,
        };
        let mut seen = Vec::new();
        let outcome = plan.execute(&ctx, |stage, _| seen.push(stage)).unwrap();

        assert!(outcome.dry_run);
        assert!(runner.calls().is_empty());
        assert!(source.applied.borrow().is_empty());
        assert_eq!(seen.len(), 8);
        assert_eq!(seen.last(), Some(&ReleaseStage::Pushed));
    }

    #[test]
    fn committer_prefers_config_then_fallback() {
        let config = Config {
            committer_name: Some("Release Bot".into()),
            ..Config::default()
        };
        let fallback = Committer {
            name: "ci-user".into(),
            email: "ci@example.com".into(),
        };
        let opts = ReleaseOptions::from_config(&config, &fallback);
        assert_eq!(opts.committer.name, "Release Bot");
        assert_eq!(opts.committer.email, "ci@example.com");
    }
}
