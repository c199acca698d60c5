//! Target branch resolution.
//!
//! CI checkouts are often a detached `HEAD`, so the branch the bump must land
//! on is worked out from the run's context: an explicit override first, then
//! the pull request head, then the triggering ref.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from branch resolution.
#[derive(Error, Debug)]
pub enum BranchError {
    /// Nothing named a branch.
    #[error("no branch found")]
    NoBranchFound,
}

/// Result alias for branch resolution.
pub type BranchResult<T> = Result<T, BranchError>;

/// Which input named the target branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchOrigin {
    /// Configured target branch override.
    Override,
    /// Pull request head ref.
    PullRequest,
    /// Parsed from `refs/<kind>/<name>`.
    Ref,
}

/// The branch the bump is applied to, and how it was found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedBranch {
    /// Branch name to check out and push.
    pub name: String,
    /// Which input supplied the name.
    pub origin: BranchOrigin,
    /// The run was triggered by a pull request; fetch before checkout.
    pub pull_request: bool,
}

/// Something that can name the branch a release lands on.
pub trait BranchSource {
    /// Resolve the target branch.
    ///
    /// # Errors
    ///
    /// [`BranchError::NoBranchFound`] when no input names a branch.
    fn resolve_target_branch(&self) -> BranchResult<ResolvedBranch>;
}

/// Branch inputs taken from the CI environment.
#[derive(Debug, Clone, Default)]
pub struct CiBranchSource {
    /// Explicit target branch.
    pub target_override: Option<String>,
    /// Pull request head ref (`GITHUB_HEAD_REF`).
    pub head_ref: Option<String>,
    /// Triggering ref (`GITHUB_REF`).
    pub git_ref: Option<String>,
}

impl BranchSource for CiBranchSource {
    #[instrument(skip(self))]
    fn resolve_target_branch(&self) -> BranchResult<ResolvedBranch> {
        let head_ref = non_empty(self.head_ref.as_deref());
        let pull_request = head_ref.is_some();

        let (name, origin) = if let Some(name) = non_empty(self.target_override.as_deref()) {
            (name, BranchOrigin::Override)
        } else if let Some(name) = head_ref {
            (name, BranchOrigin::PullRequest)
        } else if let Some(name) = non_empty(self.git_ref.as_deref()).and_then(branch_from_ref) {
            (name, BranchOrigin::Ref)
        } else {
            return Err(BranchError::NoBranchFound);
        };

        debug!(branch = name, ?origin, pull_request, "resolved target branch");
        Ok(ResolvedBranch {
            name: name.to_string(),
            origin,
            pull_request,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Extract the name from a fully-qualified ref such as `refs/heads/main`.
///
/// Everything after `refs/<kind>/` is returned, slashes included.
pub fn branch_from_ref(git_ref: &str) -> Option<&str> {
    let rest = git_ref.strip_prefix("refs/")?;
    let (kind, name) = rest.split_once('/')?;
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_alphabetic()) || name.is_empty() {
        return None;
    }
    Some(name)
}
