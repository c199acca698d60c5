//! CI runner environment.
//!
//! Everything the run needs from `GITHUB_*` and friends is read once into a
//! [`CiEnvironment`] and passed down explicitly.

use std::fs::OpenOptions;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::branch::CiBranchSource;
use crate::git::PushRemote;

/// Values taken from the CI runner's environment.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct CiEnvironment {
    /// Checkout root (`GITHUB_WORKSPACE`, or the current directory).
    pub workspace: Utf8PathBuf,
    /// Sub-directory holding the manifest (`PACKAGEJSON_DIR`).
    pub manifest_dir: Option<String>,
    /// Event payload file (`GITHUB_EVENT_PATH`).
    pub event_path: Option<Utf8PathBuf>,
    /// Triggering ref (`GITHUB_REF`).
    pub git_ref: Option<String>,
    /// Pull request head ref (`GITHUB_HEAD_REF`).
    pub head_ref: Option<String>,
    /// Account that triggered the run (`GITHUB_ACTOR`).
    pub actor: Option<String>,
    /// Token used for pushes and API calls (`GITHUB_TOKEN`).
    pub token: Option<String>,
    /// `owner/repo` (`GITHUB_REPOSITORY`).
    pub repository: Option<String>,
    /// Committer name (`GITHUB_USER`).
    pub user: Option<String>,
    /// Committer email (`GITHUB_EMAIL`).
    pub email: Option<String>,
    /// Externally supplied current version (`CURRENT_TAG`).
    pub current_tag: Option<String>,
    /// Step output file (`GITHUB_OUTPUT`).
    pub output_file: Option<Utf8PathBuf>,
}

impl std::fmt::Debug for CiEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CiEnvironment")
            .field("workspace", &self.workspace)
            .field("manifest_dir", &self.manifest_dir)
            .field("event_path", &self.event_path)
            .field("git_ref", &self.git_ref)
            .field("head_ref", &self.head_ref)
            .field("actor", &self.actor)
            .field("token", &self.token.as_ref().map(|_| "***"))
            .field("repository", &self.repository)
            .field("current_tag", &self.current_tag)
            .finish_non_exhaustive()
    }
}

impl CiEnvironment {
    /// Read from the process environment, defaulting the workspace to `cwd`.
    pub fn from_env(cwd: &Utf8Path) -> Self {
        Self::from_lookup(cwd, |key| std::env::var(key).ok())
    }

    /// Read through `lookup`, defaulting the workspace to `cwd`.
    ///
    /// Empty values count as unset.
    pub fn from_lookup(cwd: &Utf8Path, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        Self {
            workspace: get("GITHUB_WORKSPACE").map_or_else(|| cwd.to_path_buf(), Utf8PathBuf::from),
            manifest_dir: get("PACKAGEJSON_DIR"),
            event_path: get("GITHUB_EVENT_PATH").map(Utf8PathBuf::from),
            git_ref: get("GITHUB_REF"),
            head_ref: get("GITHUB_HEAD_REF"),
            actor: get("GITHUB_ACTOR"),
            token: get("GITHUB_TOKEN"),
            repository: get("GITHUB_REPOSITORY"),
            user: get("GITHUB_USER"),
            email: get("GITHUB_EMAIL"),
            current_tag: get("CURRENT_TAG"),
            output_file: get("GITHUB_OUTPUT").map(Utf8PathBuf::from),
        }
    }

    /// Directory that holds the manifest and where every command runs.
    pub fn project_dir(&self) -> Utf8PathBuf {
        self.manifest_dir
            .as_deref()
            .map_or_else(|| self.workspace.clone(), |dir| self.workspace.join(dir))
    }

    /// Branch inputs, with an optional explicit override.
    pub fn branch_source(&self, target_override: Option<&str>) -> CiBranchSource {
        CiBranchSource {
            target_override: target_override.map(String::from),
            head_ref: self.head_ref.clone(),
            git_ref: self.git_ref.clone(),
        }
    }

    /// Append `name=value` to the step output file.
    ///
    /// Returns `Ok(false)` when the runner provides no output file; callers
    /// then fall back to the legacy `::set-output` workflow command.
    pub fn write_output(&self, name: &str, value: &str) -> std::io::Result<bool> {
        let Some(ref path) = self.output_file else {
            return Ok(false);
        };
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{name}={value}")?;
        debug!(%name, %value, %path, "step output written");
        Ok(true)
    }

    /// Remote that pushes go to.
    pub fn push_remote(&self) -> PushRemote {
        PushRemote::from_credentials(
            self.actor.as_deref(),
            self.token.as_deref(),
            self.repository.as_deref(),
        )
    }
}
