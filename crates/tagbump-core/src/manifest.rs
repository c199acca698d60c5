//! Where the current version comes from and how a new one is written back.
//!
//! [`ManifestVersionSource`] reads `package.json` and writes through
//! `npm version`. [`TagVersionSource`] takes the current version from the
//! environment (e.g. the latest tag) and has no file to update.

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::exec::{CommandRunner, ExecError};
use crate::version::{VersionError, parse_version};

/// Manifest file name looked up in the workspace.
pub const MANIFEST_FILE: &str = "package.json";

/// Errors from reading or writing the project version.
#[derive(Error, Debug)]
pub enum ManifestError {
    /// The manifest file does not exist.
    #[error("{0} could not be found in your project's root")]
    NotFound(Utf8PathBuf),

    /// The manifest could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The manifest is not valid JSON.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Manifest path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// The manifest has no `version` field.
    #[error("{0} has no version field")]
    MissingVersion(Utf8PathBuf),

    /// The version string is not semver.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The version writer failed.
    #[error(transparent)]
    Exec(#[from] ExecError),
}

/// Result alias for manifest operations.
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Reads the current version and applies a new one to a working tree.
pub trait VersionSource {
    /// The version before any change.
    fn current_version(&self) -> ManifestResult<Version>;

    /// Write `version` into the working tree at `workdir` without committing.
    ///
    /// Re-applying the version already present is not an error. Returns the
    /// version the working tree holds afterwards.
    fn apply(
        &self,
        runner: &dyn CommandRunner,
        workdir: &Utf8Path,
        version: &Version,
    ) -> ManifestResult<Version>;

    /// Short label for logs and reports.
    fn describe(&self) -> String;
}

#[derive(Deserialize)]
struct PackageJson {
    version: Option<serde_json::Value>,
}

/// `package.json` version, rewritten with `npm version`.
#[derive(Debug, Clone)]
pub struct ManifestVersionSource {
    path: Utf8PathBuf,
}

impl ManifestVersionSource {
    /// Use the manifest inside `workspace`.
    pub fn in_workspace(workspace: &Utf8Path) -> Self {
        Self {
            path: workspace.join(MANIFEST_FILE),
        }
    }

    /// Manifest path.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    fn read(&self) -> ManifestResult<Version> {
        if !self.path.is_file() {
            return Err(ManifestError::NotFound(self.path.clone()));
        }
        let text = std::fs::read_to_string(&self.path).map_err(|source| ManifestError::Read {
            path: self.path.clone(),
            source,
        })?;
        let pkg: PackageJson =
            serde_json::from_str(&text).map_err(|source| ManifestError::Parse {
                path: self.path.clone(),
                source,
            })?;
        let raw = match pkg.version {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => return Err(ManifestError::MissingVersion(self.path.clone())),
        };
        Ok(parse_version(&raw)?)
    }
}

impl VersionSource for ManifestVersionSource {
    #[instrument(skip(self), fields(path = %self.path))]
    fn current_version(&self) -> ManifestResult<Version> {
        let version = self.read()?;
        debug!(%version, "manifest version");
        Ok(version)
    }

    #[instrument(skip(self, runner), fields(path = %self.path))]
    fn apply(
        &self,
        runner: &dyn CommandRunner,
        workdir: &Utf8Path,
        version: &Version,
    ) -> ManifestResult<Version> {
        let target = version.to_string();
        runner.run(
            "npm",
            &[
                "version",
                "--allow-same-version=true",
                "--git-tag-version=false",
                &target,
            ],
            workdir,
        )?;
        self.read()
    }

    fn describe(&self) -> String {
        self.path.to_string()
    }
}

/// Externally supplied current version with no file to update.
#[derive(Debug, Clone)]
pub struct TagVersionSource {
    current: String,
}

impl TagVersionSource {
    /// Use `current` (e.g. `v1.2.3`) as the current version.
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
        }
    }
}

impl VersionSource for TagVersionSource {
    fn current_version(&self) -> ManifestResult<Version> {
        Ok(parse_version(&self.current)?)
    }

    fn apply(
        &self,
        _runner: &dyn CommandRunner,
        _workdir: &Utf8Path,
        version: &Version,
    ) -> ManifestResult<Version> {
        debug!(%version, "tag-only project, nothing to write");
        Ok(version.clone())
    }

    fn describe(&self) -> String {
        format!("tag {}", self.current)
    }
}
