//! Version computation.
//!
//! Given the current version and a [`ReleaseAction`], produce the next
//! version. Plain bumps follow semver increment rules; custom versions must
//! strictly increase.

use std::fmt;
use std::str::FromStr;

use semver::{BuildMetadata, Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::classify::ReleaseAction;
use crate::error::ConfigError;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver: {0}")]
    InvalidSemver(#[from] semver::Error),

    /// A custom version was requested but no directive names one.
    #[error("no custom version numbers found (expected `SET VERSION NUMBER {{X.Y.Z}}`)")]
    NoCandidateFound,

    /// The custom version does not move forward.
    #[error("new custom version {candidate} must be higher than current version {current}")]
    NonMonotonic {
        /// Requested version.
        candidate: Version,
        /// Version read from the project.
        current: Version,
    },

    /// The action does not produce a version.
    #[error("release action `{0}` does not produce a new version")]
    NothingToBump(ReleaseAction),

    /// The bumped component would not fit in a `u64`.
    #[error("cannot apply a {level} bump to {current}: component overflows")]
    Overflow {
        /// Requested bump.
        level: BumpLevel,
        /// Version read from the project.
        current: Version,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

impl FromStr for BumpLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            _ => Err(ConfigError::InvalidValue {
                field: "bump level",
                value: s.to_string(),
            }),
        }
    }
}

/// A computed release version together with the tag prefix it is shown with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextVersion {
    /// The bare version written to the manifest.
    pub version: Version,
    /// Prefix for tags and commit messages (may be empty).
    pub tag_prefix: String,
}

impl NextVersion {
    /// The tag name, e.g. `v1.4.0`.
    pub fn tag(&self) -> String {
        format!("{}{}", self.tag_prefix, self.version)
    }
}

impl fmt::Display for NextVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tag_prefix, self.version)
    }
}

/// Compute the next version by applying a bump level.
///
/// A pre-release is promoted to its release when the bump would not move
/// past it (`1.2.3-rc.1` patch -> `1.2.3`); build metadata is always dropped.
///
/// # Errors
///
/// [`VersionError::Overflow`] when the bumped component is already `u64::MAX`.
pub fn next_version(current: &Version, level: BumpLevel) -> VersionResult<Version> {
    let prerelease = !current.pre.is_empty();
    let inc = |n: u64| {
        n.checked_add(1).ok_or_else(|| VersionError::Overflow {
            level,
            current: current.clone(),
        })
    };
    let mut next = match level {
        BumpLevel::Patch if prerelease => current.clone(),
        BumpLevel::Patch => Version::new(current.major, current.minor, inc(current.patch)?),
        BumpLevel::Minor if prerelease && current.patch == 0 => current.clone(),
        BumpLevel::Minor => Version::new(current.major, inc(current.minor)?, 0),
        BumpLevel::Major if prerelease && current.minor == 0 && current.patch == 0 => {
            current.clone()
        }
        BumpLevel::Major => Version::new(inc(current.major)?, 0, 0),
    };
    next.pre = Prerelease::EMPTY;
    next.build = BuildMetadata::EMPTY;
    Ok(next)
}

/// Resolve the version a release action leads to.
///
/// `candidate` is only consulted for [`ReleaseAction::Custom`].
///
/// # Errors
///
/// - [`VersionError::NoCandidateFound`] for a custom action without candidate
/// - [`VersionError::NonMonotonic`] when the candidate is not above `current`
/// - [`VersionError::NothingToBump`] for [`ReleaseAction::Skip`]
#[instrument(skip(tag_prefix))]
pub fn resolve_next(
    current: &Version,
    action: ReleaseAction,
    candidate: Option<&Version>,
    tag_prefix: &str,
) -> VersionResult<NextVersion> {
    let version = match (action.bump_level(), action) {
        (Some(level), _) => next_version(current, level)?,
        (None, ReleaseAction::Custom) => {
            let candidate = candidate.ok_or(VersionError::NoCandidateFound)?;
            if candidate <= current {
                return Err(VersionError::NonMonotonic {
                    candidate: candidate.clone(),
                    current: current.clone(),
                });
            }
            candidate.clone()
        }
        (None, other) => return Err(VersionError::NothingToBump(other)),
    };

    debug!(%current, %version, "next version");
    Ok(NextVersion {
        version,
        tag_prefix: tag_prefix.to_string(),
    })
}

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    Ok(Version::parse(s)?)
}
