//! Commit classification: turn a batch of commit messages into one
//! [`ReleaseAction`].
//!
//! Matching is plain substring search over `subject + "\n" + body`, checked
//! in precedence order **custom > major > minor > patch**.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::ConfigError;
use crate::version::BumpLevel;

/// What the run should do with the version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseAction {
    /// Leave the version alone.
    Skip,
    /// Use a version named by a `SET VERSION NUMBER {..}` directive.
    Custom,
    /// Major release (X.0.0).
    Major,
    /// Minor release (x.Y.0).
    Minor,
    /// Patch release (x.y.Z).
    Patch,
}

impl ReleaseAction {
    /// The increment this action applies, if it is a plain semver bump.
    pub const fn bump_level(self) -> Option<BumpLevel> {
        match self {
            Self::Major => Some(BumpLevel::Major),
            Self::Minor => Some(BumpLevel::Minor),
            Self::Patch => Some(BumpLevel::Patch),
            Self::Skip | Self::Custom => None,
        }
    }
}

impl From<BumpLevel> for ReleaseAction {
    fn from(level: BumpLevel) -> Self {
        match level {
            BumpLevel::Major => Self::Major,
            BumpLevel::Minor => Self::Minor,
            BumpLevel::Patch => Self::Patch,
        }
    }
}

impl fmt::Display for ReleaseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Custom => write!(f, "custom"),
            Self::Major => write!(f, "major"),
            Self::Minor => write!(f, "minor"),
            Self::Patch => write!(f, "patch"),
        }
    }
}

impl FromStr for ReleaseAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "custom" => Ok(Self::Custom),
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            _ => Err(ConfigError::InvalidReleaseType(s.to_string())),
        }
    }
}

/// Which commit messages a scan looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum BumpScope {
    /// Every message in the batch.
    #[default]
    All,
    /// Only the most recent message.
    LastCommit,
    /// Nothing; the scan is disabled.
    Ignore,
}

impl BumpScope {
    /// The slice of `messages` this scope considers.
    ///
    /// Messages are ordered oldest first.
    pub fn select<'a, S: AsRef<str>>(self, messages: &'a [S]) -> &'a [S] {
        match self {
            Self::All => messages,
            Self::LastCommit => messages
                .len()
                .checked_sub(1)
                .map_or(&messages[..0], |last| &messages[last..]),
            Self::Ignore => &messages[..0],
        }
    }
}

impl fmt::Display for BumpScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::LastCommit => write!(f, "last-commit"),
            Self::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for BumpScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(Self::All),
            "last-commit" => Ok(Self::LastCommit),
            "ignore" => Ok(Self::Ignore),
            _ => Err(ConfigError::InvalidValue {
                field: "bump policy",
                value: s.to_string(),
            }),
        }
    }
}

/// Trigger phrases for each release action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeywordPolicy {
    /// Phrases that request a custom version.
    pub custom: Vec<String>,
    /// Phrases that request a major bump.
    pub major: Vec<String>,
    /// Phrases that request a minor bump.
    pub minor: Vec<String>,
    /// Phrases that request a patch bump. `None` disables keyword patches.
    pub patch: Option<Vec<String>>,
    /// Action used when nothing matches. `None` means skip.
    pub fallback: Option<BumpLevel>,
}

impl Default for KeywordPolicy {
    fn default() -> Self {
        Self {
            custom: strings(&["SET VERSION NUMBER"]),
            major: strings(&["MAJOR VERSION INCREMENT", "major", "breaking change"]),
            minor: strings(&["MINOR VERSION INCREMENT", "new feature", "minor"]),
            patch: None,
            fallback: None,
        }
    }
}

fn strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

impl KeywordPolicy {
    /// Precedence-ordered (action, triggers) pairs.
    fn ordered(&self) -> [(ReleaseAction, &[String]); 4] {
        [
            (ReleaseAction::Custom, self.custom.as_slice()),
            (ReleaseAction::Major, self.major.as_slice()),
            (ReleaseAction::Minor, self.minor.as_slice()),
            (ReleaseAction::Patch, self.patch.as_deref().unwrap_or(&[])),
        ]
    }
}

/// Classify a batch of commit messages into a single release action.
///
/// `explicit` wins outright. Otherwise the messages selected by `scope`
/// are scanned against `policy`.
#[instrument(skip(messages, policy), fields(count = messages.len()))]
pub fn classify<S: AsRef<str>>(
    messages: &[S],
    policy: &KeywordPolicy,
    explicit: Option<ReleaseAction>,
    scope: BumpScope,
) -> ReleaseAction {
    if let Some(action) = explicit {
        debug!(%action, "explicit release type");
        return action;
    }

    if scope == BumpScope::Ignore {
        debug!("keyword scan disabled");
        return ReleaseAction::Skip;
    }

    let considered = scope.select(messages);
    for (action, triggers) in policy.ordered() {
        if matches_any(considered, triggers) {
            debug!(%action, "keyword match");
            return action;
        }
    }

    let action = policy
        .fallback
        .map_or(ReleaseAction::Skip, ReleaseAction::from);
    debug!(%action, "no keyword match");
    action
}

/// Whether any message contains any trigger. Empty triggers never match.
fn matches_any<S: AsRef<str>>(messages: &[S], triggers: &[String]) -> bool {
    messages.iter().any(|message| {
        triggers
            .iter()
            .filter(|t| !t.is_empty())
            .any(|t| message.as_ref().contains(t.as_str()))
    })
}
