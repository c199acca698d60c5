//! `SET VERSION NUMBER {X.Y.Z}` directives.
//!
//! A commit can pin the next release to an explicit version. Every
//! directive in the batch is collected; the highest version wins.

use std::sync::LazyLock;

use regex::Regex;
use semver::Version;
use tracing::{debug, instrument};

use crate::version::{VersionError, VersionResult, parse_version};

static DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"SET VERSION NUMBER \{(v?[0-9]+\.[0-9]+\.[0-9]+)\}")
        .unwrap_or_else(|e| panic!("directive pattern is valid: {e}"))
});

/// Collect every custom version named in `messages`, in message order.
#[instrument(skip(messages), fields(count = messages.len()))]
pub fn extract_candidates<S: AsRef<str>>(messages: &[S]) -> Vec<Version> {
    let candidates: Vec<Version> = messages
        .iter()
        .flat_map(|message| {
            DIRECTIVE
                .captures_iter(message.as_ref())
                .filter_map(|caps| parse_version(&caps[1]).ok())
                .collect::<Vec<_>>()
        })
        .collect();
    debug!(found = candidates.len(), "custom version directives");
    candidates
}

/// Reduce candidates to the single highest version.
///
/// # Errors
///
/// [`VersionError::NoCandidateFound`] when `candidates` is empty.
pub fn select_candidate(candidates: &[Version]) -> VersionResult<Version> {
    candidates
        .iter()
        .max()
        .cloned()
        .ok_or(VersionError::NoCandidateFound)
}
