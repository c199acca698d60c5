//! Prior-bump detection.
//!
//! The bump commit this tool pushes triggers another CI run. That run must
//! recognise its own commit and stop, otherwise every release would recurse.

use regex::{Regex, RegexBuilder};
use tracing::{debug, instrument};

use crate::classify::BumpScope;

/// Placeholder replaced by the tagged version in commit message templates.
pub const VERSION_PLACEHOLDER: &str = "{{version}}";

/// Default bump commit message template.
pub const DEFAULT_COMMIT_MESSAGE: &str = "ci: version bump to {{version}}";

/// Render the bump commit message for `tag`.
pub fn render_commit_message(template: &str, tag: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, tag)
}

/// Build a case-insensitive matcher for messages rendered from `template`.
///
/// Each placeholder becomes `<tag_prefix>\d+\.\d+\.\d+`; everything else is
/// matched literally.
pub fn bump_matcher(template: &str, tag_prefix: &str) -> Result<Regex, regex::Error> {
    let version = format!(r"{}\d+\.\d+\.\d+", regex::escape(tag_prefix));
    let pattern = template
        .split(VERSION_PLACEHOLDER)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(version.as_str());
    RegexBuilder::new(&pattern).case_insensitive(true).build()
}

/// Whether the batch already contains a bump commit made by this tool.
///
/// Only messages selected by `scope` are inspected; [`BumpScope::Ignore`]
/// always answers `false`.
#[instrument(skip(messages), fields(count = messages.len()))]
pub fn is_already_bumped<S: AsRef<str>>(
    messages: &[S],
    template: &str,
    tag_prefix: &str,
    scope: BumpScope,
) -> bool {
    let considered = scope.select(messages);
    if considered.is_empty() {
        return false;
    }
    let matcher = match bump_matcher(template, tag_prefix) {
        Ok(matcher) => matcher,
        Err(err) => {
            // Escaped input only fails on size limits.
            debug!(error = %err, "bump matcher could not be built");
            return false;
        }
    };
    let found = considered.iter().any(|m| matcher.is_match(m.as_ref()));
    debug!(found, "prior bump scan");
    found
}
