//! Commit messages from the CI event that triggered the run.
//!
//! Push events carry their commits inline. Pull request events only carry
//! the PR number, so the commit list is fetched with `gh api`.

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::exec::{CommandRunner, ExecError};

/// Errors from loading the event payload.
#[derive(Error, Debug)]
pub enum EventError {
    /// The event file could not be read.
    #[error("failed to read event payload {path}: {source}")]
    Read {
        /// Event file path.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The event file is not valid JSON.
    #[error("failed to parse event payload {path}: {source}")]
    Parse {
        /// Event file path.
        path: Utf8PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A pull request event lacks the fields needed to list its commits.
    #[error("pull request event is missing {0}")]
    IncompletePullRequest(&'static str),

    /// `gh api` failed.
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// `gh api` returned something other than a commit list.
    #[error("unexpected pull request commits response: {0}")]
    Response(serde_json::Error),
}

/// Result alias for event operations.
pub type EventResult<T> = Result<T, EventError>;

/// The subset of a GitHub event payload this tool reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    /// Commits of a push event, oldest first.
    #[serde(default)]
    pub commits: Option<Vec<PushCommit>>,
    /// Present on pull request events.
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
    /// Repository the event belongs to.
    #[serde(default)]
    pub repository: Option<Repository>,
}

/// A commit inside a push event.
#[derive(Debug, Clone, Deserialize)]
pub struct PushCommit {
    /// Commit message (subject, possibly with body).
    #[serde(default)]
    pub message: String,
    /// Separate body, when the producer splits it out.
    #[serde(default)]
    pub body: Option<String>,
}

impl PushCommit {
    /// Subject and body joined by a newline.
    pub fn full_message(&self) -> String {
        match self.body.as_deref() {
            Some(body) if !body.is_empty() => format!("{}\n{body}", self.message),
            _ => self.message.clone(),
        }
    }
}

/// Pull request fields.
#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    /// PR number.
    pub number: u64,
}

/// Repository fields.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    /// Repository name.
    pub name: Option<String>,
    /// Owning account.
    pub owner: Option<RepositoryOwner>,
}

/// Repository owner fields.
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryOwner {
    /// Account login.
    pub login: Option<String>,
}

#[derive(Deserialize)]
struct ApiCommit {
    commit: ApiCommitDetail,
}

#[derive(Deserialize)]
struct ApiCommitDetail {
    message: String,
}

/// Where the commit messages came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum EventSource {
    /// No event payload, or one without commits.
    Empty,
    /// A push event.
    Push,
    /// A pull request event.
    PullRequest {
        /// PR number.
        number: u64,
    },
}

/// Commit messages for one run, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitBatch {
    /// Full messages.
    pub messages: Vec<String>,
    /// Where they came from.
    pub source: EventSource,
}

impl CommitBatch {
    /// A batch built from literal messages.
    pub fn from_messages<I, S>(messages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            messages: messages.into_iter().map(Into::into).collect(),
            source: EventSource::Push,
        }
    }

    /// No commits at all.
    pub const fn empty() -> Self {
        Self {
            messages: Vec::new(),
            source: EventSource::Empty,
        }
    }
}

/// Read and parse the event payload at `path`.
#[instrument]
pub fn load_event(path: &Utf8Path) -> EventResult<EventPayload> {
    let text = std::fs::read_to_string(path).map_err(|source| EventError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| EventError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Turn an event payload into a commit batch.
///
/// Pull request commits are listed through `gh api`, run in `workdir`.
#[instrument(skip(payload, runner))]
pub fn commit_batch(
    payload: &EventPayload,
    runner: &dyn CommandRunner,
    workdir: &Utf8Path,
) -> EventResult<CommitBatch> {
    if let Some(ref pr) = payload.pull_request {
        let messages = list_pull_request_commits(payload, pr.number, runner, workdir)?;
        return Ok(CommitBatch {
            messages,
            source: EventSource::PullRequest { number: pr.number },
        });
    }

    match payload.commits {
        Some(ref commits) if !commits.is_empty() => Ok(CommitBatch {
            messages: commits.iter().map(PushCommit::full_message).collect(),
            source: EventSource::Push,
        }),
        _ => {
            info!("couldn't find any commits in this event");
            Ok(CommitBatch::empty())
        }
    }
}

fn list_pull_request_commits(
    payload: &EventPayload,
    number: u64,
    runner: &dyn CommandRunner,
    workdir: &Utf8Path,
) -> EventResult<Vec<String>> {
    let repo = payload
        .repository
        .as_ref()
        .ok_or(EventError::IncompletePullRequest("repository"))?;
    let owner = repo
        .owner
        .as_ref()
        .and_then(|o| o.login.as_deref())
        .ok_or(EventError::IncompletePullRequest("repository.owner.login"))?;
    let name = repo
        .name
        .as_deref()
        .ok_or(EventError::IncompletePullRequest("repository.name"))?;

    let endpoint = format!("repos/{owner}/{name}/pulls/{number}/commits");
    let output = runner.run("gh", &["api", &endpoint, "--paginate"], workdir)?;
    let messages = parse_pull_request_commits(&output)?;
    debug!(count = messages.len(), number, "pull request commits");
    Ok(messages)
}

/// Parse `gh api --paginate` output: one JSON array per page, back to back.
fn parse_pull_request_commits(output: &str) -> EventResult<Vec<String>> {
    let mut messages = Vec::new();
    for page in serde_json::Deserializer::from_str(output).into_iter::<Vec<ApiCommit>>() {
        let page = page.map_err(EventError::Response)?;
        messages.extend(page.into_iter().map(|c| c.commit.message));
    }
    Ok(messages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct FakeGh {
        output: &'static str,
        calls: RefCell<Vec<String>>,
    }

    impl CommandRunner for FakeGh {
        fn run(
            &self,
            program: &str,
            args: &[&str],
            _workdir: &Utf8Path,
        ) -> crate::exec::ExecResult<String> {
            self.calls
                .borrow_mut()
                .push(format!("{program} {}", args.join(" ")));
            Ok(self.output.to_string())
        }
    }

    fn fake(output: &'static str) -> FakeGh {
        FakeGh {
            output,
            calls: RefCell::new(Vec::new()),
        }
    }

    fn payload(json: &str) -> EventPayload {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn push_commits_join_subject_and_body() {
        let event = payload(
            r#"{"commits":[{"message":"feat: x","body":"breaking change"},{"message":"fix: y"}]}"#,
        );
        let gh = fake("");
        let batch = commit_batch(&event, &gh, Utf8Path::new("/work")).unwrap();
        assert_eq!(batch.messages, vec!["feat: x\nbreaking change", "fix: y"]);
        assert_eq!(batch.source, EventSource::Push);
        assert!(gh.calls.borrow().is_empty());
    }

    #[test]
    fn event_without_commits_is_empty() {
        let gh = fake("");
        let batch = commit_batch(&payload("{}"), &gh, Utf8Path::new("/work")).unwrap();
        assert_eq!(batch, CommitBatch::empty());
    }

    #[test]
    fn pull_request_lists_commits_through_gh() {
        let event = payload(
            r#"{"pull_request":{"number":42},"repository":{"name":"app","owner":{"login":"acme"}}}"#,
        );
        let gh = fake(
            r#"[{"commit":{"message":"one"}}][{"commit":{"message":"two\n\nnew feature"}}]"#,
        );
        let batch = commit_batch(&event, &gh, Utf8Path::new("/work")).unwrap();
        assert_eq!(batch.messages, vec!["one", "two\n\nnew feature"]);
        assert_eq!(batch.source, EventSource::PullRequest { number: 42 });
        assert_eq!(
            gh.calls.borrow()[0],
            "gh api repos/acme/app/pulls/42/commits --paginate"
        );
    }

    #[test]
    fn pull_request_without_repository_fails() {
        let event = payload(r#"{"pull_request":{"number":1}}"#);
        let err = commit_batch(&event, &fake("[]"), Utf8Path::new("/work")).unwrap_err();
        assert!(matches!(err, EventError::IncompletePullRequest(_)));
    }

    #[test]
    fn garbage_api_response_fails() {
        let event = payload(
            r#"{"pull_request":{"number":1},"repository":{"name":"a","owner":{"login":"b"}}}"#,
        );
        let err = commit_batch(&event, &fake("not json"), Utf8Path::new("/work")).unwrap_err();
        assert!(matches!(err, EventError::Response(_)));
    }

    #[test]
    fn load_event_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(tmp.path().join("event.json")).unwrap();
        std::fs::write(&path, r#"{"commits":[{"message":"minor"}]}"#).unwrap();
        let event = load_event(&path).unwrap();
        assert_eq!(event.commits.unwrap().len(), 1);
    }

    #[test]
    fn load_event_missing_file_fails() {
        let err = load_event(Utf8Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, EventError::Read { .. }));
    }
}
