//! Child-process execution.
//!
//! Every `git`, `npm` and `gh` invocation goes through a [`CommandRunner`].
//! The working directory is always passed explicitly; nothing here changes
//! the process-wide current directory.

use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from running an external command.
#[derive(Error, Debug)]
pub enum ExecError {
    /// The program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        /// Program name (e.g., "git").
        program: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{stderr}\n{program} exited with code {}", display_code(.exit_code))]
    Failed {
        /// Program name (e.g., "git").
        program: String,
        /// First argument, usually the subcommand.
        subcommand: String,
        /// Captured stderr, trimmed.
        stderr: String,
        /// Exit code, if the process was not killed by a signal.
        exit_code: Option<i32>,
    },
}

fn display_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown".to_string(), |c| c.to_string())
}

/// Result alias for command execution.
pub type ExecResult<T> = Result<T, ExecError>;

/// Runs a program to completion and returns its stdout.
///
/// Implementations must block until the child exits. Non-zero exit codes
/// are reported as [`ExecError::Failed`].
pub trait CommandRunner {
    /// Run `program` with `args` inside `workdir`.
    fn run(&self, program: &str, args: &[&str], workdir: &Utf8Path) -> ExecResult<String>;
}

impl<R: CommandRunner + ?Sized> CommandRunner for &R {
    fn run(&self, program: &str, args: &[&str], workdir: &Utf8Path) -> ExecResult<String> {
        (**self).run(program, args, workdir)
    }
}

/// [`CommandRunner`] backed by [`std::process::Command`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    // Arguments are not recorded: push URLs can carry a token.
    #[instrument(skip(self, args), fields(subcommand = args.first().copied().unwrap_or("")))]
    fn run(&self, program: &str, args: &[&str], workdir: &Utf8Path) -> ExecResult<String> {
        let output = Command::new(program)
            .args(args)
            .current_dir(workdir.as_std_path())
            .output()
            .map_err(|source| ExecError::Spawn {
                program: program.to_string(),
                source,
            })?;

        if output.status.success() {
            debug!(%program, "command succeeded");
            return Ok(String::from_utf8_lossy(&output.stdout).to_string());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(ExecError::Failed {
            program: program.to_string(),
            subcommand: args.first().copied().unwrap_or("").to_string(),
            stderr,
            exit_code: output.status.code(),
        })
    }
}

/// Programs a release run invokes.
pub const REQUIRED_PROGRAMS: &[&str] = &["git", "npm", "gh"];

/// Locate `program` on `PATH`.
pub fn find_program(program: &str) -> Option<Utf8PathBuf> {
    which::which(program)
        .ok()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
}
