#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Publishes the generated map by committing it to a git repository and
//! pushing, so a static host watching the repository picks it up.
//!
//! Shells out to the `git` executable; no git library is linked.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while publishing.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The configured repository directory does not exist.
    #[error("Repository not found: {0}")]
    RepoNotFound(PathBuf),

    /// `git` could not be started.
    #[error("Failed to run git (is it installed?): {0}")]
    Spawn(#[from] std::io::Error),

    /// A git command exited unsuccessfully.
    #[error("`{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Git publishing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Whether to publish after generating the map.
    pub enabled: bool,
    /// Working tree of the target repository.
    pub repo_path: PathBuf,
    pub remote: String,
    /// Branch to push. Defaults to the current branch.
    #[serde(default)]
    pub branch: Option<String>,
    /// Commit message.
    pub message: String,
}

/// What a publish run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// A commit was created and pushed.
    Pushed,
    /// The file was unchanged; nothing was committed or pushed.
    Unchanged,
}

/// Commits and pushes a single file.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    repo_path: PathBuf,
    remote: String,
    branch: Option<String>,
    message: String,
}

impl GitPublisher {
    #[must_use]
    pub fn new(
        repo_path: impl Into<PathBuf>,
        remote: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            repo_path: repo_path.into(),
            remote: remote.into(),
            branch: None,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            repo_path: config.repo_path.clone(),
            remote: config.remote.clone(),
            branch: config.branch.clone(),
            message: config.message.clone(),
        }
    }

    /// Stages `file`, commits it if it changed, and pushes.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::RepoNotFound`] if the repository directory is
    /// missing, or [`PublishError::CommandFailed`] if any git step fails.
    pub fn publish(&self, file: &Path) -> Result<PublishOutcome, PublishError> {
        if !self.repo_path.is_dir() {
            return Err(PublishError::RepoNotFound(self.repo_path.clone()));
        }

        let file_arg = file.to_string_lossy();
        self.git(&["add", "--", &file_arg])?;

        if !self.has_staged_changes(&file_arg)? {
            log::info!("{} unchanged; nothing to publish", file.display());
            return Ok(PublishOutcome::Unchanged);
        }

        self.git(&["commit", "-m", &self.message])?;

        let branch = self.branch.as_deref().unwrap_or("HEAD");
        self.git(&["push", &self.remote, branch])?;

        log::info!("Published {} to {} ({branch})", file.display(), self.remote);
        Ok(PublishOutcome::Pushed)
    }

    /// `git diff --cached --quiet` exits 1 when the index differs from
    /// `HEAD`.
    fn has_staged_changes(&self, file_arg: &str) -> Result<bool, PublishError> {
        let output = self
            .command(&["diff", "--cached", "--quiet", "--", file_arg])
            .output()?;
        match output.status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(command_failed(&["diff", "--cached", "--quiet"], &output)),
        }
    }

    fn git(&self, args: &[&str]) -> Result<Output, PublishError> {
        log::debug!("git {}", args.join(" "));
        let output = self.command(args).output()?;
        if output.status.success() {
            Ok(output)
        } else {
            Err(command_failed(args, &output))
        }
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.repo_path).args(args);
        cmd
    }
}

fn command_failed(args: &[&str], output: &Output) -> PublishError {
    PublishError::CommandFailed {
        command: format!("git {}", args.join(" ")),
        status: output.status.to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}
