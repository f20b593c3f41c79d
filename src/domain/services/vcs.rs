//! Version-control client contract.
//!
//! The publisher drives a git working clone exclusively through
//! [`VcsClient`], so its stage sequencing, locking and no-op commit handling
//! can be exercised without spawning processes.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::domain::value_objects::{GitAuth, GitCommit, GitEnv};

/// Coarse classification of a failed git invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// DNS, connection or transfer problems; usually transient
    Network,
    /// Credentials rejected or missing
    Auth,
    /// Local changes, diverged branches, rejected pushes
    Conflict,
    Cancelled,
    Timeout,
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Network => "network",
            FailureKind::Auth => "auth",
            FailureKind::Conflict => "conflict",
            FailureKind::Cancelled => "cancelled",
            FailureKind::Timeout => "timeout",
            FailureKind::Other => "other",
        }
    }

    /// Worth retrying without operator intervention.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Network | FailureKind::Cancelled | FailureKind::Timeout
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error from a single git invocation.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {command} was cancelled")]
    Cancelled { command: String },

    #[error("git {command} timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },

    #[error("failed to run git {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("git {command} failed ({kind}): {stderr}")]
    Failed {
        command: String,
        kind: FailureKind,
        stderr: String,
    },
}

impl GitError {
    /// Failed invocation, classified from its stderr.
    pub fn failed(command: impl Into<String>, stderr: impl Into<String>) -> Self {
        let stderr = stderr.into();
        GitError::Failed {
            command: command.into(),
            kind: classify_stderr(&stderr),
            stderr: stderr.trim().to_string(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            GitError::Cancelled { .. } => FailureKind::Cancelled,
            GitError::TimedOut { .. } => FailureKind::Timeout,
            GitError::Spawn { .. } => FailureKind::Other,
            GitError::Failed { kind, .. } => *kind,
        }
    }
}

const AUTH_MARKERS: &[&str] = &[
    "authentication failed",
    "permission denied",
    "could not read username",
    "could not read password",
    "invalid username or password",
    "terminal prompts disabled",
    "could not read from remote repository",
    "access denied",
    "returned error: 401",
    "returned error: 403",
    "host key verification failed",
];

const NETWORK_MARKERS: &[&str] = &[
    "could not resolve host",
    "connection timed out",
    "connection refused",
    "connection reset",
    "network is unreachable",
    "operation timed out",
    "unable to access",
    "the remote end hung up",
    "early eof",
    "returned error: 5",
];

const CONFLICT_MARKERS: &[&str] = &[
    "conflict",
    "would be overwritten",
    "non-fast-forward",
    "[rejected]",
    "fetch first",
    "have diverged",
    "needs merge",
];

/// Classify git stderr into a [`FailureKind`].
///
/// Auth markers win over network markers: "unable to access ... 403" is a
/// credentials problem, not a transient one.
pub fn classify_stderr(stderr: &str) -> FailureKind {
    let lower = stderr.to_lowercase();
    let any = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    if any(AUTH_MARKERS) {
        FailureKind::Auth
    } else if any(CONFLICT_MARKERS) {
        FailureKind::Conflict
    } else if any(NETWORK_MARKERS) {
        FailureKind::Network
    } else {
        FailureKind::Other
    }
}

/// Narrow git capability consumed by the publisher.
///
/// Every call is a single synchronous external invocation from the
/// caller's point of view. `env` is applied to that invocation only.
/// Implementations must never log `auth` beyond its method.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Clone `remote_url` into `local_path` (parent directories created),
    /// naming the remote `remote`.
    async fn clone_repo(
        &self,
        ctx: &CancellationToken,
        remote_url: &str,
        local_path: &Path,
        remote: &str,
        auth: &GitAuth,
        env: &GitEnv,
    ) -> Result<(), GitError>;

    /// Update the remote-tracking refs of an existing clone.
    async fn fetch(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        auth: &GitAuth,
        remote: &str,
        env: &GitEnv,
    ) -> Result<(), GitError>;

    /// Switch to `branch`, tracking `remote`'s branch when one exists and
    /// creating it when `create_if_missing` is set.
    async fn checkout(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        remote: &str,
        branch: &str,
        create_if_missing: bool,
        env: &GitEnv,
    ) -> Result<(), GitError>;

    /// Point the current branch, index and worktree at `target`.
    async fn reset_hard(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        target: &str,
        env: &GitEnv,
    ) -> Result<(), GitError>;

    /// Commit hash `rev` resolves to; `None` when it does not exist (an
    /// unborn branch, a remote branch never fetched).
    async fn rev_parse(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        rev: &str,
        env: &GitEnv,
    ) -> Result<Option<String>, GitError>;

    /// Stage additions, modifications and deletions under `pathspec`.
    async fn add(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        pathspec: &str,
        env: &GitEnv,
    ) -> Result<(), GitError>;

    /// Commit the index; returns the new commit hash.
    async fn commit(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        commit: &GitCommit,
        env: &GitEnv,
    ) -> Result<String, GitError>;

    async fn push(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        auth: &GitAuth,
        remote: &str,
        branch: &str,
        env: &GitEnv,
    ) -> Result<(), GitError>;

    /// `status --porcelain` output; empty means clean.
    async fn status(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        env: &GitEnv,
    ) -> Result<String, GitError>;

    async fn log(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        args: &[String],
        env: &GitEnv,
    ) -> Result<String, GitError>;
}
