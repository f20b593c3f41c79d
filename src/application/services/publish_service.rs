//! Publish Service
//!
//! Ships a site's materialized tree to its remote repository through a
//! per-site working clone: clone (or reuse and fetch) -> checkout -> align
//! with the remote branch -> sync -> add -> commit if dirty -> push. Also
//! computes dry-run plans against the same clone without contacting the
//! remote.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::services::{FailureKind, GitError, VcsClient};
use crate::domain::value_objects::{
    redact_url, ConfigError, GitCommit, GitEnv, PlanReport, PublisherConfig, SiteSlug,
};
use crate::infrastructure::cache::SiteLocks;
use crate::infrastructure::fs::{diff_indexes, scan_source, scan_tree, sync_tree, SyncStats, TreeIndex};
use crate::infrastructure::metrics;

/// Publish service trait
#[async_trait]
pub trait PublishService: Send + Sync {
    /// Structural config check; performs no I/O
    fn validate(&self, config: &PublisherConfig) -> Result<(), PublishError>;

    /// What `publish` would change, computed against the local clone only
    async fn plan(
        &self,
        ctx: &CancellationToken,
        site: &SiteSlug,
        config: &PublisherConfig,
        source_dir: &Path,
    ) -> Result<PlanReport, PublishError>;

    /// Commit `source_dir` to the configured branch and push it
    async fn publish(
        &self,
        ctx: &CancellationToken,
        site: &SiteSlug,
        config: &PublisherConfig,
        source_dir: &Path,
    ) -> Result<PublishResult, PublishError>;
}

/// Pipeline step a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Clone,
    Checkout,
    /// Copying the rendered tree into the working clone
    Sync,
    Add,
    Commit,
    Push,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Clone => "clone",
            Stage::Checkout => "checkout",
            Stage::Sync => "sync",
            Stage::Add => "add",
            Stage::Commit => "commit",
            Stage::Push => "push",
        }
    }

    fn touches_remote(&self) -> bool {
        matches!(self, Stage::Clone | Stage::Push)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying failure of a stage.
#[derive(Debug, thiserror::Error)]
pub enum StageCause {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Publish service errors
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid publisher config: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("source tree {} does not exist", path.display())]
    SourceMissing { path: PathBuf },

    #[error("{stage} failed: {cause}")]
    Stage {
        stage: Stage,
        #[source]
        cause: StageCause,
    },

    #[error("cancelled during {stage}")]
    Cancelled { stage: Stage },
}

impl PublishError {
    fn git(stage: Stage, err: GitError) -> Self {
        match err {
            GitError::Cancelled { .. } => PublishError::Cancelled { stage },
            other => PublishError::Stage {
                stage,
                cause: StageCause::Git(other),
            },
        }
    }

    fn io(stage: Stage, err: io::Error) -> Self {
        PublishError::Stage {
            stage,
            cause: StageCause::Io(err),
        }
    }

    pub fn stage(&self) -> Option<Stage> {
        match self {
            PublishError::Stage { stage, .. } | PublishError::Cancelled { stage } => Some(*stage),
            _ => None,
        }
    }

    /// Metric/log label: the stage, or `validate` for pre-flight failures
    pub fn stage_label(&self) -> &'static str {
        self.stage().map_or("validate", |s| s.as_str())
    }

    /// Git failure classification, when the cause was a git invocation
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PublishError::Stage {
                cause: StageCause::Git(e),
                ..
            } => Some(e.kind()),
            PublishError::Cancelled { .. } => Some(FailureKind::Cancelled),
            _ => None,
        }
    }

    /// Whether re-running the same publish may succeed.
    ///
    /// Cancellation is always retryable. Network and timeout failures are
    /// retryable only where the remote is involved; auth and conflict
    /// failures never are.
    pub fn is_retryable(&self) -> bool {
        match self {
            PublishError::Cancelled { .. } => true,
            PublishError::Stage {
                stage,
                cause: StageCause::Git(e),
            } => match e.kind() {
                FailureKind::Cancelled => true,
                FailureKind::Network | FailureKind::Timeout => stage.touches_remote(),
                _ => false,
            },
            _ => false,
        }
    }
}

/// A pushed commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRef {
    pub hash: String,
    /// Browsable URL, for https remotes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, Serialize)]
pub struct PublishResult {
    pub run_id: Uuid,
    pub site: SiteSlug,
    pub branch: String,
    /// Branch head after the push; `None` only when nothing was ever committed
    pub commit: Option<CommitRef>,
    /// False when the tree matched the existing head
    pub new_commit: bool,
    pub sync: SyncStats,
}

/// Publish service implementation
pub struct PublishServiceImpl<V>
where
    V: VcsClient,
{
    vcs: Arc<V>,
    locks: Arc<SiteLocks>,
    work_root: PathBuf,
    retain_failed_clones: bool,
}

impl<V> PublishServiceImpl<V>
where
    V: VcsClient,
{
    /// Create a new PublishServiceImpl
    pub fn new(vcs: Arc<V>, locks: Arc<SiteLocks>, work_root: impl Into<PathBuf>) -> Self {
        Self {
            vcs,
            locks,
            work_root: work_root.into(),
            retain_failed_clones: false,
        }
    }

    /// Keep clones whose checkout failed instead of deleting them
    pub fn retain_failed_clones(mut self, retain: bool) -> Self {
        self.retain_failed_clones = retain;
        self
    }

    /// Working clone for a site, keyed by url, remote name and branch so a
    /// config change never reuses a clone of another repository.
    pub fn work_dir(&self, site: &SiteSlug, config: &PublisherConfig) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(config.repo_url.as_bytes());
        hasher.update(b"\n");
        hasher.update(config.remote.as_bytes());
        hasher.update(b"\n");
        hasher.update(config.branch.as_bytes());
        let key: String = hasher.finalize()[..8]
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect();
        self.work_root.join(site.as_str()).join(key)
    }

    async fn run_publish(
        &self,
        ctx: &CancellationToken,
        site: &SiteSlug,
        config: &PublisherConfig,
        source_dir: &Path,
        run_id: Uuid,
    ) -> Result<PublishResult, PublishError> {
        config.validate()?;

        let _lock = self.locks.exclusive(site).await;
        let _running = InProgress::start();
        // Checked under the lock: the materializer replaces trees while
        // holding it.
        ensure_source(source_dir).await?;
        let env = GitEnv::for_identity(&config.identity);
        let work_dir = self.work_dir(site, config);

        checkpoint(ctx, Stage::Clone)?;
        self.prepare_clone(ctx, config, &work_dir, &env).await?;

        checkpoint(ctx, Stage::Checkout)?;
        if let Err(e) = self
            .vcs
            .checkout(ctx, &work_dir, &config.remote, &config.branch, true, &env)
            .await
        {
            if !self.retain_failed_clones {
                remove_clone(&work_dir).await;
            }
            return Err(PublishError::git(Stage::Checkout, e));
        }
        self.align_with_remote(ctx, config, &work_dir, &env)
            .await
            .map_err(|e| PublishError::git(Stage::Checkout, e))?;

        checkpoint(ctx, Stage::Sync)?;
        let sync = {
            let (src, dst) = (source_dir.to_path_buf(), work_dir.clone());
            tokio::task::spawn_blocking(move || sync_tree(&src, &dst))
                .await
                .map_err(|e| PublishError::io(Stage::Sync, io::Error::other(e)))?
        };
        let sync = match sync {
            Ok(stats) => stats,
            Err(e) => return Err(sync_failure(source_dir, e).await),
        };
        tracing::debug!(
            written = sync.written,
            removed = sync.removed,
            unchanged = sync.unchanged,
            "Synced tree into working clone"
        );

        checkpoint(ctx, Stage::Add)?;
        self.vcs
            .add(ctx, &work_dir, ".", &env)
            .await
            .map_err(|e| PublishError::git(Stage::Add, e))?;

        checkpoint(ctx, Stage::Commit)?;
        let status = self
            .vcs
            .status(ctx, &work_dir, &env)
            .await
            .map_err(|e| PublishError::git(Stage::Commit, e))?;

        let (head, new_commit) = if status.trim().is_empty() {
            tracing::info!("Tree unchanged, skipping commit");
            let head = self
                .head(ctx, &work_dir, &env)
                .await
                .map_err(|e| PublishError::git(Stage::Commit, e))?;
            (head, false)
        } else {
            let message = config
                .commit_message
                .clone()
                .unwrap_or_else(|| default_message(site, run_id));
            let mut commit = GitCommit::new(message);
            if let Some(author) = &config.commit_author {
                commit = commit.with_author(author.clone());
            }
            let hash = self
                .vcs
                .commit(ctx, &work_dir, &commit, &env)
                .await
                .map_err(|e| PublishError::git(Stage::Commit, e))?;
            (Some(hash), true)
        };

        // Pushing an unchanged head is a no-op remotely, and re-ships a
        // commit left unpushed by an earlier failed run.
        if head.is_some() {
            checkpoint(ctx, Stage::Push)?;
            self.vcs
                .push(ctx, &work_dir, &config.auth, &config.remote, &config.branch, &env)
                .await
                .map_err(|e| PublishError::git(Stage::Push, e))?;
        }

        Ok(PublishResult {
            run_id,
            site: site.clone(),
            branch: config.branch.clone(),
            commit: head.map(|hash| CommitRef {
                url: browse_url(&config.repo_url, &hash),
                hash,
            }),
            new_commit,
            sync,
        })
    }

    /// Reuse and fetch a healthy clone; replace a broken or missing one.
    async fn prepare_clone(
        &self,
        ctx: &CancellationToken,
        config: &PublisherConfig,
        work_dir: &Path,
        env: &GitEnv,
    ) -> Result<(), PublishError> {
        if work_dir.join(".git").is_dir() {
            match self.vcs.status(ctx, work_dir, env).await {
                Ok(_) => {
                    tracing::debug!(dir = %work_dir.display(), "Reusing working clone");
                    return self
                        .vcs
                        .fetch(ctx, work_dir, &config.auth, &config.remote, env)
                        .await
                        .map_err(|e| PublishError::git(Stage::Clone, e));
                }
                Err(e @ GitError::Cancelled { .. }) => return Err(PublishError::git(Stage::Clone, e)),
                Err(e) => {
                    tracing::warn!(error = %e, dir = %work_dir.display(), "Working clone is broken, recloning");
                }
            }
        }
        if work_dir.exists() {
            tokio::fs::remove_dir_all(work_dir)
                .await
                .map_err(|e| PublishError::io(Stage::Clone, e))?;
        }
        if let Some(parent) = work_dir.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PublishError::io(Stage::Clone, e))?;
        }

        tracing::info!(remote = %config.redacted_url(), auth = %config.auth.method(), "Cloning");
        if let Err(e) = self
            .vcs
            .clone_repo(ctx, &config.repo_url, work_dir, &config.remote, &config.auth, env)
            .await
        {
            remove_clone(work_dir).await;
            return Err(PublishError::git(Stage::Clone, e));
        }
        Ok(())
    }

    /// Move the local branch onto the remote branch when the remote has
    /// commits the clone lacks. A local commit the remote already contains,
    /// or one still waiting to be pushed onto an unmoved remote, is kept.
    async fn align_with_remote(
        &self,
        ctx: &CancellationToken,
        config: &PublisherConfig,
        work_dir: &Path,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let tracking = config.tracking_ref();
        let Some(remote_head) = self.vcs.rev_parse(ctx, work_dir, &tracking, env).await? else {
            return Ok(());
        };
        let local_head = self
            .vcs
            .rev_parse(ctx, work_dir, &config.branch_ref(), env)
            .await?;
        match local_head {
            Some(local) if local == remote_head => return Ok(()),
            Some(local) => {
                let range = format!("{}..{}", config.branch_ref(), tracking);
                let behind = self
                    .vcs
                    .log(ctx, work_dir, &["--format=%H".to_string(), range], env)
                    .await?;
                if behind.trim().is_empty() {
                    return Ok(());
                }
                tracing::warn!(
                    local = %local,
                    remote = %remote_head,
                    "Remote branch moved since the last publish, resetting working clone"
                );
            }
            None => {}
        }
        self.vcs.reset_hard(ctx, work_dir, &tracking, env).await
    }

    /// Current head; `None` only for an unborn branch.
    async fn head(
        &self,
        ctx: &CancellationToken,
        work_dir: &Path,
        env: &GitEnv,
    ) -> Result<Option<String>, GitError> {
        self.vcs.rev_parse(ctx, work_dir, "HEAD", env).await
    }

    async fn run_plan(
        &self,
        ctx: &CancellationToken,
        site: &SiteSlug,
        config: &PublisherConfig,
        source_dir: &Path,
    ) -> Result<PlanReport, PublishError> {
        config.validate()?;

        let _lock = self.locks.shared(site).await;
        ensure_source(source_dir).await?;
        checkpoint(ctx, Stage::Sync)?;

        let work_dir = self.work_dir(site, config);
        let clone = if work_dir.join(".git").is_dir() {
            let env = GitEnv::for_identity(&config.identity);
            Some(
                self.clone_state(ctx, config, &work_dir, &env)
                    .await
                    .map_err(|e| PublishError::git(Stage::Commit, e))?,
            )
        } else {
            None
        };

        let src = source_dir.to_path_buf();
        let porcelain = clone.as_ref().map(|c| c.status.clone());
        let diff = tokio::task::spawn_blocking(move || -> io::Result<_> {
            let committed = match porcelain {
                Some(status) => committed_view(scan_tree(&work_dir)?, &status),
                None => TreeIndex::new(),
            };
            Ok(diff_indexes(&scan_source(&src)?, &committed))
        })
        .await
        .map_err(|e| PublishError::io(Stage::Sync, io::Error::other(e)))?;
        let diff = match diff {
            Ok(diff) => diff,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PublishError::SourceMissing {
                    path: source_dir.to_path_buf(),
                })
            }
            Err(e) => return Err(PublishError::io(Stage::Sync, e)),
        };

        let clone = clone.unwrap_or_default();
        Ok(PlanReport {
            site: site.clone(),
            remote_url: config.redacted_url(),
            branch: config.branch.clone(),
            auth_method: config.auth.method(),
            baseline: clone.baseline,
            remote_head: clone.remote_head,
            unpushed: clone.unpushed,
            changes: diff.changes,
            unchanged: diff.unchanged,
            generated_at: Utc::now(),
        })
    }

    /// Local refs of an existing clone; never contacts the remote.
    async fn clone_state(
        &self,
        ctx: &CancellationToken,
        config: &PublisherConfig,
        work_dir: &Path,
        env: &GitEnv,
    ) -> Result<CloneState, GitError> {
        let branch = config.branch_ref();
        let tracking = config.tracking_ref();
        let baseline = self.vcs.rev_parse(ctx, work_dir, &branch, env).await?;
        let remote_head = self.vcs.rev_parse(ctx, work_dir, &tracking, env).await?;

        let unpushed = match (&baseline, &remote_head) {
            (None, _) => Vec::new(),
            (Some(local), Some(remote)) if local == remote => Vec::new(),
            (Some(_), remote) => {
                let range = match remote {
                    Some(_) => format!("{}..{}", tracking, branch),
                    None => branch.clone(),
                };
                self.vcs
                    .log(ctx, work_dir, &["--format=%H".to_string(), range], env)
                    .await?
                    .lines()
                    .map(str::trim)
                    .filter(|h| !h.is_empty())
                    .map(str::to_string)
                    .collect()
            }
        };
        let status = self.vcs.status(ctx, work_dir, env).await?;

        Ok(CloneState {
            baseline,
            remote_head,
            unpushed,
            status,
        })
    }
}

#[derive(Default)]
struct CloneState {
    baseline: Option<String>,
    remote_head: Option<String>,
    unpushed: Vec<String>,
    status: String,
}

/// Digest placeholder for a committed file whose content differs from disk.
const UNKNOWN_DIGEST: [u8; 32] = [0; 32];

/// Approximate the committed tree from the working tree and
/// `git status --porcelain`: uncommitted additions are dropped, and paths
/// modified or deleted since the commit get a digest no source file has.
fn committed_view(mut worktree: TreeIndex, porcelain: &str) -> TreeIndex {
    for line in porcelain.lines() {
        let Some((code, path)) = line.get(..2).zip(line.get(3..)) else {
            continue;
        };
        let (old, new) = match path.split_once(" -> ") {
            Some((old, new)) => (Some(unquote(old)), unquote(new)),
            None => (None, unquote(path)),
        };
        if code == "??" || code.contains('A') {
            worktree.remove(&new);
            continue;
        }
        if let Some(old) = old {
            // Rename or copy: the new path is not committed, the old one is.
            worktree.remove(&new);
            if code.contains('R') {
                worktree.insert(old, UNKNOWN_DIGEST);
            }
            continue;
        }
        worktree.insert(new, UNKNOWN_DIGEST);
    }
    worktree
}

fn unquote(path: &str) -> String {
    path.strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path)
        .to_string()
}

#[async_trait]
impl<V> PublishService for PublishServiceImpl<V>
where
    V: VcsClient + 'static,
{
    fn validate(&self, config: &PublisherConfig) -> Result<(), PublishError> {
        config.validate().map_err(PublishError::from)
    }

    async fn plan(
        &self,
        ctx: &CancellationToken,
        site: &SiteSlug,
        config: &PublisherConfig,
        source_dir: &Path,
    ) -> Result<PlanReport, PublishError> {
        let started = Instant::now();
        let span = tracing::info_span!("plan", site = %site, branch = %config.branch);
        let result = self
            .run_plan(ctx, site, config, source_dir)
            .instrument(span.clone())
            .await;

        let _enter = span.enter();
        match &result {
            Ok(report) => tracing::info!(summary = %report.summary(), "Plan computed"),
            Err(e) => tracing::warn!(error = %e, stage = e.stage_label(), "Plan failed"),
        }
        metrics::record_publish_run(
            "plan",
            result.as_ref().err().map(PublishError::stage_label),
            started.elapsed().as_secs_f64(),
        );
        result
    }

    async fn publish(
        &self,
        ctx: &CancellationToken,
        site: &SiteSlug,
        config: &PublisherConfig,
        source_dir: &Path,
    ) -> Result<PublishResult, PublishError> {
        let started = Instant::now();
        let run_id = Uuid::now_v7();
        let span = tracing::info_span!(
            "publish",
            site = %site,
            run_id = %run_id,
            branch = %config.branch,
        );
        let result = self
            .run_publish(ctx, site, config, source_dir, run_id)
            .instrument(span.clone())
            .await;

        let _enter = span.enter();
        match &result {
            Ok(done) => tracing::info!(
                commit = done.commit.as_ref().map(|c| c.hash.as_str()).unwrap_or("none"),
                new_commit = done.new_commit,
                "Publish complete"
            ),
            Err(e) => tracing::error!(
                error = %e,
                stage = e.stage_label(),
                retryable = e.is_retryable(),
                "Publish failed"
            ),
        }
        metrics::record_publish_run(
            "publish",
            result.as_ref().err().map(PublishError::stage_label),
            started.elapsed().as_secs_f64(),
        );
        result
    }
}

/// Marks a publish as running in the in-progress gauge.
struct InProgress;

impl InProgress {
    fn start() -> Self {
        metrics::PUBLISHES_IN_PROGRESS.inc();
        InProgress
    }
}

impl Drop for InProgress {
    fn drop(&mut self) {
        metrics::PUBLISHES_IN_PROGRESS.dec();
    }
}

fn checkpoint(ctx: &CancellationToken, stage: Stage) -> Result<(), PublishError> {
    if ctx.is_cancelled() {
        return Err(PublishError::Cancelled { stage });
    }
    Ok(())
}

async fn ensure_source(source_dir: &Path) -> Result<(), PublishError> {
    match tokio::fs::metadata(source_dir).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        _ => Err(PublishError::SourceMissing {
            path: source_dir.to_path_buf(),
        }),
    }
}

/// A source that vanished mid-sync is reported as missing, not as an I/O
/// failure of the clone.
async fn sync_failure(source_dir: &Path, err: io::Error) -> PublishError {
    if err.kind() == io::ErrorKind::NotFound && ensure_source(source_dir).await.is_err() {
        return PublishError::SourceMissing {
            path: source_dir.to_path_buf(),
        };
    }
    PublishError::io(Stage::Sync, err)
}

async fn remove_clone(work_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(work_dir).await {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::warn!(error = %e, dir = %work_dir.display(), "Failed to remove working clone");
        }
    }
}

fn default_message(site: &SiteSlug, run_id: Uuid) -> String {
    format!("Publish {}\n\nRun: {}", site, run_id)
}

/// `https://host/owner/repo(.git)` -> `https://host/owner/repo/commit/<hash>`
fn browse_url(repo_url: &str, hash: &str) -> Option<String> {
    let url = redact_url(repo_url);
    if !url.starts_with("https://") {
        return None;
    }
    let base = url.trim_end_matches('/');
    let base = base.strip_suffix(".git").unwrap_or(base);
    Some(format!("{}/commit/{}", base, hash))
}
