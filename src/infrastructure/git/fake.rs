//! Recording in-memory [`VcsClient`].
//!
//! Simulates clones, commits, fetches and remotes (with linear history, so
//! non-fast-forward pushes are rejected) closely enough for the publisher's
//! pipeline to run end to end without a `git` binary. Every call is
//! recorded; failures and delays can be queued per operation; in-flight
//! calls are counted per working directory so tests can assert that
//! same-site publishes never overlap.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;
use walkdir::WalkDir;

use crate::domain::services::{FailureKind, GitError, VcsClient};
use crate::domain::value_objects::{AuthMethod, GitAuth, GitCommit, GitEnv};

/// Operation tag used for recording and for queued overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VcsOp {
    Clone,
    Fetch,
    Checkout,
    Reset,
    RevParse,
    Add,
    Commit,
    Push,
    Status,
    Log,
}

impl VcsOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcsOp::Clone => "clone",
            VcsOp::Fetch => "fetch",
            VcsOp::Checkout => "checkout",
            VcsOp::Reset => "reset",
            VcsOp::RevParse => "rev-parse",
            VcsOp::Add => "add",
            VcsOp::Commit => "commit",
            VcsOp::Push => "push",
            VcsOp::Status => "status",
            VcsOp::Log => "log",
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct VcsCall {
    pub op: VcsOp,
    pub local_path: PathBuf,
    /// Operation-specific argument summary (url, branch, message, ...)
    pub detail: String,
    pub auth: Option<AuthMethod>,
    /// Keys of the injected environment; values are never recorded
    pub env_keys: Vec<String>,
}

type Files = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone)]
struct RemoteBranch {
    head: String,
    files: Files,
    /// Oldest first, ending with `head`
    history: Vec<String>,
}

#[derive(Debug, Default)]
struct WorkingClone {
    remote_url: String,
    remote_name: String,
    branch: Option<String>,
    head: Option<String>,
    history: Vec<String>,
    committed: Files,
    staged: Option<Files>,
    commits: usize,
    /// Remote branches as of the last clone, fetch or push
    tracking: HashMap<String, RemoteBranch>,
}

impl WorkingClone {
    fn local(&self) -> Option<RemoteBranch> {
        self.head.clone().map(|head| RemoteBranch {
            head,
            files: self.committed.clone(),
            history: self.history.clone(),
        })
    }

    /// `HEAD`, `refs/heads/<b>` or `refs/remotes/<remote>/<b>`.
    fn resolve(&self, rev: &str) -> Option<RemoteBranch> {
        if rev == "HEAD" {
            return self.local();
        }
        if let Some(branch) = rev.strip_prefix("refs/heads/") {
            return self.local().filter(|_| self.branch.as_deref() == Some(branch));
        }
        rev.strip_prefix("refs/remotes/")
            .and_then(|r| r.strip_prefix(self.remote_name.as_str()))
            .and_then(|r| r.strip_prefix('/'))
            .and_then(|branch| self.tracking.get(branch).cloned())
    }
}

#[derive(Default)]
struct State {
    calls: Vec<VcsCall>,
    failures: HashMap<VcsOp, VecDeque<(FailureKind, String)>>,
    delays: HashMap<VcsOp, Duration>,
    repos: HashMap<PathBuf, WorkingClone>,
    remotes: HashMap<String, HashMap<String, RemoteBranch>>,
    in_flight: HashMap<PathBuf, usize>,
    max_in_flight: usize,
}

/// In-memory git double.
#[derive(Default)]
pub struct FakeVcsClient {
    state: Mutex<State>,
}

struct InFlight<'a> {
    state: &'a Mutex<State>,
    path: PathBuf,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(n) = state.in_flight.get_mut(&self.path) {
            *n = n.saturating_sub(1);
        }
    }
}

impl FakeVcsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next call of `op` fail with the given kind and stderr.
    pub fn fail_next(&self, op: VcsOp, kind: FailureKind, stderr: impl Into<String>) -> &Self {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back((kind, stderr.into()));
        self
    }

    /// Sleep before every call of `op` (cancellable).
    pub fn delay(&self, op: VcsOp, duration: Duration) -> &Self {
        self.state.lock().delays.insert(op, duration);
        self
    }

    /// Commit content directly to a remote branch, on top of whatever it
    /// already holds.
    pub fn seed_remote(&self, url: &str, branch: &str, files: &[(&str, &str)]) {
        let files: Files = files
            .iter()
            .map(|(p, c)| (p.to_string(), c.as_bytes().to_vec()))
            .collect();
        let mut state = self.state.lock();
        let branches = state.remotes.entry(url.to_string()).or_default();
        let mut history = branches
            .get(branch)
            .map(|b| b.history.clone())
            .unwrap_or_default();
        let head = commit_hash(history.last().map(String::as_str), &files);
        history.push(head.clone());
        branches.insert(
            branch.to_string(),
            RemoteBranch {
                head,
                files,
                history,
            },
        );
    }

    pub fn calls(&self) -> Vec<VcsCall> {
        self.state.lock().calls.clone()
    }

    pub fn ops(&self) -> Vec<VcsOp> {
        self.state.lock().calls.iter().map(|c| c.op).collect()
    }

    pub fn count(&self, op: VcsOp) -> usize {
        self.state.lock().calls.iter().filter(|c| c.op == op).count()
    }

    /// Highest number of simultaneous calls seen against one working dir.
    pub fn max_in_flight(&self) -> usize {
        self.state.lock().max_in_flight
    }

    /// Commits created in the clone at `path`.
    pub fn commit_count(&self, path: &Path) -> usize {
        self.state.lock().repos.get(path).map_or(0, |r| r.commits)
    }

    /// Total commits created across every clone.
    pub fn total_commits(&self) -> usize {
        self.state.lock().repos.values().map(|r| r.commits).sum()
    }

    pub fn remote_head(&self, url: &str, branch: &str) -> Option<String> {
        self.state
            .lock()
            .remotes
            .get(url)
            .and_then(|b| b.get(branch))
            .map(|b| b.head.clone())
    }

    /// Files currently on a remote branch.
    pub fn remote_files(&self, url: &str, branch: &str) -> Vec<String> {
        self.state
            .lock()
            .remotes
            .get(url)
            .and_then(|b| b.get(branch))
            .map(|b| b.files.keys().cloned().collect())
            .unwrap_or_default()
    }

    async fn enter(
        &self,
        ctx: &CancellationToken,
        op: VcsOp,
        path: &Path,
        detail: String,
        auth: Option<&GitAuth>,
        env: &GitEnv,
    ) -> Result<InFlight<'_>, GitError> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push(VcsCall {
                op,
                local_path: path.to_path_buf(),
                detail,
                auth: auth.map(GitAuth::method),
                env_keys: env.iter().map(|(k, _)| k.to_string()).collect(),
            });
            let n = state.in_flight.entry(path.to_path_buf()).or_default();
            *n += 1;
            let current = *n;
            state.max_in_flight = state.max_in_flight.max(current);
            state.delays.get(&op).copied()
        };
        let guard = InFlight {
            state: &self.state,
            path: path.to_path_buf(),
        };

        let cancelled = || GitError::Cancelled {
            command: op.as_str().to_string(),
        };
        if let Some(delay) = delay {
            tokio::select! {
                _ = ctx.cancelled() => return Err(cancelled()),
                _ = tokio::time::sleep(delay) => {}
            }
        }
        if ctx.is_cancelled() {
            return Err(cancelled());
        }

        let queued = self
            .state
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        if let Some((kind, stderr)) = queued {
            return Err(GitError::Failed {
                command: op.as_str().to_string(),
                kind,
                stderr,
            });
        }
        Ok(guard)
    }
}

fn failed(op: VcsOp, stderr: impl Into<String>) -> GitError {
    GitError::Failed {
        command: op.as_str().to_string(),
        kind: FailureKind::Other,
        stderr: stderr.into(),
    }
}

fn rejected(branch: &str) -> GitError {
    GitError::Failed {
        command: VcsOp::Push.as_str().to_string(),
        kind: FailureKind::Conflict,
        stderr: format!(
            " ! [rejected]        {b} -> {b} (fetch first)\nerror: failed to push some refs",
            b = branch
        ),
    }
}

fn io_failed(op: VcsOp, err: std::io::Error) -> GitError {
    GitError::Spawn {
        command: op.as_str().to_string(),
        source: err,
    }
}

fn read_worktree(root: &Path) -> std::io::Result<Files> {
    let mut files = Files::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(std::io::Error::other)?
            .to_string_lossy()
            .replace('\\', "/");
        files.insert(rel, fs::read(entry.path())?);
    }
    Ok(files)
}

fn write_files(root: &Path, files: &Files) -> std::io::Result<()> {
    for (path, contents) in files {
        let dest = root.join(path);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, contents)?;
    }
    Ok(())
}

fn commit_hash(parent: Option<&str>, files: &Files) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent.unwrap_or("root").as_bytes());
    for (path, contents) in files {
        hasher.update(path.as_bytes());
        hasher.update([0u8]);
        hasher.update(contents);
    }
    let mut hex = String::with_capacity(40);
    for byte in &hasher.finalize()[..20] {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}

fn porcelain(worktree: &Files, committed: &Files) -> String {
    let mut out = String::new();
    for (path, contents) in worktree {
        match committed.get(path) {
            None => {
                let _ = writeln!(out, "?? {}", path);
            }
            Some(old) if old != contents => {
                let _ = writeln!(out, " M {}", path);
            }
            Some(_) => {}
        }
    }
    for path in committed.keys() {
        if !worktree.contains_key(path) {
            let _ = writeln!(out, " D {}", path);
        }
    }
    out
}

#[async_trait]
impl VcsClient for FakeVcsClient {
    async fn clone_repo(
        &self,
        ctx: &CancellationToken,
        remote_url: &str,
        local_path: &Path,
        remote: &str,
        auth: &GitAuth,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Clone, local_path, remote_url.to_string(), Some(auth), env)
            .await?;
        if local_path.join(".git").exists() {
            return Err(failed(VcsOp::Clone, "destination path already exists"));
        }
        fs::create_dir_all(local_path.join(".git")).map_err(|e| io_failed(VcsOp::Clone, e))?;
        let mut state = self.state.lock();
        let tracking = state.remotes.get(remote_url).cloned().unwrap_or_default();
        state.repos.insert(
            local_path.to_path_buf(),
            WorkingClone {
                remote_url: remote_url.to_string(),
                remote_name: remote.to_string(),
                tracking,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn fetch(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        auth: &GitAuth,
        remote: &str,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Fetch, local_path, remote.to_string(), Some(auth), env)
            .await?;
        let mut state = self.state.lock();
        let State { repos, remotes, .. } = &mut *state;
        let repo = repos
            .get_mut(local_path)
            .ok_or_else(|| failed(VcsOp::Fetch, "not a git repository"))?;
        if repo.remote_name != remote {
            return Err(failed(
                VcsOp::Fetch,
                format!("'{}' does not appear to be a git repository", remote),
            ));
        }
        repo.tracking = remotes.get(&repo.remote_url).cloned().unwrap_or_default();
        Ok(())
    }

    async fn checkout(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        remote: &str,
        branch: &str,
        create_if_missing: bool,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Checkout, local_path, branch.to_string(), None, env)
            .await?;
        let mut state = self.state.lock();
        let repo = state
            .repos
            .get_mut(local_path)
            .ok_or_else(|| failed(VcsOp::Checkout, "not a git repository"))?;
        if repo.branch.as_deref() == Some(branch) {
            return Ok(());
        }

        let upstream = if repo.remote_name == remote {
            repo.tracking.get(branch).cloned()
        } else {
            None
        };
        match upstream {
            Some(upstream) => {
                write_files(local_path, &upstream.files)
                    .map_err(|e| io_failed(VcsOp::Checkout, e))?;
                repo.committed = upstream.files;
                repo.history = upstream.history;
                repo.head = Some(upstream.head);
            }
            None if create_if_missing => {}
            None => {
                return Err(failed(
                    VcsOp::Checkout,
                    format!("pathspec '{}' did not match any file(s) known to git", branch),
                ))
            }
        }
        repo.branch = Some(branch.to_string());
        Ok(())
    }

    async fn reset_hard(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        target: &str,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Reset, local_path, target.to_string(), None, env)
            .await?;
        let mut state = self.state.lock();
        let repo = state
            .repos
            .get_mut(local_path)
            .ok_or_else(|| failed(VcsOp::Reset, "not a git repository"))?;
        let target = repo.resolve(target).ok_or_else(|| {
            failed(VcsOp::Reset, format!("ambiguous argument '{}': unknown revision", target))
        })?;

        let worktree = read_worktree(local_path).map_err(|e| io_failed(VcsOp::Reset, e))?;
        for path in worktree.keys() {
            fs::remove_file(local_path.join(path)).map_err(|e| io_failed(VcsOp::Reset, e))?;
        }
        write_files(local_path, &target.files).map_err(|e| io_failed(VcsOp::Reset, e))?;
        repo.committed = target.files;
        repo.history = target.history;
        repo.head = Some(target.head);
        repo.staged = None;
        Ok(())
    }

    async fn rev_parse(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        rev: &str,
        env: &GitEnv,
    ) -> Result<Option<String>, GitError> {
        let _guard = self
            .enter(ctx, VcsOp::RevParse, local_path, rev.to_string(), None, env)
            .await?;
        let state = self.state.lock();
        let repo = state
            .repos
            .get(local_path)
            .ok_or_else(|| failed(VcsOp::RevParse, "not a git repository"))?;
        Ok(repo.resolve(rev).map(|b| b.head))
    }

    async fn add(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        pathspec: &str,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Add, local_path, pathspec.to_string(), None, env)
            .await?;
        let worktree = read_worktree(local_path).map_err(|e| io_failed(VcsOp::Add, e))?;
        let mut state = self.state.lock();
        let repo = state
            .repos
            .get_mut(local_path)
            .ok_or_else(|| failed(VcsOp::Add, "not a git repository"))?;
        repo.staged = Some(worktree);
        Ok(())
    }

    async fn commit(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        commit: &GitCommit,
        env: &GitEnv,
    ) -> Result<String, GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Commit, local_path, commit.message.clone(), None, env)
            .await?;
        let mut state = self.state.lock();
        let repo = state
            .repos
            .get_mut(local_path)
            .ok_or_else(|| failed(VcsOp::Commit, "not a git repository"))?;
        let staged = repo
            .staged
            .take()
            .unwrap_or_else(|| repo.committed.clone());
        if staged == repo.committed && repo.head.is_some() {
            return Err(failed(VcsOp::Commit, "nothing to commit, working tree clean"));
        }
        let hash = commit_hash(repo.head.as_deref(), &staged);
        repo.committed = staged;
        repo.head = Some(hash.clone());
        repo.history.push(hash.clone());
        repo.commits += 1;
        Ok(hash)
    }

    async fn push(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        auth: &GitAuth,
        remote: &str,
        branch: &str,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        let _guard = self
            .enter(
                ctx,
                VcsOp::Push,
                local_path,
                format!("{} {}", remote, branch),
                Some(auth),
                env,
            )
            .await?;
        let mut state = self.state.lock();
        let State { repos, remotes, .. } = &mut *state;
        let repo = repos
            .get_mut(local_path)
            .ok_or_else(|| failed(VcsOp::Push, "not a git repository"))?;
        if repo.remote_name != remote {
            return Err(failed(
                VcsOp::Push,
                format!("'{}' does not appear to be a git repository", remote),
            ));
        }
        let local = repo
            .local()
            .ok_or_else(|| failed(VcsOp::Push, "src refspec HEAD does not match any"))?;

        let branches = remotes.entry(repo.remote_url.clone()).or_default();
        if let Some(existing) = branches.get(branch) {
            if !local.history.contains(&existing.head) {
                return Err(rejected(branch));
            }
        }
        branches.insert(branch.to_string(), local.clone());
        repo.tracking.insert(branch.to_string(), local);
        Ok(())
    }

    async fn status(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        env: &GitEnv,
    ) -> Result<String, GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Status, local_path, String::new(), None, env)
            .await?;
        let worktree = read_worktree(local_path).map_err(|e| io_failed(VcsOp::Status, e))?;
        let state = self.state.lock();
        let repo = state
            .repos
            .get(local_path)
            .ok_or_else(|| failed(VcsOp::Status, "not a git repository"))?;
        Ok(porcelain(&worktree, &repo.committed))
    }

    /// Understands `-1`, `--format=%H` (the only output format) and either
    /// no revision, a single ref or an `a..b` range.
    async fn log(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        args: &[String],
        env: &GitEnv,
    ) -> Result<String, GitError> {
        let _guard = self
            .enter(ctx, VcsOp::Log, local_path, args.join(" "), None, env)
            .await?;
        let state = self.state.lock();
        let repo = state
            .repos
            .get(local_path)
            .ok_or_else(|| failed(VcsOp::Log, "not a git repository"))?;
        let resolve = |rev: &str| {
            repo.resolve(rev).ok_or_else(|| {
                failed(VcsOp::Log, format!("ambiguous argument '{}': unknown revision", rev))
            })
        };

        let listed: Vec<String> = match args.iter().find(|a| !a.starts_with('-')) {
            None => repo
                .local()
                .ok_or_else(|| {
                    failed(VcsOp::Log, "your current branch does not have any commits yet")
                })?
                .history,
            Some(range) => match range.split_once("..") {
                Some((from, to)) => {
                    let exclude = resolve(from)?.history;
                    resolve(to)?
                        .history
                        .into_iter()
                        .filter(|h| !exclude.contains(h))
                        .collect()
                }
                None => resolve(range)?.history,
            },
        };

        let limit = if args.iter().any(|a| a == "-1") { 1 } else { usize::MAX };
        Ok(listed
            .iter()
            .rev()
            .take(limit)
            .map(|h| format!("{}\n", h))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_clone_commit_push_cycle() {
        let fake = FakeVcsClient::new();
        let dir = TempDir::new().unwrap();
        let clone = dir.path().join("clone");
        let ctx = CancellationToken::new();
        let env = GitEnv::new();
        let url = "https://git.example.com/site.git";

        fake.clone_repo(&ctx, url, &clone, "origin", &GitAuth::None, &env).await.unwrap();
        fake.checkout(&ctx, &clone, "origin", "main", true, &env).await.unwrap();
        fs::write(clone.join("index.html"), "hi").unwrap();
        assert_eq!(fake.status(&ctx, &clone, &env).await.unwrap(), "?? index.html\n");

        fake.add(&ctx, &clone, ".", &env).await.unwrap();
        let head = fake.commit(&ctx, &clone, &GitCommit::new("first"), &env).await.unwrap();
        assert_eq!(head.len(), 40);
        assert!(fake.status(&ctx, &clone, &env).await.unwrap().is_empty());

        fake.push(&ctx, &clone, &GitAuth::None, "origin", "main", &env).await.unwrap();
        assert_eq!(fake.remote_head(url, "main"), Some(head));
        assert_eq!(fake.remote_files(url, "main"), vec!["index.html".to_string()]);
        assert_eq!(fake.commit_count(&clone), 1);
    }

    #[tokio::test]
    async fn test_queued_failure_is_consumed_once() {
        let fake = FakeVcsClient::new();
        fake.fail_next(VcsOp::Log, FailureKind::Network, "boom");
        let ctx = CancellationToken::new();
        let path = Path::new("/nowhere");

        let err = fake.log(&ctx, path, &[], &GitEnv::new()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Network);
        // Second call reaches the simulated repo, which does not exist.
        let err = fake.log(&ctx, path, &[], &GitEnv::new()).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Other);
        assert_eq!(fake.count(VcsOp::Log), 2);
    }

    #[tokio::test]
    async fn test_checkout_tracks_seeded_remote() {
        let fake = FakeVcsClient::new();
        let url = "https://git.example.com/seeded.git";
        fake.seed_remote(url, "pages", &[("old.html", "old")]);
        let dir = TempDir::new().unwrap();
        let clone = dir.path().join("c");
        let ctx = CancellationToken::new();
        let env = GitEnv::new();

        fake.clone_repo(&ctx, url, &clone, "origin", &GitAuth::None, &env).await.unwrap();
        fake.checkout(&ctx, &clone, "origin", "pages", false, &env).await.unwrap();
        assert!(clone.join("old.html").exists());
        assert!(fake.status(&ctx, &clone, &env).await.unwrap().is_empty());

        let err = fake.checkout(&ctx, &clone, "origin", "other", false, &env).await.unwrap_err();
        assert!(err.to_string().contains("did not match"));
    }

    #[tokio::test]
    async fn test_records_env_keys_not_values() {
        let fake = FakeVcsClient::new();
        let ctx = CancellationToken::new();
        let env = GitEnv::new().with("GIT_AUTHOR_NAME", "secret-name");
        let _ = fake.status(&ctx, Path::new("/x"), &env).await;
        let call = &fake.calls()[0];
        assert_eq!(call.env_keys, vec!["GIT_AUTHOR_NAME".to_string()]);
        assert!(!format!("{:?}", call).contains("secret-name"));
    }

    async fn cloned(fake: &FakeVcsClient, url: &str, dir: &TempDir, name: &str) -> PathBuf {
        let clone = dir.path().join(name);
        let ctx = CancellationToken::new();
        let env = GitEnv::new();
        fake.clone_repo(&ctx, url, &clone, "origin", &GitAuth::None, &env)
            .await
            .unwrap();
        fake.checkout(&ctx, &clone, "origin", "main", true, &env)
            .await
            .unwrap();
        clone
    }

    async fn commit_file(fake: &FakeVcsClient, clone: &Path, name: &str, body: &str) -> String {
        let ctx = CancellationToken::new();
        let env = GitEnv::new();
        fs::write(clone.join(name), body).unwrap();
        fake.add(&ctx, clone, ".", &env).await.unwrap();
        fake.commit(&ctx, clone, &GitCommit::new(name), &env)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_push_rejects_non_fast_forward() {
        let fake = FakeVcsClient::new();
        let url = "https://git.example.com/race.git";
        let dir = TempDir::new().unwrap();
        let ctx = CancellationToken::new();
        let env = GitEnv::new();

        let first = cloned(&fake, url, &dir, "a").await;
        commit_file(&fake, &first, "a.html", "a").await;
        fake.push(&ctx, &first, &GitAuth::None, "origin", "main", &env).await.unwrap();

        // A second writer pushes on top, the first clone is now stale.
        fake.seed_remote(url, "main", &[("a.html", "a"), ("b.html", "b")]);
        let moved = fake.remote_head(url, "main").unwrap();
        commit_file(&fake, &first, "c.html", "c").await;

        let err = fake
            .push(&ctx, &first, &GitAuth::None, "origin", "main", &env)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Conflict);
        assert!(err.to_string().contains("rejected"));
        assert_eq!(fake.remote_head(url, "main"), Some(moved));
    }

    #[tokio::test]
    async fn test_fetch_and_reset_follow_remote() {
        let fake = FakeVcsClient::new();
        let url = "https://git.example.com/follow.git";
        let dir = TempDir::new().unwrap();
        let ctx = CancellationToken::new();
        let env = GitEnv::new();

        let clone = cloned(&fake, url, &dir, "c").await;
        commit_file(&fake, &clone, "index.html", "v1").await;
        fake.push(&ctx, &clone, &GitAuth::None, "origin", "main", &env).await.unwrap();
        fake.seed_remote(url, "main", &[("index.html", "v2")]);
        let remote = fake.remote_head(url, "main");

        let tracking = "refs/remotes/origin/main";
        assert_ne!(fake.rev_parse(&ctx, &clone, tracking, &env).await.unwrap(), remote);
        fake.fetch(&ctx, &clone, &GitAuth::None, "origin", &env).await.unwrap();
        assert_eq!(fake.rev_parse(&ctx, &clone, tracking, &env).await.unwrap(), remote);

        let behind = fake
            .log(&ctx, &clone, &["--format=%H".into(), format!("refs/heads/main..{}", tracking)], &env)
            .await
            .unwrap();
        assert_eq!(behind.lines().count(), 1);

        fake.reset_hard(&ctx, &clone, tracking, &env).await.unwrap();
        assert_eq!(fs::read_to_string(clone.join("index.html")).unwrap(), "v2");
        assert_eq!(fake.rev_parse(&ctx, &clone, "HEAD", &env).await.unwrap(), remote);
        assert!(fake.status(&ctx, &clone, &env).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rev_parse_unborn_head_is_none() {
        let fake = FakeVcsClient::new();
        let dir = TempDir::new().unwrap();
        let clone = cloned(&fake, "https://git.example.com/empty.git", &dir, "c").await;
        let ctx = CancellationToken::new();
        let env = GitEnv::new();

        assert_eq!(fake.rev_parse(&ctx, &clone, "HEAD", &env).await.unwrap(), None);
        assert_eq!(
            fake.rev_parse(&ctx, &clone, "refs/remotes/origin/main", &env).await.unwrap(),
            None
        );
    }
}
