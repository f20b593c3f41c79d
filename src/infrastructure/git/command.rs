//! `git` command-line implementation of [`VcsClient`].
//!
//! Each operation spawns one `git` process with `kill_on_drop`, so dropping
//! the future or firing the cancellation token terminates the child.
//! Credentials travel through per-invocation environment variables, never
//! through the remote URL or the repository config.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::PublisherSettings;
use crate::domain::services::{GitError, VcsClient};
use crate::domain::value_objects::{GitAuth, GitCommit, GitEnv};

/// Runs the system `git` binary.
#[derive(Debug, Clone)]
pub struct GitCommandClient {
    binary: PathBuf,
    timeout: Duration,
}

impl GitCommandClient {
    pub fn new(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &PublisherSettings) -> Self {
        Self::new(
            &settings.git_binary,
            Duration::from_secs(settings.command_timeout_secs),
        )
    }

    /// `git --version`, used by readiness checks.
    pub async fn version(&self) -> Result<String, GitError> {
        let ctx = CancellationToken::new();
        let out = self
            .run(&ctx, None, args(["--version"]), &GitEnv::new(), None)
            .await?;
        Ok(out.trim().to_string())
    }

    /// Run git and return stdout, mapping a non-zero exit to
    /// [`GitError::Failed`].
    async fn run(
        &self,
        ctx: &CancellationToken,
        dir: Option<&Path>,
        argv: Vec<OsString>,
        env: &GitEnv,
        auth: Option<&GitAuth>,
    ) -> Result<String, GitError> {
        let label = command_label(&argv);
        let output = self.run_raw(ctx, dir, argv, env, auth).await?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }
        let stderr = redact(&String::from_utf8_lossy(&output.stderr), auth);
        tracing::debug!(command = %label, status = ?output.status.code(), "git command failed");
        Err(GitError::failed(label, stderr))
    }

    /// Run git and report only whether it exited successfully.
    async fn succeeds(
        &self,
        ctx: &CancellationToken,
        dir: &Path,
        argv: Vec<OsString>,
        env: &GitEnv,
    ) -> Result<bool, GitError> {
        let output = self.run_raw(ctx, Some(dir), argv, env, None).await?;
        Ok(output.status.success())
    }

    async fn run_raw(
        &self,
        ctx: &CancellationToken,
        dir: Option<&Path>,
        argv: Vec<OsString>,
        env: &GitEnv,
        auth: Option<&GitAuth>,
    ) -> Result<Output, GitError> {
        let label = command_label(&argv);
        if ctx.is_cancelled() {
            return Err(GitError::Cancelled { command: label });
        }

        let mut cmd = Command::new(&self.binary);
        cmd.args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("GIT_TERMINAL_PROMPT", "0");
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        cmd.envs(env.iter());
        if let Some(auth) = auth {
            cmd.envs(auth_env(auth));
        }

        tracing::debug!(
            command = %label,
            dir = ?dir,
            auth = auth.map(|a| a.method().as_str()).unwrap_or("none"),
            env_vars = env.len(),
            "Running git"
        );

        let child = cmd.spawn().map_err(|source| GitError::Spawn {
            command: label.clone(),
            source,
        })?;

        tokio::select! {
            biased;
            _ = ctx.cancelled() => Err(GitError::Cancelled { command: label }),
            result = tokio::time::timeout(self.timeout, child.wait_with_output()) => match result {
                Ok(Ok(output)) => Ok(output),
                Ok(Err(source)) => Err(GitError::Spawn { command: label, source }),
                Err(_) => Err(GitError::TimedOut {
                    command: label,
                    seconds: self.timeout.as_secs(),
                }),
            },
        }
    }
}

#[async_trait]
impl VcsClient for GitCommandClient {
    async fn clone_repo(
        &self,
        ctx: &CancellationToken,
        remote_url: &str,
        local_path: &Path,
        remote: &str,
        auth: &GitAuth,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| GitError::Spawn {
                    command: "clone".into(),
                    source,
                })?;
        }
        let mut argv = args(["clone", "--quiet", "--origin", remote, "--", remote_url]);
        argv.push(local_path.as_os_str().to_owned());
        self.run(ctx, None, argv, env, Some(auth)).await?;
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
        self.run(
            ctx,
            Some(local_path),
            args(["fetch", "--quiet", "--prune", remote]),
            env,
            Some(auth),
        )
        .await?;
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
        let local_ref = format!("refs/heads/{}", branch);
        let remote_ref = format!("refs/remotes/{}/{}", remote, branch);
        let verify = |r: &str| args(["rev-parse", "--verify", "--quiet", r]);

        let argv = if self.succeeds(ctx, local_path, verify(&local_ref), env).await? {
            args(["checkout", "--quiet", branch])
        } else if self.succeeds(ctx, local_path, verify(&remote_ref), env).await? {
            let upstream = format!("{}/{}", remote, branch);
            args(["checkout", "--quiet", "-b", branch, "--track", upstream.as_str()])
        } else if !create_if_missing {
            return Err(GitError::failed(
                "checkout",
                format!("branch {} does not exist", branch),
            ));
        } else if self.succeeds(ctx, local_path, verify("HEAD"), env).await? {
            args(["checkout", "--quiet", "-b", branch])
        } else {
            // Unborn HEAD (empty remote): just point HEAD at the new branch.
            args(["symbolic-ref", "HEAD", local_ref.as_str()])
        };

        self.run(ctx, Some(local_path), argv, env, None).await?;
        Ok(())
    }

    async fn reset_hard(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        target: &str,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        self.run(
            ctx,
            Some(local_path),
            args(["reset", "--quiet", "--hard", target]),
            env,
            None,
        )
        .await?;
        Ok(())
    }

    async fn rev_parse(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        rev: &str,
        env: &GitEnv,
    ) -> Result<Option<String>, GitError> {
        let spec = format!("{}^{{commit}}", rev);
        let output = self
            .run_raw(
                ctx,
                Some(local_path),
                args(["rev-parse", "--verify", "--quiet", spec.as_str()]),
                env,
                None,
            )
            .await?;
        if output.status.success() {
            let hash = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(hash).filter(|h| !h.is_empty()));
        }
        // --quiet: a missing rev exits 1 with nothing on stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        if output.status.code() == Some(1) && stderr.trim().is_empty() {
            return Ok(None);
        }
        Err(GitError::failed("rev-parse", stderr.into_owned()))
    }

    async fn add(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        pathspec: &str,
        env: &GitEnv,
    ) -> Result<(), GitError> {
        self.run(
            ctx,
            Some(local_path),
            args(["add", "--all", "--", pathspec]),
            env,
            None,
        )
        .await?;
        Ok(())
    }

    async fn commit(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        commit: &GitCommit,
        env: &GitEnv,
    ) -> Result<String, GitError> {
        let mut argv = args([
            "-c",
            "commit.gpgsign=false",
            "commit",
            "--quiet",
            "--no-verify",
            "-m",
            commit.message.as_str(),
        ]);
        if let Some(author) = &commit.author {
            argv.push("--author".into());
            argv.push(author.to_string().into());
        }
        self.run(ctx, Some(local_path), argv, env, None).await?;

        let head = self
            .run(ctx, Some(local_path), args(["rev-parse", "HEAD"]), env, None)
            .await?;
        Ok(head.trim().to_string())
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
        let refspec = format!("HEAD:refs/heads/{}", branch);
        self.run(
            ctx,
            Some(local_path),
            args(["push", "--quiet", remote, refspec.as_str()]),
            env,
            Some(auth),
        )
        .await?;
        Ok(())
    }

    async fn status(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        env: &GitEnv,
    ) -> Result<String, GitError> {
        self.run(
            ctx,
            Some(local_path),
            args(["status", "--porcelain", "--untracked-files=all"]),
            env,
            None,
        )
        .await
    }

    async fn log(
        &self,
        ctx: &CancellationToken,
        local_path: &Path,
        log_args: &[String],
        env: &GitEnv,
    ) -> Result<String, GitError> {
        let mut argv = args(["log"]);
        argv.extend(log_args.iter().map(OsString::from));
        self.run(ctx, Some(local_path), argv, env, None).await
    }
}

fn args<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<OsString> {
    items.into_iter().map(OsString::from).collect()
}

/// Subcommand name for logs and errors, skipping leading `-c key=value`.
fn command_label(argv: &[OsString]) -> String {
    let mut iter = argv.iter().map(|a| a.to_string_lossy());
    while let Some(arg) = iter.next() {
        if arg == "-c" {
            iter.next();
            continue;
        }
        return arg.into_owned();
    }
    "git".to_string()
}

/// Environment carrying credentials for one invocation.
pub fn auth_env(auth: &GitAuth) -> Vec<(String, String)> {
    match auth {
        GitAuth::Token { username, token } => {
            let basic = STANDARD.encode(format!("{}:{}", username, token));
            vec![
                ("GIT_CONFIG_COUNT".into(), "1".into()),
                ("GIT_CONFIG_KEY_0".into(), "http.extraHeader".into()),
                (
                    "GIT_CONFIG_VALUE_0".into(),
                    format!("Authorization: Basic {}", basic),
                ),
            ]
        }
        GitAuth::SshKey { key_path } => vec![(
            "GIT_SSH_COMMAND".into(),
            format!(
                "ssh -i {} -o IdentitiesOnly=yes -o BatchMode=yes -o StrictHostKeyChecking=accept-new",
                shell_quote(&key_path.to_string_lossy())
            ),
        )],
        GitAuth::None => Vec::new(),
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn redact(stderr: &str, auth: Option<&GitAuth>) -> String {
    match auth {
        Some(GitAuth::Token { token, .. }) if !token.is_empty() => {
            stderr.replace(token.as_str(), "<redacted>")
        }
        _ => stderr.to_string(),
    }
}
