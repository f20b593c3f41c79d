//! Publisher configuration and its structural validation.

use serde::Deserialize;

use super::git::{AuthMethod, GitAuth, GitIdentity};

/// Remote name of every working clone
pub const DEFAULT_REMOTE: &str = "origin";

/// Default target branch
pub const DEFAULT_BRANCH: &str = "main";

/// Everything the publisher needs to ship one site's tree.
///
/// Immutable for the duration of a single plan or publish.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PublisherConfig {
    /// Remote repository URL (https or ssh)
    pub repo_url: String,

    /// Authentication for clone and push
    #[serde(default)]
    pub auth: GitAuth,

    /// Branch to publish to; created when absent
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Name the remote gets in the working clone
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Committer identity
    pub identity: GitIdentity,

    /// Commit message; a generated one is used when absent
    #[serde(default)]
    pub commit_message: Option<String>,

    /// Author override (committer stays `identity`)
    #[serde(default)]
    pub commit_author: Option<GitIdentity>,
}

fn default_branch() -> String {
    DEFAULT_BRANCH.to_string()
}

fn default_remote() -> String {
    DEFAULT_REMOTE.to_string()
}

/// Structural problems with a [`PublisherConfig`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    Missing { field: &'static str },

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("auth method {method} is inconsistent with the config: {reason}")]
    AuthMismatch { method: AuthMethod, reason: String },
}

impl ConfigError {
    /// Name of the offending field
    pub fn field(&self) -> &'static str {
        match self {
            ConfigError::Missing { field } | ConfigError::Invalid { field, .. } => field,
            ConfigError::AuthMismatch { .. } => "auth",
        }
    }
}

impl PublisherConfig {
    /// Minimal config with no auth on the default branch.
    pub fn new(repo_url: impl Into<String>, identity: GitIdentity) -> Self {
        Self {
            repo_url: repo_url.into(),
            auth: GitAuth::None,
            branch: default_branch(),
            remote: default_remote(),
            identity,
            commit_message: None,
            commit_author: None,
        }
    }

    pub fn with_auth(mut self, auth: GitAuth) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = branch.into();
        self
    }

    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Remote-tracking ref of the target branch in the working clone
    pub fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    /// Local ref of the target branch
    pub fn branch_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    /// Check the config is usable. Performs no I/O; key files and remotes
    /// are not touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.repo_url.trim();
        if url.is_empty() {
            return Err(ConfigError::Missing { field: "repo_url" });
        }
        if url.chars().any(char::is_whitespace) {
            return Err(ConfigError::Invalid {
                field: "repo_url",
                reason: "must not contain whitespace".into(),
            });
        }
        // git would parse it as an option
        if url.starts_with('-') {
            return Err(ConfigError::Invalid {
                field: "repo_url",
                reason: "must not start with '-'".into(),
            });
        }

        validate_ref_name("branch", &self.branch)?;
        validate_ref_name("remote", &self.remote)?;
        if self.remote.contains('/') {
            return Err(ConfigError::Invalid {
                field: "remote",
                reason: "must be a single name".into(),
            });
        }
        validate_identity("identity", &self.identity)?;
        if let Some(author) = &self.commit_author {
            validate_identity("commit_author", author)?;
        }
        if matches!(&self.commit_message, Some(m) if m.trim().is_empty()) {
            return Err(ConfigError::Invalid {
                field: "commit_message",
                reason: "must not be blank when set".into(),
            });
        }

        self.validate_auth(url)
    }

    fn validate_auth(&self, url: &str) -> Result<(), ConfigError> {
        let method = self.auth.method();
        match &self.auth {
            GitAuth::Token { username, token } => {
                if token.trim().is_empty() {
                    return Err(ConfigError::AuthMismatch {
                        method,
                        reason: "token must not be empty".into(),
                    });
                }
                if username.trim().is_empty() {
                    return Err(ConfigError::AuthMismatch {
                        method,
                        reason: "username must not be empty".into(),
                    });
                }
                if !is_http_url(url) {
                    return Err(ConfigError::AuthMismatch {
                        method,
                        reason: "token auth requires an http(s) repository URL".into(),
                    });
                }
            }
            GitAuth::SshKey { key_path } => {
                if key_path.as_os_str().is_empty() {
                    return Err(ConfigError::AuthMismatch {
                        method,
                        reason: "key_path must not be empty".into(),
                    });
                }
                if !is_ssh_url(url) {
                    return Err(ConfigError::AuthMismatch {
                        method,
                        reason: "ssh key auth requires an ssh repository URL".into(),
                    });
                }
            }
            GitAuth::None => {}
        }
        Ok(())
    }

    /// Repository URL with any embedded userinfo removed, safe to log.
    pub fn redacted_url(&self) -> String {
        redact_url(&self.repo_url)
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("https://") || url.starts_with("http://")
}

/// `ssh://host/path` or scp-like `user@host:path`
fn is_ssh_url(url: &str) -> bool {
    if url.starts_with("ssh://") || url.starts_with("git+ssh://") {
        return true;
    }
    if url.contains("://") {
        return false;
    }
    match (url.find('@'), url.find(':')) {
        (Some(at), Some(colon)) => at < colon && colon + 1 < url.len(),
        _ => false,
    }
}

/// Strip `user:password@` from a URL with a scheme.
pub fn redact_url(url: &str) -> String {
    if let Some((scheme, rest)) = url.split_once("://") {
        let authority_end = rest.find('/').unwrap_or(rest.len());
        if let Some(at) = rest[..authority_end].rfind('@') {
            return format!("{}://{}", scheme, &rest[at + 1..]);
        }
    }
    url.to_string()
}

fn validate_ref_name(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::Missing { field });
    }
    let invalid = |reason: &str| ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    };
    if value.starts_with('-') || value.starts_with('/') || value.ends_with('/') {
        return Err(invalid("must not start with '-' or '/' or end with '/'"));
    }
    if value.contains("..") || value.contains("//") || value.ends_with(".lock") {
        return Err(invalid("is not a valid git ref name"));
    }
    if let Some(c) = value
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || "~^:?*[\\".contains(*c))
    {
        return Err(ConfigError::Invalid {
            field,
            reason: format!("contains invalid character {:?}", c),
        });
    }
    Ok(())
}

fn validate_identity(field: &'static str, identity: &GitIdentity) -> Result<(), ConfigError> {
    if identity.name.trim().is_empty() || identity.email.trim().is_empty() {
        return Err(ConfigError::Missing { field });
    }
    if !identity.email.contains('@') || identity.email.contains(['<', '>']) {
        return Err(ConfigError::Invalid {
            field,
            reason: "email is not a valid address".into(),
        });
    }
    Ok(())
}
