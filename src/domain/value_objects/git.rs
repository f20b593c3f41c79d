//! Git value objects: authentication, identity, commits and per-call
//! environment.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default username paired with an access token over HTTPS
pub const DEFAULT_TOKEN_USERNAME: &str = "x-access-token";

/// Authentication method declared by a publisher config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMethod {
    Token,
    SshKey,
    None,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Token => "token",
            AuthMethod::SshKey => "ssh_key",
            AuthMethod::None => "none",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication method plus its secret material.
///
/// `Debug` never prints the secret; log [`GitAuth::method`] instead.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum GitAuth {
    /// HTTPS access token
    Token {
        #[serde(default = "default_token_username")]
        username: String,
        token: String,
    },

    /// SSH private key on local disk
    SshKey { key_path: PathBuf },

    /// Rely on ambient credentials (or a public/local remote)
    None,
}

fn default_token_username() -> String {
    DEFAULT_TOKEN_USERNAME.to_string()
}

impl GitAuth {
    pub fn token(token: impl Into<String>) -> Self {
        GitAuth::Token {
            username: default_token_username(),
            token: token.into(),
        }
    }

    pub fn method(&self) -> AuthMethod {
        match self {
            GitAuth::Token { .. } => AuthMethod::Token,
            GitAuth::SshKey { .. } => AuthMethod::SshKey,
            GitAuth::None => AuthMethod::None,
        }
    }
}

impl Default for GitAuth {
    fn default() -> Self {
        GitAuth::None
    }
}

impl fmt::Debug for GitAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GitAuth::Token { username, .. } => f
                .debug_struct("Token")
                .field("username", username)
                .field("token", &"<redacted>")
                .finish(),
            GitAuth::SshKey { key_path } => {
                f.debug_struct("SshKey").field("key_path", key_path).finish()
            }
            GitAuth::None => f.write_str("None"),
        }
    }
}

/// Name and email used for commit authorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl GitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for GitIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// A commit request: message plus optional author override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitCommit {
    pub message: String,
    pub author: Option<GitIdentity>,
}

impl GitCommit {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, author: GitIdentity) -> Self {
        self.author = Some(author);
        self
    }
}

/// Environment variables injected into a single git invocation.
///
/// Kept per call so concurrent publishes for different sites never share
/// credentials or identity through process-global state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct GitEnv {
    vars: BTreeMap<String, String>,
}

impl GitEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment carrying author and committer identity, with
    /// interactive prompts disabled.
    pub fn for_identity(identity: &GitIdentity) -> Self {
        Self::new()
            .with("GIT_TERMINAL_PROMPT", "0")
            .with("GIT_AUTHOR_NAME", &identity.name)
            .with("GIT_AUTHOR_EMAIL", &identity.email)
            .with("GIT_COMMITTER_NAME", &identity.name)
            .with("GIT_COMMITTER_EMAIL", &identity.email)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

impl fmt::Debug for GitEnv {
    // Only keys are printed; values may carry credentials.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.vars.keys()).finish()
    }
}
