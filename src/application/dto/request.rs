//! Request DTOs
//!
//! Data structures for API request bodies.

use serde::Deserialize;
use validator::Validate;

use crate::domain::value_objects::{GitAuth, GitIdentity, PublisherConfig};

/// Commit identity as sent by clients
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct IdentityRequest {
    #[validate(length(min = 1, max = 255, message = "Name must be 1-255 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

impl From<IdentityRequest> for GitIdentity {
    fn from(identity: IdentityRequest) -> Self {
        GitIdentity::new(identity.name, identity.email)
    }
}

/// Plan or publish request
#[derive(Debug, Deserialize, Validate)]
pub struct PublishRequest {
    #[validate(length(min = 1, max = 2048, message = "Repository URL must be 1-2048 characters"))]
    pub repo_url: String,

    #[serde(default)]
    pub auth: GitAuth,

    #[validate(length(min = 1, max = 255, message = "Branch must be 1-255 characters"))]
    pub branch: Option<String>,

    /// Remote name inside the working clone; defaults to `origin`
    #[validate(length(min = 1, max = 255, message = "Remote must be 1-255 characters"))]
    pub remote: Option<String>,

    #[validate(nested)]
    pub identity: IdentityRequest,

    #[validate(length(min = 1, max = 4096, message = "Message must be 1-4096 characters"))]
    pub message: Option<String>,

    #[validate(nested)]
    pub author: Option<IdentityRequest>,
}

impl PublishRequest {
    /// Build the immutable config for one invocation.
    pub fn into_config(self) -> PublisherConfig {
        let mut config = PublisherConfig::new(self.repo_url, self.identity.into()).with_auth(self.auth);
        if let Some(branch) = self.branch {
            config = config.with_branch(branch);
        }
        if let Some(remote) = self.remote {
            config = config.with_remote(remote);
        }
        config.commit_message = self.message;
        config.commit_author = self.author.map(GitIdentity::from);
        config
    }
}
