//! Git client implementations.
//!
//! - **command**: Spawns the system `git` binary
//! - **fake**: Recording in-memory double used by tests

pub mod command;
pub mod fake;

pub use command::GitCommandClient;
pub use fake::{FakeVcsClient, VcsCall, VcsOp};
