//! Dry-run publish report.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::git::AuthMethod;
use super::slug::SiteSlug;

/// How a single file would change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

impl ChangeKind {
    /// Single-letter marker, as in `git status --short`
    pub fn marker(&self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Removed => 'D',
        }
    }
}

/// One changed file, path relative to the tree root using `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct FileChange {
    pub path: String,
    pub kind: ChangeKind,
}

/// What a publish would do, computed without touching the remote.
#[derive(Debug, Clone, Serialize)]
pub struct PlanReport {
    pub site: SiteSlug,
    /// Remote URL with credentials stripped
    pub remote_url: String,
    pub branch: String,
    pub auth_method: AuthMethod,
    /// Local branch head in the working clone, if one exists
    pub baseline: Option<String>,
    /// Remote branch head as of the clone's last fetch
    pub remote_head: Option<String>,
    /// Local commits the remote does not have yet, newest first
    pub unpushed: Vec<String>,
    /// Sorted by path
    pub changes: Vec<FileChange>,
    pub unchanged: usize,
    pub generated_at: DateTime<Utc>,
}

impl PlanReport {
    /// True when a publish would commit or push anything.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty() || !self.unpushed.is_empty()
    }

    pub fn count(&self, kind: ChangeKind) -> usize {
        self.changes.iter().filter(|c| c.kind == kind).count()
    }

    /// One-line human summary.
    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return format!(
                "{}: no changes to publish to {} ({} files unchanged)",
                self.site, self.branch, self.unchanged
            );
        }
        let mut summary = format!(
            "{}: {} added, {} modified, {} removed on {} ({} unchanged)",
            self.site,
            self.count(ChangeKind::Added),
            self.count(ChangeKind::Modified),
            self.count(ChangeKind::Removed),
            self.branch,
            self.unchanged
        );
        if !self.unpushed.is_empty() {
            summary.push_str(&format!(", {} unpushed commit(s)", self.unpushed.len()));
        }
        summary
    }
}

impl fmt::Display for PlanReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.summary())?;
        writeln!(f, "remote: {} (auth: {})", self.remote_url, self.auth_method)?;
        match &self.baseline {
            Some(head) => writeln!(f, "baseline: {}", head)?,
            None => writeln!(f, "baseline: none (first publish)")?,
        }
        for hash in &self.unpushed {
            writeln!(f, "  unpushed {}", hash)?;
        }
        for change in &self.changes {
            writeln!(f, "  {} {}", change.kind.marker(), change.path)?;
        }
        Ok(())
    }
}
