//! Preview Service
//!
//! Turns `(Host, path)` into a file under a site's materialized tree.
//! Path handling is lexical: traversal is rejected before the filesystem is
//! consulted, so no request can name a file outside the site root.

use std::path::PathBuf;
use std::sync::Arc;

use axum::http::StatusCode;

use super::site_resolver::{HostError, ResolvedSite, SiteResolver};
use crate::domain::value_objects::SiteSlug;
use crate::infrastructure::cache::SiteTreeRegistry;

/// File served for directory requests
pub const INDEX_FILE: &str = "index.html";

/// Request path rejected before any filesystem access.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid percent-encoding in path")]
    BadEncoding,

    #[error("path contains a NUL byte")]
    NulByte,

    #[error("path escapes the site root")]
    Traversal,
}

/// Normalized, root-relative request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanPath {
    pub segments: Vec<String>,
    /// Request ended in a separator (or named the root)
    pub directory: bool,
}

impl CleanPath {
    pub fn relative(&self) -> PathBuf {
        self.segments.iter().collect()
    }
}

/// Decode and normalize a request path.
///
/// Both `/` and `\` separate segments, `.` and empty segments are dropped,
/// `..` removes the previous segment. Popping past the root is a
/// [`PathError::Traversal`].
pub fn clean_path(raw: &str) -> Result<CleanPath, PathError> {
    let decoded = urlencoding::decode(raw).map_err(|_| PathError::BadEncoding)?;
    if decoded.contains('\0') {
        return Err(PathError::NulByte);
    }

    let mut segments: Vec<String> = Vec::new();
    for part in decoded.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(PathError::Traversal);
                }
            }
            other => segments.push(other.to_string()),
        }
    }

    let directory = segments.is_empty() || decoded.ends_with('/') || decoded.ends_with('\\');
    Ok(CleanPath {
        segments,
        directory,
    })
}

/// Why a preview request was not served.
#[derive(Debug, thiserror::Error)]
pub enum PreviewError {
    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Path(#[from] PathError),

    #[error("no rendered tree for site {0}")]
    NoTree(SiteSlug),

    #[error("not found")]
    NotFound,
}

impl PreviewError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PreviewError::Host(_) => StatusCode::BAD_REQUEST,
            PreviewError::Path(PathError::Traversal) => StatusCode::FORBIDDEN,
            PreviewError::Path(_) => StatusCode::BAD_REQUEST,
            PreviewError::NoTree(_) | PreviewError::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Short reason safe to show to clients
    pub fn reason(&self) -> &'static str {
        match self {
            PreviewError::Host(_) => "unknown site",
            PreviewError::Path(PathError::Traversal) => "forbidden",
            PreviewError::Path(_) => "bad request path",
            PreviewError::NoTree(_) | PreviewError::NotFound => "not found",
        }
    }
}

/// A file that exists and may be served.
#[derive(Debug, Clone)]
pub struct ServeTarget {
    pub site: ResolvedSite,
    pub file: PathBuf,
}

/// Resolves preview requests against the site tree registry.
#[derive(Clone)]
pub struct PreviewService {
    resolver: SiteResolver,
    trees: Arc<SiteTreeRegistry>,
}

impl PreviewService {
    pub fn new(resolver: SiteResolver, trees: Arc<SiteTreeRegistry>) -> Self {
        Self { resolver, trees }
    }

    pub fn resolver(&self) -> &SiteResolver {
        &self.resolver
    }

    /// Resolve host, then path, then the file on disk.
    pub async fn locate(
        &self,
        host: Option<&str>,
        raw_path: &str,
    ) -> Result<ServeTarget, PreviewError> {
        let site = self.resolver.resolve(host.unwrap_or_default())?;
        let path = clean_path(raw_path)?;

        let root = self
            .trees
            .root_for(&site.slug)
            .await
            .ok_or_else(|| PreviewError::NoTree(site.slug.clone()))?;

        let mut file = root.join(path.relative());
        if path.directory {
            file.push(INDEX_FILE);
        } else if is_dir(&file).await {
            file.push(INDEX_FILE);
        }

        match tokio::fs::metadata(&file).await {
            Ok(meta) if meta.is_file() => Ok(ServeTarget { site, file }),
            _ => Err(PreviewError::NotFound),
        }
    }
}

async fn is_dir(path: &std::path::Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;
    use test_case::test_case;

    #[test_case("/", &[], true ; "root")]
    #[test_case("/index.html", &["index.html"], false ; "file")]
    #[test_case("/blog/", &["blog"], true ; "trailing slash")]
    #[test_case("/a/./b//c", &["a", "b", "c"], false ; "dots and empties")]
    #[test_case("/a/b/../c", &["a", "c"], false ; "dotdot pops")]
    #[test_case("/a\\b", &["a", "b"], false ; "backslash separator")]
    #[test_case("/my%20page.html", &["my page.html"], false ; "percent decoded")]
    #[test_case("/a/..", &[], true ; "pop to root")]
    fn test_clean_path(raw: &str, segments: &[&str], directory: bool) {
        let clean = clean_path(raw).unwrap();
        assert_eq!(clean.segments, segments.to_vec());
        assert_eq!(clean.directory, directory);
    }

    #[test_case("/../etc/passwd" ; "leading dotdot")]
    #[test_case("/../../../etc/passwd" ; "deep")]
    #[test_case("/a/../../b" ; "past root after pop")]
    #[test_case("/%2e%2e/secret" ; "encoded dots")]
    #[test_case("/..%2fsecret" ; "encoded slash")]
    #[test_case("/..\\secret" ; "backslash")]
    fn test_traversal_rejected(raw: &str) {
        assert_eq!(clean_path(raw), Err(PathError::Traversal));
    }

    #[test]
    fn test_bad_encoding_and_nul() {
        assert_eq!(clean_path("/%ff%fe"), Err(PathError::BadEncoding));
        assert_eq!(clean_path("/a%00b"), Err(PathError::NulByte));
    }

    fn service(dir: &TempDir) -> PreviewService {
        let trees = Arc::new(SiteTreeRegistry::new(dir.path()));
        let resolver = SiteResolver::new("localhost", SiteSlug::parse("main").unwrap());
        PreviewService::new(resolver, trees)
    }

    #[tokio::test]
    async fn test_locate_index_and_files() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("test");
        std::fs::create_dir_all(root.join("docs")).unwrap();
        std::fs::write(root.join("index.html"), "home").unwrap();
        std::fs::write(root.join("docs/index.html"), "docs").unwrap();
        std::fs::write(root.join("style.css"), "body{}").unwrap();
        let svc = service(&dir);

        let host = Some("test.localhost:8080");
        assert_eq!(svc.locate(host, "/").await.unwrap().file, root.join("index.html"));
        assert_eq!(
            svc.locate(host, "/docs").await.unwrap().file,
            root.join("docs/index.html")
        );
        assert_eq!(svc.locate(host, "/style.css").await.unwrap().file, root.join("style.css"));
        assert!(matches!(
            svc.locate(host, "/missing.html").await,
            Err(PreviewError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_locate_status_codes() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let err = svc.locate(Some("test.localhost:8080"), "/").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = svc
            .locate(Some("test.localhost"), "/../../../etc/passwd")
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let err = svc.locate(Some("example.com"), "/").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = svc.locate(None, "/").await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
