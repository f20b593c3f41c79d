//! Publisher Tests Against a Real `git`
//!
//! Uses a local bare repository as the remote. Skipped when no `git`
//! binary is available.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use sitepress::application::services::{PublishService, PublishServiceImpl};
use sitepress::domain::services::VcsClient;
use sitepress::domain::value_objects::{GitAuth, GitEnv, GitIdentity, PublisherConfig, SiteSlug};
use sitepress::infrastructure::cache::SiteLocks;
use sitepress::infrastructure::git::GitCommandClient;

fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn init_bare(path: &Path) {
    let status = Command::new("git")
        .args(["init", "--quiet", "--bare"])
        .arg(path)
        .status()
        .unwrap();
    assert!(status.success());
}

fn remote_head(remote: &Path, branch: &str) -> String {
    let output = Command::new("git")
        .arg("--git-dir")
        .arg(remote)
        .args(["rev-parse", &format!("refs/heads/{}", branch)])
        .output()
        .unwrap();
    assert!(output.status.success());
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(["-c", "user.name=Someone Else", "-c", "user.email=else@example.com"])
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout).unwrap()
}

fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (path, contents) in files {
        let dest = root.join(path);
        std::fs::create_dir_all(dest.parent().unwrap()).unwrap();
        std::fs::write(dest, contents).unwrap();
    }
}

struct Fixture {
    publisher: PublishServiceImpl<GitCommandClient>,
    config: PublisherConfig,
    site: SiteSlug,
    source: std::path::PathBuf,
    remote: std::path::PathBuf,
    _dir: TempDir,
}

fn fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    let remote = dir.path().join("remote.git");
    init_bare(&remote);

    let source = dir.path().join("sites").join("blog");
    write_tree(
        &source,
        &[("index.html", "<h1>blog</h1>"), ("posts/first/index.html", "<p>first</p>")],
    );

    let vcs = Arc::new(GitCommandClient::new("git", Duration::from_secs(60)));
    let publisher =
        PublishServiceImpl::new(vcs, Arc::new(SiteLocks::new()), dir.path().join("work"));
    let config = PublisherConfig::new(
        remote.to_string_lossy().into_owned(),
        GitIdentity::new("Publisher", "publisher@example.com"),
    );

    Fixture {
        publisher,
        config,
        site: SiteSlug::parse("blog").unwrap(),
        source,
        remote,
        _dir: dir,
    }
}

#[tokio::test]
async fn test_publish_to_empty_bare_repo_is_idempotent() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let f = fixture();
    let ctx = CancellationToken::new();

    let first = f
        .publisher
        .publish(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();
    assert!(first.new_commit);
    let hash = first.commit.as_ref().unwrap().hash.clone();
    assert_eq!(remote_head(&f.remote, "main"), hash);
    // Local path remote: no browse URL
    assert!(first.commit.as_ref().unwrap().url.is_none());

    let second = f
        .publisher
        .publish(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();
    assert!(!second.new_commit);
    assert_eq!(second.commit.unwrap().hash, hash);
    assert_eq!(remote_head(&f.remote, "main"), hash);
}

#[tokio::test]
async fn test_publish_removes_deleted_files() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let f = fixture();
    let ctx = CancellationToken::new();

    let first = f
        .publisher
        .publish(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();

    std::fs::remove_dir_all(f.source.join("posts")).unwrap();
    let report = f
        .publisher
        .plan(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();
    assert_eq!(report.changes.len(), 1);
    assert_eq!(report.changes[0].path, "posts/first/index.html");

    let second = f
        .publisher
        .publish(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();
    assert!(second.new_commit);
    assert_eq!(second.sync.removed, 1);
    assert_ne!(second.commit.unwrap().hash, first.commit.unwrap().hash);
}

#[tokio::test]
async fn test_publish_after_remote_moved_elsewhere() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let f = fixture();
    let ctx = CancellationToken::new();
    f.publisher
        .publish(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();

    // Someone else pushes to the same branch.
    let other = f.remote.parent().unwrap().join("other");
    let status = Command::new("git")
        .args(["clone", "--quiet", "--branch", "main"])
        .arg(&f.remote)
        .arg(&other)
        .status()
        .unwrap();
    assert!(status.success());
    write_tree(&other, &[("CNAME", "blog.example.com")]);
    git(&other, &["add", "."]);
    git(&other, &["commit", "--quiet", "-m", "Add CNAME"]);
    git(&other, &["push", "--quiet", "origin", "main"]);
    let foreign = remote_head(&f.remote, "main");

    write_tree(&f.source, &[("about.html", "<p>about</p>")]);
    let second = f
        .publisher
        .publish(&ctx, &f.site, &f.config, &f.source)
        .await
        .unwrap();
    assert!(second.new_commit);
    let head = second.commit.unwrap().hash;
    assert_eq!(remote_head(&f.remote, "main"), head);

    let bare = f.remote.as_path();
    let ancestry = Command::new("git")
        .arg("--git-dir")
        .arg(bare)
        .args(["merge-base", "--is-ancestor", &foreign, &head])
        .status()
        .unwrap();
    assert!(ancestry.success());
    let files = Command::new("git")
        .arg("--git-dir")
        .arg(bare)
        .args(["ls-tree", "-r", "--name-only", "main"])
        .output()
        .unwrap();
    assert_eq!(
        String::from_utf8(files.stdout).unwrap(),
        "about.html\nindex.html\nposts/first/index.html\n"
    );
}

#[tokio::test]
async fn test_option_like_url_is_not_executed() {
    if !git_available() {
        eprintln!("git not available, skipping");
        return;
    }
    let dir = TempDir::new().unwrap();
    let marker = dir.path().join("marker");
    let url = format!("--upload-pack=touch {}", marker.display());
    let client = GitCommandClient::new("git", Duration::from_secs(60));

    let result = client
        .clone_repo(
            &CancellationToken::new(),
            &url,
            &dir.path().join("clone"),
            "origin",
            &GitAuth::None,
            &GitEnv::new(),
        )
        .await;
    assert!(result.is_err());
    assert!(!marker.exists());
}
