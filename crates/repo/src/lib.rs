#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Repository access for rebuildr
//!
//! Clone-or-reuse of upstream VCS repositories into a local cache, and
//! read-only snapshot operations over them: tree reads, directory
//! listings, grep, per-path history, and tag resolution. The handle
//! owns its storage; everything here is read-only on a snapshot.

mod snapshot;

pub use snapshot::{CommitInfo, GrepHit, TagInfo};

use git2::build::RepoBuilder;
use git2::Repository;
use rebuildr_errors::{Error, RepoError, Result};
use rebuildr_hash::Hash;
use std::path::{Path, PathBuf};

pub(crate) fn git_err(e: &git2::Error) -> Error {
    RepoError::Git(e.message().to_string()).into()
}

/// Cache of cloned repositories, keyed by URL.
///
/// A prior local copy is reused; only missing refs are fetched.
#[derive(Debug, Clone)]
pub struct RepoCache {
    root: PathBuf,
}

impl RepoCache {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory a URL's clone lives in: a readable slug plus a content
    /// hash so distinct URLs never collide.
    #[must_use]
    pub fn dir_for(&self, url: &str) -> PathBuf {
        let slug: String = url
            .trim_end_matches(".git")
            .chars()
            .rev()
            .take(40)
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
            .collect::<String>()
            .chars()
            .rev()
            .collect();
        let digest = Hash::from_data(url.as_bytes()).to_hex();
        self.root.join(format!("{slug}-{}", &digest[..8]))
    }

    /// Open a cached clone of `url`, cloning it first when absent.
    ///
    /// # Errors
    ///
    /// Returns a transient clone/fetch error on network failure.
    pub fn open_or_clone(&self, url: &str) -> Result<RepoHandle> {
        let path = self.dir_for(url);
        if path.join("HEAD").exists() || path.join(".git").exists() {
            let repo = Repository::open(&path).map_err(|e| git_err(&e))?;
            Self::fetch_updates(&repo, url)?;
            return Ok(RepoHandle {
                repo,
                url: url.to_string(),
                path,
            });
        }

        std::fs::create_dir_all(&path).map_err(|e| Error::io_with_path(&e, &path))?;
        let repo = RepoBuilder::new()
            .bare(true)
            .clone(url, &path)
            .map_err(|e| {
                Error::from(RepoError::CloneFailed {
                    url: url.to_string(),
                    message: e.message().to_string(),
                })
            })?;
        tracing::debug!(url, path = %path.display(), "cloned repository");
        Ok(RepoHandle {
            repo,
            url: url.to_string(),
            path,
        })
    }

    fn fetch_updates(repo: &Repository, url: &str) -> Result<()> {
        let mut remote = repo.find_remote("origin").map_err(|e| git_err(&e))?;
        remote
            .fetch(
                &[
                    "+refs/heads/*:refs/remotes/origin/*",
                    "+refs/tags/*:refs/tags/*",
                ],
                None,
                None,
            )
            .map_err(|e| {
                Error::from(RepoError::FetchFailed {
                    url: url.to_string(),
                    message: e.message().to_string(),
                })
            })?;
        tracing::debug!(url, "refreshed cached repository");
        Ok(())
    }
}

/// Handle over one cached repository.
pub struct RepoHandle {
    pub(crate) repo: Repository,
    url: String,
    path: PathBuf,
}

impl RepoHandle {
    /// Open an existing repository directly (fixtures and tests). The
    /// path doubles as the clone URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a git repository.
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path).map_err(|e| git_err(&e))?;
        Ok(Self {
            repo,
            url: path.display().to_string(),
            path: path.to_path_buf(),
        })
    }

    /// The clone URL this handle was opened from.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// On-disk location of the clone.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
