//! Read-only snapshot operations over a repository handle

use crate::{git_err, RepoHandle};
use git2::{ObjectType, Oid, Sort, TreeWalkMode, TreeWalkResult};
use rebuildr_errors::{Error, RepoError, Result};
use regex::Regex;
use std::path::Path;

/// One grep match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrepHit {
    pub file: String,
    /// 1-based line number.
    pub line: u64,
    pub text: String,
}

/// A tag with its resolved commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub name: String,
    pub commit: String,
    /// Committer time of the tagged commit, epoch seconds.
    pub commit_time: i64,
}

/// A commit in a path's history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub id: String,
    pub parents: Vec<String>,
    /// Committer time, epoch seconds.
    pub time: i64,
}

impl RepoHandle {
    /// Resolve a commit id, ref name, or tag to a full commit id.
    ///
    /// # Errors
    ///
    /// `RefNotFound` if nothing in the repository matches.
    pub fn resolve_commit(&self, spec: &str) -> Result<String> {
        let object = self
            .repo
            .revparse_single(spec)
            .map_err(|_| Error::from(RepoError::RefNotFound(spec.to_string())))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::from(RepoError::RefNotFound(spec.to_string())))?;
        Ok(commit.id().to_string())
    }

    /// All tags with their target commits.
    ///
    /// # Errors
    ///
    /// Returns an error on repository corruption.
    pub fn tags(&self) -> Result<Vec<TagInfo>> {
        let names = self.repo.tag_names(None).map_err(|e| git_err(&e))?;
        let mut out = Vec::new();
        for name in names.iter().flatten() {
            let Ok(object) = self.repo.revparse_single(&format!("refs/tags/{name}")) else {
                continue;
            };
            let Ok(commit) = object.peel_to_commit() else {
                continue;
            };
            out.push(TagInfo {
                name: name.to_string(),
                commit: commit.id().to_string(),
                commit_time: commit.time().seconds(),
            });
        }
        Ok(out)
    }

    /// Resolve one tag by name.
    ///
    /// # Errors
    ///
    /// `TagNotFound` when the tag does not exist.
    pub fn resolve_tag(&self, name: &str) -> Result<String> {
        let object = self
            .repo
            .revparse_single(&format!("refs/tags/{name}"))
            .map_err(|_| Error::from(RepoError::TagNotFound(name.to_string())))?;
        let commit = object
            .peel_to_commit()
            .map_err(|_| Error::from(RepoError::TagNotFound(name.to_string())))?;
        Ok(commit.id().to_string())
    }

    /// Read a file at a commit.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when the path is absent from the commit's tree.
    pub fn read_file(&self, commit: &str, path: &str) -> Result<Vec<u8>> {
        let oid = Oid::from_str(commit)
            .map_err(|_| Error::from(RepoError::RefNotFound(commit.to_string())))?;
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|_| Error::from(RepoError::RefNotFound(oid.to_string())))?;
        let tree = commit.tree().map_err(|e| git_err(&e))?;
        let entry = tree
            .get_path(Path::new(path))
            .map_err(|_| Error::from(RepoError::PathNotFound(path.to_string())))?;
        let blob = self.repo.find_blob(entry.id()).map_err(|e| git_err(&e))?;
        Ok(blob.content().to_vec())
    }

    /// List the immediate children of a directory at a commit.
    /// Directories carry a trailing `/`.
    ///
    /// # Errors
    ///
    /// `PathNotFound` when the directory is absent.
    pub fn list_dir(&self, commit: &str, path: &str) -> Result<Vec<String>> {
        let oid = Oid::from_str(commit)
            .map_err(|_| Error::from(RepoError::RefNotFound(commit.to_string())))?;
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|_| Error::from(RepoError::RefNotFound(oid.to_string())))?;
        let root = commit.tree().map_err(|e| git_err(&e))?;

        let tree = if path.is_empty() || path == "." {
            root
        } else {
            let entry = root
                .get_path(Path::new(path))
                .map_err(|_| Error::from(RepoError::PathNotFound(path.to_string())))?;
            let object = entry.to_object(&self.repo).map_err(|e| git_err(&e))?;
            object
                .peel_to_tree()
                .map_err(|_| Error::from(RepoError::PathNotFound(path.to_string())))?
        };

        let mut out = Vec::new();
        for entry in tree.iter() {
            let Some(name) = entry.name() else { continue };
            if entry.kind() == Some(ObjectType::Tree) {
                out.push(format!("{name}/"));
            } else {
                out.push(name.to_string());
            }
        }
        out.sort();
        Ok(out)
    }

    /// Grep a commit's tree: files whose path matches `pathspec`,
    /// lines matching `pattern`.
    ///
    /// # Errors
    ///
    /// `RefNotFound` for unknown commits.
    pub fn grep(&self, commit: &str, pathspec: &Regex, pattern: &Regex) -> Result<Vec<GrepHit>> {
        let oid = Oid::from_str(commit)
            .map_err(|_| Error::from(RepoError::RefNotFound(commit.to_string())))?;
        let commit = self
            .repo
            .find_commit(oid)
            .map_err(|_| Error::from(RepoError::RefNotFound(oid.to_string())))?;
        let tree = commit.tree().map_err(|e| git_err(&e))?;

        let mut hits = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            if entry.kind() != Some(ObjectType::Blob) {
                return TreeWalkResult::Ok;
            }
            let Some(name) = entry.name() else {
                return TreeWalkResult::Ok;
            };
            let full = format!("{root}{name}");
            if !pathspec.is_match(&full) {
                return TreeWalkResult::Ok;
            }
            let Ok(blob) = self.repo.find_blob(entry.id()) else {
                return TreeWalkResult::Ok;
            };
            let Ok(text) = std::str::from_utf8(blob.content()) else {
                return TreeWalkResult::Ok;
            };
            for (i, line) in text.lines().enumerate() {
                if pattern.is_match(line) {
                    hits.push(GrepHit {
                        file: full.clone(),
                        line: (i + 1) as u64,
                        text: line.to_string(),
                    });
                }
            }
            TreeWalkResult::Ok
        })
        .map_err(|e| git_err(&e))?;
        Ok(hits)
    }

    /// Whether a path exists at a commit.
    #[must_use]
    pub fn has_path(&self, commit: &str, path: &str) -> bool {
        self.read_file(commit, path).is_ok()
    }

    /// Commits that change `path`, newest first by committer time.
    ///
    /// A commit touches the path when its blob differs from every
    /// parent's (or the path appears in a root commit).
    ///
    /// # Errors
    ///
    /// Returns an error on repository corruption.
    pub fn log_touching(&self, path: &str) -> Result<Vec<CommitInfo>> {
        let mut walk = self.repo.revwalk().map_err(|e| git_err(&e))?;
        walk.set_sorting(Sort::TIME).map_err(|e| git_err(&e))?;
        walk.push_head().map_err(|e| git_err(&e))?;

        let blob_at = |commit: &git2::Commit<'_>| -> Option<Oid> {
            commit
                .tree()
                .ok()?
                .get_path(Path::new(path))
                .ok()
                .map(|e| e.id())
        };

        let mut out = Vec::new();
        for oid in walk {
            let oid = oid.map_err(|e| git_err(&e))?;
            let commit = self.repo.find_commit(oid).map_err(|e| git_err(&e))?;
            let own = blob_at(&commit);
            if own.is_none() {
                continue;
            }
            let parents: Vec<_> = commit.parents().collect();
            let touched = if parents.is_empty() {
                true
            } else {
                parents.iter().all(|p| blob_at(p) != own)
            };
            if touched {
                out.push(CommitInfo {
                    id: oid.to_string(),
                    parents: commit.parent_ids().map(|p| p.to_string()).collect(),
                    time: commit.time().seconds(),
                });
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::{Repository, Signature};
    use std::path::PathBuf;

    /// Build a small repository with two commits changing a manifest.
    fn fixture() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repo");
        let repo = Repository::init(&path).unwrap();
        let sig = Signature::now("tester", "tester@example.com").unwrap();

        let write_commit = |version: &str, parent: Option<git2::Oid>| -> git2::Oid {
            std::fs::write(
                path.join("package.json"),
                format!(r#"{{"name": "test-package", "version": "{version}"}}"#),
            )
            .unwrap();
            std::fs::create_dir_all(path.join("src")).unwrap();
            std::fs::write(path.join("src/index.js"), "module.exports = 1;\n").unwrap();
            let mut index = repo.index().unwrap();
            index
                .add_all(["*"].iter(), git2::IndexAddOption::DEFAULT, None)
                .unwrap();
            index.write().unwrap();
            let tree_id = index.write_tree().unwrap();
            let tree = repo.find_tree(tree_id).unwrap();
            let parents: Vec<git2::Commit<'_>> =
                parent.map(|p| repo.find_commit(p).unwrap()).into_iter().collect();
            let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
            repo.commit(Some("HEAD"), &sig, &sig, version, &tree, &parent_refs)
                .unwrap()
        };

        let first = write_commit("0.9.0", None);
        let second = write_commit("1.0.0", Some(first));
        repo.tag_lightweight("v1.0.0", &repo.find_commit(second).unwrap().into_object(), false)
            .unwrap();

        (dir, path)
    }

    #[test]
    fn reads_files_and_lists_dirs() {
        let (_tmp, path) = fixture();
        let handle = RepoHandle::open(&path).unwrap();
        let head = handle.resolve_commit("HEAD").unwrap();

        let manifest = handle.read_file(&head, "package.json").unwrap();
        assert!(std::str::from_utf8(&manifest).unwrap().contains("1.0.0"));

        let listing = handle.list_dir(&head, "").unwrap();
        assert_eq!(listing, vec!["package.json".to_string(), "src/".to_string()]);

        assert!(handle.read_file(&head, "missing.txt").is_err());
    }

    #[test]
    fn grep_finds_name_line() {
        let (_tmp, path) = fixture();
        let handle = RepoHandle::open(&path).unwrap();
        let head = handle.resolve_commit("HEAD").unwrap();

        let hits = handle
            .grep(
                &head,
                &Regex::new(r"package\.json$").unwrap(),
                &Regex::new(r#""name":\s*"test-package""#).unwrap(),
            )
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].file, "package.json");
        assert_eq!(hits[0].line, 1);
    }

    #[test]
    fn tag_resolution_and_history() {
        let (_tmp, path) = fixture();
        let handle = RepoHandle::open(&path).unwrap();

        let tagged = handle.resolve_tag("v1.0.0").unwrap();
        assert_eq!(tagged, handle.resolve_commit("HEAD").unwrap());
        assert!(handle.resolve_tag("v9.9.9").is_err());

        let log = handle.log_touching("package.json").unwrap();
        assert_eq!(log.len(), 2);
        // newest first
        assert_eq!(log[0].id, tagged);
    }
}
