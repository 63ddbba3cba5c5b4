//! Shared fixtures for the integration tests

use git2::{IndexAddOption, Oid, Repository, Signature};
use std::io::Write;
use std::path::{Path, PathBuf};

/// A scripted git repository fixture.
pub struct FixtureRepo {
    pub repo: Repository,
    pub path: PathBuf,
    _dir: tempfile::TempDir,
}

impl FixtureRepo {
    /// Initialize an empty repository with a `main` branch.
    #[must_use]
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("repo");
        let repo = Repository::init(&path).expect("git init");
        repo.set_head("refs/heads/main").expect("set head");
        Self {
            repo,
            path,
            _dir: dir,
        }
    }

    /// Write files and commit them, returning the commit id.
    pub fn commit(&self, message: &str, files: &[(&str, &str)]) -> String {
        for (rel, content) in files {
            let full = self.path.join(rel);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).expect("mkdir");
            }
            std::fs::write(&full, content).expect("write file");
        }
        let sig = Signature::now("fixture", "fixture@example.com").expect("signature");
        let mut index = self.repo.index().expect("index");
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .expect("add");
        index.write().expect("index write");
        let tree_id = index.write_tree().expect("write tree");
        let tree = self.repo.find_tree(tree_id).expect("find tree");
        let parent = self
            .repo
            .head()
            .ok()
            .and_then(|h| h.target())
            .map(|oid| self.repo.find_commit(oid).expect("parent commit"));
        let parents: Vec<_> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .expect("commit");
        oid.to_string()
    }

    /// Create a lightweight tag at a commit.
    pub fn tag(&self, name: &str, commit: &str) {
        let oid = Oid::from_str(commit).expect("oid");
        let object = self.repo.find_commit(oid).expect("commit").into_object();
        self.repo.tag_lightweight(name, &object, false).expect("tag");
    }

    /// A manifest body for an npm fixture package.
    #[must_use]
    pub fn package_json(name: &str, version: &str, scripts: &[(&str, &str)]) -> String {
        let scripts_body = scripts
            .iter()
            .map(|(k, v)| format!(r#""{k}": "{v}""#))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            r#"{{"name": "{name}", "version": "{version}", "scripts": {{{scripts_body}}}}}"#
        )
    }
}

impl Default for FixtureRepo {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an npm-shaped gzipped tarball from (path, content) pairs.
#[must_use]
pub fn npm_tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_mode(0o644);
        header.set_mtime(1_676_023_200);
        header.set_size(data.len() as u64);
        builder.append_data(&mut header, path, *data).expect("tar");
    }
    let tar_bytes = builder.into_inner().expect("tar finish");
    let mut encoder =
        flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(&tar_bytes).expect("gzip");
    encoder.finish().expect("gzip finish")
}

/// Open a fixture repository path as a rebuildr repo handle.
#[must_use]
pub fn open_handle(path: &Path) -> rebuildr_repo::RepoHandle {
    rebuildr_repo::RepoHandle::open(path).expect("open handle")
}
