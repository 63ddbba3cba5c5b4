#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Asset storage
//!
//! Opaque blobs keyed by `(run_id, target, kind)`. Writers
//! create-or-overwrite; readers fail with `NotFound` for absent keys.
//! The filesystem backend lays assets out URL-locatably at
//! `<root>/assets/<run_id>/<encoded_target>/<asset_kind>` so external
//! tools can reach them without going through this crate.

use async_trait::async_trait;
use rebuildr_errors::{Error, Result, StorageError};
use rebuildr_types::Asset;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

/// Boxed async reader handed out by stores.
pub type AssetReader = Pin<Box<dyn AsyncRead + Send>>;
/// Boxed async writer handed out by stores.
pub type AssetWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// Blob storage for rebuild inputs, intermediates, and logs.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Open a create-or-overwrite writer for an asset.
    async fn writer(&self, run_id: &str, asset: &Asset) -> Result<AssetWriter>;

    /// Open a reader for an asset. `NotFound` when absent.
    async fn reader(&self, run_id: &str, asset: &Asset) -> Result<AssetReader>;

    /// Stable locator for out-of-band access to an asset.
    fn url_for(&self, run_id: &str, asset: &Asset) -> String;

    /// Convenience: write a whole blob.
    async fn put(&self, run_id: &str, asset: &Asset, data: &[u8]) -> Result<()> {
        let mut writer = self.writer(run_id, asset).await?;
        writer.write_all(data).await?;
        writer.shutdown().await?;
        Ok(())
    }

    /// Convenience: read a whole blob.
    async fn get(&self, run_id: &str, asset: &Asset) -> Result<Vec<u8>> {
        let mut reader = self.reader(run_id, asset).await?;
        let mut out = Vec::new();
        tokio::io::AsyncReadExt::read_to_end(&mut reader, &mut out).await?;
        Ok(out)
    }
}

/// Local filesystem asset store.
#[derive(Debug, Clone)]
pub struct FilesystemAssetStore {
    root: PathBuf,
}

impl FilesystemAssetStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// On-disk path of one asset.
    #[must_use]
    pub fn path_for(&self, run_id: &str, asset: &Asset) -> PathBuf {
        self.root
            .join("assets")
            .join(run_id)
            .join(asset.target.encoded())
            .join(asset.kind.as_str())
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl AssetStore for FilesystemAssetStore {
    async fn writer(&self, run_id: &str, asset: &Asset) -> Result<AssetWriter> {
        let path = self.path_for(run_id, asset);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }
        let file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        Ok(Box::pin(file))
    }

    async fn reader(&self, run_id: &str, asset: &Asset) -> Result<AssetReader> {
        let path = self.path_for(run_id, asset);
        let file = tokio::fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound {
                    path: path.display().to_string(),
                }
                .into()
            } else {
                Error::io_with_path(&e, &path)
            }
        })?;
        Ok(Box::pin(file))
    }

    fn url_for(&self, run_id: &str, asset: &Asset) -> String {
        format!("file://{}", self.path_for(run_id, asset).display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebuildr_errors::ErrorKind;
    use rebuildr_types::{AssetKind, Ecosystem, Target};

    fn asset() -> Asset {
        let mut target = Target::new(Ecosystem::Npm, "@scope/pkg", "1.0.0").unwrap();
        target.set_artifact("scope-pkg-1.0.0.tgz").unwrap();
        Asset::new(target, AssetKind::BuildLogs)
    }

    #[tokio::test]
    async fn layout_is_url_locatable() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAssetStore::new(dir.path());
        let path = store.path_for("run-1", &asset());
        assert!(path
            .to_string_lossy()
            .ends_with("assets/run-1/npm!scope!pkg!1.0.0!scope-pkg-1.0.0.tgz/build.log"));
    }

    #[tokio::test]
    async fn put_get_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAssetStore::new(dir.path());
        let asset = asset();

        store.put("run-1", &asset, b"first").await.unwrap();
        store.put("run-1", &asset, b"second").await.unwrap();
        assert_eq!(store.get("run-1", &asset).await.unwrap(), b"second");
    }

    #[tokio::test]
    async fn missing_asset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemAssetStore::new(dir.path());
        let err = store.get("run-1", &asset()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
