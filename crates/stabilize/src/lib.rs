#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Artifact stabilization
//!
//! Both the upstream artifact and the rebuild pass through the same
//! stabilizer chain before comparison: entries sorted by name, mtimes
//! zeroed, modes normalized to 0644/0755, owner metadata stripped, and
//! the compression container rewritten with fixed metadata. Ecosystem
//! chains additionally canonicalize known embedded files. Stabilization
//! is idempotent: `stabilize(stabilize(x)) == stabilize(x)`.

mod canonical;
mod deb;
mod targz;
mod zipfile;

pub use targz::{read_tar_gz, ArchiveEntry};

use rebuildr_errors::{Error, Result};
use rebuildr_types::Ecosystem;

/// The archive container formats the stabilizer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    TarGz,
    Zip,
    Deb,
}

impl ArchiveType {
    /// Detect by artifact filename, falling back to magic bytes.
    #[must_use]
    pub fn detect(artifact_name: &str, data: &[u8]) -> Option<Self> {
        let lower = artifact_name.to_lowercase();
        if lower.ends_with(".tgz") || lower.ends_with(".tar.gz") || lower.ends_with(".crate") {
            return Some(Self::TarGz);
        }
        if lower.ends_with(".zip") || lower.ends_with(".whl") || lower.ends_with(".jar") {
            return Some(Self::Zip);
        }
        if lower.ends_with(".deb") {
            return Some(Self::Deb);
        }
        match data {
            [0x1f, 0x8b, ..] => Some(Self::TarGz),
            [0x50, 0x4b, ..] => Some(Self::Zip),
            _ if data.starts_with(b"!<arch>\n") => Some(Self::Deb),
            _ => None,
        }
    }
}

/// Stabilize an artifact for comparison.
///
/// # Errors
///
/// Returns an error when the container cannot be detected or decoded.
pub fn stabilize(artifact_name: &str, data: &[u8], ecosystem: Ecosystem) -> Result<Vec<u8>> {
    let archive_type = ArchiveType::detect(artifact_name, data).ok_or_else(|| {
        Error::internal(format!("unrecognized archive container: {artifact_name}"))
    })?;
    match archive_type {
        ArchiveType::TarGz => targz::stabilize_tar_gz(data, ecosystem),
        ArchiveType::Zip => zipfile::stabilize_zip(data, ecosystem),
        ArchiveType::Deb => deb::stabilize_deb(data),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_name_and_magic() {
        assert_eq!(
            ArchiveType::detect("pkg-1.0.0.tgz", &[]),
            Some(ArchiveType::TarGz)
        );
        assert_eq!(
            ArchiveType::detect("pkg-1.0.0.crate", &[]),
            Some(ArchiveType::TarGz)
        );
        assert_eq!(
            ArchiveType::detect("six-1.16.0-py3-none-any.whl", &[]),
            Some(ArchiveType::Zip)
        );
        assert_eq!(
            ArchiveType::detect("unknown.bin", &[0x1f, 0x8b, 0x08]),
            Some(ArchiveType::TarGz)
        );
        assert_eq!(
            ArchiveType::detect("unknown.bin", b"!<arch>\nrest"),
            Some(ArchiveType::Deb)
        );
        assert_eq!(ArchiveType::detect("unknown.bin", b"xx"), None);
    }
}
