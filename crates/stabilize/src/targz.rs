//! tar.gz stabilization

use crate::canonical::canonicalize_entry;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use rebuildr_errors::{Error, Result};
use rebuildr_types::Ecosystem;
use std::io::{Read, Write};
use tar::{EntryType, Header};

/// One archive member, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub mode: u32,
    pub entry_type: u8,
    pub link_name: Option<String>,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    fn is_dir(&self) -> bool {
        EntryType::new(self.entry_type).is_dir()
    }

    /// 0755 for directories and executables, 0644 otherwise.
    fn normalized_mode(&self) -> u32 {
        if self.is_dir() || self.mode & 0o111 != 0 {
            0o755
        } else {
            0o644
        }
    }
}

/// Decode every member of a gzipped tarball.
///
/// # Errors
///
/// Returns an error on a corrupt container.
pub fn read_tar_gz(data: &[u8]) -> Result<Vec<ArchiveEntry>> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    let mut out = Vec::new();
    for entry in archive
        .entries()
        .map_err(|e| Error::internal(format!("tar: {e}")))?
    {
        let mut entry = entry.map_err(|e| Error::internal(format!("tar entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| Error::internal(format!("tar path: {e}")))?
            .to_string_lossy()
            .into_owned();
        let mode = entry.header().mode().unwrap_or(0o644);
        let entry_type = entry.header().entry_type().as_byte();
        let link_name = entry
            .link_name()
            .ok()
            .flatten()
            .map(|l| l.to_string_lossy().into_owned());
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| Error::internal(format!("tar read: {e}")))?;
        out.push(ArchiveEntry {
            path,
            mode,
            entry_type,
            link_name,
            data,
        });
    }
    Ok(out)
}

/// The fixed 10-byte gzip header: deflate, no flags, zero mtime, Unix.
const GZIP_HEADER: [u8; 10] = [0x1f, 0x8b, 0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x03];

pub(crate) fn stabilize_tar_gz(data: &[u8], ecosystem: Ecosystem) -> Result<Vec<u8>> {
    let mut entries = read_tar_gz(data)?;

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    for entry in &mut entries {
        if let Some(replacement) = canonicalize_entry(ecosystem, &entry.path, &entry.data) {
            entry.data = replacement;
        }
    }

    let mut builder = tar::Builder::new(Vec::new());
    for entry in &entries {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::new(entry.entry_type));
        header.set_mode(entry.normalized_mode());
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        header.set_size(if entry.is_dir() || entry.link_name.is_some() {
            0
        } else {
            entry.data.len() as u64
        });
        if let Some(link) = &entry.link_name {
            header
                .set_link_name(link)
                .map_err(|e| Error::internal(format!("tar link: {e}")))?;
        }
        builder
            .append_data(&mut header, &entry.path, entry.data.as_slice())
            .map_err(|e| Error::internal(format!("tar write: {e}")))?;
    }
    let tar_bytes = builder
        .into_inner()
        .map_err(|e| Error::internal(format!("tar finish: {e}")))?;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&tar_bytes)
        .map_err(|e| Error::internal(format!("gzip: {e}")))?;
    let mut gz = encoder
        .finish()
        .map_err(|e| Error::internal(format!("gzip finish: {e}")))?;

    // Pin the container header so the compressor's mtime/os bytes can
    // never differ between runs.
    if gz.len() >= GZIP_HEADER.len() {
        gz[..GZIP_HEADER.len()].copy_from_slice(&GZIP_HEADER);
    }
    Ok(gz)
}
