//! Archive summarization

use flate2::read::GzDecoder;
use rebuildr_errors::{Error, Result};
use rebuildr_hash::Hash;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Read};

/// Everything the classifier needs to know about one archive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveSummary {
    pub files: BTreeSet<String>,
    pub content_hashes: BTreeMap<String, Hash>,
    /// Total CRLF sequences across all file contents.
    pub crlf_count: usize,
}

impl ArchiveSummary {
    fn add(&mut self, path: String, data: &[u8]) {
        self.crlf_count += count_crlf(data);
        self.content_hashes.insert(path.clone(), Hash::from_data(data));
        self.files.insert(path);
    }
}

fn count_crlf(data: &[u8]) -> usize {
    data.windows(2)
        .filter(|w| w[0] == b'\r' && w[1] == b'\n')
        .count()
}

/// Summarize a stabilized archive (tar.gz or zip, by magic bytes).
///
/// # Errors
///
/// Returns an error on unrecognized or corrupt containers.
pub fn summarize(data: &[u8]) -> Result<ArchiveSummary> {
    match data {
        [0x1f, 0x8b, ..] => summarize_tar_gz(data),
        [0x50, 0x4b, ..] => summarize_zip(data),
        _ => Err(Error::internal("unrecognized archive container")),
    }
}

fn summarize_tar_gz(data: &[u8]) -> Result<ArchiveSummary> {
    let mut archive = tar::Archive::new(GzDecoder::new(data));
    let mut summary = ArchiveSummary::default();
    for entry in archive
        .entries()
        .map_err(|e| Error::internal(format!("tar: {e}")))?
    {
        let mut entry = entry.map_err(|e| Error::internal(format!("tar entry: {e}")))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let path = entry
            .path()
            .map_err(|e| Error::internal(format!("tar path: {e}")))?
            .to_string_lossy()
            .into_owned();
        let mut content = Vec::new();
        entry
            .read_to_end(&mut content)
            .map_err(|e| Error::internal(format!("tar read: {e}")))?;
        summary.add(path, &content);
    }
    Ok(summary)
}

fn summarize_zip(data: &[u8]) -> Result<ArchiveSummary> {
    let mut archive = zip::ZipArchive::new(Cursor::new(data))
        .map_err(|e| Error::internal(format!("zip: {e}")))?;
    let mut summary = ArchiveSummary::default();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::internal(format!("zip entry: {e}")))?;
        if file.is_dir() {
            continue;
        }
        let path = file.name().to_string();
        let mut content = Vec::new();
        file.read_to_end(&mut content)
            .map_err(|e| Error::internal(format!("zip read: {e}")))?;
        summary.add(path, &content);
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn tgz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_mode(0o644);
            header.set_size(data.len() as u64);
            builder.append_data(&mut header, path, *data).unwrap();
        }
        let tar_bytes = builder.into_inner().unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&tar_bytes).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn counts_files_and_crlf() {
        let data = tgz(&[
            ("package/package.json", b"{}"),
            ("package/file", b"a\r\nb\r\n"),
        ]);
        let summary = summarize(&data).unwrap();
        assert_eq!(summary.files.len(), 2);
        assert_eq!(summary.crlf_count, 2);
        assert!(summary.content_hashes.contains_key("package/file"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(summarize(b"not an archive").is_err());
    }
}
