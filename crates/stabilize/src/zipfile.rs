//! zip stabilization (wheels, jars, plain zips)

use crate::canonical::canonicalize_entry;
use rebuildr_errors::{Error, Result};
use rebuildr_types::Ecosystem;
use std::io::{Cursor, Read, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

struct ZipEntry {
    name: String,
    is_dir: bool,
    mode: u32,
    data: Vec<u8>,
}

fn read_zip(data: &[u8]) -> Result<Vec<ZipEntry>> {
    let mut archive =
        ZipArchive::new(Cursor::new(data)).map_err(|e| Error::internal(format!("zip: {e}")))?;
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| Error::internal(format!("zip entry: {e}")))?;
        let name = file.name().to_string();
        let is_dir = file.is_dir();
        let mode = file.unix_mode().unwrap_or(0o644);
        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::internal(format!("zip read: {e}")))?;
        out.push(ZipEntry {
            name,
            is_dir,
            mode,
            data,
        });
    }
    Ok(out)
}

pub(crate) fn stabilize_zip(data: &[u8], ecosystem: Ecosystem) -> Result<Vec<u8>> {
    let mut entries = read_zip(data)?;

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    for entry in &mut entries {
        if let Some(replacement) = canonicalize_entry(ecosystem, &entry.name, &entry.data) {
            entry.data = replacement;
        }
    }

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in &entries {
        let mode = if entry.is_dir || entry.mode & 0o111 != 0 {
            0o755
        } else {
            0o644
        };
        // DateTime::default is the DOS epoch; every entry gets it.
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(zip::DateTime::default())
            .unix_permissions(mode);
        if entry.is_dir {
            writer
                .add_directory(&entry.name, options)
                .map_err(|e| Error::internal(format!("zip dir: {e}")))?;
        } else {
            writer
                .start_file(&entry.name, options)
                .map_err(|e| Error::internal(format!("zip file: {e}")))?;
            writer
                .write_all(&entry.data)
                .map_err(|e| Error::internal(format!("zip write: {e}")))?;
        }
    }
    let cursor = writer
        .finish()
        .map_err(|e| Error::internal(format!("zip finish: {e}")))?;
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            let options = SimpleFileOptions::default()
                .compression_method(CompressionMethod::Stored)
                .last_modified_time(
                    zip::DateTime::from_date_and_time(2023, 2, 10, 10, 0, 0).unwrap(),
                );
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn sorts_and_is_idempotent() {
        let raw = build_zip(&[
            ("six/__init__.py", b"import sys\n"),
            ("six-1.16.0.dist-info/METADATA", b"Name: six\n"),
        ]);
        let once = stabilize_zip(&raw, Ecosystem::PyPI).unwrap();
        let twice = stabilize_zip(&once, Ecosystem::PyPI).unwrap();
        assert_eq!(once, twice);

        let entries = read_zip(&once).unwrap();
        assert_eq!(entries[0].name, "six-1.16.0.dist-info/METADATA");
    }

    #[test]
    fn wheel_generator_line_is_canonicalized() {
        let a = build_zip(&[(
            "six-1.16.0.dist-info/WHEEL",
            b"Wheel-Version: 1.0\nGenerator: bdist_wheel (0.36.2)\nRoot-Is-Purelib: true\n".as_slice(),
        )]);
        let b = build_zip(&[(
            "six-1.16.0.dist-info/WHEEL",
            b"Wheel-Version: 1.0\nGenerator: bdist_wheel (0.41.0)\nRoot-Is-Purelib: true\n".as_slice(),
        )]);
        assert_eq!(
            stabilize_zip(&a, Ecosystem::PyPI).unwrap(),
            stabilize_zip(&b, Ecosystem::PyPI).unwrap()
        );
    }
}
