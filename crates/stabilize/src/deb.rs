//! Debian package stabilization
//!
//! A `.deb` is an `ar` archive of `debian-binary`, a control tarball,
//! and a data tarball. The `ar` container is a fixed-format header
//! sequence (no crate in the dependency tree covers it), so it is
//! parsed inline: member mtimes/owners are zeroed and gzip members are
//! routed through the tar stabilizer chain.

use crate::targz;
use rebuildr_errors::{Error, Result};
use rebuildr_types::Ecosystem;

const AR_MAGIC: &[u8] = b"!<arch>\n";
const HEADER_LEN: usize = 60;

struct ArMember {
    name: String,
    data: Vec<u8>,
}

fn parse_ar(data: &[u8]) -> Result<Vec<ArMember>> {
    if !data.starts_with(AR_MAGIC) {
        return Err(Error::internal("not an ar archive"));
    }
    let mut members = Vec::new();
    let mut offset = AR_MAGIC.len();
    while offset + HEADER_LEN <= data.len() {
        let header = &data[offset..offset + HEADER_LEN];
        if header[58] != b'`' || header[59] != b'\n' {
            return Err(Error::internal("corrupt ar member header"));
        }
        let name = String::from_utf8_lossy(&header[0..16])
            .trim_end()
            .trim_end_matches('/')
            .to_string();
        let size: usize = String::from_utf8_lossy(&header[48..58])
            .trim()
            .parse()
            .map_err(|_| Error::internal("corrupt ar member size"))?;
        let start = offset + HEADER_LEN;
        let end = start + size;
        if end > data.len() {
            return Err(Error::internal("truncated ar member"));
        }
        members.push(ArMember {
            name,
            data: data[start..end].to_vec(),
        });
        // Members are 2-byte aligned.
        offset = end + (size & 1);
    }
    Ok(members)
}

fn write_ar(members: &[ArMember]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(AR_MAGIC);
    for member in members {
        let mut header = [b' '; HEADER_LEN];
        let name = format!("{:<16}", member.name);
        header[0..16].copy_from_slice(&name.as_bytes()[..16]);
        header[16..28].copy_from_slice(b"0           "); // mtime
        header[28..34].copy_from_slice(b"0     "); // uid
        header[34..40].copy_from_slice(b"0     "); // gid
        header[40..48].copy_from_slice(b"100644  "); // mode
        let size = format!("{:<10}", member.data.len());
        header[48..58].copy_from_slice(&size.as_bytes()[..10]);
        header[58] = b'`';
        header[59] = b'\n';
        out.extend_from_slice(&header);
        out.extend_from_slice(&member.data);
        if member.data.len() & 1 == 1 {
            out.push(b'\n');
        }
    }
    out
}

pub(crate) fn stabilize_deb(data: &[u8]) -> Result<Vec<u8>> {
    let mut members = parse_ar(data)?;
    for member in &mut members {
        // control.tar.gz / data.tar.gz get the full tar chain; other
        // compressions pass through byte-identical.
        if member.name.ends_with(".tar.gz") && member.data.starts_with(&[0x1f, 0x8b]) {
            member.data = targz::stabilize_tar_gz(&member.data, Ecosystem::Debian)?;
        }
    }
    Ok(write_ar(&members))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_deb() -> Vec<u8> {
        let members = vec![
            ArMember {
                name: "debian-binary".to_string(),
                data: b"2.0\n".to_vec(),
            },
            ArMember {
                name: "control.tar.gz".to_string(),
                data: vec![1, 2, 3], // not gzip; passes through
            },
        ];
        write_ar(&members)
    }

    #[test]
    fn round_trips_and_is_idempotent() {
        let deb = fixture_deb();
        let once = stabilize_deb(&deb).unwrap();
        let twice = stabilize_deb(&once).unwrap();
        assert_eq!(once, twice);

        let members = parse_ar(&once).unwrap();
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "debian-binary");
        assert_eq!(members[0].data, b"2.0\n");
    }

    #[test]
    fn rejects_non_ar_input() {
        assert!(stabilize_deb(b"PK\x03\x04").is_err());
    }
}
