//! Ecosystem-specific canonicalization of known embedded files
//!
//! Some files inside an artifact record the tool that produced them
//! rather than anything about the source. Canonicalizing them removes
//! that noise for both sides of the comparison.

use regex::Regex;
use rebuildr_types::Ecosystem;
use std::sync::OnceLock;

fn generator_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^Generator: bdist_wheel.*$").unwrap())
}

fn record_tool_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^(?P<path>[^,\n]*\.dist-info/(?:WHEEL|METADATA)),[^\n]*$").unwrap()
    })
}

/// Canonicalize one entry's content. `None` leaves the entry unchanged.
pub(crate) fn canonicalize_entry(
    ecosystem: Ecosystem,
    path: &str,
    data: &[u8],
) -> Option<Vec<u8>> {
    match ecosystem {
        Ecosystem::PyPI => canonicalize_pypi(path, data),
        // The other ecosystems' generic chains suffice today.
        _ => None,
    }
}

fn canonicalize_pypi(path: &str, data: &[u8]) -> Option<Vec<u8>> {
    let text = std::str::from_utf8(data).ok()?;
    if path.ends_with(".dist-info/WHEEL") || path == "PKG-INFO" || path.ends_with("/PKG-INFO") {
        let replaced = generator_re().replace_all(text, "Generator: bdist_wheel");
        return Some(replaced.into_owned().into_bytes());
    }
    if path.ends_with(".dist-info/RECORD") {
        // Hash and size of the canonicalized metadata files are stale
        // either way; drop them from the manifest.
        let replaced = record_tool_line_re().replace_all(text, "$path,,");
        return Some(replaced.into_owned().into_bytes());
    }
    None
}
