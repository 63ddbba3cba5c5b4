#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Comparison and diagnosis
//!
//! Summarizes two stabilized archives, diffs them, and classifies the
//! first observable discrepancy into the closed verdict set. The
//! classification priority order is normative; tests depend on it.

mod summary;

pub use summary::{summarize, ArchiveSummary};

use rebuildr_types::verdict::messages;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Set and content differences between two summaries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryDiff {
    pub upstream_only: Vec<String>,
    pub rebuild_only: Vec<String>,
    /// Paths present in both with differing content.
    pub diff: Vec<String>,
}

impl SummaryDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.upstream_only.is_empty() && self.rebuild_only.is_empty() && self.diff.is_empty()
    }
}

/// Diff two stabilized-archive summaries.
#[must_use]
pub fn diff_summaries(upstream: &ArchiveSummary, rebuild: &ArchiveSummary) -> SummaryDiff {
    let upstream_files: BTreeSet<_> = upstream.files.iter().collect();
    let rebuild_files: BTreeSet<_> = rebuild.files.iter().collect();

    let upstream_only = upstream_files
        .difference(&rebuild_files)
        .map(|s| (*s).clone())
        .collect();
    let rebuild_only = rebuild_files
        .difference(&upstream_files)
        .map(|s| (*s).clone())
        .collect();
    let diff = upstream_files
        .intersection(&rebuild_files)
        .filter(|path| upstream.content_hashes.get(**path) != rebuild.content_hashes.get(**path))
        .map(|s| (*s).clone())
        .collect();

    SummaryDiff {
        upstream_only,
        rebuild_only,
        diff,
    }
}

/// Classify a comparison into a verdict message; `None` is success.
///
/// Priority order:
/// 1. upstream-only files under `package/dist/`
/// 2. upstream-only `.DS_STORE`
/// 3. more CRLF line endings upstream than in the rebuild
/// 4. files missing on both sides
/// 5. upstream-only files (hidden-only gets its own message)
/// 6. rebuild-only files
/// 7. `package/package.json` content difference
/// 8. any other content difference
#[must_use]
pub fn classify(
    upstream: &ArchiveSummary,
    rebuild: &ArchiveSummary,
    diff: &SummaryDiff,
) -> Option<&'static str> {
    if diff
        .upstream_only
        .iter()
        .any(|p| p.starts_with("package/dist/"))
    {
        return Some(messages::MISSING_DIST);
    }
    if diff
        .upstream_only
        .iter()
        .any(|p| p.ends_with("/.DS_STORE"))
    {
        return Some(messages::DS_STORE);
    }
    if upstream.crlf_count > rebuild.crlf_count {
        return Some(messages::LINE_ENDINGS);
    }
    if !diff.upstream_only.is_empty() && !diff.rebuild_only.is_empty() {
        return Some(messages::MISMATCHED_FILES);
    }
    if !diff.upstream_only.is_empty() {
        if diff
            .upstream_only
            .iter()
            .all(|p| p.starts_with("package/."))
        {
            return Some(messages::HIDDEN_UPSTREAM_ONLY);
        }
        return Some(messages::UPSTREAM_ONLY);
    }
    if !diff.rebuild_only.is_empty() {
        return Some(messages::REBUILD_ONLY);
    }
    if diff.diff.iter().any(|p| p == "package/package.json") {
        return Some(messages::PACKAGE_JSON_DIFF);
    }
    if !diff.diff.is_empty() {
        return Some(messages::CONTENT_DIFF);
    }
    None
}

/// Render a terse unified-style listing of the differences, persisted
/// as the diff asset.
#[must_use]
pub fn render_diff(diff: &SummaryDiff) -> String {
    let mut out = String::new();
    for path in &diff.upstream_only {
        out.push_str("-- upstream only: ");
        out.push_str(path);
        out.push('\n');
    }
    for path in &diff.rebuild_only {
        out.push_str("++ rebuild only: ");
        out.push_str(path);
        out.push('\n');
    }
    for path in &diff.diff {
        out.push_str("!= content: ");
        out.push_str(path);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebuildr_hash::Hash;

    fn summary(files: &[(&str, &[u8])], crlf: usize) -> ArchiveSummary {
        let mut s = ArchiveSummary::default();
        for (path, data) in files {
            s.files.insert((*path).to_string());
            s.content_hashes
                .insert((*path).to_string(), Hash::from_data(data));
        }
        s.crlf_count = crlf;
        s
    }

    #[test]
    fn missing_dist_outranks_everything() {
        let upstream = summary(
            &[
                ("package/package.json", b"{}"),
                ("package/file", b"a"),
                ("package/dist/file", b"built"),
            ],
            3,
        );
        let rebuild = summary(
            &[("package/package.json", b"{}"), ("package/file", b"b")],
            0,
        );
        let diff = diff_summaries(&upstream, &rebuild);
        assert_eq!(
            classify(&upstream, &rebuild, &diff),
            Some(rebuildr_types::verdict::messages::MISSING_DIST)
        );
    }

    #[test]
    fn crlf_excess_upstream() {
        let upstream = summary(
            &[("package/package.json", b"{}"), ("package/file", b"a\r\n")],
            1,
        );
        let rebuild = summary(
            &[("package/package.json", b"{}"), ("package/file", b"a\n")],
            0,
        );
        let diff = diff_summaries(&upstream, &rebuild);
        assert_eq!(
            classify(&upstream, &rebuild, &diff),
            Some(rebuildr_types::verdict::messages::LINE_ENDINGS)
        );
    }

    #[test]
    fn hidden_upstream_only_files() {
        let upstream = summary(
            &[
                ("package/package.json", b"{}"),
                ("package/.npmignore", b"x"),
            ],
            0,
        );
        let rebuild = summary(&[("package/package.json", b"{}")], 0);
        let diff = diff_summaries(&upstream, &rebuild);
        assert_eq!(
            classify(&upstream, &rebuild, &diff),
            Some(rebuildr_types::verdict::messages::HIDDEN_UPSTREAM_ONLY)
        );
    }

    #[test]
    fn package_json_diff_outranks_content_diff() {
        let upstream = summary(
            &[
                ("package/package.json", b"{\"a\":1}"),
                ("package/file", b"same"),
            ],
            0,
        );
        let rebuild = summary(
            &[
                ("package/package.json", b"{\"a\":2}"),
                ("package/file", b"same"),
            ],
            0,
        );
        let diff = diff_summaries(&upstream, &rebuild);
        assert_eq!(
            classify(&upstream, &rebuild, &diff),
            Some(rebuildr_types::verdict::messages::PACKAGE_JSON_DIFF)
        );
    }

    #[test]
    fn mismatched_both_sides() {
        let upstream = summary(&[("package/a", b"1")], 0);
        let rebuild = summary(&[("package/b", b"2")], 0);
        let diff = diff_summaries(&upstream, &rebuild);
        assert_eq!(
            classify(&upstream, &rebuild, &diff),
            Some(rebuildr_types::verdict::messages::MISMATCHED_FILES)
        );
    }

    #[test]
    fn identical_summaries_succeed() {
        let upstream = summary(&[("package/a", b"1")], 0);
        let rebuild = summary(&[("package/a", b"1")], 0);
        let diff = diff_summaries(&upstream, &rebuild);
        assert!(diff.is_empty());
        assert_eq!(classify(&upstream, &rebuild, &diff), None);
    }
}
