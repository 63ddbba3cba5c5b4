//! Stabilize-then-compare scenarios over synthesized archives

use rebuildr_compare::{classify, diff_summaries, summarize};
use rebuildr_stabilize::stabilize;
use rebuildr_test_common::npm_tarball;
use rebuildr_types::{verdict::messages, Ecosystem};

fn run_compare(upstream: &[u8], rebuild: &[u8]) -> Option<&'static str> {
    let upstream = stabilize("pkg-1.0.0.tgz", upstream, Ecosystem::Npm).expect("stabilize");
    let rebuild = stabilize("pkg-1.0.0.tgz", rebuild, Ecosystem::Npm).expect("stabilize");
    let up = summarize(&upstream).expect("summarize");
    let re = summarize(&rebuild).expect("summarize");
    let diff = diff_summaries(&up, &re);
    classify(&up, &re, &diff)
}

#[test]
fn upstream_only_dist_file() {
    let rebuild = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg"}"#),
        ("package/file", b"content"),
    ]);
    let upstream = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg"}"#),
        ("package/file", b"content"),
        ("package/dist/file", b"built"),
    ]);
    assert_eq!(run_compare(&upstream, &rebuild), Some(messages::MISSING_DIST));
}

#[test]
fn crlf_only_difference() {
    let upstream = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg"}"#),
        ("package/file", b"line one\r\nline two\r\n"),
    ]);
    let rebuild = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg"}"#),
        ("package/file", b"line one\nline two\n"),
    ]);
    assert_eq!(run_compare(&upstream, &rebuild), Some(messages::LINE_ENDINGS));
}

#[test]
fn identical_content_reproduces() {
    let entries: &[(&str, &[u8])] = &[
        ("package/package.json", br#"{"name":"pkg"}"#),
        ("package/index.js", b"module.exports = 1;\n"),
    ];
    // Different compression levels and entry order on each side.
    let upstream = npm_tarball(entries);
    let reversed: Vec<_> = entries.iter().rev().copied().collect();
    let rebuild = npm_tarball(&reversed);
    assert_eq!(run_compare(&upstream, &rebuild), None);
}

#[test]
fn stabilization_is_idempotent_end_to_end() {
    let raw = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg"}"#),
        ("package/a.js", b"a"),
        ("package/z.js", b"z"),
    ]);
    let once = stabilize("pkg-1.0.0.tgz", &raw, Ecosystem::Npm).expect("stabilize");
    let twice = stabilize("pkg-1.0.0.tgz", &once, Ecosystem::Npm).expect("stabilize");
    assert_eq!(once, twice);
}

#[test]
fn package_json_content_difference() {
    let upstream = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg","version":"1.0.0"}"#),
        ("package/file", b"same"),
    ]);
    let rebuild = npm_tarball(&[
        ("package/package.json", br#"{"name":"pkg","version":"1.0.1"}"#),
        ("package/file", b"same"),
    ]);
    assert_eq!(
        run_compare(&upstream, &rebuild),
        Some(messages::PACKAGE_JSON_DIFF)
    );
}
