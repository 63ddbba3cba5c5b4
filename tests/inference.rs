//! End-to-end npm inference scenarios against real git fixtures

use rebuildr_infer::{rebuilder_for, RegistryEvidence};
use rebuildr_registry::{PackageMeta, RepositoryRef, VersionMeta};
use rebuildr_test_common::FixtureRepo;
use rebuildr_types::{Ecosystem, Strategy, Target};
use std::collections::BTreeMap;

fn evidence(
    git_ref: Option<&str>,
    npm_version: &str,
    node_version: Option<&str>,
    upload_time: Option<&str>,
) -> RegistryEvidence {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert("npm".to_string(), npm_version.to_string());
    if let Some(node) = node_version {
        tool_versions.insert("node".to_string(), node.to_string());
    }
    RegistryEvidence {
        package: PackageMeta {
            name: "test-package".to_string(),
            versions: vec!["1.0.0".to_string()],
            upload_times: BTreeMap::new(),
            repository: Some(RepositoryRef {
                url: "https://github.com/test/test-package".to_string(),
                directory: None,
            }),
        },
        version: VersionMeta {
            git_ref: git_ref.map(ToString::to_string),
            tool_versions,
            upload_time: upload_time.map(|t| t.parse().expect("timestamp")),
            ..VersionMeta::default()
        },
    }
}

fn target() -> Target {
    Target::new(Ecosystem::Npm, "test-package", "1.0.0").expect("target")
}

#[test]
fn registry_commit_resolves_to_pack_build() {
    let fixture = FixtureRepo::new();
    fixture.commit(
        "initial-commit",
        &[
            ("package.json", &FixtureRepo::package_json("test-package", "0.9.0", &[])),
            ("index.js", "module.exports = 1;\n"),
        ],
    );
    let version_bump = fixture.commit(
        "version-bump",
        &[("package.json", &FixtureRepo::package_json("test-package", "1.0.0", &[]))],
    );

    let handle = rebuildr_test_common::open_handle(&fixture.path);
    let strategy = rebuilder_for(Ecosystem::Npm)
        .infer(
            &target(),
            &evidence(Some(&version_bump), "8.1.2", None, None),
            Some(&handle),
            None,
        )
        .expect("inference");

    let Strategy::NpmPackBuild {
        location,
        npm_version,
        version_override,
    } = strategy
    else {
        panic!("expected pack build, got {strategy:?}");
    };
    assert_eq!(location.git_ref, version_bump);
    assert_eq!(location.dir, ".");
    assert_eq!(npm_version, "8.1.2");
    assert!(version_override.is_none());
}

#[test]
fn version_tag_resolves_without_registry_commit() {
    let fixture = FixtureRepo::new();
    fixture.commit(
        "initial-commit",
        &[("package.json", &FixtureRepo::package_json("test-package", "0.9.0", &[]))],
    );
    let tagged = fixture.commit(
        "tagged-commit",
        &[("package.json", &FixtureRepo::package_json("test-package", "1.0.0", &[]))],
    );
    fixture.tag("v1.0.0", &tagged);

    let handle = rebuildr_test_common::open_handle(&fixture.path);
    let strategy = rebuilder_for(Ecosystem::Npm)
        .infer(
            &target(),
            &evidence(None, "7.5.0", None, None),
            Some(&handle),
            None,
        )
        .expect("inference");

    let Strategy::NpmPackBuild {
        location,
        npm_version,
        ..
    } = strategy
    else {
        panic!("expected pack build, got {strategy:?}");
    };
    assert_eq!(location.git_ref, tagged);
    assert_eq!(npm_version, "7.5.0");
}

#[test]
fn build_script_shapes_custom_build() {
    let fixture = FixtureRepo::new();
    let head = fixture.commit(
        "with-build-script",
        &[(
            "package.json",
            &FixtureRepo::package_json("test-package", "1.0.0", &[("build", "tsc")]),
        )],
    );

    let handle = rebuildr_test_common::open_handle(&fixture.path);
    let strategy = rebuilder_for(Ecosystem::Npm)
        .infer(
            &target(),
            &evidence(
                Some(&head),
                "8.2.0",
                Some("16.13.0"),
                Some("2023-02-10T10:00:00Z"),
            ),
            Some(&handle),
            None,
        )
        .expect("inference");

    let Strategy::NpmCustomBuild {
        npm_version,
        node_version,
        command,
        registry_time,
        prepack_remove_deps,
        keep_root,
        ..
    } = strategy
    else {
        panic!("expected custom build, got {strategy:?}");
    };
    assert_eq!(npm_version, "8.2.0");
    assert_eq!(node_version, "10.17.0");
    assert_eq!(command.as_deref(), Some("build"));
    assert_eq!(
        registry_time,
        Some("2023-02-10T10:00:00Z".parse().expect("timestamp"))
    );
    assert!(prepack_remove_deps);
    assert!(!keep_root);
}

#[test]
fn manifest_history_finds_version_bumps() {
    let fixture = FixtureRepo::new();
    fixture.commit(
        "initial",
        &[("package.json", &FixtureRepo::package_json("test-package", "0.9.0", &[]))],
    );
    let bump = fixture.commit(
        "bump to 1.0.0",
        &[("package.json", &FixtureRepo::package_json("test-package", "1.0.0", &[]))],
    );
    fixture.commit(
        "post-release doc change",
        &[("README.md", "docs\n")],
    );

    // no registry commit, no tag: history search must find the bump
    let handle = rebuildr_test_common::open_handle(&fixture.path);
    let strategy = rebuilder_for(Ecosystem::Npm)
        .infer(
            &target(),
            &evidence(None, "8.1.2", None, None),
            Some(&handle),
            None,
        )
        .expect("inference");
    assert_eq!(
        strategy.location().expect("location").git_ref,
        bump,
        "history search should land on the bump commit"
    );
}

#[test]
fn wrong_version_everywhere_recovers_with_override() {
    let fixture = FixtureRepo::new();
    // Manifest never says 1.0.0; the tag points at a 0.9.0 manifest.
    let head = fixture.commit(
        "stale manifest",
        &[("package.json", &FixtureRepo::package_json("test-package", "0.9.0", &[]))],
    );
    fixture.tag("v1.0.0", &head);

    let handle = rebuildr_test_common::open_handle(&fixture.path);
    let strategy = rebuilder_for(Ecosystem::Npm)
        .infer(
            &target(),
            &evidence(None, "8.1.2", None, None),
            Some(&handle),
            None,
        )
        .expect("inference");

    let Strategy::NpmPackBuild {
        location,
        version_override,
        ..
    } = strategy
    else {
        panic!("expected pack build, got {strategy:?}");
    };
    assert_eq!(location.git_ref, head);
    assert_eq!(version_override.as_deref(), Some("1.0.0"));
}

#[test]
fn name_mismatch_is_no_valid_ref() {
    let fixture = FixtureRepo::new();
    let head = fixture.commit(
        "renamed package",
        &[("package.json", &FixtureRepo::package_json("other-name", "1.0.0", &[]))],
    );
    fixture.tag("v1.0.0", &head);

    let handle = rebuildr_test_common::open_handle(&fixture.path);
    let err = rebuilder_for(Ecosystem::Npm)
        .infer(
            &target(),
            &evidence(None, "8.1.2", None, None),
            Some(&handle),
            None,
        )
        .expect_err("must not resolve");
    assert_eq!(err.kind(), rebuildr_errors::ErrorKind::NoValidRef);
}
