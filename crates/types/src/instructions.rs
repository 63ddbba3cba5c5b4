//! Rendering strategies into concrete build instructions
//!
//! Rendering is a pure function of (strategy, target, environment): the
//! same inputs always produce byte-identical scripts. The three script
//! bodies have fixed contracts:
//!
//! - `source`: check out `location.ref` into the build root; fails loudly
//!   if the ref is missing; no network beyond the initial clone.
//! - `deps`: install the exact pinned toolchain and point the package
//!   manager at the time-warped registry.
//! - `build`: produce the artifact at `output_path`, relative to the
//!   build root.

use crate::strategy::{FlowStep, Location, Strategy};
use crate::target::Target;
use crate::timewarp::timewarp_url;
use chrono::{DateTime, Utc};
use rebuildr_errors::{BuildError, Result};
use std::path::PathBuf;

/// Environment facts the renderer needs.
#[derive(Debug, Clone, Default)]
pub struct BuildEnv {
    /// Host of the time-warped registry proxy, e.g. `timewarp:8081`.
    pub timewarp_host: Option<String>,
    /// Whether the builder pre-populates the repository in the build
    /// root, making the clone in `source` unnecessary.
    pub has_repo: bool,
}

/// Shell-script realization of a strategy.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Instructions {
    pub location: Location,
    pub system_deps: Vec<String>,
    pub source: String,
    pub deps: String,
    pub build: String,
    pub output_path: PathBuf,
}

/// Single-quote a string for POSIX sh.
fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Artifact path relative to the build root.
fn output_path(dir: &str, artifact: &str) -> PathBuf {
    if dir.is_empty() || dir == "." {
        PathBuf::from(artifact)
    } else {
        PathBuf::from(dir).join(artifact)
    }
}

fn render_source(loc: &Location, env: &BuildEnv) -> String {
    if env.has_repo {
        format!("git checkout --force {}", sh_quote(&loc.git_ref))
    } else {
        format!(
            "git clone {} . && git checkout --force {}",
            sh_quote(&loc.repo),
            sh_quote(&loc.git_ref)
        )
    }
}

/// The musl build of Node hosted by unofficial-builds, pinned by version.
fn node_install_line(node_version: &str) -> String {
    format!(
        "curl -fsSL {} | tar -xz --strip-components=1 -C /usr/local",
        sh_quote(&format!(
            "https://unofficial-builds.nodejs.org/download/release/v{node_version}/node-v{node_version}-linux-x64-musl.tar.gz"
        ))
    )
}

fn npm_registry_line(
    env: &BuildEnv,
    registry_time: Option<DateTime<Utc>>,
) -> Option<String> {
    let host = env.timewarp_host.as_deref()?;
    let at = registry_time?;
    Some(format!(
        "npm config set registry {}",
        sh_quote(&timewarp_url(crate::Ecosystem::Npm, at, host))
    ))
}

fn npx_npm(npm_version: &str, command: &str) -> String {
    format!("npx --package=npm@{npm_version} -c {}", sh_quote(command))
}

fn cd_line(dir: &str) -> Option<String> {
    if dir.is_empty() || dir == "." {
        None
    } else {
        Some(format!("cd {}", sh_quote(dir)))
    }
}

fn render_npm_pack(
    target: &Target,
    env: &BuildEnv,
    location: &Location,
    npm_version: &str,
    version_override: Option<&str>,
) -> Instructions {
    let mut build = Vec::new();
    build.extend(cd_line(&location.dir));
    if let Some(over) = version_override {
        build.push(npx_npm(
            npm_version,
            &format!("npm version --no-git-tag-version {over}"),
        ));
    }
    build.push(npx_npm(npm_version, "npm pack"));

    Instructions {
        location: location.clone(),
        system_deps: vec!["git".to_string(), "npm".to_string()],
        source: render_source(location, env),
        deps: String::new(),
        build: build.join("\n"),
        output_path: output_path(&location.dir, target.artifact_name()),
    }
}

#[allow(clippy::too_many_arguments)]
fn render_npm_custom(
    target: &Target,
    env: &BuildEnv,
    location: &Location,
    npm_version: &str,
    node_version: &str,
    command: Option<&str>,
    registry_time: Option<DateTime<Utc>>,
    prepack_remove_deps: bool,
    keep_root: bool,
    version_override: Option<&str>,
) -> Instructions {
    let mut deps = vec![node_install_line(node_version)];
    // The registry redirection applies to the build phase installs too,
    // so it is part of the persistent npm config rather than a flag.
    deps.extend(npm_registry_line(env, registry_time));

    let mut build = Vec::new();
    if keep_root {
        // Old npm writes the pack output into the invoking directory;
        // pack from the root and move the tarball where it is expected.
        if let Some(over) = version_override {
            build.push(npx_npm(
                npm_version,
                &format!(
                    "npm version --no-git-tag-version --prefix {} {over}",
                    sh_quote(&location.dir)
                ),
            ));
        }
        build.push(format!(
            "npm install --force --no-audit --no-fund --prefix {}",
            sh_quote(&location.dir)
        ));
        if let Some(cmd) = command {
            build.push(format!(
                "npm run {cmd} --prefix {}",
                sh_quote(&location.dir)
            ));
        }
        if prepack_remove_deps {
            build.push(format!(
                "rm -rf {}/node_modules",
                sh_quote(&location.dir)
            ));
        }
        build.push(npx_npm(npm_version, &format!("npm pack ./{}", location.dir)));
        if !(location.dir.is_empty() || location.dir == ".") {
            build.push(format!(
                "mv {} {}/",
                sh_quote(target.artifact_name()),
                sh_quote(&location.dir)
            ));
        }
    } else {
        build.extend(cd_line(&location.dir));
        if let Some(over) = version_override {
            build.push(npx_npm(
                npm_version,
                &format!("npm version --no-git-tag-version {over}"),
            ));
        }
        build.push("npm install --force --no-audit --no-fund".to_string());
        if let Some(cmd) = command {
            build.push(format!("npm run {cmd}"));
        }
        if prepack_remove_deps {
            build.push("rm -rf node_modules".to_string());
        }
        build.push(npx_npm(npm_version, "npm pack"));
    }

    Instructions {
        location: location.clone(),
        system_deps: vec!["git".to_string(), "curl".to_string()],
        source: render_source(location, env),
        deps: deps.join("\n"),
        build: build.join("\n"),
        output_path: output_path(&location.dir, target.artifact_name()),
    }
}

fn render_pypi_wheel(
    target: &Target,
    env: &BuildEnv,
    location: &Location,
    requirements: &[String],
) -> Instructions {
    let mut deps = vec!["python3 -m pip install --upgrade build".to_string()];
    if !requirements.is_empty() {
        let quoted: Vec<String> = requirements.iter().map(|r| sh_quote(r)).collect();
        deps.push(format!("python3 -m pip install {}", quoted.join(" ")));
    }

    let mut build = Vec::new();
    build.extend(cd_line(&location.dir));
    build.push("python3 -m build --wheel --no-isolation --outdir .".to_string());

    Instructions {
        location: location.clone(),
        system_deps: vec![
            "git".to_string(),
            "python3".to_string(),
            "python3-pip".to_string(),
        ],
        source: render_source(location, env),
        deps: deps.join("\n"),
        build: build.join("\n"),
        output_path: output_path(&location.dir, target.artifact_name()),
    }
}

fn render_cargo_package(
    target: &Target,
    env: &BuildEnv,
    location: &Location,
    rust_version: &str,
    pre_commands: &[String],
) -> Instructions {
    let mut deps = vec![
        format!("rustup toolchain install {rust_version} --profile minimal"),
        format!("rustup default {rust_version}"),
    ];
    deps.extend(pre_commands.iter().cloned());

    let mut build = Vec::new();
    build.extend(cd_line(&location.dir));
    build.push("cargo package --no-verify --allow-dirty".to_string());
    build.push(format!(
        "cp target/package/{} .",
        sh_quote(target.artifact_name())
    ));

    Instructions {
        location: location.clone(),
        system_deps: vec!["git".to_string(), "rustup".to_string()],
        source: render_source(location, env),
        deps: deps.join("\n"),
        build: build.join("\n"),
        output_path: output_path(&location.dir, target.artifact_name()),
    }
}

fn render_debian(target: &Target, dsc_url: &str, native: bool) -> Instructions {
    let source = format!("dget -d -u {}", sh_quote(dsc_url));
    let deps = [
        "apt-get update",
        "apt-get install -y --no-install-recommends build-essential fakeroot devscripts",
    ]
    .join("\n");
    let mut build = vec![
        "dpkg-source -x ./*.dsc pkgsrc".to_string(),
        "cd pkgsrc".to_string(),
    ];
    if native {
        build.push("dpkg-buildpackage -us -uc -b".to_string());
    } else {
        build.push("dpkg-buildpackage -us -uc -b -sa".to_string());
    }

    Instructions {
        location: Location::default(),
        system_deps: vec!["devscripts".to_string(), "dpkg-dev".to_string()],
        source,
        deps,
        build: build.join("\n"),
        output_path: PathBuf::from(target.artifact_name()),
    }
}

fn render_maven(
    target: &Target,
    env: &BuildEnv,
    location: &Location,
    jdk_version: &str,
) -> Instructions {
    let mut build = Vec::new();
    build.extend(cd_line(&location.dir));
    build.push("mvn -B -DskipTests package".to_string());
    build.push(format!("cp target/{} .", sh_quote(target.artifact_name())));

    Instructions {
        location: location.clone(),
        system_deps: vec![
            "git".to_string(),
            "maven".to_string(),
            format!("openjdk-{jdk_version}-jdk"),
        ],
        source: render_source(location, env),
        deps: String::new(),
        build: build.join("\n"),
        output_path: output_path(&location.dir, target.artifact_name()),
    }
}

fn render_go_module(target: &Target, env: &BuildEnv, location: &Location) -> Instructions {
    // Module zips carry every path under a module@version/ prefix.
    let build = format!(
        "git archive --format=zip --prefix={} -o {} {}",
        sh_quote(&format!("{}@{}/", target.package, target.version)),
        sh_quote(target.artifact_name()),
        sh_quote(&location.git_ref)
    );

    Instructions {
        location: location.clone(),
        system_deps: vec!["git".to_string()],
        source: render_source(location, env),
        deps: String::new(),
        build,
        output_path: output_path(&location.dir, target.artifact_name()),
    }
}

fn render_flow_steps(steps: &[FlowStep], location: &Location, env: &BuildEnv) -> Result<String> {
    let mut lines = Vec::new();
    for step in steps {
        if let Some(runs) = &step.runs {
            lines.push(runs.clone());
            continue;
        }
        match step.uses.as_deref() {
            Some("git-checkout") => lines.push(render_source(location, env)),
            Some("npm/install-node") => {
                let version = step.with.get("version").ok_or_else(|| {
                    BuildError::Render {
                        message: "npm/install-node step missing `version`".to_string(),
                    }
                })?;
                lines.push(node_install_line(version));
            }
            Some("npm/npx") => {
                let command = step.with.get("command").ok_or_else(|| BuildError::Render {
                    message: "npm/npx step missing `command`".to_string(),
                })?;
                let npm = step
                    .with
                    .get("npm_version")
                    .map_or("latest", String::as_str);
                if let Some(dir) = step.with.get("dir") {
                    lines.push(format!("cd {} && {}", sh_quote(dir), npx_npm(npm, command)));
                } else {
                    lines.push(npx_npm(npm, command));
                }
            }
            Some(other) => {
                return Err(BuildError::Render {
                    message: format!("unknown workflow step kind: {other}"),
                }
                .into())
            }
            None => {
                return Err(BuildError::Render {
                    message: "workflow step has neither `uses` nor `runs`".to_string(),
                }
                .into())
            }
        }
    }
    Ok(lines.join("\n"))
}

impl Strategy {
    /// Render this strategy into concrete build instructions.
    ///
    /// # Errors
    ///
    /// Returns a render error for [`Strategy::LocationHint`] (which is a
    /// pre-inference hint, not a buildable strategy) and for workflow
    /// steps the renderer does not understand.
    pub fn generate_for(&self, target: &Target, env: &BuildEnv) -> Result<Instructions> {
        match self {
            Strategy::NpmPackBuild {
                location,
                npm_version,
                version_override,
            } => Ok(render_npm_pack(
                target,
                env,
                location,
                npm_version,
                version_override.as_deref(),
            )),
            Strategy::NpmCustomBuild {
                location,
                npm_version,
                node_version,
                command,
                registry_time,
                prepack_remove_deps,
                keep_root,
                version_override,
            } => Ok(render_npm_custom(
                target,
                env,
                location,
                npm_version,
                node_version,
                command.as_deref(),
                *registry_time,
                *prepack_remove_deps,
                *keep_root,
                version_override.as_deref(),
            )),
            Strategy::PypiPureWheelBuild {
                location,
                requirements,
            } => Ok(render_pypi_wheel(target, env, location, requirements)),
            Strategy::CratesioCargoPackage {
                location,
                rust_version,
                pre_commands,
            } => Ok(render_cargo_package(
                target,
                env,
                location,
                rust_version,
                pre_commands,
            )),
            Strategy::DebianPackage { dsc_url, native } => {
                Ok(render_debian(target, dsc_url, *native))
            }
            Strategy::MavenBuild {
                location,
                jdk_version,
            } => Ok(render_maven(target, env, location, jdk_version)),
            Strategy::GoModuleBuild { location, .. } => {
                Ok(render_go_module(target, env, location))
            }
            Strategy::Workflow {
                location,
                source_steps,
                deps_steps,
                build_steps,
                output_dir,
            } => Ok(Instructions {
                location: location.clone(),
                system_deps: vec!["git".to_string(), "curl".to_string()],
                source: render_flow_steps(source_steps, location, env)?,
                deps: render_flow_steps(deps_steps, location, env)?,
                build: render_flow_steps(build_steps, location, env)?,
                output_path: output_path(output_dir, target.artifact_name()),
            }),
            Strategy::LocationHint { .. } => Err(BuildError::Render {
                message: "location hint must go through inference first".to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ecosystem;

    fn npm_target() -> Target {
        let mut t = Target::new(Ecosystem::Npm, "test-package", "1.0.0").unwrap();
        t.set_artifact("test-package-1.0.0.tgz").unwrap();
        t
    }

    fn loc() -> Location {
        Location::new("https://github.com/test/test-package", "deadbeef", ".").unwrap()
    }

    #[test]
    fn rendering_is_deterministic() {
        let strategy = Strategy::NpmCustomBuild {
            location: loc(),
            npm_version: "8.2.0".to_string(),
            node_version: "10.17.0".to_string(),
            command: Some("build".to_string()),
            registry_time: Some("2023-02-10T10:00:00Z".parse().unwrap()),
            prepack_remove_deps: true,
            keep_root: false,
            version_override: None,
        };
        let env = BuildEnv {
            timewarp_host: Some("timewarp:8081".to_string()),
            has_repo: false,
        };
        let a = strategy.generate_for(&npm_target(), &env).unwrap();
        let b = strategy.generate_for(&npm_target(), &env).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn custom_build_routes_through_timewarp() {
        let strategy = Strategy::NpmCustomBuild {
            location: loc(),
            npm_version: "8.2.0".to_string(),
            node_version: "10.17.0".to_string(),
            command: None,
            registry_time: Some("2023-02-10T10:00:00Z".parse().unwrap()),
            prepack_remove_deps: false,
            keep_root: false,
            version_override: None,
        };
        let env = BuildEnv {
            timewarp_host: Some("timewarp:8081".to_string()),
            has_repo: false,
        };
        let instructions = strategy.generate_for(&npm_target(), &env).unwrap();
        assert!(instructions
            .deps
            .contains("http://npm:2023-02-10T10:00:00Z@timewarp:8081"));
        assert!(instructions
            .deps
            .contains("node-v10.17.0-linux-x64-musl.tar.gz"));
    }

    #[test]
    fn pack_build_output_lands_in_dir() {
        let strategy = Strategy::NpmPackBuild {
            location: Location::new(
                "https://github.com/test/monorepo",
                "deadbeef",
                "packages/test-package",
            )
            .unwrap(),
            npm_version: "8.1.2".to_string(),
            version_override: None,
        };
        let instructions = strategy
            .generate_for(&npm_target(), &BuildEnv::default())
            .unwrap();
        assert_eq!(
            instructions.output_path,
            PathBuf::from("packages/test-package/test-package-1.0.0.tgz")
        );
        assert!(instructions.build.starts_with("cd 'packages/test-package'"));
    }

    #[test]
    fn version_override_patches_manifest() {
        let strategy = Strategy::NpmPackBuild {
            location: loc(),
            npm_version: "8.1.2".to_string(),
            version_override: Some("1.0.0".to_string()),
        };
        let instructions = strategy
            .generate_for(&npm_target(), &BuildEnv::default())
            .unwrap();
        assert!(instructions
            .build
            .contains("npm version --no-git-tag-version 1.0.0"));
    }

    #[test]
    fn source_reuses_existing_repo() {
        let strategy = Strategy::NpmPackBuild {
            location: loc(),
            npm_version: "8.1.2".to_string(),
            version_override: None,
        };
        let env = BuildEnv {
            timewarp_host: None,
            has_repo: true,
        };
        let instructions = strategy.generate_for(&npm_target(), &env).unwrap();
        assert_eq!(instructions.source, "git checkout --force 'deadbeef'");
    }

    #[test]
    fn workflow_steps_render() {
        let strategy = Strategy::Workflow {
            location: loc(),
            source_steps: vec![FlowStep {
                uses: Some("git-checkout".to_string()),
                ..FlowStep::default()
            }],
            deps_steps: vec![FlowStep {
                uses: Some("npm/install-node".to_string()),
                with: [("version".to_string(), "16.13.0".to_string())]
                    .into_iter()
                    .collect(),
                ..FlowStep::default()
            }],
            build_steps: vec![FlowStep {
                uses: Some("npm/npx".to_string()),
                with: [("command".to_string(), "npm pack".to_string())]
                    .into_iter()
                    .collect(),
                ..FlowStep::default()
            }],
            output_dir: ".".to_string(),
        };
        let instructions = strategy
            .generate_for(&npm_target(), &BuildEnv::default())
            .unwrap();
        assert!(instructions.source.contains("git clone"));
        assert!(instructions.deps.contains("unofficial-builds.nodejs.org"));
        assert!(instructions.build.contains("npm pack"));
    }

    #[test]
    fn location_hint_does_not_render() {
        let strategy = Strategy::LocationHint { location: loc() };
        assert!(strategy
            .generate_for(&npm_target(), &BuildEnv::default())
            .is_err());
    }
}
