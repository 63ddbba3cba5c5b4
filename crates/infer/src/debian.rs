//! Debian strategy inference
//!
//! Debian rebuilds start from the published source package rather than
//! a VCS checkout, so inference needs no repository: the `.dsc` URL
//! from the snapshot mirror is the whole strategy.

use crate::{Rebuilder, RegistryEvidence};
use rebuildr_errors::{InferError, Result};
use rebuildr_repo::RepoHandle;
use rebuildr_types::{Ecosystem, Location, Strategy, Target};

pub struct DebianRebuilder;

impl Rebuilder for DebianRebuilder {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Debian
    }

    fn infer(
        &self,
        target: &Target,
        evidence: &RegistryEvidence,
        _repo: Option<&RepoHandle>,
        _hint: Option<&Location>,
    ) -> Result<Strategy> {
        let dsc_url = evidence.version.dist_url.clone().ok_or_else(|| {
            InferError::ManifestNotFound {
                package: target.package.clone(),
            }
        })?;

        // A version without a Debian revision is a native package.
        let native = !target.version.contains('-');

        Ok(Strategy::DebianPackage { dsc_url, native })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rebuildr_registry::VersionMeta;

    #[test]
    fn native_detection_by_revision() {
        let rebuilder = DebianRebuilder;
        let evidence = RegistryEvidence {
            version: VersionMeta {
                dist_url: Some("https://snapshot.debian.org/file/abc".to_string()),
                ..VersionMeta::default()
            },
            ..RegistryEvidence::default()
        };

        let native = Target::new(Ecosystem::Debian, "dash", "0.5.12").unwrap();
        let Strategy::DebianPackage { native: n, .. } =
            rebuilder.infer(&native, &evidence, None, None).unwrap()
        else {
            panic!("expected debian strategy");
        };
        assert!(n);

        let revised = Target::new(Ecosystem::Debian, "dash", "0.5.12-2").unwrap();
        let Strategy::DebianPackage { native: n, .. } =
            rebuilder.infer(&revised, &evidence, None, None).unwrap()
        else {
            panic!("expected debian strategy");
        };
        assert!(!n);
    }
}
