//! provisioning manifest (`stackwire.yaml`)
//!
//! The manifest describes everything about a run that is not a job document: where the job
//! documents live, which parameter store entries feed the build context, storage targets, stack
//! dependencies and policy overrides. Its raw text goes through the same token substitution as job
//! documents before it is parsed, so values like `{env_name}` may be used anywhere.
//!
//! ```yaml
//! namespace: cdk
//! configRoot: gluejobs
//! dependsOnStacks: [common-orchestration]
//! storage:
//!   - name: "{service_name}-{env_name}-raw"
//!     encryptionKey: { component: data-services-baseline, field: kms-key-arn }
//!     grants:
//!       - principal: "arn:aws:iam::{is_account_number}:root"
//!         actions: ["s3:GetObject"]
//! ```
use crate::descriptor::AccessGrant;
use crate::discovery::DEFAULT_SUFFIX;
use crate::graph::DependencyEdge;
use crate::parameter_store::ParameterReference;
use crate::policy::JobPolicy;
use crate::template::{substitute, SubstitutionMap};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_FILE_NAME: &str = "stackwire.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    /// first segment of every parameter path
    pub namespace: String,
    /// path segment between service name and script prefix in script locations
    pub job_kind: String,
    pub config_root: PathBuf,
    pub suffix: String,
    pub parameters: ContextParameters,
    pub policy: JobPolicy,
    pub storage: Vec<StorageTargetConfig>,
    pub depends_on_stacks: Vec<String>,
    pub dependencies: Vec<DependencyEdge>,
    /// component segment used when publishing; defaults to the service name
    pub publish_component: Option<String>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            namespace: "cdk".to_owned(),
            job_kind: "glue".to_owned(),
            config_root: PathBuf::from("gluejobs"),
            suffix: DEFAULT_SUFFIX.to_owned(),
            parameters: Default::default(),
            policy: Default::default(),
            storage: vec![],
            depends_on_stacks: vec![],
            dependencies: vec![],
            publish_component: None,
        }
    }
}

impl Manifest {
    /// Read, substitute and parse a manifest file
    ///
    /// A relative `configRoot` is resolved against the manifest's directory.
    pub fn load(path: &Path, substitutions: &SubstitutionMap) -> Result<Self, ManifestError> {
        tracing::info!(path=%path.display(), "loading manifest");

        let raw = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_owned(),
            source,
        })?;

        let mut manifest = Self::parse(&raw, substitutions).map_err(|source| {
            ManifestError::Parse {
                path: path.to_owned(),
                source,
            }
        })?;

        if manifest.config_root.is_relative() {
            if let Some(dir) = path.parent() {
                manifest.config_root = dir.join(&manifest.config_root);
            }
        }

        Ok(manifest)
    }

    pub fn parse(raw: &str, substitutions: &SubstitutionMap) -> Result<Self, serde_yaml::Error> {
        let text = substitute(raw, substitutions);
        if text.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&text)
    }
}

/// Parameter store entries resolved into the build context
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct ContextParameters {
    pub role_arn: ParameterReference,
    /// bucket arn, `s3://` uri or bucket name
    pub storage_root: ParameterReference,
    pub security_configuration: ParameterReference,
    /// comma separated connection names
    pub connections: ParameterReference,
}

impl Default for ContextParameters {
    fn default() -> Self {
        const BASELINE: &str = "data-services-baseline";
        Self {
            role_arn: ParameterReference::new(BASELINE, "glue-role-arn"),
            storage_root: ParameterReference::new(BASELINE, "data-artifact-bucket-arn"),
            security_configuration: ParameterReference::new(BASELINE, "glue-security-configuration"),
            connections: ParameterReference::new(BASELINE, "glue-connection-names"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StorageTargetConfig {
    pub name: String,
    pub encryption_key: ParameterReference,
    #[serde(default = "enabled")]
    pub versioned: bool,
    #[serde(default = "enabled")]
    pub block_public_access: bool,
    #[serde(default = "enabled")]
    pub enforce_tls: bool,
    #[serde(default)]
    pub access_log_target: Option<String>,
    #[serde(default)]
    pub grants: Vec<AccessGrant>,
}

fn enabled() -> bool {
    true
}

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("Unable to read manifest {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid manifest {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::descriptor::ResourceId;
    use pretty_assertions::assert_eq;

    fn substitutions() -> SubstitutionMap {
        [
            ("env_name", "dev"),
            ("service_name", "admissions"),
            ("is_account_number", "222"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn empty_manifest_is_default() {
        assert_eq!(Manifest::parse("", &substitutions()).unwrap(), Manifest::default());
    }

    #[test]
    fn full_manifest() {
        let manifest = Manifest::parse(
            r#"
namespace: platform
configRoot: jobs
policy:
  workerCount: 2
dependsOnStacks: [common-orchestration]
dependencies:
  - from: "storage:{service_name}-{env_name}-raw"
    to: "stack:network"
storage:
  - name: "{service_name}-{env_name}-raw"
    encryptionKey: { component: data-services-baseline, field: kms-key-arn }
    versioned: false
    accessLogTarget: access-logs
    grants:
      - principal: "arn:aws:iam::{is_account_number}:root"
        actions: ["s3:GetObject", "s3:ListBucket"]
        sourceAccount: "{is_account_number}"
"#,
            &substitutions(),
        )
        .unwrap();

        assert_eq!(manifest.namespace, "platform");
        assert_eq!(manifest.job_kind, "glue");
        assert_eq!(manifest.policy.worker_count, 2);
        assert_eq!(manifest.policy.timeout, 60);
        assert_eq!(manifest.depends_on_stacks, vec!["common-orchestration"]);
        assert_eq!(
            manifest.dependencies,
            vec![DependencyEdge::new(
                ResourceId::storage("admissions-dev-raw"),
                ResourceId::stack("network")
            )]
        );

        let storage = &manifest.storage[0];
        assert_eq!(storage.name, "admissions-dev-raw");
        assert!(!storage.versioned);
        assert!(storage.block_public_access);
        assert!(storage.enforce_tls);
        assert_eq!(storage.grants[0].principal, "arn:aws:iam::222:root");
        assert_eq!(storage.grants[0].source_account.as_deref(), Some("222"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(Manifest::parse("configroot: typo\n", &substitutions()).is_err());
    }

    #[test]
    fn config_root_relative_to_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_FILE_NAME);
        std::fs::write(&path, "configRoot: jobs\n").unwrap();

        let manifest = Manifest::load(&path, &substitutions()).unwrap();
        assert_eq!(manifest.config_root, dir.path().join("jobs"));
    }
}
