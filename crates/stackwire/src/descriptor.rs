//! typed, fully resolved declarations of resources to provision
//!
//! A descriptor is immutable once built. Every descriptor is identified by a [ResourceId] which
//! is also its node in the dependency graph.
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Job,
    Schedule,
    Storage,
    Grant,
    Stack,
}

impl ResourceKind {
    fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Job => "job",
            ResourceKind::Schedule => "schedule",
            ResourceKind::Storage => "storage",
            ResourceKind::Grant => "grant",
            ResourceKind::Stack => "stack",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "job" => ResourceKind::Job,
            "schedule" => ResourceKind::Schedule,
            "storage" => ResourceKind::Storage,
            "grant" => ResourceKind::Grant,
            "stack" => ResourceKind::Stack,
            _ => return Err(ResourceIdError::UnknownKind(s.to_owned())),
        })
    }
}

/// `kind:name`, e.g. `job:ingest` or `grant:raw-bucket/0`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    pub kind: ResourceKind,
    pub name: String,
}

impl ResourceId {
    pub fn new(kind: ResourceKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    pub fn job(name: &str) -> Self {
        Self::new(ResourceKind::Job, name)
    }

    pub fn schedule(job_name: &str) -> Self {
        Self::new(ResourceKind::Schedule, job_name)
    }

    pub fn storage(name: &str) -> Self {
        Self::new(ResourceKind::Storage, name)
    }

    pub fn grant(storage_name: &str, index: usize) -> Self {
        Self::new(ResourceKind::Grant, format!("{storage_name}/{index}"))
    }

    pub fn stack(name: &str) -> Self {
        Self::new(ResourceKind::Stack, name)
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.name)
    }
}

impl std::str::FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((kind, name)) = s.split_once(':') else {
            return Err(ResourceIdError::Malformed(s.to_owned()));
        };

        if name.is_empty() {
            return Err(ResourceIdError::Malformed(s.to_owned()));
        }

        Ok(Self::new(kind.parse()?, name))
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for ResourceId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ResourceIdError {
    #[error("Resource id `{0}` must look like `kind:name`")]
    Malformed(String),
    #[error("Unknown resource kind `{0}`")]
    UnknownKind(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDescriptor {
    pub name: String,
    /// document this job was built from
    pub source: PathBuf,
    pub role_arn: String,
    pub connections: Vec<String>,
    pub security_configuration: String,
    pub max_concurrent_runs: u32,
    pub timeout: u32,
    pub worker_count: u32,
    pub worker_type: String,
    pub runtime_version: String,
    pub script_location: String,
    pub assets: Option<AssetBundle>,
    pub default_arguments: IndexMap<String, String>,
}

impl JobDescriptor {
    pub fn id(&self) -> ResourceId {
        ResourceId::job(&self.name)
    }
}

/// Local folder uploaded next to the job script
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetBundle {
    pub source: PathBuf,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDescriptor {
    pub name: String,
    pub cron: String,
    pub job: ResourceId,
    pub start_on_creation: bool,
}

impl ScheduleDescriptor {
    pub fn id(&self) -> ResourceId {
        ResourceId::new(ResourceKind::Schedule, self.job.name.clone())
    }
}

/// Durable object storage container
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageTarget {
    pub name: String,
    pub encryption_key_arn: String,
    pub versioned: bool,
    pub block_public_access: bool,
    pub enforce_tls: bool,
    pub access_log_target: Option<String>,
    pub grants: Vec<AccessGrant>,
}

impl StorageTarget {
    pub fn id(&self) -> ResourceId {
        ResourceId::storage(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessGrant {
    pub principal: String,
    pub actions: Vec<String>,
    /// scopes relative to the storage target, e.g. `""` for the bucket and `"/*"` for its objects
    #[serde(default = "AccessGrant::default_resources")]
    pub resources: Vec<String>,
    #[serde(default)]
    pub source_account: Option<String>,
}

impl AccessGrant {
    fn default_resources() -> Vec<String> {
        vec!["".to_owned(), "/*".to_owned()]
    }
}

/// One grant of a storage target, emitted as its own resource
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantDescriptor {
    pub storage: ResourceId,
    pub index: usize,
    pub grant: AccessGrant,
}

impl GrantDescriptor {
    pub fn id(&self) -> ResourceId {
        ResourceId::grant(&self.storage.name, self.index)
    }
}

/// Any resource that takes part in one run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Descriptor {
    Job(JobDescriptor),
    Schedule(ScheduleDescriptor),
    Storage(StorageTarget),
    Grant(GrantDescriptor),
    /// A stack provisioned elsewhere which this run waits for
    ExternalStack { name: String },
}

impl Descriptor {
    pub fn id(&self) -> ResourceId {
        match self {
            Descriptor::Job(job) => job.id(),
            Descriptor::Schedule(schedule) => schedule.id(),
            Descriptor::Storage(storage) => storage.id(),
            Descriptor::Grant(grant) => grant.id(),
            Descriptor::ExternalStack { name } => ResourceId::stack(name),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn resource_id_display_and_parse() {
        let id = ResourceId::grant("raw-bucket", 2);
        assert_eq!(id.to_string(), "grant:raw-bucket/2");
        assert_eq!("grant:raw-bucket/2".parse::<ResourceId>().unwrap(), id);
        assert_eq!(
            "stack:common:orchestration".parse::<ResourceId>().unwrap(),
            ResourceId::stack("common:orchestration")
        );
    }

    #[test]
    fn resource_id_parse_errors() {
        assert_eq!(
            "nokind".parse::<ResourceId>(),
            Err(ResourceIdError::Malformed("nokind".to_owned()))
        );
        assert_eq!(
            "job:".parse::<ResourceId>(),
            Err(ResourceIdError::Malformed("job:".to_owned()))
        );
        assert_eq!(
            "lambda:x".parse::<ResourceId>(),
            Err(ResourceIdError::UnknownKind("lambda".to_owned()))
        );
    }

    #[test]
    fn grant_resources_default_to_bucket_and_objects() {
        let grant: AccessGrant =
            serde_yaml::from_str("principal: arn:aws:iam::123:root\nactions: [\"s3:GetObject\"]\n")
                .unwrap();
        assert_eq!(grant.resources, vec!["", "/*"]);
        assert_eq!(grant.source_account, None);
    }
}
