//! translation of rendered job configurations into descriptors
use crate::descriptor::{AssetBundle, JobDescriptor, ResourceId, ScheduleDescriptor};
use crate::policy::JobPolicy;
use crate::rendered_config::{MissingFieldError, RenderedConfig};
use indexmap::IndexMap;
use std::path::PathBuf;

/// Everything a job needs that does not come from its own document
///
/// All references are resolved before building; the builder never talks to the parameter store.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub env_name: String,
    pub service_name: String,
    pub job_kind: String,
    pub role_arn: String,
    /// `s3://bucket`, see [storage_root_uri]
    pub storage_root: String,
    pub security_configuration: String,
    pub connections: Vec<String>,
    /// arguments every job receives unless its document overrides them
    pub default_arguments: IndexMap<String, String>,
    pub policy: JobPolicy,
}

/// A job and its optional schedule
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltJob {
    pub job: JobDescriptor,
    pub schedule: Option<ScheduleDescriptor>,
}

/// Build the descriptors for a single document
pub fn build(rendered: &RenderedConfig, context: &BuildContext) -> Result<BuiltJob, MissingFieldError> {
    let job_config = &rendered.job_config;
    let require = |value: &Option<String>, field: &str| {
        value
            .as_deref()
            .filter(|value| !value.trim().is_empty())
            .map(str::to_owned)
            .ok_or_else(|| MissingFieldError::new(&rendered.source, field))
    };

    let script_location_prefix = require(
        &job_config.script_location_prefix,
        "jobConfig.scriptLocationPrefix",
    )?;
    let script_name = require(&job_config.script_name, "jobConfig.scriptName")?;

    let script_folder = [
        context.storage_root.trim_end_matches('/'),
        "assets/setup",
        context.service_name.as_str(),
        context.job_kind.as_str(),
        script_location_prefix.trim_matches('/'),
    ]
    .join("/");

    let assets = job_config
        .asset_folder_location
        .as_deref()
        .filter(|location| !location.trim().is_empty())
        .map(|location| AssetBundle {
            source: rendered
                .source
                .parent()
                .map(|dir| dir.join(location))
                .unwrap_or_else(|| PathBuf::from(location)),
            destination: format!("{script_folder}/"),
        });

    let mut default_arguments = context.default_arguments.clone();
    for (key, value) in &job_config.job_parameters {
        default_arguments.insert(argument_key(key), value.clone());
    }

    let policy = &context.policy;
    let job = JobDescriptor {
        name: job_config.name.clone(),
        source: rendered.source.clone(),
        role_arn: context.role_arn.clone(),
        connections: context.connections.clone(),
        security_configuration: context.security_configuration.clone(),
        max_concurrent_runs: policy.max_concurrent_runs,
        timeout: policy.timeout,
        worker_count: policy.worker_count,
        worker_type: policy.worker_type.clone(),
        runtime_version: policy.runtime_version.clone(),
        script_location: format!("{script_folder}/{}", script_name.trim_start_matches('/')),
        assets,
        default_arguments,
    };

    let schedule = match job_config.schedule_for(&context.env_name) {
        Some(cron) => Some(ScheduleDescriptor {
            name: format!("{}-schedule", job.name),
            cron: cron.to_owned(),
            job: job.id(),
            start_on_creation: true,
        }),
        None => {
            tracing::debug!(job = %job.name, env = %context.env_name, "no schedule");
            None
        }
    };

    Ok(BuiltJob { job, schedule })
}

/// Build all documents of one run, rejecting duplicate job names
pub fn build_all(rendered: &[RenderedConfig], context: &BuildContext) -> Result<Vec<BuiltJob>, BuildError> {
    let mut seen: IndexMap<&str, &PathBuf> = IndexMap::default();
    for config in rendered {
        if let Some(first) = seen.insert(&config.job_config.name, &config.source) {
            return Err(NameCollisionError {
                name: config.job_config.name.clone(),
                first: first.clone(),
                second: config.source.clone(),
            }
            .into());
        }
    }

    rendered
        .iter()
        .map(|config| build(config, context).map_err(BuildError::from))
        .collect()
}

/// Glue style argument key: `--name`
fn argument_key(key: &str) -> String {
    if key.starts_with("--") {
        key.to_owned()
    } else {
        format!("--{key}")
    }
}

/// Normalise a storage root given as bucket arn, `s3://` uri or bare bucket name
pub fn storage_root_uri(value: &str) -> String {
    let value = value.trim().trim_end_matches('/');

    if let Some(bucket) = value.strip_prefix("arn:aws:s3:::") {
        return format!("s3://{bucket}");
    }

    if value.starts_with("s3://") {
        return value.to_owned();
    }

    format!("s3://{value}")
}

/// Two documents declare the same job name
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Job name `{name}` is declared in {} and {}", .first.display(), .second.display())]
pub struct NameCollisionError {
    pub name: String,
    pub first: PathBuf,
    pub second: PathBuf,
}

#[derive(thiserror::Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    NameCollision(#[from] NameCollisionError),
    #[error(transparent)]
    MissingField(#[from] MissingFieldError),
}
