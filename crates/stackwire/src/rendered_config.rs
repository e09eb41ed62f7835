//! structured job configuration parsed from a rendered document
//!
//! A document is parsed according to its extension ([DocumentFormat]). Only the `jobConfig`
//! object is read; other top level keys are ignored.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Parsed job configuration together with the file it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedConfig {
    pub source: PathBuf,
    pub job_config: JobConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobConfig {
    /// Unique across all documents of one run
    pub name: String,
    pub script_location_prefix: Option<String>,
    pub script_name: Option<String>,
    pub asset_folder_location: Option<String>,
    pub job_parameters: IndexMap<String, String>,
    /// environment name -> cron expression
    ///
    /// `None` and `""` both mean "no schedule in this environment"
    pub schedule: IndexMap<String, Option<String>>,
}

impl JobConfig {
    /// Cron expression for `env_name`, if there is a non-empty one
    pub fn schedule_for(&self, env_name: &str) -> Option<&str> {
        self.schedule
            .get(env_name)
            .and_then(Option::as_deref)
            .filter(|cron| !cron.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Hcl,
}

impl DocumentFormat {
    /// Pick a format by file extension, falling back to yaml
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => DocumentFormat::Json,
            Some("hcl") => DocumentFormat::Hcl,
            _ => DocumentFormat::Yaml,
        }
    }

    fn parse(self, text: &str) -> Result<RawDocument, ParseError> {
        Ok(match self {
            DocumentFormat::Yaml => serde_yaml::from_str(text)?,
            DocumentFormat::Json => serde_json::from_str(text)?,
            DocumentFormat::Hcl => hcl::from_str(text)?,
        })
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    job_config: Option<RawJobConfig>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct RawJobConfig {
    name: Option<String>,
    script_location_prefix: Option<String>,
    script_name: Option<String>,
    asset_folder_location: Option<String>,
    #[serde(default)]
    job_parameters: IndexMap<String, String>,
    #[serde(default)]
    schedule: IndexMap<String, Option<String>>,
}

/// Parse substituted text into a [RenderedConfig]
pub(crate) fn parse(source: &Path, text: &str) -> Result<RenderedConfig, ParseFailure> {
    let format = DocumentFormat::from_path(source);
    let raw = format.parse(text).map_err(ParseFailure::Malformed)?;

    let missing = |field: &str| ParseFailure::MissingField(MissingFieldError::new(source, field));

    let raw_job = raw.job_config.ok_or_else(|| missing("jobConfig"))?;
    let name = raw_job
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| missing("jobConfig.name"))?;

    Ok(RenderedConfig {
        source: source.to_owned(),
        job_config: JobConfig {
            name,
            script_location_prefix: raw_job.script_location_prefix,
            script_name: raw_job.script_name,
            asset_folder_location: raw_job.asset_folder_location,
            job_parameters: raw_job.job_parameters,
            schedule: raw_job.schedule,
        },
    })
}

pub(crate) enum ParseFailure {
    Malformed(ParseError),
    MissingField(MissingFieldError),
}

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Hcl(#[from] hcl::Error),
}

/// A required field is absent from a document
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Missing required field `{field}` in {}", .path.display())]
pub struct MissingFieldError {
    pub path: PathBuf,
    pub field: String,
}

impl MissingFieldError {
    pub fn new(path: &Path, field: &str) -> Self {
        Self {
            path: path.to_owned(),
            field: field.to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_ok(path: &str, text: &str) -> RenderedConfig {
        match parse(Path::new(path), text) {
            Ok(config) => config,
            Err(ParseFailure::Malformed(e)) => panic!("malformed: {e}"),
            Err(ParseFailure::MissingField(e)) => panic!("{e}"),
        }
    }

    #[test]
    fn format_by_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.hcl")), DocumentFormat::Hcl);
        assert_eq!(DocumentFormat::from_path(Path::new("a.yml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("a")), DocumentFormat::Yaml);
    }

    #[test]
    fn yaml_document() {
        let config = parse_ok(
            "job.yaml",
            r#"
jobConfig:
  name: jobA
  scriptLocationPrefix: outbound
  scriptName: transformation.py
  jobParameters:
    tenant_code: UNIVERSITY
  schedule:
    dev: "cron(0 * * * ? *)"
    test: ""
    prod:
"#,
        );

        assert_eq!(config.job_config.name, "jobA");
        assert_eq!(config.job_config.job_parameters["tenant_code"], "UNIVERSITY");
        assert_eq!(config.job_config.schedule_for("dev"), Some("cron(0 * * * ? *)"));
        assert_eq!(config.job_config.schedule_for("test"), None);
        assert_eq!(config.job_config.schedule_for("prod"), None);
        assert_eq!(config.job_config.schedule_for("stage"), None);
    }

    #[test]
    fn json_document() {
        let config = parse_ok(
            "job.json",
            r#"{"jobConfig": {"name": "jobJ", "scriptName": "run.py"}}"#,
        );
        assert_eq!(config.job_config.name, "jobJ");
        assert_eq!(config.job_config.script_name.as_deref(), Some("run.py"));
        assert!(config.job_config.schedule.is_empty());
    }

    #[test]
    fn hcl_document() {
        let config = parse_ok(
            "job.hcl",
            r#"
jobConfig = {
  name = "jobH"
  scriptName = "run.py"
  schedule = {
    dev = "cron(0 1 * * ? *)"
  }
}
"#,
        );
        assert_eq!(config.job_config.name, "jobH");
        assert_eq!(config.job_config.schedule_for("dev"), Some("cron(0 1 * * ? *)"));
    }

    #[test]
    fn missing_name() {
        let Err(ParseFailure::MissingField(err)) =
            parse(Path::new("x.yaml"), "jobConfig:\n  scriptName: a.py\n")
        else {
            panic!("must fail with missing field");
        };
        assert_eq!(err, MissingFieldError::new(Path::new("x.yaml"), "jobConfig.name"));
    }

    #[test]
    fn missing_job_config() {
        let Err(ParseFailure::MissingField(err)) = parse(Path::new("x.yaml"), "other: 1\n") else {
            panic!("must fail with missing field");
        };
        assert_eq!(err.field, "jobConfig");
    }

    #[test]
    fn malformed() {
        assert!(matches!(
            parse(Path::new("x.yaml"), "jobConfig: [unclosed"),
            Err(ParseFailure::Malformed(ParseError::Yaml(_)))
        ));
    }
}
