//! stackwire cli interface

use clap::{Parser, Subcommand, ValueEnum};
use std::fmt::Formatter;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; stackwire ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List job documents below the config root
    Discover(RunArgs),

    /// Render a single job document
    Render(RenderCommand),

    /// Build and order all descriptors without provisioning
    Plan(PlanCommand),

    /// Provision with the dry-run backend and publish identifiers
    Apply(PlanCommand),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Environment name
    #[clap(short = 'e', long = "env", env = "STACKWIRE_ENV")]
    pub env_name: String,

    /// Account holding the data services
    #[clap(long = "primary-account", env = "STACKWIRE_PRIMARY_ACCOUNT")]
    pub primary_account: String,

    /// Account holding the integration services
    #[clap(long = "secondary-account", env = "STACKWIRE_SECONDARY_ACCOUNT")]
    pub secondary_account: String,

    /// Service name
    #[clap(short = 's', long = "service", env = "STACKWIRE_SERVICE")]
    pub service_name: String,

    /// Manifest file
    ///
    /// Defaults to stackwire.yaml in the work directory when it exists.
    #[clap(short = 'm', long = "manifest")]
    pub manifest: Option<PathBuf>,

    /// Override the config root of the manifest
    #[clap(short = 'd', long = "config-root")]
    pub config_root: Option<PathBuf>,

    /// Additional substitution token (key=value)
    #[clap(long = "var", value_parser = parse_variable)]
    pub variables: Vec<(String, String)>,

    #[clap(flatten)]
    pub output: OutputArgs,
}

#[derive(Parser, Debug)]
pub struct RenderCommand {
    #[clap(flatten)]
    pub run: RunArgs,

    /// Job document to render
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct PlanCommand {
    #[clap(flatten)]
    pub run: RunArgs,

    /// Parameter store file (yaml map of path to value)
    #[clap(short = 'p', long = "parameters", default_value = "parameters.yaml")]
    pub parameters: PathBuf,

    /// Region used for dry-run identifiers
    #[clap(long = "region", env = "STACKWIRE_REGION", default_value = "us-east-1")]
    pub region: String,
}

#[derive(Parser, Debug)]
pub struct OutputArgs {
    #[arg(short = 'F', long = "output-format", default_value_t)]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    Json,
    #[default]
    Yaml,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Yaml => f.write_str("yaml"),
        }
    }
}

fn parse_variable(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_owned(), value.to_owned()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))
}
