mod cli;

use serde::Serialize;
use stackwire::backend::DryRunBackend;
use stackwire::discovery::ConfigDocument;
use stackwire::engine::Engine;
use stackwire::manifest::{Manifest, DEFAULT_FILE_NAME};
use stackwire::parameter_store::FileParameterStore;
use stackwire::run::RunParameters;

fn main() {
    use clap::Parser;
    let cli = cli::Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_env("STACKWIRE_LOG"))
        .with_writer(std::io::stderr)
        .init();

    for new_path in cli.directory.iter() {
        match new_path.canonicalize() {
            Err(e) => {
                eprintln!(
                    "Failed to resolve path for -C/--directory {}\n{}",
                    new_path.display(),
                    e
                );
                std::process::exit(1);
            }
            Ok(cwd) => {
                if let Err(err) = std::env::set_current_dir(&cwd) {
                    eprintln!("Failed to set work directory to {}\n{}", cwd.display(), err,);
                    std::process::exit(1);
                }

                tracing::info!(directory=%cwd.display(), "Changed working directory");
            }
        }
    }

    let command_result = match cli.command {
        cli::Command::Discover(run_cli) => discover(run_cli),
        cli::Command::Render(render_cli) => render(render_cli),
        cli::Command::Plan(plan_cli) => plan(plan_cli),
        cli::Command::Apply(plan_cli) => apply(plan_cli),
    };

    if let Err(e) = command_result {
        for error in e.chain() {
            eprintln!("{error}")
        }
        std::process::exit(1);
    }
}

pub fn discover(cli: cli::RunArgs) -> anyhow::Result<()> {
    let engine = engine(&cli)?;
    let paths: Vec<_> = engine
        .discover()?
        .into_iter()
        .map(|path| path.display().to_string())
        .collect();

    output(&cli.output, &paths)
}

pub fn render(cli: cli::RenderCommand) -> anyhow::Result<()> {
    let engine = engine(&cli.run)?;
    let document = ConfigDocument::load(&cli.file)?;
    let rendered = stackwire::template::render(&document, engine.substitutions())?;

    output(&cli.run.output, &rendered)
}

pub fn plan(cli: cli::PlanCommand) -> anyhow::Result<()> {
    let engine = engine(&cli.run)?;
    let store = FileParameterStore::open(&cli.parameters)?;
    let plan = engine.plan(&store)?;

    output(&cli.run.output, &plan)
}

pub fn apply(cli: cli::PlanCommand) -> anyhow::Result<()> {
    let engine = engine(&cli.run)?;
    let mut store = FileParameterStore::open(&cli.parameters)?;
    let mut backend = DryRunBackend::new(cli.region.clone(), cli.run.primary_account.clone());
    let applied = engine.apply(&mut store, &mut backend)?;

    output(&cli.run.output, &applied)
}

fn engine(cli: &cli::RunArgs) -> anyhow::Result<Engine> {
    let params = RunParameters::new(
        cli.env_name.clone(),
        cli.primary_account.clone(),
        cli.secondary_account.clone(),
        cli.service_name.clone(),
    );
    let variables = cli
        .variables
        .iter()
        .map(|(key, value)| (key.as_str(), value.as_str()));
    let substitutions = params.substitutions(variables.clone())?;

    let manifest_path = cli.manifest.clone().or_else(|| {
        let default = std::path::PathBuf::from(DEFAULT_FILE_NAME);
        default.exists().then_some(default)
    });

    let mut manifest = match manifest_path {
        Some(path) => Manifest::load(&path, &substitutions)?,
        None => Manifest::default(),
    };

    if let Some(config_root) = &cli.config_root {
        manifest.config_root = config_root.clone();
    }

    Ok(Engine::with_variables(params, manifest, variables)?)
}

fn output(output: &cli::OutputArgs, value: &impl Serialize) -> anyhow::Result<()> {
    match output.format {
        cli::OutputFormat::Yaml => serde_yaml::to_writer(std::io::stdout(), value)?,
        cli::OutputFormat::Json => serde_json::to_writer_pretty(std::io::stdout(), value)?,
    };

    Ok(())
}
