use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use quakematch::{pipeline, Config, DayFileProvider, DirTemplateProvider, TemplateProvider};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Template-matching earthquake detection")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, value_name = "FILE", default_value = "config.yaml")]
    config: PathBuf,
    /// Increase output verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Correlate templates against the configured span of continuous data.
    Match {
        /// Restrict the run to these template file names (default: all
        /// templates without an existing match file).
        templates: Vec<String>,
    },
    /// Merge match files into per-event family files.
    Families {
        /// Restrict the run to these match file names (default: all).
        detections: Vec<String>,
    },
    /// Write a commented example config.yaml into the working directory.
    InitConfig,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> quakematch::MatchResult<()> {
    if let Command::InitConfig = cli.command {
        Config::write_example(&PathBuf::from("config.yaml"))?;
        info!("new config file config.yaml was created");
        return Ok(());
    }

    let config = Config::load(&cli.config)?;

    match cli.command {
        Command::Match { templates } => {
            let provider = DirTemplateProvider::new(&config.template_dir);
            let mut all = provider.templates()?;
            if !templates.is_empty() {
                let keep: Vec<String> = templates
                    .iter()
                    .map(|t| t.rsplit('/').next().unwrap_or(t.as_str()).to_string())
                    .collect();
                all.retain(|t| keep.contains(&t.file_name()));
            }
            let segments = DayFileProvider::from_config(&config);
            let summary = pipeline::run_matching(&config, &all, &segments)?;
            report_failures(&summary.failures);
        }
        Command::Families { detections } => {
            let provider = DirTemplateProvider::new(&config.template_dir);
            let summary = pipeline::run_families(&config, &provider, &detections)?;
            report_failures(&summary.failures);
        }
        Command::InitConfig => {}
    }
    Ok(())
}

fn report_failures(failures: &[quakematch::UnitFailure]) {
    for failure in failures {
        match failure.day {
            Some(day) => error!(unit = %failure.unit, %day, "{}", failure.error),
            None => error!(unit = %failure.unit, "{}", failure.error),
        }
    }
}
