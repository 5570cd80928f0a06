use clap::{Parser, Subcommand};
use meshloc::api::{write_scenario, Localizer, SessionReport};
use meshloc::utils::{init_logging, DeploymentConfig, JsonConfig, LocalizationConfig};
use meshloc::{DeploymentGenerator, LocalizationError, ScenarioParser, SchedulingPolicy};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "meshloc")]
#[command(about = "Localization of multi-hop sensor networks from range measurements")]
struct Cli {
    /// Log level, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a random deployment and write its scenario description
    Generate {
        /// Deployment parameters (JSON), defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Scenario file to write, stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Localize the nodes of a scenario and report the outcome
    Localize {
        /// Scenario description to read
        #[arg(long)]
        scenario: PathBuf,

        /// Localization parameters (JSON), defaults when omitted
        #[arg(long)]
        config: Option<PathBuf>,

        /// Override the configured scheduling policy
        #[arg(long, value_parser = parse_policy)]
        policy: Option<SchedulingPolicy>,

        /// Write the annotated scenario here
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the report as JSON on stdout instead of text on stderr
        #[arg(long)]
        json: bool,
    },
}

fn parse_policy(value: &str) -> Result<SchedulingPolicy, String> {
    match value {
        "closest-true-move" => Ok(SchedulingPolicy::ClosestTrueMove),
        "largest-gain" => Ok(SchedulingPolicy::LargestGain),
        "synchronous-rounds" => Ok(SchedulingPolicy::SynchronousRounds),
        other => Err(format!(
            "unknown policy '{other}' (closest-true-move, largest-gain, synchronous-rounds)"
        )),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let result = match cli.command {
        Commands::Generate {
            config,
            seed,
            output,
        } => generate(config.as_deref(), seed, output.as_deref()),
        Commands::Localize {
            scenario,
            config,
            policy,
            output,
            json,
        } => localize(&scenario, config.as_deref(), policy, output.as_deref(), json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "session aborted");
            ExitCode::FAILURE
        }
    }
}

fn generate(
    config: Option<&Path>,
    seed: Option<u64>,
    output: Option<&Path>,
) -> Result<(), LocalizationError> {
    let mut deployment = match config {
        Some(path) => DeploymentConfig::load_from_file(path)?,
        None => DeploymentConfig::default(),
    };
    if let Some(seed) = seed {
        deployment.seed = seed;
    }

    let network = DeploymentGenerator::new(deployment)?.generate()?;
    write_output(output, |out| write_scenario(out, &network, None))
}

fn localize(
    scenario: &Path,
    config: Option<&Path>,
    policy: Option<SchedulingPolicy>,
    output: Option<&Path>,
    json: bool,
) -> Result<(), LocalizationError> {
    let mut settings = match config {
        Some(path) => LocalizationConfig::load_from_file(path)?,
        None => LocalizationConfig::default(),
    };
    if let Some(policy) = policy {
        settings.policy = policy;
    }

    let network = ScenarioParser::new().parse_file(scenario)?;
    info!(
        scenario = %scenario.display(),
        nodes = network.len(),
        anchors = network.anchor_count(),
        "loaded scenario"
    );

    let outcome = Localizer::with_config(settings)?.localize(&network)?;
    let report = SessionReport::new(&network, &outcome);

    if let Some(path) = output {
        write_output(Some(path), |out| {
            write_scenario(out, &network, Some(&outcome.analysis))
        })?;
    }

    if json {
        println!("{}", report.to_json()?);
    } else {
        eprintln!("{report}");
    }
    Ok(())
}

/// Run `write` against the file at `path`, or stdout
fn write_output<F>(path: Option<&Path>, write: F) -> Result<(), LocalizationError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    match path {
        Some(path) => {
            let output_error = |source| LocalizationError::Output {
                path: path.to_path_buf(),
                source,
            };
            let file = File::create(path).map_err(output_error)?;
            let mut out = BufWriter::new(file);
            write(&mut out).map_err(output_error)?;
            out.flush().map_err(output_error)
        }
        None => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            write(&mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}
