//! The command line interface of the program.
use crate::derive::DerivedParams;
use crate::log;
use crate::model::Model;
use crate::output::{create_output_directory, get_output_dir, write_results};
use crate::problem::solve::{solve, SolverMethod};
use crate::problem::{BuildContext, ProblemBuilder};
use crate::sampler::{read_sample_keys, read_series_set, write_sample_keys, Sampler};
use crate::settings::Settings;
use ::log::info;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::{Path, PathBuf};

/// File in the output folder recording the sampled windows of this run
const SAMPLE_KEY_FILE_NAME: &str = "sampling_key.csv";

/// File in the output folder holding the assembled program, when requested
const LP_FILE_NAME: &str = "problem.lp";

/// The command line interface of the program.
#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    /// The available commands.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options for the run command
#[derive(Args)]
pub struct RunOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Solver algorithm
    #[arg(long, value_enum, default_value_t = SolverMethod::Simplex)]
    pub solver: SolverMethod,
    /// Whether to run crossover after the barrier solver
    #[arg(long)]
    pub crossover: bool,
    /// Whether to write the assembled program in LP format
    #[arg(long)]
    pub write_lp: bool,
    /// Seed of the scenario sampler
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
    /// Replay the sampled windows recorded in this file instead of drawing
    /// them
    #[arg(long)]
    pub sampling_key: Option<PathBuf>,
}

/// The available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Build and solve a model.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Other run options
        #[command(flatten)]
        opts: RunOpts,
    },
    /// Read and cross-check a model without solving it.
    Validate {
        /// Path to the model directory.
        model_dir: PathBuf,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    pub fn execute(self) -> Result<()> {
        match self {
            Self::Run { model_dir, opts } => handle_run_command(&model_dir, &opts),
            Self::Validate { model_dir } => handle_validate_command(&model_dir),
        }
    }
}

/// Handle the `run` command.
pub fn handle_run_command(model_dir: &Path, opts: &RunOpts) -> Result<()> {
    let settings = Settings::from_path(model_dir).context("Failed to load settings.")?;

    let pathbuf: PathBuf;
    let output_dir = if let Some(p) = opts.output_dir.as_deref() {
        p
    } else {
        pathbuf = get_output_dir(model_dir)?;
        &pathbuf
    };
    create_output_directory(output_dir).with_context(|| {
        format!("Failed to create output directory: {}", output_dir.display())
    })?;

    log::init(settings.log_level.as_deref(), Some(output_dir))
        .context("Failed to initialise logging.")?;

    let model = Model::from_path(model_dir, &settings.temporal, &settings.toggles())
        .context("Failed to load model.")?;
    info!("Loaded model from {}", model_dir.display());
    info!("Output folder: {}", output_dir.display());

    let series = read_series_set(model_dir, settings.modules.heat)
        .context("Failed to read the stochastic series.")?;
    series.validate()?;

    let pinned = match &opts.sampling_key {
        Some(file_path) => read_sample_keys(file_path)
            .context("Failed to read the sampling key to replay.")?,
        None => Vec::new(),
    };
    let mut rng = StdRng::seed_from_u64(opts.seed);
    let (profiles, keys) = Sampler::new(&series, &model.temporal).sample(&mut rng, &pinned)?;
    write_sample_keys(&output_dir.join(SAMPLE_KEY_FILE_NAME), &keys)?;

    let derived = DerivedParams::build(&model, &profiles)?;
    let ctx = BuildContext {
        model: &model,
        derived: &derived,
        profiles: &profiles,
        penalties: &settings.penalties,
        flexible_industry: settings.modules.flexible_industry,
    };
    let builder = ProblemBuilder::build(&ctx)?;
    if opts.write_lp {
        builder.write_lp(&output_dir.join(LP_FILE_NAME))?;
    }

    let solution = solve(builder, opts.solver, opts.crossover)?;
    write_results(output_dir, &model, &solution)?;
    info!("Run complete, objective {:.6} MEUR", solution.objective());

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_dir: &Path) -> Result<()> {
    let settings = Settings::from_path(model_dir).context("Failed to load settings.")?;
    log::init(settings.log_level.as_deref(), None).context("Failed to initialise logging.")?;

    Model::from_path(model_dir, &settings.temporal, &settings.toggles())
        .context("Failed to validate model.")?;
    let series = read_series_set(model_dir, settings.modules.heat)
        .context("Failed to read the stochastic series.")?;
    series.validate()?;
    info!("Model validation successful!");

    Ok(())
}
