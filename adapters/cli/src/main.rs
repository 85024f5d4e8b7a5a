#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that evolves Flappy Swarm controllers.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use flappy_swarm_core::WorldConfig;
use flappy_swarm_rendering::{ScenePresenter, TextBackend};
use flappy_swarm_system_evaluation::{Evaluation, EvaluationSummary};
use flappy_swarm_system_evolution::{EvolutionConfig, Genome, Population};
use flappy_swarm_world::World;
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

const WATCH_COLUMNS: usize = 54;
const WATCH_ROWS: usize = 40;

/// Evolves perceptron controllers against a shared obstacle stream.
#[derive(Debug, Parser)]
#[command(name = "flappy-swarm", version)]
struct Args {
    /// TOML file with `[world]` and `[evolution]` tables.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Seed for the obstacle stream and the search.
    #[arg(long, default_value_t = 0)]
    seed: u64,
    /// Maximum number of generations.
    #[arg(long)]
    generations: Option<u32>,
    /// Genomes per generation.
    #[arg(long)]
    population: Option<usize>,
    /// Ends each evaluation after this many ticks.
    #[arg(long)]
    max_ticks: Option<u64>,
    /// Draws every N-th tick to the terminal.
    #[arg(long, value_name = "TICKS")]
    watch: Option<u64>,
    /// Stops once a genome reaches this fitness.
    #[arg(long)]
    fitness_threshold: Option<f32>,
    /// Writes the fittest genome to this JSON file.
    #[arg(long, value_name = "PATH")]
    save_best: Option<PathBuf>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(generations) = self.generations {
            settings.evolution.generations = generations;
        }
        if let Some(population) = self.population {
            settings.evolution.population_size = population;
        }
        if self.fitness_threshold.is_some() {
            settings.evolution.fitness_threshold = self.fitness_threshold;
        }
    }
}

#[derive(Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
struct Settings {
    world: WorldConfig,
    evolution: EvolutionConfig,
}

fn parse_settings(text: &str) -> Result<Settings> {
    toml::from_str(text).context("malformed configuration")
}

fn load_settings(path: Option<&Path>) -> Result<Settings> {
    let Some(path) = path else {
        return Ok(Settings::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_settings(&text).with_context(|| format!("failed to load {}", path.display()))
}

/// Runs one generation's shared evaluation.
fn evaluate_generation(
    config: &WorldConfig,
    args: &Args,
    generation: u32,
    genomes: &mut [Genome],
) -> Result<EvaluationSummary> {
    let world = World::new(config.clone(), args.seed ^ u64::from(generation))?;
    let mut evaluation = Evaluation::new(world, genomes.iter_mut().map(Genome::parts_mut))
        .with_generation(generation);
    if let Some(limit) = args.max_ticks {
        evaluation = evaluation.with_tick_limit(limit);
    }

    let summary = match args.watch {
        Some(every) => {
            let backend = TextBackend::new(io::stdout().lock(), WATCH_COLUMNS, WATCH_ROWS);
            let mut presenter = ScenePresenter::new(backend, config.geometry.clone(), every);
            let summary = evaluation.run_presenting(&mut presenter)?;
            let _ = presenter.finish().context("failed to draw frame")?;
            summary
        }
        None => evaluation.run()?,
    };
    Ok(summary)
}

fn save_genome(path: &Path, genome: &Genome) -> Result<()> {
    let json = serde_json::to_string_pretty(genome).context("failed to encode genome")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))
}

/// Entry point for the Flappy Swarm command-line interface.
fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    args.apply(&mut settings);
    settings
        .world
        .validate()
        .context("invalid world configuration")?;

    let mut population = Population::new(settings.evolution.clone(), args.seed)
        .context("invalid evolution configuration")?;
    let summary = population.run(|generation, genomes| {
        let outcome = evaluate_generation(&settings.world, &args, generation, genomes)?;
        info!(
            generation,
            ticks = outcome.ticks,
            score = outcome.score,
            reason = ?outcome.termination,
            "generation finished"
        );
        Ok::<_, anyhow::Error>(())
    })?;

    let generations = summary.history.len();
    match &summary.champion {
        Some(champion) => info!(
            generations,
            fitness = champion.fitness(),
            genome = champion.id(),
            reached_threshold = summary.reached_threshold,
            "search finished"
        ),
        None => info!(generations, "search finished without a champion"),
    }

    if let (Some(path), Some(champion)) = (&args.save_best, &summary.champion) {
        save_genome(path, champion)?;
        info!(path = %path.display(), "saved fittest genome");
    }
    Ok(())
}
