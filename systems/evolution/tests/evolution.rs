use std::{
    collections::hash_map::DefaultHasher,
    convert::Infallible,
    hash::{Hash, Hasher},
};

use flappy_swarm_core::WorldConfig;
use flappy_swarm_system_evaluation::{Evaluation, EvaluationError};
use flappy_swarm_system_evolution::{EvolutionConfig, Genome, Population, SearchSummary};
use flappy_swarm_world::World;

fn evaluate(
    seed: u64,
    generation: u32,
    genomes: &mut [Genome],
) -> Result<(), EvaluationError<Infallible>> {
    let world = World::new(WorldConfig::default(), seed ^ u64::from(generation))
        .expect("default config is valid");
    let _ = Evaluation::new(world, genomes.iter_mut().map(Genome::parts_mut))
        .with_generation(generation)
        .with_tick_limit(600)
        .run()?;
    Ok(())
}

fn search(seed: u64) -> SearchSummary {
    let config = EvolutionConfig {
        population_size: 12,
        generations: 4,
        fitness_threshold: None,
        ..EvolutionConfig::default()
    };
    let mut population = Population::new(config, seed).expect("valid config");
    population
        .run(|generation, genomes| evaluate(seed, generation, genomes))
        .expect("perceptrons never fail")
}

#[test]
fn every_generation_is_credited_survival_time() {
    let summary = search(3);
    assert_eq!(summary.history.len(), 4);
    for (index, stats) in summary.history.iter().enumerate() {
        assert_eq!(stats.generation, index as u32 + 1);
        assert!(stats.best_fitness >= stats.mean_fitness);
        assert!(stats.best_fitness > 0.0);
    }
    let champion = summary.champion.expect("population is never empty");
    let best = summary
        .history
        .iter()
        .map(|stats| stats.best_fitness)
        .fold(f32::MIN, f32::max);
    assert_eq!(champion.fitness(), best);
}

#[test]
fn searches_replay_deterministically() {
    let fingerprint = |summary: &SearchSummary| {
        let mut hasher = DefaultHasher::new();
        for stats in &summary.history {
            stats.generation.hash(&mut hasher);
            stats.best_fitness.to_bits().hash(&mut hasher);
            stats.mean_fitness.to_bits().hash(&mut hasher);
            stats.best_genome.hash(&mut hasher);
        }
        hasher.finish()
    };
    assert_eq!(fingerprint(&search(21)), fingerprint(&search(21)));
}
