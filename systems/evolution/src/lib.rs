#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Generational neuro-evolution search over perceptron controllers.
//!
//! The search never touches the environment. Callers hand every generation's
//! genomes to an evaluation of their choice, which credits fitness through
//! the genomes' sinks, and the [`Population`] breeds the next generation from
//! the credited scores.

use std::convert::Infallible;

use flappy_swarm_core::{Controller, Observation};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

/// Largest magnitude a weight or bias may reach through mutation.
pub const WEIGHT_LIMIT: f32 = 30.0;

/// Single tanh neuron mapping an observation to an action signal.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Perceptron {
    weights: [f32; Observation::INPUTS],
    bias: f32,
}

impl Perceptron {
    /// Creates a perceptron from explicit parameters.
    #[must_use]
    pub const fn new(weights: [f32; Observation::INPUTS], bias: f32) -> Self {
        Self { weights, bias }
    }

    /// Input weights in observation order.
    #[must_use]
    pub const fn weights(&self) -> [f32; Observation::INPUTS] {
        self.weights
    }

    /// Bias term.
    #[must_use]
    pub const fn bias(&self) -> f32 {
        self.bias
    }

    /// Computes `tanh(w . inputs + bias)`.
    #[must_use]
    pub fn activate(&self, observation: &Observation) -> f32 {
        let sum = self
            .weights
            .iter()
            .zip(observation.inputs())
            .fold(self.bias, |acc, (weight, input)| acc + weight * input);
        sum.tanh()
    }

    fn sample<R>(rng: &mut R, initial: &Normal<f32>) -> Self
    where
        R: Rng + ?Sized,
    {
        let mut weights = [0.0; Observation::INPUTS];
        for weight in &mut weights {
            *weight = clamp_weight(initial.sample(rng));
        }
        Self::new(weights, clamp_weight(initial.sample(rng)))
    }

    fn mutate<R>(&mut self, rng: &mut R, operators: &Operators)
    where
        R: Rng + ?Sized,
    {
        for parameter in self.weights.iter_mut().chain(std::iter::once(&mut self.bias)) {
            operators.perturb(parameter, rng);
        }
    }
}

impl Controller for Perceptron {
    type Error = Infallible;

    fn action(&mut self, observation: &Observation) -> Result<f32, Self::Error> {
        Ok(self.activate(observation))
    }
}

/// Candidate controller together with the fitness credited to it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Genome {
    id: u32,
    network: Perceptron,
    fitness: f32,
}

impl Genome {
    /// Creates a genome with zero fitness.
    #[must_use]
    pub const fn new(id: u32, network: Perceptron) -> Self {
        Self {
            id,
            network,
            fitness: 0.0,
        }
    }

    /// Identifier unique within one search.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Controller encoded by the genome.
    #[must_use]
    pub const fn network(&self) -> &Perceptron {
        &self.network
    }

    /// Fitness credited during the current generation.
    #[must_use]
    pub const fn fitness(&self) -> f32 {
        self.fitness
    }

    /// Splits the genome into the controller and fitness sink an evaluation needs.
    pub fn parts_mut(&mut self) -> (&mut Perceptron, &mut f32) {
        (&mut self.network, &mut self.fitness)
    }
}

/// Tuning for the generational search.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Genomes per generation.
    pub population_size: usize,
    /// Upper bound on generations evaluated by [`Population::run`].
    pub generations: u32,
    /// Contestants drawn per tournament.
    pub tournament_size: usize,
    /// Best genomes copied unchanged into the next generation.
    pub elitism: usize,
    /// Probability that a parameter is perturbed.
    pub mutation_rate: f64,
    /// Standard deviation of a perturbation.
    pub mutation_power: f32,
    /// Probability that a parameter is redrawn from scratch.
    pub replace_rate: f64,
    /// Standard deviation of freshly drawn parameters.
    pub initial_stdev: f32,
    /// Stops the search early once a genome reaches this fitness.
    pub fitness_threshold: Option<f32>,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            population_size: 50,
            generations: 50,
            tournament_size: 3,
            elitism: 2,
            mutation_rate: 0.8,
            mutation_power: 0.5,
            replace_rate: 0.1,
            initial_stdev: 1.0,
            fitness_threshold: Some(100.0),
        }
    }
}

/// Reasons an [`EvolutionConfig`] is rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum EvolutionConfigError {
    /// The population must hold at least one genome.
    #[error("population size must be at least 1")]
    EmptyPopulation,
    /// Tournaments need at least one contestant.
    #[error("tournament size must be at least 1")]
    EmptyTournament,
    /// More elites than genomes.
    #[error("elitism {elitism} exceeds population size {population_size}")]
    ElitismExceedsPopulation {
        /// Configured elite count.
        elitism: usize,
        /// Configured population size.
        population_size: usize,
    },
    /// A probability outside `[0, 1]`.
    #[error("{name} must lie in [0, 1], got {value}")]
    InvalidProbability {
        /// Name of the offending field.
        name: &'static str,
        /// Offending value.
        value: f64,
    },
    /// A standard deviation that is negative or not finite.
    #[error("{name} must be a finite non-negative deviation, got {value}")]
    InvalidDeviation {
        /// Name of the offending field.
        name: &'static str,
        /// Offending value.
        value: f32,
    },
}

impl EvolutionConfig {
    /// Checks the tuning before a search is built from it.
    ///
    /// # Errors
    ///
    /// Returns the first [`EvolutionConfigError`] found.
    pub fn validate(&self) -> Result<(), EvolutionConfigError> {
        if self.population_size == 0 {
            return Err(EvolutionConfigError::EmptyPopulation);
        }
        if self.tournament_size == 0 {
            return Err(EvolutionConfigError::EmptyTournament);
        }
        if self.elitism > self.population_size {
            return Err(EvolutionConfigError::ElitismExceedsPopulation {
                elitism: self.elitism,
                population_size: self.population_size,
            });
        }
        probability("mutation_rate", self.mutation_rate)?;
        probability("replace_rate", self.replace_rate)?;
        let _ = deviation("mutation_power", self.mutation_power)?;
        let _ = deviation("initial_stdev", self.initial_stdev)?;
        Ok(())
    }
}

fn probability(name: &'static str, value: f64) -> Result<(), EvolutionConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(EvolutionConfigError::InvalidProbability { name, value })
    }
}

fn deviation(name: &'static str, value: f32) -> Result<Normal<f32>, EvolutionConfigError> {
    if !value.is_finite() {
        return Err(EvolutionConfigError::InvalidDeviation { name, value });
    }
    Normal::new(0.0, value).map_err(|_| EvolutionConfigError::InvalidDeviation { name, value })
}

fn clamp_weight(value: f32) -> f32 {
    value.clamp(-WEIGHT_LIMIT, WEIGHT_LIMIT)
}

/// Mutation operators derived from a validated config.
#[derive(Clone, Copy, Debug)]
struct Operators {
    initial: Normal<f32>,
    perturbation: Normal<f32>,
    mutation_rate: f64,
    replace_rate: f64,
}

impl Operators {
    fn perturb<R>(&self, parameter: &mut f32, rng: &mut R)
    where
        R: Rng + ?Sized,
    {
        if rng.gen_bool(self.replace_rate) {
            *parameter = clamp_weight(self.initial.sample(rng));
        } else if rng.gen_bool(self.mutation_rate) {
            *parameter = clamp_weight(*parameter + self.perturbation.sample(rng));
        }
    }
}

/// Fitness statistics of one evaluated generation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// One-based generation number.
    pub generation: u32,
    /// Highest fitness in the generation.
    pub best_fitness: f32,
    /// Mean fitness across the generation.
    pub mean_fitness: f32,
    /// Genome that reached `best_fitness`.
    pub best_genome: u32,
}

/// Outcome of [`Population::run`].
#[derive(Clone, Debug, PartialEq)]
pub struct SearchSummary {
    /// Per-generation statistics in evaluation order.
    pub history: Vec<GenerationStats>,
    /// Fittest genome seen in any generation.
    pub champion: Option<Genome>,
    /// Whether the search stopped because the fitness threshold was met.
    pub reached_threshold: bool,
}

/// Generation of genomes bred by tournament selection with elitism.
#[derive(Clone, Debug)]
pub struct Population {
    config: EvolutionConfig,
    operators: Operators,
    genomes: Vec<Genome>,
    generation: u32,
    next_genome_id: u32,
    rng: ChaCha8Rng,
}

impl Population {
    /// Seeds the first generation with random perceptrons.
    ///
    /// # Errors
    ///
    /// Returns [`EvolutionConfigError`] when the tuning is invalid.
    pub fn new(config: EvolutionConfig, seed: u64) -> Result<Self, EvolutionConfigError> {
        config.validate()?;
        let operators = Operators {
            initial: deviation("initial_stdev", config.initial_stdev)?,
            perturbation: deviation("mutation_power", config.mutation_power)?,
            mutation_rate: config.mutation_rate,
            replace_rate: config.replace_rate,
        };
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let genomes: Vec<_> = (0..config.population_size)
            .map(|index| Genome::new(index as u32, Perceptron::sample(&mut rng, &operators.initial)))
            .collect();

        Ok(Self {
            next_genome_id: genomes.len() as u32,
            operators,
            genomes,
            generation: 1,
            rng,
            config,
        })
    }

    /// Tuning the search was built from.
    #[must_use]
    pub const fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    /// One-based number of the current generation.
    #[must_use]
    pub const fn generation(&self) -> u32 {
        self.generation
    }

    /// Genomes of the current generation.
    #[must_use]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    /// Mutable access for evaluations that credit fitness.
    pub fn genomes_mut(&mut self) -> &mut [Genome] {
        &mut self.genomes
    }

    /// Zeroes every genome's fitness.
    pub fn reset_fitness(&mut self) {
        for genome in &mut self.genomes {
            genome.fitness = 0.0;
        }
    }

    /// Fittest genome of the current generation.
    #[must_use]
    pub fn best(&self) -> Option<&Genome> {
        self.genomes
            .iter()
            .max_by(|a, b| a.fitness.total_cmp(&b.fitness))
    }

    /// Summarises the fitness credited to the current generation.
    #[must_use]
    pub fn stats(&self) -> GenerationStats {
        let total: f32 = self.genomes.iter().map(Genome::fitness).sum();
        let best = self.best();
        GenerationStats {
            generation: self.generation,
            best_fitness: best.map_or(0.0, Genome::fitness),
            mean_fitness: total / self.genomes.len().max(1) as f32,
            best_genome: best.map_or(0, Genome::id),
        }
    }

    /// Replaces the current generation with its offspring.
    ///
    /// The fittest `elitism` genomes survive unchanged; every other slot is
    /// filled by a mutated copy of a tournament winner. Offspring start with
    /// zero fitness and a fresh identifier.
    pub fn evolve(&mut self) {
        let mut ranked: Vec<usize> = (0..self.genomes.len()).collect();
        ranked.sort_by(|&a, &b| {
            self.genomes[b]
                .fitness
                .total_cmp(&self.genomes[a].fitness)
        });

        let mut next = Vec::with_capacity(self.genomes.len());
        for &index in ranked.iter().take(self.config.elitism) {
            let mut elite = self.genomes[index].clone();
            elite.fitness = 0.0;
            next.push(elite);
        }

        while next.len() < self.genomes.len() {
            let parent = self.tournament();
            let mut network = self.genomes[parent].network;
            network.mutate(&mut self.rng, &self.operators);
            let id = self.next_genome_id;
            self.next_genome_id = self.next_genome_id.wrapping_add(1);
            next.push(Genome::new(id, network));
        }

        self.genomes = next;
        self.generation = self.generation.saturating_add(1);
        debug!(
            generation = self.generation,
            elites = self.config.elitism,
            "bred next generation"
        );
    }

    /// Runs up to the configured number of generations.
    ///
    /// `evaluate` receives the one-based generation number and the genomes,
    /// whose fitness has just been reset. The search stops early once the
    /// best fitness reaches the configured threshold.
    ///
    /// # Errors
    ///
    /// Propagates the first error returned by `evaluate`.
    pub fn run<E, F>(&mut self, mut evaluate: F) -> Result<SearchSummary, E>
    where
        F: FnMut(u32, &mut [Genome]) -> Result<(), E>,
    {
        let mut summary = SearchSummary {
            history: Vec::new(),
            champion: None,
            reached_threshold: false,
        };

        for remaining in (0..self.config.generations).rev() {
            self.reset_fitness();
            evaluate(self.generation, &mut self.genomes)?;

            let stats = self.stats();
            info!(
                generation = stats.generation,
                best = stats.best_fitness,
                mean = stats.mean_fitness,
                genome = stats.best_genome,
                "generation evaluated"
            );
            summary.history.push(stats);

            if let Some(best) = self.best() {
                let improved = summary
                    .champion
                    .as_ref()
                    .map_or(true, |champion| best.fitness > champion.fitness);
                if improved {
                    summary.champion = Some(best.clone());
                }
            }

            if self
                .config
                .fitness_threshold
                .is_some_and(|threshold| stats.best_fitness >= threshold)
            {
                summary.reached_threshold = true;
                info!(generation = stats.generation, "fitness threshold reached");
                break;
            }
            if remaining > 0 {
                self.evolve();
            }
        }
        Ok(summary)
    }

    fn tournament(&mut self) -> usize {
        let len = self.genomes.len();
        let mut winner = self.rng.gen_range(0..len);
        for _ in 1..self.config.tournament_size {
            let contestant = self.rng.gen_range(0..len);
            if self.genomes[contestant].fitness > self.genomes[winner].fitness {
                winner = contestant;
            }
        }
        winner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perceptron_applies_tanh_to_weighted_sum() {
        let mut network = Perceptron::new([0.01, -0.02, 0.0], 0.5);
        let observation = Observation::new(100.0, 25.0, 75.0);
        let expected = (1.0_f32 - 0.5 + 0.5).tanh();
        let signal = network.activate(&observation);
        assert!((signal - expected).abs() < 1e-6);
        assert_eq!(network.action(&observation), Ok(signal));
    }

    #[test]
    fn default_config_is_valid() {
        assert_eq!(EvolutionConfig::default().validate(), Ok(()));
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = EvolutionConfig {
            population_size: 0,
            ..EvolutionConfig::default()
        };
        assert_eq!(config.validate(), Err(EvolutionConfigError::EmptyPopulation));

        config.population_size = 1;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::ElitismExceedsPopulation { elitism: 2, .. })
        ));

        config.elitism = 0;
        config.mutation_rate = 1.5;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidProbability {
                name: "mutation_rate",
                ..
            })
        ));

        config.mutation_rate = 0.5;
        config.initial_stdev = f32::NAN;
        assert!(matches!(
            config.validate(),
            Err(EvolutionConfigError::InvalidDeviation {
                name: "initial_stdev",
                ..
            })
        ));
    }

    #[test]
    fn first_generation_has_distinct_ids_and_zero_fitness() {
        let population = Population::new(EvolutionConfig::default(), 5).expect("valid config");
        assert_eq!(population.generation(), 1);
        assert_eq!(population.genomes().len(), 50);
        for (index, genome) in population.genomes().iter().enumerate() {
            assert_eq!(genome.id(), index as u32);
            assert_eq!(genome.fitness(), 0.0);
        }
    }

    #[test]
    fn elites_survive_unchanged() {
        let mut population = Population::new(EvolutionConfig::default(), 5).expect("valid config");
        for (index, genome) in population.genomes_mut().iter_mut().enumerate() {
            *genome.parts_mut().1 = index as f32;
        }
        let top = population.genomes()[49].clone();
        let runner_up = population.genomes()[48].clone();

        population.evolve();

        assert_eq!(population.generation(), 2);
        assert_eq!(population.genomes().len(), 50);
        assert_eq!(population.genomes()[0].id(), top.id());
        assert_eq!(population.genomes()[0].network(), top.network());
        assert_eq!(population.genomes()[1].id(), runner_up.id());
        assert!(population.genomes().iter().all(|genome| genome.fitness() == 0.0));
        assert!(population.genomes()[2..].iter().all(|genome| genome.id() >= 50));
    }

    #[test]
    fn mutation_respects_weight_limit() {
        let config = EvolutionConfig {
            mutation_rate: 1.0,
            mutation_power: 100.0,
            ..EvolutionConfig::default()
        };
        let mut population = Population::new(config, 9).expect("valid config");
        for _ in 0..10 {
            population.evolve();
        }
        for genome in population.genomes() {
            let network = genome.network();
            for parameter in network.weights().iter().chain(std::iter::once(&network.bias())) {
                assert!(parameter.abs() <= WEIGHT_LIMIT);
            }
        }
    }

    #[test]
    fn run_resets_fitness_and_stops_at_threshold() {
        let config = EvolutionConfig {
            population_size: 4,
            generations: 10,
            elitism: 1,
            fitness_threshold: Some(3.0),
            ..EvolutionConfig::default()
        };
        let mut population = Population::new(config, 1).expect("valid config");
        let mut seen = Vec::new();

        let summary = population
            .run(|generation, genomes| {
                assert!(genomes.iter().all(|genome| genome.fitness() == 0.0));
                seen.push(generation);
                *genomes[0].parts_mut().1 = generation as f32;
                Ok::<_, Infallible>(())
            })
            .expect("infallible");

        assert_eq!(seen, vec![1, 2, 3]);
        assert!(summary.reached_threshold);
        assert_eq!(summary.history.len(), 3);
        assert_eq!(
            summary.champion.map(|genome| genome.fitness()),
            Some(3.0)
        );
    }

    #[test]
    fn run_propagates_evaluation_errors() {
        let mut population = Population::new(EvolutionConfig::default(), 1).expect("valid config");
        let result = population.run(|generation, _| {
            if generation == 2 {
                Err("stopped")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("stopped"));
        assert_eq!(population.generation(), 2);
    }

    #[test]
    fn same_seed_breeds_same_population() {
        let breed = |seed| {
            let mut population =
                Population::new(EvolutionConfig::default(), seed).expect("valid config");
            for genome in population.genomes_mut() {
                *genome.parts_mut().1 = genome.network().bias();
            }
            population.evolve();
            population.genomes().to_vec()
        };
        assert_eq!(breed(77), breed(77));
        assert_ne!(breed(77), breed(78));
    }
}
