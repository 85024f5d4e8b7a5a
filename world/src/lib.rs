#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared environment state for Flappy Swarm.
//!
//! The [`World`] owns everything the whole population shares during one
//! evaluation: the obstacle queue, the scrolling ground, the score counter and
//! the seeded random source that decides obstacle gap heights. Agents are not
//! stored here; the evaluation loop keeps each agent next to its controller
//! and fitness sink and asks the world to observe, collide and bound-check
//! them.

mod agent;
mod ground;
mod mask;
mod obstacle;
mod sprites;

pub use agent::{Agent, WING_CYCLE_TICKS, WING_FRAME_TICKS, WING_GLIDE_TILT};
pub use ground::Ground;
pub use mask::Mask;
pub use obstacle::Obstacle;
pub use sprites::SpriteMasks;

use flappy_swarm_core::{
    AgentId, Bound, Command, ConfigError, Event, ObstacleId, Observation, WorldConfig,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Represents the authoritative shared environment.
#[derive(Clone, Debug)]
pub struct World {
    config: WorldConfig,
    masks: SpriteMasks,
    obstacles: Vec<Obstacle>,
    ground: Ground,
    score: u32,
    rng: ChaCha8Rng,
    next_obstacle_id: u32,
}

impl World {
    /// Creates a world with its first obstacle queued at the configured position.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn new(config: WorldConfig, seed: u64) -> Result<Self, ConfigError> {
        let mut world = Self::without_obstacles(config, seed)?;
        let x = world.config.geometry.first_obstacle_x;
        apply(&mut world, Command::SpawnObstacle { x }, &mut Vec::new());
        Ok(world)
    }

    /// Creates a world with an empty obstacle queue, for scripted scenarios.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the configuration fails validation.
    pub fn without_obstacles(config: WorldConfig, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            masks: SpriteMasks::from_geometry(&config.geometry),
            ground: Ground::new(config.geometry.floor_y, config.geometry.ground_width),
            obstacles: Vec::new(),
            score: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_obstacle_id: 0,
            config,
        })
    }

    /// Configuration the world was built from.
    #[must_use]
    pub const fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Collision masks derived from the configured sprite sizes.
    #[must_use]
    pub const fn masks(&self) -> &SpriteMasks {
        &self.masks
    }

    /// Obstacles in queue order.
    #[must_use]
    pub fn obstacles(&self) -> &[Obstacle] {
        &self.obstacles
    }

    /// Scrolling ground strip.
    #[must_use]
    pub const fn ground(&self) -> &Ground {
        &self.ground
    }

    /// Obstacles cleared by the population so far.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.score
    }

    /// Creates an agent at the configured spawn position.
    #[must_use]
    pub fn spawn_agent(&self, id: AgentId) -> Agent {
        let geometry = &self.config.geometry;
        let agent = Agent::new(id, geometry.spawn_x, geometry.spawn_y);
        match geometry.spawn_impulse_height {
            Some(height) => agent.with_impulse_height(height),
            None => agent,
        }
    }

    /// Index of the obstacle observations are measured against.
    ///
    /// The second obstacle takes over once the lead agent is past the first
    /// obstacle's trailing edge. Recomputed on every call.
    #[must_use]
    pub fn lead_obstacle_index(&self, lead_agent_x: Option<f32>) -> usize {
        let width = self.config.geometry.obstacle_width;
        match (lead_agent_x, self.obstacles.as_slice()) {
            (Some(x), [first, _, ..]) if x > first.trailing_edge(width) => 1,
            _ => 0,
        }
    }

    /// Obstacle observations are measured against, if any.
    #[must_use]
    pub fn lead_obstacle(&self, lead_agent_x: Option<f32>) -> Option<&Obstacle> {
        self.obstacles.get(self.lead_obstacle_index(lead_agent_x))
    }

    /// Builds the observation handed to an agent's controller.
    ///
    /// Without a lead obstacle both gap distances are zero.
    #[must_use]
    pub fn observe(&self, agent: &Agent, lead: Option<&Obstacle>) -> Observation {
        let y = agent.y();
        match lead {
            Some(obstacle) => Observation::new(
                y,
                (y - obstacle.gap_height() as f32).abs(),
                (y - obstacle.bottom()).abs(),
            ),
            None => Observation::new(y, 0.0, 0.0),
        }
    }

    /// Pixel-exact collision test between an agent and a queued obstacle.
    #[must_use]
    pub fn collides(&self, obstacle: &Obstacle, agent: &Agent) -> bool {
        obstacle.intersects(agent, &self.masks)
    }

    /// Reports which boundary, if any, the agent has crossed.
    #[must_use]
    pub fn bound_violation(&self, agent: &Agent) -> Option<Bound> {
        let geometry = &self.config.geometry;
        if agent.y() + geometry.agent_height as f32 >= geometry.floor_y {
            Some(Bound::Floor)
        } else if agent.y() < 0.0 {
            Some(Bound::Ceiling)
        } else {
            None
        }
    }

    fn allocate_obstacle_id(&mut self) -> ObstacleId {
        let id = ObstacleId::new(self.next_obstacle_id);
        self.next_obstacle_id = self.next_obstacle_id.wrapping_add(1);
        id
    }

    fn push_obstacle(&mut self, obstacle: Obstacle, out_events: &mut Vec<Event>) {
        debug!(
            obstacle = obstacle.id().get(),
            x = obstacle.x(),
            gap_height = obstacle.gap_height(),
            "queued obstacle"
        );
        out_events.push(Event::ObstacleSpawned {
            obstacle: obstacle.id(),
            x: obstacle.x(),
            gap_height: obstacle.gap_height(),
        });
        self.obstacles.push(obstacle);
    }
}

/// Applies the provided command to the world, mutating state deterministically.
pub fn apply(world: &mut World, command: Command, out_events: &mut Vec<Event>) {
    match command {
        Command::SpawnObstacle { x } => {
            let id = world.allocate_obstacle_id();
            let obstacle = Obstacle::spawn(id, x, &world.config, &mut world.rng);
            world.push_obstacle(obstacle, out_events);
        }
        Command::PlaceObstacle { x, gap_height } => {
            let id = world.allocate_obstacle_id();
            let obstacle = Obstacle::with_gap_height(id, x, gap_height, &world.config);
            world.push_obstacle(obstacle, out_events);
        }
        Command::AdvanceGround => {
            world.ground.step(world.config.obstacles.scroll_velocity);
        }
        Command::AdvanceObstacles => {
            let velocity = world.config.obstacles.scroll_velocity;
            for obstacle in &mut world.obstacles {
                obstacle.step(velocity);
            }
        }
        Command::RegisterPass { obstacle, agent_x } => {
            let passed = world
                .obstacles
                .iter_mut()
                .find(|candidate| candidate.id() == obstacle)
                .is_some_and(|candidate| candidate.register_pass(agent_x));
            if passed {
                out_events.push(Event::ObstaclePassed { obstacle });
            }
        }
        Command::AwardPass => {
            world.score = world.score.saturating_add(1);
            out_events.push(Event::ScoreAwarded { score: world.score });
            let x = world.config.geometry.obstacle_spawn_x;
            apply(world, Command::SpawnObstacle { x }, out_events);
        }
        Command::RetireOffscreen => {
            let width = world.config.geometry.obstacle_width;
            world.obstacles.retain(|obstacle| {
                if obstacle.is_offscreen(width) {
                    debug!(obstacle = obstacle.id().get(), "retiring offscreen obstacle");
                    out_events.push(Event::ObstacleRetired {
                        obstacle: obstacle.id(),
                    });
                    false
                } else {
                    true
                }
            });
        }
    }
}

/// Query functions that provide read-only snapshots of the world state.
pub mod query {
    use flappy_swarm_core::{GroundSnapshot, ObstacleSnapshot};

    use super::World;

    /// Captures snapshots of every queued obstacle in queue order.
    #[must_use]
    pub fn obstacle_snapshots(world: &World) -> Vec<ObstacleSnapshot> {
        world
            .obstacles
            .iter()
            .map(|obstacle| obstacle.snapshot())
            .collect()
    }

    /// Captures the ground strip offsets.
    #[must_use]
    pub fn ground_snapshot(world: &World) -> GroundSnapshot {
        world.ground.snapshot()
    }
}
