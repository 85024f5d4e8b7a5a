#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Flappy Swarm engine.
//!
//! This crate defines the surface that connects the shared environment, the
//! evaluation loop, and its external collaborators. Controllers receive an
//! [`Observation`] per tick and answer with an activation signal, fitness
//! sinks accumulate rewards and penalties as the loop reports them, and
//! presentation sinks receive a read-only [`Frame`] after every tick. The loop
//! also records [`Event`] values describing what happened during a tick so
//! adapters can react without inspecting simulation internals.

mod config;

use std::{convert::Infallible, fmt};

use serde::{Deserialize, Serialize};

pub use config::{ConfigError, Geometry, Kinematics, ObstacleTuning, RewardSchedule, WorldConfig};

/// Unique identifier assigned to an agent for the duration of one evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(u32);

impl AgentId {
    /// Creates a new agent identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "agent#{}", self.0)
    }
}

/// Unique identifier assigned to an obstacle by the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObstacleId(u32);

impl ObstacleId {
    /// Creates a new obstacle identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

/// What a controller sees about its agent and the lead obstacle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Vertical position of the agent.
    pub vertical_position: f32,
    /// Absolute vertical distance to the bottom edge of the upper region.
    pub distance_to_gap_top: f32,
    /// Absolute vertical distance to the top edge of the lower region.
    pub distance_to_gap_bottom: f32,
}

impl Observation {
    /// Number of scalar inputs carried by an observation.
    pub const INPUTS: usize = 3;

    /// Creates a new observation from its three components.
    #[must_use]
    pub const fn new(
        vertical_position: f32,
        distance_to_gap_top: f32,
        distance_to_gap_bottom: f32,
    ) -> Self {
        Self {
            vertical_position,
            distance_to_gap_top,
            distance_to_gap_bottom,
        }
    }

    /// Flattens the observation into network input order.
    #[must_use]
    pub const fn inputs(&self) -> [f32; Self::INPUTS] {
        [
            self.vertical_position,
            self.distance_to_gap_top,
            self.distance_to_gap_bottom,
        ]
    }
}

/// Decision-making collaborator queried once per tick for each live agent.
///
/// The environment never inspects a controller beyond this call. Errors are
/// not masked: the evaluation loop aborts the tick and hands them back to its
/// caller.
pub trait Controller {
    /// Failure reported by the controller.
    type Error;

    /// Maps an observation to an activation signal.
    ///
    /// # Errors
    ///
    /// Implementations return an error when no action can be produced.
    fn action(&mut self, observation: &Observation) -> Result<f32, Self::Error>;
}

impl<F> Controller for F
where
    F: FnMut(&Observation) -> f32,
{
    type Error = Infallible;

    fn action(&mut self, observation: &Observation) -> Result<f32, Self::Error> {
        Ok(self(observation))
    }
}

/// Per-agent accumulator the evaluation loop credits and debits.
pub trait FitnessSink {
    /// Adds `amount` to the accumulated fitness; negative values debit it.
    fn credit(&mut self, amount: f32);
}

impl FitnessSink for f32 {
    fn credit(&mut self, amount: f32) {
        *self += amount;
    }
}

impl FitnessSink for f64 {
    fn credit(&mut self, amount: f32) {
        *self += f64::from(amount);
    }
}

/// Collaborator that receives the post-tick state for display.
pub trait PresentationSink {
    /// Receives the frame produced by the most recent tick.
    fn present(&mut self, frame: &Frame);
}

impl<F> PresentationSink for F
where
    F: FnMut(&Frame),
{
    fn present(&mut self, frame: &Frame) {
        self(frame);
    }
}

/// World boundary an agent crossed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bound {
    /// The agent's lower edge reached the floor line.
    Floor,
    /// The agent rose above the top of the world.
    Ceiling,
}

/// Reason an evaluation reached its terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Termination {
    /// Every agent failed.
    Extinct,
    /// An external stop request was honoured.
    StopRequested,
    /// The configured tick budget was exhausted.
    TickLimit,
}

/// Commands that mutate the shared world.
///
/// The world only changes through these commands; systems read it through
/// queries and answer with commands of their own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Command {
    /// Queues an obstacle whose gap height is drawn from the seeded source.
    SpawnObstacle {
        /// Horizontal position of the leading edge.
        x: f32,
    },
    /// Queues an obstacle with a fixed gap height.
    PlaceObstacle {
        /// Horizontal position of the leading edge.
        x: f32,
        /// Bottom edge of the upper region.
        gap_height: i32,
    },
    /// Scrolls the ground strip by one tick.
    AdvanceGround,
    /// Scrolls every queued obstacle by one tick.
    AdvanceObstacles,
    /// Offers an agent's horizontal position to an obstacle's one-shot pass check.
    RegisterPass {
        /// Obstacle being checked.
        obstacle: ObstacleId,
        /// Horizontal position of the agent.
        agent_x: f32,
    },
    /// Counts a cleared obstacle and queues a replacement at the spawn edge.
    AwardPass,
    /// Drops every obstacle whose trailing edge left the world.
    RetireOffscreen,
}

/// Events broadcast by the world and the evaluation loop.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// Announces that a new obstacle entered the queue.
    ObstacleSpawned {
        /// Identifier assigned to the obstacle.
        obstacle: ObstacleId,
        /// Horizontal position at creation.
        x: f32,
        /// Gap height sampled at creation.
        gap_height: i32,
    },
    /// Announces that an agent moved ahead of an obstacle for the first time.
    ObstaclePassed {
        /// Identifier of the cleared obstacle.
        obstacle: ObstacleId,
    },
    /// Announces that the score counter advanced.
    ScoreAwarded {
        /// Score after the pass was counted.
        score: u32,
    },
    /// Announces that an obstacle scrolled off the world and was dropped.
    ObstacleRetired {
        /// Identifier of the retired obstacle.
        obstacle: ObstacleId,
    },
    /// Reports that an agent overlapped an obstacle region.
    AgentCollided {
        /// Identifier of the failed agent.
        agent: AgentId,
        /// Identifier of the obstacle it hit.
        obstacle: ObstacleId,
    },
    /// Reports that an agent left the playable band.
    AgentOutOfBounds {
        /// Identifier of the failed agent.
        agent: AgentId,
        /// Boundary the agent crossed.
        bound: Bound,
    },
    /// Confirms that the evaluation reached its terminal state.
    EvaluationFinished {
        /// Number of ticks processed.
        ticks: u64,
        /// Final score.
        score: u32,
        /// Why the evaluation stopped.
        reason: Termination,
    },
}

/// Immutable representation of a single agent used for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    /// Identifier assigned to the agent.
    pub id: AgentId,
    /// Fixed horizontal position.
    pub x: f32,
    /// Current vertical position.
    pub y: f32,
    /// Current tilt in degrees.
    pub tilt: f32,
    /// Cosmetic animation counter.
    pub animation_tick: u32,
}

/// Immutable representation of a single obstacle used for presentation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSnapshot {
    /// Identifier assigned to the obstacle.
    pub id: ObstacleId,
    /// Current horizontal position of the leading edge.
    pub x: f32,
    /// Gap height sampled at creation.
    pub gap_height: i32,
    /// Vertical position of the upper region's top edge.
    pub top: f32,
    /// Vertical position of the lower region's top edge.
    pub bottom: f32,
    /// Whether the population already cleared the obstacle.
    pub passed: bool,
}

/// Immutable representation of the scrolling ground.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroundSnapshot {
    /// Vertical position of the strip's top edge.
    pub y: f32,
    /// Horizontal offsets of the two strips.
    pub offsets: [f32; 2],
    /// Width of one strip.
    pub strip_width: f32,
}

/// Counters shown alongside a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameMeta {
    /// Ticks processed so far in this evaluation.
    pub tick: u64,
    /// Generation tag supplied by the caller.
    pub generation: u32,
    /// Obstacles cleared so far.
    pub score: u32,
    /// Agents still alive after the tick.
    pub alive: usize,
}

/// Read-only snapshot of the post-tick state handed to presentation sinks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Live agents in evaluation order.
    pub agents: Vec<AgentSnapshot>,
    /// Obstacles in queue order.
    pub obstacles: Vec<ObstacleSnapshot>,
    /// Ground strip offsets.
    pub ground: GroundSnapshot,
    /// Score and bookkeeping counters.
    pub meta: FrameMeta,
}
