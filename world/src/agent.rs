//! Kinematic agent state and its closed-form motion law.

use flappy_swarm_core::{AgentId, AgentSnapshot, Kinematics};

/// Ticks each wing frame is held before advancing.
pub const WING_FRAME_TICKS: u32 = 5;
/// Length of one full flap cycle.
pub const WING_CYCLE_TICKS: u32 = WING_FRAME_TICKS * 4;
/// Tilt at or below which the wings stop flapping.
pub const WING_GLIDE_TILT: f32 = -80.0;

/// One simulated entity with vertical motion and tilt.
///
/// The horizontal position is fixed for the lifetime of an evaluation. Each
/// tick integrates motion first and derives the tilt from the resulting
/// displacement afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Agent {
    id: AgentId,
    x: f32,
    y: f32,
    velocity: f32,
    tilt: f32,
    ticks_since_impulse: u32,
    impulse_height: f32,
    last_displacement: f32,
    animation_tick: u32,
}

impl Agent {
    /// Creates an agent at rest at the provided position.
    #[must_use]
    pub const fn new(id: AgentId, x: f32, y: f32) -> Self {
        Self {
            id,
            x,
            y,
            velocity: 0.0,
            tilt: 0.0,
            ticks_since_impulse: 0,
            impulse_height: y,
            last_displacement: 0.0,
            animation_tick: 0,
        }
    }

    /// Overrides the reference height the tilt law uses until the first impulse.
    #[must_use]
    pub const fn with_impulse_height(mut self, impulse_height: f32) -> Self {
        self.impulse_height = impulse_height;
        self
    }

    /// Identifier assigned to the agent.
    #[must_use]
    pub const fn id(&self) -> AgentId {
        self.id
    }

    /// Fixed horizontal position.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Current vertical position; larger values are lower.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Velocity assigned by the most recent impulse.
    #[must_use]
    pub const fn velocity(&self) -> f32 {
        self.velocity
    }

    /// Current tilt in degrees.
    #[must_use]
    pub const fn tilt(&self) -> f32 {
        self.tilt
    }

    /// Displacement applied by the most recent [`Agent::step`].
    #[must_use]
    pub const fn last_displacement(&self) -> f32 {
        self.last_displacement
    }

    /// Ticks elapsed since the most recent impulse.
    #[must_use]
    pub const fn ticks_since_impulse(&self) -> u32 {
        self.ticks_since_impulse
    }

    /// Cosmetic flap counter.
    #[must_use]
    pub const fn animation_tick(&self) -> u32 {
        self.animation_tick
    }

    /// Launches the agent upward. Repeated calls simply restart the arc.
    pub fn apply_impulse(&mut self, kinematics: &Kinematics) {
        self.velocity = kinematics.impulse_velocity;
        self.ticks_since_impulse = 0;
        self.impulse_height = self.y;
    }

    /// Advances the agent by one tick.
    pub fn step(&mut self, kinematics: &Kinematics) {
        self.ticks_since_impulse = self.ticks_since_impulse.saturating_add(1);
        let t = self.ticks_since_impulse as f32;
        let cap = kinematics.terminal_displacement;

        let raw = self.velocity * t + 0.5 * kinematics.acceleration * t * t;
        let mut displacement = raw.clamp(-cap, cap);
        if displacement < 0.0 {
            displacement = (displacement - kinematics.ascent_bias).max(-cap);
        }

        self.y += displacement;
        self.last_displacement = displacement;

        if displacement < 0.0 || self.y < self.impulse_height + kinematics.tilt_tolerance {
            if self.tilt < kinematics.max_tilt {
                self.tilt = kinematics.max_tilt;
            }
        } else if self.tilt > kinematics.min_tilt {
            self.tilt = (self.tilt - kinematics.tilt_decay).max(kinematics.min_tilt);
        }

        self.animation_tick = if self.tilt <= WING_GLIDE_TILT {
            WING_FRAME_TICKS * 2
        } else {
            (self.animation_tick + 1) % WING_CYCLE_TICKS
        };
    }

    /// Captures a read-only snapshot for presentation.
    #[must_use]
    pub const fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            id: self.id,
            x: self.x,
            y: self.y,
            tilt: self.tilt,
            animation_tick: self.animation_tick,
        }
    }
}
