//! World configuration consumed by the environment and the evaluation loop.
//!
//! Every numeric constant that shapes motion, obstacle generation or the
//! reward schedule lives here. Values are grouped by concern and default to
//! the tuning the engine was calibrated against; downstream searches are
//! sensitive to the exact reward values, so change them deliberately.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Complete description of the simulated world.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Extents of the world and the sprites that inhabit it.
    pub geometry: Geometry,
    /// Motion law applied to every agent.
    pub kinematics: Kinematics,
    /// Obstacle gap and scrolling parameters.
    pub obstacles: ObstacleTuning,
    /// Fitness adjustments applied by the evaluation loop.
    pub rewards: RewardSchedule,
}

impl WorldConfig {
    /// Verifies that the configuration describes a playable world.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] detected. Callers must not run a
    /// single tick against a configuration that fails validation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let geometry = &self.geometry;
        positive("world_width", geometry.world_width)?;
        positive("world_height", geometry.world_height)?;
        positive("floor_y", geometry.floor_y)?;
        positive("ground_width", geometry.ground_width)?;
        positive("agent_width", geometry.agent_width as f32)?;
        positive("agent_height", geometry.agent_height as f32)?;
        positive("obstacle_width", geometry.obstacle_width as f32)?;
        positive("obstacle_height", geometry.obstacle_height as f32)?;
        positive("obstacle_spawn_x", geometry.obstacle_spawn_x)?;
        positive("first_obstacle_x", geometry.first_obstacle_x)?;

        if geometry.floor_y > geometry.world_height {
            return Err(ConfigError::FloorOutsideWorld {
                floor: geometry.floor_y,
                height: geometry.world_height,
            });
        }

        let obstacles = &self.obstacles;
        if !(obstacles.gap > 0.0) {
            return Err(ConfigError::NonPositiveGap { gap: obstacles.gap });
        }
        if !(obstacles.scroll_velocity > 0.0) {
            return Err(ConfigError::NonPositiveScrollVelocity {
                velocity: obstacles.scroll_velocity,
            });
        }
        if obstacles.gap_height_min >= obstacles.gap_height_max {
            return Err(ConfigError::EmptyGapRange {
                min: obstacles.gap_height_min,
                max: obstacles.gap_height_max,
            });
        }
        let deepest_bottom = (obstacles.gap_height_max - 1) as f32 + obstacles.gap;
        if deepest_bottom >= geometry.floor_y {
            return Err(ConfigError::GapBelowFloor {
                bottom: deepest_bottom,
                floor: geometry.floor_y,
            });
        }

        let kinematics = &self.kinematics;
        if !(kinematics.terminal_displacement > 0.0) {
            return Err(ConfigError::NonPositiveTerminalDisplacement {
                cap: kinematics.terminal_displacement,
            });
        }
        if !(kinematics.min_tilt < kinematics.max_tilt) {
            return Err(ConfigError::InvertedTiltBounds {
                min: kinematics.min_tilt,
                max: kinematics.max_tilt,
            });
        }
        if !(kinematics.tilt_decay >= 0.0) {
            return Err(ConfigError::NegativeTiltDecay {
                decay: kinematics.tilt_decay,
            });
        }

        Ok(())
    }
}

fn positive(name: &'static str, value: f32) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::NonPositiveDimension { name, value })
    }
}

/// Extents of the world and the sprites that inhabit it, in pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
    /// Width of the visible world; new obstacles enter at this edge by default.
    pub world_width: f32,
    /// Height of the visible world.
    pub world_height: f32,
    /// Vertical coordinate of the floor line.
    pub floor_y: f32,
    /// Horizontal position assigned to every agent at spawn.
    pub spawn_x: f32,
    /// Vertical position assigned to every agent at spawn.
    pub spawn_y: f32,
    /// Reference height for the tilt law before the first impulse.
    ///
    /// `None` uses `spawn_y`, which holds the upward tilt during the opening
    /// free fall.
    pub spawn_impulse_height: Option<f32>,
    /// Width of the agent sprite.
    pub agent_width: u32,
    /// Height of the agent sprite, used by the floor check.
    pub agent_height: u32,
    /// Width of a single obstacle region.
    pub obstacle_width: u32,
    /// Height of a single obstacle region.
    pub obstacle_height: u32,
    /// Width of one ground strip.
    pub ground_width: f32,
    /// Horizontal position of the obstacle present when a run starts.
    pub first_obstacle_x: f32,
    /// Horizontal position of obstacles spawned after a pass.
    pub obstacle_spawn_x: f32,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            world_width: 540.0,
            world_height: 800.0,
            floor_y: 730.0,
            spawn_x: 230.0,
            spawn_y: 350.0,
            spawn_impulse_height: None,
            agent_width: 68,
            agent_height: 48,
            obstacle_width: 104,
            obstacle_height: 640,
            ground_width: 672.0,
            first_obstacle_x: 700.0,
            obstacle_spawn_x: 540.0,
        }
    }
}

/// Closed-form motion law applied to agents each tick.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Kinematics {
    /// Velocity assigned by an impulse; negative values point up.
    pub impulse_velocity: f32,
    /// Gravity-like acceleration `a` in `v*t + 0.5*a*t²`.
    pub acceleration: f32,
    /// Largest displacement magnitude allowed in a single tick.
    pub terminal_displacement: f32,
    /// Extra upward displacement added while ascending.
    pub ascent_bias: f32,
    /// Maximum upward tilt in degrees.
    pub max_tilt: f32,
    /// Minimum downward tilt in degrees.
    pub min_tilt: f32,
    /// Degrees the tilt decays per tick while falling.
    pub tilt_decay: f32,
    /// Distance below the impulse height that still counts as climbing.
    pub tilt_tolerance: f32,
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            impulse_velocity: -10.5,
            acceleration: 3.0,
            terminal_displacement: 16.0,
            ascent_bias: 2.0,
            max_tilt: 25.0,
            min_tilt: -90.0,
            tilt_decay: 20.0,
            tilt_tolerance: 50.0,
        }
    }
}

/// Obstacle gap geometry and scrolling speed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObstacleTuning {
    /// Vertical size of the opening between the upper and lower region.
    pub gap: f32,
    /// Pixels per tick that obstacles and the ground scroll left.
    pub scroll_velocity: f32,
    /// Inclusive lower bound of the sampled gap height.
    pub gap_height_min: i32,
    /// Exclusive upper bound of the sampled gap height.
    pub gap_height_max: i32,
}

impl Default for ObstacleTuning {
    fn default() -> Self {
        Self {
            gap: 200.0,
            scroll_velocity: 5.0,
            gap_height_min: 40,
            gap_height_max: 450,
        }
    }
}

/// Fitness adjustments and the controller activation threshold.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardSchedule {
    /// Credited to every live agent once per tick.
    pub survival: f32,
    /// Credited to every surviving agent when the population clears an obstacle.
    pub pass_bonus: f32,
    /// Debited from an agent that collides with an obstacle.
    pub collision_penalty: f32,
    /// Controller activations strictly above this value trigger an impulse.
    pub action_threshold: f32,
}

impl Default for RewardSchedule {
    fn default() -> Self {
        Self {
            survival: 0.1,
            pass_bonus: 7.0,
            collision_penalty: 1.0,
            action_threshold: 0.5,
        }
    }
}

/// Reasons a [`WorldConfig`] is rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum ConfigError {
    /// A dimension that must be strictly positive was not.
    #[error("{name} must be positive and finite (received {value})")]
    NonPositiveDimension {
        /// Name of the offending field.
        name: &'static str,
        /// Value that failed validation.
        value: f32,
    },
    /// The floor line lies below the bottom of the world.
    #[error("floor line {floor} lies outside the world height {height}")]
    FloorOutsideWorld {
        /// Configured floor line.
        floor: f32,
        /// Configured world height.
        height: f32,
    },
    /// The obstacle gap is zero or negative.
    #[error("obstacle gap must be positive (received {gap})")]
    NonPositiveGap {
        /// Configured gap.
        gap: f32,
    },
    /// Obstacles would not move.
    #[error("scroll velocity must be positive (received {velocity})")]
    NonPositiveScrollVelocity {
        /// Configured scroll velocity.
        velocity: f32,
    },
    /// The gap height range contains no values.
    #[error("gap height range {min}..{max} is empty")]
    EmptyGapRange {
        /// Inclusive lower bound.
        min: i32,
        /// Exclusive upper bound.
        max: i32,
    },
    /// The lowest possible gap would open beneath the floor.
    #[error("lowest gap bottom {bottom} reaches the floor line {floor}")]
    GapBelowFloor {
        /// Bottom bound of the deepest possible gap.
        bottom: f32,
        /// Configured floor line.
        floor: f32,
    },
    /// The terminal displacement cap is zero or negative.
    #[error("terminal displacement must be positive (received {cap})")]
    NonPositiveTerminalDisplacement {
        /// Configured cap.
        cap: f32,
    },
    /// The minimum tilt is not below the maximum tilt.
    #[error("tilt bounds are inverted ({min} is not below {max})")]
    InvertedTiltBounds {
        /// Configured minimum tilt.
        min: f32,
        /// Configured maximum tilt.
        max: f32,
    },
    /// Tilt would grow while falling.
    #[error("tilt decay must not be negative (received {decay})")]
    NegativeTiltDecay {
        /// Configured decay.
        decay: f32,
    },
}
