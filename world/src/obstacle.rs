//! Obstacle pairs scrolling toward the agents.

use flappy_swarm_core::{ObstacleId, ObstacleSnapshot, WorldConfig};
use rand::Rng;

use crate::{agent::Agent, sprites::SpriteMasks};

/// Upper and lower solid regions separated by a fixed vertical gap.
///
/// `gap_height` is the bottom edge of the upper region. It is sampled once
/// at creation and never changes, so `top < gap_height < bottom` holds for
/// the obstacle's lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct Obstacle {
    id: ObstacleId,
    x: f32,
    gap_height: i32,
    top: f32,
    bottom: f32,
    passed: bool,
}

impl Obstacle {
    /// Creates an obstacle whose gap height is drawn from the configured range.
    pub fn spawn<R>(id: ObstacleId, x: f32, config: &WorldConfig, rng: &mut R) -> Self
    where
        R: Rng + ?Sized,
    {
        let tuning = &config.obstacles;
        let gap_height = rng.gen_range(tuning.gap_height_min..tuning.gap_height_max);
        Self::with_gap_height(id, x, gap_height, config)
    }

    /// Creates an obstacle with an explicit gap height.
    #[must_use]
    pub fn with_gap_height(id: ObstacleId, x: f32, gap_height: i32, config: &WorldConfig) -> Self {
        let height = gap_height as f32;
        Self {
            id,
            x,
            gap_height,
            top: height - config.geometry.obstacle_height as f32,
            bottom: height + config.obstacles.gap,
            passed: false,
        }
    }

    /// Identifier assigned by the world.
    #[must_use]
    pub const fn id(&self) -> ObstacleId {
        self.id
    }

    /// Horizontal position of the leading edge.
    #[must_use]
    pub const fn x(&self) -> f32 {
        self.x
    }

    /// Bottom edge of the upper region.
    #[must_use]
    pub const fn gap_height(&self) -> i32 {
        self.gap_height
    }

    /// Top edge of the upper region.
    #[must_use]
    pub const fn top(&self) -> f32 {
        self.top
    }

    /// Top edge of the lower region.
    #[must_use]
    pub const fn bottom(&self) -> f32 {
        self.bottom
    }

    /// Whether the population already cleared this obstacle.
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.passed
    }

    /// Scrolls the obstacle left by one tick.
    pub fn step(&mut self, scroll_velocity: f32) {
        self.x -= scroll_velocity;
    }

    /// Pixel-exact overlap test between the agent and either region.
    #[must_use]
    pub fn intersects(&self, agent: &Agent, masks: &SpriteMasks) -> bool {
        let agent_y = agent.y().round_ties_even();
        let dx = (self.x - agent.x()).round_ties_even() as i32;
        let top_offset = (dx, (self.top - agent_y) as i32);
        let bottom_offset = (dx, (self.bottom - agent_y) as i32);

        masks.agent().overlaps(masks.obstacle_top(), top_offset)
            || masks.agent().overlaps(masks.obstacle_bottom(), bottom_offset)
    }

    /// Marks the obstacle passed once an agent at `agent_x` is ahead of it.
    ///
    /// Returns `true` only on the transition, at most once per obstacle.
    pub fn register_pass(&mut self, agent_x: f32) -> bool {
        if !self.passed && self.x < agent_x {
            self.passed = true;
            true
        } else {
            false
        }
    }

    /// Horizontal position of the trailing edge.
    #[must_use]
    pub fn trailing_edge(&self, obstacle_width: u32) -> f32 {
        self.x + obstacle_width as f32
    }

    /// Whether the trailing edge has scrolled past the left edge of the world.
    #[must_use]
    pub fn is_offscreen(&self, obstacle_width: u32) -> bool {
        self.trailing_edge(obstacle_width) < 0.0
    }

    /// Captures a read-only snapshot for presentation.
    #[must_use]
    pub const fn snapshot(&self) -> ObstacleSnapshot {
        ObstacleSnapshot {
            id: self.id,
            x: self.x,
            gap_height: self.gap_height,
            top: self.top,
            bottom: self.bottom,
            passed: self.passed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flappy_swarm_core::AgentId;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn obstacle(x: f32, gap_height: i32) -> Obstacle {
        Obstacle::with_gap_height(ObstacleId::new(0), x, gap_height, &WorldConfig::default())
    }

    #[test]
    fn bounds_derive_from_gap_height() {
        let obstacle = obstacle(700.0, 300);
        assert_eq!(obstacle.top(), 300.0 - 640.0);
        assert_eq!(obstacle.bottom(), 500.0);
        assert!(obstacle.top() < obstacle.bottom());
    }

    #[test]
    fn sampled_gap_heights_stay_in_range() {
        let config = WorldConfig::default();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for index in 0..200 {
            let obstacle = Obstacle::spawn(ObstacleId::new(index), 540.0, &config, &mut rng);
            assert!((40..450).contains(&obstacle.gap_height()));
            assert!(obstacle.top() < obstacle.bottom());
        }
    }

    #[test]
    fn pass_transition_fires_once() {
        let mut obstacle = obstacle(229.0, 200);
        assert!(obstacle.register_pass(230.0));
        assert!(!obstacle.register_pass(230.0));
        assert!(!obstacle.register_pass(500.0));
        assert!(obstacle.passed());
    }

    #[test]
    fn obstacle_ahead_of_agent_is_not_passed() {
        let mut obstacle = obstacle(230.0, 200);
        assert!(!obstacle.register_pass(230.0));
        assert!(!obstacle.passed());
    }

    #[test]
    fn offscreen_tracks_trailing_edge() {
        let mut obstacle = obstacle(-100.0, 200);
        assert!(!obstacle.is_offscreen(104));
        assert!(!obstacle.is_offscreen(104), "query does not change state");
        obstacle.step(5.0);
        assert!(obstacle.is_offscreen(104));
        assert!(obstacle.is_offscreen(104));
    }

    #[test]
    fn agent_inside_gap_does_not_collide() {
        let config = WorldConfig::default();
        let masks = SpriteMasks::from_geometry(&config.geometry);
        let obstacle = obstacle(230.0, 300);
        let agent = Agent::new(AgentId::new(0), 230.0, 380.0);
        assert!(!obstacle.intersects(&agent, &masks));
    }

    #[test]
    fn agent_inside_lower_region_collides() {
        let config = WorldConfig::default();
        let masks = SpriteMasks::from_geometry(&config.geometry);
        let obstacle = obstacle(230.0, 300);
        let agent = Agent::new(AgentId::new(0), 230.0, 480.0);
        assert!(obstacle.intersects(&agent, &masks));
    }

    #[test]
    fn agent_touching_upper_region_collides() {
        let config = WorldConfig::default();
        let masks = SpriteMasks::from_geometry(&config.geometry);
        let obstacle = obstacle(230.0, 300);
        let agent = Agent::new(AgentId::new(0), 230.0, 290.0);
        assert!(obstacle.intersects(&agent, &masks));
    }

    #[test]
    fn bounding_box_contact_at_transparent_corner_is_not_a_hit() {
        let config = WorldConfig::default();
        let masks = SpriteMasks::from_geometry(&config.geometry);
        // The lower region's lip starts at the agent's bottom-right pixel.
        let obstacle = obstacle(230.0 + 67.0, 300);
        let agent = Agent::new(AgentId::new(0), 230.0, 500.0 - 47.0);
        assert!(!obstacle.intersects(&agent, &masks));
    }
}
