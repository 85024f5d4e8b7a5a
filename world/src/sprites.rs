//! Procedurally generated silhouettes for agents and obstacle regions.

use flappy_swarm_core::Geometry;

use crate::mask::Mask;

/// Collision masks shared by every entity in a world.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpriteMasks {
    agent: Mask,
    obstacle_top: Mask,
    obstacle_bottom: Mask,
}

impl SpriteMasks {
    /// Builds masks sized after the configured sprite dimensions.
    #[must_use]
    pub fn from_geometry(geometry: &Geometry) -> Self {
        let obstacle_bottom = obstacle_silhouette(geometry.obstacle_width, geometry.obstacle_height);
        Self {
            agent: agent_silhouette(geometry.agent_width, geometry.agent_height),
            obstacle_top: obstacle_bottom.flipped_vertically(),
            obstacle_bottom,
        }
    }

    /// Silhouette of an agent.
    #[must_use]
    pub const fn agent(&self) -> &Mask {
        &self.agent
    }

    /// Silhouette of an upper region, lip facing down.
    #[must_use]
    pub const fn obstacle_top(&self) -> &Mask {
        &self.obstacle_top
    }

    /// Silhouette of a lower region, lip facing up.
    #[must_use]
    pub const fn obstacle_bottom(&self) -> &Mask {
        &self.obstacle_bottom
    }
}

/// Ellipse inscribed in the sprite rectangle; the corners stay transparent.
fn agent_silhouette(width: u32, height: u32) -> Mask {
    let radius_x = width as f32 / 2.0;
    let radius_y = height as f32 / 2.0;
    Mask::from_fn(width, height, |x, y| {
        let nx = (x as f32 + 0.5 - radius_x) / radius_x;
        let ny = (y as f32 + 0.5 - radius_y) / radius_y;
        nx * nx + ny * ny <= 1.0
    })
}

/// Full-width lip on the opening side above a narrower shaft.
fn obstacle_silhouette(width: u32, height: u32) -> Mask {
    let lip_height = (height / 13).max(1);
    let inset = (width / 26).min(width.saturating_sub(1) / 2);
    Mask::from_fn(width, height, |x, y| {
        y < lip_height || (x >= inset && x < width - inset)
    })
}
