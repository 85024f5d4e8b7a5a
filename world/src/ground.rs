//! Seamless scrolling floor strip.

use flappy_swarm_core::GroundSnapshot;

/// Two strips placed back to back so the floor appears endless.
#[derive(Clone, Debug, PartialEq)]
pub struct Ground {
    y: f32,
    strip_width: f32,
    offsets: [f32; 2],
}

impl Ground {
    /// Creates a ground whose first strip starts at the left edge.
    #[must_use]
    pub const fn new(y: f32, strip_width: f32) -> Self {
        Self {
            y,
            strip_width,
            offsets: [0.0, strip_width],
        }
    }

    /// Vertical position of the strip's top edge.
    #[must_use]
    pub const fn y(&self) -> f32 {
        self.y
    }

    /// Horizontal offsets of both strips.
    #[must_use]
    pub const fn offsets(&self) -> [f32; 2] {
        self.offsets
    }

    /// Scrolls both strips and moves any strip that left the world behind the other.
    pub fn step(&mut self, scroll_velocity: f32) {
        let width = self.strip_width;
        let [first, second] = &mut self.offsets;
        *first -= scroll_velocity;
        *second -= scroll_velocity;

        if *first + width < 0.0 {
            *first = *second + width;
        }
        if *second + width < 0.0 {
            *second = *first + width;
        }
    }

    /// Captures a read-only snapshot for presentation.
    #[must_use]
    pub const fn snapshot(&self) -> GroundSnapshot {
        GroundSnapshot {
            y: self.y,
            offsets: self.offsets,
            strip_width: self.strip_width,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_stay_one_width_apart() {
        let mut ground = Ground::new(730.0, 672.0);
        for _ in 0..1_000 {
            ground.step(5.0);
            let [first, second] = ground.offsets();
            assert_eq!((first - second).abs(), 672.0);
        }
    }

    #[test]
    fn left_edge_is_always_covered() {
        let mut ground = Ground::new(730.0, 672.0);
        for _ in 0..1_000 {
            ground.step(5.0);
            let [first, second] = ground.offsets();
            let leftmost = first.min(second);
            assert!(leftmost <= 0.0, "gap exposed at the left edge: {leftmost}");
            assert!(leftmost + 2.0 * 672.0 >= 540.0, "gap exposed at the right edge");
        }
    }

    #[test]
    fn wrapped_strip_follows_the_other() {
        let mut ground = Ground::new(730.0, 10.0);
        ground.step(11.0);
        assert_eq!(ground.offsets(), [9.0, -1.0]);
    }
}
