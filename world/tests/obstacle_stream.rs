use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use flappy_swarm_core::{AgentId, Command, Event, WorldConfig};
use flappy_swarm_world::{apply, query, Agent, World};

fn gap_heights(seed: u64, passes: usize) -> Vec<i32> {
    let mut world = World::new(WorldConfig::default(), seed).expect("default config is valid");
    let mut events = Vec::new();
    for _ in 0..passes {
        apply(&mut world, Command::AwardPass, &mut events);
    }
    query::obstacle_snapshots(&world)
        .into_iter()
        .map(|obstacle| obstacle.gap_height)
        .collect()
}

fn world_with_obstacle(x: f32, gap_height: i32) -> World {
    let mut world =
        World::without_obstacles(WorldConfig::default(), 0).expect("default config is valid");
    apply(
        &mut world,
        Command::PlaceObstacle { x, gap_height },
        &mut Vec::new(),
    );
    world
}

#[test]
fn same_seed_replays_the_same_obstacle_stream() {
    let first = gap_heights(17, 64);
    let second = gap_heights(17, 64);
    assert_eq!(first, second, "obstacle stream diverged between runs");
    assert_eq!(first.len(), 65);

    let mut hasher = DefaultHasher::new();
    first.hash(&mut hasher);
    let mut other = DefaultHasher::new();
    gap_heights(18, 64).hash(&mut other);
    assert_ne!(hasher.finish(), other.finish(), "seeds should decorrelate");
}

#[test]
fn obstacle_retires_once_trailing_edge_leaves_the_world() {
    let mut world = world_with_obstacle(540.0, 200);
    let id = world.obstacles()[0].id();
    let mut events = Vec::new();

    // 540 + 104 = 644 pixels to scroll; the trailing edge is negative after 129 steps.
    let mut steps = 0;
    while !world.obstacles().is_empty() {
        apply(&mut world, Command::AdvanceObstacles, &mut events);
        apply(&mut world, Command::RetireOffscreen, &mut events);
        steps += 1;
        assert!(steps <= 200, "obstacle never retired");
    }
    assert_eq!(steps, 129);
    assert_eq!(events, vec![Event::ObstacleRetired { obstacle: id }]);
}

#[test]
fn agent_crossing_an_obstacle_passes_exactly_once() {
    let mut world = world_with_obstacle(300.0, 300);
    let obstacle = world.obstacles()[0].id();
    let agent = Agent::new(AgentId::new(0), 230.0, 350.0);
    let mut events = Vec::new();

    for _ in 0..60 {
        apply(&mut world, Command::AdvanceObstacles, &mut events);
        assert!(
            !world.collides(&world.obstacles()[0], &agent),
            "agent sits inside the gap"
        );
        apply(
            &mut world,
            Command::RegisterPass {
                obstacle,
                agent_x: agent.x(),
            },
            &mut events,
        );
    }
    assert_eq!(events, vec![Event::ObstaclePassed { obstacle }]);
    assert!(query::obstacle_snapshots(&world)[0].passed);
}
