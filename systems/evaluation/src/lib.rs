#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Population evaluation loop for Flappy Swarm.
//!
//! An [`Evaluation`] runs a whole population against one shared [`World`].
//! Every agent travels in a [`Lane`] together with its controller and fitness
//! sink, so removing a failed agent removes all three at once and the
//! survivors never drift out of alignment. Failures found while scanning a
//! tick are only marked; the sweep that drops them happens once, after every
//! check of the tick has run.
//!
//! The loop never touches world state directly. It reads the world through
//! queries and changes it by applying [`Command`] values, recording the
//! resulting [`Event`] stream for its host.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use flappy_swarm_core::{
    AgentId, Command, Controller, Event, FitnessSink, Frame, FrameMeta, PresentationSink,
    Termination,
};
use flappy_swarm_world::{apply, query, Agent, World};
use thiserror::Error;
use tracing::{debug, info};

/// Lifecycle of an evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvaluationState {
    /// Live agents remain and no stop was requested.
    Running,
    /// The evaluation reached its terminal state.
    Done(Termination),
}

/// Cooperative stop request shared between an evaluation and its host.
///
/// The request is honoured at the top of the next tick, never mid-tick.
#[derive(Clone, Debug, Default)]
pub struct StopToken {
    requested: Arc<AtomicBool>,
}

impl StopToken {
    /// Creates a token with no pending request.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks every evaluation holding this token to stop.
    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Reports whether a stop was requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// Failures surfaced by [`Evaluation::tick`].
#[derive(Debug, Error)]
pub enum EvaluationError<E> {
    /// A controller failed; the tick was abandoned before any lane changed.
    #[error("controller for {agent} failed")]
    Controller {
        /// Agent whose controller failed.
        agent: AgentId,
        /// Error reported by the controller.
        #[source]
        source: E,
    },
    /// An earlier controller failure ended the evaluation.
    #[error("evaluation was aborted by an earlier controller failure")]
    Aborted,
}

/// Agent travelling together with its controller and fitness sink.
#[derive(Debug)]
pub struct Lane<'p, C, F> {
    agent: Agent,
    controller: &'p mut C,
    fitness: &'p mut F,
    failed: bool,
}

impl<'p, C, F> Lane<'p, C, F> {
    /// Kinematic state of the agent.
    #[must_use]
    pub const fn agent(&self) -> &Agent {
        &self.agent
    }

    /// Controller driving the agent.
    #[must_use]
    pub fn controller(&self) -> &C {
        &*self.controller
    }

    /// Fitness accumulated so far.
    #[must_use]
    pub fn fitness(&self) -> &F {
        &*self.fitness
    }
}

/// Outcome of a finished evaluation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct EvaluationSummary {
    /// Ticks processed.
    pub ticks: u64,
    /// Obstacles cleared by the population.
    pub score: u32,
    /// Why the evaluation stopped.
    pub termination: Termination,
}

/// Evaluation loop that advances a population against a shared world.
#[derive(Debug)]
pub struct Evaluation<'p, C, F> {
    world: World,
    lanes: Vec<Lane<'p, C, F>>,
    state: EvaluationState,
    aborted: bool,
    tick: u64,
    generation: u32,
    tick_limit: Option<u64>,
    stop: Option<StopToken>,
    events: Vec<Event>,
}

impl<'p, C, F> Evaluation<'p, C, F>
where
    C: Controller,
    F: FitnessSink,
{
    /// Spawns one agent per `(controller, fitness)` pair.
    ///
    /// Agents appear at the configured spawn position and receive
    /// identifiers in iteration order starting at zero. An empty population is
    /// already extinct.
    pub fn new<I>(world: World, population: I) -> Self
    where
        I: IntoIterator<Item = (&'p mut C, &'p mut F)>,
    {
        let agents: Vec<_> = population
            .into_iter()
            .enumerate()
            .map(|(index, (controller, fitness))| {
                let agent = world.spawn_agent(AgentId::new(index as u32));
                (agent, controller, fitness)
            })
            .collect();
        Self::from_agents(world, agents)
    }

    /// Evaluates pre-placed agents, each paired with its controller and sink.
    pub fn from_agents<I>(world: World, population: I) -> Self
    where
        I: IntoIterator<Item = (Agent, &'p mut C, &'p mut F)>,
    {
        let lanes: Vec<_> = population
            .into_iter()
            .map(|(agent, controller, fitness)| Lane {
                agent,
                controller,
                fitness,
                failed: false,
            })
            .collect();

        let events = world
            .obstacles()
            .iter()
            .map(|obstacle| Event::ObstacleSpawned {
                obstacle: obstacle.id(),
                x: obstacle.x(),
                gap_height: obstacle.gap_height(),
            })
            .collect();

        let mut evaluation = Self {
            world,
            lanes,
            state: EvaluationState::Running,
            aborted: false,
            tick: 0,
            generation: 0,
            tick_limit: None,
            stop: None,
            events,
        };
        if evaluation.lanes.is_empty() {
            evaluation.finish(Termination::Extinct);
        }
        evaluation
    }

    /// Tags frames with the caller's generation counter.
    #[must_use]
    pub fn with_generation(mut self, generation: u32) -> Self {
        self.generation = generation;
        self
    }

    /// Stops the evaluation once `limit` ticks have been processed.
    #[must_use]
    pub fn with_tick_limit(mut self, limit: u64) -> Self {
        self.tick_limit = Some(limit);
        self
    }

    /// Observes `token` for cooperative stop requests.
    #[must_use]
    pub fn with_stop_token(mut self, token: StopToken) -> Self {
        self.stop = Some(token);
        self
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> EvaluationState {
        self.state
    }

    /// Ticks processed so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.tick
    }

    /// Shared environment.
    #[must_use]
    pub const fn world(&self) -> &World {
        &self.world
    }

    /// Live lanes in evaluation order.
    #[must_use]
    pub fn lanes(&self) -> &[Lane<'p, C, F>] {
        &self.lanes
    }

    /// Obstacles cleared so far.
    #[must_use]
    pub const fn score(&self) -> u32 {
        self.world.score()
    }

    /// Removes and yields the events recorded since the last drain.
    ///
    /// The first drain opens with an `ObstacleSpawned` for every obstacle
    /// queued before the evaluation started.
    pub fn drain_events(&mut self) -> std::vec::Drain<'_, Event> {
        self.events.drain(..)
    }

    /// Captures the current state for presentation.
    #[must_use]
    pub fn frame(&self) -> Frame {
        Frame {
            agents: self.lanes.iter().map(|lane| lane.agent.snapshot()).collect(),
            obstacles: query::obstacle_snapshots(&self.world),
            ground: query::ground_snapshot(&self.world),
            meta: FrameMeta {
                tick: self.tick,
                generation: self.generation,
                score: self.world.score(),
                alive: self.lanes.len(),
            },
        }
    }

    /// Processes one tick without presenting it.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when a controller fails or an earlier
    /// failure already aborted the evaluation.
    pub fn tick(&mut self) -> Result<EvaluationState, EvaluationError<C::Error>> {
        self.advance(None)
    }

    /// Processes one tick and hands the resulting frame to `presenter`.
    ///
    /// # Errors
    ///
    /// Returns [`EvaluationError`] when a controller fails or an earlier
    /// failure already aborted the evaluation.
    pub fn tick_presenting(
        &mut self,
        presenter: &mut dyn PresentationSink,
    ) -> Result<EvaluationState, EvaluationError<C::Error>> {
        self.advance(Some(presenter))
    }

    /// Runs headless until the evaluation is done.
    ///
    /// # Errors
    ///
    /// Returns the first [`EvaluationError`] raised by a tick.
    pub fn run(&mut self) -> Result<EvaluationSummary, EvaluationError<C::Error>> {
        loop {
            if let EvaluationState::Done(termination) = self.advance(None)? {
                return Ok(self.summary(termination));
            }
        }
    }

    /// Runs until done, presenting every tick.
    ///
    /// # Errors
    ///
    /// Returns the first [`EvaluationError`] raised by a tick.
    pub fn run_presenting(
        &mut self,
        presenter: &mut dyn PresentationSink,
    ) -> Result<EvaluationSummary, EvaluationError<C::Error>> {
        loop {
            if let EvaluationState::Done(termination) = self.advance(Some(&mut *presenter))? {
                return Ok(self.summary(termination));
            }
        }
    }

    fn summary(&self, termination: Termination) -> EvaluationSummary {
        EvaluationSummary {
            ticks: self.tick,
            score: self.world.score(),
            termination,
        }
    }

    fn advance<'s>(
        &mut self,
        presenter: Option<&mut (dyn PresentationSink + 's)>,
    ) -> Result<EvaluationState, EvaluationError<C::Error>> {
        if self.aborted {
            return Err(EvaluationError::Aborted);
        }
        if let EvaluationState::Done(_) = self.state {
            return Ok(self.state);
        }
        if self.stop.as_ref().is_some_and(StopToken::is_stop_requested) {
            self.finish(Termination::StopRequested);
            return Ok(self.state);
        }
        if self.tick_limit.is_some_and(|limit| self.tick >= limit) {
            self.finish(Termination::TickLimit);
            return Ok(self.state);
        }

        let signals = match self.decide() {
            Ok(signals) => signals,
            Err(error) => {
                self.aborted = true;
                return Err(error);
            }
        };
        self.act(&signals);

        let kinematics = &self.world.config().kinematics;
        for lane in &mut self.lanes {
            lane.agent.step(kinematics);
        }

        apply(&mut self.world, Command::AdvanceGround, &mut self.events);
        apply(&mut self.world, Command::AdvanceObstacles, &mut self.events);

        let mut commands = Vec::new();
        self.sweep_obstacles(&mut commands);
        let swept = self.events.len();
        for command in commands {
            apply(&mut self.world, command, &mut self.events);
        }
        let cleared = self.events[swept..]
            .iter()
            .any(|event| matches!(event, Event::ObstaclePassed { .. }));

        if cleared {
            apply(&mut self.world, Command::AwardPass, &mut self.events);
            let bonus = self.world.config().rewards.pass_bonus;
            for lane in self.lanes.iter_mut().filter(|lane| !lane.failed) {
                lane.fitness.credit(bonus);
            }
            debug!(score = self.world.score(), "population cleared an obstacle");
        }

        apply(&mut self.world, Command::RetireOffscreen, &mut self.events);
        self.cull();
        self.tick += 1;

        if let Some(presenter) = presenter {
            presenter.present(&self.frame());
        }

        if self.lanes.is_empty() {
            self.finish(Termination::Extinct);
        }
        Ok(self.state)
    }

    /// Queries every controller before any lane is touched.
    fn decide(&mut self) -> Result<Vec<f32>, EvaluationError<C::Error>> {
        let lead_x = self.lanes.first().map(|lane| lane.agent.x());
        let lead = self.world.lead_obstacle(lead_x);
        let world = &self.world;

        self.lanes
            .iter_mut()
            .map(|lane| {
                let observation = world.observe(&lane.agent, lead);
                lane.controller
                    .action(&observation)
                    .map_err(|source| EvaluationError::Controller {
                        agent: lane.agent.id(),
                        source,
                    })
            })
            .collect()
    }

    /// Credits survival and applies impulses for signals above the threshold.
    fn act(&mut self, signals: &[f32]) {
        let config = self.world.config();
        for (lane, &signal) in self.lanes.iter_mut().zip(signals) {
            lane.fitness.credit(config.rewards.survival);
            if signal > config.rewards.action_threshold {
                lane.agent.apply_impulse(&config.kinematics);
            }
        }
    }

    /// Marks collisions and requests a pass check for every uncleared obstacle.
    fn sweep_obstacles(&mut self, out: &mut Vec<Command>) {
        let penalty = self.world.config().rewards.collision_penalty;

        for obstacle in self.world.obstacles() {
            for lane in &mut self.lanes {
                if !lane.failed && self.world.collides(obstacle, &lane.agent) {
                    lane.fitness.credit(-penalty);
                    lane.failed = true;
                    self.events.push(Event::AgentCollided {
                        agent: lane.agent.id(),
                        obstacle: obstacle.id(),
                    });
                }
                if !obstacle.passed() {
                    out.push(Command::RegisterPass {
                        obstacle: obstacle.id(),
                        agent_x: lane.agent.x(),
                    });
                }
            }
        }
    }

    /// Marks out-of-bounds agents and drops every failed lane in one pass.
    fn cull(&mut self) {
        for lane in self.lanes.iter_mut().filter(|lane| !lane.failed) {
            if let Some(bound) = self.world.bound_violation(&lane.agent) {
                lane.failed = true;
                self.events.push(Event::AgentOutOfBounds {
                    agent: lane.agent.id(),
                    bound,
                });
            }
        }

        let before = self.lanes.len();
        self.lanes.retain(|lane| !lane.failed);
        let removed = before - self.lanes.len();
        if removed > 0 {
            debug!(
                removed,
                alive = self.lanes.len(),
                tick = self.tick,
                "removed failed agents"
            );
        }
    }

    fn finish(&mut self, termination: Termination) {
        self.state = EvaluationState::Done(termination);
        self.events.push(Event::EvaluationFinished {
            ticks: self.tick,
            score: self.world.score(),
            reason: termination,
        });
        info!(
            generation = self.generation,
            ticks = self.tick,
            score = self.world.score(),
            reason = ?termination,
            "evaluation finished"
        );
    }
}
