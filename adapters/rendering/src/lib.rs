#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Shared rendering contracts for Flappy Swarm adapters.
//!
//! Evaluation frames are translated into a [`Scene`]: sprite instances in
//! draw order plus the HUD counters. Backends only ever see scenes, so the
//! simulation never depends on how or whether it is drawn.

use std::io::Write;

use anyhow::Result as AnyResult;
use flappy_swarm_core::{Frame, FrameMeta, Geometry, PresentationSink};
use flappy_swarm_world::{WING_FRAME_TICKS, WING_GLIDE_TILT};
use glam::Vec2;

/// Wing pose shown for an agent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WingFrame {
    /// Wings raised.
    Up,
    /// Wings level; also held while gliding nose-down.
    Level,
    /// Wings lowered.
    Down,
}

/// Selects the wing pose for an agent's animation phase and tilt.
///
/// The pose cycles up, level, down, level and back to up, holding each pose
/// for [`WING_FRAME_TICKS`] ticks. Agents tilted to [`WING_GLIDE_TILT`] or
/// further hold their wings level.
#[must_use]
pub fn wing_frame(animation_tick: u32, tilt: f32) -> WingFrame {
    if tilt <= WING_GLIDE_TILT {
        return WingFrame::Level;
    }
    match animation_tick / WING_FRAME_TICKS {
        1 | 3 => WingFrame::Level,
        2 => WingFrame::Down,
        _ => WingFrame::Up,
    }
}

/// Sprite sheet entry referenced by a [`SpriteInstance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpriteKey {
    /// Full-window backdrop.
    Background,
    /// Upper obstacle region, drawn flipped.
    ObstacleTop,
    /// Lower obstacle region.
    ObstacleBottom,
    /// One ground strip.
    Ground,
    /// Agent in the given wing pose.
    Agent(WingFrame),
}

impl SpriteKey {
    /// Character used by the text rasterizer.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Self::Background => ' ',
            Self::ObstacleTop | Self::ObstacleBottom => '#',
            Self::Ground => '=',
            Self::Agent(WingFrame::Up) => '^',
            Self::Agent(WingFrame::Level) => '>',
            Self::Agent(WingFrame::Down) => 'v',
        }
    }
}

/// Placed sprite in world coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpriteInstance {
    /// Sprite to draw.
    pub key: SpriteKey,
    /// Top-left corner in world pixels.
    pub position: Vec2,
    /// Width and height in world pixels.
    pub size: Vec2,
    /// Counter-clockwise rotation in degrees about the sprite centre.
    pub rotation: f32,
}

impl SpriteInstance {
    /// Creates an unrotated sprite instance.
    #[must_use]
    pub const fn new(key: SpriteKey, position: Vec2, size: Vec2) -> Self {
        Self {
            key,
            position,
            size,
            rotation: 0.0,
        }
    }

    /// Returns the instance rotated by `degrees`.
    #[must_use]
    pub const fn rotated(mut self, degrees: f32) -> Self {
        self.rotation = degrees;
        self
    }
}

/// Counters shown over the scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Hud {
    /// Obstacles cleared.
    pub score: u32,
    /// Generation number, never below 1.
    pub generation: u32,
    /// Agents still alive.
    pub alive: usize,
}

impl Hud {
    /// Builds the HUD from frame bookkeeping.
    #[must_use]
    pub fn from_meta(meta: &FrameMeta) -> Self {
        Self {
            score: meta.score,
            generation: meta.generation.max(1),
            alive: meta.alive,
        }
    }

    /// Labels in display order.
    #[must_use]
    pub fn labels(&self) -> [String; 3] {
        [
            format!("Score: {}", self.score),
            format!("Generation No: {}", self.generation),
            format!("Alive: {}", self.alive),
        ]
    }
}

/// Drawable description of one presented frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// World size in pixels.
    pub extent: Vec2,
    /// Sprites in back-to-front order.
    pub sprites: Vec<SpriteInstance>,
    /// Counters drawn on top of every sprite.
    pub hud: Hud,
}

impl Scene {
    /// Lays out a frame: backdrop, obstacles, ground, then agents.
    #[must_use]
    pub fn from_frame(frame: &Frame, geometry: &Geometry) -> Self {
        let extent = Vec2::new(geometry.world_width, geometry.world_height);
        let mut sprites =
            Vec::with_capacity(1 + 2 * frame.obstacles.len() + 2 + frame.agents.len());
        sprites.push(SpriteInstance::new(
            SpriteKey::Background,
            Vec2::ZERO,
            extent,
        ));

        let obstacle_size = Vec2::new(
            geometry.obstacle_width as f32,
            geometry.obstacle_height as f32,
        );
        for obstacle in &frame.obstacles {
            sprites.push(SpriteInstance::new(
                SpriteKey::ObstacleTop,
                Vec2::new(obstacle.x, obstacle.top),
                obstacle_size,
            ));
            sprites.push(SpriteInstance::new(
                SpriteKey::ObstacleBottom,
                Vec2::new(obstacle.x, obstacle.bottom),
                obstacle_size,
            ));
        }

        let ground = &frame.ground;
        let strip_size = Vec2::new(ground.strip_width, (extent.y - ground.y).max(0.0));
        for offset in ground.offsets {
            sprites.push(SpriteInstance::new(
                SpriteKey::Ground,
                Vec2::new(offset, ground.y),
                strip_size,
            ));
        }

        let agent_size = Vec2::new(geometry.agent_width as f32, geometry.agent_height as f32);
        for agent in &frame.agents {
            let key = SpriteKey::Agent(wing_frame(agent.animation_tick, agent.tilt));
            sprites.push(
                SpriteInstance::new(key, Vec2::new(agent.x, agent.y), agent_size)
                    .rotated(agent.tilt),
            );
        }

        Self {
            extent,
            sprites,
            hud: Hud::from_meta(&frame.meta),
        }
    }
}

/// Rasterizes a scene into `columns` x `rows` characters followed by the HUD.
///
/// Later sprites overwrite earlier ones; rotation is ignored.
#[must_use]
pub fn render_text(scene: &Scene, columns: usize, rows: usize) -> String {
    let mut grid = vec![vec![' '; columns]; rows];
    if columns > 0 && rows > 0 && scene.extent.x > 0.0 && scene.extent.y > 0.0 {
        let cell = scene.extent / Vec2::new(columns as f32, rows as f32);
        for sprite in &scene.sprites {
            let start = (sprite.position / cell).floor();
            let end = ((sprite.position + sprite.size) / cell).ceil();
            let glyph = sprite.key.glyph();
            for row in clip(start.y, end.y, rows) {
                for column in clip(start.x, end.x, columns) {
                    grid[row][column] = glyph;
                }
            }
        }
    }

    let mut text = String::with_capacity((columns + 1) * (rows + 1));
    for line in grid {
        text.extend(line);
        text.push('\n');
    }
    text.push_str(&scene.hud.labels().join("  "));
    text.push('\n');
    text
}

fn clip(start: f32, end: f32, limit: usize) -> std::ops::Range<usize> {
    let limit_f = limit as f32;
    let start = start.clamp(0.0, limit_f) as usize;
    let end = end.clamp(0.0, limit_f) as usize;
    start..end.max(start)
}

/// Rendering backend capable of drawing Flappy Swarm scenes.
pub trait RenderingBackend {
    /// Draws one scene.
    fn draw(&mut self, scene: &Scene) -> AnyResult<()>;
}

/// Backend that writes [`render_text`] output to a byte sink.
#[derive(Debug)]
pub struct TextBackend<W> {
    out: W,
    columns: usize,
    rows: usize,
}

impl<W> TextBackend<W> {
    /// Creates a backend rasterizing to `columns` x `rows` characters.
    #[must_use]
    pub const fn new(out: W, columns: usize, rows: usize) -> Self {
        Self { out, columns, rows }
    }

    /// Returns the underlying sink.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W> RenderingBackend for TextBackend<W>
where
    W: Write,
{
    fn draw(&mut self, scene: &Scene) -> AnyResult<()> {
        self.out
            .write_all(render_text(scene, self.columns, self.rows).as_bytes())?;
        self.out.flush()?;
        Ok(())
    }
}

/// Presentation sink that draws every `every`-th frame through a backend.
///
/// The first backend failure is kept and later frames are skipped; presenters
/// have no way to interrupt the evaluation that feeds them.
#[derive(Debug)]
pub struct ScenePresenter<B> {
    backend: B,
    geometry: Geometry,
    every: u64,
    failure: Option<anyhow::Error>,
}

impl<B> ScenePresenter<B>
where
    B: RenderingBackend,
{
    /// Creates a presenter; `every` of zero is treated as one.
    #[must_use]
    pub fn new(backend: B, geometry: Geometry, every: u64) -> Self {
        Self {
            backend,
            geometry,
            every: every.max(1),
            failure: None,
        }
    }

    /// Returns the backend, or the first error it reported.
    ///
    /// # Errors
    ///
    /// Returns the first draw failure.
    pub fn finish(self) -> AnyResult<B> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(self.backend),
        }
    }
}

impl<B> PresentationSink for ScenePresenter<B>
where
    B: RenderingBackend,
{
    fn present(&mut self, frame: &Frame) {
        if self.failure.is_some() || frame.meta.tick % self.every != 0 {
            return;
        }
        let scene = Scene::from_frame(frame, &self.geometry);
        if let Err(error) = self.backend.draw(&scene) {
            self.failure = Some(error);
        }
    }
}
