//! Snowfall: falling particles spawned on a cancellable timer
//!
//! The manager is either Inactive or Active. Active owns exactly one spawn timer;
//! deactivating drops the timer and then every live particle. Each particle owns
//! one sprite in the layer, and `retire` is the only way either is removed.

use crate::colors::translucent_white;
use crate::terminal::Terminal;
use rand::Rng;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub const SPAWN_INTERVAL: Duration = Duration::from_millis(300);
const FALL_SECS_MIN: f32 = 2.0;
const FALL_SECS_MAX: f32 = 5.0;
const FALL_MAX: Duration = Duration::from_secs(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SpriteId(u64);

/// Renderable representation of a particle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sprite {
    pub x: u16,
    pub y: u16,
    pub opacity: f32,
}

#[derive(Debug, Default)]
pub struct SpriteLayer {
    sprites: BTreeMap<SpriteId, Sprite>,
    next_id: u64,
}

impl SpriteLayer {
    fn attach(&mut self, sprite: Sprite) -> SpriteId {
        let id = SpriteId(self.next_id);
        self.next_id += 1;
        self.sprites.insert(id, sprite);
        id
    }

    fn detach(&mut self, id: SpriteId) -> bool {
        self.sprites.remove(&id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sprite> {
        self.sprites.values()
    }

    pub fn len(&self) -> usize {
        self.sprites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sprites.is_empty()
    }
}

#[derive(Debug)]
pub struct Particle {
    pub sprite: SpriteId,
    pub column: u16,
    /// [0, 1)
    pub opacity: f32,
    /// [2s, 5s)
    pub fall: Duration,
    pub born: Instant,
}

impl Particle {
    pub fn lands_at(&self) -> Instant {
        self.born + self.fall
    }

    /// Fraction of the fall completed at `now`, in [0, 1]
    fn progress(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.born).as_secs_f32();
        (elapsed / self.fall.as_secs_f32()).clamp(0.0, 1.0)
    }
}

struct SpawnTimer {
    next_due: Instant,
    interval: Duration,
}

enum Phase {
    Inactive,
    Active(SpawnTimer),
}

pub struct ParticleManager {
    phase: Phase,
    pool: Vec<Particle>,
    layer: SpriteLayer,
    width: u16,
    height: u16,
    spawned_total: u64,
    retired_total: u64,
}

impl ParticleManager {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            phase: Phase::Inactive,
            pool: Vec::new(),
            layer: SpriteLayer::default(),
            width,
            height,
            spawned_total: 0,
            retired_total: 0,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Spawn one particle now and start the spawn timer. No-op while active.
    pub fn activate<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) {
        if self.is_active() {
            return;
        }
        self.spawn(now, rng);
        self.phase = Phase::Active(SpawnTimer {
            next_due: now + SPAWN_INTERVAL,
            interval: SPAWN_INTERVAL,
        });
        tracing::debug!("snowfall on");
    }

    /// Cancel the spawn timer, then remove every live particle. No-op while inactive.
    pub fn deactivate(&mut self) {
        if !self.is_active() {
            return;
        }
        self.phase = Phase::Inactive;
        let live = self.pool.len();
        while !self.pool.is_empty() {
            self.retire(self.pool.len() - 1);
        }
        tracing::debug!(removed = live, "snowfall off");
    }

    /// Fire due spawn ticks, retire landed particles and move the rest.
    pub fn update<R: Rng + ?Sized>(&mut self, now: Instant, rng: &mut R) {
        // Ticks older than the longest fall would land before they are ever seen
        if let (Phase::Active(timer), Some(horizon)) = (&mut self.phase, now.checked_sub(FALL_MAX)) {
            if timer.next_due < horizon {
                let missed = (horizon - timer.next_due).as_nanos() / timer.interval.as_nanos();
                let missed = u32::try_from(missed).unwrap_or(u32::MAX);
                timer.next_due += timer.interval * missed;
                tracing::debug!(skipped = missed, "snowfall caught up after a stall");
            }
        }

        while let Phase::Active(timer) = &mut self.phase {
            if timer.next_due > now {
                break;
            }
            let born = timer.next_due;
            timer.next_due += timer.interval;
            self.spawn(born, rng);
        }

        for i in (0..self.pool.len()).rev() {
            if self.pool[i].lands_at() <= now {
                self.retire(i);
            }
        }

        let bottom = self.height.saturating_sub(1);
        for particle in &self.pool {
            let y = (particle.progress(now) * self.height as f32) as u16;
            if let Some(sprite) = self.layer.sprites.get_mut(&particle.sprite) {
                sprite.y = y.min(bottom);
            }
        }
    }

    /// Bounds for new particles' columns and for the fall distance
    pub fn set_viewport(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
    }

    fn spawn<R: Rng + ?Sized>(&mut self, born: Instant, rng: &mut R) {
        let column = if self.width == 0 { 0 } else { rng.gen_range(0..self.width) };
        let opacity = rng.gen_range(0.0..1.0);
        let fall = Duration::from_secs_f32(rng.gen_range(FALL_SECS_MIN..FALL_SECS_MAX));

        let sprite = self.layer.attach(Sprite { x: column, y: 0, opacity });
        self.pool.push(Particle {
            sprite,
            column,
            opacity,
            fall,
            born,
        });
        self.spawned_total += 1;
    }

    /// Remove a particle and its sprite together
    fn retire(&mut self, index: usize) {
        let particle = self.pool.remove(index);
        let detached = self.layer.detach(particle.sprite);
        debug_assert!(detached, "particle without a sprite");
        self.retired_total += 1;
    }

    pub fn particles(&self) -> &[Particle] {
        &self.pool
    }

    pub fn sprites(&self) -> &SpriteLayer {
        &self.layer
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn totals(&self) -> (u64, u64) {
        (self.spawned_total, self.retired_total)
    }

    /// Draw every sprite; `under` gives the backdrop colour of a row so opacity can blend into it
    pub fn draw<F>(&self, term: &mut Terminal, glyph: char, under: F)
    where
        F: Fn(u16) -> [u8; 3],
    {
        for sprite in self.layer.iter() {
            let color = translucent_white(under(sprite.y), sprite.opacity);
            term.set(sprite.x as i32, sprite.y as i32, glyph, Some(color), false);
        }
    }
}
