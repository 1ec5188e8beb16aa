//! Particle Pool
//!
//! Fixed-size pool of billboard sprites for one-shot bursts (action
//! feedback, clicks, the evolution finale). Every particle is allocated
//! once; a burst moves indices from the free list to the alive list and
//! `update` moves them back when their lifetime runs out. The pool never
//! grows: a burst larger than the free list is silently truncated.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::rasterizer::{Color, Vec3};
use crate::scene::{NodeId, SceneGraph, Sprite};

/// Edge length of a burst sprite in world units
pub const PARTICLE_SIZE: f32 = 0.15;

/// A burst activates between MIN and MAX - 1 particles
const BURST_MIN: usize = 10;
const BURST_MAX: usize = 20;

const LIFE_MIN: f32 = 0.9;
const LIFE_MAX: f32 = 1.5;

/// A single pooled particle
#[derive(Debug, Clone, Copy)]
pub struct Particle {
    pub position: Vec3,
    /// Units per second
    pub velocity: Vec3,
    pub color: Color,
    /// Seconds since the burst
    pub age: f32,
    /// Seconds until the particle returns to the pool
    pub lifetime: f32,
    pub alive: bool,
}

impl Default for Particle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            color: Color::WHITE,
            age: 0.0,
            lifetime: LIFE_MIN,
            alive: false,
        }
    }
}

impl Particle {
    /// Linear fade over the lifetime
    pub fn opacity(&self) -> f32 {
        (1.0 - self.age / self.lifetime).max(0.0)
    }
}

pub struct ParticlePool {
    particles: Vec<Particle>,
    free: Vec<usize>,
    alive: Vec<usize>,
    /// One sprite per particle once attached
    sprites: Vec<NodeId>,
    rng: StdRng,
}

impl ParticlePool {
    pub fn new(capacity: usize) -> Self {
        Self::with_rng(capacity, StdRng::from_entropy())
    }

    pub fn with_seed(capacity: usize, seed: u64) -> Self {
        Self::with_rng(capacity, StdRng::seed_from_u64(seed))
    }

    fn with_rng(capacity: usize, rng: StdRng) -> Self {
        Self {
            particles: vec![Particle::default(); capacity],
            // Popped from the back, so slot 0 goes first
            free: (0..capacity).rev().collect(),
            alive: Vec::with_capacity(capacity),
            sprites: Vec::new(),
            rng,
        }
    }

    /// Insert one hidden sprite per particle. Only the first call does anything.
    pub fn attach_to(&mut self, graph: &mut SceneGraph) {
        if !self.sprites.is_empty() {
            return;
        }
        self.sprites = self
            .particles
            .iter()
            .map(|p| {
                let mut sprite = Sprite::new(p.position, p.color, PARTICLE_SIZE);
                sprite.visible = false;
                graph.insert_sprite(sprite)
            })
            .collect();
    }

    pub fn is_attached(&self) -> bool {
        !self.sprites.is_empty()
    }

    /// Remove the sprites from the graph and kill every particle
    pub fn detach(&mut self, graph: &mut SceneGraph) {
        for id in self.sprites.drain(..) {
            graph.remove(id);
        }
        self.clear();
    }

    /// Activate 10 to 19 particles at `position`. Returns how many started.
    pub fn burst(&mut self, position: Vec3, color: Color) -> usize {
        let wanted = self.rng.gen_range(BURST_MIN..BURST_MAX);
        let mut started = 0;
        for _ in 0..wanted {
            let Some(index) = self.free.pop() else {
                break;
            };
            let velocity = Vec3::new(
                (self.rng.gen::<f32>() - 0.5) * 0.6,
                1.2 + self.rng.gen::<f32>() * 0.6,
                (self.rng.gen::<f32>() - 0.5) * 0.6,
            );
            self.particles[index] = Particle {
                position,
                velocity,
                color,
                age: 0.0,
                lifetime: self.rng.gen_range(LIFE_MIN..LIFE_MAX),
                alive: true,
            };
            self.alive.push(index);
            started += 1;
        }
        started
    }

    /// Advance live particles, recycle expired ones and refresh the sprites
    pub fn update(&mut self, dt: f32, graph: &mut SceneGraph) {
        let particles = &mut self.particles;
        let free = &mut self.free;
        self.alive.retain(|&index| {
            let p = &mut particles[index];
            p.age += dt;
            p.position += p.velocity * dt;
            if p.age >= p.lifetime {
                p.alive = false;
                free.push(index);
                false
            } else {
                true
            }
        });
        self.sync(graph);
    }

    /// Write particle state onto the attached sprites
    pub fn sync(&self, graph: &mut SceneGraph) {
        for (p, &id) in self.particles.iter().zip(&self.sprites) {
            if let Some(sprite) = graph.sprite_mut(id) {
                sprite.visible = p.alive;
                if p.alive {
                    sprite.position = p.position;
                    sprite.color = p.color;
                    sprite.opacity = p.opacity();
                }
            }
        }
    }

    /// Kill every particle
    pub fn clear(&mut self) {
        for index in self.alive.drain(..) {
            self.particles[index].alive = false;
            self.free.push(index);
        }
    }

    pub fn capacity(&self) -> usize {
        self.particles.len()
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn particles(&self) -> impl Iterator<Item = &Particle> {
        self.alive.iter().map(|&i| &self.particles[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_size_and_conservation() {
        let mut graph = SceneGraph::new();
        let mut pool = ParticlePool::with_seed(128, 1);
        pool.attach_to(&mut graph);

        for i in 0..20 {
            let started = pool.burst(Vec3::new(0.0, 1.0, 0.0), Color::from_hex(0xff6ea0));
            assert!(started <= 19);
            if i == 0 {
                assert!(started >= 10);
            }
            pool.update(0.1, &mut graph);
            assert_eq!(pool.alive_count() + pool.free_count(), pool.capacity());
        }
    }

    #[test]
    fn test_exhausted_pool_truncates() {
        let mut graph = SceneGraph::new();
        let mut pool = ParticlePool::with_seed(8, 2);
        pool.attach_to(&mut graph);
        assert_eq!(pool.burst(Vec3::ZERO, Color::WHITE), 8);
        assert_eq!(pool.burst(Vec3::ZERO, Color::WHITE), 0);
        assert_eq!(pool.free_count(), 0);
        assert_eq!(graph.len(), 8);
    }

    #[test]
    fn test_particles_never_outlive_lifetime() {
        let mut graph = SceneGraph::new();
        let mut pool = ParticlePool::with_seed(64, 3);
        pool.attach_to(&mut graph);
        pool.burst(Vec3::ZERO, Color::WHITE);

        for _ in 0..20 {
            pool.update(0.05, &mut graph);
            for p in pool.particles() {
                assert!(p.age < p.lifetime);
                assert!(p.lifetime >= 0.9 && p.lifetime < 1.5);
                assert!(p.velocity.y >= 1.2 && p.velocity.y < 1.8);
                assert!(p.opacity() > 0.0 && p.opacity() <= 1.0);
            }
        }
        pool.update(1.0, &mut graph);
        assert_eq!(pool.alive_count(), 0);
        assert!(graph.iter().all(|(_, node)| !node.is_visible()));
    }

    #[test]
    fn test_sprites_follow_particles() {
        let mut graph = SceneGraph::new();
        let mut pool = ParticlePool::with_seed(32, 4);
        pool.attach_to(&mut graph);
        pool.attach_to(&mut graph);
        assert_eq!(graph.len(), 32);

        pool.burst(Vec3::new(1.0, 0.0, 0.0), Color::from_hex(0xffd54f));
        pool.update(0.5, &mut graph);
        let visible: Vec<_> = graph.iter().filter(|(_, n)| n.is_visible()).collect();
        assert_eq!(visible.len(), pool.alive_count());
        for p in pool.particles() {
            assert!(p.position.y > 0.5);
        }

        pool.detach(&mut graph);
        assert!(graph.is_empty());
        assert_eq!(pool.free_count(), 32);
    }
}
