//! Ambient particle field
//!
//! A loose cloud of small sprites drifting up around the companion, tinted
//! by mood. Particles that rise above `CEILING` respawn on the floor, and
//! the whole field slowly turns around the Y axis.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::rasterizer::{Color, Vec3};
use crate::scene::{NodeId, SceneGraph, Sprite};
use crate::task::ScheduledTask;

const SPRITE_SIZE: f32 = 0.05;
const CEILING: f32 = 3.0;
const SPIN: f32 = 0.1;
const OPACITY: f32 = 0.6;

/// How long the evolution flash keeps the field white
pub const EVOLUTION_BURST_SECONDS: f32 = 3.0;

#[derive(Debug, Clone, Copy)]
struct Mote {
    position: Vec3,
    velocity: Vec3,
}

pub struct AmbientField {
    motes: Vec<Mote>,
    sprites: Vec<NodeId>,
    color: Color,
    opacity: f32,
    /// Radians around Y
    rotation: f32,
    active: bool,
    burst: ScheduledTask,
    rng: StdRng,
}

impl AmbientField {
    pub fn new(count: usize) -> Self {
        Self::with_rng(count, StdRng::from_entropy())
    }

    pub fn with_seed(count: usize, seed: u64) -> Self {
        Self::with_rng(count, StdRng::seed_from_u64(seed))
    }

    fn with_rng(count: usize, mut rng: StdRng) -> Self {
        let motes = (0..count)
            .map(|_| Mote {
                position: Vec3::new(
                    (rng.gen::<f32>() - 0.5) * 2.0,
                    rng.gen::<f32>() * 2.0,
                    (rng.gen::<f32>() - 0.5) * 2.0,
                ),
                velocity: Vec3::new(
                    (rng.gen::<f32>() - 0.5) * 1.2,
                    rng.gen::<f32>() * 1.2 + 0.6,
                    (rng.gen::<f32>() - 0.5) * 1.2,
                ),
            })
            .collect();
        Self {
            motes,
            sprites: Vec::new(),
            color: Color::from_hex(0xffb3d9),
            opacity: OPACITY,
            rotation: 0.0,
            active: false,
            burst: ScheduledTask::idle(),
            rng,
        }
    }

    pub fn attach_to(&mut self, graph: &mut SceneGraph) {
        if !self.sprites.is_empty() {
            return;
        }
        let (color, opacity) = (self.color, self.opacity);
        self.sprites = self
            .motes
            .iter()
            .map(|m| {
                let mut sprite = Sprite::new(m.position, color, SPRITE_SIZE);
                sprite.opacity = opacity;
                sprite.visible = false;
                graph.insert_sprite(sprite)
            })
            .collect();
    }

    pub fn detach(&mut self, graph: &mut SceneGraph) {
        for id in self.sprites.drain(..) {
            graph.remove(id);
        }
        self.active = false;
        self.burst.cancel();
    }

    /// Show the field in `color`
    pub fn start(&mut self, color: Color) {
        self.color = color;
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// True while the evolution flash is showing
    pub fn is_flashing(&self) -> bool {
        self.burst.is_active()
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Flash the field white at full opacity, then hide it
    pub fn evolution_burst(&mut self) {
        self.opacity = 1.0;
        self.color = Color::WHITE;
        self.active = true;
        self.burst.schedule(EVOLUTION_BURST_SECONDS);
    }

    pub fn update(&mut self, dt: f32, graph: &mut SceneGraph) {
        if self.burst.tick(dt) {
            self.opacity = OPACITY;
            self.stop();
        }

        if self.active {
            for m in &mut self.motes {
                m.position += m.velocity * dt;
                if m.position.y > CEILING {
                    m.position = Vec3::new((self.rng.gen::<f32>() - 0.5) * 2.0, 0.0, (self.rng.gen::<f32>() - 0.5) * 2.0);
                }
            }
            self.rotation += dt * SPIN;
        }

        let (sin, cos) = self.rotation.sin_cos();
        for (m, &id) in self.motes.iter().zip(&self.sprites) {
            if let Some(sprite) = graph.sprite_mut(id) {
                sprite.visible = self.active;
                let p = m.position;
                sprite.position = Vec3::new(p.x * cos + p.z * sin, p.y, -p.x * sin + p.z * cos);
                sprite.color = self.color;
                sprite.opacity = self.opacity;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visible(graph: &SceneGraph) -> usize {
        graph.iter().filter(|(_, n)| n.is_visible()).count()
    }

    #[test]
    fn test_start_and_stop_toggle_sprites() {
        let mut graph = SceneGraph::new();
        let mut field = AmbientField::with_seed(50, 1);
        field.attach_to(&mut graph);
        field.update(0.016, &mut graph);
        assert_eq!(visible(&graph), 0);

        field.start(Color::from_hex(0x9999ff));
        field.update(0.016, &mut graph);
        assert_eq!(visible(&graph), 50);
        let (_, node) = graph.iter().next().expect("sprite");
        assert!(matches!(node, crate::scene::Node::Sprite(s) if s.color == Color::from_hex(0x9999ff)));

        field.stop();
        field.update(0.016, &mut graph);
        assert_eq!(visible(&graph), 0);
    }

    #[test]
    fn test_motes_stay_below_ceiling() {
        let mut graph = SceneGraph::new();
        let mut field = AmbientField::with_seed(50, 2);
        field.attach_to(&mut graph);
        field.start(Color::WHITE);
        for _ in 0..300 {
            field.update(0.05, &mut graph);
            assert!(field.motes.iter().all(|m| m.position.y <= CEILING));
        }
    }

    #[test]
    fn test_evolution_burst_expires() {
        let mut graph = SceneGraph::new();
        let mut field = AmbientField::with_seed(10, 3);
        field.attach_to(&mut graph);
        field.evolution_burst();
        field.update(1.0, &mut graph);
        assert_eq!(field.opacity(), 1.0);
        assert_eq!(field.color(), Color::WHITE);
        assert!(field.is_active() && field.is_flashing());

        field.update(2.5, &mut graph);
        assert!(!field.is_active() && !field.is_flashing());
        assert_eq!(field.opacity(), OPACITY);
    }
}
