//! Floating icons
//!
//! Short-lived sprites that pop up above the companion after an action or
//! a click, rise two units and fade out over a second and a half, then
//! leave the scene.

use serde::{Deserialize, Serialize};

use crate::rasterizer::{Color, Vec3};
use crate::scene::{NodeId, SceneGraph, Sprite};

const LIFETIME: f32 = 1.5;
const RISE: f32 = 2.0;
const START_HEIGHT: f32 = 1.0;
const SIZE: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Icon {
    Heart,
    Food,
    Game,
    Sleep,
    Map,
}

impl Icon {
    /// Sprite tint for the icon
    pub fn color(self) -> Color {
        match self {
            Icon::Heart => Color::from_hex(0xff4d6d),
            Icon::Food => Color::from_hex(0xff8a50),
            Icon::Game => Color::from_hex(0xffc107),
            Icon::Sleep => Color::from_hex(0x9575cd),
            Icon::Map => Color::from_hex(0x42a5f5),
        }
    }
}

struct Floating {
    node: NodeId,
    start_y: f32,
    elapsed: f32,
}

#[derive(Default)]
pub struct FloatingIcons {
    live: Vec<Floating>,
}

impl FloatingIcons {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `icon` one unit above `position`
    pub fn show(&mut self, icon: Icon, position: Vec3, graph: &mut SceneGraph) -> NodeId {
        let at = position + Vec3::new(0.0, START_HEIGHT, 0.0);
        let node = graph.insert_sprite(Sprite::new(at, icon.color(), SIZE));
        self.live.push(Floating {
            node,
            start_y: at.y,
            elapsed: 0.0,
        });
        node
    }

    pub fn update(&mut self, dt: f32, graph: &mut SceneGraph) {
        self.live.retain_mut(|f| {
            f.elapsed += dt;
            let progress = f.elapsed / LIFETIME;
            if progress >= 1.0 {
                graph.remove(f.node);
                return false;
            }
            match graph.sprite_mut(f.node) {
                Some(sprite) => {
                    sprite.position.y = f.start_y + progress * RISE;
                    sprite.opacity = 1.0 - progress;
                    true
                }
                // Removed by someone else
                None => false,
            }
        });
    }

    /// Remove every icon from the graph
    pub fn clear(&mut self, graph: &mut SceneGraph) {
        for f in self.live.drain(..) {
            graph.remove(f.node);
        }
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icon_rises_fades_and_leaves() {
        let mut graph = SceneGraph::new();
        let mut icons = FloatingIcons::new();
        let id = icons.show(Icon::Heart, Vec3::new(0.0, 0.5, 0.0), &mut graph);
        assert_eq!(graph.sprite(id).map(|s| s.position.y), Some(1.5));

        icons.update(0.75, &mut graph);
        let sprite = graph.sprite(id).expect("alive");
        assert!((sprite.position.y - 2.5).abs() < 1e-5);
        assert!((sprite.opacity - 0.5).abs() < 1e-5);

        icons.update(0.75, &mut graph);
        assert!(!graph.contains(id));
        assert!(icons.is_empty());
    }

    #[test]
    fn test_icons_parse_from_ron() {
        let icon: Icon = ron::from_str("Food").expect("parse");
        assert_eq!(icon, Icon::Food);
    }
}
