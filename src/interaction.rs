//! Pointer interaction
//!
//! Hit-tests the pointer against the visible models in the scene and
//! reports hover changes and clicks through handlers installed with
//! `attach`. Hover fires once per change of the hovered part, including
//! the change to nothing; a click only fires while something is hovered.
//! Sprites are never picked.

use tracing::debug;

use crate::rasterizer::Vec3;
use crate::scene::manager::raycast_model;
use crate::scene::{Node, NodeId, RaycastHit, SceneContext};

pub type HoverHandler = Box<dyn FnMut(Option<&RaycastHit>)>;
pub type ClickHandler = Box<dyn FnMut(NodeId, Vec3)>;

struct Handlers {
    on_hover: HoverHandler,
    on_click: ClickHandler,
}

#[derive(Default)]
pub struct Raycaster {
    handlers: Option<Handlers>,
    hovered: Option<RaycastHit>,
}

impl Raycaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the handlers; replaces any installed earlier
    pub fn attach(
        &mut self,
        on_hover: impl FnMut(Option<&RaycastHit>) + 'static,
        on_click: impl FnMut(NodeId, Vec3) + 'static,
    ) {
        self.handlers = Some(Handlers {
            on_hover: Box::new(on_hover),
            on_click: Box::new(on_click),
        });
    }

    pub fn is_attached(&self) -> bool {
        self.handlers.is_some()
    }

    pub fn hovered(&self) -> Option<&RaycastHit> {
        self.hovered.as_ref()
    }

    /// Nearest hit on any visible model
    pub fn cast(ctx: &SceneContext, ndc_x: f32, ndc_y: f32) -> Option<RaycastHit> {
        ctx.graph
            .iter()
            .filter(|(_, node)| matches!(node, Node::Model(m) if m.visible))
            .flat_map(|(id, _)| raycast_model(ctx, id, ndc_x, ndc_y))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Pointer moved to (`ndc_x`, `ndc_y`). Returns true if the hover changed.
    pub fn pointer_move(&mut self, ctx: &SceneContext, ndc_x: f32, ndc_y: f32) -> bool {
        let Some(handlers) = self.handlers.as_mut() else {
            return false;
        };

        let hit = Self::cast(ctx, ndc_x, ndc_y);
        let same = match (&self.hovered, &hit) {
            (Some(a), Some(b)) => a.node == b.node && a.part == b.part,
            (None, None) => true,
            _ => false,
        };
        if same {
            // Keep the latest point for the click
            if hit.is_some() {
                self.hovered = hit;
            }
            return false;
        }

        self.hovered = hit;
        (handlers.on_hover)(self.hovered.as_ref());
        true
    }

    /// Returns true if a click handler ran
    pub fn click(&mut self) -> bool {
        let (Some(handlers), Some(hit)) = (self.handlers.as_mut(), self.hovered.as_ref()) else {
            return false;
        };
        (handlers.on_click)(hit.node, hit.point);
        true
    }

    /// Drop the handlers. Safe if never attached.
    pub fn dispose(&mut self) {
        if self.handlers.take().is_some() {
            debug!("pointer handlers removed");
        }
        self.hovered = None;
    }
}
