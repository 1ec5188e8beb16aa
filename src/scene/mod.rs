//! Scene graph and frame loop
//!
//! - `node` - Transform, Mesh, MeshPart, Model, Sprite
//! - `graph` - generational node arena
//! - `surface` - RenderSurface trait and the headless surface
//! - `manager` - SceneManager: camera, lights, callbacks, rendering, picking

pub mod graph;
pub mod manager;
pub mod node;
pub mod surface;

pub use graph::{NodeId, SceneGraph};
pub use manager::{CallbackId, DisposeReport, RaycastHit, SceneContext, SceneManager, MAX_FRAME_DELTA};
pub use node::{Mesh, MeshPart, Model, Node, Property, Sprite, Transform};
pub use surface::{HeadlessHandle, HeadlessSurface, RenderSurface};
