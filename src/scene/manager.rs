//! Scene Manager
//!
//! Owns the framebuffer, camera, lights and scene graph of one companion
//! view, and runs its frame loop:
//! 1. compute the frame delta (clamped)
//! 2. pick up surface size changes
//! 3. call every update callback in registration order
//! 4. render once and present
//!
//! The loop is driven by the host calling `frame(now)`; `start`/`stop`
//! only gate whether those calls do anything.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tracing::{debug, error, info, warn};

use super::graph::{NodeId, SceneGraph};
use super::node::{Model, Node};
use super::surface::RenderSurface;
use crate::config::SceneConfig;
use crate::error::{CompanionError, CompanionResult};
use crate::rasterizer::{
    mat4_transform_point, ndc_to_ray, ray_triangle_intersect, render_mesh, Camera, Color, Framebuffer, Light,
    RasterSettings, RasterStats, Vec3,
};

/// Longest step a single frame may advance effects by
pub const MAX_FRAME_DELTA: f32 = 0.1;

/// Everything an update callback may touch
pub struct SceneContext {
    pub graph: SceneGraph,
    pub camera: Camera,
    pub settings: RasterSettings,
    pub background: Color,
    /// The node currently shown as the companion
    pub companion: Option<NodeId>,
    /// Seconds of scene time since init
    pub time: f32,
}

impl SceneContext {
    /// Empty scene with the configured camera and lights
    pub fn new(config: &SceneConfig, aspect: f32) -> Self {
        let mut camera = Camera::new(config.fov, aspect, config.camera_position, config.look_at);
        camera.look_at(config.look_at);
        Self {
            graph: SceneGraph::new(),
            camera,
            settings: lights_from_config(config),
            background: config.background,
            companion: None,
            time: 0.0,
        }
    }
}

pub type UpdateCallback = Box<dyn FnMut(f32, &mut SceneContext) -> CompanionResult<()>>;

/// Handle returned by `on_update`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// One hit from `raycast`
#[derive(Debug, Clone, PartialEq)]
pub struct RaycastHit {
    pub node: NodeId,
    pub part: String,
    pub point: Vec3,
    pub distance: f32,
}

/// What `dispose` released
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DisposeReport {
    pub nodes: usize,
    pub geometries: usize,
    pub materials: usize,
    pub callbacks: usize,
}

pub struct SceneManager {
    ctx: SceneContext,
    fb: Framebuffer,
    surface: Option<Box<dyn RenderSurface>>,
    callbacks: Vec<(CallbackId, UpdateCallback)>,
    next_callback: u64,
    running: bool,
    disposed: bool,
    last_time: Option<f64>,
    last_stats: RasterStats,
}

/// Build the light set from config; directional lights shine toward the origin
pub fn lights_from_config(config: &SceneConfig) -> RasterSettings {
    let directional = |def: &crate::config::LightDef| Light::directional(def.position, def.color, def.intensity);
    RasterSettings {
        ambient_color: config.ambient.color,
        ambient: config.ambient.intensity,
        lights: vec![directional(&config.key_light), directional(&config.rim_light)],
        ..RasterSettings::default()
    }
}

impl SceneManager {
    /// Bind a new view to `surface`.
    ///
    /// Fails with `RenderingUnavailable` when the surface cannot host 3D.
    pub fn init(surface: Box<dyn RenderSurface>, config: &SceneConfig) -> CompanionResult<Self> {
        if !surface.is_available() {
            return Err(CompanionError::RenderingUnavailable("surface reports no 3D support".into()));
        }
        let (width, height) = surface.size();
        if width == 0 || height == 0 {
            return Err(CompanionError::RenderingUnavailable(format!(
                "surface has no drawable area ({}x{})",
                width, height
            )));
        }

        info!(width, height, "scene initialized");

        Ok(Self {
            ctx: SceneContext::new(config, width as f32 / height as f32),
            fb: Framebuffer::new(width, height),
            surface: Some(surface),
            callbacks: Vec::new(),
            next_callback: 0,
            running: false,
            disposed: false,
            last_time: None,
            last_stats: RasterStats::default(),
        })
    }

    // =========================================================================
    // Loop control
    // =========================================================================

    pub fn start(&mut self) {
        if self.running || self.disposed {
            return;
        }
        self.running = true;
        self.last_time = None;
        debug!("frame loop started");
    }

    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        debug!("frame loop stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Run one frame at host time `now` (seconds). Returns false when the
    /// loop is stopped or the scene is disposed.
    pub fn frame(&mut self, now: f64) -> bool {
        if !self.running || self.disposed {
            return false;
        }
        let dt = match self.last_time {
            Some(last) => ((now - last) as f32).clamp(0.0, MAX_FRAME_DELTA),
            None => 0.0,
        };
        self.last_time = Some(now);
        self.step(dt);
        true
    }

    /// Advance by `dt` seconds, run callbacks, render and present
    pub fn step(&mut self, dt: f32) {
        if self.disposed {
            return;
        }

        if let Some((w, h)) = self.surface.as_mut().and_then(|s| s.take_resize()) {
            self.resize(w, h);
        }

        self.ctx.time += dt;
        self.run_callbacks(dt);
        self.render();

        if let Some(surface) = self.surface.as_mut() {
            surface.present(&self.fb);
        }
    }

    fn run_callbacks(&mut self, dt: f32) {
        let ctx = &mut self.ctx;
        for (id, cb) in self.callbacks.iter_mut() {
            match catch_unwind(AssertUnwindSafe(|| cb(dt, ctx))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(callback = id.0, error = %e, "update callback failed"),
                Err(_) => error!(callback = id.0, "update callback panicked"),
            }
        }
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    pub fn on_update(
        &mut self,
        cb: impl FnMut(f32, &mut SceneContext) -> CompanionResult<()> + 'static,
    ) -> CallbackId {
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        self.callbacks.push((id, Box::new(cb)));
        id
    }

    /// Returns false if the id was not registered
    pub fn off_update(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        self.callbacks.len() != before
    }

    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    // =========================================================================
    // Scene access
    // =========================================================================

    pub fn context(&self) -> &SceneContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut SceneContext {
        &mut self.ctx
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.fb
    }

    pub fn last_stats(&self) -> RasterStats {
        self.last_stats
    }

    /// Insert a model and make it the companion node
    pub fn set_companion_model(&mut self, model: Model) -> NodeId {
        if let Some(old) = self.ctx.companion.take() {
            self.ctx.graph.remove(old);
        }
        let id = self.ctx.graph.insert_model(model);
        self.ctx.companion = Some(id);
        id
    }

    pub fn companion(&self) -> Option<NodeId> {
        self.ctx.companion.filter(|id| self.ctx.graph.contains(*id))
    }

    // =========================================================================
    // Resize / picking
    // =========================================================================

    pub fn resize(&mut self, width: usize, height: usize) {
        if width == 0 || height == 0 {
            warn!(width, height, "ignoring zero-sized resize");
            return;
        }
        self.ctx.camera.set_aspect(width as f32 / height as f32);
        self.fb.resize(width, height);
        debug!(width, height, "scene resized");
    }

    /// Hits against the companion node only, nearest first.
    /// `ndc_x`/`ndc_y` are in -1..1 with +y up.
    pub fn raycast(&self, ndc_x: f32, ndc_y: f32) -> Vec<RaycastHit> {
        let Some(id) = self.companion() else {
            return Vec::new();
        };
        raycast_model(&self.ctx, id, ndc_x, ndc_y)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    fn render(&mut self) {
        let ctx = &self.ctx;
        self.fb.clear(ctx.background);
        let mut stats = RasterStats::default();

        let mut sprites = Vec::new();
        for (_, node) in ctx.graph.iter() {
            match node {
                Node::Model(model) if model.visible => {
                    for part in model.parts.iter().filter(|p| p.visible) {
                        let vertices = model.world_vertices(part);
                        let s = render_mesh(
                            &mut self.fb,
                            &vertices,
                            &part.mesh.faces,
                            &part.material,
                            &ctx.camera,
                            &ctx.settings,
                        );
                        stats.triangles_in += s.triangles_in;
                        stats.triangles_drawn += s.triangles_drawn;
                        stats.pixels_written += s.pixels_written;
                    }
                }
                Node::Sprite(sprite) if sprite.visible && sprite.opacity > 0.0 => {
                    sprites.push(sprite);
                }
                _ => {}
            }
        }

        // Sprites after geometry, far to near
        let (w, h) = (self.fb.width, self.fb.height);
        let tan = ctx.camera.tan_half_fov();
        let mut projected: Vec<_> = sprites
            .into_iter()
            .filter_map(|s| ctx.camera.world_to_screen(s.position, w, h).map(|p| (p, s)))
            .collect();
        projected.sort_by(|a, b| b.0.z.total_cmp(&a.0.z));
        for (p, s) in projected {
            let half = s.size * 0.5 * (h as f32 * 0.5) / (p.z * tan);
            stats.pixels_written += self.fb.draw_sprite(p.x, p.y, half, p.z, s.color, s.opacity);
        }

        self.last_stats = stats;
    }

    // =========================================================================
    // Teardown
    // =========================================================================

    /// Stop the loop and release everything the scene holds. Safe to call twice.
    pub fn dispose(&mut self) -> DisposeReport {
        if self.disposed {
            return DisposeReport::default();
        }
        self.stop();

        let mut report = DisposeReport {
            callbacks: self.callbacks.len(),
            ..Default::default()
        };
        self.callbacks.clear();

        for node in self.ctx.graph.drain() {
            let (geometries, materials) = node.resource_count();
            report.nodes += 1;
            report.geometries += geometries;
            report.materials += materials;
        }
        self.ctx.companion = None;
        self.surface = None;
        self.fb = Framebuffer::new(0, 0);
        self.disposed = true;

        info!(
            nodes = report.nodes,
            geometries = report.geometries,
            materials = report.materials,
            "scene disposed"
        );
        report
    }
}

/// Ray against every visible part of one model, nearest hit first
pub fn raycast_model(ctx: &SceneContext, id: NodeId, ndc_x: f32, ndc_y: f32) -> Vec<RaycastHit> {
    let Some(model) = ctx.graph.model(id) else {
        return Vec::new();
    };
    if !model.visible {
        return Vec::new();
    }
    let ray = ndc_to_ray(ndc_x, ndc_y, &ctx.camera);

    let mut hits = Vec::new();
    for part in model.parts.iter().filter(|p| p.visible) {
        let m = model.part_world_matrix(part);
        let world: Vec<Vec3> = part.mesh.vertices.iter().map(|v| mat4_transform_point(&m, v.pos)).collect();
        let nearest = part
            .mesh
            .faces
            .iter()
            .filter_map(|f| {
                let (a, b, c) = (world.get(f.v0)?, world.get(f.v1)?, world.get(f.v2)?);
                ray_triangle_intersect(ray.origin, ray.direction, *a, *b, *c)
            })
            .min_by(|a, b| a.total_cmp(b));
        if let Some(t) = nearest {
            hits.push(RaycastHit {
                node: id,
                part: part.name.clone(),
                point: ray.at(t),
                distance: t,
            });
        }
    }
    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{StageId, CompanionConfig};
    use crate::resource::placeholder::build_placeholder;
    use crate::scene::surface::HeadlessSurface;
    use std::cell::Cell;
    use std::rc::Rc;

    fn manager() -> SceneManager {
        SceneManager::init(Box::new(HeadlessSurface::new(160, 120)), &SceneConfig::default()).expect("init")
    }

    fn baby_model() -> Model {
        let config = CompanionConfig::default();
        let stage = config.stage(&StageId::from("baby")).cloned().expect("stage");
        let mut model = build_placeholder(&stage, 0, &config.shading);
        model.ground_center();
        model
    }

    #[test]
    fn test_unavailable_surface_is_rejected() {
        let result = SceneManager::init(Box::new(HeadlessSurface::unavailable()), &SceneConfig::default());
        assert!(matches!(result, Err(CompanionError::RenderingUnavailable(_))));
    }

    #[test]
    fn test_callbacks_run_in_order_without_model() {
        let mut scene = manager();
        let log = Rc::new(std::cell::RefCell::new(Vec::new()));
        for tag in 0..3 {
            let log = log.clone();
            scene.on_update(move |_, _| {
                log.borrow_mut().push(tag);
                Ok(())
            });
        }
        scene.start();
        assert!(scene.frame(0.0));
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_stopped_loop_does_nothing() {
        let mut scene = manager();
        let calls = Rc::new(Cell::new(0));
        let c = calls.clone();
        scene.on_update(move |_, _| {
            c.set(c.get() + 1);
            Ok(())
        });
        assert!(!scene.frame(0.0));
        scene.start();
        scene.start();
        scene.frame(0.0);
        scene.stop();
        scene.stop();
        scene.frame(1.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_frame_delta_is_clamped() {
        let mut scene = manager();
        let seen = Rc::new(Cell::new(0.0f32));
        let s = seen.clone();
        scene.on_update(move |dt, _| {
            s.set(dt);
            Ok(())
        });
        scene.start();
        scene.frame(10.0);
        assert_eq!(seen.get(), 0.0);
        scene.frame(15.0);
        assert_eq!(seen.get(), MAX_FRAME_DELTA);
        scene.frame(15.016);
        assert!((seen.get() - 0.016).abs() < 1e-4);
    }

    #[test]
    fn test_failing_callback_does_not_stop_others() {
        let mut scene = manager();
        let calls = Rc::new(Cell::new(0));
        scene.on_update(|_, _| Err(CompanionError::sequence("boom")));
        scene.on_update(|_, _| panic!("callback panic"));
        let c = calls.clone();
        scene.on_update(move |_, _| {
            c.set(c.get() + 1);
            Ok(())
        });
        scene.start();
        scene.frame(0.0);
        scene.frame(0.016);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_off_update_removes_callback() {
        let mut scene = manager();
        let id = scene.on_update(|_, _| Ok(()));
        assert_eq!(scene.callback_count(), 1);
        assert!(scene.off_update(id));
        assert!(!scene.off_update(id));
        assert_eq!(scene.callback_count(), 0);
    }

    #[test]
    fn test_surface_resize_updates_camera() {
        let surface = HeadlessSurface::new(160, 120);
        let handle = surface.handle();
        let mut scene = SceneManager::init(Box::new(surface), &SceneConfig::default()).expect("init");
        handle.request_resize(200, 100);
        scene.start();
        scene.frame(0.0);
        assert_eq!(scene.framebuffer().width, 200);
        assert!((scene.context().camera.aspect - 2.0).abs() < 1e-5);
        assert_eq!(handle.presents(), 1);
    }

    #[test]
    fn test_renders_companion() {
        let mut scene = manager();
        scene.set_companion_model(baby_model());
        scene.start();
        scene.frame(0.0);
        assert!(scene.last_stats().triangles_drawn > 0);
    }

    #[test]
    fn test_raycast_hits_companion_only() {
        let mut scene = manager();
        assert!(scene.raycast(0.0, 0.0).is_empty());

        let id = scene.set_companion_model(baby_model());
        // Camera looks at (0, 1, 0); aim a little lower at the body
        let cam = scene.context().camera.clone();
        let body_center = Vec3::new(0.0, 0.45, 0.0);
        let s = cam.world_to_screen(body_center, 160, 120).expect("visible");
        let (nx, ny) = crate::rasterizer::screen_to_ndc(s.x, s.y, 160, 120);

        let hits = scene.raycast(nx, ny);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.node == id));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
        assert!(scene.raycast(0.99, 0.99).is_empty());
    }

    #[test]
    fn test_dispose_twice() {
        let mut scene = manager();
        scene.set_companion_model(baby_model());
        scene.on_update(|_, _| Ok(()));
        scene.start();

        let first = scene.dispose();
        assert_eq!(first.nodes, 1);
        assert!(first.geometries > 0);
        assert_eq!(first.callbacks, 1);

        let second = scene.dispose();
        assert_eq!(second, DisposeReport::default());
        assert_eq!(scene.callback_count(), 0);
        assert!(!scene.frame(1.0));
    }
}
