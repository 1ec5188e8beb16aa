//! Companion Manager
//!
//! Top-level owner of one companion view. `init` builds the scene and
//! wires every component into its frame loop; the host then drives it with
//! `frame`, pointer input and companion snapshots, and receives
//! `CompanionEvent`s through listeners once per frame.
//!
//! Frame callbacks run in this order:
//! 1. evolution + animation (poses the model, may request camera moves)
//! 2. camera rig
//! 3. particle bursts
//! 4. ambient field
//! 5. floating icons

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::camera_rig::{CameraRig, DEFAULT_DOLLY_SECONDS};
use crate::config::{CompanionConfig, Level, StageId, DEFAULT_MOOD};
use crate::effects::{AmbientField, CuePlayer, FloatingIcons, Icon, ParticlePool, SoundCues, DEFAULT_VOLUME};
use crate::error::{CompanionError, CompanionResult};
use crate::event::{CompanionEvent, EventQueue, ListenerId, Listeners};
use crate::evolution::{EvolutionController, EvolutionEffects, EvolutionOutcome, EvolutionReady};
use crate::interaction::Raycaster;
use crate::rasterizer::{screen_to_ndc, Color, Vec3};
use crate::scene::{CallbackId, NodeId, RenderSurface, SceneManager};
use crate::task::Completion;

/// Where bursts appear relative to the model origin
const BURST_HEIGHT: f32 = 0.5;

/// The part of the game state the view needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionSnapshot {
    pub mood: String,
    pub evolution_stage: StageId,
    pub level: Level,
}

impl CompanionSnapshot {
    pub fn new(mood: impl Into<String>, evolution_stage: impl Into<StageId>, level: Level) -> Self {
        Self {
            mood: mood.into(),
            evolution_stage: evolution_stage.into(),
            level,
        }
    }
}

impl Default for CompanionSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_MOOD, "baby", 1)
    }
}

type Shared<T> = Rc<RefCell<T>>;

fn shared<T>(value: T) -> Shared<T> {
    Rc::new(RefCell::new(value))
}

/// Everything that exists only while the view is up
struct View {
    scene: SceneManager,
    evolution: Shared<EvolutionController>,
    rig: Shared<CameraRig>,
    particles: Shared<ParticlePool>,
    ambient: Shared<AmbientField>,
    icons: Shared<FloatingIcons>,
    raycaster: Raycaster,
    /// Points reported by the raycaster's click handler
    clicks: Shared<Vec<Vec3>>,
    callbacks: Vec<CallbackId>,
}

pub struct CompanionManager {
    config: CompanionConfig,
    view: Option<View>,
    events: Shared<EventQueue<CompanionEvent>>,
    listeners: Listeners<CompanionEvent>,
    cues: SoundCues,
    seed: Option<u64>,
}

impl CompanionManager {
    pub fn new(config: CompanionConfig) -> Self {
        let mut cues = SoundCues::silent();
        for cue in config.actions.values().filter_map(|a| a.cue.as_ref()).chain(config.click.cue.as_ref()) {
            cues.register(cue.clone());
        }
        cues.set_enabled(config.features.sound);
        Self {
            config,
            view: None,
            events: shared(EventQueue::new()),
            listeners: Listeners::new(),
            cues,
            seed: None,
        }
    }

    /// Seed every random source, for tests
    pub fn with_seed(config: CompanionConfig, seed: u64) -> Self {
        let mut manager = Self::new(config);
        manager.seed = Some(seed);
        manager
    }

    /// Route cues to `player`, keeping the registered names
    pub fn set_cue_player(&mut self, player: Box<dyn CuePlayer>) {
        let mut cues = SoundCues::new(player);
        for cue in self.config.actions.values().filter_map(|a| a.cue.as_ref()).chain(self.config.click.cue.as_ref()) {
            cues.register(cue.clone());
        }
        cues.set_enabled(self.cues.is_enabled());
        self.cues = cues;
    }

    pub fn config(&self) -> &CompanionConfig {
        &self.config
    }

    /// Whether `surface` can host the 3D view at all
    pub fn is_3d_available(surface: &dyn RenderSurface) -> bool {
        let (w, h) = surface.size();
        surface.is_available() && w > 0 && h > 0
    }

    pub fn is_initialized(&self) -> bool {
        self.view.is_some()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Build the view on `surface` and start its frame loop. A second call
    /// while initialized only logs a warning.
    pub fn init(&mut self, surface: Box<dyn RenderSurface>, snapshot: &CompanionSnapshot) -> CompanionResult<()> {
        if self.view.is_some() {
            warn!("companion view already initialized");
            return Ok(());
        }
        info!(stage = %snapshot.evolution_stage, mood = %snapshot.mood, "initializing companion view");

        let mut scene = SceneManager::init(surface, &self.config.scene)?;
        let seed = self.seed;

        let mut particles = match seed {
            Some(s) => ParticlePool::with_seed(self.config.particle_capacity, s),
            None => ParticlePool::new(self.config.particle_capacity),
        };
        let mut ambient = match seed {
            Some(s) => AmbientField::with_seed(self.config.ambient_particles, s.wrapping_add(1)),
            None => AmbientField::new(self.config.ambient_particles),
        };
        let rig = match seed {
            Some(s) => CameraRig::with_seed(s.wrapping_add(2)),
            None => CameraRig::new(),
        };
        let mut evolution = match seed {
            Some(s) => EvolutionController::with_seed(&self.config, s.wrapping_add(3)),
            None => EvolutionController::new(&self.config),
        };

        let stage = if self.config.stage(&snapshot.evolution_stage).is_some() {
            snapshot.evolution_stage.clone()
        } else {
            let first = self.config.first_stage().map(|s| s.id.clone()).ok_or_else(|| CompanionError::config("no stages"))?;
            warn!(stage = %snapshot.evolution_stage, fallback = %first, "unknown stage, starting from the first one");
            first
        };

        let ctx = scene.context_mut();
        particles.attach_to(&mut ctx.graph);
        ambient.attach_to(&mut ctx.graph);
        evolution.init(&stage, ctx)?;
        evolution.set_mood(&snapshot.mood);
        if self.config.features.particles {
            ambient.start(self.config.mood_color(&snapshot.mood));
        }

        let mut view = View {
            scene,
            evolution: shared(evolution),
            rig: shared(rig),
            particles: shared(particles),
            ambient: shared(ambient),
            icons: shared(FloatingIcons::new()),
            raycaster: Raycaster::new(),
            clicks: shared(Vec::new()),
            callbacks: Vec::new(),
        };
        self.register_callbacks(&mut view);

        let events = self.events.clone();
        let clicks = view.clicks.clone();
        view.raycaster.attach(
            move |hit| events.borrow_mut().send(CompanionEvent::Hover { hovering: hit.is_some() }),
            move |_, point| clicks.borrow_mut().push(point),
        );

        view.scene.start();
        self.view = Some(view);
        info!("companion view ready");
        Ok(())
    }

    fn register_callbacks(&self, view: &mut View) {
        let scene = &mut view.scene;

        let (evolution, rig, particles) = (view.evolution.clone(), view.rig.clone(), view.particles.clone());
        let events = self.events.clone();
        let home = self.config.scene.camera_position;
        view.callbacks.push(scene.on_update(move |dt, ctx| {
            let mut evolution = evolution.borrow_mut();
            let mut rig = rig.borrow_mut();
            let mut particles = particles.borrow_mut();
            let mut fx = EvolutionEffects {
                scene: ctx,
                rig: &mut *rig,
                particles: &mut *particles,
            };
            if let Some(EvolutionOutcome::Complete { stage, .. }) = evolution.update(dt, &mut fx) {
                rig.dolly_to(home, DEFAULT_DOLLY_SECONDS);
                events.borrow_mut().send(CompanionEvent::EvolutionComplete { stage });
            }
            Ok(())
        }));

        let rig = view.rig.clone();
        view.callbacks.push(scene.on_update(move |dt, ctx| {
            rig.borrow_mut().update(dt, &mut ctx.camera);
            Ok(())
        }));

        let particles = view.particles.clone();
        view.callbacks.push(scene.on_update(move |dt, ctx| {
            particles.borrow_mut().update(dt, &mut ctx.graph);
            Ok(())
        }));

        let ambient = view.ambient.clone();
        view.callbacks.push(scene.on_update(move |dt, ctx| {
            ambient.borrow_mut().update(dt, &mut ctx.graph);
            Ok(())
        }));

        let icons = view.icons.clone();
        view.callbacks.push(scene.on_update(move |dt, ctx| {
            icons.borrow_mut().update(dt, &mut ctx.graph);
            Ok(())
        }));
    }

    /// Tear the view down, last-built first. Safe to call any number of times.
    pub fn dispose(&mut self) {
        let Some(mut view) = self.view.take() else {
            return;
        };
        info!("disposing companion view");

        view.raycaster.dispose();
        for id in view.callbacks.drain(..).rev() {
            view.scene.off_update(id);
        }

        let graph = &mut view.scene.context_mut().graph;
        view.icons.borrow_mut().clear(graph);
        view.ambient.borrow_mut().detach(graph);
        view.evolution.borrow_mut().dispose();
        view.rig.borrow_mut().reset(&mut view.scene.context_mut().camera);
        view.particles.borrow_mut().detach(&mut view.scene.context_mut().graph);
        view.scene.dispose();

        self.events.borrow_mut().clear();
        info!("companion view disposed");
    }

    // =========================================================================
    // Frame loop
    // =========================================================================

    /// One frame at host time `now` (seconds), then deliver queued events.
    /// Returns false when there is no running view.
    pub fn frame(&mut self, now: f64) -> bool {
        let ran = self.view.as_mut().is_some_and(|v| v.scene.frame(now));
        self.listeners.dispatch(&mut self.events.borrow_mut());
        ran
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&CompanionEvent) + 'static) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    // =========================================================================
    // Companion state
    // =========================================================================

    /// Apply a new snapshot: mood, ambient colour, and evolution if the
    /// level now belongs to another stage
    pub fn update_companion(&mut self, snapshot: &CompanionSnapshot) {
        let Some(view) = self.view.as_ref() else {
            return;
        };

        let ready = {
            let mut evolution = view.evolution.borrow_mut();
            evolution.set_mood(&snapshot.mood);
            evolution.check_evolution_ready(snapshot.level)
        };
        if self.config.features.particles {
            let mut ambient = view.ambient.borrow_mut();
            if !ambient.is_flashing() {
                ambient.start(self.config.mood_color(&snapshot.mood));
            }
        }

        if let Some(ready) = ready {
            self.trigger_evolution(ready);
        }
    }

    fn trigger_evolution(&mut self, ready: EvolutionReady) {
        let Some(view) = self.view.as_ref() else {
            return;
        };
        info!(from = %ready.from, to = %ready.to, "evolution triggered");

        let started = view.evolution.borrow_mut().begin_evolution(&ready.to);
        match started {
            Ok(()) => {
                if self.config.features.particles {
                    view.ambient.borrow_mut().evolution_burst();
                }
                self.events.borrow_mut().send(CompanionEvent::EvolutionStarted {
                    from: ready.from,
                    to: ready.to,
                });
            }
            Err(CompanionError::EvolutionInProgress) => debug!("evolution request ignored"),
            Err(e) => warn!(error = %e, "could not start evolution"),
        }
    }

    pub fn current_stage(&self) -> Option<StageId> {
        self.view.as_ref().map(|v| v.evolution.borrow().current_stage().clone())
    }

    pub fn is_evolving(&self) -> bool {
        self.view.as_ref().is_some_and(|v| v.evolution.borrow().is_evolving())
    }

    /// Node currently shown as the companion
    pub fn companion_node(&self) -> Option<NodeId> {
        self.view.as_ref().and_then(|v| v.scene.companion())
    }

    pub fn scene(&self) -> Option<&SceneManager> {
        self.view.as_ref().map(|v| &v.scene)
    }

    /// Registered frame callbacks; zero once disposed
    pub fn callback_count(&self) -> usize {
        self.view.as_ref().map_or(0, |v| v.scene.callback_count())
    }

    // =========================================================================
    // Actions and clicks
    // =========================================================================

    fn model_position(view: &View) -> Option<Vec3> {
        let ctx = view.scene.context();
        ctx.companion.and_then(|id| ctx.graph.model(id)).map(|m| m.transform.position)
    }

    /// Cue, icon and burst shared by actions and clicks
    fn feedback(&mut self, cue: Option<&str>, icon: Icon, color: Color) {
        let Some(view) = self.view.as_mut() else {
            return;
        };
        if let Some(cue) = cue {
            self.cues.play(cue, DEFAULT_VOLUME);
        }
        let Some(at) = Self::model_position(view) else {
            return;
        };
        let graph = &mut view.scene.context_mut().graph;
        view.icons.borrow_mut().show(icon, at, graph);
        if self.config.features.particles {
            view.particles.borrow_mut().burst(at + Vec3::new(0.0, BURST_HEIGHT, 0.0), color);
        }
    }

    /// Play a companion action ("feed", "play", ...). Names without an
    /// action entry are played as bare animations.
    pub fn play_action(&mut self, action: &str) -> Completion {
        let Some(view) = self.view.as_ref() else {
            return Completion::done();
        };
        debug!(action, "playing action");

        let Some(def) = self.config.actions.get(action).cloned() else {
            return view.evolution.borrow_mut().play_action(action);
        };
        let done = view.evolution.borrow_mut().play_action(&def.animation);
        self.feedback(def.cue.as_deref(), def.icon, def.color);
        done
    }

    fn react_to_click(&mut self) {
        let Some(view) = self.view.as_ref() else {
            return;
        };
        info!("companion clicked");
        let click = self.config.click.clone();
        view.evolution.borrow_mut().play_action(&click.reaction);
        self.feedback(click.cue.as_deref(), click.icon, click.color);
        self.events.borrow_mut().send(CompanionEvent::CompanionClicked);
    }

    fn to_ndc(view: &View, x: f32, y: f32) -> (f32, f32) {
        let fb = view.scene.framebuffer();
        screen_to_ndc(x, y, fb.width, fb.height)
    }

    /// Direct click at surface pixel (`x`, `y`). Returns true if it hit the
    /// companion.
    pub fn handle_click(&mut self, x: f32, y: f32) -> bool {
        let Some(view) = self.view.as_ref() else {
            return false;
        };
        let (nx, ny) = Self::to_ndc(view, x, y);
        if view.scene.raycast(nx, ny).is_empty() {
            return false;
        }
        self.react_to_click();
        true
    }

    /// Pointer moved to surface pixel (`x`, `y`)
    pub fn pointer_move(&mut self, x: f32, y: f32) {
        if let Some(view) = self.view.as_mut() {
            let (nx, ny) = Self::to_ndc(view, x, y);
            view.raycaster.pointer_move(view.scene.context(), nx, ny);
        }
    }

    /// Click at the last pointer position. Returns true if something was hit.
    pub fn pointer_click(&mut self) -> bool {
        let Some(view) = self.view.as_mut() else {
            return false;
        };
        if !view.raycaster.click() {
            return false;
        }
        let hits = view.clicks.borrow_mut().drain(..).count();
        for _ in 0..hits {
            self.react_to_click();
        }
        true
    }
}

impl Drop for CompanionManager {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::HeadlessSurface;
    use std::rc::Rc;

    fn manager() -> CompanionManager {
        let mut m = CompanionManager::with_seed(CompanionConfig::default(), 11);
        m.init(Box::new(HeadlessSurface::new(160, 120)), &CompanionSnapshot::default())
            .expect("init");
        m
    }

    fn recorder(m: &mut CompanionManager) -> Rc<RefCell<Vec<CompanionEvent>>> {
        let log: Rc<RefCell<Vec<CompanionEvent>>> = Rc::default();
        let l = log.clone();
        m.add_listener(move |e| l.borrow_mut().push(e.clone()));
        log
    }

    /// Surface pixel over the middle of the companion's body
    fn body_pixel(m: &CompanionManager) -> (f32, f32) {
        let scene = m.scene().expect("scene");
        let fb = scene.framebuffer();
        let p = scene
            .context()
            .camera
            .world_to_screen(Vec3::new(0.0, 0.7, 0.0), fb.width, fb.height)
            .expect("in view");
        (p.x, p.y)
    }

    #[test]
    fn test_unavailable_surface_fails_init() {
        let mut m = CompanionManager::new(CompanionConfig::default());
        let surface = HeadlessSurface::unavailable();
        assert!(!CompanionManager::is_3d_available(&surface));
        let result = m.init(Box::new(surface), &CompanionSnapshot::default());
        assert!(matches!(result, Err(CompanionError::RenderingUnavailable(_))));
        assert!(!m.is_initialized());
    }

    #[test]
    fn test_double_init_is_ignored() {
        let mut m = manager();
        let node = m.companion_node();
        m.init(Box::new(HeadlessSurface::new(64, 64)), &CompanionSnapshot::default())
            .expect("second init");
        assert_eq!(m.companion_node(), node);
        assert_eq!(m.callback_count(), 5);
    }

    #[test]
    fn test_evolution_end_to_end() {
        let mut m = manager();
        let log = recorder(&mut m);
        let baby = m.companion_node().expect("baby");

        let mut now = 0.0;
        for level in 1..=15 {
            m.update_companion(&CompanionSnapshot::new("happy", "baby", level));
            m.frame(now);
            now += 0.05;
        }
        assert!(!m.is_evolving());

        m.update_companion(&CompanionSnapshot::new("happy", "baby", 16));
        assert!(m.is_evolving());
        for _ in 0..4000 {
            m.frame(now);
            now += 0.05;
            if !m.is_evolving() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        // Deliver the completion queued by the last frame
        m.frame(now);

        let completes: Vec<_> = log
            .borrow()
            .iter()
            .filter_map(|e| match e {
                CompanionEvent::EvolutionComplete { stage } => Some(stage.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(completes, vec![StageId::from("teen")]);
        assert!(log.borrow().contains(&CompanionEvent::EvolutionStarted {
            from: "baby".into(),
            to: "teen".into(),
        }));

        let teen = m.companion_node().expect("teen");
        assert_ne!(teen, baby);
        let ctx = m.scene().expect("scene").context();
        assert!(!ctx.graph.contains(baby));
        assert_eq!(ctx.graph.model(teen).map(|model| model.stage.clone()), Some(StageId::from("teen")));
        assert_eq!(m.current_stage(), Some(StageId::from("teen")));

        m.update_companion(&CompanionSnapshot::new("happy", "teen", 16));
        assert!(!m.is_evolving());
    }

    #[test]
    fn test_dispose_twice_leaves_nothing_behind() {
        let mut m = manager();
        let view = m.view.as_ref().expect("view");
        let evolution = Rc::downgrade(&view.evolution);
        let particles = Rc::downgrade(&view.particles);

        m.dispose();
        m.dispose();
        assert!(!m.is_initialized());
        assert_eq!(m.callback_count(), 0);
        assert!(evolution.upgrade().is_none());
        assert!(particles.upgrade().is_none());
        assert!(!m.frame(1.0));
        assert!(m.play_action("feed").is_done());
    }

    struct CueLog(Rc<RefCell<Vec<(String, f32)>>>);

    impl CuePlayer for CueLog {
        fn play(&mut self, name: &str, volume: f32) {
            self.0.borrow_mut().push((name.to_string(), volume));
        }
    }

    #[test]
    fn test_actions_play_their_cue() {
        let mut m = manager();
        let log: Rc<RefCell<Vec<(String, f32)>>> = Rc::default();
        m.set_cue_player(Box::new(CueLog(log.clone())));

        m.play_action("feed");
        m.play_action("wiggle");
        let (x, y) = body_pixel(&m);
        assert!(m.handle_click(x, y));

        let names: Vec<_> = log.borrow().iter().map(|(n, _)| n.clone()).collect();
        assert_eq!(names, vec!["eat".to_string(), "click".to_string()]);
        assert!(log.borrow().iter().all(|&(_, v)| v == DEFAULT_VOLUME));
    }

    #[test]
    fn test_mood_update_keeps_evolution_flash() {
        let mut m = manager();
        m.update_companion(&CompanionSnapshot::new("happy", "baby", 16));
        assert!(m.is_evolving());

        m.update_companion(&CompanionSnapshot::new("sad", "baby", 16));
        let view = m.view.as_ref().expect("view");
        let ambient = view.ambient.borrow();
        assert!(ambient.is_flashing());
        assert_eq!(ambient.color(), Color::WHITE);
        assert_eq!(ambient.opacity(), 1.0);
    }

    #[test]
    fn test_action_feedback() {
        let mut m = manager();
        let done = m.play_action("feed");
        assert!(done.is_pending());
        {
            let view = m.view.as_ref().expect("view");
            assert_eq!(view.icons.borrow().len(), 1);
            assert!(view.particles.borrow().alive_count() >= 10);
        }

        let mut now = 0.0;
        for _ in 0..30 {
            m.frame(now);
            now += 0.05;
        }
        assert!(done.is_done());
    }

    #[test]
    fn test_click_reacts_and_emits() {
        let mut m = manager();
        let log = recorder(&mut m);
        m.frame(0.0);

        assert!(!m.handle_click(1.0, 1.0));
        let (x, y) = body_pixel(&m);
        assert!(m.handle_click(x, y));
        m.frame(0.05);
        assert_eq!(*log.borrow(), vec![CompanionEvent::CompanionClicked]);
    }

    #[test]
    fn test_hover_then_pointer_click() {
        let mut m = manager();
        let log = recorder(&mut m);
        let (x, y) = body_pixel(&m);

        m.pointer_move(x, y);
        m.pointer_move(x, y);
        assert!(m.pointer_click());
        m.pointer_move(1.0, 1.0);
        assert!(!m.pointer_click());
        m.frame(0.0);

        assert_eq!(
            *log.borrow(),
            vec![
                CompanionEvent::Hover { hovering: true },
                CompanionEvent::CompanionClicked,
                CompanionEvent::Hover { hovering: false },
            ]
        );
    }
}
