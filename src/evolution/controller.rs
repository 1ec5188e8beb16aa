//! Evolution Controller
//!
//! Owns the current stage, the displayed companion node, the animation
//! controller and the resource loader. At most one evolution runs at a
//! time: a second request while `is_evolving` is rejected, never queued.
//! Every way out of a sequence (finish, failure, disposal) clears the flag.

use tracing::{error, info, warn};

use crate::anim::{AnimationClip, AnimationController};
use crate::config::{CompanionConfig, EvolutionConfig, Level, StageDef, StageId};
use crate::error::{CompanionError, CompanionResult};
use crate::resource::ResourceLoader;
use crate::scene::{NodeId, SceneContext};
use crate::task::Completion;

use super::legacy::LegacySequence;
use super::timeline::EvolutionTimeline;
use super::{EvolutionEffects, Step};

/// A level that belongs to another stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvolutionReady {
    pub from: StageId,
    pub to: StageId,
}

/// How a sequence ended
#[derive(Debug)]
pub enum EvolutionOutcome {
    Complete { from: StageId, stage: StageId, node: NodeId },
    Failed { from: StageId, stage: StageId, error: CompanionError },
}

/// Which sequence is running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvolutionPath {
    Timeline,
    Legacy,
}

enum Sequence {
    Timeline(EvolutionTimeline),
    Legacy(LegacySequence),
}

impl Sequence {
    fn next_stage(&self) -> &StageId {
        match self {
            Sequence::Timeline(t) => t.next_stage(),
            Sequence::Legacy(l) => l.next_stage(),
        }
    }
}

/// Stage `level` moves to, if it falls outside `current`'s range and
/// inside another stage's range
pub fn stage_transition<'a>(stages: &'a [StageDef], current: &StageId, level: Level) -> Option<&'a StageDef> {
    if stages.iter().any(|s| &s.id == current && s.contains(level)) {
        return None;
    }
    stages.iter().find(|s| &s.id != current && s.contains(level))
}

pub struct EvolutionController {
    stages: Vec<StageDef>,
    effects: EvolutionConfig,
    animation: AnimationController,
    loader: ResourceLoader,
    current_stage: StageId,
    model: Option<NodeId>,
    sequence: Option<Sequence>,
    from_stage: StageId,
}

impl EvolutionController {
    pub fn new(config: &CompanionConfig) -> Self {
        Self::with_animation(config, AnimationController::new(config.animation.clone()))
    }

    /// Deterministic idle variation, for tests
    pub fn with_seed(config: &CompanionConfig, seed: u64) -> Self {
        Self::with_animation(config, AnimationController::with_seed(config.animation.clone(), seed))
    }

    fn with_animation(config: &CompanionConfig, animation: AnimationController) -> Self {
        let first = config.first_stage().map(|s| s.id.clone()).unwrap_or_else(|| StageId::from("baby"));
        Self {
            stages: config.stages.clone(),
            effects: config.evolution.clone(),
            animation,
            loader: ResourceLoader::new(config),
            current_stage: first.clone(),
            model: None,
            sequence: None,
            from_stage: first,
        }
    }

    /// Load `stage` and show it as the companion
    pub fn init(&mut self, stage: &StageId, scene: &mut SceneContext) -> CompanionResult<NodeId> {
        info!(stage = %stage, "initializing evolution controller");
        let model = self.loader.load_model(stage)?;
        let clips = model.clips.clone();

        if let Some(old) = self.model.take() {
            scene.graph.remove(old);
        }
        let node = scene.graph.insert_model(model);
        scene.companion = Some(node);
        self.current_stage = stage.clone();
        self.adopt(node, &clips, scene);
        Ok(node)
    }

    /// Bind animation to the model now on screen
    fn adopt(&mut self, node: NodeId, clips: &[AnimationClip], scene: &SceneContext) {
        self.model = Some(node);
        if let Some(model) = scene.graph.model(node) {
            self.animation.setup(model, clips);
        }
    }

    pub fn current_stage(&self) -> &StageId {
        &self.current_stage
    }

    pub fn current_model(&self) -> Option<NodeId> {
        self.model
    }

    pub fn is_evolving(&self) -> bool {
        self.sequence.is_some()
    }

    pub fn active_path(&self) -> Option<EvolutionPath> {
        self.sequence.as_ref().map(|s| match s {
            Sequence::Timeline(_) => EvolutionPath::Timeline,
            Sequence::Legacy(_) => EvolutionPath::Legacy,
        })
    }

    pub fn animation(&self) -> &AnimationController {
        &self.animation
    }

    pub fn loader(&self) -> &ResourceLoader {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut ResourceLoader {
        &mut self.loader
    }

    pub fn check_evolution_ready(&self, level: Level) -> Option<EvolutionReady> {
        stage_transition(&self.stages, &self.current_stage, level).map(|to| EvolutionReady {
            from: self.current_stage.clone(),
            to: to.id.clone(),
        })
    }

    // =========================================================================
    // Starting a sequence
    // =========================================================================

    fn guard(&self, to: &StageId) -> CompanionResult<NodeId> {
        if self.sequence.is_some() {
            warn!(stage = %to, "evolution already in progress");
            return Err(CompanionError::EvolutionInProgress);
        }
        if !self.stages.iter().any(|s| &s.id == to) {
            return Err(CompanionError::sequence(format!("unknown stage {}", to)));
        }
        self.model.ok_or(CompanionError::NotInitialized)
    }

    /// Evolve to `to` through the timeline; the legacy sequence takes over
    /// if the timeline fails.
    pub fn begin_evolution(&mut self, to: &StageId) -> CompanionResult<()> {
        let node = self.guard(to)?;
        info!(from = %self.current_stage, to = %to, "starting evolution");
        self.from_stage = self.current_stage.clone();
        self.sequence = Some(Sequence::Timeline(EvolutionTimeline::new(node, to.clone(), self.effects.clone())));
        Ok(())
    }

    /// Evolve with the legacy in-place sequence only
    pub fn play_evolution_sequence(&mut self, from: &StageId, to: &StageId) -> CompanionResult<()> {
        let node = self.guard(to)?;
        if from != &self.current_stage {
            warn!(from = %from, current = %self.current_stage, "evolution requested from a stage not shown");
        }
        info!(from = %from, to = %to, "starting legacy evolution");
        self.from_stage = from.clone();
        self.sequence = Some(Sequence::Legacy(LegacySequence::new(node, to.clone(), self.effects.clone())));
        Ok(())
    }

    // =========================================================================
    // Frame update
    // =========================================================================

    /// Advance the running sequence, then animate the companion. Returns
    /// the outcome on the frame a sequence ends.
    pub fn update(&mut self, dt: f32, fx: &mut EvolutionEffects<'_>) -> Option<EvolutionOutcome> {
        let outcome = self.advance(dt, fx);
        if let Some(model) = self.model.and_then(|id| fx.scene.graph.model_mut(id)) {
            self.animation.update(dt, model);
        }
        outcome
    }

    fn advance(&mut self, dt: f32, fx: &mut EvolutionEffects<'_>) -> Option<EvolutionOutcome> {
        let seq = self.sequence.as_mut()?;
        let to = seq.next_stage().clone();
        let result = match seq {
            Sequence::Timeline(t) => t.tick(dt, fx, &mut self.loader),
            Sequence::Legacy(l) => l.tick(dt, fx, &mut self.loader),
        };

        match result {
            Ok(Step::Running) => None,
            Ok(Step::Swapped { node, clips }) => {
                self.current_stage = to;
                self.adopt(node, &clips, fx.scene);
                None
            }
            Ok(Step::Finished(node)) => {
                self.sequence = None;
                self.model = Some(node);
                info!(stage = %to, "evolution complete");
                Some(EvolutionOutcome::Complete {
                    from: self.from_stage.clone(),
                    stage: to,
                    node,
                })
            }
            Err(e) => self.fail(to, e, fx),
        }
    }

    fn fail(&mut self, to: StageId, e: CompanionError, fx: &mut EvolutionEffects<'_>) -> Option<EvolutionOutcome> {
        if let Some(Sequence::Timeline(mut timeline)) = self.sequence.take() {
            let live = self.model.filter(|id| fx.scene.graph.contains(*id));
            if let (true, Some(node)) = (timeline.restore(fx), live) {
                warn!(stage = %to, error = %e, "evolution timeline failed, using legacy sequence");
                self.sequence = Some(Sequence::Legacy(LegacySequence::new(node, to, self.effects.clone())));
                return None;
            }
        }
        error!(stage = %to, error = %e, "evolution failed");
        Some(EvolutionOutcome::Failed {
            from: self.from_stage.clone(),
            stage: to,
            error: e,
        })
    }

    // =========================================================================
    // Animation passthrough
    // =========================================================================

    pub fn set_mood(&mut self, mood: &str) -> bool {
        self.animation.set_mood(mood)
    }

    pub fn play_action(&mut self, name: &str) -> Completion {
        self.animation.play_action(name)
    }

    pub fn queue_actions<S: AsRef<str>>(&mut self, names: &[S]) -> Completion {
        self.animation.queue_actions(names)
    }

    /// Tear down animation, drop any running sequence and the model cache
    pub fn dispose(&mut self) {
        self.animation.dispose();
        self.loader.clear_cache();
        self.sequence = None;
        self.model = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera_rig::CameraRig;
    use crate::effects::ParticlePool;
    use std::fs;

    struct Harness {
        scene: SceneContext,
        camera_rig: CameraRig,
        particles: ParticlePool,
        evolution: EvolutionController,
    }

    impl Harness {
        fn new(config: &CompanionConfig) -> Self {
            let mut scene = SceneContext::new(&config.scene, 1.0);
            let mut evolution = EvolutionController::with_seed(config, 7);
            evolution.init(&StageId::from("baby"), &mut scene).expect("init");
            Self {
                scene,
                camera_rig: CameraRig::with_seed(1),
                particles: ParticlePool::with_seed(32, 1),
                evolution,
            }
        }

        fn update(&mut self) -> Option<EvolutionOutcome> {
            let mut fx = EvolutionEffects {
                scene: &mut self.scene,
                rig: &mut self.camera_rig,
                particles: &mut self.particles,
            };
            self.evolution.update(0.05, &mut fx)
        }

        fn run(&mut self) -> EvolutionOutcome {
            for _ in 0..4000 {
                if let Some(outcome) = self.update() {
                    return outcome;
                }
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            panic!("evolution never ended");
        }
    }

    #[test]
    fn test_check_evolution_ready() {
        let h = Harness::new(&CompanionConfig::default());
        assert_eq!(h.evolution.check_evolution_ready(15), None);
        assert_eq!(
            h.evolution.check_evolution_ready(16),
            Some(EvolutionReady { from: "baby".into(), to: "teen".into() })
        );
        assert_eq!(h.evolution.check_evolution_ready(40).map(|r| r.to), Some(StageId::from("adult")));
        assert_eq!(h.evolution.check_evolution_ready(500), None);
    }

    #[test]
    fn test_lower_stage_is_reported() {
        let stages = CompanionConfig::default().stages;
        let to = stage_transition(&stages, &StageId::from("teen"), 3).map(|s| s.id.clone());
        assert_eq!(to, Some(StageId::from("baby")));
    }

    #[test]
    fn test_second_request_is_rejected() {
        let mut h = Harness::new(&CompanionConfig::default());
        h.evolution.begin_evolution(&StageId::from("teen")).expect("start");
        assert!(matches!(
            h.evolution.begin_evolution(&StageId::from("adult")),
            Err(CompanionError::EvolutionInProgress)
        ));
        assert!(matches!(
            h.evolution.play_evolution_sequence(&StageId::from("baby"), &StageId::from("adult")),
            Err(CompanionError::EvolutionInProgress)
        ));
        assert!(h.evolution.is_evolving());
        assert_eq!(h.evolution.active_path(), Some(EvolutionPath::Timeline));
    }

    #[test]
    fn test_evolution_completes_and_clears_flag() {
        let mut h = Harness::new(&CompanionConfig::default());
        let baby = h.evolution.current_model().expect("model");
        h.evolution.begin_evolution(&StageId::from("teen")).expect("start");

        let EvolutionOutcome::Complete { from, stage, node } = h.run() else {
            panic!("evolution failed");
        };
        assert_eq!((from, stage), (StageId::from("baby"), StageId::from("teen")));
        assert_ne!(node, baby);
        assert!(!h.evolution.is_evolving());
        assert_eq!(h.evolution.current_stage(), &StageId::from("teen"));
        assert_eq!(h.scene.companion, Some(node));
        assert!(h.evolution.animation().is_bound());
    }

    #[test]
    fn test_broken_asset_falls_back_to_legacy() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("models")).expect("mkdir");
        fs::write(dir.path().join("models/companion_teen.ron"), "not a model").expect("write");
        let mut config = CompanionConfig::default();
        config.asset_root = dir.path().to_path_buf();

        let mut h = Harness::new(&config);
        h.evolution.begin_evolution(&StageId::from("teen")).expect("start");
        while h.evolution.active_path() == Some(EvolutionPath::Timeline) {
            assert!(h.update().is_none());
            std::thread::sleep(std::time::Duration::from_millis(1));
        }
        assert_eq!(h.evolution.active_path(), Some(EvolutionPath::Legacy));

        assert!(matches!(h.run(), EvolutionOutcome::Complete { .. }));
        assert!(!h.evolution.is_evolving());
        assert_eq!(h.evolution.current_stage(), &StageId::from("teen"));
    }

    #[test]
    fn test_lost_model_fails_and_clears_flag() {
        let mut h = Harness::new(&CompanionConfig::default());
        h.evolution.play_evolution_sequence(&StageId::from("baby"), &StageId::from("teen")).expect("start");
        h.update();
        h.scene.graph.drain();

        assert!(matches!(h.run(), EvolutionOutcome::Failed { .. }));
        assert!(!h.evolution.is_evolving());
        assert_eq!(h.evolution.current_stage(), &StageId::from("baby"));
    }

    #[test]
    fn test_dispose_clears_cache_and_animation() {
        let mut h = Harness::new(&CompanionConfig::default());
        h.evolution.set_mood("happy");
        assert!(h.evolution.loader().is_cached(&StageId::from("baby")));

        h.evolution.dispose();
        assert!(!h.evolution.loader().is_cached(&StageId::from("baby")));
        assert!(!h.evolution.animation().is_bound());
        assert!(!h.evolution.animation().idle_timer_active());
        assert!(h.evolution.current_model().is_none());
    }
}
