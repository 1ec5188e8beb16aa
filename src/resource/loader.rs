//! Resource Loader
//!
//! Loads one model per evolution stage and caches it. Every load ends in a
//! post-processed model: shading style applied, re-centered on XZ and
//! resting on y = 0. Callers always get a clone, never the cached value.
//!
//! Asset formats:
//! - `.ron`: serialized `ModelData` (parts and clips)
//! - `.obj`: single part named `body`, no clips
//!
//! A stage without an asset, or whose file is missing, gets the placeholder.
//! Read and decode failures degrade to the placeholder under
//! `LoadPolicy::Degrade` and are reported under `LoadPolicy::Strict`.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::anim::AnimationClip;
use crate::config::{CompanionConfig, ShadingConfig, StageDef, StageId};
use crate::error::AssetError;
use crate::rasterizer::{Material, RimLight, ShadingMode};
use crate::scene::node::part_names::BODY;
use crate::scene::{MeshPart, Model};

use super::obj_import::{ObjError, ObjImporter};
use super::pending::{LoadResult, PendingModel, Progress};
use super::placeholder::build_placeholder;

const READ_CHUNK: usize = 64 * 1024;

/// What to do when an existing asset cannot be read or decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadPolicy {
    /// Fall back to the placeholder
    #[default]
    Degrade,
    /// Report the failure
    Strict,
}

/// On-disk `.ron` model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelData {
    #[serde(default)]
    pub name: Option<String>,
    pub parts: Vec<MeshPart>,
    #[serde(default)]
    pub clips: Vec<AnimationClip>,
}

/// Apply the configured shading style to every lit part
pub fn apply_shading(model: &mut Model, shading: &ShadingConfig) {
    for part in &mut model.parts {
        style_material(&mut part.material, shading);
    }
}

fn style_material(material: &mut Material, shading: &ShadingConfig) {
    if material.shading == ShadingMode::Unlit {
        return;
    }
    material.shading = if shading.toon {
        ShadingMode::Toon { bands: shading.toon_bands.max(1) }
    } else {
        ShadingMode::Flat
    };
    material.rim = shading.rim.then_some(RimLight {
        color: shading.rim_color,
        strength: shading.rim_strength,
        power: shading.rim_power,
    });
}

/// Everything one load needs, detached from the loader so it can run on
/// another thread
#[derive(Clone)]
struct LoadJob {
    stage: StageDef,
    index: usize,
    shading: ShadingConfig,
    path: Option<PathBuf>,
    policy: LoadPolicy,
    progress: Progress,
}

impl LoadJob {
    fn run(self) -> LoadResult {
        let result = match &self.path {
            None => Ok(self.placeholder()),
            Some(path) => match read_asset(path, &self.stage, &self.progress) {
                Ok(mut model) => {
                    apply_shading(&mut model, &self.shading);
                    model.ground_center();
                    info!(stage = %self.stage.id, path = %path.display(), "model loaded");
                    Ok(model)
                }
                Err(AssetError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                    debug!(stage = %self.stage.id, path = %path.display(), "no asset, using placeholder");
                    Ok(self.placeholder())
                }
                Err(e) if self.policy == LoadPolicy::Degrade => {
                    warn!(stage = %self.stage.id, error = %e, "model load failed, using placeholder");
                    Ok(self.placeholder())
                }
                Err(e) => Err(e),
            },
        };
        self.progress.set(1.0);
        result
    }

    fn placeholder(&self) -> Model {
        let mut model = build_placeholder(&self.stage, self.index, &self.shading);
        model.ground_center();
        model
    }
}

/// Read and decode one asset file, publishing progress as bytes arrive
fn read_asset(path: &Path, stage: &StageDef, progress: &Progress) -> LoadResult {
    let io_err = |source| AssetError::Io { path: path.to_path_buf(), source };

    let mut file = File::open(path).map_err(io_err)?;
    let total = file.metadata().map(|m| m.len() as usize).unwrap_or(0);
    let mut bytes = Vec::with_capacity(total);
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut chunk).map_err(io_err)?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        if total > 0 {
            progress.set(bytes.len() as f32 / total as f32);
        }
    }

    let text = String::from_utf8(bytes).map_err(|e| AssetError::parse(path, e.to_string()))?;
    let extension = path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase);

    let model = match extension.as_deref() {
        Some("ron") => {
            let data: ModelData = ron::from_str(&text).map_err(|e| AssetError::parse(path, e.to_string()))?;
            let mut model = Model::new(data.name.unwrap_or_else(|| stage.id.to_string()), stage.id.clone());
            model.parts = data.parts;
            model.clips = data.clips;
            model
        }
        Some("obj") => {
            let mesh = ObjImporter::parse(&text).map_err(|e| match e {
                ObjError::Io(source) => io_err(source),
                ObjError::Parse(message) => AssetError::parse(path, message),
            })?;
            let mut model = Model::new(stage.id.to_string(), stage.id.clone());
            model.parts.push(MeshPart::new(BODY, mesh, Material::new(stage.color)));
            model
        }
        other => {
            return Err(AssetError::parse(
                path,
                format!("unsupported model format: {}", other.unwrap_or("<none>")),
            ));
        }
    };

    if model.triangle_count() == 0 {
        return Err(AssetError::load_failed(&stage.id, "model has no geometry"));
    }
    Ok(model)
}

pub struct ResourceLoader {
    stages: Vec<StageDef>,
    shading: ShadingConfig,
    asset_root: PathBuf,
    prefer_placeholders: bool,
    cache: HashMap<StageId, Model>,
    progress: HashMap<StageId, Progress>,
}

impl ResourceLoader {
    pub fn new(config: &CompanionConfig) -> Self {
        Self {
            stages: config.stages.clone(),
            shading: config.shading.clone(),
            asset_root: config.asset_root.clone(),
            prefer_placeholders: config.features.prefer_placeholders,
            cache: HashMap::new(),
            progress: HashMap::new(),
        }
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.stages
    }

    fn job(&mut self, stage: &StageId, policy: LoadPolicy) -> Result<LoadJob, AssetError> {
        let index = self
            .stages
            .iter()
            .position(|s| &s.id == stage)
            .ok_or_else(|| AssetError::UnknownStage(stage.clone()))?;
        let def = self.stages[index].clone();

        let path = if self.prefer_placeholders {
            None
        } else {
            def.model.as_ref().map(|p| if p.is_absolute() { p.clone() } else { self.asset_root.join(p) })
        };

        let progress = Progress::new();
        self.progress.insert(stage.clone(), progress.clone());
        Ok(LoadJob {
            stage: def,
            index,
            shading: self.shading.clone(),
            path,
            policy,
            progress,
        })
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Load on the calling thread, degrading to the placeholder on failure.
    /// Only an unknown stage is an error.
    pub fn load_model(&mut self, stage: &StageId) -> Result<Model, AssetError> {
        self.load_model_with(stage, LoadPolicy::Degrade)
    }

    pub fn load_model_with(&mut self, stage: &StageId, policy: LoadPolicy) -> Result<Model, AssetError> {
        if let Some(model) = self.cached(stage) {
            debug!(stage = %stage, "using cached model");
            return Ok(model);
        }
        let model = self.job(stage, policy)?.run()?;
        self.cache.insert(stage.clone(), model.clone());
        Ok(model)
    }

    /// Start a background load. Cache hits and unknown stages come back
    /// already resolved. Finish with `poll`.
    pub fn begin_load(&mut self, stage: &StageId, policy: LoadPolicy) -> PendingModel {
        if let Some(model) = self.cached(stage) {
            debug!(stage = %stage, "using cached model");
            return PendingModel::ready(stage.clone(), Ok(model));
        }
        match self.job(stage, policy) {
            Ok(job) => PendingModel::spawn(stage.clone(), move || job.run()),
            Err(e) => PendingModel::ready(stage.clone(), Err(e)),
        }
    }

    /// Poll a background load; a finished model is cached before it is
    /// handed out.
    pub fn poll(&mut self, pending: &mut PendingModel) -> Option<LoadResult> {
        let result = pending.poll()?;
        if let Ok(model) = &result {
            self.cache.entry(pending.stage().clone()).or_insert_with(|| model.clone());
        }
        Some(result)
    }

    /// Load every stage concurrently, degrading failures to placeholders
    pub fn load_all_stages(&mut self) -> HashMap<StageId, Model> {
        info!(stages = self.stages.len(), "loading all companion models");
        let mut models = HashMap::new();
        let mut jobs = Vec::new();

        for id in self.stages.iter().map(|s| s.id.clone()).collect::<Vec<_>>() {
            if let Some(model) = self.cached(&id) {
                models.insert(id, model);
                continue;
            }
            match self.job(&id, LoadPolicy::Degrade) {
                Ok(job) => jobs.push(job),
                Err(e) => warn!(stage = %id, error = %e, "skipping stage"),
            }
        }

        let loaded: Vec<(LoadJob, Option<Model>)> = std::thread::scope(|s| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| {
                    let worker = job.clone();
                    (job, s.spawn(move || worker.run()))
                })
                .collect();
            handles
                .into_iter()
                .map(|(job, handle)| {
                    let model = handle.join().ok().and_then(Result::ok);
                    (job, model)
                })
                .collect()
        });

        for (job, model) in loaded {
            // A degrading job only fails by panicking
            let model = model.unwrap_or_else(|| job.placeholder());
            self.cache.insert(job.stage.id.clone(), model.clone());
            models.insert(job.stage.id.clone(), model);
        }
        info!("all companion models loaded");
        models
    }

    // =========================================================================
    // Cache and progress
    // =========================================================================

    pub fn cached(&self, stage: &StageId) -> Option<Model> {
        self.cache.get(stage).cloned()
    }

    pub fn is_cached(&self, stage: &StageId) -> bool {
        self.cache.contains_key(stage)
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
        self.progress.clear();
    }

    /// Load fraction for one stage; 0 if it never started
    pub fn progress(&self, stage: &StageId) -> f32 {
        self.progress.get(stage).map(Progress::get).unwrap_or(0.0)
    }

    /// Average over every stage that has started loading
    pub fn total_progress(&self) -> f32 {
        if self.progress.is_empty() {
            return 0.0;
        }
        self.progress.values().map(Progress::get).sum::<f32>() / self.progress.len() as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rasterizer::{Color, Face, Vec3, Vertex};
    use crate::scene::Mesh;
    use std::time::{Duration, Instant};

    fn loader_in(dir: &Path) -> ResourceLoader {
        let mut config = CompanionConfig::default();
        config.asset_root = dir.to_path_buf();
        ResourceLoader::new(&config)
    }

    fn assert_grounded(model: &Model) {
        let (lo, hi) = model.world_bounds().expect("bounds");
        assert!(lo.y.abs() < 1e-4, "lowest point at {}", lo.y);
        assert!(((lo.x + hi.x) * 0.5).abs() < 1e-4);
        assert!(((lo.z + hi.z) * 0.5).abs() < 1e-4);
    }

    fn triangle_data() -> ModelData {
        let vertices = vec![
            Vertex::new(Vec3::new(1.0, 2.0, 1.0), Vec3::UP),
            Vertex::new(Vec3::new(3.0, 2.0, 1.0), Vec3::UP),
            Vertex::new(Vec3::new(2.0, 4.0, 3.0), Vec3::UP),
        ];
        ModelData {
            name: Some("tri".to_string()),
            parts: vec![MeshPart::new(
                BODY,
                Mesh::new(vertices, vec![Face::new(0, 1, 2)]),
                Material::new(Color::WHITE),
            )],
            clips: Vec::new(),
        }
    }

    #[test]
    fn test_every_stage_is_grounded() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = loader_in(dir.path());
        for id in ["baby", "teen", "adult"] {
            let model = loader.load_model(&StageId::from(id)).expect("model");
            assert_grounded(&model);
        }
    }

    #[test]
    fn test_cache_hands_out_clones() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = loader_in(dir.path());
        let stage = StageId::from("teen");

        let mut first = loader.load_model(&stage).expect("model");
        first.transform.position = Vec3::new(9.0, 9.0, 9.0);
        first.set_opacity(0.0);

        let second = loader.load_model(&stage).expect("model");
        assert_eq!(second.transform.position, Vec3::ZERO);
        assert_eq!(second.opacity(), 1.0);
        assert_eq!(loader.cached(&stage), Some(second));
    }

    #[test]
    fn test_unknown_stage_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = loader_in(dir.path());
        assert!(matches!(
            loader.load_model(&StageId::from("elder")),
            Err(AssetError::UnknownStage(_))
        ));
    }

    #[test]
    fn test_ron_asset_is_loaded_and_grounded() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("models")).expect("mkdir");
        let text = ron::ser::to_string(&triangle_data()).expect("serialize");
        std::fs::write(dir.path().join("models/companion_baby.ron"), text).expect("write");

        let mut loader = loader_in(dir.path());
        let model = loader.load_model(&StageId::from("baby")).expect("model");
        assert_eq!(model.name, "tri");
        assert_eq!(model.triangle_count(), 1);
        assert_grounded(&model);
        assert_eq!(
            model.parts[0].material.shading,
            ShadingMode::Toon { bands: ShadingConfig::default().toon_bands }
        );
        assert_eq!(loader.progress(&StageId::from("baby")), 1.0);
    }

    #[test]
    fn test_obj_asset_is_single_body_part() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("teen.obj");
        std::fs::write(&path, "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n").expect("write");

        let mut config = CompanionConfig::default();
        config.stages[1].model = Some(path);
        let mut loader = ResourceLoader::new(&config);
        let model = loader.load_model(&StageId::from("teen")).expect("model");
        assert_eq!(model.parts.len(), 1);
        assert_eq!(model.parts[0].name, BODY);
        assert!(model.clips.is_empty());
    }

    #[test]
    fn test_corrupt_asset_depends_on_policy() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("models")).expect("mkdir");
        std::fs::write(dir.path().join("models/companion_teen.ron"), "not a model").expect("write");
        let stage = StageId::from("teen");

        let mut strict = loader_in(dir.path());
        assert!(matches!(
            strict.load_model_with(&stage, LoadPolicy::Strict),
            Err(AssetError::Parse { .. })
        ));
        assert!(!strict.is_cached(&stage));

        let mut degrade = loader_in(dir.path());
        let model = degrade.load_model(&stage).expect("placeholder");
        assert!(model.name.starts_with("placeholder-"));
    }

    #[test]
    fn test_missing_asset_is_placeholder_even_when_strict() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = loader_in(dir.path());
        let model = loader.load_model_with(&StageId::from("adult"), LoadPolicy::Strict).expect("model");
        assert!(model.name.starts_with("placeholder-"));
    }

    #[test]
    fn test_background_load_is_cached_on_poll() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = loader_in(dir.path());
        let stage = StageId::from("baby");
        let mut pending = loader.begin_load(&stage, LoadPolicy::Degrade);

        let start = Instant::now();
        let model = loop {
            if let Some(result) = loader.poll(&mut pending) {
                break result.expect("model");
            }
            assert!(start.elapsed() < Duration::from_secs(5));
            std::thread::sleep(Duration::from_millis(1));
        };
        assert_eq!(model.stage, stage);
        assert!(loader.is_cached(&stage));
    }

    #[test]
    fn test_load_all_stages_and_clear() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut loader = loader_in(dir.path());
        let models = loader.load_all_stages();
        assert_eq!(models.len(), 3);
        assert_eq!(loader.total_progress(), 1.0);

        loader.clear_cache();
        assert!(!loader.is_cached(&StageId::from("baby")));
        assert_eq!(loader.total_progress(), 0.0);
    }
}
