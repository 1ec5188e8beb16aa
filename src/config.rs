//! Companion configuration
//!
//! Everything tunable about the companion view lives here: scene and
//! lighting, the ordered stage table, shading, animation tables, action
//! effects and evolution timings. Every field has a default, so a RON file
//! only needs to list what it changes.
//!
//! ```ron
//! (
//!     features: (prefer_placeholders: true),
//!     particle_capacity: 256,
//! )
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::effects::Icon;
use crate::error::{CompanionError, CompanionResult};
use crate::rasterizer::{Color, Vec3};

/// Player level as reported by the game layer
pub type Level = u32;

// =============================================================================
// Stages
// =============================================================================

/// Identifier of an evolution stage ("baby", "teen", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Parameters for the synthesized stand-in model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderParams {
    pub body_radius: f32,
    pub body_height: f32,
    pub ear_size: f32,
}

/// One row of the ordered stage table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDef {
    pub id: StageId,
    pub name: String,
    pub min_level: Level,
    pub max_level: Level,
    pub scale: f32,
    pub color: Color,
    /// External asset (.ron or .obj); None means always use the placeholder
    #[serde(default)]
    pub model: Option<PathBuf>,
    pub placeholder: PlaceholderParams,
}

impl StageDef {
    pub fn contains(&self, level: Level) -> bool {
        (self.min_level..=self.max_level).contains(&level)
    }
}

fn default_stages() -> Vec<StageDef> {
    vec![
        StageDef {
            id: StageId::from("baby"),
            name: "Baby".to_string(),
            min_level: 1,
            max_level: 15,
            scale: 1.0,
            color: Color::from_hex(0xffb3d9),
            model: Some(PathBuf::from("models/companion_baby.ron")),
            placeholder: PlaceholderParams { body_radius: 0.5, body_height: 0.8, ear_size: 0.3 },
        },
        StageDef {
            id: StageId::from("teen"),
            name: "Teen".to_string(),
            min_level: 16,
            max_level: 35,
            scale: 1.5,
            color: Color::from_hex(0xff69b4),
            model: Some(PathBuf::from("models/companion_teen.ron")),
            placeholder: PlaceholderParams { body_radius: 0.7, body_height: 1.2, ear_size: 0.4 },
        },
        StageDef {
            id: StageId::from("adult"),
            name: "Adult".to_string(),
            min_level: 36,
            max_level: 99,
            scale: 2.0,
            color: Color::from_hex(0xff1493),
            model: Some(PathBuf::from("models/companion_adult.ron")),
            placeholder: PlaceholderParams { body_radius: 0.9, body_height: 1.5, ear_size: 0.5 },
        },
    ]
}

// =============================================================================
// Scene
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightDef {
    pub color: Color,
    pub intensity: f32,
    /// Where the light sits; directional lights shine from here toward the origin
    #[serde(default)]
    pub position: Vec3,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub background: Color,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub camera_position: Vec3,
    pub look_at: Vec3,
    pub ambient: LightDef,
    pub key_light: LightDef,
    pub rim_light: LightDef,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            background: Color::from_hex(0xf5f5f5),
            fov: 50.0,
            near: 0.1,
            far: 1000.0,
            camera_position: Vec3::new(0.0, 2.0, 5.0),
            look_at: Vec3::new(0.0, 1.0, 0.0),
            ambient: LightDef { color: Color::WHITE, intensity: 0.6, position: Vec3::ZERO },
            key_light: LightDef { color: Color::WHITE, intensity: 0.8, position: Vec3::new(5.0, 5.0, 5.0) },
            rim_light: LightDef {
                color: Color::from_hex(0xb3d9ff),
                intensity: 0.5,
                position: Vec3::new(-5.0, 3.0, -5.0),
            },
        }
    }
}

// =============================================================================
// Shading
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadingConfig {
    pub toon: bool,
    pub toon_bands: u8,
    pub rim: bool,
    pub rim_color: Color,
    pub rim_strength: f32,
    pub rim_power: f32,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            toon: true,
            toon_bands: 4,
            rim: true,
            rim_color: Color::from_hex(0x88b7ff),
            rim_strength: 1.1,
            rim_power: 2.0,
        }
    }
}

// =============================================================================
// Animation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Logical name -> clip name baked into the model
    pub names: HashMap<String, String>,
    /// Mood -> logical names picked from for idle variation
    pub mood_sets: HashMap<String, Vec<String>>,
    pub idle_delay_min: f32,
    pub idle_delay_max: f32,
    /// How long a one-shot action lasts when the model has no clip for it
    pub placeholder_action_delay: f32,
    pub crossfade: f32,
    pub action_fade: f32,
}

impl AnimationConfig {
    /// Clip name for a logical name, if the table knows it
    pub fn clip_name(&self, logical: &str) -> Option<&str> {
        self.names.get(logical).map(String::as_str)
    }

    /// Animation set for a mood; unknown moods use `happy`
    pub fn mood_set(&self, mood: &str) -> &[String] {
        self.mood_sets
            .get(mood)
            .or_else(|| self.mood_sets.get(DEFAULT_MOOD))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

pub const DEFAULT_MOOD: &str = "happy";

impl Default for AnimationConfig {
    fn default() -> Self {
        let names = [
            ("idle", "idle"),
            ("breathing", "breathe"),
            ("tailWag", "tail_wag"),
            ("earTwitch", "ear_twitch"),
            ("blink", "blink"),
            ("eat", "eat"),
            ("sleep", "sleep"),
            ("play", "play"),
            ("evolve", "evolve"),
            ("happy", "idle_happy"),
            ("tired", "idle_sleepy"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let set = |names: &[&str]| names.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let mood_sets = HashMap::from([
            ("joyful".to_string(), set(&["happy", "tailWag", "play"])),
            ("happy".to_string(), set(&["idle", "breathing", "blink"])),
            ("tired".to_string(), set(&["tired", "breathing", "sleep"])),
            ("excited".to_string(), set(&["play", "tailWag", "earTwitch"])),
            ("sad".to_string(), set(&["idle", "breathing"])),
            ("angry".to_string(), set(&["idle"])),
            ("curious".to_string(), set(&["idle", "earTwitch", "blink"])),
        ]);

        Self {
            names,
            mood_sets,
            idle_delay_min: 3.0,
            idle_delay_max: 8.0,
            placeholder_action_delay: 1.0,
            crossfade: 0.3,
            action_fade: 0.2,
        }
    }
}

// =============================================================================
// Actions
// =============================================================================

/// Effects played for one companion action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    /// Logical animation name handed to the animation controller
    pub animation: String,
    pub color: Color,
    pub icon: Icon,
    #[serde(default)]
    pub cue: Option<String>,
}

/// Effects played when the companion is clicked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickDef {
    pub color: Color,
    pub reaction: String,
    pub icon: Icon,
    #[serde(default)]
    pub cue: Option<String>,
}

impl Default for ClickDef {
    fn default() -> Self {
        Self {
            color: Color::from_hex(0xff6ea0),
            reaction: "earTwitch".to_string(),
            icon: Icon::Heart,
            cue: Some("click".to_string()),
        }
    }
}

fn default_actions() -> HashMap<String, ActionDef> {
    let action = |animation: &str, hex: u32, icon: Icon, cue: &str| ActionDef {
        animation: animation.to_string(),
        color: Color::from_hex(hex),
        icon,
        cue: Some(cue.to_string()),
    };
    HashMap::from([
        ("feed".to_string(), action("eat", 0xffab91, Icon::Food, "eat")),
        ("eat".to_string(), action("eat", 0xffab91, Icon::Food, "eat")),
        ("play".to_string(), action("play", 0xffd54f, Icon::Game, "play")),
        ("sleep".to_string(), action("sleep", 0xb39ddb, Icon::Sleep, "sleep")),
        ("quest".to_string(), action("quest", 0x90caf9, Icon::Map, "quest")),
    ])
}

// =============================================================================
// Evolution
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    // Timeline path
    pub glow_rim_color: Color,
    pub glow_rim_strength: f32,
    pub fade_out: f32,
    pub fade_in: f32,
    pub dolly_offset: Vec3,
    pub dolly_duration: f32,
    pub shake_intensity: f32,
    pub shake_duration: f32,
    pub burst_offset: Vec3,
    pub burst_color: Color,

    // Legacy in-place path
    pub glow_scale: f32,
    /// Whole pulse, split evenly between up and down
    pub glow_duration: f32,
    pub fade_duration: f32,
    pub shrink_scale: f32,
    pub celebration_height: f32,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            glow_rim_color: Color::from_hex(0x88b7ff),
            glow_rim_strength: 1.2,
            fade_out: 0.5,
            fade_in: 0.6,
            dolly_offset: Vec3::new(0.0, 0.15, 0.6),
            dolly_duration: 0.6,
            shake_intensity: 0.03,
            shake_duration: 0.5,
            burst_offset: Vec3::new(0.0, 0.7, 0.0),
            burst_color: Color::from_hex(0xffd54f),

            glow_scale: 1.1,
            glow_duration: 1.0,
            fade_duration: 0.5,
            shrink_scale: 0.1,
            celebration_height: 0.5,
        }
    }
}

// =============================================================================
// Features / effects
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Features {
    pub particles: bool,
    pub sound: bool,
    /// Skip external assets and always synthesize the stand-in model
    pub prefer_placeholders: bool,
    pub target_fps: u32,
}

impl Default for Features {
    fn default() -> Self {
        Self {
            particles: true,
            sound: true,
            prefer_placeholders: false,
            target_fps: 60,
        }
    }
}

fn default_mood_colors() -> HashMap<String, Color> {
    HashMap::from([
        ("joyful".to_string(), Color::from_hex(0xffff00)),
        ("happy".to_string(), Color::from_hex(0xffb3d9)),
        ("excited".to_string(), Color::from_hex(0xff69b4)),
        ("tired".to_string(), Color::from_hex(0x9999ff)),
        ("sad".to_string(), Color::from_hex(0x6666ff)),
        ("curious".to_string(), Color::from_hex(0xb3d9ff)),
    ])
}

// =============================================================================
// Root config
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanionConfig {
    pub scene: SceneConfig,
    pub stages: Vec<StageDef>,
    /// Directory relative model paths are resolved against
    pub asset_root: PathBuf,
    pub shading: ShadingConfig,
    pub animation: AnimationConfig,
    pub actions: HashMap<String, ActionDef>,
    pub click: ClickDef,
    pub evolution: EvolutionConfig,
    pub features: Features,
    pub particle_capacity: usize,
    pub ambient_particles: usize,
    /// Ambient particle colour per mood
    pub mood_colors: HashMap<String, Color>,
}

impl Default for CompanionConfig {
    fn default() -> Self {
        Self {
            scene: SceneConfig::default(),
            stages: default_stages(),
            asset_root: PathBuf::from("assets"),
            shading: ShadingConfig::default(),
            animation: AnimationConfig::default(),
            actions: default_actions(),
            click: ClickDef::default(),
            evolution: EvolutionConfig::default(),
            features: Features::default(),
            particle_capacity: 128,
            ambient_particles: 50,
            mood_colors: default_mood_colors(),
        }
    }
}

impl CompanionConfig {
    /// Load and validate a RON config file
    pub fn load<P: AsRef<Path>>(path: P) -> CompanionResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| CompanionError::config(format!("{}: {}", path.display(), e)))?;
        Self::from_ron_str(&contents)
            .map_err(|e| CompanionError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate a RON string
    pub fn from_ron_str(s: &str) -> CompanionResult<Self> {
        let config: Self = ron::from_str(s).map_err(|e| CompanionError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_ron_string(&self) -> CompanionResult<String> {
        let pretty = ron::ser::PrettyConfig::new()
            .depth_limit(4)
            .indentor("  ".to_string());
        ron::ser::to_string_pretty(self, pretty).map_err(|e| CompanionError::config(e.to_string()))
    }

    pub fn validate(&self) -> CompanionResult<()> {
        if self.stages.is_empty() {
            return Err(CompanionError::config("stage table is empty"));
        }
        for (i, stage) in self.stages.iter().enumerate() {
            if stage.min_level > stage.max_level {
                return Err(CompanionError::config(format!(
                    "stage {}: min_level {} > max_level {}",
                    stage.id, stage.min_level, stage.max_level
                )));
            }
            if self.stages[..i].iter().any(|s| s.id == stage.id) {
                return Err(CompanionError::config(format!("duplicate stage {}", stage.id)));
            }
            if i > 0 && self.stages[i - 1].max_level >= stage.min_level {
                return Err(CompanionError::config(format!(
                    "stage {} overlaps or precedes {}",
                    stage.id,
                    self.stages[i - 1].id
                )));
            }
        }
        if !self.animation.mood_sets.contains_key(DEFAULT_MOOD) {
            return Err(CompanionError::config(format!("mood set `{}` is required", DEFAULT_MOOD)));
        }
        if self.animation.idle_delay_min > self.animation.idle_delay_max {
            return Err(CompanionError::config("idle_delay_min > idle_delay_max"));
        }
        if self.particle_capacity == 0 {
            return Err(CompanionError::config("particle_capacity must be > 0"));
        }
        Ok(())
    }

    pub fn stage(&self, id: &StageId) -> Option<&StageDef> {
        self.stages.iter().find(|s| &s.id == id)
    }

    pub fn stage_index(&self, id: &StageId) -> Option<usize> {
        self.stages.iter().position(|s| &s.id == id)
    }

    /// Stage whose level range contains `level`
    pub fn stage_for_level(&self, level: Level) -> Option<&StageDef> {
        self.stages.iter().find(|s| s.contains(level))
    }

    pub fn first_stage(&self) -> Option<&StageDef> {
        self.stages.first()
    }

    pub fn mood_color(&self, mood: &str) -> Color {
        self.mood_colors
            .get(mood)
            .or_else(|| self.mood_colors.get(DEFAULT_MOOD))
            .copied()
            .unwrap_or(Color::from_hex(0xffb3d9))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CompanionConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.stages.len(), 3);
        assert_eq!(config.stage_for_level(16).map(|s| s.id.as_str()), Some("teen"));
        assert_eq!(config.stage_for_level(0).map(|s| s.id.as_str()), None);
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config = CompanionConfig::from_ron_str(
            "(features: (prefer_placeholders: true), particle_capacity: 256)",
        )
        .expect("parse");
        assert!(config.features.prefer_placeholders);
        assert_eq!(config.particle_capacity, 256);
        assert_eq!(config.scene.fov, 50.0);
        assert_eq!(config.animation.clip_name("tailWag"), Some("tail_wag"));
    }

    #[test]
    fn test_overlapping_stages_rejected() {
        let mut config = CompanionConfig::default();
        config.stages[1].min_level = 10;
        assert!(matches!(config.validate(), Err(CompanionError::Config(_))));
    }

    #[test]
    fn test_unknown_mood_uses_happy_set() {
        let anim = AnimationConfig::default();
        assert_eq!(anim.mood_set("bewildered"), anim.mood_set("happy"));
        assert_eq!(anim.mood_set("angry"), ["idle".to_string()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("companion.ron");
        let config = CompanionConfig::default();
        std::fs::write(&path, config.to_ron_string().expect("serialize")).expect("write");

        let loaded = CompanionConfig::load(&path).expect("load");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_config_error() {
        let err = CompanionConfig::load("/nonexistent/companion.ron").unwrap_err();
        assert!(matches!(err, CompanionError::Config(_)));
    }
}
