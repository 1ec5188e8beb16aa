//! companion3d desktop host
//!
//! Shows one companion in a macroquad window. The software framebuffer is
//! uploaded to a texture each frame and scaled to fit the window.
//!
//! Keys:
//! - 1..4: feed, play, sleep, quest
//! - Up: gain a level (evolves at stage boundaries)
//! - M: next mood
//! - Mouse: hover and click the companion
//!
//! Cues play `sounds/<cue>.wav` under the asset root when the file exists.

use std::collections::HashMap;
use std::path::Path;

use companion3d::effects::CuePlayer;
use companion3d::rasterizer::{Framebuffer, HEIGHT};
use companion3d::{CompanionConfig, CompanionEvent, CompanionManager, CompanionSnapshot, RenderSurface, StageId, VERSION};
use macroquad::audio::{load_sound, play_sound, PlaySoundParams, Sound};
use macroquad::prelude::*;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_PATH: &str = "companion.ron";
const MOODS: [&str; 6] = ["happy", "joyful", "excited", "curious", "tired", "sad"];
const ACTION_KEYS: [(KeyCode, &str); 4] = [
    (KeyCode::Key1, "feed"),
    (KeyCode::Key2, "play"),
    (KeyCode::Key3, "sleep"),
    (KeyCode::Key4, "quest"),
];

fn window_conf() -> Conf {
    Conf {
        window_title: format!("companion3d v{}", VERSION),
        window_width: 960,
        window_height: 720,
        window_resizable: true,
        high_dpi: true,
        ..Default::default()
    }
}

/// Where the framebuffer lands in the window, keeping its aspect
fn viewport(fb_w: usize, fb_h: usize) -> Rect {
    let scale = (screen_width() / fb_w as f32).min(screen_height() / fb_h as f32);
    let (w, h) = (fb_w as f32 * scale, fb_h as f32 * scale);
    Rect::new((screen_width() - w) / 2.0, (screen_height() - h) / 2.0, w, h)
}

/// Framebuffer size for a window: fixed height, width following the
/// window's aspect
fn framebuffer_size(window_w: f32, window_h: f32) -> (usize, usize) {
    if window_w <= 0.0 || window_h <= 0.0 {
        return (0, 0);
    }
    let width = (HEIGHT as f32 * window_w / window_h).round().max(1.0) as usize;
    (width, HEIGHT)
}

/// Window surface: low-res framebuffer drawn scaled into the window
struct MacroquadSurface {
    width: usize,
    height: usize,
    window: (f32, f32),
    texture: Option<Texture2D>,
}

impl MacroquadSurface {
    fn new() -> Self {
        let window = (screen_width(), screen_height());
        let (width, height) = framebuffer_size(window.0, window.1);
        Self { width, height, window, texture: None }
    }
}

impl RenderSurface for MacroquadSurface {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn present(&mut self, fb: &Framebuffer) {
        let texture = match &self.texture {
            Some(t) if t.width() as usize == fb.width && t.height() as usize == fb.height => {
                t.update_from_bytes(fb.width as u32, fb.height as u32, &fb.pixels);
                t.clone()
            }
            _ => {
                let t = Texture2D::from_rgba8(fb.width as u16, fb.height as u16, &fb.pixels);
                t.set_filter(FilterMode::Nearest);
                self.texture = Some(t.clone());
                t
            }
        };
        let dest = viewport(fb.width, fb.height);
        draw_texture_ex(
            &texture,
            dest.x,
            dest.y,
            WHITE,
            DrawTextureParams {
                dest_size: Some(vec2(dest.w, dest.h)),
                ..Default::default()
            },
        );
    }

    fn take_resize(&mut self) -> Option<(usize, usize)> {
        let window = (screen_width(), screen_height());
        if window == self.window {
            return None;
        }
        self.window = window;
        let size = framebuffer_size(window.0, window.1);
        if size == (self.width, self.height) || size.0 == 0 {
            return None;
        }
        (self.width, self.height) = size;
        Some(size)
    }
}

/// Cue player backed by macroquad audio; cues without a sound file stay silent
struct AudioCues {
    sounds: HashMap<String, Sound>,
}

impl AudioCues {
    async fn load(config: &CompanionConfig) -> Self {
        let names = config
            .actions
            .values()
            .filter_map(|a| a.cue.clone())
            .chain(config.click.cue.clone());
        let mut sounds = HashMap::new();
        for name in names {
            if sounds.contains_key(&name) {
                continue;
            }
            let path = config.asset_root.join("sounds").join(format!("{}.wav", name));
            if !path.exists() {
                debug!(cue = %name, path = %path.display(), "no sound file for cue");
                continue;
            }
            match load_sound(&path.to_string_lossy()).await {
                Ok(sound) => {
                    sounds.insert(name, sound);
                }
                Err(e) => warn!(cue = %name, error = ?e, "could not load cue sound"),
            }
        }
        info!(count = sounds.len(), "loaded cue sounds");
        Self { sounds }
    }
}

impl CuePlayer for AudioCues {
    fn play(&mut self, name: &str, volume: f32) {
        if let Some(sound) = self.sounds.get(name) {
            play_sound(sound, PlaySoundParams { looped: false, volume });
        }
    }
}

fn load_config() -> CompanionConfig {
    if !Path::new(CONFIG_PATH).exists() {
        return CompanionConfig::default();
    }
    match CompanionConfig::load(CONFIG_PATH) {
        Ok(config) => {
            info!(path = CONFIG_PATH, "loaded config");
            config
        }
        Err(e) => {
            warn!(path = CONFIG_PATH, error = %e, "bad config, using defaults");
            CompanionConfig::default()
        }
    }
}

/// Window position to framebuffer pixel
fn to_framebuffer(x: f32, y: f32, fb_w: usize, fb_h: usize) -> (f32, f32) {
    let dest = viewport(fb_w, fb_h);
    ((x - dest.x) * fb_w as f32 / dest.w, (y - dest.y) * fb_h as f32 / dest.h)
}

#[macroquad::main(window_conf)]
async fn main() {
    // Initialize crash logging FIRST (before any other code)
    #[cfg(not(target_arch = "wasm32"))]
    crashlog::setup!(crashlog::cargo_metadata!().capitalized(), false);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config();
    let frame_budget = 1.0 / config.features.target_fps.max(1) as f64;
    let mut snapshot = CompanionSnapshot::new("happy", config.first_stage().map_or_else(|| StageId::from("baby"), |s| s.id.clone()), 1);
    let mut mood = 0;

    let cues = AudioCues::load(&config).await;
    let mut manager = CompanionManager::new(config);
    manager.set_cue_player(Box::new(cues));
    manager.add_listener(|event| match event {
        CompanionEvent::Hover { .. } => {}
        other => info!(?other, "companion event"),
    });

    let surface = MacroquadSurface::new();
    if !CompanionManager::is_3d_available(&surface) {
        warn!("3D view unavailable");
    } else if let Err(e) = manager.init(Box::new(surface), &snapshot) {
        error!(error = %e, "could not start the companion view");
    }

    let mut last_mouse = mouse_position();
    loop {
        let frame_start = get_time();
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        for (key, action) in ACTION_KEYS {
            if is_key_pressed(key) {
                manager.play_action(action);
            }
        }
        if is_key_pressed(KeyCode::Up) {
            snapshot.level += 1;
            manager.update_companion(&snapshot);
        }
        if is_key_pressed(KeyCode::M) {
            mood = (mood + 1) % MOODS.len();
            snapshot.mood = MOODS[mood].to_string();
            manager.update_companion(&snapshot);
        }

        let mouse = mouse_position();
        if mouse != last_mouse {
            if let Some((w, h)) = manager.scene().map(|s| (s.framebuffer().width, s.framebuffer().height)) {
                let (x, y) = to_framebuffer(mouse.0, mouse.1, w, h);
                manager.pointer_move(x, y);
            }
            last_mouse = mouse;
        }
        if is_mouse_button_pressed(MouseButton::Left) {
            manager.pointer_click();
        }

        clear_background(BLACK);
        if !manager.frame(get_time()) {
            draw_text("3D view unavailable", 20.0, 40.0, 32.0, GRAY);
        }
        if let Some(stage) = manager.current_stage() {
            snapshot.evolution_stage = stage;
        }

        draw_text(
            &format!("{}  lv {}  {}", snapshot.evolution_stage, snapshot.level, snapshot.mood),
            12.0,
            screen_height() - 12.0,
            24.0,
            WHITE,
        );

        // Cap the frame rate; vsync may already do this
        #[cfg(not(target_arch = "wasm32"))]
        {
            let spent = get_time() - frame_start;
            if spent < frame_budget {
                std::thread::sleep(std::time::Duration::from_secs_f64(frame_budget - spent));
            }
        }

        next_frame().await;
    }

    manager.dispose();
}
