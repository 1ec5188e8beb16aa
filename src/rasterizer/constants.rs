//! Rasterizer constants
//!
//! Default framebuffer resolution. The host window is scaled to fit.

/// Default framebuffer width
pub const WIDTH: usize = 320;

/// Default framebuffer height
pub const HEIGHT: usize = 240;
