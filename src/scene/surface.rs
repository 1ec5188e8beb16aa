//! Drawable surfaces
//!
//! The scene manager renders into its own framebuffer and hands the result
//! to a `RenderSurface`. The binary implements this on top of a macroquad
//! texture; `HeadlessSurface` serves tests and off-screen use.

use std::cell::Cell;
use std::rc::Rc;

use crate::rasterizer::Framebuffer;

/// Where finished frames go
pub trait RenderSurface {
    /// Current drawable size in pixels
    fn size(&self) -> (usize, usize);

    /// False when the host cannot display a 3D view at all
    fn is_available(&self) -> bool {
        true
    }

    /// Show a finished frame
    fn present(&mut self, fb: &Framebuffer);

    /// Size change since the last call, if any
    fn take_resize(&mut self) -> Option<(usize, usize)> {
        None
    }
}

#[derive(Default)]
struct HeadlessShared {
    presents: Cell<usize>,
    pending_resize: Cell<Option<(usize, usize)>>,
}

/// Surface that only counts frames. Keep a `HeadlessHandle` to inspect it
/// after the surface has been handed to the scene manager.
pub struct HeadlessSurface {
    width: usize,
    height: usize,
    available: bool,
    shared: Rc<HeadlessShared>,
}

impl HeadlessSurface {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            available: true,
            shared: Rc::new(HeadlessShared::default()),
        }
    }

    /// A surface that reports no 3D support
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new(0, 0)
        }
    }

    pub fn handle(&self) -> HeadlessHandle {
        HeadlessHandle { shared: self.shared.clone() }
    }
}

impl RenderSurface for HeadlessSurface {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn present(&mut self, _fb: &Framebuffer) {
        self.shared.presents.set(self.shared.presents.get() + 1);
    }

    fn take_resize(&mut self) -> Option<(usize, usize)> {
        let resize = self.shared.pending_resize.take()?;
        self.width = resize.0;
        self.height = resize.1;
        Some(resize)
    }
}

/// Observer/driver for a `HeadlessSurface` that has been moved elsewhere
#[derive(Clone)]
pub struct HeadlessHandle {
    shared: Rc<HeadlessShared>,
}

impl HeadlessHandle {
    pub fn presents(&self) -> usize {
        self.shared.presents.get()
    }

    /// Simulate the host resizing the surface
    pub fn request_resize(&self, width: usize, height: usize) {
        self.shared.pending_resize.set(Some((width, height)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_resize_is_taken_once() {
        let mut surface = HeadlessSurface::new(320, 240);
        let handle = surface.handle();
        handle.request_resize(640, 480);
        assert_eq!(surface.take_resize(), Some((640, 480)));
        assert_eq!(surface.take_resize(), None);
        assert_eq!(surface.size(), (640, 480));
    }

    #[test]
    fn test_present_is_counted() {
        let mut surface = HeadlessSurface::new(8, 8);
        let handle = surface.handle();
        surface.present(&Framebuffer::new(8, 8));
        assert_eq!(handle.presents(), 1);
    }
}
