//! LCD display: turns engine frames into a scaled minifb framebuffer
//!
//! The engine renders into a shared 200×120 buffer of device colours; the
//! window loop scales that buffer up by an integer factor and presents it.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::Result;
use minifb::Window;
use zest_common::{SCREEN_HEIGHT, SCREEN_WIDTH};
use zest_engine::{RenderFrame, Renderer};

/// Unlit LCD pixel
pub const BACKGROUND: u32 = 0xbaaea9;
/// Lit LCD pixel
pub const FOREGROUND: u32 = 0x312f28;

type Framebuffer = Rc<RefCell<Vec<u32>>>;

/// Renderer half: the engine writes native-resolution frames here
pub struct LcdRenderer {
    framebuffer: Framebuffer,
}

impl Renderer for LcdRenderer {
    fn render(&mut self, frame: &RenderFrame<'_>) {
        let pixels = frame.compose();
        let mut fb = self.framebuffer.borrow_mut();
        for (out, &value) in fb.iter_mut().zip(pixels.iter()) {
            *out = if value == 1 { FOREGROUND } else { BACKGROUND };
        }
    }
}

/// Window half: scales the latest frame and hands it to minifb
pub struct Display {
    framebuffer: Framebuffer,
    scale: usize,
    scaled: Vec<u32>,
}

impl Display {
    pub fn new(scale: usize) -> Self {
        let scale = scale.clamp(1, 16);
        Self {
            framebuffer: Rc::new(RefCell::new(vec![BACKGROUND; SCREEN_WIDTH * SCREEN_HEIGHT])),
            scale,
            scaled: vec![BACKGROUND; SCREEN_WIDTH * SCREEN_HEIGHT * scale * scale],
        }
    }

    /// Window size in pixels
    pub fn size(&self) -> (usize, usize) {
        (SCREEN_WIDTH * self.scale, SCREEN_HEIGHT * self.scale)
    }

    /// A renderer that draws into this display
    pub fn renderer(&self) -> LcdRenderer {
        LcdRenderer {
            framebuffer: Rc::clone(&self.framebuffer),
        }
    }

    pub fn present(&mut self, window: &mut Window) -> Result<()> {
        scale_into(&self.framebuffer.borrow(), &mut self.scaled, self.scale);
        let (w, h) = self.size();
        window
            .update_with_buffer(&self.scaled, w, h)
            .map_err(|e| anyhow::anyhow!("Display error: {}", e))
    }
}

/// Nearest-neighbour integer upscale of a native frame
fn scale_into(src: &[u32], dst: &mut [u32], scale: usize) {
    let dst_w = SCREEN_WIDTH * scale;
    for (dy, row) in dst.chunks_mut(dst_w).enumerate() {
        let src_row = &src[(dy / scale) * SCREEN_WIDTH..][..SCREEN_WIDTH];
        for (dx, pixel) in row.iter_mut().enumerate() {
            *pixel = src_row[dx / scale];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zest_common::ROOM_CELLS;
    use zest_engine::cartridge::FRAME_PIXELS;

    #[test]
    fn lit_pixels_use_foreground() {
        let display = Display::new(1);
        let mut renderer = display.renderer();
        let solid = [1u8; FRAME_PIXELS];
        let blank = [0u8; FRAME_PIXELS];
        let mut cells = vec![&blank; ROOM_CELLS];
        cells[0] = &solid;
        renderer.render(&RenderFrame {
            cells,
            player: None,
            overlay: Vec::new(),
            frame_ix: 0,
        });
        let fb = display.framebuffer.borrow();
        assert_eq!(fb[0], FOREGROUND);
        assert_eq!(fb[8], BACKGROUND);
    }

    #[test]
    fn scaling_repeats_pixels() {
        let mut src = vec![BACKGROUND; SCREEN_WIDTH * SCREEN_HEIGHT];
        src[1] = FOREGROUND;
        let mut dst = vec![0; src.len() * 4];
        scale_into(&src, &mut dst, 2);
        let w = SCREEN_WIDTH * 2;
        assert_eq!(&dst[..4], &[BACKGROUND, BACKGROUND, FOREGROUND, FOREGROUND]);
        assert_eq!(dst[w + 2], FOREGROUND);
        assert_eq!(dst[2 * w + 2], BACKGROUND);
    }

    #[test]
    fn scale_is_clamped() {
        assert_eq!(Display::new(0).size(), (SCREEN_WIDTH, SCREEN_HEIGHT));
    }
}
