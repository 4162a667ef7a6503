//! Host collaborators: rendering, audio and durable storage
//!
//! The engine only talks to the outside world through these three traits.
//! Calls are fire-and-forget; nothing here can fail the running engine.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde_json::Value as Json;
use zest_common::{CELL_SIZE, ROOM_CELLS, ROOM_WIDTH, SCREEN_HEIGHT, SCREEN_WIDTH};

use crate::cartridge::{Cue, Frame, FRAME_PIXELS};

/// Overlay pixel value that shows the cell underneath
pub const TRANSPARENT: u8 = 2;

/// All-background frame, used for dialog box cells and frameless tiles
pub static BLANK_FRAME: Frame = [0; FRAME_PIXELS];

/// The player's sprite for this frame
#[derive(Debug, Clone, Copy)]
pub struct PlayerSprite<'a> {
    pub frame: &'a Frame,
    pub x: i32,
    pub y: i32,
}

/// One cell of the dialog overlay
#[derive(Debug, Clone, Copy)]
pub struct OverlayCell<'a> {
    pub col: usize,
    pub row: usize,
    pub frame: &'a Frame,
}

/// Everything needed to draw one frame
#[derive(Debug, Clone)]
pub struct RenderFrame<'a> {
    /// Row-major, one per room cell
    pub cells: Vec<&'a Frame>,
    pub player: Option<PlayerSprite<'a>>,
    pub overlay: Vec<OverlayCell<'a>>,
    pub frame_ix: u64,
}

fn blit(out: &mut [u8], frame: &Frame, col: usize, row: usize, transparent: bool) {
    for py in 0..CELL_SIZE {
        for px in 0..CELL_SIZE {
            let value = frame[px + py * CELL_SIZE];
            if transparent && value == TRANSPARENT {
                continue;
            }
            let x = col * CELL_SIZE + px;
            let y = row * CELL_SIZE + py;
            out[x + y * SCREEN_WIDTH] = value;
        }
    }
}

impl RenderFrame<'_> {
    /// Composite into a 200×120 buffer of raw pixel values (1 = foreground)
    pub fn compose(&self) -> Vec<u8> {
        let mut out = vec![0u8; SCREEN_WIDTH * SCREEN_HEIGHT];
        for (i, frame) in self.cells.iter().enumerate().take(ROOM_CELLS) {
            blit(&mut out, frame, i % ROOM_WIDTH, i / ROOM_WIDTH, false);
        }
        if let Some(sprite) = &self.player {
            blit(&mut out, sprite.frame, sprite.x as usize, sprite.y as usize, true);
        }
        for cell in &self.overlay {
            blit(&mut out, cell.frame, cell.col, cell.row, true);
        }
        out
    }
}

pub trait Renderer {
    fn render(&mut self, frame: &RenderFrame<'_>);
}

pub trait AudioEngine {
    fn play_sound(&mut self, sound: &Cue);
    fn loop_music(&mut self, song: &Cue);
    fn play_once_music(&mut self, song: &Cue);
    fn stop_music(&mut self);
    fn set_tempo(&mut self, bpm: f64);
}

/// Durable key-value storage for persisted globals
pub trait PersistentStore {
    fn get(&mut self, key: &str) -> Option<Json>;
    fn set(&mut self, key: &str, record: Json);
    fn remove(&mut self, key: &str);
}

// Shared handles let a host (or a test) keep looking at a collaborator
// after handing it to the engine.

impl<T: Renderer + ?Sized> Renderer for Rc<RefCell<T>> {
    fn render(&mut self, frame: &RenderFrame<'_>) {
        self.borrow_mut().render(frame)
    }
}

impl<T: AudioEngine + ?Sized> AudioEngine for Rc<RefCell<T>> {
    fn play_sound(&mut self, sound: &Cue) {
        self.borrow_mut().play_sound(sound)
    }
    fn loop_music(&mut self, song: &Cue) {
        self.borrow_mut().loop_music(song)
    }
    fn play_once_music(&mut self, song: &Cue) {
        self.borrow_mut().play_once_music(song)
    }
    fn stop_music(&mut self) {
        self.borrow_mut().stop_music()
    }
    fn set_tempo(&mut self, bpm: f64) {
        self.borrow_mut().set_tempo(bpm)
    }
}

impl<T: PersistentStore + ?Sized> PersistentStore for Rc<RefCell<T>> {
    fn get(&mut self, key: &str) -> Option<Json> {
        self.borrow_mut().get(key)
    }
    fn set(&mut self, key: &str, record: Json) {
        self.borrow_mut().set(key, record)
    }
    fn remove(&mut self, key: &str) {
        self.borrow_mut().remove(key)
    }
}

/// Renderer that draws nothing
#[derive(Debug, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &RenderFrame<'_>) {}
}

/// Audio engine that ignores every cue
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioEngine for SilentAudio {
    fn play_sound(&mut self, _sound: &Cue) {}
    fn loop_music(&mut self, _song: &Cue) {}
    fn play_once_music(&mut self, _song: &Cue) {}
    fn stop_music(&mut self) {}
    fn set_tempo(&mut self, _bpm: f64) {}
}

/// In-memory store; survives engine restarts but not the process
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    pub records: HashMap<String, Json>,
}

impl PersistentStore for MemoryStore {
    fn get(&mut self, key: &str) -> Option<Json> {
        self.records.get(key).cloned()
    }
    fn set(&mut self, key: &str, record: Json) {
        self.records.insert(key.to_string(), record);
    }
    fn remove(&mut self, key: &str) {
        self.records.remove(key);
    }
}

/// The engine's set of collaborators
pub struct Host {
    pub renderer: Box<dyn Renderer>,
    pub audio: Box<dyn AudioEngine>,
    pub store: Box<dyn PersistentStore>,
}

impl Host {
    pub fn new(
        renderer: impl Renderer + 'static,
        audio: impl AudioEngine + 'static,
        store: impl PersistentStore + 'static,
    ) -> Self {
        Self {
            renderer: Box::new(renderer),
            audio: Box::new(audio),
            store: Box::new(store),
        }
    }

    /// No output, in-memory storage
    pub fn headless() -> Self {
        Self::new(NullRenderer, SilentAudio, MemoryStore::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_transparency_falls_through() {
        let fg: Frame = [1; FRAME_PIXELS];
        let mut glyph: Frame = [TRANSPARENT; FRAME_PIXELS];
        glyph[0] = 0;
        let frame = RenderFrame {
            cells: vec![&fg; ROOM_CELLS],
            player: None,
            overlay: vec![OverlayCell { col: 0, row: 0, frame: &glyph }],
            frame_ix: 0,
        };
        let pixels = frame.compose();
        assert_eq!(pixels.len(), SCREEN_WIDTH * SCREEN_HEIGHT);
        assert_eq!(pixels[0], 0);
        assert_eq!(pixels[1], 1);
        assert_eq!(pixels[SCREEN_WIDTH * SCREEN_HEIGHT - 1], 1);
    }

    #[test]
    fn player_drawn_at_cell() {
        let bg: Frame = [0; FRAME_PIXELS];
        let hero: Frame = [1; FRAME_PIXELS];
        let frame = RenderFrame {
            cells: vec![&bg; ROOM_CELLS],
            player: Some(PlayerSprite { frame: &hero, x: 2, y: 1 }),
            overlay: Vec::new(),
            frame_ix: 0,
        };
        let pixels = frame.compose();
        assert_eq!(pixels[16 + 8 * SCREEN_WIDTH], 1);
        assert_eq!(pixels[15 + 8 * SCREEN_WIDTH], 0);
    }

    #[test]
    fn shared_store_handle() {
        let store = Rc::new(RefCell::new(MemoryStore::default()));
        let mut handle = Rc::clone(&store);
        handle.set("cart", serde_json::json!({"coins": 3}));
        assert_eq!(store.borrow().records["cart"]["coins"], 3);
        handle.remove("cart");
        assert!(store.borrow_mut().get("cart").is_none());
    }
}
