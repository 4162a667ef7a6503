//! Mutable session state
//!
//! Everything scripts can change lives here: globals, the persisted
//! snapshot, per-room grids, the player record, pending transitions and the
//! sub-controllers. The cartridge itself stays immutable; swapped cells are
//! recorded in the per-room grids owned by this struct.

use std::collections::{BTreeMap, HashMap};

use rand::rngs::StdRng;
use rand::SeedableRng;
use zest_common::{EngineConfig, ROOM_HEIGHT, ROOM_WIDTH};

use crate::cartridge::{Cartridge, RoomId, TileId};
use crate::context::EventContext;
use crate::dialog::DialogController;
use crate::host::PersistentStore;
use crate::input::InputController;
use crate::timers::TimerScheduler;
use crate::value::Value;

/// Grid index of a cell, if it is inside the room
pub fn cell_index(x: i32, y: i32) -> Option<usize> {
    if x < 0 || y < 0 || x >= ROOM_WIDTH as i32 || y >= ROOM_HEIGHT as i32 {
        return None;
    }
    Some(x as usize + y as usize * ROOM_WIDTH)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub x: i32,
    pub y: i32,
    pub room: RoomId,
    /// Tile used for the player's visual (changed by `swap` in the player script)
    pub tile: TileId,
    pub frame: Option<usize>,
    /// Direction of the last attempted move
    pub facing: (i32, i32),
}

/// Globals copied into durable storage on request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedSnapshot {
    pub values: BTreeMap<String, Value>,
    pub dirty: bool,
}

impl PersistedSnapshot {
    /// Read the record for `key`; absent or corrupt data gives an empty snapshot
    pub fn load(store: &mut dyn PersistentStore, key: &str) -> Self {
        let values = match store.get(key) {
            None => BTreeMap::new(),
            Some(record) => match serde_json::from_value::<BTreeMap<String, Value>>(record) {
                Ok(values) => {
                    tracing::info!("Restored {} persisted value(s) for \"{}\"", values.len(), key);
                    values
                }
                Err(e) => {
                    tracing::warn!("Ignoring corrupt store record for \"{}\": {}", key, e);
                    BTreeMap::new()
                }
            },
        };
        Self { values, dirty: false }
    }

    /// Write through to the store if anything changed
    pub fn flush(&mut self, store: &mut dyn PersistentStore, key: &str) {
        if !self.dirty {
            return;
        }
        self.dirty = false;
        if self.values.is_empty() {
            store.remove(key);
            tracing::debug!("Removed store record \"{}\"", key);
            return;
        }
        match serde_json::to_value(&self.values) {
            Ok(record) => {
                store.set(key, record);
                tracing::debug!("Flushed {} persisted value(s)", self.values.len());
            }
            Err(e) => tracing::error!("Failed to serialize store record: {}", e),
        }
    }
}

pub struct GameState {
    pub config: EngineConfig,
    pub globals: HashMap<String, Value>,
    pub persisted: PersistedSnapshot,
    /// One grid per room; swaps last for the session
    pub grids: Vec<Vec<TileId>>,
    pub room: RoomId,
    pub player: PlayerState,
    /// Animation frame overrides for cells of the active room
    pub cell_frames: HashMap<usize, usize>,
    pub pending_room: Option<RoomId>,
    /// Base event context every dispatch starts from
    pub event: EventContext,
    pub frame_ix: u64,
    pub playing: bool,
    /// Room blanked for the end-of-game message
    pub blank: bool,
    pub restart_requested: bool,
    pub dialog: DialogController,
    pub timers: TimerScheduler,
    pub input: InputController,
    pub rng: StdRng,
}

impl GameState {
    pub fn new(cart: &Cartridge, config: EngineConfig, persisted: PersistedSnapshot) -> Self {
        let start = cart.player;
        let room = cart.title_room();
        let event = EventContext {
            x: start.x,
            y: start.y,
            px: start.x,
            py: start.y,
            tx: start.x,
            ty: start.y,
            ..Default::default()
        };
        Self {
            config,
            globals: HashMap::new(),
            persisted,
            grids: cart.rooms.iter().map(|r| r.tiles.clone()).collect(),
            room,
            player: PlayerState {
                x: start.x,
                y: start.y,
                room: start.room,
                tile: start.tile,
                frame: None,
                facing: (0, 0),
            },
            cell_frames: HashMap::new(),
            pending_room: None,
            event,
            frame_ix: 0,
            playing: false,
            blank: false,
            restart_requested: false,
            dialog: DialogController::default(),
            timers: TimerScheduler::default(),
            input: InputController::default(),
            rng: StdRng::from_entropy(),
        }
    }

    // ---- globals ----

    /// Unset globals read as 0
    pub fn global(&self, name: &str) -> Value {
        self.globals.get(name).cloned().unwrap_or_default()
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    // ---- persistence ----

    pub fn store(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                let value = self.global(name);
                self.persisted.values.insert(name.to_string(), value);
            }
            None => {
                for (k, v) in &self.globals {
                    self.persisted.values.insert(k.clone(), v.clone());
                }
            }
        }
        self.persisted.dirty = true;
    }

    pub fn restore(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                if let Some(value) = self.persisted.values.get(name) {
                    self.globals.insert(name.to_string(), value.clone());
                }
            }
            None => {
                for (k, v) in &self.persisted.values {
                    self.globals.insert(k.clone(), v.clone());
                }
            }
        }
    }

    pub fn toss(&mut self, name: Option<&str>) {
        match name {
            Some(name) => {
                self.persisted.values.remove(name);
            }
            None => self.persisted.values.clear(),
        }
        self.persisted.dirty = true;
    }

    // ---- grid ----

    pub fn tile_at(&self, x: i32, y: i32) -> Option<TileId> {
        cell_index(x, y).map(|i| self.grids[self.room][i])
    }

    pub fn set_tile(&mut self, x: i32, y: i32, tile: TileId) -> bool {
        match cell_index(x, y) {
            Some(i) => {
                self.grids[self.room][i] = tile;
                self.cell_frames.remove(&i);
                true
            }
            None => false,
        }
    }

    /// First cell in the active room holding `tile`
    pub fn find_tile(&self, tile: TileId) -> Option<(i32, i32)> {
        self.grids[self.room]
            .iter()
            .position(|&t| t == tile)
            .map(|i| ((i % ROOM_WIDTH) as i32, (i / ROOM_WIDTH) as i32))
    }
}
