//! Cartridge model: raw JSON format and the resolved, immutable model
//!
//! The raw format keeps every cross-reference as an integer index into
//! arrays that may contain `null` holes (deleted entries). Resolution drops
//! the holes, assigns dense ids and rewrites each reference once, so the
//! running engine only ever follows direct ids. `-1` marks an optional
//! reference as unset.
//!
//! The source JSON text is kept as the session snapshot: restarting a game
//! re-parses it verbatim.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use zest_common::{Result, ZestError, CELL_SIZE, ROOM_CELLS, ROOM_HEIGHT, ROOM_WIDTH, TICKS_PER_SECOND};

use crate::ast::Script;

/// Pixels in one 8×8 frame
pub const FRAME_PIXELS: usize = CELL_SIZE * CELL_SIZE;

pub type Frame = [u8; FRAME_PIXELS];
pub type FrameId = usize;
pub type TileId = usize;
pub type RoomId = usize;
pub type ScriptId = usize;

// ---------------------------------------------------------------------------
// Raw (on-disk) format
// ---------------------------------------------------------------------------

fn none_ref() -> i64 {
    -1
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFrame {
    pub data: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawTile {
    #[serde(default)]
    pub name: String,
    /// 0 world, 1 player, 2 sprite, 3 item
    #[serde(rename = "type", default)]
    pub kind: u8,
    #[serde(default)]
    pub frames: Vec<i64>,
    #[serde(default)]
    pub fps: f64,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub says: Option<String>,
    #[serde(default = "none_ref")]
    pub sound: i64,
    #[serde(default = "none_ref")]
    pub script: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawExit {
    #[serde(default)]
    pub x: i64,
    #[serde(default)]
    pub y: i64,
    #[serde(default = "none_ref")]
    pub room: i64,
    #[serde(default)]
    pub tx: i64,
    #[serde(default)]
    pub ty: i64,
    /// -1 point exit, otherwise 0 top, 1 right, 2 bottom, 3 left
    #[serde(default = "none_ref")]
    pub edge: i64,
    #[serde(default)]
    pub fin: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawRoom {
    #[serde(default)]
    pub name: String,
    pub tiles: Vec<i64>,
    #[serde(default)]
    pub exits: Vec<RawExit>,
    #[serde(default = "none_ref")]
    pub song: i64,
    #[serde(default = "none_ref")]
    pub script: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawScript {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Map<String, Json>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawFont {
    #[serde(default)]
    pub name: String,
    /// Frame ids for ASCII 32 upward
    #[serde(default)]
    pub chars: Vec<i64>,
}

/// Sounds and songs are opaque to the engine; hosts read `data`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawCue {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub data: Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPlayer {
    pub tile: i64,
    pub room: i64,
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCartridge {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub version_string: String,
    #[serde(default)]
    pub build_number: u64,
    #[serde(default)]
    pub intro: String,
    #[serde(default)]
    pub frames: Vec<Option<RawFrame>>,
    #[serde(default)]
    pub tiles: Vec<Option<RawTile>>,
    #[serde(default)]
    pub rooms: Vec<Option<RawRoom>>,
    #[serde(default)]
    pub scripts: Vec<Option<RawScript>>,
    #[serde(default)]
    pub fonts: Vec<Option<RawFont>>,
    #[serde(default)]
    pub sounds: Vec<Option<RawCue>>,
    #[serde(default)]
    pub songs: Vec<Option<RawCue>>,
    pub player: RawPlayer,
    /// Game script
    #[serde(default = "none_ref")]
    pub script: i64,
    #[serde(default = "none_ref")]
    pub wrap: i64,
    #[serde(default = "none_ref")]
    pub card: i64,
    #[serde(default = "none_ref")]
    pub icon: i64,
    /// Tile used to fill cleared cells
    #[serde(default)]
    pub background: i64,
}

/// Strip editor-only data from a cartridge document
pub fn minify(doc: &mut Json) {
    let Some(obj) = doc.as_object_mut() else {
        return;
    };
    obj.remove("editor");
    if let Some(Json::Array(scripts)) = obj.get_mut("scripts") {
        for script in scripts.iter_mut() {
            if let Some(data) = script.get_mut("data").and_then(Json::as_object_mut) {
                data.remove("__comments");
                data.remove("__srcOrder");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Resolved model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileKind {
    World,
    Player,
    Sprite,
    Item,
}

impl TileKind {
    fn from_raw(kind: u8) -> Option<Self> {
        Some(match kind {
            0 => TileKind::World,
            1 => TileKind::Player,
            2 => TileKind::Sprite,
            3 => TileKind::Item,
            _ => return None,
        })
    }

    /// Name scripts see from `type`
    pub fn as_str(self) -> &'static str {
        match self {
            TileKind::World => "world",
            TileKind::Player => "player",
            TileKind::Sprite => "sprite",
            TileKind::Item => "item",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Tile {
    pub id: TileId,
    pub name: String,
    pub kind: TileKind,
    pub frames: Vec<FrameId>,
    pub fps: f64,
    pub solid: bool,
    pub says: Option<String>,
    pub sound: Option<usize>,
    pub script: Option<ScriptId>,
}

impl Tile {
    /// Position in `frames` shown at engine frame `frame_ix`, honouring the tile's rate
    pub fn frame_index(&self, frame_ix: u64) -> usize {
        if self.frames.is_empty() {
            return 0;
        }
        let step = (self.fps / TICKS_PER_SECOND as f64 * frame_ix as f64).floor().max(0.0) as usize;
        step % self.frames.len()
    }

    pub fn frame_at(&self, frame_ix: u64) -> Option<FrameId> {
        self.frames.get(self.frame_index(frame_ix)).copied()
    }

    /// Frame for an explicit override, wrapped into range
    pub fn frame_for(&self, index: usize) -> Option<FrameId> {
        if self.frames.is_empty() {
            return None;
        }
        Some(self.frames[index % self.frames.len()])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Top,
    Right,
    Bottom,
    Left,
}

impl Edge {
    fn from_raw(edge: i64) -> Option<Self> {
        Some(match edge {
            0 => Edge::Top,
            1 => Edge::Right,
            2 => Edge::Bottom,
            3 => Edge::Left,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitTarget {
    Room(RoomId),
    Finish(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exit {
    pub x: i32,
    pub y: i32,
    pub edge: Option<Edge>,
    pub tx: i32,
    pub ty: i32,
    pub target: ExitTarget,
}

impl Exit {
    /// Does a move from `(px, py)` by `(dx, dy)` landing on `(x, y)` take this exit?
    pub fn matches(&self, from: (i32, i32), delta: (i32, i32), to: (i32, i32)) -> bool {
        let (px, py) = from;
        let (dx, dy) = delta;
        match self.edge {
            Some(Edge::Top) => py == 0 && dy < 0,
            Some(Edge::Bottom) => py == ROOM_HEIGHT as i32 - 1 && dy > 0,
            Some(Edge::Left) => px == 0 && dx < 0,
            Some(Edge::Right) => px == ROOM_WIDTH as i32 - 1 && dx > 0,
            None => to == (self.x, self.y),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub tiles: Vec<TileId>,
    pub exits: Vec<Exit>,
    pub song: Option<usize>,
    pub script: Option<ScriptId>,
}

#[derive(Debug, Clone)]
pub struct Font {
    pub name: String,
    pub glyphs: Vec<FrameId>,
}

impl Font {
    /// Glyph frame for a character; printable ASCII only
    pub fn glyph(&self, ch: char) -> Option<FrameId> {
        let code = ch as u32;
        if code < 32 {
            return None;
        }
        self.glyphs.get((code - 32) as usize).copied()
    }
}

#[derive(Debug, Clone)]
pub struct Cue {
    pub name: String,
    pub data: Json,
}

#[derive(Debug, Clone)]
pub struct NamedScript {
    pub name: String,
    pub script: Script,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaInfo {
    pub name: String,
    pub author: String,
    pub version: String,
    pub build: u64,
    pub intro: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerStart {
    pub tile: TileId,
    pub room: RoomId,
    pub x: i32,
    pub y: i32,
}

/// A fully resolved cartridge
#[derive(Debug, Clone)]
pub struct Cartridge {
    pub meta: MetaInfo,
    pub frames: Vec<Frame>,
    pub tiles: Vec<Tile>,
    pub rooms: Vec<Room>,
    pub scripts: Vec<NamedScript>,
    pub fonts: Vec<Font>,
    pub sounds: Vec<Cue>,
    pub songs: Vec<Cue>,
    pub player: PlayerStart,
    pub game_script: Option<ScriptId>,
    pub wrap: Option<RoomId>,
    pub card: Option<RoomId>,
    pub icon: Option<RoomId>,
    pub background: TileId,
    tile_names: HashMap<String, TileId>,
    room_names: HashMap<String, RoomId>,
    source: Arc<str>,
}

/// Maps raw array positions (with holes) to dense ids
struct IndexMap {
    what: &'static str,
    dense: HashMap<i64, usize>,
}

impl IndexMap {
    fn new<T>(what: &'static str, raw: &[Option<T>]) -> Self {
        let dense = raw
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_some())
            .enumerate()
            .map(|(dense, (raw_ix, _))| (raw_ix as i64, dense))
            .collect();
        Self { what, dense }
    }

    fn required(&self, raw: i64) -> Result<usize> {
        self.dense
            .get(&raw)
            .copied()
            .ok_or_else(|| ZestError::Cartridge(format!("{} reference {} does not resolve", self.what, raw)))
    }

    /// `-1` (or any negative) is "none"; anything else must resolve
    fn optional(&self, raw: i64) -> Result<Option<usize>> {
        if raw < 0 {
            return Ok(None);
        }
        self.required(raw).map(Some)
    }
}

fn to_frame(index: usize, raw: &RawFrame) -> Result<Frame> {
    if raw.data.len() != FRAME_PIXELS {
        return Err(ZestError::Cartridge(format!(
            "frame {} has {} pixels, expected {}",
            index,
            raw.data.len(),
            FRAME_PIXELS
        )));
    }
    let mut frame = [0u8; FRAME_PIXELS];
    for (dst, src) in frame.iter_mut().zip(&raw.data) {
        *dst = (*src).clamp(0, u8::MAX as i64) as u8;
    }
    Ok(frame)
}

fn in_grid(x: i64, y: i64) -> bool {
    (0..ROOM_WIDTH as i64).contains(&x) && (0..ROOM_HEIGHT as i64).contains(&y)
}

impl Cartridge {
    /// Parse and resolve a cartridge from its JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawCartridge = serde_json::from_str(text)?;
        Self::resolve(raw, Arc::from(text))
    }

    /// Fresh copy of the cartridge as it was loaded
    pub fn reload(&self) -> Result<Self> {
        let raw: RawCartridge = serde_json::from_str(&self.source)?;
        Self::resolve(raw, Arc::clone(&self.source))
    }

    fn resolve(raw: RawCartridge, source: Arc<str>) -> Result<Self> {
        let frame_ix = IndexMap::new("frame", &raw.frames);
        let tile_ix = IndexMap::new("tile", &raw.tiles);
        let room_ix = IndexMap::new("room", &raw.rooms);
        let script_ix = IndexMap::new("script", &raw.scripts);
        let sound_ix = IndexMap::new("sound", &raw.sounds);
        let song_ix = IndexMap::new("song", &raw.songs);

        let frames = raw
            .frames
            .iter()
            .enumerate()
            .filter_map(|(i, f)| f.as_ref().map(|f| (i, f)))
            .map(|(i, f)| to_frame(i, f))
            .collect::<Result<Vec<_>>>()?;

        let scripts = raw
            .scripts
            .iter()
            .flatten()
            .map(|s| NamedScript {
                name: s.name.clone(),
                script: Script::parse(&s.data),
            })
            .collect();

        let mut tiles = Vec::new();
        for raw_tile in raw.tiles.iter().flatten() {
            let kind = TileKind::from_raw(raw_tile.kind).ok_or_else(|| {
                ZestError::Cartridge(format!("tile '{}' has unknown type {}", raw_tile.name, raw_tile.kind))
            })?;
            tiles.push(Tile {
                id: tiles.len(),
                name: raw_tile.name.clone(),
                kind,
                frames: raw_tile
                    .frames
                    .iter()
                    .map(|&f| frame_ix.required(f))
                    .collect::<Result<_>>()?,
                fps: raw_tile.fps,
                solid: raw_tile.solid,
                says: raw_tile.says.clone().filter(|s| !s.is_empty()),
                sound: sound_ix.optional(raw_tile.sound)?,
                script: script_ix.optional(raw_tile.script)?,
            });
        }

        let mut rooms = Vec::new();
        for raw_room in raw.rooms.iter().flatten() {
            if raw_room.tiles.len() != ROOM_CELLS {
                return Err(ZestError::Cartridge(format!(
                    "room '{}' has {} cells, expected {}",
                    raw_room.name,
                    raw_room.tiles.len(),
                    ROOM_CELLS
                )));
            }
            let exits = raw_room
                .exits
                .iter()
                .map(|e| {
                    let target = match &e.fin {
                        Some(message) => ExitTarget::Finish(message.clone()),
                        None => ExitTarget::Room(room_ix.required(e.room)?),
                    };
                    if !in_grid(e.tx, e.ty) {
                        return Err(ZestError::Cartridge(format!(
                            "exit in room '{}' targets ({}, {}) outside the grid",
                            raw_room.name, e.tx, e.ty
                        )));
                    }
                    Ok(Exit {
                        x: e.x as i32,
                        y: e.y as i32,
                        edge: Edge::from_raw(e.edge),
                        tx: e.tx as i32,
                        ty: e.ty as i32,
                        target,
                    })
                })
                .collect::<Result<_>>()?;
            rooms.push(Room {
                id: rooms.len(),
                name: raw_room.name.clone(),
                tiles: raw_room
                    .tiles
                    .iter()
                    .map(|&t| tile_ix.required(t))
                    .collect::<Result<_>>()?,
                exits,
                song: song_ix.optional(raw_room.song)?,
                script: script_ix.optional(raw_room.script)?,
            });
        }

        if rooms.is_empty() {
            return Err(ZestError::Cartridge("cartridge has no rooms".to_string()));
        }

        let fonts = raw
            .fonts
            .iter()
            .flatten()
            .map(|f| {
                Ok(Font {
                    name: f.name.clone(),
                    glyphs: f.chars.iter().map(|&c| frame_ix.required(c)).collect::<Result<_>>()?,
                })
            })
            .collect::<Result<_>>()?;

        let cues = |list: &[Option<RawCue>]| -> Vec<Cue> {
            list.iter()
                .flatten()
                .map(|c| Cue {
                    name: c.name.clone(),
                    data: c.data.clone(),
                })
                .collect()
        };

        if !in_grid(raw.player.x, raw.player.y) {
            return Err(ZestError::Cartridge(format!(
                "player starts at ({}, {}) outside the grid",
                raw.player.x, raw.player.y
            )));
        }
        let player = PlayerStart {
            tile: tile_ix.required(raw.player.tile)?,
            room: room_ix.required(raw.player.room)?,
            x: raw.player.x as i32,
            y: raw.player.y as i32,
        };

        let background = if tiles.is_empty() {
            return Err(ZestError::Cartridge("cartridge has no tiles".to_string()));
        } else {
            tile_ix.optional(raw.background)?.unwrap_or(0)
        };

        // First definition wins for duplicate names
        let mut tile_names = HashMap::new();
        for tile in &tiles {
            tile_names.entry(tile.name.clone()).or_insert(tile.id);
        }
        let mut room_names = HashMap::new();
        for room in &rooms {
            room_names.entry(room.name.clone()).or_insert(room.id);
        }

        let cart = Self {
            meta: MetaInfo {
                name: raw.name,
                author: raw.author,
                version: raw.version_string,
                build: raw.build_number,
                intro: raw.intro,
            },
            frames,
            tiles,
            rooms,
            scripts,
            fonts,
            sounds: cues(&raw.sounds),
            songs: cues(&raw.songs),
            player,
            game_script: script_ix.optional(raw.script)?,
            wrap: room_ix.optional(raw.wrap)?,
            card: room_ix.optional(raw.card)?,
            icon: room_ix.optional(raw.icon)?,
            background,
            tile_names,
            room_names,
            source,
        };
        tracing::info!(
            "Loaded \"{}\" by {}: {} rooms, {} tiles, {} scripts",
            cart.meta.name,
            cart.meta.author,
            cart.rooms.len(),
            cart.tiles.len(),
            cart.scripts.len()
        );
        Ok(cart)
    }

    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id]
    }

    pub fn room(&self, id: RoomId) -> &Room {
        &self.rooms[id]
    }

    pub fn script(&self, id: ScriptId) -> Option<&Script> {
        self.scripts.get(id).map(|s| &s.script)
    }

    pub fn tile_by_name(&self, name: &str) -> Option<TileId> {
        self.tile_names.get(name).copied()
    }

    pub fn room_by_name(&self, name: &str) -> Option<RoomId> {
        self.room_names.get(name).copied()
    }

    /// Room shown before play starts
    pub fn title_room(&self) -> RoomId {
        self.wrap.or(self.card).unwrap_or(self.player.room)
    }

    pub fn sound_by_name(&self, name: &str) -> Option<usize> {
        self.sounds.iter().position(|s| s.name == name)
    }

    pub fn song_by_name(&self, name: &str) -> Option<usize> {
        self.songs.iter().position(|s| s.name == name)
    }

    /// The source JSON text
    pub fn source(&self) -> &str {
        &self.source
    }
}
