//! End-to-end scenarios through the public engine API

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{json, Value as Json};
use zest_common::{Button, EngineConfig, ROOM_CELLS, ROOM_WIDTH};
use zest_engine::cartridge::{Cue, FRAME_PIXELS};
use zest_engine::{AudioEngine, Engine, Host, MemoryStore, RenderFrame, Renderer, SelfRef, Value};

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

#[derive(Default)]
struct RecordingRenderer {
    frames: usize,
    overlay_cells: usize,
    pixels: Vec<u8>,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, frame: &RenderFrame<'_>) {
        self.frames += 1;
        self.overlay_cells = frame.overlay.len();
        self.pixels = frame.compose();
    }
}

#[derive(Default)]
struct RecordingAudio {
    cues: Vec<String>,
}

impl AudioEngine for RecordingAudio {
    fn play_sound(&mut self, sound: &Cue) {
        self.cues.push(format!("sound:{}", sound.name));
    }
    fn loop_music(&mut self, song: &Cue) {
        self.cues.push(format!("loop:{}", song.name));
    }
    fn play_once_music(&mut self, song: &Cue) {
        self.cues.push(format!("once:{}", song.name));
    }
    fn stop_music(&mut self) {
        self.cues.push("stop".to_string());
    }
    fn set_tempo(&mut self, bpm: f64) {
        self.cues.push(format!("bpm:{}", bpm));
    }
}

struct Rig {
    engine: Engine,
    renderer: Rc<RefCell<RecordingRenderer>>,
    audio: Rc<RefCell<RecordingAudio>>,
    store: Rc<RefCell<MemoryStore>>,
}

// ---------------------------------------------------------------------------
// Cartridge fixture
// ---------------------------------------------------------------------------

const FLOOR: i64 = 0;
const WALL: i64 = 1;
const GEM: i64 = 3;
const NPC: i64 = 4;
const TOTEM: i64 = 5;

fn idx(x: usize, y: usize) -> usize {
    x + y * ROOM_WIDTH
}

/// Two rooms. "first": wall at (5,5), gem at (4,6), npc at (4,4), scripted
/// totems at (12,2) and (1,3), a top edge exit, a point exit at (20,5) and
/// one on a wall at (10,8) to "second", and a finishing exit at (24,14).
/// Player starts at (4,5).
fn cartridge(game_script: Json) -> String {
    let mut first = vec![FLOOR; ROOM_CELLS];
    first[idx(5, 5)] = WALL;
    first[idx(10, 8)] = WALL;
    first[idx(4, 6)] = GEM;
    first[idx(4, 4)] = NPC;
    first[idx(12, 2)] = TOTEM;
    first[idx(1, 3)] = TOTEM;

    let glyph: Vec<i64> = (0..FRAME_PIXELS as i64).map(|i| if i % 2 == 0 { 1 } else { 2 }).collect();
    json!({
        "name": "Scenario",
        "author": "Tests",
        "frames": [{"data": vec![0; FRAME_PIXELS]}, {"data": vec![1; FRAME_PIXELS]}, {"data": glyph}],
        "tiles": [
            {"name": "floor", "type": 0, "frames": [0]},
            {"name": "wall", "type": 0, "frames": [1], "solid": true},
            {"name": "hero", "type": 1, "frames": [1], "script": 0},
            {"name": "gem", "type": 3, "frames": [1], "says": "Got a gem!", "sound": 0},
            {"name": "npc", "type": 2, "frames": [1], "solid": true, "says": "Hello"},
            {"name": "totem", "type": 0, "frames": [0], "script": 3},
        ],
        "rooms": [
            {
                "name": "first",
                "tiles": first,
                "exits": [
                    {"edge": 0, "room": 1},
                    {"x": 20, "y": 5, "room": 1, "tx": 3, "ty": 3},
                    {"x": 10, "y": 8, "room": 1, "tx": 6, "ty": 6},
                    {"x": 24, "y": 14, "fin": "The End"},
                ],
                "script": 2,
            },
            {"name": "second", "tiles": vec![FLOOR; ROOM_CELLS], "song": 0},
        ],
        "scripts": [
            {"name": "player", "data": {
                "__blocks": [
                    [["inc", "bumps"]],
                    [["set", "angle", ["get", "event.aa"]]],
                    [["inc", "confirms"]],
                    [["inc", "updates"], ["set", "update_tx", ["get", "event.tx"]]],
                    [["set", "trace", ["format", ["get", "trace"], "P"]]],
                ],
                "bump": ["block", 0],
                "crank": ["block", 1],
                "confirm": ["block", 2],
                "update": ["block", 3],
                "ping": ["block", 4],
            }},
            {"name": "game", "data": game_script},
            {"name": "first room", "data": {
                "__blocks": [
                    [["set", "trace", ["format", ["get", "trace"], "R"]]],
                    [["set", "room_poked", 1], ["tell", ["get", "event.game"], 2]],
                    [["call", "answer"]],
                ],
                "ping": ["block", 0],
                "poke": ["block", 1],
            }},
            {"name": "totem", "data": {
                "__blocks": [
                    [["set", "trace", ["format", ["get", "trace"], "T", ["get", "event.x"], ",", ["get", "event.y"], ";"]]],
                ],
                "ping": ["block", 0],
            }},
        ],
        "fonts": [{"name": "mini", "chars": vec![2; 95]}],
        "sounds": [{"name": "ding"}],
        "songs": [{"name": "theme"}],
        "player": {"tile": 2, "room": 0, "x": 4, "y": 5},
        "script": 1,
    })
    .to_string()
}

fn quick_config() -> EngineConfig {
    EngineConfig {
        say_advance_delay: 0.0,
        ..Default::default()
    }
}

fn rig_with(game_script: Json, config: EngineConfig, store: Rc<RefCell<MemoryStore>>) -> Rig {
    let renderer = Rc::new(RefCell::new(RecordingRenderer::default()));
    let audio = Rc::new(RefCell::new(RecordingAudio::default()));
    let host = Host::new(Rc::clone(&renderer), Rc::clone(&audio), Rc::clone(&store));
    let mut engine = Engine::load(&cartridge(game_script), config, host).unwrap();
    engine.play();
    engine.tick();
    Rig {
        engine,
        renderer,
        audio,
        store,
    }
}

fn rig(game_script: Json) -> Rig {
    rig_with(game_script, quick_config(), Rc::new(RefCell::new(MemoryStore::default())))
}

/// Advance until the dialog closes; returns the page index seen before each advance
fn drain_dialog(engine: &mut Engine) -> Vec<usize> {
    let mut pages = Vec::new();
    while let Some((page, _)) = engine.dialog().page() {
        pages.push(page);
        assert!(engine.advance_say());
    }
    pages
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

#[test]
fn solid_wall_blocks_without_transition() {
    let mut rig = rig(json!({}));
    let outcome = rig.engine.move_player(1, 0);
    assert!(outcome.blocked);
    assert!(!outcome.exited);
    assert_eq!(rig.engine.player_position(), (4, 5));
    assert_eq!(rig.engine.state().pending_room, None);
    assert_eq!(rig.engine.global("bumps"), Value::from(1));
    // update still runs, and sees the attempted destination
    assert_eq!(rig.engine.global("updates"), Value::from(1));
    assert_eq!(rig.engine.global("update_tx"), Value::from(5));
}

#[test]
fn huge_deltas_clamp_to_the_grid() {
    let mut rig = rig(json!({}));
    rig.engine.goto(24, 9, None);
    let outcome = rig.engine.move_player(i32::MAX, 0);
    assert!(outcome.blocked);
    assert_eq!(rig.engine.player_position(), (24, 9));
    rig.engine.goto(0, 9, None);
    assert!(rig.engine.move_player(i32::MIN, 0).blocked);
    assert_eq!(rig.engine.player_position(), (0, 9));
}

#[test]
fn bump_is_silenced_while_a_transition_is_pending() {
    let mut rig = rig(json!({}));
    rig.engine.goto(6, 5, Some("second"));
    assert_eq!(rig.engine.state().pending_room, Some(1));
    let outcome = rig.engine.move_player(-1, 0);
    assert!(outcome.blocked);
    assert_eq!(rig.engine.global("bumps"), Value::from(0));
}

#[test]
fn grid_edge_clamps_and_bumps() {
    let mut rig = rig(json!({}));
    rig.engine.goto(0, 9, None);
    let outcome = rig.engine.move_player(-1, 0);
    assert!(outcome.blocked);
    assert_eq!(rig.engine.player_position(), (0, 9));
    assert_eq!(rig.engine.global("bumps"), Value::from(1));
}

#[test]
fn diagonal_moves_drop_the_horizontal_part() {
    let mut rig = rig(json!({}));
    rig.engine.goto(10, 10, None);
    rig.engine.move_player(1, 1);
    assert_eq!(rig.engine.player_position(), (10, 11));
}

#[test]
fn top_edge_exit_fires_only_from_the_top_row() {
    let mut rig = rig(json!({
        "__blocks": [[["inc", "exits"]], [["inc", "enters"]]],
        "exit": ["block", 0],
        "enter": ["block", 1],
    }));
    let enters_before = rig.engine.global("enters").as_number();

    rig.engine.goto(3, 1, None);
    let outcome = rig.engine.move_player(0, -1);
    assert!(!outcome.exited);
    assert_eq!(rig.engine.player_position(), (3, 0));

    let outcome = rig.engine.move_player(0, -1);
    assert!(outcome.blocked);
    assert!(outcome.exited);
    // the bump resolves before the exit is taken
    assert_eq!(rig.engine.global("bumps"), Value::from(1));
    assert_eq!(rig.engine.global("exits"), Value::from(1));
    // the swap waits for the tick boundary
    assert_eq!(rig.engine.active_room().name, "first");
    assert_eq!(rig.engine.player_position(), (3, 14));

    rig.engine.tick();
    assert_eq!(rig.engine.active_room().name, "second");
    assert_eq!(rig.engine.global("enters").as_number(), enters_before + 1.0);
    assert!(rig.audio.borrow().cues.contains(&"loop:theme".to_string()));
}

#[test]
fn point_exit_fires_on_exact_destination() {
    let mut rig = rig(json!({}));
    rig.engine.goto(20, 4, None);
    assert!(!rig.engine.move_player(1, 0).exited);
    rig.engine.goto(19, 5, None);
    let outcome = rig.engine.move_player(1, 0);
    assert!(outcome.exited);
    assert_eq!(rig.engine.player_position(), (3, 3));
    rig.engine.tick();
    assert_eq!(rig.engine.active_room().name, "second");
}

#[test]
fn point_exit_on_a_solid_tile_still_fires() {
    let mut rig = rig(json!({}));
    rig.engine.goto(9, 8, None);
    let outcome = rig.engine.move_player(1, 0);
    assert!(outcome.blocked);
    assert!(outcome.exited);
    assert_eq!(rig.engine.player_position(), (6, 6));
    assert_eq!(rig.engine.state().pending_room, Some(1));
    rig.engine.tick();
    assert_eq!(rig.engine.active_room().name, "second");
}

#[test]
fn goto_with_a_room_flushes_and_emits_exit() {
    let store = Rc::new(RefCell::new(MemoryStore::default()));
    let mut rig = rig_with(
        json!({
            "__blocks": [
                [["set", "coins", 5], ["store", "coins"], ["goto", 2, 2, "second"]],
                [["inc", "exits"]],
            ],
            "leave": ["block", 0],
            "exit": ["block", 1],
        }),
        quick_config(),
        Rc::clone(&store),
    );
    rig.engine.send(SelfRef::Game, "leave", &BTreeMap::new());
    // written before the tick boundary
    assert_eq!(store.borrow().records["Scenario"]["coins"], json!(5.0));
    assert_eq!(rig.engine.global("exits"), Value::from(1));
    assert_eq!(rig.engine.player_position(), (2, 2));
    assert_eq!(rig.engine.active_room().name, "first");
    rig.engine.tick();
    assert_eq!(rig.engine.active_room().name, "second");
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[test]
fn emit_reaches_game_room_cells_then_player() {
    let mut rig = rig(json!({
        "__blocks": [
            [["set", "trace", ["format", ["get", "trace"], "G"]]],
            [["emit", "ping"]],
            [["set", "trace", ""]],
        ],
        "ping": ["block", 0],
        "shout": ["block", 1],
        "clear": ["block", 2],
    }));
    rig.engine.send(SelfRef::Game, "shout", &BTreeMap::new());
    assert_eq!(rig.engine.global("trace"), Value::from("0GRT12,2;T1,3;P"));

    rig.engine.send(SelfRef::Game, "clear", &BTreeMap::new());
    rig.engine.emit("ping");
    assert_eq!(rig.engine.global("trace"), Value::from("GRT12,2;T1,3;P"));
}

#[test]
fn tell_reaches_the_room_and_the_game() {
    let mut rig = rig(json!({
        "__blocks": [
            [["tell", ["get", "event.room"], 1]],
            [["call", "poke"]],
            [["set", "answered", 1]],
        ],
        "relay": ["block", 0],
        "answer": ["block", 2],
    }));
    rig.engine.send(SelfRef::Game, "relay", &BTreeMap::new());
    assert_eq!(rig.engine.global("room_poked"), Value::from(1));
    assert_eq!(rig.engine.global("answered"), Value::from(1));
}

#[test]
fn item_is_collected_by_default() {
    let mut rig = rig(json!({}));
    rig.engine.move_player(0, 1);
    assert_eq!(rig.engine.player_position(), (4, 6));
    assert_eq!(rig.engine.global("gems"), Value::from(1));
    assert_eq!(rig.engine.state().tile_at(4, 6), Some(0));
    assert!(rig.engine.dialog().is_active());
    assert!(rig.audio.borrow().cues.contains(&"sound:ding".to_string()));
}

#[test]
fn sprite_interacts_on_bump_with_auto_act() {
    let mut rig = rig(json!({}));
    let outcome = rig.engine.move_player(0, -1);
    assert!(outcome.blocked);
    assert!(rig.engine.dialog().is_active());
    // sprites never bump
    assert_eq!(rig.engine.global("bumps"), Value::from(0));
}

#[test]
fn sprite_waits_for_action_button_without_auto_act() {
    let config = EngineConfig {
        auto_act: false,
        ..quick_config()
    };
    let mut rig = rig_with(json!({}), config, Rc::new(RefCell::new(MemoryStore::default())));
    rig.engine.move_player(0, -1);
    assert!(!rig.engine.dialog().is_active());

    rig.engine.press_button(Button::A);
    rig.engine.release_button(Button::A);
    rig.engine.tick();
    assert!(rig.engine.dialog().is_active());
    assert_eq!(rig.engine.global("confirms"), Value::from(1));
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

#[test]
fn wait_fires_after_exactly_two_ticks() {
    let mut rig = rig(json!({
        "__blocks": [[["wait", 0.1, 1]], [["inc", "fired"]]],
        "arm": ["block", 0],
    }));
    rig.engine.send(SelfRef::Game, "arm", &BTreeMap::new());
    rig.engine.tick();
    assert_eq!(rig.engine.global("fired"), Value::from(0));
    rig.engine.tick();
    assert_eq!(rig.engine.global("fired"), Value::from(1));
    rig.engine.tick();
    assert_eq!(rig.engine.global("fired"), Value::from(1));
}

#[test]
fn timers_are_frozen_during_dialog() {
    let mut rig = rig(json!({
        "__blocks": [[["wait", 0.1, 1], ["say", "hold on"]], [["inc", "fired"]]],
        "arm": ["block", 0],
    }));
    rig.engine.send(SelfRef::Game, "arm", &BTreeMap::new());
    for _ in 0..5 {
        rig.engine.tick();
    }
    assert_eq!(rig.engine.global("fired"), Value::from(0));
    drain_dialog(&mut rig.engine);
    rig.engine.tick();
    rig.engine.tick();
    assert_eq!(rig.engine.global("fired"), Value::from(1));
}

// ---------------------------------------------------------------------------
// Dialog
// ---------------------------------------------------------------------------

#[test]
fn long_say_pages_in_order_and_calls_back_once() {
    let mut rig = rig(json!({
        "__blocks": [
            [["say", "This message is long enough that it will need more than one page of the dialog box to show it all.", 1]],
            [["inc", "closed"]],
        ],
        "talk": ["block", 0],
    }));
    rig.engine.send(SelfRef::Game, "talk", &BTreeMap::new());
    let (_, pages) = rig.engine.dialog().page().unwrap();
    assert!(pages >= 2);

    let seen = drain_dialog(&mut rig.engine);
    let mut distinct = seen.clone();
    distinct.dedup();
    assert_eq!(distinct, (0..pages).collect::<Vec<_>>());
    assert_eq!(rig.engine.global("closed"), Value::from(1));
    assert!(!rig.engine.advance_say());
    assert_eq!(rig.engine.global("closed"), Value::from(1));
}

#[test]
fn dialog_overlay_is_rendered() {
    let mut rig = rig(json!({
        "__blocks": [[["say", "Hi"]]],
        "talk": ["block", 0],
    }));
    rig.engine.tick();
    assert_eq!(rig.renderer.borrow().overlay_cells, 0);
    rig.engine.send(SelfRef::Game, "talk", &BTreeMap::new());
    for _ in 0..3 {
        rig.engine.tick();
    }
    let renderer = rig.renderer.borrow();
    // 19×6 box plus the two revealed glyphs
    assert_eq!(renderer.overlay_cells, 19 * 6 + 2);
    assert!(renderer.frames >= 4);
    assert_eq!(renderer.pixels.len(), 200 * 120);
}

#[test]
fn direction_buttons_do_not_move_during_dialog() {
    let mut rig = rig(json!({
        "__blocks": [[["say", "Wait"]]],
        "talk": ["block", 0],
    }));
    rig.engine.send(SelfRef::Game, "talk", &BTreeMap::new());
    rig.engine.press_button(Button::Left);
    rig.engine.tick();
    assert_eq!(rig.engine.player_position(), (4, 5));
    assert!(rig.engine.dialog().is_active());
}

// ---------------------------------------------------------------------------
// Persistence and the end of the game
// ---------------------------------------------------------------------------

#[test]
fn stored_value_survives_restart() {
    let store = Rc::new(RefCell::new(MemoryStore::default()));
    let mut rig = rig_with(
        json!({
            "__blocks": [[["set", "coins", 12], ["store", "coins"]], [["restore", "coins"]]],
            "save": ["block", 0],
            "recall": ["block", 1],
        }),
        quick_config(),
        Rc::clone(&store),
    );
    rig.engine.send(SelfRef::Game, "save", &BTreeMap::new());
    rig.engine.tick();
    assert_eq!(store.borrow().records["Scenario"]["coins"], json!(12.0));

    rig.engine.restart();
    assert_eq!(rig.engine.global("coins"), Value::from(0));
    rig.engine.send(SelfRef::Game, "recall", &BTreeMap::new());
    assert_eq!(rig.engine.global("coins"), Value::from(12));
}

#[test]
fn toss_removes_the_record() {
    let mut rig = rig(json!({
        "__blocks": [[["set", "a", 1], ["store"]], [["toss"]]],
        "save": ["block", 0],
        "forget": ["block", 1],
    }));
    rig.engine.send(SelfRef::Game, "save", &BTreeMap::new());
    rig.engine.tick();
    assert!(rig.store.borrow().records.contains_key("Scenario"));
    rig.engine.send(SelfRef::Game, "forget", &BTreeMap::new());
    rig.engine.tick();
    assert!(!rig.store.borrow().records.contains_key("Scenario"));
}

#[test]
fn finishing_exit_blanks_and_restarts_on_dismissal() {
    let mut rig = rig(json!({
        "__blocks": [[["set", "finished", 1]]],
        "finish": ["block", 0],
    }));
    rig.engine.goto(23, 14, None);
    rig.engine.move_player(1, 0);
    assert_eq!(rig.engine.global("finished"), Value::from(1));
    assert!(rig.engine.state().blank);
    assert!(rig.engine.dialog().is_active());

    drain_dialog(&mut rig.engine);
    rig.engine.tick();
    // fresh session, playing again
    assert!(!rig.engine.state().blank);
    assert!(rig.engine.is_playing());
    assert_eq!(rig.engine.global("finished"), Value::from(0));
    assert_eq!(rig.engine.player_position(), (4, 5));
}

// ---------------------------------------------------------------------------
// Host surface
// ---------------------------------------------------------------------------

#[test]
fn crank_sets_angles_for_the_player_script() {
    let mut rig = rig(json!({}));
    rig.engine.turn_crank(90.0, 15.0);
    assert_eq!(rig.engine.global("angle"), Value::from(90));
}

#[test]
fn pause_freezes_everything() {
    let mut rig = rig(json!({
        "__blocks": [[["inc", "loops"]]],
        "loop": ["block", 0],
    }));
    let before = rig.engine.global("loops");
    assert!(rig.engine.pause_resume());
    rig.engine.press_button(Button::Right);
    assert_eq!(rig.engine.update(1.0), 0);
    rig.engine.tick();
    assert_eq!(rig.engine.global("loops"), before);
    assert_eq!(rig.engine.player_position(), (4, 5));
    assert!(!rig.engine.pause_resume());
    rig.engine.tick();
    assert_eq!(rig.engine.global("loops").as_number(), before.as_number() + 1.0);
}

#[test]
fn malformed_cartridge_is_rejected() {
    let result = Engine::load("{\"rooms\": []}", EngineConfig::default(), Host::headless());
    assert!(result.is_err());
}
