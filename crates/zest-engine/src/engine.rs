//! Engine façade: owns the cartridge, session state and host, and runs the
//! fixed-rate tick
//!
//! Per tick, while not paused:
//!   1. apply a pending room change
//!   2. no dialog: game `loop` handler, then due timers; dialog: reveal/lock
//!   3. input: dialog advance first, otherwise one move and confirm/cancel
//!   4. player `draw` handler
//!   5. flush persisted globals if they changed
//!   6. render

use std::collections::{BTreeMap, HashSet};

use zest_common::{Button, EngineConfig, Result, ROOM_CELLS};

use crate::cartridge::{Cartridge, Frame, MetaInfo, Room};
use crate::clock::GameClock;
use crate::context::{EventContext, SelfRef};
use crate::dialog::{Advance, DialogCallback, DialogController, LINE_WIDTH, PAGE_LINES, TEXT_ORIGIN};
use crate::host::{Host, OverlayCell, PlayerSprite, RenderFrame, BLANK_FRAME};
use crate::script::{Interpreter, MoveOutcome};
use crate::state::{GameState, PersistedSnapshot};
use crate::value::Value;

pub struct Engine {
    cart: Cartridge,
    state: GameState,
    host: Host,
    clock: GameClock,
    /// Configuration restored on restart
    base_config: EngineConfig,
    /// Outlives restarts so each unknown operator is reported once
    reported_unknown: HashSet<String>,
}

impl Engine {
    /// Parse a cartridge and prepare it for play
    pub fn load(json: &str, config: EngineConfig, host: Host) -> Result<Self> {
        let cart = Cartridge::from_json(json)?;
        Ok(Self::from_cartridge(cart, config, host))
    }

    pub fn from_cartridge(cart: Cartridge, config: EngineConfig, mut host: Host) -> Self {
        let persisted = PersistedSnapshot::load(host.store.as_mut(), &cart.meta.name);
        let state = GameState::new(&cart, config.clone(), persisted);
        let mut engine = Self {
            cart,
            state,
            host,
            clock: GameClock::default(),
            base_config: config,
            reported_unknown: HashSet::new(),
        };
        engine.interp().broadcast_load();
        engine
    }

    fn interp(&mut self) -> Interpreter<'_> {
        Interpreter::new(&self.cart, &mut self.state, &mut self.host, &mut self.reported_unknown)
    }

    // ---- accessors ----

    pub fn meta(&self) -> &MetaInfo {
        &self.cart.meta
    }

    pub fn cartridge(&self) -> &Cartridge {
        &self.cart
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn global(&self, name: &str) -> Value {
        self.state.global(name)
    }

    pub fn player_position(&self) -> (i32, i32) {
        (self.state.player.x, self.state.player.y)
    }

    pub fn active_room(&self) -> &Room {
        self.cart.room(self.state.room)
    }

    pub fn dialog(&self) -> &DialogController {
        &self.state.dialog
    }

    pub fn is_playing(&self) -> bool {
        self.state.playing
    }

    // ---- lifecycle ----

    /// Leave the title screen: `start` to the game, enter the starting room
    /// on the next tick
    pub fn play(&mut self) {
        if self.state.playing {
            return;
        }
        tracing::info!("Starting \"{}\"", self.cart.meta.name);
        self.state.playing = true;
        self.interp().notify(SelfRef::Game, "start");
        self.state.pending_room = Some(self.cart.player.room);
    }

    /// Reload the cartridge from the session snapshot and play again.
    /// Persisted globals survive; everything else is reset.
    pub fn restart(&mut self) {
        tracing::info!("Restarting \"{}\"", self.cart.meta.name);
        self.interp().flush_store();
        match self.cart.reload() {
            Ok(cart) => self.cart = cart,
            Err(e) => tracing::error!("Failed to reload cartridge snapshot: {}", e),
        }
        let persisted = PersistedSnapshot::load(self.host.store.as_mut(), &self.cart.meta.name);
        self.state = GameState::new(&self.cart, self.base_config.clone(), persisted);
        self.interp().broadcast_load();
        self.play();
    }

    /// Feed wall-clock time; runs as many ticks as are due
    pub fn update(&mut self, elapsed: f64) -> u32 {
        let ticks = self.clock.update(elapsed);
        for _ in 0..ticks {
            self.tick();
        }
        ticks
    }

    /// Toggle pause; returns whether the engine is now paused
    pub fn pause_resume(&mut self) -> bool {
        let paused = self.clock.pause_resume();
        tracing::info!("{}", if paused { "Paused" } else { "Resumed" });
        paused
    }

    pub fn is_paused(&self) -> bool {
        self.clock.is_paused()
    }

    pub fn stop(&mut self) {
        self.clock.stop();
    }

    pub fn start(&mut self) {
        self.clock.start();
    }

    /// Run exactly one tick
    pub fn tick(&mut self) {
        if self.clock.is_paused() {
            return;
        }
        if self.state.playing {
            self.step();
        }
        self.render();
        self.state.frame_ix += 1;
        if self.state.restart_requested {
            self.restart();
        }
    }

    fn step(&mut self) {
        self.interp().enter_pending();

        if self.state.dialog.is_active() {
            let state = &mut self.state;
            state.dialog.tick(&state.config);
        } else {
            self.interp().notify(SelfRef::Game, "loop");
            if !self.state.dialog.is_active() {
                self.state.timers.advance();
                for due in self.state.timers.take_due() {
                    self.interp().run_continuation(&due);
                }
            }
        }

        self.handle_input();
        self.interp().notify(SelfRef::Player, "draw");
        self.interp().flush_store();
    }

    // ---- input ----

    pub fn press_button(&mut self, button: Button) {
        if self.clock.is_paused() {
            return;
        }
        self.state.input.press(button);
    }

    pub fn release_button(&mut self, button: Button) {
        self.state.input.release(button);
    }

    fn handle_input(&mut self) {
        let buttons = {
            let state = &mut self.state;
            state.input.poll(&state.config)
        };
        if buttons.is_empty() {
            return;
        }

        if self.state.dialog.is_active() {
            if buttons.iter().any(|b| matches!(b, Button::A | Button::B)) {
                self.advance_say();
            }
            return;
        }

        let mut moved = false;
        for button in buttons {
            match button.direction() {
                // one step per tick; the first direction in polling order wins
                Some((dx, dy)) if !moved => {
                    moved = true;
                    self.interp().move_player(dx, dy);
                }
                Some(_) => {}
                None if button == Button::A => {
                    if !self.state.config.auto_act {
                        self.interp().act();
                    }
                    self.interp().notify(SelfRef::Player, "confirm");
                }
                None => {
                    self.interp().notify(SelfRef::Player, "cancel");
                }
            }
            // a new dialog swallows the rest of this tick's input
            if self.state.dialog.is_active() {
                break;
            }
        }
    }

    /// Advance the dialog; returns whether the input was used
    pub fn advance_say(&mut self) -> bool {
        let result = {
            let state = &mut self.state;
            state.dialog.advance(&state.config)
        };
        match result {
            Advance::Ignored => false,
            Advance::Consumed => {
                self.state.input.clear();
                true
            }
            Advance::Closed(callback) => {
                match callback {
                    DialogCallback::None => {}
                    DialogCallback::Script(continuation) => self.interp().run_continuation(&continuation),
                    DialogCallback::Restart => self.state.restart_requested = true,
                }
                let state = &mut self.state;
                if state.dialog.show_next(&state.config) {
                    state.input.clear();
                }
                true
            }
        }
    }

    // ---- crank ----

    pub fn dock_crank(&mut self) {
        self.crank_event("dock", None);
    }

    pub fn undock_crank(&mut self, angle: f64) {
        self.crank_event("undock", Some((angle, 0.0)));
    }

    pub fn turn_crank(&mut self, absolute: f64, relative: f64) {
        self.crank_event("crank", Some((absolute, relative)));
    }

    fn crank_event(&mut self, event: &str, angles: Option<(f64, f64)>) {
        if !self.state.playing || self.clock.is_paused() {
            return;
        }
        if let Some((aa, ra)) = angles {
            self.state.event.aa = aa;
            self.state.event.ra = ra;
        }
        self.interp().notify(SelfRef::Player, event);
    }

    // ---- direct operations ----

    /// Move the player one step, exactly as a direction press would
    pub fn move_player(&mut self, dx: i32, dy: i32) -> MoveOutcome {
        self.interp().move_player(dx, dy)
    }

    pub fn act(&mut self) {
        self.interp().act();
    }

    pub fn goto(&mut self, x: i32, y: i32, room: Option<&str>) {
        let room = room.and_then(|name| {
            let found = self.cart.room_by_name(name);
            if found.is_none() {
                tracing::warn!("goto: no room '{}'", name);
            }
            found
        });
        self.interp().goto(x, y, room);
    }

    /// Broadcast an event to every script
    pub fn emit(&mut self, event: &str) {
        self.interp().emit(event);
    }

    /// Run one event on one entity, with extra `event.*` fields
    pub fn send(&mut self, this: SelfRef, event: &str, fields: &BTreeMap<String, Value>) -> bool {
        let mut interp = self.interp();
        let ctx = EventContext::builder(&interp.base_context()).merge_custom(fields).build();
        interp.send(this, event, ctx)
    }

    // ---- rendering ----

    fn render(&mut self) {
        let cart = &self.cart;
        let state = &self.state;
        let frame_ix = state.frame_ix;
        let frame = |id: Option<usize>| frame_or_blank(cart, id);

        let cells = (0..ROOM_CELLS)
            .map(|i| {
                if state.blank {
                    return frame(cart.tile(cart.background).frame_at(frame_ix));
                }
                let tile = cart.tile(state.grids[state.room][i]);
                match state.cell_frames.get(&i) {
                    Some(&ix) => frame(tile.frame_for(ix)),
                    None => frame(tile.frame_at(frame_ix)),
                }
            })
            .collect();

        let player = (state.playing && !state.blank).then(|| {
            let tile = cart.tile(state.player.tile);
            let id = match state.player.frame {
                Some(ix) => tile.frame_for(ix),
                None => tile.frame_at(frame_ix),
            };
            PlayerSprite {
                frame: frame(id),
                x: state.player.x,
                y: state.player.y,
            }
        });

        let overlay = dialog_overlay(cart, &state.dialog);
        self.host.renderer.render(&RenderFrame {
            cells,
            player,
            overlay,
            frame_ix,
        });
    }
}

fn frame_or_blank(cart: &Cartridge, id: Option<usize>) -> &Frame {
    id.map(|f| &cart.frames[f]).unwrap_or(&BLANK_FRAME)
}

/// Dialog box cells plus one glyph per revealed character, drawn with the
/// cartridge's first font
fn dialog_overlay<'a>(cart: &'a Cartridge, dialog: &DialogController) -> Vec<OverlayCell<'a>> {
    if !dialog.is_active() {
        return Vec::new();
    }
    let (left, top) = (TEXT_ORIGIN.0 - 1, TEXT_ORIGIN.1 - 1);
    let mut cells = Vec::new();
    for row in top..=TEXT_ORIGIN.1 + PAGE_LINES {
        for col in left..=TEXT_ORIGIN.0 + LINE_WIDTH {
            cells.push(OverlayCell {
                col,
                row,
                frame: &BLANK_FRAME,
            });
        }
    }
    let Some(font) = cart.fonts.first() else {
        return cells;
    };
    for (line_no, line) in dialog.visible_lines().iter().enumerate() {
        for (col, ch) in line.chars().enumerate() {
            if let Some(glyph) = font.glyph(ch) {
                cells.push(OverlayCell {
                    col: TEXT_ORIGIN.0 + col,
                    row: TEXT_ORIGIN.1 + line_no,
                    frame: &cart.frames[glyph],
                });
            }
        }
    }
    cells
}
