//! Player movement, interaction, room transitions and the end of the game

use zest_common::{ROOM_HEIGHT, ROOM_WIDTH};

use super::Interpreter;
use crate::cartridge::{Edge, Exit, ExitTarget, RoomId, TileKind};
use crate::context::{EventContext, SelfRef};
use crate::dialog::DialogCallback;

const MAX_X: i32 = ROOM_WIDTH as i32 - 1;
const MAX_Y: i32 = ROOM_HEIGHT as i32 - 1;

/// What a single move attempt ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub blocked: bool,
    pub exited: bool,
}

impl Interpreter<'_> {
    /// Attempt to move the player by one step
    pub fn move_player(&mut self, dx: i32, dy: i32) -> MoveOutcome {
        // no diagonals
        let dx = if dx != 0 && dy != 0 { 0 } else { dx };
        let (px, py) = (self.state.player.x, self.state.player.y);
        if dx != 0 || dy != 0 {
            self.state.player.facing = (dx.signum(), dy.signum());
        }

        let target = (px.saturating_add(dx), py.saturating_add(dy));
        let (x, y) = (target.0.clamp(0, MAX_X), target.1.clamp(0, MAX_Y));
        let clamped = (x, y) != target;

        {
            let ev = &mut self.state.event;
            ev.dx = dx;
            ev.dy = dy;
            ev.tx = x;
            ev.ty = y;
            ev.x = x;
            ev.y = y;
        }

        let cart = self.cart;
        let Some(tile_id) = self.state.tile_at(x, y) else {
            return MoveOutcome { blocked: true, exited: false };
        };
        let tile = cart.tile(tile_id);
        let blocked = clamped || tile.solid;
        if !blocked {
            self.state.player.x = x;
            self.state.player.y = y;
            self.state.event.px = x;
            self.state.event.py = y;
        }

        let ctx = EventContext::builder(&self.base_context()).at(x, y).tile(tile_id).build();
        self.send(SelfRef::Player, "update", ctx.clone());

        match tile.kind {
            TileKind::Sprite if !clamped => {
                if self.state.config.auto_act {
                    self.interact(x, y);
                }
            }
            TileKind::Item if !clamped => self.collect(x, y),
            // exits of this move are resolved below, so only an earlier
            // transition silences the bump
            _ if blocked && self.state.pending_room.is_none() => {
                self.send(SelfRef::Player, "bump", ctx);
            }
            _ => {}
        }

        // point exits match the destination even when it is solid
        let exit = cart
            .room(self.state.room)
            .exits
            .iter()
            .find(|e| (e.edge.is_some() || !clamped) && e.matches((px, py), (dx, dy), (x, y)))
            .cloned();
        let exited = exit.is_some();
        if let Some(exit) = exit {
            self.take_exit(&exit, (px, py));
        }
        MoveOutcome { blocked, exited }
    }

    fn take_exit(&mut self, exit: &Exit, from: (i32, i32)) {
        match &exit.target {
            ExitTarget::Finish(message) => self.finish(message.clone()),
            ExitTarget::Room(room) => {
                // edge exits keep the coordinate along the edge and wrap the other
                let (x, y) = match exit.edge {
                    Some(Edge::Top) => (from.0, MAX_Y),
                    Some(Edge::Bottom) => (from.0, 0),
                    Some(Edge::Left) => (MAX_X, from.1),
                    Some(Edge::Right) => (0, from.1),
                    None => (exit.tx, exit.ty),
                };
                tracing::debug!("Exit to room {} at ({}, {})", room, x, y);
                self.goto(x, y, Some(*room));
            }
        }
    }

    /// Interact with the tile adjacent to the player in the facing direction
    pub fn act(&mut self) {
        let (fx, fy) = self.state.player.facing;
        if (fx, fy) == (0, 0) {
            return;
        }
        let (x, y) = (self.state.player.x + fx, self.state.player.y + fy);
        let Some(tile) = self.state.tile_at(x, y) else {
            return;
        };
        match self.cart.tile(tile).kind {
            TileKind::Sprite => self.interact(x, y),
            TileKind::Item => self.collect(x, y),
            _ => {}
        }
    }

    fn interact(&mut self, x: i32, y: i32) {
        let cart = self.cart;
        let Some(tile_id) = self.state.tile_at(x, y) else {
            return;
        };
        let ctx = EventContext::builder(&self.base_context()).at(x, y).tile(tile_id).build();
        let this = SelfRef::Tile { tile: tile_id, cell: Some((x, y)) };
        if self.send(this, "interact", ctx) {
            return;
        }
        let tile = cart.tile(tile_id);
        if let Some(sound) = tile.sound {
            self.host.audio.play_sound(&cart.sounds[sound]);
        }
        if let Some(says) = &tile.says {
            self.say(says.clone(), DialogCallback::None);
        }
    }

    fn collect(&mut self, x: i32, y: i32) {
        let cart = self.cart;
        let Some(tile_id) = self.state.tile_at(x, y) else {
            return;
        };
        let ctx = EventContext::builder(&self.base_context()).at(x, y).tile(tile_id).build();
        let this = SelfRef::Tile { tile: tile_id, cell: Some((x, y)) };
        if self.send(this, "collect", ctx) {
            return;
        }
        let tile = cart.tile(tile_id);
        let counter = format!("{}s", tile.name);
        let count = self.state.global(&counter).as_number() + 1.0;
        self.state.set_global(&counter, count.into());
        self.state.set_tile(x, y, cart.background);
        tracing::debug!("Collected '{}' ({} = {})", tile.name, counter, count);
        if let Some(sound) = tile.sound {
            self.host.audio.play_sound(&cart.sounds[sound]);
        }
        if let Some(says) = &tile.says {
            self.say(says.clone(), DialogCallback::None);
        }
    }

    /// Move the player now; a room change is deferred to the next tick
    pub fn goto(&mut self, x: i32, y: i32, room: Option<RoomId>) {
        let (cx, cy) = (x.clamp(0, MAX_X), y.clamp(0, MAX_Y));
        if (cx, cy) != (x, y) {
            tracing::warn!("goto ({}, {}) is outside the room; clamped", x, y);
        }
        self.state.player.x = cx;
        self.state.player.y = cy;
        self.state.event.px = cx;
        self.state.event.py = cy;

        if let Some(room) = room {
            self.emit("exit");
            self.flush_store();
            self.state.pending_room = Some(room);
        }
    }

    /// Apply a pending room change (tick boundary only)
    pub fn enter_pending(&mut self) -> bool {
        match self.state.pending_room.take() {
            Some(room) => {
                self.enter_room(room);
                true
            }
            None => false,
        }
    }

    fn enter_room(&mut self, room: RoomId) {
        let cart = self.cart;
        tracing::info!("Entering room '{}'", cart.room(room).name);
        self.state.room = room;
        self.state.cell_frames.clear();
        self.state.player.room = room;
        if let Some(song) = cart.room(room).song {
            self.host.audio.loop_music(&cart.songs[song]);
        }
        self.emit("enter");
    }

    /// End of game: blank the room, show the message, restart on dismissal
    pub fn finish(&mut self, message: String) {
        tracing::info!("Game finished: {:?}", message);
        self.flush_store();
        self.notify(SelfRef::Game, "finish");
        self.state.pending_room = None;
        self.state.blank = true;
        self.say(message, DialogCallback::Restart);
    }

    /// Write the persisted snapshot out if it changed
    pub fn flush_store(&mut self) {
        let key = &self.cart.meta.name;
        self.state.persisted.flush(self.host.store.as_mut(), key);
    }
}
