//! Event dispatch: which script runs for an event, and in what order

use zest_common::ROOM_CELLS;

use super::{cell_coords, Interpreter};
use crate::cartridge::ScriptId;
use crate::context::{EventContext, Scope, SelfRef};

impl Interpreter<'_> {
    /// Script owned by an entity, if any
    pub fn script_for(&self, this: SelfRef) -> Option<ScriptId> {
        match this {
            SelfRef::Game => self.cart.game_script,
            SelfRef::Room => self.cart.room(self.state.room).script,
            // the player's behaviour follows the starting tile, not a swapped visual
            SelfRef::Player => self.cart.tile(self.cart.player.tile).script,
            SelfRef::Tile { tile, .. } => self.cart.tile(tile).script,
        }
    }

    /// Base context for a new dispatch
    pub fn base_context(&self) -> EventContext {
        let mut ctx = self.state.event.clone();
        ctx.frame = self.state.frame_ix;
        ctx
    }

    /// Run `event` on `this`: the catch-all handler first, then the named
    /// one. Each runs with its own control flow. Returns whether a named
    /// handler existed.
    pub fn send(&mut self, this: SelfRef, event: &str, ctx: EventContext) -> bool {
        let cart = self.cart;
        let Some(id) = self.script_for(this) else {
            return false;
        };
        let Some(script) = cart.script(id) else {
            return false;
        };
        let scope = Scope { script: id, this, ctx };
        if let Some(any) = script.catch_all() {
            self.exec(any, &scope);
        }
        match script.handler(event) {
            Some(handler) => {
                tracing::trace!("{:?} handles '{}'", this, event);
                self.exec(handler, &scope);
                true
            }
            None => false,
        }
    }

    /// Send to one entity with the base context
    pub fn notify(&mut self, this: SelfRef, event: &str) -> bool {
        let ctx = self.base_context();
        self.send(this, event, ctx)
    }

    /// Invoke a named handler on the current self, keeping the caller's context
    pub fn call(&mut self, event: &str, scope: &Scope) {
        let cart = self.cart;
        let Some(id) = self.script_for(scope.this) else {
            tracing::debug!("call '{}': {:?} has no script", event, scope.this);
            return;
        };
        let Some(handler) = cart.script(id).and_then(|s| s.handler(event)) else {
            tracing::debug!("call '{}': no such handler on {:?}", event, scope.this);
            return;
        };
        let inner = Scope {
            script: id,
            this: scope.this,
            ctx: scope.ctx.clone(),
        };
        self.exec(handler, &inner);
    }

    /// Broadcast: game, active room, every scripted cell in row-major order,
    /// then the player
    pub fn emit(&mut self, event: &str) {
        tracing::debug!("emit '{}'", event);
        let base = self.base_context();
        self.send(SelfRef::Game, event, base.clone());
        self.send(SelfRef::Room, event, base.clone());
        for index in 0..ROOM_CELLS {
            // read live: earlier handlers may have swapped cells
            let tile = self.state.grids[self.state.room][index];
            if self.cart.tile(tile).script.is_none() {
                continue;
            }
            let (x, y) = cell_coords(index);
            let ctx = EventContext::builder(&base).at(x, y).tile(tile).build();
            self.send(SelfRef::Tile { tile, cell: Some((x, y)) }, event, ctx);
        }
        self.send(SelfRef::Player, event, base);
    }

    /// `load` to the game, every room and every tile script
    pub fn broadcast_load(&mut self) {
        let cart = self.cart;
        let base = self.base_context();
        self.send(SelfRef::Game, "load", base.clone());
        let active = self.state.room;
        for room in &cart.rooms {
            if room.script.is_some() {
                self.state.room = room.id;
                self.send(SelfRef::Room, "load", base.clone());
            }
        }
        self.state.room = active;
        for tile in &cart.tiles {
            if tile.script.is_some() {
                let ctx = EventContext::builder(&base).tile(tile.id).build();
                self.send(SelfRef::Tile { tile: tile.id, cell: None }, "load", ctx);
            }
        }
    }
}
