//! Script interpreter
//!
//! A tree-walking evaluator over the parsed [`Expr`] nodes. Statements are
//! run through [`Interpreter::exec`], which threads an explicit [`Flow`] so
//! `done` only unwinds the invocation it was raised in; values are produced
//! by [`Interpreter::eval`]. Dispatch (which script handles an event) lives
//! in `dispatch`, movement and room changes in `movement`, and the small
//! text/math helpers in `builtins`.
//!
//! Nothing here fails: unknown operators, bad references and illegal writes
//! are logged and evaluate to [`Value::Absent`].

mod builtins;
mod dispatch;
mod movement;

use std::collections::HashSet;

use zest_common::ROOM_WIDTH;

use crate::ast::{CompareOp, EventField, Expr, MusicCmd, TellTarget, TileAddr, TileQuery, UpdateOp, VarRef};
use crate::cartridge::{Cartridge, RoomId, TileId};
use crate::context::{Continuation, EventContext, Scope, SelfRef};
use crate::dialog::DialogCallback;
use crate::host::Host;
use crate::state::{cell_index, GameState};
use crate::value::Value;

pub use builtins::{datetime_at, pad};
pub use movement::MoveOutcome;

/// Control-flow signal threaded through statement execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Done,
}

/// One borrow of everything a script can touch
pub struct Interpreter<'a> {
    cart: &'a Cartridge,
    state: &'a mut GameState,
    host: &'a mut Host,
    /// Unknown operators already warned about this session
    reported_unknown: &'a mut HashSet<String>,
}

fn coord(v: &Value) -> i32 {
    v.as_number().floor() as i32
}

impl<'a> Interpreter<'a> {
    pub fn new(
        cart: &'a Cartridge,
        state: &'a mut GameState,
        host: &'a mut Host,
        reported_unknown: &'a mut HashSet<String>,
    ) -> Self {
        Self {
            cart,
            state,
            host,
            reported_unknown,
        }
    }

    fn block(&self, scope: &Scope, idx: usize) -> &'a [Expr] {
        let cart = self.cart;
        match cart.script(scope.script).and_then(|s| s.block(idx)) {
            Some(block) => block,
            None => {
                tracing::warn!("Script {} has no block {}", scope.script, idx);
                &[]
            }
        }
    }

    // ---- statements ----

    /// Run a statement; `Done` means the rest of the invocation is skipped
    pub fn exec(&mut self, expr: &Expr, scope: &Scope) -> Flow {
        match expr {
            Expr::Done => Flow::Done,
            Expr::Block(idx) => self.exec_block(*idx, scope),
            Expr::If { branches, otherwise } => {
                for (cond, body) in branches {
                    if self.eval(cond, scope).is_truthy() {
                        return self.exec_block(*body, scope);
                    }
                }
                match otherwise {
                    Some(body) => self.exec_block(*body, scope),
                    None => Flow::Continue,
                }
            }
            Expr::While { cond, body } => {
                while self.eval(cond, scope).is_truthy() {
                    if self.exec_block(*body, scope) == Flow::Done {
                        return Flow::Done;
                    }
                }
                Flow::Continue
            }
            other => {
                self.eval(other, scope);
                Flow::Continue
            }
        }
    }

    pub fn exec_block(&mut self, idx: usize, scope: &Scope) -> Flow {
        for stmt in self.block(scope, idx) {
            if self.exec(stmt, scope) == Flow::Done {
                return Flow::Done;
            }
        }
        Flow::Continue
    }

    /// Run a deferred block with its own control flow
    pub fn run_continuation(&mut self, continuation: &Continuation) {
        self.exec_block(continuation.block, &continuation.scope);
    }

    // ---- expressions ----

    pub fn eval(&mut self, expr: &Expr, scope: &Scope) -> Value {
        match expr {
            Expr::Literal(v) => v.clone(),
            Expr::Get(var) => self.read(var, scope),
            Expr::Set(var, value) => {
                let value = self.eval(value, scope);
                self.write(var, value.clone());
                value
            }
            Expr::Update { op, target, operand } => self.update(*op, target, operand.as_deref(), scope),
            Expr::Compare { op, lhs, rhs } => {
                let a = self.eval(lhs, scope);
                let b = self.eval(rhs, scope);
                let result = match op {
                    CompareOp::Eq => a.loose_eq(&b),
                    CompareOp::Ne => !a.loose_eq(&b),
                    CompareOp::Lt => a.compare(&b).is_some_and(|o| o.is_lt()),
                    CompareOp::Le => a.compare(&b).is_some_and(|o| o.is_le()),
                    CompareOp::Gt => a.compare(&b).is_some_and(|o| o.is_gt()),
                    CompareOp::Ge => a.compare(&b).is_some_and(|o| o.is_ge()),
                };
                Value::from(result)
            }
            Expr::Block(_) | Expr::If { .. } | Expr::While { .. } | Expr::Done => {
                self.exec(expr, scope);
                Value::Absent
            }
            Expr::Inspect { query, target } => self.inspect(*query, target.as_ref(), scope),
            Expr::Swap(tile) => {
                let value = self.eval(tile, scope);
                self.swap(&value, scope);
                Value::Absent
            }
            Expr::Frame(index) => {
                let index = index.as_ref().map(|e| self.eval(e, scope));
                self.frame(index, scope)
            }
            Expr::Tell { target, body } => {
                self.tell(target, *body, scope);
                Value::Absent
            }
            Expr::Call(name) => {
                let name = self.eval(name, scope).to_string();
                self.call(&name, scope);
                Value::Absent
            }
            Expr::Emit(name) => {
                let name = self.eval(name, scope).to_string();
                self.emit(&name);
                Value::Absent
            }
            Expr::Act => {
                self.act();
                Value::Absent
            }
            Expr::Goto { x, y, room } => {
                let x = coord(&self.eval(x, scope));
                let y = coord(&self.eval(y, scope));
                let room = match room {
                    Some(room) => {
                        let value = self.eval(room, scope);
                        let resolved = self.resolve_room(&value);
                        if resolved.is_none() {
                            tracing::warn!("goto: no room {:?}", value);
                        }
                        resolved
                    }
                    None => None,
                };
                self.goto(x, y, room);
                Value::Absent
            }
            Expr::Wait { seconds, body } => {
                let seconds = self.eval(seconds, scope).as_number();
                let continuation = Continuation {
                    scope: scope.clone(),
                    block: *body,
                };
                self.state.timers.wait(seconds, continuation);
                Value::Absent
            }
            Expr::Say { message, then } => {
                let text = self.eval(message, scope).to_string();
                let callback = match then {
                    Some(block) => DialogCallback::Script(Continuation {
                        scope: scope.clone(),
                        block: *block,
                    }),
                    None => DialogCallback::None,
                };
                self.say(text, callback);
                Value::Absent
            }
            Expr::Fin(message) => {
                let text = self.eval(message, scope).to_string();
                self.finish(text);
                Value::Absent
            }
            Expr::Store(name) => {
                self.state.store(name.as_deref());
                Value::Absent
            }
            Expr::Restore(name) => {
                self.state.restore(name.as_deref());
                Value::Absent
            }
            Expr::Toss(name) => {
                self.state.toss(name.as_deref());
                Value::Absent
            }
            Expr::Sound(sound) => {
                let value = self.eval(sound, scope);
                self.play_sound(&value);
                Value::Absent
            }
            Expr::Music(cmd, song) => {
                let value = self.eval(song, scope);
                self.play_music(*cmd, &value);
                Value::Absent
            }
            Expr::StopMusic => {
                self.host.audio.stop_music();
                Value::Absent
            }
            Expr::Bpm(bpm) => {
                let bpm = self.eval(bpm, scope).as_number();
                self.host.audio.set_tempo(bpm);
                Value::Absent
            }
            Expr::Format(parts) => {
                let mut out = String::new();
                for part in parts {
                    out.push_str(&self.eval(part, scope).to_string());
                }
                Value::Str(out)
            }
            Expr::Pad { side, value, width, fill } => {
                let text = self.eval(value, scope).to_string();
                let width = self.eval(width, scope).as_number();
                let fill = fill.as_ref().map(|f| self.eval(f, scope).to_string());
                Value::Str(pad(*side, &text, width, fill.as_deref()))
            }
            Expr::Math(func, arg) => {
                let x = self.eval(arg, scope).as_number();
                Value::Number(builtins::math(*func, x))
            }
            Expr::Random(a, b) => {
                let a = self.eval(a, scope).as_number();
                let b = self.eval(b, scope).as_number();
                Value::Number(builtins::random(&mut self.state.rng, a, b))
            }
            Expr::Log(value) => {
                let value = self.eval(value, scope);
                tracing::info!("[script] {}", value);
                Value::Absent
            }
            Expr::Unknown(op) => {
                if self.reported_unknown.insert(op.clone()) {
                    tracing::warn!("Unknown script operator '{}'", op);
                }
                Value::Absent
            }
        }
    }

    // ---- variables ----

    fn read(&self, var: &VarRef, scope: &Scope) -> Value {
        match var {
            VarRef::Global(name) => self.state.global(name),
            VarRef::Event(field) => self.read_event(field, &scope.ctx),
            VarRef::Config(name) => self.state.config.get(name).map(Value::from).unwrap_or_default(),
            VarRef::DateTime(field) => datetime_at(*field, chrono::Local::now()),
            VarRef::UnknownDate(name) => {
                tracing::warn!("Unknown datetime field '{}'", name);
                Value::Absent
            }
        }
    }

    fn read_event(&self, field: &EventField, ctx: &EventContext) -> Value {
        match field {
            EventField::X => Value::from(ctx.x),
            EventField::Y => Value::from(ctx.y),
            EventField::Px => Value::from(ctx.px),
            EventField::Py => Value::from(ctx.py),
            EventField::Dx => Value::from(ctx.dx),
            EventField::Dy => Value::from(ctx.dy),
            EventField::Tx => Value::from(ctx.tx),
            EventField::Ty => Value::from(ctx.ty),
            EventField::Tile => ctx
                .tile
                .or_else(|| self.state.tile_at(ctx.x, ctx.y))
                .map(|t| Value::from(self.cart.tile(t).name.as_str()))
                .unwrap_or(Value::Absent),
            EventField::Room => Value::from(self.cart.room(self.state.room).name.as_str()),
            EventField::Game => Value::from(self.cart.meta.name.as_str()),
            EventField::Player => Value::from(self.cart.tile(self.state.player.tile).name.as_str()),
            EventField::Frame => Value::Number(ctx.frame as f64),
            EventField::Aa => Value::Number(ctx.aa),
            EventField::Ra => Value::Number(ctx.ra),
            EventField::Custom(name) => ctx.custom.get(name).cloned().unwrap_or(Value::Absent),
        }
    }

    fn write(&mut self, var: &VarRef, value: Value) {
        match var {
            VarRef::Global(name) => self.state.set_global(name, value),
            VarRef::Config(name) => self.state.config.set(name, value.into_config()),
            VarRef::Event(field) => tracing::warn!("event.{:?} is read-only; write dropped", field),
            VarRef::DateTime(field) => tracing::warn!("datetime.{:?} is read-only; write dropped", field),
            VarRef::UnknownDate(name) => tracing::warn!("datetime.{} is read-only; write dropped", name),
        }
    }

    fn update(&mut self, op: UpdateOp, target: &VarRef, operand: Option<&Expr>, scope: &Scope) -> Value {
        let current = self.read(target, scope).as_number();
        let operand = match operand {
            Some(e) => self.eval(e, scope).as_number(),
            None => 1.0,
        };
        let next = match op {
            UpdateOp::Inc => current + 1.0,
            UpdateOp::Dec => current - 1.0,
            UpdateOp::Add => current + operand,
            UpdateOp::Sub => current - operand,
            UpdateOp::Mul => current * operand,
            UpdateOp::Div => {
                if operand == 0.0 {
                    tracing::warn!("Division by zero updating {:?}; value unchanged", target);
                    return Value::Number(current);
                }
                current / operand
            }
        };
        self.write(target, Value::Number(next));
        Value::Number(next)
    }

    // ---- tiles ----

    /// Tile by id (number) or name (string)
    fn resolve_tile(&self, value: &Value) -> Option<TileId> {
        match value {
            Value::Number(n) if *n >= 0.0 && (*n as usize) < self.cart.tiles.len() => Some(*n as usize),
            Value::Str(name) => self.cart.tile_by_name(name),
            _ => None,
        }
    }

    fn resolve_room(&self, value: &Value) -> Option<RoomId> {
        match value {
            Value::Number(n) if *n >= 0.0 && (*n as usize) < self.cart.rooms.len() => Some(*n as usize),
            Value::Str(name) => self.cart.room_by_name(name),
            _ => None,
        }
    }

    /// Cell a tile-scoped operation applies to
    fn scope_cell(scope: &Scope) -> (i32, i32) {
        match scope.this {
            SelfRef::Tile { cell: Some(cell), .. } => cell,
            _ => (scope.ctx.x, scope.ctx.y),
        }
    }

    fn inspect(&mut self, query: TileQuery, target: Option<&TileAddr>, scope: &Scope) -> Value {
        let tile = match target {
            None => self.state.tile_at(scope.ctx.x, scope.ctx.y),
            Some(TileAddr::Cell(x, y)) => {
                let x = coord(&self.eval(x, scope));
                let y = coord(&self.eval(y, scope));
                self.state.tile_at(x, y)
            }
            Some(TileAddr::Named(r)) => {
                let value = self.eval(r, scope);
                self.resolve_tile(&value)
            }
        };
        let Some(tile) = tile else {
            tracing::warn!("{:?}: reference does not resolve to a tile", query);
            return Value::Absent;
        };
        let tile = self.cart.tile(tile);
        match query {
            TileQuery::Kind => Value::from(tile.kind.as_str()),
            TileQuery::Solid => Value::from(tile.solid),
            TileQuery::Id => Value::Number(tile.id as f64),
            TileQuery::Name => Value::from(tile.name.as_str()),
        }
    }

    fn swap(&mut self, value: &Value, scope: &Scope) {
        let Some(tile) = self.resolve_tile(value) else {
            tracing::warn!("swap: no tile {:?}", value);
            return;
        };
        if scope.this == SelfRef::Player {
            self.state.player.tile = tile;
            self.state.player.frame = None;
            return;
        }
        let (x, y) = Self::scope_cell(scope);
        if !self.state.set_tile(x, y, tile) {
            tracing::warn!("swap: cell ({}, {}) is outside the room", x, y);
        }
    }

    /// Get (no argument) or set the animation frame of the player or a cell
    fn frame(&mut self, index: Option<Value>, scope: &Scope) -> Value {
        let frame_ix = self.state.frame_ix;
        if scope.this == SelfRef::Player {
            if let Some(index) = index {
                self.state.player.frame = Some(index.as_number().max(0.0) as usize);
            }
            let tile = self.cart.tile(self.state.player.tile);
            let current = self.state.player.frame.unwrap_or_else(|| tile.frame_index(frame_ix));
            return Value::Number(current as f64);
        }
        let (x, y) = Self::scope_cell(scope);
        let (Some(cell), Some(tile)) = (cell_index(x, y), self.state.tile_at(x, y)) else {
            tracing::warn!("frame: cell ({}, {}) is outside the room", x, y);
            return Value::Absent;
        };
        if let Some(index) = index {
            self.state.cell_frames.insert(cell, index.as_number().max(0.0) as usize);
        }
        let current = self
            .state
            .cell_frames
            .get(&cell)
            .copied()
            .unwrap_or_else(|| self.cart.tile(tile).frame_index(frame_ix));
        Value::Number(current as f64)
    }

    // ---- scoped dispatch ----

    fn tell(&mut self, target: &TellTarget, body: usize, scope: &Scope) {
        let builder = EventContext::builder(&scope.ctx);
        let (this, ctx) = match target {
            TellTarget::Player => (SelfRef::Player, builder.at(self.state.player.x, self.state.player.y).build()),
            TellTarget::Room => (SelfRef::Room, builder.build()),
            TellTarget::Game => (SelfRef::Game, builder.build()),
            TellTarget::Cell(x, y) => {
                let x = coord(&self.eval(x, scope));
                let y = coord(&self.eval(y, scope));
                let Some(tile) = self.state.tile_at(x, y) else {
                    tracing::warn!("tell: cell ({}, {}) is outside the room", x, y);
                    return;
                };
                (SelfRef::Tile { tile, cell: Some((x, y)) }, builder.at(x, y).tile(tile).build())
            }
            TellTarget::Tile(r) => {
                let value = self.eval(r, scope);
                let Some(tile) = self.resolve_tile(&value) else {
                    tracing::warn!("tell: no tile {:?}", value);
                    return;
                };
                let cell = self.state.find_tile(tile);
                let builder = match cell {
                    Some((x, y)) => builder.at(x, y),
                    None => builder,
                };
                (SelfRef::Tile { tile, cell }, builder.tile(tile).build())
            }
        };
        // the block belongs to the calling script; only self and position change
        let inner = Scope {
            script: scope.script,
            this,
            ctx,
        };
        self.exec_block(body, &inner);
    }

    // ---- audio ----

    fn play_sound(&mut self, value: &Value) {
        let index = match value {
            Value::Number(n) if *n >= 0.0 => Some(*n as usize).filter(|&i| i < self.cart.sounds.len()),
            Value::Str(name) => self.cart.sound_by_name(name),
            _ => None,
        };
        match index {
            Some(i) => self.host.audio.play_sound(&self.cart.sounds[i]),
            None => tracing::warn!("sound: no sound {:?}", value),
        }
    }

    fn play_music(&mut self, cmd: MusicCmd, value: &Value) {
        let index = match value {
            Value::Number(n) if *n >= 0.0 => Some(*n as usize).filter(|&i| i < self.cart.songs.len()),
            Value::Str(name) => self.cart.song_by_name(name),
            _ => None,
        };
        let Some(i) = index else {
            tracing::warn!("{:?}: no song {:?}", cmd, value);
            return;
        };
        let song = &self.cart.songs[i];
        match cmd {
            MusicCmd::Once => self.host.audio.play_once_music(song),
            MusicCmd::Loop => self.host.audio.loop_music(song),
        }
    }

    // ---- dialog ----

    /// Show (or queue) a message; pending button presses are dropped
    pub fn say(&mut self, text: String, callback: DialogCallback) {
        let state = &mut *self.state;
        state.input.clear();
        state.dialog.say(text, callback, &state.config);
    }
}

/// Row-major cell coordinate for a grid index
pub(crate) fn cell_coords(index: usize) -> (i32, i32) {
    ((index % ROOM_WIDTH) as i32, (index / ROOM_WIDTH) as i32)
}
