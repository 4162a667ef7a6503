//! Event context and dispatch scope
//!
//! An [`EventContext`] is the read-only record a script sees through
//! `event.*`. The engine keeps one running base context (player position,
//! last move, crank, frame); each dispatch layers event overrides and then
//! the dispatch binding (the cell a tile script runs for) on top of it.

use std::collections::BTreeMap;

use crate::cartridge::{ScriptId, TileId};
use crate::value::Value;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventContext {
    /// Coordinate the invocation is about
    pub x: i32,
    pub y: i32,
    /// Player position
    pub px: i32,
    pub py: i32,
    /// Last attempted move
    pub dx: i32,
    pub dy: i32,
    /// Last attempted destination
    pub tx: i32,
    pub ty: i32,
    /// Tile bound by the dispatcher, if any
    pub tile: Option<TileId>,
    pub frame: u64,
    /// Crank: absolute angle and relative change
    pub aa: f64,
    pub ra: f64,
    pub custom: BTreeMap<String, Value>,
}

impl EventContext {
    pub fn builder(base: &EventContext) -> ContextBuilder {
        ContextBuilder { ctx: base.clone() }
    }
}

/// Layers overrides onto a base context; later calls win
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    ctx: EventContext,
}

impl ContextBuilder {
    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.ctx.x = x;
        self.ctx.y = y;
        self
    }

    pub fn tile(mut self, tile: TileId) -> Self {
        self.ctx.tile = Some(tile);
        self
    }

    pub fn custom(mut self, name: impl Into<String>, value: Value) -> Self {
        self.ctx.custom.insert(name.into(), value);
        self
    }

    pub fn merge_custom(mut self, fields: &BTreeMap<String, Value>) -> Self {
        for (k, v) in fields {
            self.ctx.custom.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn build(self) -> EventContext {
        self.ctx
    }
}

/// Which entity a running script acts as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelfRef {
    Game,
    Room,
    Player,
    /// A tile, optionally bound to the cell it was dispatched for
    Tile { tile: TileId, cell: Option<(i32, i32)> },
}

/// Everything a running script body needs to resolve names and blocks
#[derive(Debug, Clone, PartialEq)]
pub struct Scope {
    pub script: ScriptId,
    pub this: SelfRef,
    pub ctx: EventContext,
}

/// A block to run later, with the scope it was created in
#[derive(Debug, Clone, PartialEq)]
pub struct Continuation {
    pub scope: Scope,
    pub block: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_layers_overrides() {
        let base = EventContext {
            x: 1,
            y: 1,
            px: 4,
            py: 5,
            ..Default::default()
        };
        let ctx = EventContext::builder(&base)
            .custom("door", Value::from("open"))
            .at(7, 8)
            .tile(3)
            .build();
        assert_eq!((ctx.x, ctx.y), (7, 8));
        assert_eq!((ctx.px, ctx.py), (4, 5));
        assert_eq!(ctx.tile, Some(3));
        assert_eq!(ctx.custom.get("door"), Some(&Value::from("open")));
        // base untouched
        assert_eq!(base.x, 1);
    }
}
