//! Script AST: a closed set of node kinds, parsed once at load time.
//!
//! Cartridge scripts arrive as JSON trees: a literal is a number or string,
//! everything else is an array `["op", arg1, ...]`. Parsing resolves operator
//! names and dotted variable names (`event.x`, `config.autoAct`) up front so
//! the interpreter never re-splits strings while running. Operators the
//! engine does not know become [`Expr::Unknown`] and are reported once when
//! first evaluated.

use std::collections::HashMap;

use serde_json::Value as Json;

use crate::value::Value;

// ---------------------------------------------------------------------------
// Variable addressing
// ---------------------------------------------------------------------------

/// Fields of the per-invocation event context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventField {
    X,
    Y,
    Px,
    Py,
    Dx,
    Dy,
    Tx,
    Ty,
    Tile,
    Room,
    Game,
    Player,
    Frame,
    /// Absolute crank angle
    Aa,
    /// Relative crank change
    Ra,
    Custom(String),
}

impl EventField {
    fn parse(name: &str) -> Self {
        match name {
            "x" => EventField::X,
            "y" => EventField::Y,
            "px" => EventField::Px,
            "py" => EventField::Py,
            "dx" => EventField::Dx,
            "dy" => EventField::Dy,
            "tx" => EventField::Tx,
            "ty" => EventField::Ty,
            "tile" => EventField::Tile,
            "room" => EventField::Room,
            "game" => EventField::Game,
            "player" => EventField::Player,
            "frame" => EventField::Frame,
            "aa" => EventField::Aa,
            "ra" => EventField::Ra,
            other => EventField::Custom(other.to_string()),
        }
    }
}

/// Wall-clock fields under `datetime.*`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Year,
    Month,
    Day,
    Weekday,
    Hour,
    Hour12,
    Minute,
    Second,
    Millisecond,
    AmPm,
    Timestamp,
}

impl DateField {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "year" => DateField::Year,
            "month" => DateField::Month,
            "day" => DateField::Day,
            "weekday" => DateField::Weekday,
            "hour" => DateField::Hour,
            "hour12" => DateField::Hour12,
            "minute" => DateField::Minute,
            "second" => DateField::Second,
            "millisecond" => DateField::Millisecond,
            "ampm" => DateField::AmPm,
            "timestamp" => DateField::Timestamp,
            _ => return None,
        })
    }
}

/// A variable name split into namespace and field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VarRef {
    Global(String),
    Event(EventField),
    Config(String),
    DateTime(DateField),
    /// `datetime.*` name that does not exist
    UnknownDate(String),
}

impl VarRef {
    pub fn parse(name: &str) -> Self {
        match name.split_once('.') {
            Some(("event", field)) => VarRef::Event(EventField::parse(field)),
            Some(("config", field)) => VarRef::Config(field.to_string()),
            Some(("datetime", field)) => match DateField::parse(field) {
                Some(f) => VarRef::DateTime(f),
                None => VarRef::UnknownDate(field.to_string()),
            },
            _ => VarRef::Global(name.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Nodes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// In-place numeric updates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOp {
    Inc,
    Dec,
    Add,
    Sub,
    Mul,
    Div,
}

/// What `type` / `solid` / `id` / `name` report about a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileQuery {
    Kind,
    Solid,
    Id,
    Name,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathFn {
    Sine,
    Cosine,
    Tangent,
    Floor,
    Ceil,
    Round,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadSide {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicCmd {
    Once,
    Loop,
}

/// How a tile is addressed: by cell or by id/name
#[derive(Debug, Clone, PartialEq)]
pub enum TileAddr {
    Cell(Box<Expr>, Box<Expr>),
    Named(Box<Expr>),
}

/// Who a `tell` block runs as
#[derive(Debug, Clone, PartialEq)]
pub enum TellTarget {
    Player,
    Room,
    Game,
    Cell(Box<Expr>, Box<Expr>),
    Tile(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Get(VarRef),
    Set(VarRef, Box<Expr>),
    Update {
        op: UpdateOp,
        target: VarRef,
        operand: Option<Box<Expr>>,
    },
    Compare {
        op: CompareOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Block(usize),
    If {
        branches: Vec<(Expr, usize)>,
        otherwise: Option<usize>,
    },
    While {
        cond: Box<Expr>,
        body: usize,
    },
    Done,
    Inspect {
        query: TileQuery,
        target: Option<TileAddr>,
    },
    Swap(Box<Expr>),
    Frame(Option<Box<Expr>>),
    Tell {
        target: TellTarget,
        body: usize,
    },
    Call(Box<Expr>),
    Emit(Box<Expr>),
    Act,
    Goto {
        x: Box<Expr>,
        y: Box<Expr>,
        room: Option<Box<Expr>>,
    },
    Wait {
        seconds: Box<Expr>,
        body: usize,
    },
    Say {
        message: Box<Expr>,
        then: Option<usize>,
    },
    Fin(Box<Expr>),
    Store(Option<String>),
    Restore(Option<String>),
    Toss(Option<String>),
    Sound(Box<Expr>),
    Music(MusicCmd, Box<Expr>),
    StopMusic,
    Bpm(Box<Expr>),
    Format(Vec<Expr>),
    Pad {
        side: PadSide,
        value: Box<Expr>,
        width: Box<Expr>,
        fill: Option<Box<Expr>>,
    },
    Math(MathFn, Box<Expr>),
    Random(Box<Expr>, Box<Expr>),
    Log(Box<Expr>),
    Unknown(String),
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn literal(json: &Json) -> Option<Value> {
    match json {
        Json::Number(n) => Some(Value::Number(n.as_f64().unwrap_or(0.0))),
        Json::String(s) => Some(Value::Str(s.clone())),
        Json::Bool(b) => Some(Value::from(*b)),
        Json::Null => Some(Value::Absent),
        _ => None,
    }
}

fn boxed(json: Option<&Json>) -> Box<Expr> {
    Box::new(json.map(parse_node).unwrap_or(Expr::Literal(Value::Absent)))
}

fn opt_boxed(json: Option<&Json>) -> Option<Box<Expr>> {
    json.map(|j| Box::new(parse_node(j)))
}

fn name_arg(json: Option<&Json>) -> Option<String> {
    match json? {
        Json::String(s) => Some(s.clone()),
        Json::Array(items) if items.first().and_then(Json::as_str) == Some("get") => {
            items.get(1).and_then(Json::as_str).map(str::to_string)
        }
        _ => None,
    }
}

fn block_arg(json: Option<&Json>) -> Option<usize> {
    match json? {
        Json::Number(n) => n.as_u64().map(|n| n as usize),
        Json::Array(items) if items.first().and_then(Json::as_str) == Some("block") => {
            items.get(1).and_then(Json::as_u64).map(|n| n as usize)
        }
        _ => None,
    }
}

fn cell_pair(json: &Json) -> Option<(Box<Expr>, Box<Expr>)> {
    match json {
        Json::Array(items) if items.first().and_then(Json::as_str) == Some("xy") => {
            Some((boxed(items.get(1)), boxed(items.get(2))))
        }
        _ => None,
    }
}

fn tile_addr(args: &[Json]) -> Option<TileAddr> {
    match args {
        [] => None,
        [single] => Some(match cell_pair(single) {
            Some((x, y)) => TileAddr::Cell(x, y),
            None => TileAddr::Named(Box::new(parse_node(single))),
        }),
        [x, y, ..] => Some(TileAddr::Cell(Box::new(parse_node(x)), Box::new(parse_node(y)))),
    }
}

fn tell_target(json: Option<&Json>) -> TellTarget {
    let Some(json) = json else {
        return TellTarget::Tile(Box::new(Expr::Literal(Value::Absent)));
    };
    if let Some((x, y)) = cell_pair(json) {
        return TellTarget::Cell(x, y);
    }
    match parse_node(json) {
        Expr::Get(VarRef::Event(EventField::Player)) => TellTarget::Player,
        Expr::Get(VarRef::Event(EventField::Room)) => TellTarget::Room,
        Expr::Get(VarRef::Event(EventField::Game)) => TellTarget::Game,
        other => TellTarget::Tile(Box::new(other)),
    }
}

fn parse_if(args: &[Json]) -> Expr {
    let mut branches = Vec::new();
    let mut otherwise = None;
    if let (Some(cond), Some(body)) = (args.first(), block_arg(args.get(1))) {
        branches.push((parse_node(cond), body));
    }
    for clause in args.iter().skip(2) {
        let Json::Array(parts) = clause else {
            continue;
        };
        match parts.first().and_then(Json::as_str) {
            Some("elseif") => {
                if let (Some(cond), Some(body)) = (parts.get(1), block_arg(parts.get(2))) {
                    branches.push((parse_node(cond), body));
                }
            }
            Some("else") => otherwise = block_arg(parts.get(1)),
            _ => {}
        }
    }
    Expr::If { branches, otherwise }
}

fn update(op: UpdateOp, args: &[Json]) -> Expr {
    match name_arg(args.first()) {
        Some(name) => Expr::Update {
            op,
            target: VarRef::parse(&name),
            operand: opt_boxed(args.get(1)),
        },
        None => Expr::Unknown(format!("{:?} without a variable name", op).to_lowercase()),
    }
}

fn compare(op: CompareOp, args: &[Json]) -> Expr {
    Expr::Compare {
        op,
        lhs: boxed(args.first()),
        rhs: boxed(args.get(1)),
    }
}

/// Parse one node of the cartridge's JSON script tree
pub fn parse_node(json: &Json) -> Expr {
    if let Some(value) = literal(json) {
        return Expr::Literal(value);
    }
    let items = match json {
        Json::Array(items) => items.as_slice(),
        _ => return Expr::Unknown("<object>".to_string()),
    };
    let Some(op) = items.first().and_then(Json::as_str) else {
        return Expr::Unknown("<malformed>".to_string());
    };
    let args = &items[1..];

    match op {
        "get" => match name_arg(args.first()) {
            Some(name) => Expr::Get(VarRef::parse(&name)),
            None => Expr::Unknown("get".to_string()),
        },
        "set" => match name_arg(args.first()) {
            Some(name) => Expr::Set(VarRef::parse(&name), boxed(args.get(1))),
            None => Expr::Unknown("set".to_string()),
        },
        "inc" => update(UpdateOp::Inc, args),
        "dec" => update(UpdateOp::Dec, args),
        "add" => update(UpdateOp::Add, args),
        "sub" => update(UpdateOp::Sub, args),
        "mul" => update(UpdateOp::Mul, args),
        "div" => update(UpdateOp::Div, args),
        "==" => compare(CompareOp::Eq, args),
        "!=" => compare(CompareOp::Ne, args),
        "<" => compare(CompareOp::Lt, args),
        "<=" => compare(CompareOp::Le, args),
        ">" => compare(CompareOp::Gt, args),
        ">=" => compare(CompareOp::Ge, args),
        "block" => match block_arg(args.first()) {
            Some(idx) => Expr::Block(idx),
            None => Expr::Unknown("block".to_string()),
        },
        "if" => parse_if(args),
        "while" => match block_arg(args.get(1)) {
            Some(body) => Expr::While {
                cond: boxed(args.first()),
                body,
            },
            None => Expr::Unknown("while".to_string()),
        },
        "done" => Expr::Done,
        "type" => Expr::Inspect { query: TileQuery::Kind, target: tile_addr(args) },
        "solid" => Expr::Inspect { query: TileQuery::Solid, target: tile_addr(args) },
        "id" => Expr::Inspect { query: TileQuery::Id, target: tile_addr(args) },
        "name" => Expr::Inspect { query: TileQuery::Name, target: tile_addr(args) },
        "swap" => Expr::Swap(boxed(args.first())),
        "frame" => Expr::Frame(opt_boxed(args.first())),
        "tell" => match block_arg(args.get(1)) {
            Some(body) => Expr::Tell {
                target: tell_target(args.first()),
                body,
            },
            None => Expr::Unknown("tell".to_string()),
        },
        "call" => Expr::Call(boxed(args.first())),
        "emit" => Expr::Emit(boxed(args.first())),
        "act" => Expr::Act,
        "goto" => {
            // goto accepts either (x, y[, room]) or (["xy", x, y][, room])
            match args.first().and_then(cell_pair) {
                Some((x, y)) => Expr::Goto { x, y, room: opt_boxed(args.get(1)) },
                None => Expr::Goto {
                    x: boxed(args.first()),
                    y: boxed(args.get(1)),
                    room: opt_boxed(args.get(2)),
                },
            }
        }
        "wait" => match block_arg(args.get(1)) {
            Some(body) => Expr::Wait {
                seconds: boxed(args.first()),
                body,
            },
            None => Expr::Unknown("wait".to_string()),
        },
        "say" => Expr::Say {
            message: boxed(args.first()),
            then: block_arg(args.get(1)),
        },
        "fin" => Expr::Fin(boxed(args.first())),
        "store" => Expr::Store(name_arg(args.first())),
        "restore" => Expr::Restore(name_arg(args.first())),
        "toss" => Expr::Toss(name_arg(args.first())),
        "sound" => Expr::Sound(boxed(args.first())),
        "once" => Expr::Music(MusicCmd::Once, boxed(args.first())),
        "loop" => Expr::Music(MusicCmd::Loop, boxed(args.first())),
        "stop" => Expr::StopMusic,
        "bpm" => Expr::Bpm(boxed(args.first())),
        "format" => Expr::Format(args.iter().map(parse_node).collect()),
        "lpad" | "rpad" => Expr::Pad {
            side: if op == "lpad" { PadSide::Left } else { PadSide::Right },
            value: boxed(args.first()),
            width: boxed(args.get(1)),
            fill: opt_boxed(args.get(2)),
        },
        "sine" => Expr::Math(MathFn::Sine, boxed(args.first())),
        "cosine" => Expr::Math(MathFn::Cosine, boxed(args.first())),
        "tangent" => Expr::Math(MathFn::Tangent, boxed(args.first())),
        "floor" => Expr::Math(MathFn::Floor, boxed(args.first())),
        "ceil" => Expr::Math(MathFn::Ceil, boxed(args.first())),
        "round" => Expr::Math(MathFn::Round, boxed(args.first())),
        "random" => Expr::Random(boxed(args.first()), boxed(args.get(1))),
        "log" => Expr::Log(boxed(args.first())),
        other => Expr::Unknown(other.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Scripts
// ---------------------------------------------------------------------------

/// Event name of the catch-all handler
pub const ANY_EVENT: &str = "any";
const BLOCKS_KEY: &str = "__blocks";

/// One parsed script: event handlers plus the block table they reference
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    handlers: HashMap<String, Expr>,
    any: Option<Expr>,
    blocks: Vec<Vec<Expr>>,
}

impl Script {
    /// Parse a script's `data` object. Keys starting with `__` other than the
    /// block table are editor metadata and are skipped.
    pub fn parse(data: &serde_json::Map<String, Json>) -> Self {
        let mut script = Script::default();
        for (key, node) in data {
            if key == BLOCKS_KEY {
                if let Json::Array(blocks) = node {
                    script.blocks = blocks
                        .iter()
                        .map(|block| match block {
                            Json::Array(stmts) => stmts.iter().map(parse_node).collect(),
                            _ => Vec::new(),
                        })
                        .collect();
                }
            } else if key.starts_with("__") {
                continue;
            } else if key == ANY_EVENT {
                script.any = Some(parse_node(node));
            } else {
                script.handlers.insert(key.clone(), parse_node(node));
            }
        }
        script
    }

    pub fn handler(&self, event: &str) -> Option<&Expr> {
        self.handlers.get(event)
    }

    pub fn catch_all(&self) -> Option<&Expr> {
        self.any.as_ref()
    }

    pub fn handles(&self, event: &str) -> bool {
        self.handlers.contains_key(event)
    }

    pub fn block(&self, idx: usize) -> Option<&[Expr]> {
        self.blocks.get(idx).map(Vec::as_slice)
    }
}
