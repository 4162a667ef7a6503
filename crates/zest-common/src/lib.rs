//! Common types shared across the Zest crates
//!
//! - Screen and room geometry, tick rate
//! - Logical buttons exposed to the host
//! - Engine configuration (the `config.*` namespace scripts see)
//! - The error type used at load time

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Room grid width in cells
pub const ROOM_WIDTH: usize = 25;
/// Room grid height in cells
pub const ROOM_HEIGHT: usize = 15;
/// Cells per room
pub const ROOM_CELLS: usize = ROOM_WIDTH * ROOM_HEIGHT;
/// Edge length of one cell / tile frame in pixels
pub const CELL_SIZE: usize = 8;
/// Logical screen size in pixels
pub const SCREEN_WIDTH: usize = ROOM_WIDTH * CELL_SIZE;
pub const SCREEN_HEIGHT: usize = ROOM_HEIGHT * CELL_SIZE;
/// Fixed engine rate
pub const TICKS_PER_SECOND: u32 = 20;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Error, Debug)]
pub enum ZestError {
    #[error("Malformed cartridge: {0}")]
    Cartridge(String),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ZestError>;

// ---------------------------------------------------------------------------
// Buttons
// ---------------------------------------------------------------------------

/// The fixed set of logical buttons a host can press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Button {
    Up,
    Right,
    Down,
    Left,
    A,
    B,
}

impl Button {
    /// All buttons, in polling order
    pub const ALL: [Button; 6] = [
        Button::Up,
        Button::Right,
        Button::Down,
        Button::Left,
        Button::A,
        Button::B,
    ];

    pub fn index(self) -> usize {
        match self {
            Button::Up => 0,
            Button::Right => 1,
            Button::Down => 2,
            Button::Left => 3,
            Button::A => 4,
            Button::B => 5,
        }
    }

    /// Movement delta for direction buttons
    pub fn direction(self) -> Option<(i32, i32)> {
        match self {
            Button::Up => Some((0, -1)),
            Button::Right => Some((1, 0)),
            Button::Down => Some((0, 1)),
            Button::Left => Some((-1, 0)),
            Button::A | Button::B => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Time conversion
// ---------------------------------------------------------------------------

/// Convert seconds to whole ticks, rounding up. Zero stays zero.
pub fn seconds_to_ticks(seconds: f64) -> u32 {
    if !seconds.is_finite() || seconds <= 0.0 {
        return 0;
    }
    // 0.1 * 20 must come out as exactly 2, not 3
    let ticks = seconds * TICKS_PER_SECOND as f64 - 1e-9;
    ticks.ceil().max(0.0) as u32
}

// ---------------------------------------------------------------------------
// Engine configuration
// ---------------------------------------------------------------------------

/// A script-visible config value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Number(f64),
    Text(String),
}

/// Engine configuration, readable and writable from scripts via `config.*`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Walking into a sprite interacts with it immediately
    pub auto_act: bool,
    /// Held direction buttons repeat
    pub input_repeat: bool,
    /// Seconds before a held direction starts repeating
    pub input_repeat_delay: f64,
    /// Seconds between repeats once repeating
    pub input_repeat_between: f64,
    /// Seconds a new dialog page ignores advance presses
    pub say_advance_delay: f64,
    /// Dialog characters revealed per second
    pub text_speed: f64,
    /// Advancing an unfinished page reveals it fully first
    pub text_skip: bool,
    /// Anything else scripts stash under `config.*`
    #[serde(flatten)]
    pub extra: BTreeMap<String, ConfigValue>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            auto_act: true,
            input_repeat: true,
            input_repeat_delay: 0.4,
            input_repeat_between: 0.2,
            say_advance_delay: 0.2,
            text_speed: 20.0,
            text_skip: true,
            extra: BTreeMap::new(),
        }
    }
}

fn flag(value: &ConfigValue) -> bool {
    match value {
        ConfigValue::Number(n) => *n != 0.0,
        ConfigValue::Text(s) => !s.is_empty(),
    }
}

fn number(value: &ConfigValue) -> f64 {
    match value {
        ConfigValue::Number(n) => *n,
        ConfigValue::Text(s) => s.trim().parse().unwrap_or(0.0),
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = toml::from_str(&text)?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Read a field by its script name (e.g. "autoAct")
    pub fn get(&self, name: &str) -> Option<ConfigValue> {
        let bool_value = |b: bool| ConfigValue::Number(if b { 1.0 } else { 0.0 });
        match name {
            "autoAct" => Some(bool_value(self.auto_act)),
            "inputRepeat" => Some(bool_value(self.input_repeat)),
            "inputRepeatDelay" => Some(ConfigValue::Number(self.input_repeat_delay)),
            "inputRepeatBetween" => Some(ConfigValue::Number(self.input_repeat_between)),
            "sayAdvanceDelay" => Some(ConfigValue::Number(self.say_advance_delay)),
            "textSpeed" => Some(ConfigValue::Number(self.text_speed)),
            "textSkip" => Some(bool_value(self.text_skip)),
            _ => self.extra.get(name).cloned(),
        }
    }

    /// Write a field by its script name
    pub fn set(&mut self, name: &str, value: ConfigValue) {
        match name {
            "autoAct" => self.auto_act = flag(&value),
            "inputRepeat" => self.input_repeat = flag(&value),
            "inputRepeatDelay" => self.input_repeat_delay = number(&value),
            "inputRepeatBetween" => self.input_repeat_between = number(&value),
            "sayAdvanceDelay" => self.say_advance_delay = number(&value),
            "textSpeed" => self.text_speed = number(&value),
            "textSkip" => self.text_skip = flag(&value),
            _ => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }

    pub fn repeat_delay_ticks(&self) -> u32 {
        seconds_to_ticks(self.input_repeat_delay).max(1)
    }

    pub fn repeat_interval_ticks(&self) -> u32 {
        seconds_to_ticks(self.input_repeat_between).max(1)
    }

    pub fn say_lock_ticks(&self) -> u32 {
        seconds_to_ticks(self.say_advance_delay)
    }

    /// Characters revealed per tick (fractional rates accumulate)
    pub fn chars_per_tick(&self) -> f64 {
        (self.text_speed / TICKS_PER_SECOND as f64).max(0.0)
    }
}
