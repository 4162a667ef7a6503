//! Zest rules engine
//!
//! Runs tile-grid cartridges: a small event-driven scripting language bound
//! to a deterministic 20 Hz tick loop.
//!
//! Layout:
//!   ast        parsed script nodes and dotted-name resolution
//!   cartridge  raw JSON format and the resolved model
//!   script     interpreter, event dispatch, movement and room changes
//!   dialog     wrap, pagination, typewriter reveal
//!   input      button debounce and repeat
//!   timers     `wait` continuations
//!   clock      wall time to ticks
//!   state      the mutable session aggregate
//!   host       renderer / audio / store traits the host implements
//!   engine     the façade hosts drive

pub mod ast;
pub mod cartridge;
pub mod clock;
pub mod context;
pub mod dialog;
pub mod engine;
pub mod host;
pub mod input;
pub mod script;
pub mod state;
pub mod timers;
pub mod value;

pub use cartridge::{minify, Cartridge, MetaInfo};
pub use context::SelfRef;
pub use engine::Engine;
pub use host::{AudioEngine, Host, MemoryStore, PersistentStore, RenderFrame, Renderer};
pub use script::MoveOutcome;
pub use value::Value;
