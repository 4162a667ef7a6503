/// Zest Player: runs Zest tile-grid cartridges in a desktop window
///
/// Architecture:
///   display  minifb framebuffer renderer
///   audio    cue logging
///   save     JSON-file persistent store

mod audio;
mod display;
mod save;

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use minifb::{Key, KeyRepeat, Window, WindowOptions};
use tracing_subscriber::EnvFilter;
use zest_common::{Button, EngineConfig};
use zest_engine::{minify, Engine, Host};

use crate::audio::LoggingAudio;
use crate::display::Display;
use crate::save::JsonFileStore;

/// How long the title card shows before play starts
const TITLE_SCREEN: Duration = Duration::from_millis(1200);
const FPS: usize = 60;
/// Crank degrees per scroll-wheel step
const CRANK_STEP: f64 = 15.0;

#[derive(Parser, Debug)]
#[command(name = "zest", version, about = "Play Zest tile-grid cartridges")]
struct Args {
    /// Cartridge JSON file
    cartridge: PathBuf,

    /// Engine configuration (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Persistent store file [default: next to the cartridge]
    #[arg(short, long)]
    save: Option<PathBuf>,

    /// Window scale factor
    #[arg(long, default_value_t = 4)]
    scale: usize,

    /// Write a minified copy of the cartridge to this path and exit
    #[arg(long)]
    minify: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("zest=debug".parse()?))
        .init();

    tracing::info!("Zest Player v{}", env!("CARGO_PKG_VERSION"));
    let args = Args::parse();

    let source = std::fs::read_to_string(&args.cartridge)
        .with_context(|| format!("Failed to read cartridge {}", args.cartridge.display()))?;

    if let Some(out) = &args.minify {
        return write_minified(&source, out);
    }

    let config = match &args.config {
        Some(path) => EngineConfig::load(path).with_context(|| format!("Failed to load config {}", path.display()))?,
        None => EngineConfig::default(),
    };

    let save_path = args
        .save
        .clone()
        .unwrap_or_else(|| args.cartridge.with_extension("store.json"));
    tracing::info!("Store: {}", save_path.display());

    let display = Display::new(args.scale);
    let host = Host::new(display.renderer(), LoggingAudio::default(), JsonFileStore::open(&save_path));
    let engine = Engine::load(&source, config, host)
        .with_context(|| format!("Failed to load cartridge {}", args.cartridge.display()))?;

    run(engine, display)
}

fn write_minified(source: &str, out: &Path) -> Result<()> {
    let mut doc: serde_json::Value = serde_json::from_str(source).context("Cartridge is not valid JSON")?;
    minify(&mut doc);
    let text = serde_json::to_string(&doc)?;
    std::fs::write(out, &text).with_context(|| format!("Failed to write {}", out.display()))?;
    tracing::info!("Minified {} → {} bytes: {}", source.len(), text.len(), out.display());
    Ok(())
}

/// Keyboard key driving each engine button
fn key_for(button: Button) -> Key {
    match button {
        Button::Up => Key::Up,
        Button::Right => Key::Right,
        Button::Down => Key::Down,
        Button::Left => Key::Left,
        Button::A => Key::S,
        Button::B => Key::A,
    }
}

fn run(mut engine: Engine, mut display: Display) -> Result<()> {
    let meta = engine.meta().clone();
    let (win_w, win_h) = display.size();
    let mut window = Window::new(
        &format!("{} by {}", meta.name, meta.author),
        win_w,
        win_h,
        WindowOptions::default(),
    )
    .map_err(|e| anyhow::anyhow!("Window creation failed: {}", e))?;
    window.set_target_fps(FPS);

    tracing::info!("Controls: arrows=move | S=A | A=B | Space=pause | wheel=crank | Esc=quit");

    let started = Instant::now();
    let mut on_title = true;
    let mut held = [false; Button::ALL.len()];
    let mut crank = 0.0_f64;
    let mut last = Instant::now();

    while window.is_open() && !window.is_key_down(Key::Escape) {
        if on_title && started.elapsed() >= TITLE_SCREEN {
            on_title = false;
            engine.play();
        }

        if window.is_key_pressed(Key::Space, KeyRepeat::No) {
            engine.pause_resume();
        }

        // report edges only; the engine does its own repeat
        for button in Button::ALL {
            let down = window.is_key_down(key_for(button));
            let was = &mut held[button.index()];
            if down && !*was {
                engine.press_button(button);
            } else if !down && *was {
                engine.release_button(button);
            }
            *was = down;
        }

        if let Some((_, dy)) = window.get_scroll_wheel() {
            if dy != 0.0 {
                let delta = dy.signum() as f64 * CRANK_STEP;
                crank = (crank + delta).rem_euclid(360.0);
                engine.turn_crank(crank, delta);
            }
        }

        let now = Instant::now();
        engine.update(now.duration_since(last).as_secs_f64());
        last = now;

        display.present(&mut window)?;
    }

    engine.stop();
    tracing::info!("Player shutdown");
    Ok(())
}
