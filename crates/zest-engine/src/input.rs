//! Button debounce and repeat
//!
//! Hosts report raw press/release edges at any time; the engine polls each
//! button exactly once per tick. A press is latched until the next poll so a
//! tap shorter than one tick is still seen.

use zest_common::{Button, EngineConfig};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pressed: bool,
    /// Pressed since the last poll
    fresh: bool,
    /// Ticks held since the last activation
    held: u32,
    repeating: bool,
}

impl ButtonState {
    pub fn press(&mut self) {
        if self.pressed {
            return;
        }
        self.pressed = true;
        self.fresh = true;
        self.held = 0;
        self.repeating = false;
    }

    pub fn release(&mut self) {
        if !self.pressed {
            return;
        }
        self.pressed = false;
        self.held = 0;
        self.repeating = false;
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    /// Poll once per tick. Returns whether this tick counts as an activation.
    pub fn check(&mut self, repeat: bool, initial_delay: u32, interval: u32) -> bool {
        if self.fresh {
            self.fresh = false;
            self.held = 0;
            return true;
        }
        if !self.pressed || !repeat {
            return false;
        }
        self.held += 1;
        let threshold = if self.repeating { interval } else { initial_delay };
        if self.held >= threshold.max(1) {
            self.repeating = true;
            self.held = 0;
            return true;
        }
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct InputController {
    buttons: [ButtonState; 6],
}

impl InputController {
    pub fn press(&mut self, button: Button) {
        self.buttons[button.index()].press();
    }

    pub fn release(&mut self, button: Button) {
        self.buttons[button.index()].release();
    }

    pub fn is_pressed(&self, button: Button) -> bool {
        self.buttons[button.index()].is_pressed()
    }

    /// Forget every press, held or latched
    pub fn clear(&mut self) {
        self.buttons = Default::default();
    }

    /// Buttons activated this tick, in polling order. Only directions repeat.
    pub fn poll(&mut self, config: &EngineConfig) -> Vec<Button> {
        let delay = config.repeat_delay_ticks();
        let interval = config.repeat_interval_ticks();
        Button::ALL
            .into_iter()
            .filter(|&button| {
                let repeat = config.input_repeat && button.direction().is_some();
                self.buttons[button.index()].check(repeat, delay, interval)
            })
            .collect()
    }
}
