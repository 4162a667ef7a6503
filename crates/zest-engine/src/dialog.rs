//! Dialog box: word wrap, pagination, typewriter reveal and advance gating

use std::collections::VecDeque;

use zest_common::EngineConfig;

use crate::context::Continuation;

/// Characters per dialog line
pub const LINE_WIDTH: usize = 17;
/// Lines per dialog page
pub const PAGE_LINES: usize = 4;
/// Top-left cell of the first text character
pub const TEXT_ORIGIN: (usize, usize) = (4, 5);

/// Wrap text to `width` columns.
///
/// Breaks at the last interior space at or before the limit, always at
/// explicit newlines, and hard-breaks words that do not fit.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        let mut rest: Vec<char> = paragraph.chars().collect();
        while rest.len() > width {
            let space = (1..=width).rev().find(|&i| rest[i] == ' ');
            match space {
                Some(i) => {
                    lines.push(rest[..i].iter().collect());
                    rest.drain(..=i);
                }
                None => {
                    lines.push(rest[..width].iter().collect());
                    rest.drain(..width);
                }
            }
        }
        lines.push(rest.into_iter().collect());
    }
    lines
}

/// Group wrapped lines into pages
pub fn paginate(lines: Vec<String>, per_page: usize) -> Vec<Vec<String>> {
    let per_page = per_page.max(1);
    let mut pages: Vec<Vec<String>> = Vec::new();
    for line in lines {
        match pages.last_mut() {
            Some(page) if page.len() < per_page => page.push(line),
            _ => pages.push(vec![line]),
        }
    }
    if pages.is_empty() {
        pages.push(vec![String::new()]);
    }
    pages
}

/// What to do once the last page is dismissed
#[derive(Debug, Clone, PartialEq)]
pub enum DialogCallback {
    None,
    Script(Continuation),
    /// Reload the cartridge (end of game)
    Restart,
}

#[derive(Debug, Clone, PartialEq)]
struct PendingSay {
    text: String,
    callback: DialogCallback,
}

#[derive(Debug, Clone)]
struct ActiveDialog {
    pages: Vec<Vec<String>>,
    page: usize,
    /// Characters of the current page revealed so far (fractional rates accumulate)
    revealed: f64,
    /// Ticks left before advance is accepted
    lock: u32,
    callback: DialogCallback,
}

impl ActiveDialog {
    fn page_text(&self) -> Vec<char> {
        self.pages[self.page].join("\n").chars().collect()
    }

    fn fully_revealed(&self) -> bool {
        self.revealed as usize >= self.page_text().len()
    }
}

/// Result of an advance request
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// Not showing, or still locked
    Ignored,
    /// Input used (revealed the page or turned it)
    Consumed,
    /// Last page dismissed; the callback is handed back to the caller
    Closed(DialogCallback),
}

#[derive(Debug, Clone, Default)]
pub struct DialogController {
    active: Option<ActiveDialog>,
    queue: VecDeque<PendingSay>,
}

impl DialogController {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Show a message, or queue it behind the one on screen
    pub fn say(&mut self, text: String, callback: DialogCallback, config: &EngineConfig) {
        if self.active.is_some() {
            tracing::debug!("Queueing dialog behind active one");
            self.queue.push_back(PendingSay { text, callback });
            return;
        }
        let pages = paginate(wrap(&text, LINE_WIDTH), PAGE_LINES);
        tracing::debug!("Dialog opened: {} page(s)", pages.len());
        let mut dialog = ActiveDialog {
            pages,
            page: 0,
            revealed: 0.0,
            lock: config.say_lock_ticks(),
            callback,
        };
        skip_whitespace(&mut dialog);
        self.active = Some(dialog);
    }

    /// Open the next queued message, if any and nothing is showing
    pub fn show_next(&mut self, config: &EngineConfig) -> bool {
        if self.active.is_some() {
            return false;
        }
        match self.queue.pop_front() {
            Some(next) => {
                self.say(next.text, next.callback, config);
                true
            }
            None => false,
        }
    }

    /// Per-tick reveal and lock countdown
    pub fn tick(&mut self, config: &EngineConfig) {
        let Some(dialog) = self.active.as_mut() else {
            return;
        };
        dialog.lock = dialog.lock.saturating_sub(1);
        if !dialog.fully_revealed() {
            dialog.revealed += config.chars_per_tick();
            skip_whitespace(dialog);
        }
    }

    pub fn advance(&mut self, config: &EngineConfig) -> Advance {
        let Some(dialog) = self.active.as_mut() else {
            return Advance::Ignored;
        };
        if dialog.lock > 0 {
            return Advance::Ignored;
        }
        if !dialog.fully_revealed() && config.text_skip {
            dialog.revealed = dialog.page_text().len() as f64;
            return Advance::Consumed;
        }
        if dialog.page + 1 < dialog.pages.len() {
            dialog.page += 1;
            dialog.revealed = 0.0;
            dialog.lock = config.say_lock_ticks();
            skip_whitespace(dialog);
            return Advance::Consumed;
        }
        let callback = std::mem::replace(&mut dialog.callback, DialogCallback::None);
        self.active = None;
        tracing::debug!("Dialog closed");
        Advance::Closed(callback)
    }

    /// Drop everything, including queued messages
    pub fn reset(&mut self) {
        self.active = None;
        self.queue.clear();
    }

    /// Lines of the current page, cut to the revealed prefix
    pub fn visible_lines(&self) -> Vec<String> {
        let Some(dialog) = &self.active else {
            return Vec::new();
        };
        let mut budget = dialog.revealed as usize;
        let mut out = Vec::new();
        for line in &dialog.pages[dialog.page] {
            let take = line.chars().count().min(budget);
            out.push(line.chars().take(take).collect());
            // the joining newline counts as one revealed character
            budget = budget.saturating_sub(take + 1);
        }
        out
    }

    pub fn page(&self) -> Option<(usize, usize)> {
        self.active.as_ref().map(|d| (d.page, d.pages.len()))
    }
}

fn skip_whitespace(dialog: &mut ActiveDialog) {
    let text = dialog.page_text();
    let mut pos = dialog.revealed as usize;
    while pos < text.len() && text[pos].is_whitespace() {
        pos += 1;
    }
    if pos > dialog.revealed as usize {
        dialog.revealed = pos as f64;
    }
}
