//! Frame-indexed deferred callbacks (`wait`)

use std::collections::BTreeMap;

use zest_common::seconds_to_ticks;

use crate::context::Continuation;

/// Continuations keyed by the tick they are due on.
///
/// The scheduler keeps its own tick counter, advanced only on ticks where
/// timers are serviced, so time spent in dialog does not count.
#[derive(Debug, Clone, Default)]
pub struct TimerScheduler {
    now: u64,
    entries: BTreeMap<u64, Vec<Continuation>>,
}

impl TimerScheduler {
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn pending(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Register a continuation `seconds` from now (at least one tick)
    pub fn wait(&mut self, seconds: f64, continuation: Continuation) -> u64 {
        let due = self.now + u64::from(seconds_to_ticks(seconds).max(1));
        self.entries.entry(due).or_default().push(continuation);
        tracing::debug!("Timer registered for tick {} (now {})", due, self.now);
        due
    }

    /// Move to the next tick
    pub fn advance(&mut self) {
        self.now += 1;
    }

    /// Take everything due at the current tick, in registration order
    pub fn take_due(&mut self) -> Vec<Continuation> {
        self.entries.remove(&self.now).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EventContext, Scope, SelfRef};

    fn cont(block: usize) -> Continuation {
        Continuation {
            scope: Scope {
                script: 0,
                this: SelfRef::Game,
                ctx: EventContext::default(),
            },
            block,
        }
    }

    #[test]
    fn tenth_of_a_second_is_two_ticks() {
        let mut timers = TimerScheduler::default();
        timers.wait(0.1, cont(0));
        timers.advance();
        assert!(timers.take_due().is_empty());
        timers.advance();
        assert_eq!(timers.take_due(), vec![cont(0)]);
        assert_eq!(timers.pending(), 0);
    }

    #[test]
    fn zero_wait_still_defers_one_tick() {
        let mut timers = TimerScheduler::default();
        timers.wait(0.0, cont(1));
        assert!(timers.take_due().is_empty());
        timers.advance();
        assert_eq!(timers.take_due().len(), 1);
    }

    #[test]
    fn same_tick_fires_in_registration_order() {
        let mut timers = TimerScheduler::default();
        timers.wait(0.05, cont(1));
        timers.wait(0.05, cont(2));
        timers.advance();
        let due: Vec<usize> = timers.take_due().into_iter().map(|c| c.block).collect();
        assert_eq!(due, vec![1, 2]);
    }
}
