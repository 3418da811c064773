//! Scheduled steps with a single cancellation token
//!
//! Effects never hold raw timer handles. Each effect owns one [`Timeline`]
//! whose steps are popped one at a time by [`Timeline::next_due`]; the
//! token is checked before every step, so nothing fires after cancellation
//! even when a step cancels the timeline half way through a poll.

use std::cell::Cell;
use std::rc::Rc;

/// Shared liveness flag; clones observe the same state
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    pub fn is_live(&self) -> bool {
        !self.cancelled.get()
    }
}

#[derive(Debug, Clone)]
struct Scheduled<S> {
    due_ms: f64,
    seq: u64,
    step: S,
}

/// Ordered queue of future steps for one effect
#[derive(Debug)]
pub struct Timeline<S> {
    token: CancelToken,
    pending: Vec<Scheduled<S>>,
    paused_at: Option<f64>,
    seq: u64,
}

impl<S> Default for Timeline<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> Timeline<S> {
    pub fn new() -> Self {
        Self {
            token: CancelToken::new(),
            pending: Vec::new(),
            paused_at: None,
            seq: 0,
        }
    }

    /// The token guarding this timeline
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Queue `step` at an absolute time. Returns false once cancelled.
    pub fn schedule_at(&mut self, due_ms: f64, step: S) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.seq += 1;
        let entry = Scheduled {
            due_ms,
            seq: self.seq,
            step,
        };
        let index = self
            .pending
            .iter()
            .position(|s| (s.due_ms, s.seq) > (entry.due_ms, entry.seq))
            .unwrap_or(self.pending.len());
        self.pending.insert(index, entry);
        true
    }

    pub fn schedule_after(&mut self, now_ms: f64, delay_ms: f64, step: S) -> bool {
        self.schedule_at(now_ms + delay_ms.max(0.0), step)
    }

    /// Pop the earliest step due at `now_ms`
    ///
    /// Returns `None` while paused or after cancellation.
    pub fn next_due(&mut self, now_ms: f64) -> Option<S> {
        if self.token.is_cancelled() || self.paused_at.is_some() {
            return None;
        }
        match self.pending.first() {
            Some(first) if first.due_ms <= now_ms => Some(self.pending.remove(0).step),
            _ => None,
        }
    }

    /// Freeze the timeline; pending deadlines are shifted on resume
    pub fn pause(&mut self, now_ms: f64) {
        if self.paused_at.is_none() {
            self.paused_at = Some(now_ms);
        }
    }

    pub fn resume(&mut self, now_ms: f64) {
        if let Some(paused_at) = self.paused_at.take() {
            let shift = (now_ms - paused_at).max(0.0);
            for entry in &mut self.pending {
                entry.due_ms += shift;
            }
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Drop every pending step and refuse new ones
    pub fn cancel(&mut self) {
        self.token.cancel();
        self.pending.clear();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Deadline of the earliest pending step
    pub fn next_deadline(&self) -> Option<f64> {
        self.pending.first().map(|s| s.due_ms)
    }
}

/// Fixed-delay repeating deadline for host-polled timers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    period_ms: f64,
    next_ms: f64,
}

impl Interval {
    pub fn new(start_ms: f64, period_ms: f64) -> Self {
        Self {
            period_ms,
            next_ms: start_ms + period_ms,
        }
    }

    /// True once per elapsed period; late polls do not fire twice
    pub fn fire(&mut self, now_ms: f64) -> bool {
        if now_ms < self.next_ms {
            return false;
        }
        self.next_ms = now_ms + self.period_ms;
        true
    }
}
