//! Steady-rate character reveal for bursty streamed chat text.
//!
//! Streamed completions arrive as uneven deltas: a turn might deliver three
//! large chunks in a burst and then nothing for a second. Rendering chunks as
//! they arrive reads badly. [`RevealPacer`] buffers incoming chunks and
//! drains them at a fixed characters-per-second rate across fixed-interval
//! ticks, carrying fractional character budget between ticks so no progress
//! is lost to rounding.
//!
//! The pacer is a pure state machine. The caller owns the clock: drive it
//! with [`RevealPacer::tick`] at whatever interval suits the render loop and
//! feed it elapsed time.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use reveal_pacer::RevealPacer;
//!
//! let mut pacer: RevealPacer<String> = RevealPacer::default();
//! pacer.start(false);
//! pacer.push("Hello there, ");
//! pacer.push("manager.");
//! assert!(pacer.complete("Hello there, manager.".to_string()).is_none());
//!
//! let mut visible = String::new();
//! let mut committed = None;
//! while committed.is_none() {
//!     let outcome = pacer.tick(Duration::from_millis(50));
//!     visible.push_str(&outcome.revealed);
//!     committed = outcome.committed;
//! }
//! assert_eq!(visible, "Hello there, manager.");
//! assert_eq!(committed.as_deref(), Some("Hello there, manager."));
//! ```

use std::time::Duration;

/// Default reveal rate, in characters per second.
pub const DEFAULT_CHARS_PER_SECOND: f64 = 50.0;

/// Tick interval the rate was tuned against. Callers may tick at any
/// interval; the pacer only looks at elapsed time.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(50);

/// What one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome<M> {
    /// Characters moved onto the visible transcript by this tick.
    pub revealed: String,
    /// The finished message, present on the single tick that drains the
    /// buffer after [`RevealPacer::complete`] was called.
    pub committed: Option<M>,
}

impl<M> TickOutcome<M> {
    fn empty() -> Self {
        Self {
            revealed: String::new(),
            committed: None,
        }
    }
}

/// Paces one assistant turn from bursty chunks to a steady character reveal.
///
/// `M` is the finished-message payload handed to [`complete`] and returned
/// once the reveal drains; the pacer never inspects it.
///
/// Turn lifecycle:
/// 1. [`start`] when the turn begins. Instant turns bypass pacing entirely.
/// 2. [`push`] each incoming chunk.
/// 3. [`complete`] when the final message arrives. The reveal keeps draining;
///    the payload is held pending until the buffer empties.
/// 4. [`tick`] on every render interval. The tick that drains the buffer
///    returns the pending payload as `committed`.
///
/// [`start`]: RevealPacer::start
/// [`push`]: RevealPacer::push
/// [`complete`]: RevealPacer::complete
/// [`tick`]: RevealPacer::tick
#[derive(Debug, Clone)]
pub struct RevealPacer<M> {
    chars_per_second: f64,
    /// Chunk text not yet revealed.
    buffer: String,
    /// Characters revealed so far this turn.
    revealed_count: usize,
    /// Fractional character budget carried between ticks.
    carry: f64,
    active: bool,
    instant: bool,
    done: bool,
    pending: Option<M>,
}

impl<M> Default for RevealPacer<M> {
    fn default() -> Self {
        Self::new(DEFAULT_CHARS_PER_SECOND)
    }
}

impl<M> RevealPacer<M> {
    /// Create a pacer that reveals `chars_per_second` characters per second.
    pub fn new(chars_per_second: f64) -> Self {
        Self {
            chars_per_second: chars_per_second.max(0.0),
            buffer: String::new(),
            revealed_count: 0,
            carry: 0.0,
            active: false,
            instant: false,
            done: false,
            pending: None,
        }
    }

    /// Begin a turn, discarding any state from the previous one.
    ///
    /// An `instant` turn skips pacing: chunks are ignored and
    /// [`complete`](RevealPacer::complete) commits immediately. Used for the
    /// first assistant message of a session so first paint is not delayed.
    pub fn start(&mut self, instant: bool) {
        self.buffer.clear();
        self.revealed_count = 0;
        self.carry = 0.0;
        self.active = true;
        self.instant = instant;
        self.done = false;
        self.pending = None;
    }

    /// Buffer an incoming chunk. Ignored for instant turns and outside a turn.
    pub fn push(&mut self, chunk: &str) {
        if self.active && !self.instant {
            self.buffer.push_str(chunk);
        }
    }

    /// Record the finished message for this turn.
    ///
    /// Returns the payload immediately when nothing is mid-reveal (instant
    /// turns, or no chunk text was ever buffered or revealed). Otherwise the
    /// payload is held and returned by the tick that drains the buffer.
    pub fn complete(&mut self, message: M) -> Option<M> {
        if !self.active {
            return Some(message);
        }
        let mid_reveal = !self.buffer.is_empty() || self.revealed_count > 0;
        if self.instant || !mid_reveal {
            self.reset();
            return Some(message);
        }
        self.done = true;
        self.pending = Some(message);
        None
    }

    /// Advance the reveal by `elapsed` time.
    ///
    /// The character budget for a tick is `rate * elapsed` plus the
    /// fractional carry from previous ticks. Whole characters are revealed,
    /// the new fraction is carried, and budget beyond the buffered text is
    /// dropped rather than banked.
    pub fn tick(&mut self, elapsed: Duration) -> TickOutcome<M> {
        if !self.active || self.instant {
            return TickOutcome::empty();
        }

        let desired = self.chars_per_second * elapsed.as_secs_f64() + self.carry;
        let budget = desired.floor() as usize;
        self.carry = desired - desired.floor();

        let mut outcome = TickOutcome::empty();
        if budget > 0 && !self.buffer.is_empty() {
            outcome.revealed = self.take_chars(budget);
            self.revealed_count += outcome.revealed.chars().count();
        }

        if self.done && self.buffer.is_empty() {
            outcome.committed = self.pending.take();
            self.reset();
        }
        outcome
    }

    /// Whether a turn is in progress.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Characters buffered but not yet revealed.
    pub fn buffered(&self) -> &str {
        &self.buffer
    }

    /// Whether every buffered character has been revealed.
    pub fn is_drained(&self) -> bool {
        self.buffer.is_empty()
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.revealed_count = 0;
        self.active = false;
        self.instant = false;
        self.done = false;
        self.pending = None;
    }

    /// Remove and return up to `count` characters from the buffer front,
    /// splitting on character boundaries.
    fn take_chars(&mut self, count: usize) -> String {
        match self.buffer.char_indices().nth(count) {
            Some((byte_index, _)) => self.buffer.drain(..byte_index).collect(),
            None => std::mem::take(&mut self.buffer),
        }
    }
}
