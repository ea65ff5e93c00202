//! Contention windows and randomized backoff delays.
//!
//! A window is an attempt index plus a law mapping that index to the largest
//! slot count that may be drawn. Delays are always drawn fresh from the
//! caller's generator and never cached between attempts.

use std::time::Duration;

use rand::Rng;

/// Maps an attempt index `i` to the upper bound (inclusive) of the slot draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffLaw {
    /// `2^i - 1` slots, binary exponential backoff.
    PowerOfTwoMinusOne,
    /// `2^i - 2` slots, one slot narrower than binary exponential backoff.
    /// Only meaningful for `i >= 1`; `i = 0` clamps to zero.
    PowerOfTwoMinusTwo,
}

impl BackoffLaw {
    pub fn upper_slot(self, attempt: u32) -> u64 {
        // 2^64 does not fit, the window saturates instead.
        let window = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        match self {
            BackoffLaw::PowerOfTwoMinusOne => window.saturating_sub(1),
            BackoffLaw::PowerOfTwoMinusTwo => window.saturating_sub(2),
        }
    }
}

/// Per-packet contention window. Created fresh for every packet and only
/// ever widened while that packet is retried.
#[derive(Debug, Clone)]
pub struct ContentionWindow {
    law: BackoffLaw,
    attempt: u32,
}

impl ContentionWindow {
    pub fn new(law: BackoffLaw, first_attempt: u32) -> Self {
        Self {
            law,
            attempt: first_attempt,
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Largest slot count the current attempt may draw.
    pub fn upper_slot(&self) -> u64 {
        self.law.upper_slot(self.attempt)
    }

    /// Moves to the next attempt after a failed exchange.
    pub fn widen(&mut self) {
        self.attempt = self.attempt.saturating_add(1);
    }

    /// Draws `uniform(0, upper_slot) * interval`.
    pub fn draw<R: Rng>(&self, rng: &mut R, interval: Duration) -> Duration {
        let slots = rng.random_range(0..=self.upper_slot());
        slots_to_delay(slots, interval)
    }
}

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// `slots * interval`, exact for every slot count, saturating at
/// [`Duration::MAX`].
pub fn slots_to_delay(slots: u64, interval: Duration) -> Duration {
    let nanos = interval.as_nanos().saturating_mul(u128::from(slots));
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}
