//! Pulse reciprocity detection.
//!
//! This module contains the `PulseDetector`, which remembers when each user
//! last pulsed each peer and decides whether a new pulse completes a
//! double pulse.
//!
//! Clicks are stored per unordered pair so that recording a pulse and
//! checking the reverse direction happen under one shard lock. Two users
//! pulsing each other at the same instant therefore produce exactly one
//! double pulse, never two and never zero.

use dashmap::DashMap;
use pulse_proto::UserId;
use std::time::Duration;
use tokio::time::Instant;

/// Outcome of recording a pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseOutcome {
    /// No reciprocal pulse inside the window.
    Single,
    /// The target pulsed the sender within the window.
    Double,
}

impl PulseOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Double => "double",
        }
    }
}

/// Unordered pair key; `low < high` by byte order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PairKey {
    low: UserId,
    high: UserId,
}

impl PairKey {
    /// Build the key for `sender → target`, also reporting whether the
    /// sender is the low side.
    fn directed(sender: &UserId, target: &UserId) -> (Self, bool) {
        if sender <= target {
            (
                Self {
                    low: sender.clone(),
                    high: target.clone(),
                },
                true,
            )
        } else {
            (
                Self {
                    low: target.clone(),
                    high: sender.clone(),
                },
                false,
            )
        }
    }
}

/// Most recent click in each direction of a pair.
#[derive(Debug, Clone, Copy, Default)]
struct PairClicks {
    low_to_high: Option<Instant>,
    high_to_low: Option<Instant>,
}

impl PairClicks {
    fn newest(&self) -> Option<Instant> {
        match (self.low_to_high, self.high_to_low) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        }
    }
}

/// LastClick table plus the reciprocity window.
pub struct PulseDetector {
    clicks: DashMap<PairKey, PairClicks>,
    window: Duration,
    consume_on_match: bool,
}

impl PulseDetector {
    /// Create a detector.
    ///
    /// With `consume_on_match`, a double pulse clears both directions of the
    /// pair so a third pulse cannot match the already-used reciprocal click.
    pub fn new(window: Duration, consume_on_match: bool) -> Self {
        Self {
            clicks: DashMap::new(),
            window,
            consume_on_match,
        }
    }

    /// Record `sender → target` at `now` and classify it.
    ///
    /// The window is a closed interval: a reciprocal click exactly `window`
    /// ago still counts.
    pub fn record(&self, sender: &UserId, target: &UserId, now: Instant) -> PulseOutcome {
        let (key, sender_is_low) = PairKey::directed(sender, target);
        let mut entry = self.clicks.entry(key).or_default();
        let clicks = entry.value_mut();
        let (mine, theirs) = if sender_is_low {
            (&mut clicks.low_to_high, &mut clicks.high_to_low)
        } else {
            (&mut clicks.high_to_low, &mut clicks.low_to_high)
        };

        *mine = Some(now);
        let matched = theirs.is_some_and(|at| now.saturating_duration_since(at) <= self.window);

        if matched && self.consume_on_match {
            *mine = None;
            *theirs = None;
        }

        if matched {
            PulseOutcome::Double
        } else {
            PulseOutcome::Single
        }
    }

    /// When `sender` last pulsed `target`, if still tracked.
    pub fn last_click(&self, sender: &UserId, target: &UserId) -> Option<Instant> {
        let (key, sender_is_low) = PairKey::directed(sender, target);
        self.clicks.get(&key).and_then(|clicks| {
            if sender_is_low {
                clicks.low_to_high
            } else {
                clicks.high_to_low
            }
        })
    }

    /// Drop pairs whose newest click is older than `retention`.
    ///
    /// Returns the number of pairs removed.
    pub fn prune(&self, now: Instant, retention: Duration) -> usize {
        let before = self.clicks.len();
        self.clicks.retain(|_, clicks| {
            clicks
                .newest()
                .is_some_and(|at| now.saturating_duration_since(at) <= retention)
        });
        before.saturating_sub(self.clicks.len())
    }

    /// Number of tracked pairs.
    pub fn len(&self) -> usize {
        self.clicks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clicks.is_empty()
    }
}
