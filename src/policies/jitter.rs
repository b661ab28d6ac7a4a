//! # Jitter policy for retry delays.
//!
//! [`JitterPolicy`] randomizes backoff delays so that listeners failing on the
//! same event (or many events failing at once) do not retry in lockstep.
//!
//! - [`JitterPolicy::None`]: exact delays
//! - [`JitterPolicy::Full`]: uniform in `[0, delay]`
//! - [`JitterPolicy::Equal`]: `delay/2` plus uniform in `[0, delay/2]`
//! - [`JitterPolicy::Decorrelated`]: uniform in `[floor, min(delay * 3, cap)]`

use std::time::Duration;

use rand::Rng;

/// Policy controlling randomization of retry delays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// No jitter: use exact backoff delay (predictable, good for tests).
    #[default]
    None,

    /// Full jitter: random delay in `[0, delay]`.
    Full,

    /// Equal jitter: keeps at least half of the delay.
    Equal,

    /// Decorrelated jitter: spreads upwards from a floor, bounded by a cap.
    ///
    /// Needs a floor and cap, see [`apply_bounded`](Self::apply_bounded).
    Decorrelated,
}

impl JitterPolicy {
    /// Applies jitter to `delay`.
    ///
    /// `Decorrelated` returns the input unchanged here; it needs bounds.
    pub fn apply(&self, delay: Duration) -> Duration {
        match self {
            JitterPolicy::None | JitterPolicy::Decorrelated => delay,
            JitterPolicy::Full => uniform_ms(0, millis(delay)),
            JitterPolicy::Equal => {
                let half = millis(delay) / 2;
                let extra = uniform_ms(0, half);
                Duration::from_millis(half) + extra
            }
        }
    }

    /// Applies jitter with an explicit floor and cap.
    ///
    /// For non-decorrelated policies this is [`apply`](Self::apply) followed by
    /// clamping to `cap`.
    pub fn apply_bounded(&self, floor: Duration, delay: Duration, cap: Duration) -> Duration {
        if *self != JitterPolicy::Decorrelated {
            return self.apply(delay).min(cap);
        }

        let lo = millis(floor);
        let hi = millis(delay).saturating_mul(3).min(millis(cap)).max(lo);
        uniform_ms(lo, hi)
    }
}

#[inline]
fn millis(d: Duration) -> u64 {
    d.as_millis().min(u128::from(u64::MAX)) as u64
}

/// Uniform duration in `[lo, hi]` milliseconds.
fn uniform_ms(lo: u64, hi: u64) -> Duration {
    if lo >= hi {
        return Duration::from_millis(lo);
    }
    Duration::from_millis(rand::rng().random_range(lo..=hi))
}
