//! Token-bucket state transitions
//!
//! Pure math over a caller-supplied clock; the repository implementations
//! wrap these transitions in their own atomic unit (row lock or mutex), so
//! everything here is trivially unit-testable.
//!
//! Policy: the burst ceiling equals `capacity`: a bucket never holds more
//! than one second's worth of tokens. A plan that promises "N per second"
//! therefore admits at most N calls in any instant, with no accumulated
//! burst allowance.

use chrono::{DateTime, Utc};

use crate::models::Admission;

/// Mutable token-bucket state, as stored on the bucket row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    /// Refill rate in tokens/second; also the burst ceiling. <= 0 means
    /// the bucket is unmetered and always admits.
    pub capacity: f64,
    /// Tokens currently available; 0 <= tokens <= capacity for metered
    /// buckets
    pub tokens: f64,
    /// Baseline for the next refill computation
    pub last_refill_at: DateTime<Utc>,
}

impl BucketState {
    /// A freshly provisioned bucket, filled to its ceiling.
    pub fn fresh(capacity: f64, now: DateTime<Utc>) -> Self {
        Self {
            capacity,
            tokens: capacity.max(0.0),
            last_refill_at: now,
        }
    }

    /// Whether this bucket admits unconditionally.
    pub fn is_unmetered(&self) -> bool {
        self.capacity <= 0.0
    }

    /// Accrue tokens for the time elapsed since the last refill and advance
    /// the baseline. Clock skew (negative elapsed) accrues nothing.
    pub fn refill(&mut self, now: DateTime<Utc>) {
        let elapsed = (now - self.last_refill_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        self.tokens = self.capacity.min(self.tokens + elapsed * self.capacity);
        self.last_refill_at = now;
    }

    /// Refill, then spend one token if available.
    ///
    /// On denial the refreshed tokens and baseline are kept, so the caller
    /// must still write the state back: future refills accrue from `now`,
    /// not from the last successful debit.
    pub fn try_debit(&mut self, now: DateTime<Utc>) -> Admission {
        if self.is_unmetered() {
            self.tokens = self.capacity.max(0.0);
            self.last_refill_at = now;
            return Admission::Admitted {
                remaining: f64::INFINITY,
            };
        }

        self.refill(now);

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Admission::Admitted {
                remaining: self.tokens,
            }
        } else {
            Admission::Denied {
                retry_after_seconds: (1.0 - self.tokens) / self.capacity,
            }
        }
    }

    /// Rewrite the capacity after a plan change, clamping tokens to the new
    /// ceiling. Tokens are never raised: a downgrade loses the excess
    /// immediately and an upgrade earns its larger ceiling over time.
    pub fn apply_capacity(&mut self, new_capacity: f64, now: DateTime<Utc>) {
        self.refill(now);
        self.capacity = new_capacity;
        self.tokens = self.tokens.clamp(0.0, new_capacity.max(0.0));
    }
}
