//! Per-project vector-cap arithmetic
//!
//! Pure decision function; the repository implementations run it against a
//! freshly locked usage row so that check and increment are one atomic
//! unit. Checking in one statement and incrementing in another would let
//! two concurrent ingests both pass the check and jointly overshoot the
//! cap.

use crate::models::CapacityDecision;

/// Decide whether `delta` vectors may be applied to a project currently
/// holding `current`, under an optional cap.
///
/// Positive deltas are rejected when they would exceed the cap. Negative
/// deltas always succeed, with the resulting count floored at zero so a
/// counter briefly out of sync with the engine can never go negative.
pub fn apply_delta(current: i64, delta: i64, limit: Option<i64>) -> CapacityDecision {
    if delta > 0 {
        if let Some(limit) = limit {
            if current + delta > limit {
                return CapacityDecision::Rejected { limit, current };
            }
        }
    }

    CapacityDecision::Reserved {
        vector_count: (current + delta).max(0),
    }
}
