//! Monthly API-call quota accounting.
//!
//! The decision itself is a pure function over [`QuotaState`] and the
//! current time. [`check_and_consume`] wraps it in a transaction that holds
//! the user's row lock, so concurrent requests for one user are serialized.

use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use scribe_db::models::User;
use scribe_db::queries::users;

/// Days in one quota window.
pub const RESET_PERIOD_DAYS: i64 = 30;

/// Length of one quota window.
pub fn reset_period() -> Duration {
    Duration::days(RESET_PERIOD_DAYS)
}

/// Errors from [`check_and_consume`].
#[derive(Debug, thiserror::Error)]
pub enum QuotaError {
    #[error(
        "API call limit of {limit} exceeded. Limit will reset on {} UTC.",
        reset_at.format("%Y-%m-%d %H:%M:%S")
    )]
    Exceeded { limit: i32, reset_at: DateTime<Utc> },

    #[error("user {0} not found")]
    UserNotFound(Uuid),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// The quota columns of a user row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaState {
    pub api_call_count: i32,
    pub monthly_api_limit: i32,
    pub api_limit_reset_at: Option<DateTime<Utc>>,
}

impl From<&User> for QuotaState {
    fn from(user: &User) -> Self {
        Self {
            api_call_count: user.api_call_count,
            monthly_api_limit: user.monthly_api_limit,
            api_limit_reset_at: user.api_limit_reset_at,
        }
    }
}

/// Outcome of evaluating one call against a quota.
///
/// Both variants carry the state to write back: a rejected call may still
/// have opened a new window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaDecision {
    Consumed(QuotaState),
    Exceeded(QuotaState),
}

impl QuotaDecision {
    pub fn state(&self) -> &QuotaState {
        match self {
            Self::Consumed(s) | Self::Exceeded(s) => s,
        }
    }
}

/// Evaluate one call at `now`.
///
/// An unset or elapsed window is reset first (count 0, window end
/// `now + 30 days`). The call is then rejected if the count has reached the
/// limit, otherwise counted.
pub fn evaluate(state: QuotaState, now: DateTime<Utc>) -> QuotaDecision {
    let mut next = state;

    let window_elapsed = match state.api_limit_reset_at {
        None => true,
        Some(reset_at) => now >= reset_at,
    };
    if window_elapsed {
        next.api_call_count = 0;
        next.api_limit_reset_at = Some(now + reset_period());
    }

    if next.api_call_count >= next.monthly_api_limit {
        QuotaDecision::Exceeded(next)
    } else {
        next.api_call_count += 1;
        QuotaDecision::Consumed(next)
    }
}

/// Count one generation call against the user's quota.
///
/// The row is written back in every case, so a window reset sticks even
/// when the call itself is rejected. Returns the updated user.
pub async fn check_and_consume(pool: &PgPool, user_id: Uuid) -> Result<User, QuotaError> {
    let mut tx = pool.begin().await.map_err(anyhow::Error::from)?;

    let user = users::lock_user(&mut *tx, user_id)
        .await?
        .ok_or(QuotaError::UserNotFound(user_id))?;

    let decision = evaluate(QuotaState::from(&user), Utc::now());
    let state = decision.state();

    let updated = users::update_quota_state(
        &mut *tx,
        user_id,
        state.api_call_count,
        state.api_limit_reset_at,
    )
    .await?;
    tx.commit().await.map_err(anyhow::Error::from)?;

    match decision {
        QuotaDecision::Consumed(_) => {
            debug!(
                %user_id,
                count = updated.api_call_count,
                limit = updated.monthly_api_limit,
                "api call counted"
            );
            Ok(updated)
        }
        QuotaDecision::Exceeded(state) => {
            warn!(%user_id, limit = state.monthly_api_limit, "api call limit exceeded");
            Err(QuotaError::Exceeded {
                limit: state.monthly_api_limit,
                // Always set after evaluate.
                reset_at: state.api_limit_reset_at.unwrap_or(updated.updated_at),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, 8, 0, 0).unwrap()
    }

    fn state(count: i32, limit: i32, reset_at: Option<DateTime<Utc>>) -> QuotaState {
        QuotaState {
            api_call_count: count,
            monthly_api_limit: limit,
            api_limit_reset_at: reset_at,
        }
    }

    #[test]
    fn consumes_within_window() {
        let decision = evaluate(state(3, 100, Some(at(20))), at(10));
        assert_eq!(
            decision,
            QuotaDecision::Consumed(state(4, 100, Some(at(20))))
        );
    }

    #[test]
    fn unset_window_is_opened() {
        let decision = evaluate(state(0, 100, None), at(1));
        assert_eq!(
            decision,
            QuotaDecision::Consumed(state(1, 100, Some(at(1) + Duration::days(30))))
        );
    }

    #[test]
    fn elapsed_window_resets_any_prior_count() {
        for prior in [0, 57, 100, 5000] {
            let decision = evaluate(state(prior, 100, Some(at(5))), at(6));
            let QuotaDecision::Consumed(next) = decision else {
                panic!("expected Consumed for prior count {prior}");
            };
            assert_eq!(next.api_call_count, 1);
            assert_eq!(next.api_limit_reset_at, Some(at(6) + Duration::days(30)));
        }
    }

    #[test]
    fn reset_boundary_is_inclusive() {
        let decision = evaluate(state(100, 100, Some(at(5))), at(5));
        assert!(matches!(decision, QuotaDecision::Consumed(s) if s.api_call_count == 1));
    }

    #[test]
    fn count_at_limit_is_rejected_without_increment() {
        let decision = evaluate(state(100, 100, Some(at(20))), at(10));
        assert_eq!(
            decision,
            QuotaDecision::Exceeded(state(100, 100, Some(at(20))))
        );
    }

    #[test]
    fn zero_limit_rejects_even_after_reset() {
        let decision = evaluate(state(7, 0, Some(at(2))), at(3));
        // The reset is still part of the state to persist.
        assert_eq!(
            decision,
            QuotaDecision::Exceeded(state(0, 0, Some(at(3) + Duration::days(30))))
        );
    }

    #[test]
    fn consumed_count_never_exceeds_limit() {
        let mut s = state(0, 5, Some(at(30)));
        let mut consumed = 0;
        for _ in 0..10 {
            match evaluate(s, at(1)) {
                QuotaDecision::Consumed(next) => {
                    assert_eq!(next.api_call_count, s.api_call_count + 1);
                    assert!(next.api_call_count <= next.monthly_api_limit);
                    consumed += 1;
                    s = next;
                }
                QuotaDecision::Exceeded(next) => s = next,
            }
        }
        assert_eq!(consumed, 5);
        assert_eq!(s.api_call_count, 5);
    }

    #[test]
    fn exceeded_message_format() {
        let err = QuotaError::Exceeded {
            limit: 100,
            reset_at: Utc.with_ymd_and_hms(2025, 2, 9, 14, 3, 7).unwrap(),
        };
        assert_eq!(
            err.to_string(),
            "API call limit of 100 exceeded. Limit will reset on 2025-02-09 14:03:07 UTC."
        );
    }
}
