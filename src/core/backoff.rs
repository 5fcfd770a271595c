//! Delay schedule between forwarding attempts.
use std::time::Duration;

use rand::Rng;

use crate::config::BackoffPolicy;

impl BackoffPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        match *self {
            BackoffPolicy::Constant { delay_ms } => Duration::from_millis(delay_ms),
            BackoffPolicy::Linear { base_ms } => {
                Duration::from_millis(base_ms.saturating_mul(u64::from(attempt)))
            }
            BackoffPolicy::Exponential {
                base_ms,
                max_ms,
                jitter,
            } => {
                let factor = 1u64.checked_shl(attempt - 1).unwrap_or(u64::MAX);
                let capped = base_ms.saturating_mul(factor).min(max_ms);
                if jitter && capped > 0 {
                    Duration::from_millis(rand::rng().random_range(0..=capped))
                } else {
                    Duration::from_millis(capped)
                }
            }
        }
    }
}
