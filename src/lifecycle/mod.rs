//! Signal Lifecycle - Confidence decay and cross-series overlays
//!
//! A signal's confidence is only valid at the instant it was produced. This
//! module ages it (exponential half-life decay with a hard expiry) and holds
//! the overlays that compare the primary series with other series:
//! - higher-timeframe trend alignment
//! - reference asset (BTC) momentum correlation
//! - candlestick pattern recognition (diagnostic only)

pub mod correlation;
pub use correlation::BtcCorrelation;

pub mod patterns;
pub use patterns::{CandlestickPattern, PatternKind};

pub mod timeframe;
pub use timeframe::{MultiTimeframeAnalysis, TimeframeAlignment};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;

const MS_PER_MINUTE: f64 = 60_000.0;

/// Source of the current instant, in unix milliseconds
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Clock pinned to one instant (replays, tests)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_ms(&self) -> i64 {
        self.0
    }
}

/// Confidence of a signal aged to one evaluation instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedSignal {
    pub original_confidence: f64,
    pub current_confidence: f64,
    /// Unix ms
    pub created_at: i64,
    /// Unix ms; the signal is expired strictly after this instant
    pub expires_at: i64,
    pub evaluated_at: i64,
    pub half_life_minutes: f64,
    pub is_expired: bool,
    pub decay_factor: f64,
}

impl TimedSignal {
    /// Age `original_confidence` from `created_at` to `now_ms`.
    ///
    /// `current = original * e^(-ln2 * minutes / half_life)`, forced to 0
    /// once `now_ms` passes `created_at + max_life_minutes`. A clock behind
    /// `created_at` counts as zero elapsed time.
    pub fn evaluate(
        original_confidence: f64,
        created_at: i64,
        now_ms: i64,
        half_life_minutes: f64,
        max_life_minutes: f64,
    ) -> Self {
        let expires_at = created_at + (max_life_minutes * MS_PER_MINUTE) as i64;
        let elapsed_minutes = (now_ms - created_at).max(0) as f64 / MS_PER_MINUTE;

        let decay_factor = if half_life_minutes > 0.0 {
            (-std::f64::consts::LN_2 * elapsed_minutes / half_life_minutes).exp()
        } else {
            0.0
        };
        let is_expired = now_ms > expires_at;
        let current_confidence = if is_expired {
            0.0
        } else {
            original_confidence * decay_factor
        };

        Self {
            original_confidence,
            current_confidence,
            created_at,
            expires_at,
            evaluated_at: now_ms,
            half_life_minutes,
            is_expired,
            decay_factor,
        }
    }

    /// Evaluate against a clock, read exactly once
    pub fn evaluate_with(
        original_confidence: f64,
        created_at: i64,
        clock: &dyn Clock,
        config: &LifecycleConfig,
    ) -> Self {
        let now_ms = clock.now_ms();
        let timed = Self::evaluate(
            original_confidence,
            created_at,
            now_ms,
            config.half_life_minutes,
            config.max_life_minutes,
        );
        tracing::debug!(
            original = original_confidence,
            current = timed.current_confidence,
            expired = timed.is_expired,
            "TimedSignal evaluated"
        );
        timed
    }

    /// Stamp a freshly produced signal. The clock is read once and that
    /// instant is both its creation and evaluation time.
    pub fn issue(original_confidence: f64, clock: &dyn Clock, config: &LifecycleConfig) -> Self {
        let now_ms = clock.now_ms();
        Self::evaluate(
            original_confidence,
            now_ms,
            now_ms,
            config.half_life_minutes,
            config.max_life_minutes,
        )
    }

    /// Same creation data re-aged to a later instant
    pub fn at(&self, now_ms: i64) -> Self {
        let max_life_minutes = (self.expires_at - self.created_at) as f64 / MS_PER_MINUTE;
        Self::evaluate(
            self.original_confidence,
            self.created_at,
            now_ms,
            self.half_life_minutes,
            max_life_minutes,
        )
    }
}
