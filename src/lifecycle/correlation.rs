//! Reference asset (BTC) correlation overlay
//!
//! Altcoins rarely hold a move against the market leader. The reference
//! asset's short-term momentum either confirms the candidate signal or
//! discounts it; large opposing moves also attach a warning.

use serde::{Deserialize, Serialize};

use crate::config::LifecycleConfig;
use crate::features::{closes, price_momentum};
use crate::types::{Bias, Candle, SignalType};

const FAVORABLE_BONUS: f64 = 10.0;
const UNFAVORABLE_PENALTY: f64 = -15.0;
const STRONG_UNFAVORABLE_PENALTY: f64 = -20.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BtcCorrelation {
    /// % change of the reference close over the lookback
    pub reference_momentum_pct: f64,
    pub reference_trend: Bias,
    pub confidence_adjustment: f64,
    pub is_favorable: bool,
    pub warning: Option<String>,
}

impl BtcCorrelation {
    /// `None` when the reference series is shorter than the lookback
    pub fn analyze(
        reference: &[Candle],
        signal: SignalType,
        config: &LifecycleConfig,
    ) -> Option<Self> {
        let momentum = price_momentum(&closes(reference), config.correlation_lookback)?;
        let reference_trend = if momentum > config.correlation_neutral_pct {
            Bias::Bullish
        } else if momentum < -config.correlation_neutral_pct {
            Bias::Bearish
        } else {
            Bias::Neutral
        };

        let wanted = Bias::from_signal(signal);
        let (confidence_adjustment, is_favorable, warning) = if !wanted.is_directional()
            || !reference_trend.is_directional()
        {
            (0.0, false, None)
        } else if reference_trend == wanted {
            (FAVORABLE_BONUS, true, None)
        } else if momentum.abs() > config.correlation_warning_pct {
            let warning = format!(
                "Reference asset moving {momentum:+.2}% against this {signal} signal"
            );
            (STRONG_UNFAVORABLE_PENALTY, false, Some(warning))
        } else {
            (UNFAVORABLE_PENALTY, false, None)
        };

        if let Some(w) = &warning {
            tracing::debug!(momentum, signal = %signal, warning = %w, "BtcCorrelation");
        }

        Some(Self {
            reference_momentum_pct: momentum,
            reference_trend,
            confidence_adjustment,
            is_favorable,
            warning,
        })
    }

    /// Apply the adjustment to a confidence, kept within 0-100
    pub fn adjust(&self, confidence: f64) -> f64 {
        (confidence + self.confidence_adjustment).clamp(0.0, 100.0)
    }
}
