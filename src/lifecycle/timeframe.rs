//! Multi-timeframe trend alignment

use serde::{Deserialize, Serialize};

use crate::features::{closes, ema};
use crate::types::{Bias, Candle};

const ALIGNED_BONUS: f64 = 15.0;
const CONFLICT_PENALTY: f64 = -25.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeframeAlignment {
    Aligned,
    Conflicting,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiTimeframeAnalysis {
    pub primary_trend: Bias,
    pub higher_trend: Bias,
    pub alignment: TimeframeAlignment,
    /// +15 aligned, -25 conflicting, 0 otherwise
    pub confidence_adjustment: f64,
}

impl MultiTimeframeAnalysis {
    /// Compare the EMA9/EMA21 trend of both series. `None` when either
    /// series is too short for EMA21.
    pub fn analyze(primary: &[Candle], higher: &[Candle]) -> Option<Self> {
        let primary_trend = ema_trend(primary)?;
        let higher_trend = ema_trend(higher)?;
        Some(Self::from_trends(primary_trend, higher_trend))
    }

    pub fn from_trends(primary_trend: Bias, higher_trend: Bias) -> Self {
        let (alignment, confidence_adjustment) =
            if primary_trend.is_directional() && primary_trend == higher_trend {
                (TimeframeAlignment::Aligned, ALIGNED_BONUS)
            } else if primary_trend.opposes(higher_trend) {
                (TimeframeAlignment::Conflicting, CONFLICT_PENALTY)
            } else {
                (TimeframeAlignment::Neutral, 0.0)
            };

        Self {
            primary_trend,
            higher_trend,
            alignment,
            confidence_adjustment,
        }
    }
}

/// Trend label from the sign of EMA9 - EMA21
pub fn ema_trend(candles: &[Candle]) -> Option<Bias> {
    let closes = closes(candles);
    let fast = ema(&closes, 9)?;
    let slow = ema(&closes, 21)?;
    Some(if fast > slow {
        Bias::Bullish
    } else if fast < slow {
        Bias::Bearish
    } else {
        Bias::Neutral
    })
}
