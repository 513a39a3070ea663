//! ADX trend-strength classification

use serde::{Deserialize, Serialize};

use super::adx;
use crate::types::{Bias, Candle};

/// Spread between +DI and -DI needed before a direction is called
const DI_DEADBAND: f64 = 5.0;
/// ADX at or above which trend-following is worth trading
const MIN_TRADEABLE_ADX: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendStrengthLevel {
    NoTrend,
    Weak,
    Moderate,
    Strong,
    VeryStrong,
}

impl TrendStrengthLevel {
    pub fn from_adx(adx: f64) -> Self {
        if adx < 20.0 {
            TrendStrengthLevel::NoTrend
        } else if adx < 25.0 {
            TrendStrengthLevel::Weak
        } else if adx < 50.0 {
            TrendStrengthLevel::Moderate
        } else if adx < 75.0 {
            TrendStrengthLevel::Strong
        } else {
            TrendStrengthLevel::VeryStrong
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendStrength {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
    pub strength: TrendStrengthLevel,
    pub direction: Bias,
    pub should_trade: bool,
}

impl TrendStrength {
    /// Zero reading used when there is not enough data
    pub fn none() -> Self {
        Self {
            adx: 0.0,
            plus_di: 0.0,
            minus_di: 0.0,
            strength: TrendStrengthLevel::NoTrend,
            direction: Bias::Neutral,
            should_trade: false,
        }
    }

    /// Classify the series. Short series yield `TrendStrength::none()`.
    pub fn analyze(candles: &[Candle], period: usize) -> Self {
        let Some(reading) = adx(candles, period) else {
            tracing::debug!(candle_count = candles.len(), "TrendStrength: not enough candles");
            return Self::none();
        };

        let spread = reading.plus_di - reading.minus_di;
        let direction = if spread > DI_DEADBAND {
            Bias::Bullish
        } else if spread < -DI_DEADBAND {
            Bias::Bearish
        } else {
            Bias::Neutral
        };

        Self {
            adx: reading.adx,
            plus_di: reading.plus_di,
            minus_di: reading.minus_di,
            strength: TrendStrengthLevel::from_adx(reading.adx),
            direction,
            should_trade: reading.adx >= MIN_TRADEABLE_ADX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candles_from(closes: impl Iterator<Item = f64>) -> Vec<Candle> {
        closes
            .enumerate()
            .map(|(i, c)| Candle::new(i as i64, c, c + 1.0, c - 1.0, c, 100.0))
            .collect()
    }

    #[test]
    fn test_adx_buckets() {
        assert_eq!(TrendStrengthLevel::from_adx(19.9), TrendStrengthLevel::NoTrend);
        assert_eq!(TrendStrengthLevel::from_adx(20.0), TrendStrengthLevel::Weak);
        assert_eq!(TrendStrengthLevel::from_adx(25.0), TrendStrengthLevel::Moderate);
        assert_eq!(TrendStrengthLevel::from_adx(50.0), TrendStrengthLevel::Strong);
        assert_eq!(TrendStrengthLevel::from_adx(75.0), TrendStrengthLevel::VeryStrong);
    }

    #[test]
    fn test_insufficient_data_is_zeroed() {
        let candles = candles_from((0..10).map(|i| 100.0 + i as f64));
        let trend = TrendStrength::analyze(&candles, 14);
        assert_eq!(trend, TrendStrength::none());
        assert!(!trend.should_trade);
    }

    #[test]
    fn test_uptrend_direction() {
        let candles = candles_from((0..60).map(|i| 100.0 + i as f64 * 2.0));
        let trend = TrendStrength::analyze(&candles, 14);
        assert_eq!(trend.direction, Bias::Bullish);
        assert!(trend.should_trade);
    }

    #[test]
    fn test_downtrend_direction() {
        let candles = candles_from((0..60).map(|i| 300.0 - i as f64 * 2.0));
        let trend = TrendStrength::analyze(&candles, 14);
        assert_eq!(trend.direction, Bias::Bearish);
    }

    #[test]
    fn test_flat_market_has_no_direction() {
        let candles = candles_from((0..60).map(|_| 100.0));
        let trend = TrendStrength::analyze(&candles, 14);
        assert_eq!(trend.direction, Bias::Neutral);
        assert_eq!(trend.strength, TrendStrengthLevel::NoTrend);
    }
}
