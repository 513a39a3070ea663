//! Adaptive RSI thresholds
//!
//! Fixed 30/70 RSI bands misfire across volatility regimes: calm markets
//! rarely reach them and violent markets sit beyond them for hours. ATR as %
//! of price picks one of four bands instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Volatility regime bucketed from ATR%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityLevel {
    Low,
    Normal,
    High,
    Extreme,
}

impl VolatilityLevel {
    /// Bucket an ATR% reading; a missing reading is treated as NORMAL
    pub fn from_atr_percent(atr_percent: Option<f64>) -> Self {
        match atr_percent {
            None => VolatilityLevel::Normal,
            Some(p) if p < 1.5 => VolatilityLevel::Low,
            Some(p) if p < 3.0 => VolatilityLevel::Normal,
            Some(p) if p < 5.0 => VolatilityLevel::High,
            Some(_) => VolatilityLevel::Extreme,
        }
    }
}

impl fmt::Display for VolatilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolatilityLevel::Low => write!(f, "LOW"),
            VolatilityLevel::Normal => write!(f, "NORMAL"),
            VolatilityLevel::High => write!(f, "HIGH"),
            VolatilityLevel::Extreme => write!(f, "EXTREME"),
        }
    }
}

/// RSI bands for the current volatility regime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveThresholds {
    pub oversold: f64,
    pub approaching_oversold: f64,
    pub overbought: f64,
    pub approaching_overbought: f64,
    pub volatility_level: VolatilityLevel,
}

impl AdaptiveThresholds {
    pub fn for_level(level: VolatilityLevel) -> Self {
        let (oversold, approaching_oversold, approaching_overbought, overbought) = match level {
            VolatilityLevel::Low => (32.0, 38.0, 62.0, 68.0),
            VolatilityLevel::Normal => (35.0, 42.0, 58.0, 65.0),
            VolatilityLevel::High => (30.0, 38.0, 62.0, 70.0),
            VolatilityLevel::Extreme => (25.0, 33.0, 67.0, 75.0),
        };
        Self {
            oversold,
            approaching_oversold,
            overbought,
            approaching_overbought,
            volatility_level: level,
        }
    }

    /// Thresholds for an ATR% reading (None -> NORMAL)
    pub fn from_atr_percent(atr_percent: Option<f64>) -> Self {
        Self::for_level(VolatilityLevel::from_atr_percent(atr_percent))
    }
}

impl Default for AdaptiveThresholds {
    fn default() -> Self {
        Self::for_level(VolatilityLevel::Normal)
    }
}
