//! Risk Levels - ATR-based stop-loss and take-profit targets
//!
//! Implements:
//! - Stop-loss at 1.5 ATR against the position
//! - Three take-profit targets at 2.5 / 3.75 / 5 ATR in its favor
//! - Risk/reward ratio from the first target
//! - ATR fallback to 2% of entry price, tagged as such
//!
//! Position sizing lives in [`kelly`].

pub mod kelly;
pub use kelly::{KellyQuote, PositionSizing};

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::types::{Direction, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskLevels {
    pub direction: Direction,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub take_profit2: f64,
    pub take_profit3: f64,
    /// |TP1 - entry| / |entry - SL|
    pub risk_reward_ratio: f64,
    /// Distance to the stop as % of entry
    #[serde(rename = "positionRiskPct")]
    pub position_risk_pct: f64,
    /// ATR used for the levels
    pub atr: Reading,
}

impl RiskLevels {
    /// Levels for `direction` entered at `entry_price`. A missing or
    /// non-positive ATR falls back to `fallback_atr_pct` of the entry price.
    pub fn calculate(
        entry_price: f64,
        direction: Direction,
        atr: Option<f64>,
        config: &RiskConfig,
    ) -> Self {
        let atr = match atr {
            Some(a) if a > 0.0 => Reading::Computed(a),
            _ => Reading::Fallback(entry_price * config.fallback_atr_pct / 100.0),
        };
        let a = atr.value();
        let sign = direction.sign();

        let stop_loss = entry_price - sign * a * config.stop_loss_atr;
        let take_profit = entry_price + sign * a * config.take_profit_atr;
        let take_profit2 = entry_price + sign * a * config.take_profit2_atr;
        let take_profit3 = entry_price + sign * a * config.take_profit3_atr;

        let risk = (entry_price - stop_loss).abs();
        let reward = (take_profit - entry_price).abs();
        let risk_reward_ratio = if risk > 0.0 { reward / risk } else { 0.0 };
        let position_risk_pct = if entry_price > 0.0 {
            risk / entry_price * 100.0
        } else {
            0.0
        };

        if atr.is_fallback() {
            tracing::debug!(entry_price, atr = a, "RiskLevels: ATR unavailable, using fallback");
        }

        Self {
            direction,
            entry_price,
            stop_loss,
            take_profit,
            take_profit2,
            take_profit3,
            risk_reward_ratio,
            position_risk_pct,
            atr,
        }
    }
}
