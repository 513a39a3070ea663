use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KellyQuote {
    /// Win probability
    pub p: f64,
    /// Payoff ratio
    pub b: f64,
    /// (b*p - q) / b, may be negative
    pub f_raw: f64,
    /// Half of max(f_raw, 0), in % of capital, capped
    pub half_kelly_pct: f64,
}

/// Half-Kelly fraction for win probability `p` and payoff `b`.
/// Negative edge sizes to zero.
pub fn compute_half_kelly(p: f64, b: f64, cap_pct: f64) -> KellyQuote {
    let p = p.clamp(0.0, 1.0);
    let q = 1.0 - p;
    let f_raw = if b > 0.0 { (b * p - q) / b } else { 0.0 };
    let half_kelly_pct = (f_raw.max(0.0) * 50.0).min(cap_pct.max(0.0));

    KellyQuote {
        p,
        b,
        f_raw,
        half_kelly_pct,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionSizing {
    pub capital: f64,
    pub confidence: f64,
    pub confidence_multiplier: f64,
    pub volatility_multiplier: f64,
    /// Confidence- and volatility-scaled position, % of capital, capped
    pub position_pct: f64,
    pub position_size: f64,
    /// Independent half-Kelly ceiling; callers decide which cap to honor
    pub kelly: KellyQuote,
    pub kelly_position_size: f64,
}

impl PositionSizing {
    pub fn calculate(
        capital: f64,
        confidence: f64,
        atr_percent: Option<f64>,
        config: &RiskConfig,
    ) -> Self {
        let confidence_multiplier = (confidence / 100.0).clamp(0.0, 1.0);
        let volatility_multiplier = volatility_multiplier(atr_percent);
        let position_pct = (config.base_position_pct * confidence_multiplier * volatility_multiplier)
            .min(config.max_position_pct);

        let kelly = compute_half_kelly(
            confidence_multiplier,
            config.kelly_payoff,
            config.max_position_pct,
        );

        Self {
            capital,
            confidence,
            confidence_multiplier,
            volatility_multiplier,
            position_pct,
            position_size: capital * position_pct / 100.0,
            kelly,
            kelly_position_size: capital * kelly.half_kelly_pct / 100.0,
        }
    }
}

/// 1.2 below 1.5% ATR, 0.7 for 3-4%, 0.5 above 4%, else 1.0.
/// Missing ATR sizes as normal volatility.
pub fn volatility_multiplier(atr_percent: Option<f64>) -> f64 {
    match atr_percent {
        Some(p) if p < 1.5 => 1.2,
        Some(p) if p > 4.0 => 0.5,
        Some(p) if p >= 3.0 => 0.7,
        _ => 1.0,
    }
}
