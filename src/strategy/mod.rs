//! Confluence Engine - Multi-indicator signal generation
//!
//! Turns an ascending candle series into a BUY / SELL / HOLD decision:
//! - Indicator snapshot from the feature engine (abort if incomplete)
//! - Ordered rule fold into buy/sell accumulators (see [`rules`])
//! - Conflict detection between RSI, MACD and Bollinger readings
//! - Optional higher-timeframe adjustment folded in before clamping
//! - Hard 70 floor: below it every result is a WEAK HOLD
//!
//! `analyze` adds the diagnostic context (trend strength, S/R zones, volume
//! profile, candlestick patterns, reference-asset overlay, risk levels).
//!
//! Every call is a pure function of its arguments; nothing is cached.

pub mod rules;
pub use rules::{Contribution, Side};

pub mod scoring;
pub use scoring::{IndicatorWeight, WeightTable, WeightedScore};

use serde::{Deserialize, Serialize};

use crate::config::{ConfluenceConfig, EngineConfig};
use crate::features::{
    AdaptiveThresholds, FeatureEngine, IndicatorSnapshot, SupportResistance, TrendStrength,
    VolumeProfile,
};
use crate::lifecycle::{patterns, BtcCorrelation, CandlestickPattern, MultiTimeframeAnalysis};
use crate::risk::RiskLevels;
use crate::types::{Candle, Direction, SignalStrength, SignalType};

use rules::RuleContext;

/// Output of one confluence evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalResult {
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub strength: SignalStrength,
    /// 0-100
    pub confidence: f64,
    pub buy_score: f64,
    pub sell_score: f64,
    /// Time of the last candle, unix ms
    pub timestamp: i64,
    pub indicators: IndicatorSnapshot,
    pub thresholds: AdaptiveThresholds,
    /// Contributing signal descriptions, in accumulation order
    pub signals: Vec<String>,
    pub contributions: Vec<Contribution>,
    pub message: String,
    pub has_conflict: bool,
    pub conflict_reason: Option<String>,
}

impl SignalResult {
    pub fn is_actionable(&self) -> bool {
        self.signal_type != SignalType::Hold
    }

    pub fn direction(&self) -> Option<Direction> {
        Direction::from_signal(self.signal_type)
    }
}

/// Signal plus its diagnostic context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    pub signal: SignalResult,
    pub trend: TrendStrength,
    pub levels: Option<SupportResistance>,
    pub volume: Option<VolumeProfile>,
    pub patterns: Vec<CandlestickPattern>,
    pub timeframe: Option<MultiTimeframeAnalysis>,
    pub correlation: Option<BtcCorrelation>,
    /// Signal confidence after the reference-asset overlay
    pub adjusted_confidence: f64,
    /// Present for BUY and SELL only
    pub risk: Option<RiskLevels>,
}

/// Floor / strength classification of clamped scores
pub fn classify(
    buy: f64,
    sell: f64,
    config: &ConfluenceConfig,
) -> (SignalType, SignalStrength, f64) {
    let grade = |score: f64| {
        if score >= config.strong_confidence {
            SignalStrength::Strong
        } else {
            SignalStrength::Moderate
        }
    };

    if buy > sell && buy >= config.min_confidence {
        (SignalType::Buy, grade(buy), buy)
    } else if sell > buy && sell >= config.min_confidence {
        (SignalType::Sell, grade(sell), sell)
    } else {
        (SignalType::Hold, SignalStrength::Weak, buy.max(sell))
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfluenceEngine {
    config: EngineConfig,
    features: FeatureEngine,
}

impl ConfluenceEngine {
    pub fn new(config: EngineConfig) -> Self {
        let features = FeatureEngine::new(config.indicators.clone(), config.confluence.clone());
        Self { config, features }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Confluence signal for the latest candle. `None` when the series is
    /// shorter than `min_candles` or any required indicator is unavailable.
    pub fn generate(
        &self,
        candles: &[Candle],
        higher_timeframe: Option<&[Candle]>,
    ) -> Option<SignalResult> {
        if candles.len() < self.config.confluence.min_candles {
            tracing::debug!(
                candle_count = candles.len(),
                required = self.config.confluence.min_candles,
                "ConfluenceEngine: not enough candles, no signal"
            );
            return None;
        }

        let Some(snapshot) = self.features.compute(candles) else {
            tracing::debug!(candle_count = candles.len(), "ConfluenceEngine: incomplete snapshot");
            return None;
        };
        let timestamp = candles.last()?.time;
        let volume = VolumeProfile::analyze(candles, &self.config.volume);
        let timeframe = higher_timeframe.and_then(|h| MultiTimeframeAnalysis::analyze(candles, h));

        Some(self.score(snapshot, volume, timeframe, timestamp))
    }

    /// Run the rule fold over a precomputed snapshot
    pub fn score(
        &self,
        snapshot: IndicatorSnapshot,
        volume: Option<VolumeProfile>,
        timeframe: Option<MultiTimeframeAnalysis>,
        timestamp: i64,
    ) -> SignalResult {
        let ctx = RuleContext::new(&snapshot, volume, timeframe, &self.config.confluence);
        let thresholds = ctx.thresholds;
        let tally = rules::evaluate(&ctx);

        let buy_score = tally.buy.clamp(0.0, 100.0);
        let sell_score = tally.sell.clamp(0.0, 100.0);
        let (signal_type, strength, confidence) =
            classify(buy_score, sell_score, &self.config.confluence);

        let mut message = format!("{strength} {signal_type} ({confidence:.0}/100)");
        if !tally.signals.is_empty() {
            message.push_str(": ");
            message.push_str(&tally.signals.join(", "));
        }

        tracing::debug!(
            signal = %signal_type,
            strength = %strength,
            buy = buy_score,
            sell = sell_score,
            raw_buy = tally.buy,
            raw_sell = tally.sell,
            conflict = tally.has_conflict,
            rules = tally.signals.len(),
            "ConfluenceEngine::score completed"
        );

        SignalResult {
            signal_type,
            strength,
            confidence,
            buy_score,
            sell_score,
            timestamp,
            indicators: snapshot,
            thresholds,
            signals: tally.signals,
            contributions: tally.contributions,
            message,
            has_conflict: tally.has_conflict,
            conflict_reason: tally.conflict_reason,
        }
    }

    /// Signal plus trend, levels, volume, patterns, overlays and risk
    pub fn analyze(
        &self,
        candles: &[Candle],
        higher_timeframe: Option<&[Candle]>,
        reference: Option<&[Candle]>,
    ) -> Option<MarketAnalysis> {
        let signal = self.generate(candles, higher_timeframe)?;

        let trend = TrendStrength::analyze(candles, self.config.indicators.adx_period);
        let levels = SupportResistance::analyze(candles, &self.config.levels);
        let volume = VolumeProfile::analyze(candles, &self.config.volume);
        let patterns = patterns::detect(candles);
        let timeframe = higher_timeframe.and_then(|h| MultiTimeframeAnalysis::analyze(candles, h));
        let correlation = reference
            .and_then(|r| BtcCorrelation::analyze(r, signal.signal_type, &self.config.lifecycle));

        let adjusted_confidence = correlation
            .as_ref()
            .map_or(signal.confidence, |c| c.adjust(signal.confidence));
        let risk = signal.direction().map(|direction| {
            RiskLevels::calculate(
                signal.indicators.close,
                direction,
                signal.indicators.atr,
                &self.config.risk,
            )
        });

        Some(MarketAnalysis {
            signal,
            trend,
            levels,
            volume,
            patterns,
            timeframe,
            correlation,
            adjusted_confidence,
            risk,
        })
    }
}
