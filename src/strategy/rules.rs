//! Confluence rules
//!
//! Each rule looks at the shared context (and, for the volume and timeframe
//! rules, the running tally) and returns signed contributions to the buy or
//! sell accumulator plus human-readable signal descriptions. The engine folds
//! the rules in a fixed order; the order matters for the message text and for
//! the rules that read the tally.

use serde::{Deserialize, Serialize};

use crate::config::ConfluenceConfig;
use crate::features::{AdaptiveThresholds, IndicatorSnapshot, VolumeProfile};
use crate::lifecycle::{MultiTimeframeAnalysis, TimeframeAlignment};
use crate::types::Bias;

/// Accumulator a contribution is booked against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    Buy,
    Sell,
}

/// One signed contribution to an accumulator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    /// Stable tag, e.g. `RSI_OVERSOLD`, usable as a weight-table key
    pub tag: String,
    pub side: Side,
    pub points: f64,
}

impl Contribution {
    fn new(tag: &str, side: Side, points: f64) -> Self {
        Self {
            tag: tag.to_string(),
            side,
            points,
        }
    }
}

/// Result of evaluating one rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleOutcome {
    pub contributions: Vec<Contribution>,
    pub signals: Vec<String>,
    pub conflict: Option<String>,
}

impl RuleOutcome {
    fn single(tag: &str, side: Side, points: f64, signal: String) -> Self {
        Self {
            contributions: vec![Contribution::new(tag, side, points)],
            signals: vec![signal],
            conflict: None,
        }
    }

    fn with_conflict(mut self, reason: &str) -> Self {
        self.conflict = Some(reason.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty() && self.conflict.is_none()
    }

    /// Net points this outcome books on `side`
    pub fn net(&self, side: Side) -> f64 {
        self.contributions
            .iter()
            .filter(|c| c.side == side)
            .map(|c| c.points)
            .sum()
    }
}

/// Running accumulator state threaded through the fold
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    pub buy: f64,
    pub sell: f64,
    pub has_conflict: bool,
    pub conflict_reason: Option<String>,
    pub signals: Vec<String>,
    pub contributions: Vec<Contribution>,
}

impl Tally {
    /// Book an outcome. Only the first conflict reason is kept.
    pub fn apply(mut self, outcome: RuleOutcome) -> Self {
        for c in &outcome.contributions {
            match c.side {
                Side::Buy => self.buy += c.points,
                Side::Sell => self.sell += c.points,
            }
        }
        if let Some(reason) = outcome.conflict {
            if !self.has_conflict {
                self.has_conflict = true;
                self.conflict_reason = Some(reason);
            }
        }
        self.signals.extend(outcome.signals);
        self.contributions.extend(outcome.contributions);
        self
    }

    /// Side strictly ahead, if any
    pub fn leader(&self) -> Option<Side> {
        if self.buy > self.sell {
            Some(Side::Buy)
        } else if self.sell > self.buy {
            Some(Side::Sell)
        } else {
            None
        }
    }
}

/// Everything the rules read. Built once per evaluation.
#[derive(Debug, Clone)]
pub struct RuleContext<'a> {
    pub snapshot: &'a IndicatorSnapshot,
    pub thresholds: AdaptiveThresholds,
    pub macd: Bias,
    pub volume: Option<VolumeProfile>,
    pub timeframe: Option<MultiTimeframeAnalysis>,
    pub config: &'a ConfluenceConfig,
}

impl<'a> RuleContext<'a> {
    pub fn new(
        snapshot: &'a IndicatorSnapshot,
        volume: Option<VolumeProfile>,
        timeframe: Option<MultiTimeframeAnalysis>,
        config: &'a ConfluenceConfig,
    ) -> Self {
        Self {
            snapshot,
            thresholds: AdaptiveThresholds::from_atr_percent(snapshot.atr_percent),
            macd: macd_regime(snapshot),
            volume,
            timeframe,
            config,
        }
    }

    /// RSI lean against the adaptive bands (approaching counts)
    pub fn rsi_bias(&self) -> Bias {
        let rsi = self.snapshot.rsi;
        if rsi < self.thresholds.approaching_oversold {
            Bias::Bullish
        } else if rsi > self.thresholds.approaching_overbought {
            Bias::Bearish
        } else {
            Bias::Neutral
        }
    }
}

pub type Rule = fn(&RuleContext<'_>, &Tally) -> RuleOutcome;

/// Rules in evaluation order
pub const RULES: [(&str, Rule); 9] = [
    ("rsi", rsi_rule),
    ("macd", macd_rule),
    ("rsi_macd_conflict", conflict_rule),
    ("bollinger", bollinger_rule),
    ("ema", ema_rule),
    ("volume", volume_rule),
    ("momentum", momentum_rule),
    ("range_position", range_rule),
    ("timeframe", timeframe_rule),
];

/// Fold every rule over a fresh tally
pub fn evaluate(ctx: &RuleContext<'_>) -> Tally {
    RULES.iter().fold(Tally::default(), |tally, (name, rule)| {
        let outcome = rule(ctx, &tally);
        if !outcome.is_empty() {
            tracing::trace!(
                rule = name,
                buy = outcome.net(Side::Buy),
                sell = outcome.net(Side::Sell),
                conflict = outcome.conflict.is_some(),
                "confluence rule fired"
            );
        }
        tally.apply(outcome)
    })
}

/// MACD regime: both line-over-signal and histogram must agree
pub fn macd_regime(snapshot: &IndicatorSnapshot) -> Bias {
    let m = &snapshot.macd;
    if m.macd > m.signal && m.histogram > 0.0 {
        Bias::Bullish
    } else if m.macd < m.signal && m.histogram < 0.0 {
        Bias::Bearish
    } else {
        Bias::Neutral
    }
}

pub fn rsi_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    let t = &ctx.thresholds;
    let rsi = ctx.snapshot.rsi;
    let level = t.volatility_level;

    if rsi < t.oversold {
        RuleOutcome::single(
            "RSI_OVERSOLD",
            Side::Buy,
            25.0,
            format!("RSI oversold ({rsi:.1} < {:.0}, {level} volatility)", t.oversold),
        )
    } else if rsi < t.approaching_oversold {
        RuleOutcome::single(
            "RSI_APPROACHING_OVERSOLD",
            Side::Buy,
            15.0,
            format!(
                "RSI approaching oversold ({rsi:.1} < {:.0}, {level} volatility)",
                t.approaching_oversold
            ),
        )
    } else if rsi > t.overbought {
        RuleOutcome::single(
            "RSI_OVERBOUGHT",
            Side::Sell,
            25.0,
            format!("RSI overbought ({rsi:.1} > {:.0}, {level} volatility)", t.overbought),
        )
    } else if rsi > t.approaching_overbought {
        RuleOutcome::single(
            "RSI_APPROACHING_OVERBOUGHT",
            Side::Sell,
            15.0,
            format!(
                "RSI approaching overbought ({rsi:.1} > {:.0}, {level} volatility)",
                t.approaching_overbought
            ),
        )
    } else {
        RuleOutcome::default()
    }
}

pub fn macd_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    let hist = ctx.snapshot.macd.histogram;
    match ctx.macd {
        Bias::Bullish => RuleOutcome::single(
            "MACD_BULLISH",
            Side::Buy,
            25.0,
            format!("MACD bullish (histogram {hist:+.4})"),
        ),
        Bias::Bearish => RuleOutcome::single(
            "MACD_BEARISH",
            Side::Sell,
            25.0,
            format!("MACD bearish (histogram {hist:+.4})"),
        ),
        Bias::Neutral => RuleOutcome::default(),
    }
}

/// An oversold RSI inside a bearish MACD regime reads as continuation, not
/// a bounce (and the mirror for overbought in a bullish regime).
pub fn conflict_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    match (ctx.rsi_bias(), ctx.macd) {
        (Bias::Bullish, Bias::Bearish) => RuleOutcome {
            contributions: vec![
                Contribution::new("RSI_MACD_CONFLICT", Side::Buy, -15.0),
                Contribution::new("RSI_MACD_CONFLICT", Side::Sell, 10.0),
            ],
            signals: vec!["Conflict: RSI oversold against bearish MACD, favoring continuation".into()],
            conflict: Some(
                "RSI oversold but MACD bearish: downtrend momentum likely to continue".into(),
            ),
        },
        (Bias::Bearish, Bias::Bullish) => RuleOutcome {
            contributions: vec![
                Contribution::new("RSI_MACD_CONFLICT", Side::Sell, -15.0),
                Contribution::new("RSI_MACD_CONFLICT", Side::Buy, 10.0),
            ],
            signals: vec!["Conflict: RSI overbought against bullish MACD, favoring continuation".into()],
            conflict: Some(
                "RSI overbought but MACD bullish: uptrend momentum likely to continue".into(),
            ),
        },
        _ => RuleOutcome::default(),
    }
}

/// Band touches are gated by MACD; the inner zones get smaller tiers
pub fn bollinger_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    let snap = ctx.snapshot;
    let bb = &snap.bollinger;
    if bb.upper - bb.lower <= 0.0 {
        return RuleOutcome::default();
    }
    let close = snap.close;
    let position = snap.band_position;

    if close <= bb.lower {
        return match ctx.macd {
            Bias::Bearish => RuleOutcome::single(
                "BB_LOWER_BREAKDOWN",
                Side::Sell,
                20.0,
                "Breaking below lower Bollinger Band with bearish MACD".into(),
            )
            .with_conflict("Price at lower Bollinger Band but MACD bearish: breakdown risk"),
            macd => RuleOutcome::single(
                "BB_LOWER_BOUNCE",
                Side::Buy,
                30.0,
                format!("Lower Bollinger Band touch with {} MACD: bounce confirmed", macd_word(macd)),
            ),
        };
    }

    if close >= bb.upper {
        return match ctx.macd {
            Bias::Bullish => RuleOutcome::single(
                "BB_UPPER_BREAKOUT",
                Side::Buy,
                20.0,
                "Breaking above upper Bollinger Band with bullish MACD".into(),
            )
            .with_conflict("Price at upper Bollinger Band but MACD bullish: breakout momentum"),
            macd => RuleOutcome::single(
                "BB_UPPER_REJECTION",
                Side::Sell,
                30.0,
                format!("Upper Bollinger Band touch with {} MACD: rejection confirmed", macd_word(macd)),
            ),
        };
    }

    if position < 0.3 {
        return match ctx.macd {
            Bias::Bullish => RuleOutcome::single(
                "BB_LOWER_ZONE",
                Side::Buy,
                20.0,
                format!("Lower Bollinger zone ({position:.2}) with bullish MACD"),
            ),
            Bias::Neutral => RuleOutcome::single(
                "BB_LOWER_ZONE",
                Side::Buy,
                10.0,
                format!("Lower Bollinger zone ({position:.2})"),
            ),
            Bias::Bearish => RuleOutcome::single(
                "BB_LOWER_ZONE_WEAK",
                Side::Sell,
                5.0,
                format!("Lower Bollinger zone ({position:.2}) but MACD bearish"),
            ),
        };
    }

    if position > 0.7 {
        return match ctx.macd {
            Bias::Bearish => RuleOutcome::single(
                "BB_UPPER_ZONE",
                Side::Sell,
                20.0,
                format!("Upper Bollinger zone ({position:.2}) with bearish MACD"),
            ),
            Bias::Neutral => RuleOutcome::single(
                "BB_UPPER_ZONE",
                Side::Sell,
                10.0,
                format!("Upper Bollinger zone ({position:.2})"),
            ),
            Bias::Bullish => RuleOutcome::single(
                "BB_UPPER_ZONE_WEAK",
                Side::Buy,
                5.0,
                format!("Upper Bollinger zone ({position:.2}) but MACD bullish"),
            ),
        };
    }

    RuleOutcome::default()
}

fn macd_word(bias: Bias) -> &'static str {
    match bias {
        Bias::Bullish => "bullish",
        Bias::Bearish => "bearish",
        Bias::Neutral => "neutral",
    }
}

/// Full EMA stack alignment and the EMA9 cross are scored independently
pub fn ema_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    let s = ctx.snapshot;
    let ema50 = s.ema50.value();
    let fallback = if s.ema50.is_fallback() {
        ", EMA50 from EMA21"
    } else {
        ""
    };
    let mut outcome = RuleOutcome::default();

    if s.ema9 > s.ema21 && s.ema21 > ema50 && s.close > s.ema9 {
        outcome.contributions.push(Contribution::new("EMA_ALIGNMENT_BULLISH", Side::Buy, 20.0));
        outcome
            .signals
            .push(format!("Bullish EMA alignment (9 > 21 > 50{fallback})"));
    } else if s.ema9 < s.ema21 && s.ema21 < ema50 && s.close < s.ema9 {
        outcome.contributions.push(Contribution::new("EMA_ALIGNMENT_BEARISH", Side::Sell, 20.0));
        outcome
            .signals
            .push(format!("Bearish EMA alignment (9 < 21 < 50{fallback})"));
    }

    if s.prev_close <= s.prev_ema9 && s.close > s.ema9 {
        outcome.contributions.push(Contribution::new("EMA9_CROSS_UP", Side::Buy, 15.0));
        outcome.signals.push("Price crossed above EMA9".into());
    } else if s.prev_close >= s.prev_ema9 && s.close < s.ema9 {
        outcome.contributions.push(Contribution::new("EMA9_CROSS_DOWN", Side::Sell, 15.0));
        outcome.signals.push("Price crossed below EMA9".into());
    }

    outcome
}

/// Spikes follow momentum; dry volume trims whichever side leads
pub fn volume_rule(ctx: &RuleContext<'_>, tally: &Tally) -> RuleOutcome {
    let Some(volume) = ctx.volume else {
        return RuleOutcome::default();
    };
    let rank = volume.percentile_rank;
    let momentum = ctx.snapshot.price_momentum;
    let flat = ctx.config.flat_momentum_pct;

    if volume.is_spike {
        if momentum > flat {
            return RuleOutcome::single(
                "VOLUME_SPIKE",
                Side::Buy,
                15.0,
                format!("Volume spike (P{rank:.0}) confirming upward move"),
            );
        }
        if momentum < -flat {
            return RuleOutcome::single(
                "VOLUME_SPIKE",
                Side::Sell,
                15.0,
                format!("Volume spike (P{rank:.0}) confirming downward move"),
            );
        }
        return RuleOutcome {
            contributions: vec![
                Contribution::new("VOLUME_SPIKE", Side::Buy, 5.0),
                Contribution::new("VOLUME_SPIKE", Side::Sell, 5.0),
            ],
            signals: vec![format!(
                "Volume spike (P{rank:.0}) with flat price: breakout direction unclear"
            )],
            conflict: None,
        };
    }

    if volume.is_dry {
        if let Some(side) = tally.leader() {
            let word = match side {
                Side::Buy => "buy",
                Side::Sell => "sell",
            };
            return RuleOutcome::single(
                "VOLUME_DRY",
                side,
                -5.0,
                format!("Dry volume (P{rank:.0}) weakens {word} conviction"),
            );
        }
    }

    RuleOutcome::default()
}

pub fn momentum_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    let momentum = ctx.snapshot.price_momentum;
    let threshold = ctx.config.momentum_threshold_pct;
    if momentum > threshold {
        RuleOutcome::single(
            "MOMENTUM_UP",
            Side::Buy,
            10.0,
            format!("Positive momentum ({momentum:+.2}%)"),
        )
    } else if momentum < -threshold {
        RuleOutcome::single(
            "MOMENTUM_DOWN",
            Side::Sell,
            10.0,
            format!("Negative momentum ({momentum:+.2}%)"),
        )
    } else {
        RuleOutcome::default()
    }
}

pub fn range_rule(ctx: &RuleContext<'_>, _: &Tally) -> RuleOutcome {
    let position = ctx.snapshot.range_position;
    let bars = ctx.config.range_lookback;
    if position <= 20.0 {
        RuleOutcome::single(
            "RANGE_LOW",
            Side::Buy,
            10.0,
            format!("Near {bars}-bar low ({position:.0}% of range)"),
        )
    } else if position >= 80.0 {
        RuleOutcome::single(
            "RANGE_HIGH",
            Side::Sell,
            10.0,
            format!("Near {bars}-bar high ({position:.0}% of range)"),
        )
    } else {
        RuleOutcome::default()
    }
}

/// Higher-timeframe agreement adjusts the side currently ahead
pub fn timeframe_rule(ctx: &RuleContext<'_>, tally: &Tally) -> RuleOutcome {
    let Some(mtf) = ctx.timeframe else {
        return RuleOutcome::default();
    };
    let Some(side) = tally.leader() else {
        return RuleOutcome::default();
    };

    match mtf.alignment {
        TimeframeAlignment::Aligned => RuleOutcome::single(
            "TIMEFRAME_ALIGNED",
            side,
            mtf.confidence_adjustment,
            format!("Higher timeframe aligned ({})", mtf.higher_trend),
        ),
        TimeframeAlignment::Conflicting => RuleOutcome::single(
            "TIMEFRAME_CONFLICT",
            side,
            mtf.confidence_adjustment,
            format!("Higher timeframe conflicting ({})", mtf.higher_trend),
        ),
        TimeframeAlignment::Neutral => RuleOutcome::default(),
    }
}
