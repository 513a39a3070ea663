//! Feature Engine - Technical indicators and market context
//!
//! Computes the latest-bar indicator values from an ascending candle series:
//! - RSI (Wilder's smoothing)
//! - MACD (EMA line with EMA signal line)
//! - Bollinger Bands
//! - EMA / SMA baselines
//! - ATR (Wilder's smoothing) and ATR as % of price
//! - ADX with +DI / -DI
//! - Short-term momentum, local range position, volume trend
//!
//! Context classifiers built on these live in the submodules: adaptive RSI
//! thresholds, volume percentile ranking, ADX trend strength and swing-point
//! support/resistance zones.
//!
//! Every function is read-only over its input and returns `None` when the
//! series is too short, never panics.

use serde::{Deserialize, Serialize};

use crate::config::{ConfluenceConfig, IndicatorConfig};
use crate::types::{Candle, Reading};

pub mod levels;
pub use levels::{SupportResistance, Zone, ZoneKind, ZonePosition};

pub mod thresholds;
pub use thresholds::{AdaptiveThresholds, VolatilityLevel};

pub mod trend;
pub use trend::{TrendStrength, TrendStrengthLevel};

pub mod volume;
pub use volume::VolumeProfile;

/// MACD reading for the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Macd {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Bollinger Bands for the latest bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bollinger {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

impl Bollinger {
    /// Position of `price` inside the bands (0 = lower, 1 = upper).
    /// Collapsed bands report the midpoint.
    pub fn position(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width <= 0.0 {
            return 0.5;
        }
        (price - self.lower) / width
    }
}

/// ADX with its directional components
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Adx {
    pub adx: f64,
    pub plus_di: f64,
    pub minus_di: f64,
}

/// Recent volume versus the preceding baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
}

/// Latest-bar indicator values. Built fresh per call, never cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub prev_close: f64,
    pub rsi: f64,
    pub macd: Macd,
    pub bollinger: Bollinger,
    /// 0 = lower band, 1 = upper band
    pub band_position: f64,
    pub ema9: f64,
    /// EMA9 as of the previous bar
    pub prev_ema9: f64,
    pub ema21: f64,
    /// Falls back to EMA21 below 50 candles
    pub ema50: Reading,
    pub sma20: f64,
    pub atr: Option<f64>,
    pub atr_percent: Option<f64>,
    /// % change of close over the momentum lookback
    pub price_momentum: f64,
    /// % position inside the local high/low range
    pub range_position: f64,
    pub volume_trend: VolumeTrend,
}

/// Feature engine for computing technical indicators
#[derive(Debug, Clone, Default)]
pub struct FeatureEngine {
    indicators: IndicatorConfig,
    confluence: ConfluenceConfig,
}

impl FeatureEngine {
    pub fn new(indicators: IndicatorConfig, confluence: ConfluenceConfig) -> Self {
        Self {
            indicators,
            confluence,
        }
    }

    pub fn indicator_config(&self) -> &IndicatorConfig {
        &self.indicators
    }

    /// Compute the full snapshot, or `None` if any required indicator is
    /// unavailable. ATR is optional; everything else is required.
    pub fn compute(&self, candles: &[Candle]) -> Option<IndicatorSnapshot> {
        let last = candles.last()?;
        if candles.len() < 2 {
            tracing::debug!(candle_count = candles.len(), "FeatureEngine: not enough candles");
            return None;
        }
        let prev = &candles[candles.len() - 2];
        let closes = closes(candles);
        let cfg = &self.indicators;

        let rsi = rsi(&closes, cfg.rsi_period);
        let macd = macd(
            &closes,
            cfg.macd_fast,
            cfg.macd_slow,
            cfg.macd_signal,
            cfg.macd_min_closes,
        );
        let bollinger = bollinger(&closes, cfg.bb_period, cfg.bb_std_dev);
        let ema9 = ema(&closes, 9);
        let prev_ema9 = ema(&closes[..closes.len() - 1], 9);
        let ema21 = ema(&closes, 21);
        let sma20 = sma(&closes, 20);
        let momentum = price_momentum(&closes, self.confluence.momentum_lookback);
        let range = range_position(candles, self.confluence.range_lookback);

        let (
            Some(rsi),
            Some(macd),
            Some(bollinger),
            Some(ema9),
            Some(prev_ema9),
            Some(ema21),
            Some(sma20),
            Some(price_momentum),
            Some(range_position),
        ) = (
            rsi, macd, bollinger, ema9, prev_ema9, ema21, sma20, momentum, range,
        )
        else {
            tracing::debug!(
                candle_count = candles.len(),
                has_rsi = rsi.is_some(),
                has_macd = macd.is_some(),
                has_bb = bollinger.is_some(),
                has_ema21 = ema21.is_some(),
                "FeatureEngine: required indicator unavailable"
            );
            return None;
        };

        let ema50 = match ema(&closes, 50) {
            Some(v) => Reading::Computed(v),
            None => Reading::Fallback(ema21),
        };

        let atr = atr(candles, cfg.atr_period);
        let atr_percent = atr.and_then(|a| percent_of(a, last.close));

        let snapshot = IndicatorSnapshot {
            close: last.close,
            prev_close: prev.close,
            rsi,
            macd,
            bollinger,
            band_position: bollinger.position(last.close),
            ema9,
            prev_ema9,
            ema21,
            ema50,
            sma20,
            atr,
            atr_percent,
            price_momentum,
            range_position,
            volume_trend: volume_trend(candles),
        };

        tracing::debug!(
            candle_count = candles.len(),
            rsi = snapshot.rsi,
            macd_hist = snapshot.macd.histogram,
            atr_pct = ?snapshot.atr_percent,
            ema50_fallback = snapshot.ema50.is_fallback(),
            "FeatureEngine::compute completed"
        );

        Some(snapshot)
    }
}

/// Close prices of a series
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

/// `value` as a percentage of `base`, if `base` is positive
pub fn percent_of(value: f64, base: f64) -> Option<f64> {
    if base > 0.0 {
        Some(value / base * 100.0)
    } else {
        None
    }
}

/// Simple moving average of the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// EMA series seeded with the SMA of the first `period` values.
/// Element `i` corresponds to input index `i + period - 1`.
pub fn ema_series(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    let mut ema = seed;
    for v in &values[period..] {
        ema = (v - ema) * multiplier + ema;
        series.push(ema);
    }
    series
}

/// Latest EMA value
pub fn ema(values: &[f64], period: usize) -> Option<f64> {
    ema_series(values, period).last().copied()
}

/// RSI using Wilder's smoothing over the whole series
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
    let p = period as f64;

    let mut avg_gain = changes[..period].iter().map(|c| c.max(0.0)).sum::<f64>() / p;
    let mut avg_loss = changes[..period].iter().map(|c| (-c).max(0.0)).sum::<f64>() / p;

    for c in &changes[period..] {
        avg_gain = (avg_gain * (p - 1.0) + c.max(0.0)) / p;
        avg_loss = (avg_loss * (p - 1.0) + (-c).max(0.0)) / p;
    }

    if avg_loss == 0.0 {
        // No movement at all reads neutral
        return Some(if avg_gain == 0.0 { 50.0 } else { 100.0 });
    }

    let rs = avg_gain / avg_loss;
    Some(100.0 - 100.0 / (1.0 + rs))
}

/// MACD line, EMA signal line and histogram for the latest bar
pub fn macd(
    values: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
    min_closes: usize,
) -> Option<Macd> {
    if values.len() < min_closes.max(slow) {
        return None;
    }

    let fast_series = ema_series(values, fast);
    let slow_series = ema_series(values, slow);
    if fast_series.is_empty() || slow_series.is_empty() {
        return None;
    }

    // Align both series on the input index of the slow EMA's first value
    let offset = slow.saturating_sub(fast);
    let line: Vec<f64> = slow_series
        .iter()
        .enumerate()
        .filter_map(|(i, s)| fast_series.get(i + offset).map(|f| f - s))
        .collect();

    let signal_value = ema(&line, signal)?;
    let macd_value = *line.last()?;

    Some(Macd {
        macd: macd_value,
        signal: signal_value,
        histogram: macd_value - signal_value,
    })
}

/// Bollinger Bands over the last `period` values (population std dev)
pub fn bollinger(values: &[f64], period: usize, std_dev: f64) -> Option<Bollinger> {
    let middle = sma(values, period)?;
    let window = &values[values.len() - period..];
    let variance = window.iter().map(|v| (v - middle).powi(2)).sum::<f64>() / period as f64;
    let sigma = variance.sqrt();

    Some(Bollinger {
        upper: middle + std_dev * sigma,
        middle,
        lower: middle - std_dev * sigma,
    })
}

/// True range of `curr` against the previous close
pub fn true_range(curr: &Candle, prev: &Candle) -> f64 {
    (curr.high - curr.low)
        .max((curr.high - prev.close).abs())
        .max((curr.low - prev.close).abs())
}

/// ATR with Wilder's smoothing
pub fn atr(candles: &[Candle], period: usize) -> Option<f64> {
    if period == 0 || candles.len() < period + 1 {
        return None;
    }

    let trs: Vec<f64> = candles.windows(2).map(|w| true_range(&w[1], &w[0])).collect();
    let p = period as f64;

    let mut atr = trs[..period].iter().sum::<f64>() / p;
    for tr in &trs[period..] {
        atr = (atr * (p - 1.0) + tr) / p;
    }
    Some(atr)
}

/// ATR as a percentage of the latest close
pub fn atr_percent(candles: &[Candle], period: usize) -> Option<f64> {
    let atr = atr(candles, period)?;
    percent_of(atr, candles.last()?.close)
}

/// ADX (Average Directional Index) with +DI / -DI
pub fn adx(candles: &[Candle], period: usize) -> Option<Adx> {
    if period == 0 || candles.len() < period * 2 {
        return None;
    }

    let mut trs = Vec::with_capacity(candles.len() - 1);
    let mut plus_dms = Vec::with_capacity(candles.len() - 1);
    let mut minus_dms = Vec::with_capacity(candles.len() - 1);

    for w in candles.windows(2) {
        let (prev, curr) = (&w[0], &w[1]);
        let up_move = curr.high - prev.high;
        let down_move = prev.low - curr.low;

        plus_dms.push(if up_move > down_move && up_move > 0.0 {
            up_move
        } else {
            0.0
        });
        minus_dms.push(if down_move > up_move && down_move > 0.0 {
            down_move
        } else {
            0.0
        });
        trs.push(true_range(curr, prev));
    }

    let p = period as f64;
    let mut smoothed_tr: f64 = trs[..period].iter().sum();
    let mut smoothed_plus: f64 = plus_dms[..period].iter().sum();
    let mut smoothed_minus: f64 = minus_dms[..period].iter().sum();

    let directional = |tr: f64, plus: f64, minus: f64| -> (f64, f64, f64) {
        if tr <= 0.0 {
            return (0.0, 0.0, 0.0);
        }
        let plus_di = 100.0 * plus / tr;
        let minus_di = 100.0 * minus / tr;
        let sum = plus_di + minus_di;
        let dx = if sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / sum
        } else {
            0.0
        };
        (dx, plus_di, minus_di)
    };

    let mut dx_values = Vec::with_capacity(trs.len() - period + 1);
    dx_values.push(directional(smoothed_tr, smoothed_plus, smoothed_minus));

    for i in period..trs.len() {
        smoothed_tr = smoothed_tr - smoothed_tr / p + trs[i];
        smoothed_plus = smoothed_plus - smoothed_plus / p + plus_dms[i];
        smoothed_minus = smoothed_minus - smoothed_minus / p + minus_dms[i];
        dx_values.push(directional(smoothed_tr, smoothed_plus, smoothed_minus));
    }

    if dx_values.len() < period {
        return None;
    }

    let mut adx = dx_values[..period].iter().map(|(dx, _, _)| dx).sum::<f64>() / p;
    for (dx, _, _) in &dx_values[period..] {
        adx = (adx * (p - 1.0) + dx) / p;
    }

    let (_, plus_di, minus_di) = *dx_values.last()?;
    Some(Adx {
        adx,
        plus_di,
        minus_di,
    })
}

/// % change of the latest close over `lookback` bars
pub fn price_momentum(values: &[f64], lookback: usize) -> Option<f64> {
    if lookback == 0 || values.len() < lookback + 1 {
        return None;
    }
    let last = *values.last()?;
    let base = values[values.len() - 1 - lookback];
    percent_of(last - base, base)
}

/// % position of the latest close inside the high/low range of the last
/// `lookback` candles (fewer if the series is shorter). A flat range reads 50.
pub fn range_position(candles: &[Candle], lookback: usize) -> Option<f64> {
    let last = candles.last()?;
    let window = &candles[candles.len().saturating_sub(lookback.max(1))..];

    let high = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
    let low = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);
    let span = high - low;
    if span <= 0.0 {
        return Some(50.0);
    }
    Some((last.close - low) / span * 100.0)
}

/// Mean of the last 5 volumes against the mean of the 20 before them
pub fn volume_trend(candles: &[Candle]) -> VolumeTrend {
    const RECENT: usize = 5;
    const BASELINE: usize = 20;

    if candles.len() < RECENT + BASELINE {
        return VolumeTrend::Stable;
    }

    let n = candles.len();
    let recent = candles[n - RECENT..].iter().map(|c| c.volume).sum::<f64>() / RECENT as f64;
    let baseline = candles[n - RECENT - BASELINE..n - RECENT]
        .iter()
        .map(|c| c.volume)
        .sum::<f64>()
        / BASELINE as f64;

    if baseline <= 0.0 {
        return VolumeTrend::Stable;
    }

    let ratio = recent / baseline;
    if ratio > 1.2 {
        VolumeTrend::Increasing
    } else if ratio < 0.8 {
        VolumeTrend::Decreasing
    } else {
        VolumeTrend::Stable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_candle(ts: i64, close: f64) -> Candle {
        Candle::new(ts, close - 0.5, close + 1.0, close - 1.0, close, 1000.0)
    }

    fn series(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| make_candle(1_700_000_000_000 + i as i64 * 900_000, *c))
            .collect()
    }

    fn rising(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn test_rsi_monotonic_up_is_100() {
        let closes = rising(15);
        assert_eq!(rsi(&closes, 14), Some(100.0));
    }

    #[test]
    fn test_rsi_monotonic_down_is_0() {
        let closes: Vec<f64> = (0..15).map(|i| 200.0 - i as f64).collect();
        let value = rsi(&closes, 14).unwrap();
        assert!(value.abs() < 1e-9);
    }

    #[test]
    fn test_rsi_flat_is_neutral() {
        let closes = vec![100.0; 20];
        assert_eq!(rsi(&closes, 14), Some(50.0));
    }

    #[test]
    fn test_rsi_not_enough_data() {
        assert_eq!(rsi(&rising(14), 14), None);
    }

    #[test]
    fn test_rsi_mixed_stays_in_bounds() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0)
            .collect();
        let value = rsi(&closes, 14).unwrap();
        assert!(value > 0.0 && value < 100.0);
    }

    #[test]
    fn test_sma_and_ema_constant_series() {
        let closes = vec![42.0; 30];
        assert_eq!(sma(&closes, 20), Some(42.0));
        assert!((ema(&closes, 9).unwrap() - 42.0).abs() < 1e-12);
        assert_eq!(sma(&closes[..5], 20), None);
    }

    #[test]
    fn test_ema_series_length() {
        let closes = rising(30);
        assert_eq!(ema_series(&closes, 9).len(), 22);
        assert!(ema_series(&closes[..8], 9).is_empty());
    }

    #[test]
    fn test_macd_guard() {
        assert!(macd(&rising(25), 3, 10, 9, 26).is_none());
        let m = macd(&rising(26), 3, 10, 9, 26).unwrap();
        // Linear uptrend: fast EMA sits above slow EMA
        assert!(m.macd > 0.0);
        assert!((m.histogram - (m.macd - m.signal)).abs() < 1e-12);
    }

    #[test]
    fn test_macd_downtrend_negative() {
        let closes: Vec<f64> = (0..40).map(|i| 500.0 - i as f64 * 2.0).collect();
        let m = macd(&closes, 3, 10, 9, 26).unwrap();
        assert!(m.macd < 0.0);
    }

    #[test]
    fn test_bollinger_constant_series_collapses() {
        let closes = vec![10.0; 25];
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert_eq!(bb.upper, 10.0);
        assert_eq!(bb.lower, 10.0);
        assert_eq!(bb.position(10.0), 0.5);
    }

    #[test]
    fn test_bollinger_symmetry() {
        let closes: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 9.0 } else { 11.0 }).collect();
        let bb = bollinger(&closes, 20, 2.0).unwrap();
        assert!((bb.middle - 10.0).abs() < 1e-12);
        assert!((bb.upper - 12.0).abs() < 1e-12);
        assert!((bb.lower - 8.0).abs() < 1e-12);
    }

    #[test]
    fn test_atr_constant_range() {
        let candles = series(&vec![100.0; 20]);
        let value = atr(&candles, 14).unwrap();
        assert!((value - 2.0).abs() < 1e-12);
        assert!((atr_percent(&candles, 14).unwrap() - 2.0).abs() < 1e-12);
        assert!(atr(&candles[..14], 14).is_none());
    }

    #[test]
    fn test_adx_uptrend() {
        let candles = series(&rising(60));
        let reading = adx(&candles, 14).unwrap();
        assert!(reading.plus_di > reading.minus_di);
        assert!(reading.adx > 25.0);
        assert!(adx(&candles[..27], 14).is_none());
    }

    #[test]
    fn test_momentum_and_range_position() {
        let closes = vec![100.0, 100.0, 100.0, 100.0, 100.0, 102.0];
        assert!((price_momentum(&closes, 5).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(price_momentum(&closes, 6), None);

        let candles = series(&rising(40));
        let pos = range_position(&candles, 40).unwrap();
        // Last close sits 1.0 below the top of the range
        assert!(pos > 95.0 && pos < 100.0);
    }

    #[test]
    fn test_volume_trend() {
        let mut candles = series(&vec![100.0; 30]);
        assert_eq!(volume_trend(&candles), VolumeTrend::Stable);
        for c in candles.iter_mut().rev().take(5) {
            c.volume = 2000.0;
        }
        assert_eq!(volume_trend(&candles), VolumeTrend::Increasing);
    }

    #[test]
    fn test_snapshot_ema50_fallback() {
        let engine = FeatureEngine::default();
        let candles = series(&rising(30));
        let snap = engine.compute(&candles).unwrap();
        assert!(snap.ema50.is_fallback());
        assert_eq!(snap.ema50.value(), snap.ema21);

        let candles = series(&rising(60));
        let snap = engine.compute(&candles).unwrap();
        assert!(!snap.ema50.is_fallback());
    }

    #[test]
    fn test_snapshot_requires_data() {
        let engine = FeatureEngine::default();
        assert!(engine.compute(&series(&rising(20))).is_none());
        assert!(engine.compute(&[]).is_none());
    }
}
