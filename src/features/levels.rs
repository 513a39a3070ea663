//! Support/Resistance zone detection
//!
//! Swing highs and lows are bars whose high (low) strictly exceeds the
//! `swing_window` bars on either side. Swing points close to each other are
//! merged into zones; a zone gets stronger with every touch.

use serde::{Deserialize, Serialize};

use crate::config::LevelsConfig;
use crate::types::Candle;

/// Strength added per touch, capped at 100
const STRENGTH_PER_TOUCH: u32 = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZoneKind {
    Support,
    Resistance,
}

/// Where the current price sits relative to the detected zones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ZonePosition {
    NearSupport,
    NearResistance,
    Breakout,
    MidRange,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Zone {
    pub kind: ZoneKind,
    /// Running average of the merged swing prices
    pub level: f64,
    pub touches: u32,
    /// min(100, touches x 25)
    pub strength: u32,
}

impl Zone {
    fn new(kind: ZoneKind, price: f64) -> Self {
        Self {
            kind,
            level: price,
            touches: 1,
            strength: STRENGTH_PER_TOUCH,
        }
    }

    fn absorb(&mut self, price: f64) {
        self.level = (self.level * self.touches as f64 + price) / (self.touches as f64 + 1.0);
        self.touches += 1;
        self.strength = (self.touches * STRENGTH_PER_TOUCH).min(100);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportResistance {
    pub price: f64,
    /// Support zones at or below price, nearest first
    pub supports: Vec<Zone>,
    /// Resistance zones at or above price, nearest first
    pub resistances: Vec<Zone>,
    pub nearest_support: Option<f64>,
    pub nearest_resistance: Option<f64>,
    /// % distance from price down to the nearest support
    pub support_distance_pct: Option<f64>,
    /// % distance from price up to the nearest resistance
    pub resistance_distance_pct: Option<f64>,
    pub position: ZonePosition,
}

impl SupportResistance {
    /// Detect zones over the last `config.lookback` candles and classify the
    /// latest close against them. `None` for an empty series.
    pub fn analyze(candles: &[Candle], config: &LevelsConfig) -> Option<Self> {
        let price = candles.last()?.close;
        let window = &candles[candles.len().saturating_sub(config.lookback)..];

        let (swing_highs, swing_lows) = swing_points(window, config.swing_window);
        let tolerance = config.zone_tolerance_pct / 100.0;

        let mut supports: Vec<Zone> = cluster(&swing_lows, ZoneKind::Support, tolerance)
            .into_iter()
            .filter(|z| z.level <= price)
            .collect();
        let mut resistances: Vec<Zone> =
            cluster(&swing_highs, ZoneKind::Resistance, tolerance)
                .into_iter()
                .filter(|z| z.level >= price)
                .collect();

        supports.sort_by(|a, b| b.level.total_cmp(&a.level));
        resistances.sort_by(|a, b| a.level.total_cmp(&b.level));

        let nearest_support = supports.first().map(|z| z.level);
        let nearest_resistance = resistances.first().map(|z| z.level);
        let distance = |level: f64| {
            if price > 0.0 {
                Some((price - level).abs() / price * 100.0)
            } else {
                None
            }
        };
        let support_distance_pct = nearest_support.and_then(distance);
        let resistance_distance_pct = nearest_resistance.and_then(distance);

        let near = |d: Option<f64>| d.filter(|d| *d <= config.proximity_pct);
        let position = match (near(support_distance_pct), near(resistance_distance_pct)) {
            (Some(s), Some(r)) if r < s => ZonePosition::NearResistance,
            (Some(_), _) => ZonePosition::NearSupport,
            (None, Some(_)) => ZonePosition::NearResistance,
            (None, None) if supports.is_empty() || resistances.is_empty() => {
                ZonePosition::Breakout
            }
            (None, None) => ZonePosition::MidRange,
        };

        tracing::debug!(
            price,
            supports = supports.len(),
            resistances = resistances.len(),
            position = ?position,
            "SupportResistance::analyze"
        );

        Some(Self {
            price,
            supports,
            resistances,
            nearest_support,
            nearest_resistance,
            support_distance_pct,
            resistance_distance_pct,
            position,
        })
    }
}

/// Swing highs and lows in chronological order
pub fn swing_points(candles: &[Candle], window: usize) -> (Vec<f64>, Vec<f64>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    if window == 0 || candles.len() < window * 2 + 1 {
        return (highs, lows);
    }

    for i in window..candles.len() - window {
        let c = &candles[i];
        let neighbours = candles[i - window..i]
            .iter()
            .chain(candles[i + 1..=i + window].iter());

        let (mut is_high, mut is_low) = (true, true);
        for n in neighbours {
            is_high &= c.high > n.high;
            is_low &= c.low < n.low;
        }
        if is_high {
            highs.push(c.high);
        }
        if is_low {
            lows.push(c.low);
        }
    }

    (highs, lows)
}

/// Merge each swing price into the first zone whose running average is
/// within `tolerance` (fractional), else open a new zone.
fn cluster(prices: &[f64], kind: ZoneKind, tolerance: f64) -> Vec<Zone> {
    let mut zones: Vec<Zone> = Vec::new();
    for &price in prices {
        let existing = zones
            .iter_mut()
            .find(|z| z.level > 0.0 && ((price - z.level).abs() / z.level) <= tolerance);
        match existing {
            Some(zone) => zone.absorb(price),
            None => zones.push(Zone::new(kind, price)),
        }
    }
    zones
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(i: i64, low: f64, high: f64, close: f64) -> Candle {
        Candle::new(i, close, high, low, close, 100.0)
    }

    /// Oscillates between ~90 and ~110 so swings form at both ends
    fn ranging(n: usize, last_close: f64) -> Vec<Candle> {
        let pattern = [100.0, 105.0, 110.0, 105.0, 100.0, 95.0, 90.0, 95.0];
        let mut candles: Vec<Candle> = (0..n)
            .map(|i| {
                let mid = pattern[i % pattern.len()];
                bar(i as i64, mid - 1.0, mid + 1.0, mid)
            })
            .collect();
        let last = candles.len() - 1;
        candles[last] = bar(last as i64, last_close - 1.0, last_close + 1.0, last_close);
        candles
    }

    #[test]
    fn test_swing_points_detected() {
        let candles = ranging(40, 100.0);
        let (highs, lows) = swing_points(&candles, 2);
        assert!(!highs.is_empty());
        assert!(!lows.is_empty());
        assert!(highs.iter().all(|h| (*h - 111.0).abs() < 1e-9));
        assert!(lows.iter().all(|l| (*l - 89.0).abs() < 1e-9));
    }

    #[test]
    fn test_equal_neighbours_are_not_swings() {
        let candles: Vec<Candle> = (0..10).map(|i| bar(i, 99.0, 101.0, 100.0)).collect();
        let (highs, lows) = swing_points(&candles, 2);
        assert!(highs.is_empty());
        assert!(lows.is_empty());
    }

    #[test]
    fn test_zones_merge_and_strength_caps() {
        let candles = ranging(64, 100.0);
        let sr = SupportResistance::analyze(&candles, &LevelsConfig::default()).unwrap();
        assert_eq!(sr.supports.len(), 1);
        assert_eq!(sr.resistances.len(), 1);
        assert!(sr.supports[0].touches >= 4);
        assert_eq!(sr.supports[0].strength, 100);
        assert_eq!(sr.position, ZonePosition::MidRange);
    }

    #[test]
    fn test_near_support() {
        let candles = ranging(64, 89.5);
        let sr = SupportResistance::analyze(&candles, &LevelsConfig::default()).unwrap();
        assert_eq!(sr.position, ZonePosition::NearSupport);
        assert!(sr.support_distance_pct.unwrap() <= 1.0);
    }

    #[test]
    fn test_near_resistance() {
        let candles = ranging(64, 110.5);
        let sr = SupportResistance::analyze(&candles, &LevelsConfig::default()).unwrap();
        assert_eq!(sr.position, ZonePosition::NearResistance);
    }

    #[test]
    fn test_breakout_above_all_resistance() {
        let candles = ranging(64, 130.0);
        let sr = SupportResistance::analyze(&candles, &LevelsConfig::default()).unwrap();
        assert!(sr.resistances.is_empty());
        assert_eq!(sr.position, ZonePosition::Breakout);
    }

    #[test]
    fn test_empty_series() {
        assert!(SupportResistance::analyze(&[], &LevelsConfig::default()).is_none());
    }
}
