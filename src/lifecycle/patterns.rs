//! Candlestick pattern recognition
//!
//! Diagnostic output only; patterns are never scored into the confluence
//! accumulators.

use serde::{Deserialize, Serialize};

use crate::types::{Bias, Candle};

/// Body at or below this share of the range is a doji
const DOJI_BODY_RATIO: f64 = 0.1;
/// Long wick must be at least this multiple of the body
const LONG_WICK_RATIO: f64 = 2.0;
/// Opposite wick must be at most this multiple of the body
const SHORT_WICK_RATIO: f64 = 0.5;
/// Star middle candle body relative to the first candle's body
const STAR_BODY_RATIO: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PatternKind {
    Doji,
    Hammer,
    InvertedHammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandlestickPattern {
    pub kind: PatternKind,
    pub bias: Bias,
    pub description: String,
}

impl CandlestickPattern {
    fn new(kind: PatternKind, bias: Bias, description: &str) -> Self {
        Self {
            kind,
            bias,
            description: description.to_string(),
        }
    }
}

/// Patterns formed by the most recent one to three candles
pub fn detect(candles: &[Candle]) -> Vec<CandlestickPattern> {
    let mut found = Vec::new();
    let n = candles.len();
    let Some(last) = candles.last() else {
        return found;
    };

    if let Some(p) = single_candle(last, prior_decline(candles)) {
        found.push(p);
    }
    if n >= 2 {
        if let Some(p) = engulfing(&candles[n - 2], last) {
            found.push(p);
        }
    }
    if n >= 3 {
        if let Some(p) = star(&candles[n - 3], &candles[n - 2], last) {
            found.push(p);
        }
    }

    if !found.is_empty() {
        tracing::debug!(
            patterns = ?found.iter().map(|p| p.kind).collect::<Vec<_>>(),
            "candlestick patterns detected"
        );
    }
    found
}

/// Close two bars back below the close four bars back
fn prior_decline(candles: &[Candle]) -> bool {
    let n = candles.len();
    n >= 4 && candles[n - 2].close < candles[n - 4].close
}

fn single_candle(c: &Candle, after_decline: bool) -> Option<CandlestickPattern> {
    let range = c.range();
    if range <= 0.0 {
        return None;
    }
    let body = c.body();

    if body <= range * DOJI_BODY_RATIO {
        return Some(CandlestickPattern::new(
            PatternKind::Doji,
            Bias::Neutral,
            "Doji: indecision, open and close nearly equal",
        ));
    }

    if c.lower_wick() >= body * LONG_WICK_RATIO && c.upper_wick() <= body * SHORT_WICK_RATIO {
        return Some(CandlestickPattern::new(
            PatternKind::Hammer,
            Bias::Bullish,
            "Hammer: long lower wick, buyers rejected lower prices",
        ));
    }

    if c.upper_wick() >= body * LONG_WICK_RATIO && c.lower_wick() <= body * SHORT_WICK_RATIO {
        return Some(if after_decline {
            CandlestickPattern::new(
                PatternKind::InvertedHammer,
                Bias::Bullish,
                "Inverted hammer after decline: possible bottom",
            )
        } else {
            CandlestickPattern::new(
                PatternKind::ShootingStar,
                Bias::Bearish,
                "Shooting star: long upper wick, sellers rejected higher prices",
            )
        });
    }

    None
}

fn engulfing(prev: &Candle, last: &Candle) -> Option<CandlestickPattern> {
    if last.body() <= prev.body() {
        return None;
    }
    if prev.is_bearish() && last.is_bullish() && last.open <= prev.close && last.close >= prev.open
    {
        return Some(CandlestickPattern::new(
            PatternKind::BullishEngulfing,
            Bias::Bullish,
            "Bullish engulfing: buyers overwhelmed the prior bearish candle",
        ));
    }
    if prev.is_bullish() && last.is_bearish() && last.open >= prev.close && last.close <= prev.open
    {
        return Some(CandlestickPattern::new(
            PatternKind::BearishEngulfing,
            Bias::Bearish,
            "Bearish engulfing: sellers overwhelmed the prior bullish candle",
        ));
    }
    None
}

fn star(first: &Candle, middle: &Candle, last: &Candle) -> Option<CandlestickPattern> {
    if first.body() <= 0.0 || middle.body() > first.body() * STAR_BODY_RATIO {
        return None;
    }
    let first_mid = (first.open + first.close) / 2.0;

    if first.is_bearish() && last.is_bullish() && last.close > first_mid {
        return Some(CandlestickPattern::new(
            PatternKind::MorningStar,
            Bias::Bullish,
            "Morning star: three-candle bullish reversal",
        ));
    }
    if first.is_bullish() && last.is_bearish() && last.close < first_mid {
        return Some(CandlestickPattern::new(
            PatternKind::EveningStar,
            Bias::Bearish,
            "Evening star: three-candle bearish reversal",
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(open: f64, high: f64, low: f64, close: f64) -> Candle {
        Candle::new(0, open, high, low, close, 1.0)
    }

    fn kinds(candles: &[Candle]) -> Vec<PatternKind> {
        detect(candles).into_iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_doji() {
        assert_eq!(kinds(&[c(100.0, 102.0, 98.0, 100.1)]), vec![PatternKind::Doji]);
    }

    #[test]
    fn test_hammer() {
        // body 1, lower wick 4, upper wick 0.2
        let found = detect(&[c(100.0, 101.2, 96.0, 101.0)]);
        assert_eq!(found[0].kind, PatternKind::Hammer);
        assert_eq!(found[0].bias, Bias::Bullish);
    }

    #[test]
    fn test_upper_wick_depends_on_prior_trend() {
        let wick = c(100.0, 104.0, 99.8, 101.0);
        let declining = [
            c(110.0, 110.0, 110.0, 110.0),
            c(108.0, 108.0, 108.0, 108.0),
            c(105.0, 105.0, 105.0, 105.0),
            wick,
        ];
        assert_eq!(detect(&declining)[0].kind, PatternKind::InvertedHammer);

        let rising = [
            c(90.0, 90.0, 90.0, 90.0),
            c(95.0, 95.0, 95.0, 95.0),
            c(99.0, 99.0, 99.0, 99.0),
            wick,
        ];
        assert_eq!(detect(&rising)[0].kind, PatternKind::ShootingStar);
    }

    #[test]
    fn test_engulfing() {
        let bull = [c(102.0, 102.5, 99.5, 100.0), c(99.5, 103.5, 99.0, 103.0)];
        assert!(kinds(&bull).contains(&PatternKind::BullishEngulfing));

        let bear = [c(100.0, 102.5, 99.5, 102.0), c(102.5, 103.0, 98.5, 99.0)];
        assert!(kinds(&bear).contains(&PatternKind::BearishEngulfing));
    }

    #[test]
    fn test_morning_and_evening_star() {
        let morning = [
            c(110.0, 110.5, 99.5, 100.0),
            c(99.0, 100.0, 98.0, 99.2),
            c(100.0, 108.5, 99.5, 108.0),
        ];
        assert!(kinds(&morning).contains(&PatternKind::MorningStar));

        let evening = [
            c(100.0, 110.5, 99.5, 110.0),
            c(111.0, 112.0, 110.0, 110.8),
            c(110.0, 110.5, 101.5, 102.0),
        ];
        assert!(kinds(&evening).contains(&PatternKind::EveningStar));
    }

    #[test]
    fn test_no_pattern_on_flat_or_empty() {
        assert!(detect(&[]).is_empty());
        assert!(detect(&[c(100.0, 100.0, 100.0, 100.0)]).is_empty());
    }
}
