//! Candle validation errors
//!
//! The engine itself never fails: insufficient data is reported with `None`.
//! Malformed series are the caller's problem, and this is the check callers
//! run before handing a series over.

use thiserror::Error;

use crate::types::Candle;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandleError {
    #[error("candle series is empty")]
    Empty,

    #[error("candle {index} is not ascending: time {current} after {previous}")]
    NonAscending {
        index: usize,
        previous: i64,
        current: i64,
    },

    #[error("candle {index} has a non-finite {field}")]
    NonFinite { index: usize, field: &'static str },

    #[error("candle {index} has high below low")]
    InvalidRange { index: usize },
}

/// Reject series the engine must not be handed: empty, out of order,
/// non-finite prices or volumes, or inverted high/low.
pub fn validate_candles(candles: &[Candle]) -> Result<(), CandleError> {
    if candles.is_empty() {
        return Err(CandleError::Empty);
    }

    for (index, c) in candles.iter().enumerate() {
        for (field, value) in [
            ("open", c.open),
            ("high", c.high),
            ("low", c.low),
            ("close", c.close),
            ("volume", c.volume),
        ] {
            if !value.is_finite() {
                return Err(CandleError::NonFinite { index, field });
            }
        }
        if c.high < c.low {
            return Err(CandleError::InvalidRange { index });
        }
        if index > 0 {
            let previous = candles[index - 1].time;
            if c.time <= previous {
                return Err(CandleError::NonAscending {
                    index,
                    previous,
                    current: c.time,
                });
            }
        }
    }

    Ok(())
}
