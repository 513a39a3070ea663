//! Confluence Library
//!
//! Multi-indicator confluence signal engine for crypto candle series

pub mod config;
pub mod error;
pub mod features;
pub mod lifecycle;
pub mod persistence;
pub mod risk;
pub mod source;
pub mod strategy;
pub mod types;

pub use error::{validate_candles, CandleError};
pub use strategy::{ConfluenceEngine, MarketAnalysis, SignalResult};
pub use types::{Candle, SignalStrength, SignalType};
