//! Confluence runner
//!
//! One evaluation cycle: load candles for every configured symbol through the
//! fallback source chain, run the confluence engine with the higher-timeframe
//! and reference overlays, print each record as JSON and append it to the
//! signal journal. Each record is stamped with the instant it was produced.

use anyhow::Result;
use futures_util::future::join_all;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use confluence::config::AppConfig;
use confluence::lifecycle::{Clock, SystemClock};
use confluence::persistence::{SignalJournal, SignalRecord};
use confluence::source::{CandleSource, CsvCandleSource, FallbackSource};
use confluence::strategy::ConfluenceEngine;
use confluence::types::Candle;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_logging(config.logging.json);
    info!(config = %config, "Starting confluence runner");

    let engine = ConfluenceEngine::new(config.engine());
    let source = FallbackSource::new(
        config
            .run
            .candle_dirs
            .iter()
            .map(|dir| Box::new(CsvCandleSource::new(dir)) as Box<dyn CandleSource>)
            .collect(),
    );
    let journal = SignalJournal::new(&config.run.journal_dir)?;
    let clock = SystemClock;

    let reference = load_reference(&source, &config).await;

    let evaluations = config.run.symbols.iter().map(|symbol| {
        evaluate_symbol(&engine, &source, &config, symbol, reference.as_deref(), &clock)
    });
    let results = join_all(evaluations).await;

    let mut produced = 0usize;
    for (symbol, result) in config.run.symbols.iter().zip(results) {
        match result {
            Ok(Some(record)) => {
                println!("{}", serde_json::to_string_pretty(&record)?);
                journal.append(&record).await?;
                produced += 1;
            }
            Ok(None) => {}
            Err(e) => warn!(symbol = %symbol, error = %e, "Evaluation failed"),
        }
    }

    info!(
        symbols = config.run.symbols.len(),
        produced,
        journal = %journal.path().display(),
        "Cycle complete"
    );
    Ok(())
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn load_reference(source: &dyn CandleSource, config: &AppConfig) -> Option<Vec<Candle>> {
    let run = &config.run;
    if run.reference_symbol.is_empty() {
        return None;
    }
    match source
        .fetch(&run.reference_symbol, &run.interval, run.candle_limit)
        .await
    {
        Ok(candles) => candles,
        Err(e) => {
            warn!(symbol = %run.reference_symbol, error = %e, "Reference candles unavailable");
            None
        }
    }
}

async fn evaluate_symbol(
    engine: &ConfluenceEngine,
    source: &dyn CandleSource,
    config: &AppConfig,
    symbol: &str,
    reference: Option<&[Candle]>,
    clock: &dyn Clock,
) -> Result<Option<SignalRecord>> {
    let run = &config.run;
    let Some(candles) = source.fetch(symbol, &run.interval, run.candle_limit).await? else {
        warn!(symbol, interval = %run.interval, "No candles, skipping");
        return Ok(None);
    };

    let higher = if run.higher_interval.is_empty() {
        None
    } else {
        source
            .fetch(symbol, &run.higher_interval, run.candle_limit)
            .await?
    };
    // A symbol is not its own reference
    let reference = reference.filter(|_| symbol != run.reference_symbol);

    let Some(analysis) = engine.analyze(&candles, higher.as_deref(), reference) else {
        info!(symbol, candles = candles.len(), "No signal this cycle");
        return Ok(None);
    };

    info!(
        symbol,
        signal = %analysis.signal.signal_type,
        strength = %analysis.signal.strength,
        confidence = analysis.signal.confidence,
        adjusted = analysis.adjusted_confidence,
        conflict = analysis.signal.has_conflict,
        "Signal evaluated"
    );

    Ok(Some(SignalRecord::from_analysis(symbol, analysis, clock, config)))
}
