//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::{MarketDataConfig, Provider};
use crate::domain::config_validation::{
    build_engine_config, build_market_data_config, build_web_config,
};
use crate::domain::engine::{Engine, EngineState};
use crate::domain::error::BandtraderError;
use crate::domain::interval::Interval;
use crate::domain::position::Trade;
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data_port::MarketDataPort;

/// Trades listed after a `run`.
const REPORT_TRADES: usize = 10;

#[derive(Parser, Debug)]
#[command(name = "bandtrader", about = "Bollinger band breakout signal engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run evaluation cycles and print the results
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Candle interval, overriding [engine] interval
        #[arg(short, long)]
        interval: Option<String>,
        #[arg(long, default_value_t = 1)]
        cycles: u32,
        /// Seconds to wait between cycles
        #[arg(long, default_value_t = 0)]
        pause_secs: u64,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Start the HTTP API
    Serve {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run {
            config,
            interval,
            cycles,
            pause_secs,
            json,
        } => run_cycles(
            &config,
            interval.as_deref(),
            cycles,
            Duration::from_secs(pause_secs),
            json,
        ),
        Command::Validate { config } => run_validate(&config),
        Command::Serve { config } => run_serve(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: BandtraderError) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(&err)
}

/// Construct the market data adapter selected by `[market_data] provider`.
pub fn build_market_data(
    config: &MarketDataConfig,
) -> Result<Arc<dyn MarketDataPort>, BandtraderError> {
    match config.provider {
        Provider::Csv => Ok(Arc::new(CsvAdapter::new(config.csv_dir.clone()))),
        #[cfg(feature = "binance")]
        Provider::Binance => {
            let adapter = crate::adapters::binance_adapter::BinanceAdapter::new(config)?;
            Ok(Arc::new(adapter))
        }
        #[cfg(not(feature = "binance"))]
        Provider::Binance => Err(BandtraderError::ConfigInvalid {
            section: "market_data".to_string(),
            key: "provider".to_string(),
            reason: "binance support requires the binance feature".to_string(),
        }),
    }
}

/// Validate every section and build an engine wired to its market data source.
pub fn build_engine(config: &dyn ConfigPort) -> Result<Engine, BandtraderError> {
    let engine_config = build_engine_config(config)?;
    let market_data = build_market_data(&build_market_data_config(config)?)?;
    Engine::new(engine_config, market_data)
}

fn run_cycles(
    config_path: &PathBuf,
    interval: Option<&str>,
    cycles: u32,
    pause: Duration,
    json: bool,
) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let engine = match build_engine(&config) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };

    let interval = match interval {
        Some(s) => match s.parse::<Interval>() {
            Ok(iv) => iv,
            Err(e) => return fail(e),
        },
        None => engine.config().interval,
    };

    let mut state = engine.state();
    for n in 0..cycles.max(1) {
        if n > 0 && !pause.is_zero() {
            std::thread::sleep(pause);
        }
        state = engine.run_cycle(interval);
    }

    let trades = engine.recent_trades(REPORT_TRADES);
    if json {
        let report = serde_json::json!({
            "state": state.as_ref(),
            "recent_trades": trades,
        });
        match serde_json::to_string_pretty(&report) {
            Ok(s) => println!("{s}"),
            Err(e) => {
                eprintln!("error: failed to serialize report: {e}");
                return ExitCode::from(1);
            }
        }
    } else {
        print_report(&state, &trades);
    }

    ExitCode::SUCCESS
}

fn print_report(state: &EngineState, trades: &[Trade]) {
    println!(
        "Cycle {} on {} interval ({} assets)",
        state.cycle,
        state.interval,
        state.snapshots.len()
    );
    println!(
        "{:<8} {:>16} {:>8} {:>7} {:>12} {:<8} REASON",
        "ASSET", "PRICE", "CHANGE", "RSI", "ATR", "SIGNAL"
    );
    for snap in state.snapshots.values() {
        println!(
            "{:<8} {:>16.4} {:>7.2}% {:>7.2} {:>12.4} {:<8} {}",
            snap.asset,
            snap.price,
            snap.percent_change,
            snap.rsi,
            snap.atr,
            snap.signal,
            snap.reason
        );
        if let Some(pos) = &snap.position {
            println!(
                "         {} from {:.4} | P&L {:+.2}% | {} stop {:.4}",
                pos.direction, pos.entry_price, pos.pnl, pos.stop_type, pos.current_stop
            );
        }
    }

    if !trades.is_empty() {
        println!("\nRecent trades:");
        for t in trades {
            println!(
                "  {} {} {:.4} -> {:.4} {:+.2}% ({})",
                t.asset, t.direction, t.entry_price, t.exit_price, t.net_pnl_percent, t.exit_reason
            );
        }
    }

    let perf = &state.performance;
    println!("\nPerformance:");
    println!("  Trades:        {}", perf.total_trades);
    println!("  Win rate:      {:.2}%", perf.win_rate);
    println!("  Total P&L:     {:+.2}%", perf.total_pnl);
    println!("  Avg win/loss:  {:+.2}% / {:+.2}%", perf.avg_win, perf.avg_loss);
    println!("  Profit factor: {:.2}", perf.profit_factor);
    println!("  Sharpe:        {:.2}", perf.sharpe_ratio);
    println!("  Max drawdown:  {:.2}%", perf.max_drawdown);
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let engine = match build_engine_config(&config) {
        Ok(e) => e,
        Err(e) => return fail(e),
    };
    let market_data = match build_market_data_config(&config) {
        Ok(m) => m,
        Err(e) => return fail(e),
    };
    if let Err(e) = build_web_config(&config) {
        return fail(e);
    }

    eprintln!("  Assets:    {}", engine.assets.join(", "));
    eprintln!("  Interval:  {}", engine.interval);
    eprintln!(
        "  Bands:     {} bars x {:.2}",
        engine.indicators.band_length,
        engine.indicators.band_width_x100 as f64 / 100.0
    );
    eprintln!("  Fee rate:  {}", engine.fee_rate);
    eprintln!("  Provider:  {:?}", market_data.provider);
    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}

fn run_serve(config_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "web")]
    {
        let config = match load_config(config_path) {
            Ok(c) => c,
            Err(code) => return code,
        };
        let web = match build_web_config(&config) {
            Ok(w) => w,
            Err(e) => return fail(e),
        };
        let engine = match build_engine(&config) {
            Ok(e) => Arc::new(e),
            Err(e) => return fail(e),
        };

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => return fail(e.into()),
        };
        let refresh = Duration::from_secs(web.refresh_secs);
        match runtime.block_on(crate::adapters::web::serve(engine, &web.listen, refresh)) {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => fail(e),
        }
    }

    #[cfg(not(feature = "web"))]
    {
        let _ = config_path;
        eprintln!("error: web feature is required for serve");
        ExitCode::from(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_provider_builds_without_network() {
        let config = MarketDataConfig::default();
        assert!(build_market_data(&config).is_ok());
    }

    #[cfg(not(feature = "binance"))]
    #[test]
    fn binance_provider_needs_feature() {
        let config = MarketDataConfig {
            provider: Provider::Binance,
            ..MarketDataConfig::default()
        };
        let err = build_market_data(&config).err().unwrap();
        assert!(matches!(err, BandtraderError::ConfigInvalid { key, .. } if key == "provider"));
    }

    #[test]
    fn build_engine_applies_engine_section() {
        let config =
            FileConfigAdapter::from_string("[engine]\nassets = BTCUSDT\nworkers = 2\n").unwrap();
        let engine = build_engine(&config).unwrap();
        assert_eq!(engine.config().assets, vec!["BTCUSDT"]);
        assert_eq!(engine.config().workers, 2);
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::parse_from([
            "bandtrader", "run", "--config", "a.ini", "--interval", "4h", "--cycles", "3", "--json",
        ]);
        match cli.command {
            Command::Run {
                interval,
                cycles,
                json,
                pause_secs,
                ..
            } => {
                assert_eq!(interval.as_deref(), Some("4h"));
                assert_eq!(cycles, 3);
                assert_eq!(pause_secs, 0);
                assert!(json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
