//! pgpulsed - PostgreSQL metrics collector daemon.
//!
//! Collects a flat metric snapshot from one PostgreSQL server on every tick
//! and writes it to stdout as one JSON line. Logs go to stderr.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;
#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::collections::BTreeMap;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use pgpulse_core::collector::{BoundSeries, Collector, PgExecutor, SeriesPublisher};
use pgpulse_core::rates::RateTracker;
use pgpulse_core::{CollectorConfig, Snapshot};

/// PostgreSQL metrics collector daemon.
#[derive(Parser, Debug)]
#[command(name = "pgpulsed", about = "PostgreSQL metrics collector daemon", version)]
struct Args {
    /// Collection interval in seconds.
    #[arg(short, long, default_value = "10")]
    interval: u64,

    /// Connection string (libpq key=value or URL).
    /// Falls back to PGHOST/PGPORT/PGUSER/PGPASSWORD/PGDATABASE when unset.
    #[arg(long, env = "PGPULSE_DSN")]
    dsn: Option<String>,

    /// Per-query timeout in seconds.
    #[arg(long, default_value = "2")]
    timeout: u64,

    /// Interval in seconds between max_connections re-reads.
    #[arg(long, default_value = "1800")]
    recheck_settings: u64,

    /// Interval in seconds between database list refreshes.
    #[arg(long, default_value = "60")]
    relist_databases: u64,

    /// Include per-second rates of counters in the output.
    #[arg(long)]
    rates: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn collector_config(&self) -> CollectorConfig {
        CollectorConfig::default()
            .with_timeout(Duration::from_secs(self.timeout))
            .with_recheck_settings_every(Duration::from_secs(self.recheck_settings))
            .with_relist_databases_every(Duration::from_secs(self.relist_databases))
    }
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["pgpulsed", "pgpulse_core"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Publisher that reports surface changes to the log.
#[derive(Debug, Default)]
struct LogPublisher {
    declared: usize,
}

impl SeriesPublisher for LogPublisher {
    fn declare_series(&mut self, series: &BoundSeries) {
        self.declared += 1;
        debug!(
            series = series.id(),
            dims = ?series.dim_names().collect::<Vec<_>>(),
            "series declared"
        );
    }

    fn retract_series(&mut self, entity: &str) {
        info!(database = entity, "series retracted");
    }
}

/// One output line.
#[derive(Serialize)]
struct CycleRecord<'a> {
    timestamp: i64,
    metrics: &'a Snapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    rates: Option<&'a BTreeMap<String, f64>>,
}

fn render_record(
    timestamp: i64,
    metrics: &Snapshot,
    rates: Option<&BTreeMap<String, f64>>,
) -> serde_json::Result<String> {
    serde_json::to_string(&CycleRecord {
        timestamp,
        metrics,
        rates,
    })
}

/// Prints a colored PostgreSQL warning with configuration hints.
fn print_pg_warning(error: &str) {
    const RED: &str = "\x1b[1;31m";
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    eprintln!("{RED}PostgreSQL: {error}{RESET}");
    eprintln!();
    eprintln!("{YELLOW}  Configure connection with --dsn, PGPULSE_DSN or environment variables:");
    eprintln!("    export PGHOST=localhost");
    eprintln!("    export PGPORT=5432");
    eprintln!("    export PGUSER=postgres");
    eprintln!("    export PGPASSWORD=secret");
    eprintln!("    export PGDATABASE=postgres{RESET}");
}

fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("pgpulsed {} starting", env!("CARGO_PKG_VERSION"));

    let executor = match &args.dsn {
        Some(dsn) => PgExecutor::new(dsn.as_str()),
        None => match PgExecutor::from_env() {
            Ok(executor) => executor,
            Err(e) => {
                print_pg_warning(&e.to_string());
                return ExitCode::FAILURE;
            }
        },
    };
    let config = args.collector_config();
    info!(
        "Config: interval={}s, target={}, timeout={:?}, recheck_settings={:?}, relist_databases={:?}",
        args.interval,
        executor.display_target(),
        config.timeout,
        config.recheck_settings_every,
        config.relist_databases_every
    );

    let mut collector = match Collector::new(executor, LogPublisher::default(), config) {
        Ok(collector) => collector,
        Err(e) => {
            error!("Failed to create collector: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Metric surface: {} server series declared",
        collector.surface().publisher().declared
    );

    let interval = Duration::from_secs(args.interval.max(1));

    // Setup graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let mut rates = RateTracker::default();
    let mut cycle_count: u64 = 0;

    info!("Starting collection loop");

    while running.load(Ordering::SeqCst) {
        let now = Instant::now();

        match collector.collect_at(now) {
            Ok(snapshot) => {
                cycle_count += 1;

                let cycle_rates = args.rates.then(|| {
                    let incremental = collector.surface().incremental_names();
                    rates.update(now, &snapshot, |name| incremental.contains(name))
                });

                match render_record(Utc::now().timestamp(), &snapshot, cycle_rates.as_ref()) {
                    Ok(line) => {
                        let mut out = std::io::stdout().lock();
                        if let Err(e) = writeln!(out, "{}", line).and_then(|_| out.flush()) {
                            error!("Failed to write snapshot: {}", e);
                        }
                    }
                    Err(e) => error!("Failed to serialize snapshot: {}", e),
                }

                let removed = collector.surface_mut().sweep_retired();
                if !removed.is_empty() {
                    debug!("Removed {} retired series", removed.len());
                }

                debug!(
                    "Cycle #{}: {} metrics, {} databases",
                    cycle_count,
                    snapshot.len(),
                    collector.registry().len()
                );
            }
            Err(e) => {
                error!("Failed to collect snapshot: {}", e);
                // A gap in the series invalidates the previous sample.
                rates.reset();
            }
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval.saturating_sub(now.elapsed());
        while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down...");
    collector.close();
    info!("Shutdown complete");

    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_defaults() {
        let args = Args::try_parse_from(["pgpulsed"]).unwrap();
        let config = args.collector_config();

        assert_eq!(args.interval, 10);
        assert!(!args.rates);
        assert_eq!(config, CollectorConfig::default());
    }

    #[test]
    fn args_override_intervals() {
        let args = Args::try_parse_from([
            "pgpulsed",
            "--timeout",
            "5",
            "--relist-databases",
            "120",
            "--rates",
            "-vv",
        ])
        .unwrap();
        let config = args.collector_config();

        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.relist_databases_every, Duration::from_secs(120));
        assert!(args.rates);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn record_omits_rates_when_disabled() {
        let snapshot: Snapshot = [("server_connections_used".to_string(), 3)]
            .into_iter()
            .collect();

        let line = render_record(1700000000, &snapshot, None).unwrap();
        assert_eq!(
            line,
            r#"{"timestamp":1700000000,"metrics":{"server_connections_used":3}}"#
        );
    }

    #[test]
    fn record_includes_rates() {
        let snapshot: Snapshot = [("checkpoints_timed".to_string(), 10)]
            .into_iter()
            .collect();
        let rates: BTreeMap<String, f64> = [("checkpoints_timed".to_string(), 0.5)]
            .into_iter()
            .collect();

        let line = render_record(1, &snapshot, Some(&rates)).unwrap();
        assert!(line.ends_with(r#""rates":{"checkpoints_timed":0.5}}"#));
    }

    #[test]
    fn log_publisher_counts_declarations() {
        use pgpulse_core::collector::MockExecutor;

        let collector = Collector::new(
            MockExecutor::new(),
            LogPublisher::default(),
            CollectorConfig::default(),
        )
        .unwrap();
        assert_eq!(collector.surface().publisher().declared, 8);
    }
}
