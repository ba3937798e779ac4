use anyhow::{anyhow, Context, Result};
use clap::Parser;
use colored::Colorize;
use pool_history::{
    apis::YieldsClient,
    arguments::{Cli, Command},
    config::{load_config_from_path, Config},
    history::{BatchSummary, CancelToken, FetchStatus, HistoryService, PoolMetrics},
    logger::{self as logger, LogTag},
};

/// Entry point for the pool history CLI
///
/// Loads config, builds the service over SQLite and the yields API, then
/// runs exactly one subcommand.
#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init(cli.logger_config());

    for key in cli.unknown_debug_tags() {
        logger::warning(LogTag::System, &format!("Unknown debug tag '{}' ignored", key));
    }

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            logger::error(LogTag::System, &format!("{:#}", e));
            1
        }
    };

    logger::flush();
    std::process::exit(code);
}

async fn run(cli: Cli) -> Result<()> {
    let config: Config = load_config_from_path(&cli.config).map_err(|e| anyhow!(e))?;
    let (service, client) =
        HistoryService::from_config(&config).context("Failed to start history service")?;

    match cli.command {
        Command::Fetch { ids, force } => fetch(&service, &client, &ids, force).await,
        Command::Metrics { ids } => {
            print_metrics(&service, &ids);
            Ok(())
        }
        Command::Status { ids } => {
            print_status(&service, &ids);
            Ok(())
        }
        Command::Clear => {
            let generation = service.store().clear()?;
            println!("History store cleared (generation {})", generation);
            Ok(())
        }
    }
}

async fn fetch(
    service: &HistoryService,
    client: &YieldsClient,
    ids: &[String],
    force: bool,
) -> Result<()> {
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        println!("\n🛑 Received Ctrl+C, cancelling batch...");
        handler_token.cancel();
    })
    .context("Failed to install Ctrl+C handler")?;

    println!(
        "Fetching {} pools, {}ms between requests",
        ids.len(),
        service.batch().delay().as_millis()
    );

    let mut summary = BatchSummary::new(ids.len());
    let results = service
        .fetch_many(
            ids,
            |progress| {
                let status = match progress.status {
                    FetchStatus::Cached => progress.status.as_str().cyan(),
                    FetchStatus::Fetching => progress.status.as_str().green(),
                    FetchStatus::Error => progress.status.as_str().red(),
                };
                println!(
                    "[{}/{}] {} {}",
                    progress.current, progress.total, progress.id, status
                );
                summary.record(&progress);
            },
            force,
            &cancel,
        )
        .await;

    let points: usize = results.values().map(Vec::len).sum();
    println!();
    println!(
        "Fetched {} new, {} cached, {} failed ({} points)",
        summary.fetched, summary.cached, summary.failed, points
    );
    if !summary.failed_ids.is_empty() {
        println!("Failed: {}", summary.failed_ids.join(", "));
    }
    if summary.cancelled() {
        println!(
            "{}",
            format!(
                "Cancelled after {} of {} pools",
                summary.processed(),
                summary.total
            )
            .yellow()
        );
    }

    let stats = client.get_stats().await;
    logger::info(
        LogTag::Api,
        &format!(
            "API requests: {} total, {} ok, {} failed, {} network errors, avg {:.0}ms",
            stats.total_requests,
            stats.successful_requests,
            stats.failed_requests,
            stats.network_errors,
            stats.average_response_time_ms
        ),
    );

    Ok(())
}

fn print_metrics(service: &HistoryService, ids: &[String]) {
    let cache = service.metrics();
    let mut rows: Vec<(String, PoolMetrics)> = if ids.is_empty() {
        cache.get_all()
    } else {
        ids.iter()
            .filter_map(|id| match cache.get(id) {
                Some(metrics) => Some((id.clone(), metrics)),
                None => {
                    println!("{}: not enough history", id);
                    None
                }
            })
            .collect()
    };

    rows.sort_by(|a, b| b.1.risk_adjusted_yield.total_cmp(&a.1.risk_adjusted_yield));

    if rows.is_empty() {
        println!("No pools with enough history");
        return;
    }

    println!(
        "{:<40} {:>8} {:>8} {:>8} {:>9} {:>8} {:>6}  {}",
        "POOL", "BASE90", "VOL", "ORGANIC", "TVL 30D", "RAY", "DAYS", "SINCE"
    );
    for (id, m) in rows {
        println!(
            "{:<40} {:>8.2} {:>8.2} {:>7}% {:>8.1}% {:>8.2} {:>6}  {}",
            id,
            m.base90,
            m.volatility,
            m.organic_pct,
            m.tvl_change_30d,
            m.risk_adjusted_yield,
            m.data_points,
            m.oldest_date.format("%Y-%m-%d")
        );
    }
}

fn print_status(service: &HistoryService, ids: &[String]) {
    let store = service.store();
    let stats = store.stats();

    println!("Records:        {}", stats.records);
    println!("Stale records:  {}", stats.stale_records);
    println!("Data points:    {}", stats.total_points);
    println!("Stored bytes:   {}", stats.bytes);
    if let (Some(oldest), Some(newest)) = (stats.oldest_fetch, stats.newest_fetch) {
        println!("Oldest fetch:   {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
        println!("Newest fetch:   {}", newest.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!("Generation:     {}", store.generation());

    if !ids.is_empty() {
        let pending = store.missing_or_stale(ids);
        if pending.is_empty() {
            println!("All {} requested pools are fresh", ids.len());
        } else {
            println!("Missing or stale: {}", pending.join(", "));
        }
    }
}
