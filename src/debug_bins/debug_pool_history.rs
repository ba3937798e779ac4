use chrono::Utc;
use clap::Parser;
use pool_history::apis::YieldsClient;
use pool_history::config::{load_config_from_path, CONFIG_FILE_PATH};
use pool_history::history::{calculate_metrics, MIN_DATA_POINTS};
use std::error::Error;

#[derive(Parser)]
#[command(name = "debug_pool_history")]
#[command(about = "Debug tool for the pool chart endpoint", long_about = None)]
struct Args {
    /// Pool id to fetch
    pool_id: String,

    /// Config file providing the API base URL and timeout
    #[arg(long, default_value = CONFIG_FILE_PATH)]
    config: String,

    /// Print every data point
    #[arg(short, long)]
    verbose: bool,

    /// Number of most recent points to show without --verbose
    #[arg(short, long, default_value = "5")]
    limit: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config_from_path(&args.config)?;

    println!("Pool History Debug Tool\n");
    println!("{}", "=".repeat(80));

    let client = YieldsClient::new(&config.api)?;

    println!("\n[TEST] GET {}/chart/{}\n", client.base_url(), args.pool_id);
    println!("{}", "=".repeat(80));

    match client.fetch_pool_chart(&args.pool_id).await {
        Ok(points) => {
            println!("Fetched {} points", points.len());
            if let (Some(first), Some(last)) = (points.first(), points.last()) {
                println!(
                    "Range: {} .. {}",
                    first.timestamp.format("%Y-%m-%d"),
                    last.timestamp.format("%Y-%m-%d")
                );
            }

            let shown = if args.verbose {
                points.len()
            } else {
                args.limit.min(points.len())
            };
            println!("\n[LAST {} POINTS]", shown);
            for p in &points[points.len() - shown..] {
                println!(
                    "{}  tvl={:>16.2}  apy={:>8.3}  base={:>8}  reward={:>8}",
                    p.timestamp.format("%Y-%m-%d"),
                    p.tvl_usd,
                    p.apy,
                    p.apy_base.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string()),
                    p.apy_reward.map(|v| format!("{:.3}", v)).unwrap_or_else(|| "-".to_string()),
                );
            }

            println!("\n[METRICS]");
            match calculate_metrics(&points, Utc::now()) {
                Some(m) => {
                    println!("Base APY (90d):       {:.2}", m.base90);
                    println!("Volatility:           {:.2}", m.volatility);
                    println!("Organic:              {}%", m.organic_pct);
                    println!("TVL change (30d):     {:.1}%", m.tvl_change_30d);
                    println!("Risk-adjusted yield:  {:.2}", m.risk_adjusted_yield);
                    println!("Data points:          {}", m.data_points);
                    println!("Oldest date:          {}", m.oldest_date);
                }
                None => println!(
                    "Not enough history (need at least {} points in the last 90 days)",
                    MIN_DATA_POINTS
                ),
            }
        }
        Err(e) => {
            println!("Failed to fetch chart: {}", e);
        }
    }

    println!("\n{}", "=".repeat(80));
    let stats = client.get_stats().await;
    println!("\n[API STATS]");
    println!("Total Requests: {}", stats.total_requests);
    println!("Successful: {}", stats.successful_requests);
    println!("Failed: {}", stats.failed_requests);
    println!("Network Errors: {}", stats.network_errors);
    println!("Avg Response Time: {:.2}ms", stats.average_response_time_ms);

    println!("\n{}", "=".repeat(80));
    println!("\nTest completed!");

    Ok(())
}
