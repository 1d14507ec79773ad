//! # region-probe
//!
//! Connects to a Chrome page over CDP, loads a URL and dumps one data region
//! as JSON.
//!
//! ```text
//! region-probe <url> <region>
//! ```
//!
//! ## Environment
//! - `REGION_CDP_ENDPOINT`: page WebSocket endpoint (default: ws://localhost:9222)
//! - `REGION_*`: timeouts, see `Config::from_env`
//! - `REGION_LOG_LEVEL`: log level (default: info)
//! - `RUST_LOG`: log level, takes precedence over `REGION_LOG_LEVEL`

use anyhow::{bail, Context};
use region_oxide::{config::Config, BrowserSession};
use serde_json::json;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;

    // Initialize tracing - RUST_LOG first, then the configured level
    let log_level = match std::env::var("RUST_LOG").ok().and_then(|v| v.parse::<Level>().ok()) {
        Some(level) => level,
        None => config.tracing_level()?,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (url, region) = match args.as_slice() {
        [url, region] => (url.as_str(), region.as_str()),
        _ => bail!("usage: region-probe <url> <region>"),
    };

    info!("region-probe v{}", region_oxide::VERSION);
    info!("Connecting to {}", config.cdp_endpoint);

    let session = BrowserSession::connect(config)
        .await
        .context("connecting to the browser")?;
    session
        .navigate(url)
        .await
        .with_context(|| format!("navigating to {}", url))?;

    let mut table = session.open_table(region)?;
    let columns = table.columns().await?;
    let rows = table.rows_as_maps().await?;
    let paging = table.paging_counts().await?;
    let row_count = rows.len();
    let name = table.region_name().await?;

    let dump = json!({
        "region": name,
        "columns": columns,
        "rows": rows,
        "paging": paging,
    });
    println!("{}", serde_json::to_string_pretty(&dump)?);

    info!("Dumped {} rows from '{}'", row_count, region);
    Ok(())
}
