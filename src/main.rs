use anyhow::{Context, Result};
use clap::Parser;
use sdwatch_browse::{MdnsBrowse, TypeAggregator};
use sdwatch_core::{BrowseConfig, Notification, SummaryChange};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// sdwatch - live DNS-SD registration type browser
///
/// Enumerates the registration types advertised on the local network and
/// keeps a live count of service instances per type.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Domain to browse
    #[arg(short, long, default_value = "local.")]
    domain: String,

    /// Stop after this many seconds instead of running until interrupted
    #[arg(long)]
    duration: Option<u64>,

    /// Emit each summary snapshot as a JSON array instead of a table
    #[arg(long)]
    json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = BrowseConfig {
        browse_domain: args.domain.clone(),
        ..Default::default()
    };

    let backend = Arc::new(MdnsBrowse::new().context("failed to start mDNS backend")?);
    let aggregator =
        TypeAggregator::new(config, backend).context("failed to create aggregator")?;
    let notifications = aggregator.notifications();

    aggregator.start().context("failed to start discovery")?;
    info!(domain = %args.domain, "browsing for registration types, ctrl-c to stop");

    let deadline = args.duration.map(Duration::from_secs);
    let timeout = async {
        match deadline {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(timeout);

    loop {
        tokio::select! {
            notification = notifications.recv() => match notification {
                Ok(Notification::SummaryChanged(change)) => render(&change, args.json)?,
                Ok(Notification::Error(err)) if err.is_fatal() => {
                    error!(error = %err, "discovery failed");
                    break;
                }
                Ok(Notification::Error(err)) => {
                    warn!(warning = %err, "discovery warning");
                }
                Err(_) => break,
            },
            _ = signal::ctrl_c() => {
                info!("interrupted");
                break;
            }
            _ = &mut timeout => {
                info!("duration elapsed");
                break;
            }
        }
    }

    aggregator.stop().await;
    Ok(())
}

/// Prints the visible summary set, sorted by registration type name.
/// Sorting is purely presentational; the aggregator does not order its
/// snapshots.
fn render(change: &SummaryChange, json: bool) -> Result<()> {
    let mut rows = change.summaries.clone();
    rows.sort_by(|a, b| a.service_name.cmp(&b.service_name));

    if json {
        println!("{}", serde_json::to_string(&rows)?);
        return Ok(());
    }

    if rows.is_empty() {
        if change.previous_visible > 0 {
            println!("(no services visible)");
        }
        return Ok(());
    }

    println!("--- {} registration type(s) ---", rows.len());
    for summary in &rows {
        // `_http` + `_tcp.local.` renders as `_http._tcp.`
        let type_label = match summary.reg_type.split('.').next() {
            Some(suffix) if !suffix.is_empty() => {
                format!("{}.{}.", summary.service_name, suffix)
            }
            _ => summary.service_name.clone(),
        };
        println!("{type_label:<32} {:>4} service(s)", summary.service_count);
    }
    Ok(())
}
