//! Command-line flight search.
//!
//! Loads settings, boots the aggregator runtime, runs one search and
//! prints the JSON response, or the aggregate error when every provider
//! failed.
//!
//! ```text
//! flight_search --config providers.toml --from JFK --to LAX --date 2025-06-01 --sort price
//! ```

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use flight_aggregator::application::services::SearchOptions;
use flight_aggregator::application::{AggregatorRuntime, SearchError};
use flight_aggregator::domain::value_objects::{CabinClass, FlightSearchParams, Pagination, SortOption};
use flight_aggregator::infrastructure::config::AppSettings;
use flight_aggregator::infrastructure::logging::init_tracing;
use flight_aggregator::infrastructure::providers::AdapterFactory;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Search flights across all configured providers.
#[derive(Parser, Debug)]
#[command(name = "flight_search")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Origin IATA code
    #[arg(long)]
    from: String,

    /// Destination IATA code
    #[arg(long)]
    to: String,

    /// Departure date (YYYY-MM-DD)
    #[arg(long)]
    date: NaiveDate,

    /// Return date for a round trip (YYYY-MM-DD)
    #[arg(long)]
    return_date: Option<NaiveDate>,

    /// Adult passengers
    #[arg(long, default_value_t = 1)]
    adults: u8,

    /// Child passengers
    #[arg(long, default_value_t = 0)]
    children: u8,

    /// Cabin class: economy, premium_economy, business, first
    #[arg(long, default_value = "economy")]
    cabin: CabinClass,

    /// Sort order: price, price_desc, duration, departure, stops
    #[arg(long, default_value = "price")]
    sort: SortOption,

    /// Non-stop flights only
    #[arg(long)]
    direct: bool,

    /// Upper bound on distinct offers
    #[arg(long)]
    max_results: Option<usize>,

    /// Offers to skip
    #[arg(long, default_value_t = 0)]
    offset: usize,

    /// Page size
    #[arg(long)]
    limit: Option<usize>,
}

impl Cli {
    fn params(&self) -> Result<FlightSearchParams> {
        let mut builder = FlightSearchParams::builder(&self.from, &self.to, self.date)
            .adults(self.adults)
            .children(self.children)
            .cabin_class(self.cabin)
            .direct_only(self.direct);
        if let Some(date) = self.return_date {
            builder = builder.return_date(date);
        }
        if let Some(n) = self.max_results {
            builder = builder.max_results(n);
        }
        builder.build().context("invalid search parameters")
    }

    fn options(&self) -> SearchOptions {
        SearchOptions::sorted_by(self.sort).with_pagination(Pagination {
            offset: self.offset,
            limit: self.limit,
        })
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = AppSettings::load(cli.config.as_deref()).context("failed to load settings")?;
    init_tracing(&settings.logging)?;

    let params = cli.params()?;
    let runtime = AggregatorRuntime::from_settings(&settings, AdapterFactory::default()).await?;

    let cancel = CancellationToken::new();
    let search = runtime
        .orchestrator()
        .search_with_cancellation(params, cli.options(), &cancel);
    let outcome = tokio::select! {
        outcome = search => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            cancel.cancel();
            Err(SearchError::Cancelled)
        }
    };
    runtime.shutdown().await;

    match outcome {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(SearchError::AllProvidersFailed(aggregate)) => {
            println!("{}", serde_json::to_string_pretty(&aggregate)?);
            Ok(ExitCode::from(2))
        }
        Err(other) => Err(other.into()),
    }
}
