#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the district statistics collector.

use clap::{Args, Parser, Subcommand};
use district_stats_cli_utils::{CallBar, init_logger};
use district_stats_collect::Collector;
use district_stats_collect_models::{
    BusinessPopulationRequest, CollectOptions, CollectionProgress, CollectionRequest,
    CollectionStatus, DEFAULT_DELAY_MS, DEFAULT_RETRY_COUNT, IncomeConsumptionRequest,
    SalesRequest,
};
use district_stats_database::AnalysisStore;
use district_stats_database::analysis_db::DuckDbStore;
use district_stats_database::memory::MemoryStore;
use district_stats_geography::GeoRegistry;
use district_stats_source::http::HttpStatsSource;

#[derive(Parser)]
#[command(
    name = "district_stats_collect",
    about = "Collects public statistics per administrative district"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Copy)]
struct RunArgs {
    /// Extra attempts for each failed API call
    #[arg(long, default_value_t = DEFAULT_RETRY_COUNT)]
    retry_count: u32,
    /// Milliseconds to wait after every API call
    #[arg(long, default_value_t = DEFAULT_DELAY_MS)]
    delay_ms: u64,
    /// Use an in-memory store instead of the `DuckDB` file
    #[arg(long)]
    memory: bool,
    /// Print the final progress as JSON
    #[arg(long)]
    json: bool,
}

impl RunArgs {
    const fn options(self) -> CollectOptions {
        CollectOptions {
            retry_count: self.retry_count,
            delay_ms: self.delay_ms,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Collect sales per category for the given cities (creates records)
    Sales {
        /// Comma-separated city ids or aliases (default: every city)
        #[arg(long, env = "DISTRICT_STATS_CITIES")]
        cities: Option<String>,
        /// Store raw amounts without category multipliers
        #[arg(long)]
        no_multiplier: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Collect income and consumption for the given cities
    IncomeConsumption {
        /// Comma-separated city ids or aliases (default: every city)
        #[arg(long, env = "DISTRICT_STATS_CITIES")]
        cities: Option<String>,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Collect business counts and population for the given area codes
    BusinessPopulation {
        /// Comma-separated area codes (default: every area code)
        #[arg(long, env = "DISTRICT_STATS_AREA_CODES")]
        area_codes: Option<String>,
        /// Skip per-category business counts and floating population
        #[arg(long)]
        skip_business_count: bool,
        /// Skip household, resident and worker population
        #[arg(long)]
        skip_population: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run every stage for every city and area code
    All {
        #[command(flatten)]
        run: RunArgs,
    },
    /// Run a chosen subset of stages
    Run {
        /// Comma-separated city ids or aliases (default: every city)
        #[arg(long, env = "DISTRICT_STATS_CITIES")]
        cities: Option<String>,
        /// Comma-separated area codes (default: every area code)
        #[arg(long, env = "DISTRICT_STATS_AREA_CODES")]
        area_codes: Option<String>,
        #[arg(long)]
        skip_sales: bool,
        #[arg(long)]
        skip_income_consumption: bool,
        #[arg(long)]
        skip_business_count: bool,
        #[arg(long)]
        skip_population: bool,
        /// Store raw amounts without category multipliers
        #[arg(long)]
        no_multiplier: bool,
        #[command(flatten)]
        run: RunArgs,
    },
    /// List configured cities with their box counts
    Cities,
    /// List configured area codes
    AreaCodes,
    /// List food categories with codes and multipliers
    Categories,
}

/// Splits a comma-separated filter, falling back to `all` when absent.
fn split_list(value: Option<String>, all: impl FnOnce() -> Vec<String>) -> Vec<String> {
    value.map_or_else(all, |v| {
        v.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    })
}

fn open_store(memory: bool) -> Result<Box<dyn AnalysisStore>, Box<dyn std::error::Error>> {
    if memory {
        log::info!("Using in-memory store");
        Ok(Box::new(MemoryStore::new()))
    } else {
        Ok(Box::new(DuckDbStore::open_default()?))
    }
}

fn print_summary(progress: &CollectionProgress) {
    println!();
    println!("{:<20} {}", "Status", progress.status);
    println!(
        "{:<20} {}/{} ok, {} failed",
        "API calls",
        progress.success_api_calls,
        progress.total_api_calls,
        progress.failure_api_calls
    );
    println!(
        "{:<20} {}/{} ok, {} failed",
        "Records", progress.success_records, progress.total_records, progress.failure_records
    );
    println!(
        "{:<20} {:.1}s",
        "Elapsed",
        progress.elapsed().to_std().unwrap_or_default().as_secs_f64()
    );

    if !progress.stages.is_empty() {
        println!();
        println!("{:<24} {:<16} {:>10} {:>10}", "STAGE", "STATUS", "CALLS OK", "RECORDS");
        println!("{}", "-".repeat(63));
        for stage in &progress.stages {
            println!(
                "{:<24} {:<16} {:>10} {:>10}",
                stage.stage.label(),
                stage.status.to_string(),
                stage.success_api_calls,
                stage.success_records
            );
        }
    }

    if !progress.warnings.is_empty() {
        println!();
        println!("Warnings ({}):", progress.warnings.len());
        for warning in &progress.warnings {
            println!("  - {warning}");
        }
    }
    if !progress.error_messages.is_empty() {
        println!();
        println!("Errors ({}):", progress.error_messages.len());
        for error in &progress.error_messages {
            println!("  - {error}");
        }
    }
}

fn report(progress: &CollectionProgress, json: bool) -> Result<(), Box<dyn std::error::Error>> {
    if json {
        println!("{}", serde_json::to_string_pretty(progress)?);
    } else {
        print_summary(progress);
    }
    if progress.status == CollectionStatus::Failed {
        return Err("collection failed".into());
    }
    Ok(())
}

#[allow(clippy::too_many_lines)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = init_logger();
    let cli = Cli::parse();
    let registry = GeoRegistry::embedded();

    let run = match cli.command {
        Commands::Cities => {
            println!("{:<12} {:<12} BOXES", "ID", "NAME");
            println!("{}", "-".repeat(32));
            for grid in registry.grids() {
                println!("{:<12} {:<12} {}", grid.id, grid.name, grid.boxes.len());
            }
            return Ok(());
        }
        Commands::AreaCodes => {
            println!("{:<8} NAME", "CODE");
            println!("{}", "-".repeat(32));
            for area in registry.area_code_entries() {
                println!("{:<8} {}", area.code, area.name);
            }
            return Ok(());
        }
        Commands::Categories => {
            println!(
                "{:<12} {:<16} {:<8} {:<8} MULTIPLIER",
                "ID", "NAME", "SALES", "BUSINESS"
            );
            println!("{}", "-".repeat(60));
            for category in registry.categories() {
                println!(
                    "{:<12} {:<16} {:<8} {:<8} {:.2}",
                    category.id,
                    category.name,
                    category.sales_code,
                    category.business_code,
                    category.multiplier
                );
            }
            return Ok(());
        }
        Commands::Sales { run, .. }
        | Commands::IncomeConsumption { run, .. }
        | Commands::BusinessPopulation { run, .. }
        | Commands::All { run }
        | Commands::Run { run, .. } => run,
    };

    let source = HttpStatsSource::from_env()?;
    let mut store = open_store(run.memory)?;
    let mut collector = Collector::new(&registry, &source, store.as_mut())
        .with_reporter(move |stage| CallBar::stage(&multi, stage.label()));

    let progress = match cli.command {
        Commands::Sales {
            cities,
            no_multiplier,
            run,
        } => {
            collector
                .collect_sales(&SalesRequest {
                    cities: split_list(cities, || registry.cities()),
                    apply_multiplier: !no_multiplier,
                    options: run.options(),
                })
                .await
        }
        Commands::IncomeConsumption { cities, run } => {
            collector
                .collect_income_consumption(&IncomeConsumptionRequest {
                    cities: split_list(cities, || registry.cities()),
                    options: run.options(),
                })
                .await
        }
        Commands::BusinessPopulation {
            area_codes,
            skip_business_count,
            skip_population,
            run,
        } => {
            collector
                .collect_business_population(&BusinessPopulationRequest {
                    area_codes: split_list(area_codes, || registry.area_codes()),
                    include_business_count: !skip_business_count,
                    include_population_data: !skip_population,
                    options: run.options(),
                })
                .await
        }
        Commands::All { run } => {
            collector
                .collect_integrated(&CollectionRequest {
                    cities: registry.cities(),
                    area_codes: registry.area_codes(),
                    retry_count: run.retry_count,
                    delay_ms: run.delay_ms,
                    ..CollectionRequest::default()
                })
                .await
        }
        Commands::Run {
            cities,
            area_codes,
            skip_sales,
            skip_income_consumption,
            skip_business_count,
            skip_population,
            no_multiplier,
            run,
        } => {
            collector
                .collect_integrated(&CollectionRequest {
                    cities: split_list(cities, || registry.cities()),
                    area_codes: split_list(area_codes, || registry.area_codes()),
                    include_sales: !skip_sales,
                    include_income_consumption: !skip_income_consumption,
                    include_business_count: !skip_business_count,
                    include_population_data: !skip_population,
                    apply_multiplier: !no_multiplier,
                    retry_count: run.retry_count,
                    delay_ms: run.delay_ms,
                })
                .await
        }
        Commands::Cities | Commands::AreaCodes | Commands::Categories => return Ok(()),
    };

    drop(collector);
    if run.memory {
        log::info!("In-memory store held {} record(s)", store.count()?);
    }
    report(&progress, run.json)
}
