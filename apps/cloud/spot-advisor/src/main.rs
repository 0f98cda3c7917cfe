//! Spot Advisor
//!
//! Compares spot and on-demand EC2 costs across instance types and regions.
//! Runs a one-shot analysis from the command line, serves the HTTP API, or
//! downloads the on-demand pricing snapshot the API answers from.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::Environment;
use domain_spot::handlers::SpotState;
use domain_spot::{
    regions, AnalysisOrchestrator, AnalysisRequest, AnalysisSession, CachedSpotDataSource,
    HttpPricingSource, HttpSpotDataSource, PricingCache, PricingCatalog, PricingConfig,
    PricingSource, QuantityRegistry, SpotDatasetCache,
};
use eyre::{bail, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

mod args;
mod collector;
mod config;
mod report;
mod server;

use args::QuantityArg;
use collector::{write_snapshot, SnapshotCollector};
use config::Config;

#[derive(Parser)]
#[command(name = "spot-advisor")]
#[command(about = "Compare spot and on-demand EC2 costs across instance types and regions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a selection of instance types and regions
    Analyze {
        /// Instance types, e.g. m5.large,c5.xlarge
        #[arg(short, long, value_delimiter = ',', required = true)]
        instances: Vec<String>,

        /// Region codes, e.g. us-east-1,eu-west-1
        #[arg(short, long, value_delimiter = ',', required = true)]
        regions: Vec<String>,

        /// Instance count for one cell, TYPE:REGION:OS=N. Repeatable; unset cells count as 1.
        #[arg(short, long = "quantity")]
        quantities: Vec<QuantityArg>,

        /// Skip Windows pricing
        #[arg(long)]
        linux_only: bool,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,

        /// Query the pricing endpoint at PRICING_API_URL instead of the local snapshot
        #[arg(long)]
        pricing_api: bool,
    },

    /// Serve the HTTP API
    Serve,

    /// Download the on-demand pricing snapshot
    DownloadPricing {
        /// Output file. Defaults to PRICING_SNAPSHOT_PATH.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Region codes to download. Defaults to every known region.
        #[arg(short, long, value_delimiter = ',')]
        regions: Option<Vec<String>>,
    },

    /// List regions present in the spot dataset
    Regions,

    /// List instance types present in the spot dataset
    InstanceTypes,
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();
    let config = Config::from_env()?;
    observability::init_metrics()?;

    match cli.command {
        Commands::Analyze {
            instances,
            regions,
            quantities,
            linux_only,
            json,
            pricing_api,
        } => {
            let catalog = if pricing_api {
                None
            } else {
                load_catalog(&config).await
            };
            let orchestrator = build_orchestrator(&config, catalog)?;

            for arg in &quantities {
                orchestrator.quantities().set(
                    &arg.cell.instance_type,
                    &arg.cell.region,
                    arg.cell.os,
                    arg.quantity,
                );
            }

            let request = AnalysisRequest {
                instance_types: instances,
                regions,
                pricing: PricingConfig {
                    include_windows: !linux_only,
                },
            };
            let outcome = orchestrator.run(&request).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print!("{}", report::Report(&outcome));
            }
        }

        Commands::Serve => {
            let catalog = load_catalog(&config).await;
            let orchestrator = build_orchestrator(&config, catalog.clone())?;
            let session = Arc::new(AnalysisSession::new(orchestrator));
            let router = server::router(SpotState::new(session, catalog));

            server::serve(router, &config.server).await?;
        }

        Commands::DownloadPricing {
            output,
            regions: region_codes,
        } => {
            let selected = match region_codes {
                Some(codes) => codes
                    .iter()
                    .map(|code| {
                        regions::find(code)
                            .copied()
                            .ok_or_else(|| eyre::eyre!("Unknown region code: {code}"))
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => regions::all().to_vec(),
            };
            let output = output.unwrap_or_else(|| config.pricing_snapshot_path.clone());

            info!(regions = selected.len(), "Starting pricing snapshot download");
            let collector = SnapshotCollector::new(config.sources.http_timeout)?;
            let result = collector.collect(&selected).await;

            if result.documents_fetched == 0 {
                bail!("No pricing documents could be downloaded; keeping the existing snapshot");
            }
            write_snapshot(&output, &result.snapshot).await?;

            info!(
                "Download complete: {} documents fetched, {} failed",
                result.documents_fetched,
                result.failed.len()
            );
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Regions => {
            let dataset = dataset_cache(&config)?.load().await?;
            for code in dataset.known_regions() {
                let name = regions::display_name(&code).unwrap_or_default();
                println!("{code:<16} {name}");
            }
        }

        Commands::InstanceTypes => {
            let dataset = dataset_cache(&config)?.load().await?;
            for instance_type in dataset.instance_types() {
                if let Some(specs) = dataset.instance_specs.get(&instance_type) {
                    println!(
                        "{instance_type:<20} {:>4} vCPU {:>8} GiB{}",
                        specs.cores,
                        specs.ram_gb,
                        if specs.emr_compatible { "  EMR" } else { "" }
                    );
                }
            }
        }
    }

    Ok(())
}

/// Bulk dataset over HTTP behind the local file cache
fn dataset_cache(config: &Config) -> Result<SpotDatasetCache> {
    let remote = HttpSpotDataSource::from_config(&config.sources)?;
    let source = CachedSpotDataSource::new(remote, config.spot_data_cache_path.clone());
    Ok(SpotDatasetCache::new(
        Arc::new(source),
        config.sources.retry.clone(),
    ))
}

/// Analyses price from the snapshot when one is loaded, else from the pricing endpoint
fn build_orchestrator(
    config: &Config,
    catalog: Option<Arc<PricingCatalog>>,
) -> Result<AnalysisOrchestrator> {
    let pricing: Arc<dyn PricingSource> = match catalog {
        Some(catalog) => catalog as Arc<dyn PricingSource>,
        None => {
            info!(url = %config.sources.pricing_api_url, "Using remote pricing endpoint");
            Arc::new(HttpPricingSource::from_config(&config.sources)?)
        }
    };

    Ok(AnalysisOrchestrator::new(
        dataset_cache(config)?,
        PricingCache::new(pricing),
        Arc::new(QuantityRegistry::new()),
    ))
}

async fn load_catalog(config: &Config) -> Option<Arc<PricingCatalog>> {
    match PricingCatalog::load(&config.pricing_snapshot_path).await {
        Ok(catalog) => Some(Arc::new(catalog)),
        Err(e) => {
            warn!(
                path = %config.pricing_snapshot_path.display(),
                error = %e,
                "Pricing snapshot not available, run `spot-advisor download-pricing`"
            );
            None
        }
    }
}
