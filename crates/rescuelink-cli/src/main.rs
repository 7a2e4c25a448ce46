mod output;
mod wiring;

use clap::{Parser, Subcommand};
use rescuelink_core::{distance_label, haversine_km, Coordinates, MatchCriteria, UrgencyTier};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "rescuelink", about = "Find nearby animal rescue providers")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Rank rescue providers near the current or a typed location
    Recommend {
        /// Animal type or specialization to match (e.g. dog, bird)
        #[arg(long, default_value = "all")]
        specialization: String,
        /// Urgency tier: standard, high, or critical
        #[arg(long, default_value = "high")]
        urgency: UrgencyTier,
        /// Typed location (e.g. "Andheri, Mumbai") used instead of the device
        #[arg(long)]
        location: Option<String>,
        /// Ignore any cached recommendations
        #[arg(long)]
        refresh: bool,
        /// Override the provider distance cutoff in kilometers
        #[arg(long)]
        max_distance: Option<f64>,
        /// Show at most this many providers
        #[arg(long)]
        limit: Option<usize>,
        /// Print the recommendation set as JSON
        #[arg(long)]
        json: bool,
    },
    /// Great-circle distance between two points
    #[command(allow_negative_numbers = true)]
    Distance {
        lat1: f64,
        lng1: f64,
        lat2: f64,
        lng2: f64,
    },
    /// List cities covered by the provider catalog
    Cities,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = rescuelink_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Recommend {
            specialization,
            urgency,
            location,
            refresh,
            max_distance,
            limit,
            json,
        }) => {
            let overrides = wiring::MatchOverrides {
                max_distance_km: max_distance,
                limit,
            };
            let service = wiring::build_service(&config, overrides)?;
            let criteria = MatchCriteria::new(&specialization, urgency);
            let set = match location.as_deref() {
                Some(text) if text.trim().is_empty() => {
                    anyhow::bail!("--location must not be blank")
                }
                Some(text) => service.update_manual_location(text, &criteria).await,
                None => service.get_recommendations(&criteria, refresh).await,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(set.as_ref())?);
            } else {
                output::print_recommendations(&set);
            }
        }
        Some(Commands::Distance {
            lat1,
            lng1,
            lat2,
            lng2,
        }) => {
            let a = parse_point(lat1, lng1)?;
            let b = parse_point(lat2, lng2)?;
            let km = haversine_km(a, b);
            println!("{km:.3} km ({})", distance_label(km));
        }
        Some(Commands::Cities) => {
            let catalog = rescuelink_core::load_catalog(&config.catalog_path)?;
            output::print_cities(&catalog.covered_cities());
        }
        None => println!("rescuelink: run with --help to see available commands"),
    }

    Ok(())
}

fn parse_point(lat: f64, lng: f64) -> anyhow::Result<Coordinates> {
    let point = Coordinates::new(lat, lng);
    if !point.is_valid() {
        anyhow::bail!("coordinates out of range: {lat}, {lng}");
    }
    Ok(point)
}
