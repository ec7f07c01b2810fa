mod cli;
mod html;
mod server;
mod state;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use snapfix_location::{LocationConfig, NominatimClient, Resolution, Resolver};
use tracing::info;

use crate::cli::{Cli, Command};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => {
            telemetry::init_tracing("info");
            telemetry::init_metrics_recorder()?;
            let limits = args.session_limits()?;
            let config = LocationConfig::try_from(args.location)?;
            info!(
                bind = %args.bind,
                port = args.port,
                geocoder = %config.geocoder_url,
                country = %config.country,
                idle_secs = limits.idle_timeout.as_secs(),
                max_sessions = limits.max_open,
                "starting report form server"
            );
            server::run_server(config, limits, (args.bind.as_str(), args.port))
        }
        Command::Geocode(args) => {
            telemetry::init_tracing("warn");
            let config = LocationConfig::try_from(args.location)?;
            let resolver = Resolver::new(NominatimClient::new(&config)?, config.country.clone());
            let resolution = actix_web::rt::System::new()
                .block_on(resolver.resolve(&args.postal_code))
                .with_context(|| format!("lookup for {:?} failed", args.postal_code))?;
            match resolution {
                Resolution::Found(point) => {
                    println!("{} {}", point.lat_text, point.lng_text);
                    if let Some(name) = point.display_name {
                        println!("{name}");
                    }
                }
                Resolution::NotFound => println!("{}", snapfix_location::session::NOT_FOUND_MESSAGE),
                Resolution::Skipped => println!("Nothing to look up"),
            }
            Ok(())
        }
    }
}
