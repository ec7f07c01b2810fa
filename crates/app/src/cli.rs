//! Command-line surface of the `snapfix` binary.
//!
//! Flags layer on top of [`LocationConfig::from_env`], so an unset flag keeps
//! the environment or built-in default.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use snapfix_location::{LatLng, LocationConfig};

use crate::state::SessionLimits;

#[derive(Debug, Parser)]
#[command(name = "snapfix", version, about = "Civic issue report form server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the report form and its JSON API.
    Serve(ServeArgs),
    /// Look up a postal code once and print the coordinate.
    Geocode(GeocodeArgs),
}

#[derive(Debug, Args)]
pub struct ServeArgs {
    /// Address to bind the HTTP server to.
    #[arg(long = "bind", value_name = "ADDR", default_value = "0.0.0.0")]
    pub bind: String,
    /// Port to listen on.
    #[arg(long = "port", value_name = "PORT", default_value_t = 8080)]
    pub port: u16,
    /// Seconds a form may sit untouched before it is dropped.
    #[arg(long = "session-idle-secs", value_name = "SECS", default_value_t = 1800)]
    pub session_idle_secs: u64,
    /// Most forms kept open at once; the least recently used goes first.
    #[arg(long = "max-sessions", value_name = "N", default_value_t = 10_000)]
    pub max_sessions: usize,
    #[command(flatten)]
    pub location: LocationArgs,
}

#[derive(Debug, Args)]
pub struct GeocodeArgs {
    /// Postal code to resolve.
    #[arg(value_name = "POSTAL_CODE")]
    pub postal_code: String,
    #[command(flatten)]
    pub location: LocationArgs,
}

impl ServeArgs {
    pub(crate) fn session_limits(&self) -> Result<SessionLimits> {
        if self.session_idle_secs == 0 || self.max_sessions == 0 {
            bail!("--session-idle-secs and --max-sessions must be positive");
        }
        Ok(SessionLimits {
            idle_timeout: Duration::from_secs(self.session_idle_secs),
            max_open: self.max_sessions,
        })
    }
}

/// Map and geocoder overrides shared by every subcommand.
#[derive(Debug, Default, Args)]
pub struct LocationArgs {
    /// Latitude shown when a form opens.
    #[arg(long = "default-lat", value_name = "DEG", allow_negative_numbers = true)]
    pub default_lat: Option<f64>,
    /// Longitude shown when a form opens.
    #[arg(long = "default-lng", value_name = "DEG", allow_negative_numbers = true)]
    pub default_lng: Option<f64>,
    /// Initial map zoom (0-19).
    #[arg(long = "zoom", value_name = "LEVEL")]
    pub zoom: Option<u8>,
    /// Raster tile URL template with {z}/{x}/{y} and optional {s}.
    #[arg(long = "tile-url", value_name = "TEMPLATE")]
    pub tile_url: Option<String>,
    /// Attribution text required by the tile provider.
    #[arg(long = "tile-attribution", value_name = "TEXT")]
    pub tile_attribution: Option<String>,
    /// Free-text geocoding search endpoint.
    #[arg(long = "geocoder-url", value_name = "URL")]
    pub geocoder_url: Option<String>,
    /// Country appended to every postal-code query.
    #[arg(long = "country", value_name = "NAME")]
    pub country: Option<String>,
    /// User-Agent sent to the geocoder.
    #[arg(long = "user-agent", value_name = "UA")]
    pub user_agent: Option<String>,
}

impl TryFrom<LocationArgs> for LocationConfig {
    type Error = anyhow::Error;

    fn try_from(args: LocationArgs) -> Result<Self> {
        let mut config = LocationConfig::from_env();
        config.default_position = LatLng::new(
            args.default_lat.unwrap_or(config.default_position.lat),
            args.default_lng.unwrap_or(config.default_position.lng),
        );
        if let Some(zoom) = args.zoom {
            config.zoom = zoom;
        }
        if let Some(url) = args.tile_url {
            config.tiles.url_template = url;
        }
        if let Some(attribution) = args.tile_attribution {
            config.tiles.attribution = attribution;
        }
        if let Some(url) = args.geocoder_url {
            config.geocoder_url = url;
        }
        if let Some(country) = args.country {
            config.country = country;
        }
        if let Some(agent) = args.user_agent {
            if agent.trim().is_empty() {
                bail!("--user-agent must not be empty");
            }
            config.user_agent = agent;
        }
        config.validate().context("invalid map configuration")?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "snapfix",
            "serve",
            "--port",
            "9000",
            "--default-lat",
            "-33.8688",
            "--default-lng",
            "151.2093",
            "--country",
            "Australia",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(args.port, 9000);
        assert_eq!(args.bind, "0.0.0.0");
        assert_eq!(args.session_limits().unwrap(), SessionLimits::default());
        let config = LocationConfig::try_from(args.location).unwrap();
        assert_eq!(config.default_position, LatLng::new(-33.8688, 151.2093));
        assert_eq!(config.country, "Australia");
    }

    #[test]
    fn session_limit_flags() {
        let cli = Cli::try_parse_from([
            "snapfix",
            "serve",
            "--session-idle-secs",
            "60",
            "--max-sessions",
            "5",
        ])
        .unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        let limits = args.session_limits().unwrap();
        assert_eq!(limits.idle_timeout, Duration::from_secs(60));
        assert_eq!(limits.max_open, 5);

        let cli = Cli::try_parse_from(["snapfix", "serve", "--max-sessions", "0"]).unwrap();
        let Command::Serve(args) = cli.command else {
            panic!("expected serve");
        };
        assert!(args.session_limits().is_err());
    }

    #[test]
    fn geocode_takes_a_positional_postal_code() {
        let cli = Cli::try_parse_from(["snapfix", "geocode", "110001"]).unwrap();
        let Command::Geocode(args) = cli.command else {
            panic!("expected geocode");
        };
        assert_eq!(args.postal_code, "110001");
    }

    #[test]
    fn invalid_zoom_is_rejected() {
        let args = LocationArgs {
            zoom: Some(25),
            ..Default::default()
        };
        assert!(LocationConfig::try_from(args).is_err());
    }
}
