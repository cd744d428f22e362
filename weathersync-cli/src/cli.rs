use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::time::Duration;
use tokio::sync::watch;

use weathersync_core::{
    Config, Coordinate, EffectConfiguration, IpGeoResolver, ObservationProvider,
    OpenWeatherProvider, PollingScheduler, SyncError, WeatherObservation, WeatherSink, map_effects,
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weathersync", version, about = "Weather-to-effects sync")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Interactively configure API keys and the poll interval.
    Configure,

    /// Resolve your coordinate from your public IP address.
    Locate {
        /// Use this IP instead of looking up the public one.
        #[arg(long)]
        ip: Option<String>,
    },

    /// Fetch the weather once and print the mapped effect configuration.
    Show {
        /// Latitude; requires --lon. Defaults to the configured or
        /// IP-resolved coordinate.
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        /// Longitude; requires --lat.
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },

    /// Poll the weather on an interval, printing each update, until Ctrl-C.
    Watch {
        /// Seconds between polls; defaults to the configured interval.
        #[arg(long)]
        interval: Option<f32>,

        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Locate { ip } => locate(ip).await,
            Command::Show { lat, lon } => show(lat, lon).await,
            Command::Watch { interval, lat, lon } => watch_loop(interval, lat, lon).await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let weather_key = inquire::Text::new("OpenWeather API key:")
        .with_initial_value(config.credentials.weather_api_key.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read weather API key")?;

    let ip_key = inquire::Text::new("ipstack API key:")
        .with_initial_value(config.credentials.ip_api_key.as_deref().unwrap_or(""))
        .prompt()
        .context("Failed to read IP-geolocation API key")?;

    let interval = inquire::CustomType::<f32>::new("Poll interval in seconds:")
        .with_default(config.poll_interval_seconds())
        .with_error_message("Please enter a number of seconds")
        .prompt()
        .context("Failed to read poll interval")?;

    config.credentials.weather_api_key = non_empty(weather_key);
    config.credentials.ip_api_key = non_empty(ip_key);
    config.poll_interval_seconds = Some(interval);
    config.save()?;

    println!("Saved {}", Config::config_file_path()?.display());
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim().to_string();
    if s.is_empty() { None } else { Some(s) }
}

async fn locate(ip: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let resolver = IpGeoResolver::new(config.ip_api_key()?.to_string());

    let coord = match ip {
        Some(ip) => resolver.resolve(&ip).await?,
        None => resolver.resolve_public().await?,
    };

    println!("Coordinate: {coord}");
    Ok(())
}

/// Pick a coordinate: explicit flags, then the configured override, then IP
/// geolocation.
async fn resolve_coordinate(
    config: &Config,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<Coordinate> {
    if let (Some(lat), Some(lon)) = (lat, lon) {
        return Ok(Coordinate::new(lat, lon)?);
    }

    if let Some(coord) = config.coordinate {
        return Ok(Coordinate::new(coord.latitude, coord.longitude)?);
    }

    let resolver = IpGeoResolver::new(config.ip_api_key()?.to_string());
    Ok(resolver.resolve_public().await?)
}

async fn show(lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    let config = Config::load()?;
    let coord = resolve_coordinate(&config, lat, lon).await?;
    let provider = OpenWeatherProvider::new(config.weather_api_key()?.to_string());

    let obs = provider.fetch(coord).await?;
    let effects = map_effects(&obs, Local::now().naive_local());

    print_update(&obs, &effects);
    Ok(())
}

/// Sink that plays the role of the renderer/UI: prints every update and every
/// non-fatal poll failure.
struct StdoutSink;

impl WeatherSink for StdoutSink {
    fn on_observation(&mut self, obs: &WeatherObservation, effects: &EffectConfiguration) {
        print_update(obs, effects);
    }

    fn on_error(&mut self, error: &SyncError) {
        eprintln!("poll failed (will retry): {error}");
    }
}

fn print_update(obs: &WeatherObservation, effects: &EffectConfiguration) {
    println!("[{}] {obs}", Local::now().format("%H:%M:%S"));
    println!("         effects: {effects}");
}

async fn watch_loop(interval: Option<f32>, lat: Option<f64>, lon: Option<f64>) -> Result<()> {
    let config = Config::load()?;
    let coord = resolve_coordinate(&config, lat, lon).await?;
    let interval = Duration::from_secs_f32(interval.unwrap_or(config.poll_interval_seconds()));

    let provider = OpenWeatherProvider::new(config.weather_api_key()?.to_string());
    let mut scheduler = PollingScheduler::new(Box::new(provider));
    scheduler.add_sink(Box::new(StdoutSink));
    scheduler.start(coord, interval)?;

    println!(
        "Polling {coord} every {:.0} s (Ctrl-C to stop)",
        interval.as_secs_f32()
    );

    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(true);
        }
    });

    scheduler.run(rx).await;
    Ok(())
}
