//! Core library for `weathersync`.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - Geolocation resolution (device location service or IP lookup)
//! - A weather provider abstraction and the OpenWeather client
//! - The pure observation-to-effects mapping
//! - The polling scheduler that ties them together
//!
//! It is used by `weathersync-cli`, but can also be embedded in a game or
//! service that pushes the mapped effect configuration into its own renderer.

pub mod config;
pub mod effects;
pub mod error;
pub mod geo;
pub mod model;
pub mod provider;
pub mod scheduler;

pub use config::{Config, Credentials, DEFAULT_POLL_INTERVAL_SECS};
pub use effects::{
    CloudProfile, EffectConfiguration, Precipitation, PrecipitationEffect, WindTier, map_effects,
};
pub use error::SyncError;
pub use geo::{IpGeoResolver, LocationProvider, LocationStatus, resolve_from_device};
pub use model::{Coordinate, PrecipitationKind, WeatherObservation};
pub use provider::{ObservationProvider, openweather::OpenWeatherProvider};
pub use scheduler::{PollState, PollingScheduler, WeatherSink};
