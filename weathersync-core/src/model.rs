use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SyncError;

/// A latitude/longitude pair to query weather for.
///
/// Exactly (0, 0) is reserved as the "unset/failed lookup" sentinel and is
/// never a valid resolved coordinate; construction rejects it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, SyncError> {
        if latitude == 0.0 && longitude == 0.0 {
            return Err(SyncError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Broad precipitation category reported by the weather API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecipitationKind {
    None,
    Rain,
    Drizzle,
    Snow,
}

impl PrecipitationKind {
    /// Classify the API's `weather[0].main` category string.
    pub fn from_condition(main: &str) -> Self {
        match main {
            "Rain" => PrecipitationKind::Rain,
            "Drizzle" => PrecipitationKind::Drizzle,
            "Snow" => PrecipitationKind::Snow,
            _ => PrecipitationKind::None,
        }
    }
}

/// Normalized snapshot of conditions at one point in time.
///
/// Produced fresh on every successful fetch; a new snapshot supersedes the
/// previous one, nothing mutates an existing snapshot in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub city_name: String,
    pub temperature_c: f64,
    /// Cloud cover, 0..=100.
    pub cloudiness_pct: f64,
    pub precipitation: PrecipitationKind,
    pub description: String,
    pub visibility_m: f64,
    pub wind_speed_mps: f64,
    pub observed_at: DateTime<Utc>,
}

impl fmt::Display for WeatherObservation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({:.1}°C, clouds {:.0}%, visibility {:.0} m, wind {:.1} m/s)",
            self.city_name,
            self.description,
            self.temperature_c,
            self.cloudiness_pct,
            self.visibility_m,
            self.wind_speed_mps,
        )
    }
}
