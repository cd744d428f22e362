use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::SyncError;
use crate::model::{Coordinate, PrecipitationKind, WeatherObservation};

use super::ObservationProvider;

const CURRENT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

/// Current-weather client for the OpenWeather API.
#[derive(Debug, Clone)]
pub struct OpenWeatherProvider {
    api_key: String,
    http: Client,
    base_url: String,
}

impl OpenWeatherProvider {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, CURRENT_WEATHER_URL.to_string())
    }

    /// Base URL is injectable so tests can point at a local mock server.
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
            base_url,
        }
    }

    async fn fetch_current(&self, coord: Coordinate) -> Result<WeatherObservation, SyncError> {
        let res = self
            .http
            .get(&self.base_url)
            .query(&[
                ("lat", coord.latitude.to_string().as_str()),
                ("lon", coord.longitude.to_string().as_str()),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(SyncError::Protocol {
                service: "openweather",
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        debug!(%coord, status = status.as_u16(), "openweather response");

        let parsed: OwCurrentResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::parse("openweather", e.to_string()))?;

        // An empty condition list means the payload is unusable, not "clear".
        let condition = parsed.weather.first().ok_or_else(|| {
            SyncError::parse("openweather", "response contained no weather conditions")
        })?;

        let observed_at = parsed
            .dt
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0))
            .unwrap_or_else(Utc::now);

        Ok(WeatherObservation {
            city_name: parsed.name,
            temperature_c: parsed.main.temp,
            cloudiness_pct: parsed.clouds.all,
            precipitation: PrecipitationKind::from_condition(&condition.main),
            description: condition.description.clone(),
            visibility_m: parsed.visibility,
            wind_speed_mps: parsed.wind.speed,
            observed_at,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwClouds {
    all: f64,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    dt: Option<i64>,
    visibility: f64,
    main: OwMain,
    weather: Vec<OwWeather>,
    clouds: OwClouds,
    wind: OwWind,
}

#[async_trait]
impl ObservationProvider for OpenWeatherProvider {
    async fn fetch(&self, coord: Coordinate) -> Result<WeatherObservation, SyncError> {
        self.fetch_current(coord).await
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}
