//! Location resolution: device location services or IP-based geolocation.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::SyncError;
use crate::model::Coordinate;

const IP_ECHO_URL: &str = "https://api.ipify.org/";
const IP_GEO_URL: &str = "http://api.ipstack.com";

/// Attempts made while the device provider reports `Initializing`, one per
/// second.
pub const DEVICE_POLL_ATTEMPTS: u32 = 20;
const DEVICE_POLL_WAIT: Duration = Duration::from_secs(1);

/// State reported by a device location service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationStatus {
    Initializing,
    Running,
    Failed,
    Disabled,
}

/// Seam for the platform's location service; implemented by the host
/// application, mocked in tests.
pub trait LocationProvider: Send + Sync {
    fn status(&self) -> LocationStatus;

    /// Last known fix, if the service has produced one.
    fn last_fix(&self) -> Option<(f64, f64)>;
}

/// Resolve a coordinate from the device location service.
///
/// Waits out the provider's `Initializing` phase with a bounded budget of
/// [`DEVICE_POLL_ATTEMPTS`] one-second sleeps; the sleep is the suspension
/// point, so callers can drop the future to cancel the wait.
pub async fn resolve_from_device(provider: &dyn LocationProvider) -> Result<Coordinate, SyncError> {
    if provider.status() == LocationStatus::Disabled {
        return Err(SyncError::LocationUnavailable);
    }

    let mut remaining = DEVICE_POLL_ATTEMPTS;
    while provider.status() == LocationStatus::Initializing && remaining > 0 {
        tokio::time::sleep(DEVICE_POLL_WAIT).await;
        remaining -= 1;
    }

    if remaining == 0 {
        return Err(SyncError::LocationTimeout(DEVICE_POLL_ATTEMPTS));
    }

    if provider.status() == LocationStatus::Failed {
        return Err(SyncError::LocationFailed);
    }

    let (latitude, longitude) = provider.last_fix().ok_or(SyncError::LocationFailed)?;

    // (0, 0) means the service produced nothing, not the Gulf of Guinea.
    Coordinate::new(latitude, longitude)
}

/// Resolves coordinates from the caller's public IP address.
#[derive(Debug, Clone)]
pub struct IpGeoResolver {
    api_key: String,
    http: Client,
    geo_url: String,
    echo_url: String,
}

impl IpGeoResolver {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoints(api_key, IP_GEO_URL.to_string(), IP_ECHO_URL.to_string())
    }

    /// Endpoints are injectable so tests can point at a local mock server.
    pub fn with_endpoints(api_key: String, geo_url: String, echo_url: String) -> Self {
        Self {
            api_key,
            http: Client::new(),
            geo_url,
            echo_url,
        }
    }

    /// Look up the caller's public IP from the plain-text echo service.
    pub async fn public_ip(&self) -> Result<String, SyncError> {
        let res = self.http.get(&self.echo_url).send().await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(SyncError::Protocol {
                service: "ip echo",
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let ip = body.trim();
        if ip.is_empty() {
            return Err(SyncError::parse("ip echo", "empty response body"));
        }

        debug!(ip, "resolved public ip");
        Ok(ip.to_string())
    }

    /// Resolve a coordinate for an already-known public IP address.
    pub async fn resolve(&self, ip: &str) -> Result<Coordinate, SyncError> {
        let url = format!("{}/{}", self.geo_url, ip);

        let res = self
            .http
            .get(&url)
            .query(&[
                ("access_key", self.api_key.as_str()),
                ("fields", "latitude,longitude"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        if !status.is_success() {
            return Err(SyncError::Protocol {
                service: "ip geolocation",
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let parsed: IpGeoResponse = serde_json::from_str(&body)
            .map_err(|e| SyncError::parse("ip geolocation", e.to_string()))?;

        let (latitude, longitude) = match (parsed.latitude, parsed.longitude) {
            (Some(lat), Some(lon)) => (lat, lon),
            _ => {
                return Err(SyncError::parse(
                    "ip geolocation",
                    "response lacks latitude/longitude fields",
                ));
            }
        };

        Coordinate::new(latitude, longitude)
    }

    /// Echo the public IP, then geolocate it.
    pub async fn resolve_public(&self) -> Result<Coordinate, SyncError> {
        let ip = self.public_ip().await?;
        self.resolve(&ip).await
    }
}

#[derive(Debug, Deserialize)]
struct IpGeoResponse {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}
