use thiserror::Error;

/// Failures from location resolution, weather fetching and polling.
///
/// Every variant is non-fatal to the polling loop: the scheduler logs it,
/// reports it to sinks, and retries on the next natural interval.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("location services are not enabled on this device")]
    LocationUnavailable,

    #[error("timed out waiting for a location fix after {0} attempts")]
    LocationTimeout(u32),

    #[error("device location provider reported failure")]
    LocationFailed,

    #[error("coordinate ({latitude}, {longitude}) is the unset sentinel, not a usable location")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("network error: {0}")]
    Network(reqwest::Error),

    #[error("request to {0} timed out")]
    Timeout(&'static str),

    #[error("{service} request failed with status {status}: {body}")]
    Protocol {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("failed to parse {service} response: {reason}")]
    Parse {
        service: &'static str,
        reason: String,
    },
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest folds timeouts into its error type; we keep them distinct
            SyncError::Timeout("http request")
        } else {
            SyncError::Network(err)
        }
    }
}

impl SyncError {
    pub(crate) fn parse(service: &'static str, reason: impl Into<String>) -> Self {
        SyncError::Parse {
            service,
            reason: reason.into(),
        }
    }
}
