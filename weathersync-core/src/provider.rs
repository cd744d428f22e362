use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::SyncError;
use crate::model::{Coordinate, WeatherObservation};

pub mod openweather;

/// Source of weather observations for a coordinate.
///
/// The scheduler only knows this trait; production code plugs in
/// [`openweather::OpenWeatherProvider`], tests plug in scripted fakes.
#[async_trait]
pub trait ObservationProvider: Send + Sync + Debug {
    async fn fetch(&self, coord: Coordinate) -> Result<WeatherObservation, SyncError>;
}
