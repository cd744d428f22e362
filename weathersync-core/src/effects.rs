//! Mapping from weather observations to a symbolic effect configuration.
//!
//! The mapping is pure and deterministic: an identical observation plus an
//! identical local time always yields an identical configuration. Each axis
//! (precipitation, fog, wind, clouds, time of day) is evaluated independently
//! against a fixed threshold table; the renderer behind the
//! [`WeatherSink`](crate::scheduler::WeatherSink) seam decides what the
//! symbols look like on screen.

use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{PrecipitationKind, WeatherObservation};

/// Visual precipitation kind. Drizzle renders as light rain, so the effect
/// side only distinguishes rain and snow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrecipitationEffect {
    None,
    Rain,
    Snow,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Precipitation {
    pub kind: PrecipitationEffect,
    /// Effect strength, 0..=1.
    pub intensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindTier {
    None,
    Light,
    Medium,
    Heavy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloudProfile {
    None,
    LightScattered,
    PartlyCloudy,
    MediumScattered,
    HeavyScattered,
    Overcast,
}

/// Renderer-agnostic description of the desired visual weather effects.
///
/// Always recomputed from the latest observation, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EffectConfiguration {
    /// Seconds elapsed since local midnight.
    pub time_of_day_seconds: f64,
    pub precipitation: Precipitation,
    pub fog_density: f64,
    pub wind_tier: WindTier,
    pub cloud_profile: CloudProfile,
}

impl fmt::Display for EffectConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} ({:.2}), fog {:.2}, wind {:?}, clouds {:?}",
            self.precipitation.kind,
            self.precipitation.intensity,
            self.fog_density,
            self.wind_tier,
            self.cloud_profile,
        )
    }
}

/// Map an observation and the current local time onto effect parameters.
pub fn map_effects(obs: &WeatherObservation, local: NaiveDateTime) -> EffectConfiguration {
    EffectConfiguration {
        time_of_day_seconds: f64::from(local.time().num_seconds_from_midnight()),
        precipitation: precipitation_for(obs.precipitation),
        fog_density: fog_density_for(obs.visibility_m),
        wind_tier: wind_tier_for(obs.wind_speed_mps),
        cloud_profile: cloud_profile_for(obs.cloudiness_pct),
    }
}

fn precipitation_for(kind: PrecipitationKind) -> Precipitation {
    let (kind, intensity) = match kind {
        PrecipitationKind::Rain => (PrecipitationEffect::Rain, 0.7),
        PrecipitationKind::Drizzle => (PrecipitationEffect::Rain, 0.25),
        PrecipitationKind::Snow => (PrecipitationEffect::Snow, 0.5),
        PrecipitationKind::None => (PrecipitationEffect::None, 0.0),
    };
    Precipitation { kind, intensity }
}

fn fog_density_for(visibility_m: f64) -> f64 {
    if visibility_m <= 1000.0 {
        0.2
    } else if visibility_m <= 3000.0 {
        0.1
    } else if visibility_m <= 6000.0 {
        0.05
    } else if visibility_m <= 9000.0 {
        0.01
    } else {
        0.0
    }
}

fn wind_tier_for(speed_mps: f64) -> WindTier {
    if speed_mps > 30.0 {
        WindTier::Heavy
    } else if speed_mps > 20.0 {
        WindTier::Medium
    } else if speed_mps > 10.0 {
        WindTier::Light
    } else {
        WindTier::None
    }
}

fn cloud_profile_for(cloudiness_pct: f64) -> CloudProfile {
    if cloudiness_pct >= 90.0 {
        CloudProfile::Overcast
    } else if cloudiness_pct >= 70.0 {
        CloudProfile::HeavyScattered
    } else if cloudiness_pct >= 50.0 {
        CloudProfile::MediumScattered
    } else if cloudiness_pct >= 30.0 {
        CloudProfile::LightScattered
    } else if cloudiness_pct >= 10.0 {
        CloudProfile::PartlyCloudy
    } else {
        CloudProfile::None
    }
}
