//! Periodic weather polling and publication of mapped effects.
//!
//! The scheduler owns the single logical timeline: it holds the poll state,
//! the current observation/configuration pair, and the sinks that external
//! collaborators (renderer, UI) register. Exclusive `&mut self` access on
//! [`PollingScheduler::tick`] guarantees at most one fetch cycle in flight.

use chrono::Local;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::effects::{EffectConfiguration, map_effects};
use crate::error::SyncError;
use crate::model::{Coordinate, WeatherObservation};
use crate::provider::ObservationProvider;

/// Cadence and progress of the poll loop. Owned exclusively by the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct PollState {
    pub coordinate: Coordinate,
    pub interval: Duration,
    pub elapsed: Duration,
    pub started: bool,
}

/// Observer for new observations and for non-fatal poll failures.
///
/// This is the only channel out of the core: a renderer maps the effect
/// configuration onto its own parameters, a UI shows the observation and any
/// error text.
pub trait WeatherSink: Send {
    fn on_observation(&mut self, obs: &WeatherObservation, effects: &EffectConfiguration);

    fn on_error(&mut self, _error: &SyncError) {}
}

/// Drives periodic re-fetching once started.
///
/// `Idle -> Active` on [`start`](Self::start); stays `Active` across fetch
/// failures (no backoff, the next natural interval retries) until
/// [`stop`](Self::stop).
pub struct PollingScheduler {
    provider: Box<dyn ObservationProvider>,
    sinks: Vec<Box<dyn WeatherSink>>,
    state: Option<PollState>,
    current: Option<(WeatherObservation, EffectConfiguration)>,
}

impl PollingScheduler {
    pub fn new(provider: Box<dyn ObservationProvider>) -> Self {
        Self {
            provider,
            sinks: Vec::new(),
            state: None,
            current: None,
        }
    }

    pub fn add_sink(&mut self, sink: Box<dyn WeatherSink>) {
        self.sinks.push(sink);
    }

    /// Begin polling `coordinate` every `interval`.
    ///
    /// Rejects the (0, 0) sentinel. Starting while already active re-targets
    /// the coordinate and interval but keeps the one existing timeline; it
    /// never spawns a second one.
    pub fn start(&mut self, coordinate: Coordinate, interval: Duration) -> Result<(), SyncError> {
        Coordinate::new(coordinate.latitude, coordinate.longitude)?;

        if let Some(state) = self.state.as_mut().filter(|s| s.started) {
            state.coordinate = coordinate;
            state.interval = interval;
            return Ok(());
        }

        self.state = Some(PollState {
            coordinate,
            interval,
            elapsed: Duration::ZERO,
            started: true,
        });
        info!(%coordinate, interval_secs = interval.as_secs_f32(), "polling started");
        Ok(())
    }

    /// Stop polling.
    ///
    /// `tick` holds `&mut self` across its await, so a stop can never
    /// interleave with a cycle in progress; [`run`](Self::run) discards an
    /// in-flight cycle on shutdown by dropping its future before it can
    /// apply a result.
    pub fn stop(&mut self) {
        if let Some(state) = self.state.as_mut() {
            state.started = false;
        }
        info!("polling stopped");
    }

    pub fn is_active(&self) -> bool {
        self.state.is_some_and(|s| s.started)
    }

    pub fn poll_state(&self) -> Option<PollState> {
        self.state
    }

    /// Latest successful observation, if any.
    pub fn observation(&self) -> Option<&WeatherObservation> {
        self.current.as_ref().map(|(obs, _)| obs)
    }

    /// Effect configuration derived from the latest observation.
    pub fn effects(&self) -> Option<&EffectConfiguration> {
        self.current.as_ref().map(|(_, fx)| fx)
    }

    /// Advance the timeline by `dt` and run one fetch cycle if it is due.
    ///
    /// Returns `None` when no cycle ran, otherwise the cycle's outcome.
    /// Elapsed time resets to zero after every cycle, success or failure, so
    /// a failed fetch is simply retried one full interval later.
    pub async fn tick(&mut self, dt: Duration) -> Option<Result<(), SyncError>> {
        let state = self.state.as_mut().filter(|s| s.started)?;

        state.elapsed += dt;
        if state.elapsed < state.interval {
            return None;
        }

        let coordinate = state.coordinate;

        let outcome = self.provider.fetch(coordinate).await;

        if let Some(state) = self.state.as_mut() {
            state.elapsed = Duration::ZERO;
        }

        match outcome {
            Ok(obs) => {
                let effects = map_effects(&obs, Local::now().naive_local());
                for sink in &mut self.sinks {
                    sink.on_observation(&obs, &effects);
                }
                self.current = Some((obs, effects));
                Some(Ok(()))
            }
            Err(err) => {
                // Non-fatal: previous observation stays untouched.
                warn!(%coordinate, error = %err, "poll cycle failed");
                for sink in &mut self.sinks {
                    sink.on_error(&err);
                }
                Some(Err(err))
            }
        }
    }

    /// Drive [`tick`](Self::tick) at one-second resolution until `shutdown`
    /// flips to true. The shutdown signal is raced against the running cycle,
    /// so a fetch still in flight is cancelled by dropping its future; its
    /// result never reaches state or sinks.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        const TICK: Duration = Duration::from_secs(1);

        let mut ticker = tokio::time::interval(TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first interval tick fires immediately; skip it
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let shutting_down = tokio::select! {
                        _ = self.tick(TICK) => false,
                        changed = shutdown.changed() => {
                            changed.is_err() || *shutdown.borrow()
                        }
                    };
                    if shutting_down {
                        self.stop();
                        return;
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        self.stop();
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PrecipitationKind;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::{Arc, Mutex};

    fn observation(city: &str) -> WeatherObservation {
        WeatherObservation {
            city_name: city.to_string(),
            temperature_c: 15.0,
            cloudiness_pct: 72.0,
            precipitation: PrecipitationKind::Rain,
            description: "light rain".to_string(),
            visibility_m: 8000.0,
            wind_speed_mps: 22.0,
            observed_at: Utc::now(),
        }
    }

    /// Provider that replays a scripted sequence of outcomes.
    #[derive(Debug, Clone)]
    struct ScriptedProvider {
        script: Arc<Mutex<Vec<Result<WeatherObservation, SyncError>>>>,
        calls: Arc<Mutex<u32>>,
    }

    impl ScriptedProvider {
        fn new(script: Vec<Result<WeatherObservation, SyncError>>) -> Self {
            Self {
                script: Arc::new(Mutex::new(script)),
                calls: Arc::new(Mutex::new(0)),
            }
        }

        fn calls(&self) -> u32 {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl ObservationProvider for ScriptedProvider {
        async fn fetch(&self, _coord: Coordinate) -> Result<WeatherObservation, SyncError> {
            *self.calls.lock().unwrap() += 1;
            self.script.lock().unwrap().remove(0)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        seen: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<u32>>,
    }

    impl WeatherSink for RecordingSink {
        fn on_observation(&mut self, obs: &WeatherObservation, _effects: &EffectConfiguration) {
            self.seen.lock().unwrap().push(obs.city_name.clone());
        }

        fn on_error(&mut self, _error: &SyncError) {
            *self.errors.lock().unwrap() += 1;
        }
    }

    fn vancouver() -> Coordinate {
        Coordinate::new(49.2827, -123.1207).unwrap()
    }

    #[tokio::test]
    async fn start_rejects_zero_coordinate() {
        let provider = ScriptedProvider::new(vec![]);
        let mut scheduler = PollingScheduler::new(Box::new(provider));

        let zero = Coordinate {
            latitude: 0.0,
            longitude: 0.0,
        };
        let err = scheduler
            .start(zero, Duration::from_secs(60))
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidCoordinate { .. }));
        assert!(!scheduler.is_active());
    }

    #[tokio::test]
    async fn fetch_runs_when_interval_elapses() {
        let provider = ScriptedProvider::new(vec![Ok(observation("Vancouver"))]);
        let calls = provider.clone();
        let mut scheduler = PollingScheduler::new(Box::new(provider));
        scheduler.start(vancouver(), Duration::from_secs(60)).unwrap();

        // not yet due
        assert!(scheduler.tick(Duration::from_secs(30)).await.is_none());
        assert_eq!(calls.calls(), 0);

        // 30 + 30 >= 60: one cycle runs
        let outcome = scheduler.tick(Duration::from_secs(30)).await;
        assert!(matches!(outcome, Some(Ok(()))));
        assert_eq!(calls.calls(), 1);
        assert_eq!(scheduler.observation().unwrap().city_name, "Vancouver");

        // elapsed was reset; the very next tick does not fetch again
        assert!(scheduler.tick(Duration::from_secs(30)).await.is_none());
        assert_eq!(calls.calls(), 1);
    }

    #[tokio::test]
    async fn failure_keeps_previous_observation_and_stays_active() {
        let provider = ScriptedProvider::new(vec![
            Ok(observation("Vancouver")),
            Err(SyncError::Timeout("http request")),
            Ok(observation("Burnaby")),
        ]);
        let mut scheduler = PollingScheduler::new(Box::new(provider));
        let sink = RecordingSink::default();
        let errors = Arc::clone(&sink.errors);
        scheduler.add_sink(Box::new(sink));
        scheduler.start(vancouver(), Duration::from_secs(10)).unwrap();

        scheduler.tick(Duration::from_secs(10)).await;
        assert_eq!(scheduler.observation().unwrap().city_name, "Vancouver");

        let outcome = scheduler.tick(Duration::from_secs(10)).await;
        assert!(matches!(outcome, Some(Err(_))));
        // previous observation untouched, scheduler still active
        assert_eq!(scheduler.observation().unwrap().city_name, "Vancouver");
        assert!(scheduler.is_active());
        assert_eq!(*errors.lock().unwrap(), 1);

        // next natural interval retries and succeeds
        scheduler.tick(Duration::from_secs(10)).await;
        assert_eq!(scheduler.observation().unwrap().city_name, "Burnaby");
    }

    #[tokio::test]
    async fn double_start_keeps_one_timeline() {
        let provider = ScriptedProvider::new(vec![Ok(observation("Vancouver"))]);
        let calls = provider.clone();
        let mut scheduler = PollingScheduler::new(Box::new(provider));

        scheduler.start(vancouver(), Duration::from_secs(60)).unwrap();
        scheduler.tick(Duration::from_secs(59)).await;

        // second start does not reset or duplicate the timeline
        scheduler.start(vancouver(), Duration::from_secs(60)).unwrap();
        let outcome = scheduler.tick(Duration::from_secs(1)).await;
        assert!(matches!(outcome, Some(Ok(()))));
        assert_eq!(calls.calls(), 1);
    }

    #[tokio::test]
    async fn stop_prevents_further_cycles() {
        let provider = ScriptedProvider::new(vec![Ok(observation("Vancouver"))]);
        let calls = provider.clone();
        let mut scheduler = PollingScheduler::new(Box::new(provider));
        scheduler.start(vancouver(), Duration::from_secs(10)).unwrap();
        scheduler.stop();

        assert!(!scheduler.is_active());
        assert!(scheduler.tick(Duration::from_secs(60)).await.is_none());
        assert_eq!(calls.calls(), 0);
    }

    #[tokio::test]
    async fn sinks_observe_each_update() {
        let provider = ScriptedProvider::new(vec![
            Ok(observation("Vancouver")),
            Ok(observation("Burnaby")),
        ]);
        let mut scheduler = PollingScheduler::new(Box::new(provider));
        let sink = RecordingSink::default();
        let seen = Arc::clone(&sink.seen);
        scheduler.add_sink(Box::new(sink));
        scheduler.start(vancouver(), Duration::from_secs(10)).unwrap();

        scheduler.tick(Duration::from_secs(10)).await;
        scheduler.tick(Duration::from_secs(10)).await;

        assert_eq!(*seen.lock().unwrap(), vec!["Vancouver", "Burnaby"]);
        let fx = scheduler.effects().unwrap();
        assert_eq!(fx.fog_density, 0.01);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_polls_and_shuts_down() {
        let provider = ScriptedProvider::new(vec![
            Ok(observation("Vancouver")),
            Ok(observation("Burnaby")),
        ]);
        let calls = provider.clone();
        let mut scheduler = PollingScheduler::new(Box::new(provider));
        scheduler.start(vancouver(), Duration::from_secs(2)).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            scheduler.run(rx).await;
            scheduler
        });

        // let two intervals elapse, then signal shutdown
        tokio::time::sleep(Duration::from_millis(4500)).await;
        tx.send(true).unwrap();

        let scheduler = handle.await.unwrap();
        assert!(!scheduler.is_active());
        assert_eq!(calls.calls(), 2);
        assert_eq!(scheduler.observation().unwrap().city_name, "Burnaby");
    }

    /// Provider whose fetch takes ten simulated seconds to complete.
    #[derive(Debug)]
    struct SlowProvider;

    #[async_trait]
    impl ObservationProvider for SlowProvider {
        async fn fetch(&self, _coord: Coordinate) -> Result<WeatherObservation, SyncError> {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(observation("Stale"))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_discards_in_flight_fetch() {
        let mut scheduler = PollingScheduler::new(Box::new(SlowProvider));
        let sink = RecordingSink::default();
        let seen = Arc::clone(&sink.seen);
        scheduler.add_sink(Box::new(sink));
        scheduler.start(vancouver(), Duration::from_secs(1)).unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(async move {
            scheduler.run(rx).await;
            scheduler
        });

        // the fetch starts at t=1s and would complete at t=11s; signal
        // shutdown at t=2s while it is still in flight
        tokio::time::sleep(Duration::from_secs(2)).await;
        tx.send(true).unwrap();

        let scheduler = handle.await.unwrap();
        assert!(!scheduler.is_active());
        assert!(scheduler.observation().is_none());
        assert!(scheduler.effects().is_none());
        assert!(seen.lock().unwrap().is_empty());
    }
}
