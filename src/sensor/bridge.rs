//! Step sensor bridge: discovers a motion sensor, owns the listening
//! session, and normalizes raw samples into step events.

use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::source::{SensorKind, SensorSample, SensorSource};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Tunable thresholds for sensors without dedicated step semantics.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Acceleration magnitude above which a sample counts as a step.
    /// Empirical; rapid oscillation above it can emit more than one event
    /// per physical step.
    pub accelerometer_threshold: f32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            accelerometer_threshold: 12.0,
        }
    }
}

/// One detected step increment. For `StepCounter` sessions the value is the
/// cumulative session delta and replaces the consumer's previous reading;
/// for the other kinds it is always 1.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepEvent {
    pub step_increment: u32,
}

struct ActiveSession {
    id: String,
    kind: SensorKind,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
}

pub struct StepSensorBridge {
    source: Arc<dyn SensorSource>,
    config: BridgeConfig,
    cached_kind: Mutex<Option<SensorKind>>,
    session: tokio::sync::Mutex<Option<ActiveSession>>,
    events: broadcast::Sender<StepEvent>,
}

impl StepSensorBridge {
    pub fn new(source: Arc<dyn SensorSource>, config: BridgeConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            config,
            cached_kind: Mutex::new(None),
            session: tokio::sync::Mutex::new(None),
            events,
        }
    }

    /// Probes for a usable sensor, caching the discovered kind. Does not
    /// touch tracking state.
    pub fn probe_availability(&self) -> bool {
        let mut cached = self.cached_kind.lock().unwrap();
        if cached.is_none() {
            *cached = self.source.probe();
            match *cached {
                Some(kind) => info!("Step tracking available via {kind:?}"),
                None => info!("No step-capable sensor found"),
            }
        }
        cached.is_some()
    }

    /// Starts a listening session. No-op while a session is active or when
    /// no sensor exists; a rejected listener registration is reported
    /// through the `Result` and leaves the session inactive.
    pub async fn start_session(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return Ok(());
        }

        let kind = {
            let mut cached = self.cached_kind.lock().unwrap();
            if cached.is_none() {
                *cached = self.source.probe();
            }
            *cached
        };
        let Some(kind) = kind else {
            warn!("No step sensor available; session not started");
            return Ok(());
        };

        let samples = self
            .source
            .register(kind, kind.sampling_rate())
            .context("failed to register sensor listener")?;

        let id = Uuid::new_v4().to_string();
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(run_session(
            id.clone(),
            kind,
            samples,
            self.events.clone(),
            cancel.clone(),
            self.config.clone(),
        ));

        info!("Step session {id} started with {kind:?}");
        *session = Some(ActiveSession {
            id,
            kind,
            cancel,
            worker,
        });
        Ok(())
    }

    /// Stops the active session, unregistering the platform listener so no
    /// further events are dispatched. No-op while inactive.
    pub async fn stop_session(&self) {
        let mut session = self.session.lock().await;
        let Some(active) = session.take() else {
            return;
        };

        active.cancel.cancel();
        self.source.unregister();
        if let Err(err) = active.worker.await {
            warn!("Step session worker failed to join: {err}");
        }
        info!("Step session {} stopped", active.id);
    }

    pub async fn is_active(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn active_kind(&self) -> Option<SensorKind> {
        self.session.lock().await.as_ref().map(|s| s.kind)
    }

    /// Routes step events to `handler` until the returned subscription is
    /// cancelled.
    pub fn subscribe<F>(&self, mut handler: F) -> StepSubscription
    where
        F: FnMut(StepEvent) + Send + 'static,
    {
        let mut events = self.events.subscribe();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let worker = tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    event = events.recv() => match event {
                        Ok(event) => handler(event),
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!("Step subscriber lagged, skipped {skipped} events");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        StepSubscription {
            cancel,
            _worker: worker,
        }
    }
}

/// Handle for one `subscribe` call; cancelling stops further handler
/// invocations.
pub struct StepSubscription {
    cancel: CancellationToken,
    _worker: JoinHandle<()>,
}

impl StepSubscription {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

async fn run_session(
    id: String,
    kind: SensorKind,
    mut samples: mpsc::Receiver<SensorSample>,
    events: broadcast::Sender<StepEvent>,
    cancel: CancellationToken,
    config: BridgeConfig,
) {
    let mut accumulator = StepAccumulator::new(kind, config.accelerometer_threshold);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Step session {id} shutting down");
                break;
            }
            sample = samples.recv() => {
                let Some(sample) = sample else {
                    warn!("Sensor sample channel closed for session {id}");
                    break;
                };
                if let Some(step_increment) = accumulator.ingest(sample) {
                    let _ = events.send(StepEvent { step_increment });
                }
            }
        }
    }
}

/// Normalizes raw samples into step increments for one session.
struct StepAccumulator {
    kind: SensorKind,
    baseline: Option<f64>,
    accelerometer_threshold: f32,
}

impl StepAccumulator {
    fn new(kind: SensorKind, accelerometer_threshold: f32) -> Self {
        Self {
            kind,
            baseline: None,
            accelerometer_threshold,
        }
    }

    fn ingest(&mut self, sample: SensorSample) -> Option<u32> {
        match self.kind {
            SensorKind::StepCounter => {
                let reading = f64::from(sample.values[0]);
                match self.baseline {
                    // First sample anchors the session; nothing to report.
                    None => {
                        self.baseline = Some(reading);
                        None
                    }
                    Some(baseline) => {
                        let delta = (reading - baseline) as i64;
                        (delta > 0).then(|| delta as u32)
                    }
                }
            }
            SensorKind::StepDetector => (sample.values[0] == 1.0).then_some(1),
            SensorKind::Accelerometer => {
                let [x, y, z] = sample.values.map(f64::from);
                let magnitude = (x * x + y * y + z * z).sqrt();
                (magnitude > f64::from(self.accelerometer_threshold)).then_some(1)
            }
        }
    }
}
