use std::sync::{Arc, Mutex};

use chrono::Utc;
use log::{error, warn};
use tokio::sync::watch;

use crate::android_bridge;
use crate::sensor::{StepSensorBridge, StepSubscription};

use super::TrackingState;

/// Mediates between the sensor bridge and application state: permission,
/// availability, the subscription lifecycle, and the session step counter.
///
/// Failures never propagate out of the controller; they degrade to state
/// flags per the platform APIs' contract (tracking off, unavailable,
/// permission denied).
#[derive(Clone)]
pub struct TrackerController {
    state: Arc<Mutex<TrackingState>>,
    bridge: Arc<StepSensorBridge>,
    subscription: Arc<Mutex<Option<StepSubscription>>>,
    updates: watch::Sender<TrackingState>,
}

impl TrackerController {
    pub fn new(bridge: Arc<StepSensorBridge>) -> Self {
        let initial = TrackingState::default();
        let (updates, _) = watch::channel(initial.clone());

        Self {
            state: Arc::new(Mutex::new(initial)),
            bridge,
            subscription: Arc::new(Mutex::new(None)),
            updates,
        }
    }

    /// App-start flow: request permission, and probe availability once
    /// granted.
    pub async fn initialize(&self) {
        self.request_permission().await;
    }

    pub fn get_state(&self) -> TrackingState {
        self.state.lock().unwrap().clone()
    }

    /// Receives a snapshot after every state change.
    pub fn subscribe_updates(&self) -> watch::Receiver<TrackingState> {
        self.updates.subscribe()
    }

    pub async fn request_permission(&self) -> bool {
        let granted = match android_bridge::request_activity_permission().await {
            Ok(granted) => granted,
            Err(err) => {
                warn!("Error requesting activity permission: {err}");
                false
            }
        };

        self.update_state(|s| {
            s.has_permission = granted;
            if !granted {
                // Availability is only meaningful while permitted.
                s.is_available = false;
            }
        });

        if granted {
            self.refresh_availability();
        } else {
            warn!("Step tracking permission denied");
        }
        granted
    }

    pub fn refresh_availability(&self) {
        if !self.get_state().has_permission {
            return;
        }
        let available = self.bridge.probe_availability();
        self.update_state(|s| s.is_available = available);
    }

    /// Begins a tracking session: zeroes the session counter, subscribes to
    /// step events, and starts the bridge session. Requests permission
    /// first when missing. No-op while already tracking or unavailable.
    pub async fn start_tracking(&self) -> TrackingState {
        if self.get_state().is_tracking {
            return self.get_state();
        }

        if !self.get_state().has_permission && !self.request_permission().await {
            return self.get_state();
        }

        if !self.get_state().is_available {
            self.refresh_availability();
            if !self.get_state().is_available {
                warn!("Step tracking unavailable; not starting");
                return self.get_state();
            }
        }

        // Mirror the session optimistically so events arriving right after
        // registration pass the is_tracking guard; reverted on failure.
        self.update_state(|s| {
            s.step_count = 0;
            s.is_tracking = true;
            s.started_at = Some(Utc::now());
        });
        self.install_subscription();

        let started = match self.bridge.start_session().await {
            Ok(()) => self.bridge.is_active().await,
            Err(err) => {
                error!("Error starting step tracking: {err}");
                false
            }
        };

        if !started {
            self.clear_subscription();
            self.update_state(|s| {
                s.is_tracking = false;
                s.started_at = None;
            });
        }

        self.get_state()
    }

    /// Ends the tracking session. The session counter is left intact so the
    /// caller can commit it. Idempotent while idle.
    pub async fn stop_tracking(&self) -> TrackingState {
        // Flip the flag before stopping so in-flight events hit the guard.
        self.update_state(|s| {
            s.is_tracking = false;
            s.started_at = None;
        });
        self.bridge.stop_session().await;
        self.clear_subscription();
        self.get_state()
    }

    /// Zeroes the session counter without touching tracking status.
    pub fn reset_step_count(&self) -> TrackingState {
        self.update_state(|s| s.step_count = 0)
    }

    /// Teardown: cancels the subscription and stops any active session.
    /// Must run on every exit path.
    pub async fn shutdown(&self) {
        self.update_state(|s| {
            s.is_tracking = false;
            s.started_at = None;
        });
        self.bridge.stop_session().await;
        self.clear_subscription();
    }

    fn install_subscription(&self) {
        let state = Arc::clone(&self.state);
        let updates = self.updates.clone();

        let subscription = self.bridge.subscribe(move |event| {
            let mut guard = state.lock().unwrap();
            if !guard.is_tracking {
                // Late delivery after stop; drop it.
                return;
            }
            guard.step_count = event.step_increment;
            let _ = updates.send(guard.clone());
        });

        if let Some(previous) = self.subscription.lock().unwrap().replace(subscription) {
            previous.cancel();
        }
    }

    fn clear_subscription(&self) {
        if let Some(subscription) = self.subscription.lock().unwrap().take() {
            subscription.cancel();
        }
    }

    fn update_state<F>(&self, apply: F) -> TrackingState
    where
        F: FnOnce(&mut TrackingState),
    {
        let mut guard = self.state.lock().unwrap();
        apply(&mut guard);
        let snapshot = guard.clone();
        let _ = self.updates.send(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::sensor::source::testing::FakeSensorSource;
    use crate::sensor::{BridgeConfig, SensorKind};

    fn controller_with(source: Arc<FakeSensorSource>) -> TrackerController {
        let bridge = Arc::new(StepSensorBridge::new(source, BridgeConfig::default()));
        TrackerController::new(bridge)
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        for _ in 0..100 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not met in time");
    }

    #[tokio::test]
    async fn initialize_grants_permission_and_probes_availability() {
        let controller = controller_with(Arc::new(FakeSensorSource::with_kind(
            SensorKind::StepCounter,
        )));
        controller.initialize().await;

        let state = controller.get_state();
        assert!(state.has_permission);
        assert!(state.is_available);
        assert!(!state.is_tracking);
    }

    #[tokio::test]
    async fn missing_sensor_reports_unavailable_and_blocks_start() {
        let controller = controller_with(Arc::new(FakeSensorSource::absent()));
        controller.initialize().await;

        assert!(!controller.get_state().is_available);

        let state = controller.start_tracking().await;
        assert!(!state.is_tracking);
    }

    #[tokio::test]
    async fn start_tracking_resets_counter_and_flips_flag() {
        let controller = controller_with(Arc::new(FakeSensorSource::with_kind(
            SensorKind::StepCounter,
        )));

        let state = controller.start_tracking().await;
        assert!(state.is_tracking);
        assert_eq!(state.step_count, 0);
        assert!(state.started_at.is_some());
        controller.stop_tracking().await;
    }

    #[tokio::test]
    async fn step_events_replace_the_session_counter() {
        let source = Arc::new(FakeSensorSource::with_kind(SensorKind::StepCounter));
        let controller = controller_with(source.clone());

        controller.start_tracking().await;
        source.emit([100.0, 0.0, 0.0]).await;
        source.emit([107.0, 0.0, 0.0]).await;
        wait_until(|| controller.get_state().step_count == 7).await;

        // 12, not 19: each reading replaces the previous one.
        source.emit([112.0, 0.0, 0.0]).await;
        wait_until(|| controller.get_state().step_count == 12).await;
        controller.stop_tracking().await;
    }

    #[tokio::test]
    async fn stop_preserves_counter_and_ignores_late_events() {
        let source = Arc::new(FakeSensorSource::with_kind(SensorKind::StepDetector));
        let controller = controller_with(source.clone());

        controller.start_tracking().await;
        source.emit([1.0, 0.0, 0.0]).await;
        wait_until(|| controller.get_state().step_count == 1).await;

        let state = controller.stop_tracking().await;
        assert!(!state.is_tracking);
        assert_eq!(state.step_count, 1);

        source.emit([1.0, 0.0, 0.0]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(controller.get_state().step_count, 1);
    }

    #[tokio::test]
    async fn stop_while_idle_is_idempotent() {
        let controller = controller_with(Arc::new(FakeSensorSource::with_kind(
            SensorKind::StepDetector,
        )));
        let state = controller.stop_tracking().await;
        assert!(!state.is_tracking);
    }

    #[tokio::test]
    async fn reset_zeroes_counter_without_touching_tracking() {
        let source = Arc::new(FakeSensorSource::with_kind(SensorKind::StepDetector));
        let controller = controller_with(source.clone());

        controller.start_tracking().await;
        source.emit([1.0, 0.0, 0.0]).await;
        wait_until(|| controller.get_state().step_count == 1).await;

        let state = controller.reset_step_count();
        assert_eq!(state.step_count, 0);
        assert!(state.is_tracking);
        controller.stop_tracking().await;
    }

    #[tokio::test]
    async fn rejected_registration_leaves_tracking_off() {
        let controller = controller_with(Arc::new(FakeSensorSource::rejecting(
            SensorKind::StepCounter,
        )));

        let state = controller.start_tracking().await;
        assert!(!state.is_tracking);
        assert!(state.started_at.is_none());
    }

    #[tokio::test]
    async fn shutdown_stops_an_active_session() {
        let source = Arc::new(FakeSensorSource::with_kind(SensorKind::StepCounter));
        let bridge = Arc::new(StepSensorBridge::new(source, BridgeConfig::default()));
        let controller = TrackerController::new(bridge.clone());

        controller.start_tracking().await;
        assert!(bridge.is_active().await);

        controller.shutdown().await;
        assert!(!bridge.is_active().await);
        assert!(!controller.get_state().is_tracking);
    }
}
