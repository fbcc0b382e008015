//! Platform sensor acquisition surface.

use anyhow::Result;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::android_bridge;

/// One raw sample from the platform sensor subsystem. Step counter and
/// detector sensors populate only the first slot; the accelerometer fills
/// all three axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorSample {
    pub values: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SensorKind {
    StepCounter,
    StepDetector,
    Accelerometer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingRate {
    Normal,
    Ui,
}

impl SensorKind {
    /// Counter and detector samples arrive at the platform's normal
    /// cadence; the accelerometer needs the faster UI cadence to resolve
    /// individual strides.
    pub fn sampling_rate(self) -> SamplingRate {
        match self {
            SensorKind::Accelerometer => SamplingRate::Ui,
            _ => SamplingRate::Normal,
        }
    }
}

/// Access to the platform's motion sensors. Implementations differ only in
/// where samples come from, never in emission semantics.
pub trait SensorSource: Send + Sync {
    /// Looks for a usable motion sensor, best kind first. Must not disturb
    /// an active registration.
    fn probe(&self) -> Option<SensorKind>;

    /// Registers a listener; samples flow on the returned channel until
    /// `unregister` is called.
    fn register(&self, kind: SensorKind, rate: SamplingRate)
        -> Result<mpsc::Receiver<SensorSample>>;

    fn unregister(&self);
}

/// Production source delegating to the Android host layer.
pub struct PlatformSensorSource;

impl PlatformSensorSource {
    pub fn new() -> Self {
        Self
    }
}

impl SensorSource for PlatformSensorSource {
    fn probe(&self) -> Option<SensorKind> {
        android_bridge::probe_step_sensor()
    }

    fn register(
        &self,
        kind: SensorKind,
        rate: SamplingRate,
    ) -> Result<mpsc::Receiver<SensorSample>> {
        android_bridge::register_listener(kind, rate)
    }

    fn unregister(&self) {
        android_bridge::unregister_listener();
    }
}
