pub mod bridge;
pub mod source;

pub use bridge::{BridgeConfig, StepEvent, StepSensorBridge, StepSubscription};
pub use source::{PlatformSensorSource, SamplingRate, SensorKind, SensorSample, SensorSource};
