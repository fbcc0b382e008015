//! FFI surface for the Android host layer.
//!
//! The host app's NDK glue implements the `android_sensor_*` /
//! `android_permission_*` symbols and calls back into Rust with sensor
//! samples and permission results. Non-Android targets compile inert
//! stubs: no sensor is ever found and permission is always granted.

use anyhow::Result;
use tokio::sync::mpsc;

use crate::sensor::{SamplingRate, SensorKind, SensorSample};

/// Android `Sensor.TYPE_*` values as reported by the host layer.
const SENSOR_TYPE_ACCELEROMETER: i32 = 1;
const SENSOR_TYPE_STEP_DETECTOR: i32 = 18;
const SENSOR_TYPE_STEP_COUNTER: i32 = 19;

/// Android `SensorManager.SENSOR_DELAY_*` values.
const SENSOR_DELAY_UI: i32 = 2;
const SENSOR_DELAY_NORMAL: i32 = 3;

const SAMPLE_CHANNEL_CAPACITY: usize = 64;

#[cfg(target_os = "android")]
mod ffi {
    extern "C" {
        /// Returns the Android sensor type of the best available step
        /// sensor (counter, then detector, then accelerometer), or -1.
        pub fn android_sensor_find_step_sensor() -> i32;
        pub fn android_sensor_register_listener(
            sensor_type: i32,
            delay: i32,
            callback: extern "C" fn(*const f32, i32),
        ) -> bool;
        pub fn android_sensor_unregister_listener();

        pub fn android_permission_check_activity_recognition() -> bool;
        pub fn android_permission_request_activity_recognition(callback: extern "C" fn(bool));
    }
}

#[cfg(target_os = "android")]
mod sink {
    use std::sync::Mutex;

    use log::warn;
    use tokio::sync::{mpsc, oneshot};

    use crate::sensor::SensorSample;

    pub static SAMPLE_TX: Mutex<Option<mpsc::Sender<SensorSample>>> = Mutex::new(None);
    pub static PERMISSION_TX: Mutex<Option<oneshot::Sender<bool>>> = Mutex::new(None);

    /// Called by the host layer on its sensor thread. Samples arriving with
    /// no registered session are dropped.
    pub extern "C" fn on_sensor_sample(values: *const f32, count: i32) {
        let mut sample = SensorSample { values: [0.0; 3] };
        let len = (count.max(0) as usize).min(3);
        let slice = unsafe { std::slice::from_raw_parts(values, len) };
        sample.values[..len].copy_from_slice(slice);

        if let Some(tx) = SAMPLE_TX.lock().unwrap().as_ref() {
            if tx.try_send(sample).is_err() {
                warn!("Dropping sensor sample: channel full or closed");
            }
        }
    }

    pub extern "C" fn on_permission_result(granted: bool) {
        if let Some(tx) = PERMISSION_TX.lock().unwrap().take() {
            let _ = tx.send(granted);
        }
    }
}

fn kind_from_sensor_type(sensor_type: i32) -> Option<SensorKind> {
    match sensor_type {
        SENSOR_TYPE_STEP_COUNTER => Some(SensorKind::StepCounter),
        SENSOR_TYPE_STEP_DETECTOR => Some(SensorKind::StepDetector),
        SENSOR_TYPE_ACCELEROMETER => Some(SensorKind::Accelerometer),
        _ => None,
    }
}

fn sensor_type_from_kind(kind: SensorKind) -> i32 {
    match kind {
        SensorKind::StepCounter => SENSOR_TYPE_STEP_COUNTER,
        SensorKind::StepDetector => SENSOR_TYPE_STEP_DETECTOR,
        SensorKind::Accelerometer => SENSOR_TYPE_ACCELEROMETER,
    }
}

fn delay_from_rate(rate: SamplingRate) -> i32 {
    match rate {
        SamplingRate::Normal => SENSOR_DELAY_NORMAL,
        SamplingRate::Ui => SENSOR_DELAY_UI,
    }
}

pub fn probe_step_sensor() -> Option<SensorKind> {
    #[cfg(target_os = "android")]
    let sensor_type = unsafe { ffi::android_sensor_find_step_sensor() };
    #[cfg(not(target_os = "android"))]
    let sensor_type = -1;

    kind_from_sensor_type(sensor_type)
}

/// Registers the platform listener; samples flow on the returned channel
/// until `unregister_listener`.
pub fn register_listener(
    kind: SensorKind,
    rate: SamplingRate,
) -> Result<mpsc::Receiver<SensorSample>> {
    #[cfg(target_os = "android")]
    {
        use anyhow::bail;

        let (tx, rx) = mpsc::channel(SAMPLE_CHANNEL_CAPACITY);
        *sink::SAMPLE_TX.lock().unwrap() = Some(tx);

        let registered = unsafe {
            ffi::android_sensor_register_listener(
                sensor_type_from_kind(kind),
                delay_from_rate(rate),
                sink::on_sensor_sample,
            )
        };

        if !registered {
            *sink::SAMPLE_TX.lock().unwrap() = None;
            bail!("sensor listener registration was rejected for {kind:?}");
        }

        Ok(rx)
    }

    #[cfg(not(target_os = "android"))]
    {
        let _ = (sensor_type_from_kind(kind), delay_from_rate(rate), SAMPLE_CHANNEL_CAPACITY);
        anyhow::bail!("no sensor backend on this platform")
    }
}

pub fn unregister_listener() {
    #[cfg(target_os = "android")]
    {
        unsafe { ffi::android_sensor_unregister_listener() };
        *sink::SAMPLE_TX.lock().unwrap() = None;
    }
}

pub fn check_activity_permission() -> bool {
    #[cfg(target_os = "android")]
    {
        unsafe { ffi::android_permission_check_activity_recognition() }
    }

    #[cfg(not(target_os = "android"))]
    {
        // No runtime permission model outside Android.
        true
    }
}

/// Prompts for ACTIVITY_RECOGNITION and resolves with the user's answer.
pub async fn request_activity_permission() -> Result<bool> {
    if check_activity_permission() {
        return Ok(true);
    }

    #[cfg(target_os = "android")]
    {
        use anyhow::Context;
        use tokio::sync::oneshot;

        let (tx, rx) = oneshot::channel();
        *sink::PERMISSION_TX.lock().unwrap() = Some(tx);
        unsafe { ffi::android_permission_request_activity_recognition(sink::on_permission_result) };

        rx.await
            .context("permission prompt dismissed without a result")
    }

    #[cfg(not(target_os = "android"))]
    {
        Ok(true)
    }
}
