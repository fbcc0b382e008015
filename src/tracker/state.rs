use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Snapshot of the step tracking state machine as exposed to the UI.
///
/// `step_count` is session-relative and carries replacement semantics:
/// every step event overwrites it with the latest reading, so consumers
/// must treat it as "latest read", never as an accumulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingState {
    pub has_permission: bool,
    pub is_available: bool,
    pub is_tracking: bool,
    pub step_count: u32,
    pub started_at: Option<DateTime<Utc>>,
}

impl Default for TrackingState {
    fn default() -> Self {
        Self {
            has_permission: false,
            is_available: false,
            is_tracking: false,
            step_count: 0,
            started_at: None,
        }
    }
}
