use tauri::State;

use crate::tracker::TrackingState;
use crate::AppState;

#[tauri::command]
pub async fn get_tracking_state(state: State<'_, AppState>) -> Result<TrackingState, String> {
    Ok(state.tracker.get_state())
}

#[tauri::command]
pub async fn start_tracking(state: State<'_, AppState>) -> Result<TrackingState, String> {
    Ok(state.tracker.start_tracking().await)
}

#[tauri::command]
pub async fn stop_tracking(state: State<'_, AppState>) -> Result<TrackingState, String> {
    Ok(state.tracker.stop_tracking().await)
}

#[tauri::command]
pub async fn request_tracking_permission(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.tracker.request_permission().await)
}

#[tauri::command]
pub fn reset_step_count(state: State<'_, AppState>) -> TrackingState {
    state.tracker.reset_step_count()
}
