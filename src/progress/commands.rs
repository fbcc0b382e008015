use tauri::State;

use crate::progress::{calculate_progress, LevelProgress, PokemonLevel};
use crate::AppState;

#[tauri::command]
pub fn get_pokemon_level(state: State<'_, AppState>, id: String) -> Option<PokemonLevel> {
    state.progress.get_level(&id)
}

#[tauri::command]
pub fn set_pokemon_level(state: State<'_, AppState>, level: PokemonLevel) {
    state.progress.set_level(level);
}

/// Commits a finished tracking session to the given Pokemon's record.
#[tauri::command]
pub fn apply_session_steps(
    state: State<'_, AppState>,
    id: String,
    session_steps: u32,
) -> PokemonLevel {
    state.progress.apply_session_steps(&id, session_steps)
}

#[tauri::command]
pub fn get_current_pokemon(state: State<'_, AppState>) -> Option<String> {
    state.progress.current_pokemon()
}

#[tauri::command]
pub fn set_current_pokemon(state: State<'_, AppState>, id: Option<String>) {
    state.progress.set_current_pokemon(id);
}

#[tauri::command]
pub fn calculate_level_progress(total_steps: u32) -> LevelProgress {
    calculate_progress(total_steps)
}

#[tauri::command]
pub fn reset_progress(state: State<'_, AppState>) {
    state.progress.reset();
}
