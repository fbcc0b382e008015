use tauri::State;

use crate::catalog::{Pokemon, PokemonPage};
use crate::AppState;

#[tauri::command]
pub async fn fetch_pokemon_page(
    state: State<'_, AppState>,
    page_url: Option<String>,
) -> Result<PokemonPage, String> {
    state
        .catalog
        .fetch_page(page_url)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn fetch_pokemon_details(
    state: State<'_, AppState>,
    name_or_id: String,
) -> Result<Pokemon, String> {
    state
        .catalog
        .fetch_details(&name_or_id)
        .await
        .map_err(|e| e.to_string())
}
