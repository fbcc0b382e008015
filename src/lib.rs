mod android_bridge;
mod catalog;
mod progress;
mod sensor;
mod storage;
mod tracker;

use std::sync::Arc;

use catalog::{
    commands::{fetch_pokemon_details, fetch_pokemon_page},
    CatalogClient,
};
use progress::{
    commands::{
        apply_session_steps, calculate_level_progress, get_current_pokemon, get_pokemon_level,
        reset_progress, set_current_pokemon, set_pokemon_level,
    },
    ProgressStore,
};
use sensor::{BridgeConfig, PlatformSensorSource, SensorSource, StepSensorBridge};
use storage::{DurableStore, KvStore};
use tauri::{Emitter, Manager};
use tracker::{
    commands::{
        get_tracking_state, request_tracking_permission, reset_step_count, start_tracking,
        stop_tracking,
    },
    TrackerController,
};

pub(crate) struct AppState {
    pub(crate) catalog: CatalogClient,
    pub(crate) progress: Arc<ProgressStore>,
    pub(crate) tracker: TrackerController,
}

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Initialize logging (reads RUST_LOG env var)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    log::info!("Pokewalk starting up...");

    tauri::Builder::default()
        .plugin(tauri_plugin_opener::init())
        .setup(|app| {
            let result = (|| -> anyhow::Result<()> {
                let app_data_dir = app
                    .path()
                    .app_data_dir()
                    .map_err(|err| anyhow::anyhow!(err))?;
                std::fs::create_dir_all(&app_data_dir)?;

                let kv_path = app_data_dir.join("pokewalk.sqlite3");
                let store: Arc<dyn DurableStore> = Arc::new(KvStore::open(kv_path)?);
                let progress = Arc::new(ProgressStore::load(store));

                let source: Arc<dyn SensorSource> = Arc::new(PlatformSensorSource::new());
                let bridge = Arc::new(StepSensorBridge::new(source, BridgeConfig::default()));
                let tracker = TrackerController::new(bridge);

                // Forward tracking state changes to the webview.
                {
                    let mut updates = tracker.subscribe_updates();
                    let app_handle = app.handle().clone();
                    tauri::async_runtime::spawn(async move {
                        while updates.changed().await.is_ok() {
                            let snapshot = updates.borrow_and_update().clone();
                            let _ = app_handle.emit("tracking-state-changed", &snapshot);
                        }
                    });
                }

                // Permission prompt and availability probe run off the
                // startup path.
                {
                    let tracker = tracker.clone();
                    tauri::async_runtime::spawn(async move {
                        tracker.initialize().await;
                    });
                }

                app.manage(AppState {
                    catalog: CatalogClient::new()?,
                    progress,
                    tracker,
                });

                Ok(())
            })();

            result.map_err(|err| err.into())
        })
        .invoke_handler(tauri::generate_handler![
            get_tracking_state,
            start_tracking,
            stop_tracking,
            request_tracking_permission,
            reset_step_count,
            get_pokemon_level,
            set_pokemon_level,
            apply_session_steps,
            get_current_pokemon,
            set_current_pokemon,
            calculate_level_progress,
            reset_progress,
            fetch_pokemon_page,
            fetch_pokemon_details,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            // Sessions must not outlive the app; stop tracking on every
            // exit path.
            if let tauri::RunEvent::Exit = event {
                if let Some(state) = app_handle.try_state::<AppState>() {
                    let tracker = state.tracker.clone();
                    tauri::async_runtime::block_on(async move {
                        tracker.shutdown().await;
                    });
                }
            }
        });
}
