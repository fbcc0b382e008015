//! Per-Pokemon level progression and its persistence.
//!
//! Levels are never stored as a raw step total; each record keeps the
//! derived `(level, steps_to_next_level)` pair and the total is
//! reconstructed on demand. The whole collection persists as one JSON blob
//! in the durable store.

use std::sync::{Arc, RwLock};

use anyhow::Result;
use log::{error, warn};
use serde::{Deserialize, Serialize};

use crate::storage::DurableStore;

/// Cumulative steps required to advance one level.
pub const STEPS_PER_LEVEL: u32 = 100;

const STORE_KEY: &str = "pokemon-levels-storage";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PokemonLevel {
    pub id: String,
    pub level: u32,
    pub steps_to_next_level: u32,
}

impl PokemonLevel {
    /// Reconstructs the cumulative step total this record was derived from.
    pub fn total_steps(&self) -> u32 {
        self.level.saturating_sub(1) * STEPS_PER_LEVEL + self.steps_to_next_level
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelProgress {
    pub current_level: u32,
    pub steps_to_next_level: u32,
    pub progress_percentage: f64,
}

/// Derives level and progress from a cumulative step total.
pub fn calculate_progress(total_steps: u32) -> LevelProgress {
    let current_level = total_steps / STEPS_PER_LEVEL + 1;
    let steps_to_next_level = total_steps % STEPS_PER_LEVEL;
    let progress_percentage =
        (f64::from(steps_to_next_level) / f64::from(STEPS_PER_LEVEL) * 100.0).min(100.0);

    LevelProgress {
        current_level,
        steps_to_next_level,
        progress_percentage,
    }
}

/// Folds a finished session's step reading into a stored cumulative total.
///
/// A reading below the previous total is treated as a same-session
/// regression (sensor restarted mid-session) and added wholesale; otherwise
/// the reading replaces the total. Known approximation: a fresh session
/// whose counter baseline restarts near zero can double-count steps already
/// folded into `previous_total`.
pub fn merge_session_steps(previous_total: u32, session_steps: u32) -> u32 {
    if session_steps < previous_total {
        previous_total.saturating_add(session_steps)
    } else {
        session_steps
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProgressState {
    pokemon_levels: Vec<PokemonLevel>,
    current_pokemon_id: Option<String>,
}

pub struct ProgressStore {
    store: Arc<dyn DurableStore>,
    data: RwLock<ProgressState>,
}

impl ProgressStore {
    /// Rehydrates the store from the durable blob. Absent or malformed
    /// payloads degrade to the empty state; read failures are never fatal.
    pub fn load(store: Arc<dyn DurableStore>) -> Self {
        let data = match store.get(STORE_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                warn!("Discarding malformed progress payload: {err}");
                ProgressState::default()
            }),
            Ok(None) => ProgressState::default(),
            Err(err) => {
                warn!("Failed to read persisted progress, starting empty: {err}");
                ProgressState::default()
            }
        };

        Self {
            store,
            data: RwLock::new(data),
        }
    }

    pub fn get_level(&self, id: &str) -> Option<PokemonLevel> {
        let data = self.data.read().unwrap();
        data.pokemon_levels.iter().find(|p| p.id == id).cloned()
    }

    /// Upserts a record by id and persists the whole collection.
    pub fn set_level(&self, level: PokemonLevel) {
        let mut data = self.data.write().unwrap();
        match data.pokemon_levels.iter_mut().find(|p| p.id == level.id) {
            Some(existing) => *existing = level,
            None => data.pokemon_levels.push(level),
        }
        self.persist(&data);
    }

    pub fn current_pokemon(&self) -> Option<String> {
        self.data.read().unwrap().current_pokemon_id.clone()
    }

    pub fn set_current_pokemon(&self, id: Option<String>) {
        let mut data = self.data.write().unwrap();
        data.current_pokemon_id = id;
        self.persist(&data);
    }

    /// Folds a finished session into the stored record for `id` and returns
    /// the updated record. Creates the record on first power-up.
    pub fn apply_session_steps(&self, id: &str, session_steps: u32) -> PokemonLevel {
        let previous_total = self
            .get_level(id)
            .map(|level| level.total_steps())
            .unwrap_or(0);
        let total = merge_session_steps(previous_total, session_steps);
        let progress = calculate_progress(total);

        let record = PokemonLevel {
            id: id.to_string(),
            level: progress.current_level,
            steps_to_next_level: progress.steps_to_next_level,
        };
        self.set_level(record.clone());
        record
    }

    /// Clears all records and the current pointer back to the empty state.
    pub fn reset(&self) {
        let mut data = self.data.write().unwrap();
        *data = ProgressState::default();
        self.persist(&data);
    }

    // Writes are fire-and-forget: one retry, then the in-memory state stays
    // authoritative until the next successful write reconciles.
    fn persist(&self, data: &ProgressState) {
        let serialized = match serde_json::to_string(data) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!("Failed to serialize progress state: {err}");
                return;
            }
        };

        if let Err(err) = self.write_blob(&serialized) {
            warn!("Progress write failed, retrying once: {err}");
            if let Err(err) = self.write_blob(&serialized) {
                error!("Progress write failed after retry; keeping in-memory state: {err}");
            }
        }
    }

    fn write_blob(&self, serialized: &str) -> Result<()> {
        self.store.set(STORE_KEY, serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::testing::MemoryStore;

    fn empty_store() -> ProgressStore {
        ProgressStore::load(Arc::new(MemoryStore::new()))
    }

    fn record(id: &str, level: u32, steps: u32) -> PokemonLevel {
        PokemonLevel {
            id: id.to_string(),
            level,
            steps_to_next_level: steps,
        }
    }

    #[test]
    fn level_formula_holds_for_small_totals() {
        for total in 0..=1_000 {
            let progress = calculate_progress(total);
            assert_eq!(progress.current_level, total / STEPS_PER_LEVEL + 1);
            assert!(progress.steps_to_next_level < STEPS_PER_LEVEL);
            assert!((0.0..=100.0).contains(&progress.progress_percentage));
        }
    }

    #[test]
    fn record_total_roundtrips_through_formula() {
        for total in [0, 1, 99, 100, 250, 12_345] {
            let progress = calculate_progress(total);
            let rec = record("any", progress.current_level, progress.steps_to_next_level);
            assert_eq!(rec.total_steps(), total);
        }
    }

    #[test]
    fn merge_replaces_when_reading_is_not_behind() {
        assert_eq!(merge_session_steps(0, 250), 250);
        assert_eq!(merge_session_steps(50, 60), 60);
    }

    #[test]
    fn merge_adds_when_reading_regresses() {
        // Sensor restarted mid-session: the low reading is new walking.
        assert_eq!(merge_session_steps(200, 60), 260);
    }

    #[test]
    fn set_then_get_returns_the_exact_record() {
        let store = empty_store();
        let rec = record("bulbasaur", 4, 20);
        store.set_level(rec.clone());
        assert_eq!(store.get_level("bulbasaur"), Some(rec));
    }

    #[test]
    fn second_upsert_wins_and_leaves_one_record() {
        let backing = Arc::new(MemoryStore::new());
        let store = ProgressStore::load(backing.clone());

        store.set_level(record("eevee", 1, 10));
        store.set_level(record("eevee", 2, 0));

        assert_eq!(store.get_level("eevee"), Some(record("eevee", 2, 0)));

        // Exactly one record persisted for the id.
        let reloaded = ProgressStore::load(backing);
        let data = reloaded.data.read().unwrap();
        assert_eq!(
            data.pokemon_levels
                .iter()
                .filter(|p| p.id == "eevee")
                .count(),
            1
        );
    }

    #[test]
    fn reset_clears_records_and_pointer() {
        let store = empty_store();
        store.set_level(record("mew", 3, 5));
        store.set_current_pokemon(Some("mew".to_string()));

        store.reset();

        assert_eq!(store.get_level("mew"), None);
        assert_eq!(store.current_pokemon(), None);
    }

    #[test]
    fn one_session_of_250_steps_reaches_level_3_and_survives_reload() {
        let backing = Arc::new(MemoryStore::new());
        let store = ProgressStore::load(backing.clone());

        assert_eq!(store.get_level("pikachu"), None);
        let committed = store.apply_session_steps("pikachu", 250);
        assert_eq!(committed, record("pikachu", 3, 50));

        let reloaded = ProgressStore::load(backing);
        assert_eq!(reloaded.get_level("pikachu"), Some(record("pikachu", 3, 50)));
    }

    #[test]
    fn consecutive_sessions_accumulate_through_merge_rule() {
        let store = empty_store();
        store.apply_session_steps("pikachu", 250);
        // 80 < 250, so the regression branch adds it wholesale.
        let updated = store.apply_session_steps("pikachu", 80);
        assert_eq!(updated, record("pikachu", 4, 30));
    }

    #[test]
    fn malformed_payload_degrades_to_empty() {
        let backing = Arc::new(MemoryStore::new());
        backing.put("pokemon-levels-storage", "{not json");

        let store = ProgressStore::load(backing);
        assert_eq!(store.get_level("pikachu"), None);
        assert_eq!(store.current_pokemon(), None);
    }

    #[test]
    fn write_failures_keep_in_memory_state_authoritative() {
        let store = ProgressStore::load(Arc::new(MemoryStore::failing()));
        store.set_level(record("snorlax", 2, 40));
        assert_eq!(store.get_level("snorlax"), Some(record("snorlax", 2, 40)));
    }

    #[test]
    fn current_pokemon_pointer_persists() {
        let backing = Arc::new(MemoryStore::new());
        let store = ProgressStore::load(backing.clone());
        store.set_current_pokemon(Some("charmander".to_string()));

        let reloaded = ProgressStore::load(backing);
        assert_eq!(reloaded.current_pokemon().as_deref(), Some("charmander"));
    }
}
