// User history: recent searches, viewed buses, frequent buses and favorites
//
// The simulation core never touches this module. Front-ends load a record,
// apply one of the pure update operations and store it back through a
// `HistoryStore`.

use crate::sbt_models::{Result, SBTError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_RECENT: usize = 10;

// ============================================================================
// Record
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchEntry {
    pub id: String,
    pub source: String,
    pub destination: String,
    pub route_name: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusView {
    pub id: String,
    pub bus_id: String,
    pub route_id: String,
    pub route_name: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequentBus {
    pub bus_id: String,
    pub route_id: String,
    pub route_name: String,
    pub count: u32,
    pub last_viewed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Favorite {
    pub bus_id: String,
    pub route_id: String,
    pub route_name: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryRecord {
    pub recent_searches: Vec<SearchEntry>,
    pub recent_buses: Vec<BusView>,
    pub frequent_buses: Vec<FrequentBus>,
    pub favorites: Vec<Favorite>,
}

impl HistoryRecord {
    /// Most recent first, capped at MAX_RECENT.
    pub fn record_search(
        &mut self,
        source: &str,
        destination: &str,
        route_name: &str,
        now_ms: i64,
    ) {
        let entry = SearchEntry {
            id: format!("{}-{}-{}", source, destination, now_ms),
            source: source.to_string(),
            destination: destination.to_string(),
            route_name: route_name.to_string(),
            timestamp: now_ms,
        };
        self.recent_searches.insert(0, entry);
        self.recent_searches.truncate(MAX_RECENT);
    }

    /// Adds a recent view and bumps the bus's view count.
    pub fn record_bus_view(&mut self, bus_id: &str, route_id: &str, route_name: &str, now_ms: i64) {
        self.recent_buses.insert(
            0,
            BusView {
                id: format!("{}-{}", bus_id, now_ms),
                bus_id: bus_id.to_string(),
                route_id: route_id.to_string(),
                route_name: route_name.to_string(),
                timestamp: now_ms,
            },
        );
        self.recent_buses.truncate(MAX_RECENT);

        match self.frequent_buses.iter_mut().find(|b| b.bus_id == bus_id) {
            Some(existing) => {
                existing.count += 1;
                existing.last_viewed = now_ms;
            }
            None => self.frequent_buses.insert(
                0,
                FrequentBus {
                    bus_id: bus_id.to_string(),
                    route_id: route_id.to_string(),
                    route_name: route_name.to_string(),
                    count: 1,
                    last_viewed: now_ms,
                },
            ),
        }
        // stable: ties keep their order
        self.frequent_buses.sort_by(|a, b| b.count.cmp(&a.count));
        self.frequent_buses.truncate(MAX_RECENT);
    }

    /// Stars or unstars a bus. Returns true if it is now a favorite.
    pub fn toggle_favorite(
        &mut self,
        bus_id: &str,
        route_id: &str,
        route_name: &str,
        now_ms: i64,
    ) -> bool {
        if self.is_favorite(bus_id) {
            self.remove_favorite(bus_id);
            false
        } else {
            self.favorites.insert(
                0,
                Favorite {
                    bus_id: bus_id.to_string(),
                    route_id: route_id.to_string(),
                    route_name: route_name.to_string(),
                    timestamp: now_ms,
                },
            );
            true
        }
    }

    pub fn is_favorite(&self, bus_id: &str) -> bool {
        self.favorites.iter().any(|f| f.bus_id == bus_id)
    }

    pub fn remove_favorite(&mut self, bus_id: &str) {
        self.favorites.retain(|f| f.bus_id != bus_id);
    }

    pub fn remove_search(&mut self, search_id: &str) {
        self.recent_searches.retain(|s| s.id != search_id);
    }

    pub fn remove_bus_view(&mut self, view_id: &str) {
        self.recent_buses.retain(|b| b.id != view_id);
    }

    /// Clears searches and viewed buses. Favorites are kept.
    pub fn clear(&mut self) {
        self.recent_searches.clear();
        self.recent_buses.clear();
        self.frequent_buses.clear();
    }
}

// ============================================================================
// Stores
// ============================================================================

pub trait HistoryStore {
    fn get(&self, user_id: &str) -> Result<Option<HistoryRecord>>;
    fn put(&mut self, user_id: &str, record: HistoryRecord) -> Result<()>;

    /// Loads (or starts) a record, applies `update` and stores the result.
    fn update<F>(&mut self, user_id: &str, update: F) -> Result<HistoryRecord>
    where
        F: FnOnce(&mut HistoryRecord),
        Self: Sized,
    {
        let mut record = self.get(user_id)?.unwrap_or_default();
        update(&mut record);
        self.put(user_id, record.clone())?;
        Ok(record)
    }
}

#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: HashMap<String, HistoryRecord>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HistoryStore for MemoryHistoryStore {
    fn get(&self, user_id: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.records.get(user_id).cloned())
    }

    fn put(&mut self, user_id: &str, record: HistoryRecord) -> Result<()> {
        self.records.insert(user_id.to_string(), record);
        Ok(())
    }
}

/// All users' records in one pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileHistoryStore {
    path: PathBuf,
}

impl JsonFileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileHistoryStore { path: path.into() }
    }

    /// `<data dir>/smart_bus_tracker/history.json`
    pub fn default_path() -> PathBuf {
        let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        path.push("smart_bus_tracker");
        path.push("history.json");
        path
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_all(&self) -> Result<HashMap<String, HistoryRecord>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| SBTError::FileError(format!("Failed to read history: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| SBTError::ParseError(format!("Invalid history file: {}", e)))
    }
}

impl HistoryStore for JsonFileHistoryStore {
    fn get(&self, user_id: &str) -> Result<Option<HistoryRecord>> {
        Ok(self.load_all()?.remove(user_id))
    }

    fn put(&mut self, user_id: &str, record: HistoryRecord) -> Result<()> {
        let mut all = self.load_all()?;
        all.insert(user_id.to_string(), record);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| SBTError::FileError(format!("Failed to create history dir: {}", e)))?;
        }
        let json = serde_json::to_string_pretty(&all)
            .map_err(|e| SBTError::FileError(format!("Failed to serialize history: {}", e)))?;
        fs::write(&self.path, json)
            .map_err(|e| SBTError::FileError(format!("Failed to write history: {}", e)))?;

        log::debug!("History for {} saved to {:?}", user_id, self.path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn searches_are_capped_and_newest_first() {
        let mut record = HistoryRecord::default();
        for i in 0..12 {
            record.record_search("Majestic", "Hebbal", "Bengaluru → Chikkaballapur", i);
        }
        assert_eq!(record.recent_searches.len(), MAX_RECENT);
        assert_eq!(record.recent_searches[0].timestamp, 11);

        let id = record.recent_searches[0].id.clone();
        record.remove_search(&id);
        assert_eq!(record.recent_searches[0].timestamp, 10);
    }

    #[test]
    fn frequent_buses_sorted_by_view_count() {
        let mut record = HistoryRecord::default();
        record.record_bus_view("A", "r", "R", 1);
        record.record_bus_view("B", "r", "R", 2);
        record.record_bus_view("B", "r", "R", 3);

        assert_eq!(record.recent_buses.len(), 3);
        assert_eq!(record.frequent_buses[0].bus_id, "B");
        assert_eq!(record.frequent_buses[0].count, 2);
        assert_eq!(record.frequent_buses[0].last_viewed, 3);
        assert_eq!(record.frequent_buses[1].bus_id, "A");
    }

    #[test]
    fn favorites_toggle_and_survive_clear() {
        let mut record = HistoryRecord::default();
        assert!(record.toggle_favorite("A", "r", "R", 1));
        record.record_search("x", "y", "R", 2);
        record.clear();
        assert!(record.recent_searches.is_empty());
        assert!(record.is_favorite("A"));
        assert!(!record.toggle_favorite("A", "r", "R", 3));
        assert!(record.favorites.is_empty());
    }

    #[test]
    fn memory_store_update_round_trip() {
        let mut store = MemoryHistoryStore::new();
        assert!(store.get("u1").unwrap().is_none());
        store
            .update("u1", |r| r.record_bus_view("KA01 F 5521", "r", "R", 5))
            .unwrap();
        let record = store.get("u1").unwrap().unwrap();
        assert_eq!(record.recent_buses[0].bus_id, "KA01 F 5521");
    }

    #[test]
    fn file_store_persists_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("history.json");
        let mut store = JsonFileHistoryStore::new(&path);

        store.update("u1", |r| { r.toggle_favorite("A", "r", "R", 1); }).unwrap();
        store.update("u2", |r| r.record_search("x", "y", "R", 2)).unwrap();

        let reopened = JsonFileHistoryStore::new(&path);
        assert!(reopened.get("u1").unwrap().unwrap().is_favorite("A"));
        assert_eq!(reopened.get("u2").unwrap().unwrap().recent_searches.len(), 1);
        assert!(reopened.get("u3").unwrap().is_none());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.json");
        fs::write(&path, "not json").unwrap();
        let store = JsonFileHistoryStore::new(&path);
        assert!(matches!(store.get("u1"), Err(SBTError::ParseError(_))));
    }
}
