//! Persistent profile store.
//!
//! The store owns every [`Profile`]. It caches the map in memory and writes
//! the whole map back through a [`KeyValueStorage`] on every `put`; there are
//! no partial updates and no transactions.

mod backend;

pub use backend::{FileStorage, KeyValueStorage, MemoryStorage};

use crate::error::{Result, ScanError};
use crate::profile::{Profile, ProfileMap};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

pub struct ProfileStore {
    storage: Box<dyn KeyValueStorage>,
    key: String,
    profiles: BTreeMap<String, Profile>,
}

impl ProfileStore {
    /// Open the store and load whatever is persisted under `key`
    pub fn open(storage: Box<dyn KeyValueStorage>, key: impl Into<String>) -> Result<Self> {
        let key = key.into();
        let map = load_map(storage.as_ref(), &key)?;

        let profiles: BTreeMap<String, Profile> = map
            .into_iter()
            .map(|(barcode, record)| {
                let profile = Profile::from_record(barcode.clone(), record);
                (barcode, profile)
            })
            .collect();

        let without_history = profiles.values().filter(|p| p.scan_count() == 0).count();
        if without_history > 0 {
            warn!(
                "{} stored profile(s) have no scan history; it will start on the next scan",
                without_history
            );
        }

        info!("Profile store opened with {} profile(s)", profiles.len());

        Ok(Self {
            storage,
            key,
            profiles,
        })
    }

    /// In-memory store, used by tests and dry runs
    pub fn in_memory() -> Self {
        Self {
            storage: Box::new(MemoryStorage::new()),
            key: "barcodeUsers".to_string(),
            profiles: BTreeMap::new(),
        }
    }

    pub fn get(&self, barcode: &str) -> Option<Profile> {
        self.profiles.get(barcode).cloned()
    }

    pub fn contains(&self, barcode: &str) -> bool {
        self.profiles.contains_key(barcode)
    }

    /// Store `profile` under its barcode, replacing any previous value, and
    /// persist the whole map.
    pub fn put(&mut self, profile: Profile) -> Result<()> {
        let barcode = profile.barcode().to_string();
        let previous = self.profiles.insert(barcode.clone(), profile);

        if let Err(e) = self.save() {
            // Keep the cache in step with what is actually persisted
            match previous {
                Some(previous) => {
                    self.profiles.insert(barcode, previous);
                }
                None => {
                    self.profiles.remove(&barcode);
                }
            }
            error!("Failed to persist profiles: {}", e);
            return Err(e);
        }

        debug!("Stored profile {}", barcode);
        Ok(())
    }

    /// Append a scan to an existing profile and persist it.
    ///
    /// Returns the updated profile, or `None` if the barcode is unknown.
    pub fn record_scan(&mut self, barcode: &str, at: DateTime<Utc>) -> Result<Option<Profile>> {
        let Some(mut profile) = self.get(barcode) else {
            return Ok(None);
        };

        let stored_at = profile.record_scan(at);
        self.put(profile.clone())?;

        debug!(
            "Recorded scan #{} for {} at {}",
            profile.scan_count(),
            barcode,
            stored_at
        );
        Ok(Some(profile))
    }

    /// All profiles ordered by barcode
    pub fn list(&self) -> Vec<Profile> {
        self.profiles.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Snapshot of the persisted form
    pub fn to_map(&self) -> ProfileMap {
        self.profiles
            .iter()
            .map(|(barcode, profile)| (barcode.clone(), profile.to_record()))
            .collect()
    }

    fn save(&mut self) -> Result<()> {
        let map = self.to_map();
        save_map(self.storage.as_mut(), &self.key, &map)
    }
}

/// Read the whole map; a missing key is an empty map
pub fn load_map(storage: &dyn KeyValueStorage, key: &str) -> Result<ProfileMap> {
    match storage.get_item(key)? {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| {
            ScanError::storage(format!("Stored profiles under '{}' are unreadable: {}", key, e))
        }),
        None => Ok(ProfileMap::new()),
    }
}

/// Replace the whole map
pub fn save_map(storage: &mut dyn KeyValueStorage, key: &str, map: &ProfileMap) -> Result<()> {
    let raw = serde_json::to_string(map)
        .map_err(|e| ScanError::storage(format!("Failed to serialize profiles: {}", e)))?;
    storage.set_item(key, &raw)
}
