//! The application-state store.
//!
//! Holds exactly one [`AppState`] record with full-replace update
//! semantics. All access is serialized by a single lock scoped to the
//! store; the lock is held only across the in-memory/disk transition,
//! never across a network call.

use std::sync::{Mutex, PoisonError};

use chrono::Utc;
use serde_json::Value;

use crate::defaults;
use crate::models::AppState;
use crate::storage::{Backend, JsonFileBackend, StoreError};

pub struct StateStore {
    backend: Box<dyn Backend>,
    lock: Mutex<()>,
}

impl StateStore {
    /// Creates a store over an injected storage backend.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            lock: Mutex::new(()),
        }
    }

    /// Convenience constructor for the durable JSON-file backend.
    pub fn json_file(path: impl Into<std::path::PathBuf>) -> Self {
        Self::new(Box::new(JsonFileBackend::new(path)))
    }

    /// Returns the current singleton record.
    ///
    /// When no record exists yet this returns the zero-value state (empty
    /// inventory, empty report object, null photo, no timestamp) without
    /// persisting anything as a side effect.
    pub fn load(&self) -> Result<AppState, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.load_unlocked()
    }

    fn load_unlocked(&self) -> Result<AppState, StoreError> {
        match self.backend.load()? {
            Some(doc) => Ok(serde_json::from_value(doc)?),
            None => Ok(AppState::default()),
        }
    }

    /// Validates and applies a partial update, fully replacing the record.
    ///
    /// Fields absent from `payload` keep their persisted value; fields
    /// explicitly present overwrite, including `"photo": null`. A present
    /// `inventory` must be an array, `report` an object, `photo` an object
    /// or null; any shape violation fails with
    /// [`StoreError::Validation`] and persists nothing. On success the new
    /// record is written atomically with a fresh `updated_at` and returned.
    pub fn replace(&self, payload: &Value) -> Result<AppState, StoreError> {
        let body = payload
            .as_object()
            .ok_or_else(|| StoreError::Validation("payload must be a JSON object".to_string()))?;

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let base = self.load_unlocked()?;

        let inventory = body
            .get("inventory")
            .cloned()
            .unwrap_or(Value::Array(base.inventory));
        let report = body.get("report").cloned().unwrap_or(base.report);
        let photo = body.get("photo").cloned().unwrap_or(base.photo);

        if !inventory.is_null() && !inventory.is_array() {
            return Err(StoreError::Validation(
                "inventory must be an array".to_string(),
            ));
        }
        if !report.is_null() && !report.is_object() {
            return Err(StoreError::Validation(
                "report must be an object".to_string(),
            ));
        }
        if !photo.is_null() && !photo.is_object() {
            return Err(StoreError::Validation(
                "photo must be an object or null".to_string(),
            ));
        }

        // Explicit nulls for inventory/report collapse to their empty shape.
        let state = AppState {
            inventory: match inventory {
                Value::Array(items) => items,
                _ => Vec::new(),
            },
            report: if report.is_object() {
                report
            } else {
                Value::Object(serde_json::Map::new())
            },
            photo,
            updated_at: Some(Utc::now()),
        };

        self.backend.store(&serde_json::to_value(&state)?)?;
        Ok(state)
    }

    /// Seeds the default ingredient list on first startup.
    ///
    /// When the persisted inventory is empty, writes a record containing
    /// the fixed default list with fresh unique ids and `current = ideal`
    /// for every item. Otherwise leaves the record untouched. Returns the
    /// resulting state either way.
    pub fn initialize(&self) -> Result<AppState, StoreError> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut state = self.load_unlocked()?;
        if state.inventory.is_empty() {
            state.inventory = defaults::seed_inventory()
                .into_iter()
                .map(serde_json::to_value)
                .collect::<Result<_, _>>()?;
            state.updated_at = Some(Utc::now());
            self.backend.store(&serde_json::to_value(&state)?)?;
        }
        Ok(state)
    }
}
