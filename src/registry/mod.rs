//! Persistent device registry.
//!
//! Maps a host identifier to its credentials and brand. Every operation takes
//! the registry lock for exactly its own duration: readers share it, writers
//! hold it alone, and a write is only visible once the backend has persisted it.
//!
//! Two surfaces are offered over the same storage:
//!
//! - the `try_*` methods return [`StorageError`] so callers can tell a missing
//!   device from an unreachable backend;
//! - the plain methods log storage failures and report them as "not found" /
//!   "operation failed", which is what existing callers of the registry expect.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::RwLock;

use log::{debug, error};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;

pub use store::{DeviceStore, JsonFileStore, MemoryStore};

/// Brand stored when none is supplied.
pub const DEFAULT_BRAND: &str = "Unknown";

fn default_brand() -> String {
    DEFAULT_BRAND.to_string()
}

/// One registered device.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceRecord {
    /// IP address or logical name; unique within the registry.
    pub host: String,
    pub username: String,
    pub password: String,
    /// Free-form vendor tag such as `Cisco` or `Arista`.
    #[serde(default = "default_brand")]
    pub brand: String,
}

impl DeviceRecord {
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        let brand = brand.into();
        Self {
            host: host.into(),
            username: username.into(),
            password: password.into(),
            brand: if brand.is_empty() {
                default_brand()
            } else {
                brand
            },
        }
    }

    /// The password with every character replaced by `*`.
    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }
}

impl fmt::Debug for DeviceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceRecord")
            .field("host", &self.host)
            .field("username", &self.username)
            .field("password", &self.masked_password())
            .field("brand", &self.brand)
            .finish()
    }
}

/// Partial update; empty strings count as "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceUpdate {
    pub username: Option<String>,
    pub password: Option<String>,
    pub brand: Option<String>,
}

impl DeviceUpdate {
    pub fn brand(brand: impl Into<String>) -> Self {
        Self {
            brand: Some(brand.into()),
            ..Default::default()
        }
    }

    fn supplied(value: &Option<String>) -> Option<&str> {
        value.as_deref().filter(|v| !v.is_empty())
    }

    fn is_empty(&self) -> bool {
        Self::supplied(&self.username).is_none()
            && Self::supplied(&self.password).is_none()
            && Self::supplied(&self.brand).is_none()
    }
}

/// Transforms passwords on their way to and from the backend.
///
/// The registry stores plaintext by default; an at-rest encryption scheme can
/// be plugged in here without changing any registry operation.
pub trait SecretCodec: Send + Sync {
    fn encode(&self, plain: &str) -> Result<String, StorageError>;
    fn decode(&self, stored: &str) -> Result<String, StorageError>;
}

/// Stores passwords as given.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCodec;

impl SecretCodec for PlaintextCodec {
    fn encode(&self, plain: &str) -> Result<String, StorageError> {
        Ok(plain.to_string())
    }

    fn decode(&self, stored: &str) -> Result<String, StorageError> {
        Ok(stored.to_string())
    }
}

/// Lock-protected device registry over a [`DeviceStore`].
pub struct DeviceRegistry {
    store: RwLock<Box<dyn DeviceStore>>,
    codec: Box<dyn SecretCodec>,
}

impl DeviceRegistry {
    pub fn with_store(store: impl DeviceStore + 'static) -> Self {
        Self {
            store: RwLock::new(Box::new(store)),
            codec: Box::new(PlaintextCodec),
        }
    }

    /// Registry persisted as a JSON file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_store(JsonFileStore::new(path))
    }

    /// Registry that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::with_store(MemoryStore::default())
    }

    pub fn with_codec(mut self, codec: impl SecretCodec + 'static) -> Self {
        self.codec = Box::new(codec);
        self
    }

    fn read<T>(
        &self,
        f: impl FnOnce(&BTreeMap<String, DeviceRecord>) -> T,
    ) -> Result<T, StorageError> {
        let store = self.store.read().map_err(|_| StorageError::Poisoned)?;
        let devices = store.load()?;
        Ok(f(&devices))
    }

    /// Runs one load-modify-save cycle under the write lock; the backend
    /// serializes it against writers outside this registry.
    fn write(
        &self,
        mut f: impl FnMut(&mut BTreeMap<String, DeviceRecord>) -> Result<bool, StorageError>,
    ) -> Result<bool, StorageError> {
        let mut store = self.store.write().map_err(|_| StorageError::Poisoned)?;
        store.modify(&mut f)
    }

    fn reveal(&self, record: &DeviceRecord) -> Result<DeviceRecord, StorageError> {
        Ok(DeviceRecord {
            password: self.codec.decode(&record.password)?,
            ..record.clone()
        })
    }

    /// Inserts or replaces the record for `host`.
    pub fn try_upsert(
        &self,
        host: &str,
        username: &str,
        password: &str,
        brand: &str,
    ) -> Result<(), StorageError> {
        let stored = self.codec.encode(password)?;
        let record = DeviceRecord::new(host, username, stored, brand);
        self.write(|devices| {
            devices.insert(host.to_string(), record.clone());
            Ok(true)
        })?;
        debug!("Registry upsert: {}", host);
        Ok(())
    }

    /// Exact-match lookup.
    pub fn try_lookup(&self, host: &str) -> Result<Option<DeviceRecord>, StorageError> {
        self.read(|devices| devices.get(host).cloned())?
            .map(|record| self.reveal(&record))
            .transpose()
    }

    /// Applies the non-empty fields of `update`; `Ok(false)` when the host is
    /// absent or nothing was supplied.
    pub fn try_update(&self, host: &str, update: &DeviceUpdate) -> Result<bool, StorageError> {
        if update.is_empty() {
            return Ok(false);
        }
        let password = DeviceUpdate::supplied(&update.password)
            .map(|p| self.codec.encode(p))
            .transpose()?;
        self.write(|devices| {
            let Some(record) = devices.get_mut(host) else {
                return Ok(false);
            };
            if let Some(username) = DeviceUpdate::supplied(&update.username) {
                record.username = username.to_string();
            }
            if let Some(password) = &password {
                record.password = password.clone();
            }
            if let Some(brand) = DeviceUpdate::supplied(&update.brand) {
                record.brand = brand.to_string();
            }
            Ok(true)
        })
    }

    /// Removes `host`; `Ok(false)` when it was not registered.
    pub fn try_delete(&self, host: &str) -> Result<bool, StorageError> {
        self.write(|devices| Ok(devices.remove(host).is_some()))
    }

    /// Records whose host or username contains `keyword` (ASCII
    /// case-insensitive), ordered by host.
    pub fn try_search(&self, keyword: &str) -> Result<Vec<DeviceRecord>, StorageError> {
        let needle = keyword.to_ascii_lowercase();
        self.read(|devices| {
            devices
                .values()
                .filter(|r| {
                    r.host.to_ascii_lowercase().contains(&needle)
                        || r.username.to_ascii_lowercase().contains(&needle)
                })
                .cloned()
                .collect::<Vec<_>>()
        })?
        .iter()
        .map(|record| self.reveal(record))
        .collect()
    }

    /// Every record, ordered by host.
    pub fn try_list_all(&self) -> Result<Vec<DeviceRecord>, StorageError> {
        self.read(|devices| devices.values().cloned().collect::<Vec<_>>())?
            .iter()
            .map(|record| self.reveal(record))
            .collect()
    }

    pub fn upsert(&self, host: &str, username: &str, password: &str, brand: &str) -> bool {
        let result = self.try_upsert(host, username, password, brand);
        swallow("add device", host, result.map(|_| true))
    }

    pub fn lookup(&self, host: &str) -> Option<DeviceRecord> {
        swallow("get device", host, self.try_lookup(host))
    }

    pub fn update(&self, host: &str, update: &DeviceUpdate) -> bool {
        swallow("update device", host, self.try_update(host, update))
    }

    pub fn delete(&self, host: &str) -> bool {
        swallow("delete device", host, self.try_delete(host))
    }

    pub fn search(&self, keyword: &str) -> Vec<DeviceRecord> {
        swallow("search devices", keyword, self.try_search(keyword))
    }

    pub fn list_all(&self) -> Vec<DeviceRecord> {
        swallow("list devices", "*", self.try_list_all())
    }
}

fn swallow<T: Default>(op: &str, key: &str, result: Result<T, StorageError>) -> T {
    result.unwrap_or_else(|err| {
        error!("Failed to {} '{}': {}", op, key, err);
        T::default()
    })
}

mod store;
