use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use super::*;

type Devices = BTreeMap<String, DeviceRecord>;

/// Persistence backend for [`DeviceRegistry`].
///
/// Within one registry `load` may run concurrently with other `load` calls and
/// `modify` always runs alone. Backends reachable from several registries or
/// processes must serialize `modify` themselves.
pub trait DeviceStore: Send + Sync {
    fn load(&self) -> Result<Devices, StorageError>;
    fn save(&mut self, devices: &Devices) -> Result<(), StorageError>;

    /// Loads, applies `f` and saves when `f` reports a change.
    fn modify(
        &mut self,
        f: &mut dyn FnMut(&mut Devices) -> Result<bool, StorageError>,
    ) -> Result<bool, StorageError> {
        let mut devices = self.load()?;
        if !f(&mut devices)? {
            return Ok(false);
        }
        self.save(&devices)?;
        Ok(true)
    }
}

/// In-process backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    devices: BTreeMap<String, DeviceRecord>,
}

impl DeviceStore for MemoryStore {
    fn load(&self) -> Result<Devices, StorageError> {
        Ok(self.devices.clone())
    }

    fn save(&mut self, devices: &Devices) -> Result<(), StorageError> {
        self.devices = devices.clone();
        Ok(())
    }
}

/// On-disk layout: one row per device.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RegistryDocument {
    #[serde(default)]
    devices: Vec<DeviceRecord>,
}

/// Backend persisted as a pretty-printed JSON document.
///
/// A missing file is an empty registry. Saves go to a uniquely named sibling
/// temp file that is renamed over the target, so readers only ever see a
/// complete document. Every load-modify-save cycle holds an exclusive advisory
/// lock on `<path>.lock`, which serializes writers across registries and
/// processes sharing the file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn parent_dir(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    fn lock_file(&self) -> Result<File, StorageError> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        let mut lock_path = self.path.clone().into_os_string();
        lock_path.push(".lock");
        OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(PathBuf::from(lock_path))
            .map_err(|e| self.io_error(e))
    }
}

impl DeviceStore for JsonFileStore {
    fn load(&self) -> Result<Devices, StorageError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let document: RegistryDocument = serde_json::from_str(&content)?;
        Ok(document
            .devices
            .into_iter()
            .map(|record| (record.host.clone(), record))
            .collect())
    }

    fn save(&mut self, devices: &Devices) -> Result<(), StorageError> {
        let parent = self.parent_dir();
        fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        let document = RegistryDocument {
            devices: devices.values().cloned().collect(),
        };
        let content = serde_json::to_string_pretty(&document)?;

        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| self.io_error(e))?;
        tmp.write_all(content.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| self.io_error(e))?;
        tmp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        debug!(
            "Registry saved {} devices to {}",
            devices.len(),
            self.path.display()
        );
        Ok(())
    }

    fn modify(
        &mut self,
        f: &mut dyn FnMut(&mut Devices) -> Result<bool, StorageError>,
    ) -> Result<bool, StorageError> {
        let mut lock = fd_lock::RwLock::new(self.lock_file()?);
        let _guard = lock.write().map_err(|e| self.io_error(e))?;

        let mut devices = self.load()?;
        if !f(&mut devices)? {
            return Ok(false);
        }
        self.save(&devices)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = JsonFileStore::new(dir.path().join("devices.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn records_survive_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("devices.json");

        let registry = DeviceRegistry::open(&path);
        assert!(registry.upsert("sw1", "admin", "pw", "Arista"));
        drop(registry);

        let reopened = DeviceRegistry::open(&path);
        let record = reopened.lookup("sw1").expect("persisted record");
        assert_eq!(record.brand, "Arista");

        let mut entries = fs::read_dir(path.parent().expect("parent"))
            .expect("read dir")
            .map(|entry| {
                let name = entry.expect("entry").file_name();
                name.to_string_lossy().into_owned()
            })
            .collect::<Vec<_>>();
        entries.sort();
        assert_eq!(entries, vec!["devices.json", "devices.json.lock"]);
    }

    #[test]
    fn rows_without_brand_load_as_unknown() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devices.json");
        fs::write(
            &path,
            r#"{"devices":[{"host":"10.0.0.1","username":"admin","password":"pw"}]}"#,
        )
        .expect("write legacy document");

        let registry = DeviceRegistry::open(&path);
        let record = registry.lookup("10.0.0.1").expect("record");
        assert_eq!(record.brand, DEFAULT_BRAND);
    }

    #[test]
    fn malformed_document_is_storage_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devices.json");
        fs::write(&path, "{not json").expect("write garbage");

        let registry = DeviceRegistry::open(&path);
        let err = registry.try_list_all().expect_err("garbage must fail");
        assert!(matches!(err, StorageError::Malformed(_)));
        assert!(registry.list_all().is_empty());
    }

    #[test]
    fn failed_write_leaves_document_untouched() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devices.json");
        fs::write(&path, "{not json").expect("write garbage");

        let registry = DeviceRegistry::open(&path);
        assert!(!registry.upsert("sw1", "admin", "pw", "Cisco"));
        assert_eq!(fs::read_to_string(&path).expect("read"), "{not json");
    }

    #[test]
    fn registries_sharing_a_file_keep_every_write() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devices.json");

        let writers = (0..2)
            .map(|writer| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let registry = DeviceRegistry::open(&path);
                    (0..100)
                        .filter(|i| {
                            let host = format!("w{writer}-{i}");
                            registry.upsert(&host, "admin", "pw", "Cisco")
                        })
                        .count()
                })
            })
            .collect::<Vec<_>>();
        let reported: usize = writers
            .into_iter()
            .map(|handle| handle.join().expect("writer thread"))
            .sum();

        assert_eq!(reported, 200);
        assert_eq!(DeviceRegistry::open(&path).list_all().len(), 200);
    }

    #[test]
    fn modify_without_change_does_not_create_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("devices.json");

        let registry = DeviceRegistry::open(&path);
        assert!(!registry.delete("sw1"));
        assert!(!path.exists());
    }
}
