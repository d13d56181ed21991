use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::NamedTempFile;
use wamsg_core::{ProviderKind, StoreError, TemplateKey, TemplateRecord, TemplateStore};

/// Template store persisted as one pretty-printed JSON array.
///
/// Every commit rewrites the file through a temporary sibling so a crash never
/// leaves a half-written store behind.
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<BTreeMap<TemplateKey, TemplateRecord>>,
}

impl JsonFileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => serde_json::from_slice::<Vec<TemplateRecord>>(&bytes)?
                .into_iter()
                .map(|record| (record.key.clone(), record))
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(err.into()),
        };
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<TemplateKey, TemplateRecord>>, StoreError> {
        self.records
            .lock()
            .map_err(|_| StoreError::Backend("template store lock poisoned".into()))
    }

    fn flush(&self, records: &BTreeMap<TemplateKey, TemplateRecord>) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let values: Vec<&TemplateRecord> = records.values().collect();
        let mut file = NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, &values)?;
        file.write_all(b"\n")?;
        file.persist(&self.path).map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }
}

impl TemplateStore for JsonFileStore {
    fn read(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn commit(&self, record: TemplateRecord) -> Result<(), StoreError> {
        let mut records = self.lock()?;
        let previous = records.insert(record.key.clone(), record.clone());
        if let Err(err) = self.flush(&records) {
            // Keep memory consistent with what is on disk.
            match previous {
                Some(previous) => records.insert(record.key.clone(), previous),
                None => records.remove(&record.key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn remove(&self, key: &TemplateKey) -> Result<Option<TemplateRecord>, StoreError> {
        let mut records = self.lock()?;
        let Some(removed) = records.remove(key) else {
            return Ok(None);
        };
        if let Err(err) = self.flush(&records) {
            records.insert(key.clone(), removed);
            return Err(err);
        }
        Ok(Some(removed))
    }

    fn list(&self, provider: ProviderKind) -> Result<Vec<TemplateRecord>, StoreError> {
        Ok(self
            .lock()?
            .values()
            .filter(|record| record.key.provider == provider)
            .cloned()
            .collect())
    }
}
