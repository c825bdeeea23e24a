use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::StorageError;

/**
 * \brief Whole-document record store: every read returns the full sequence and every
 *        write replaces it.
 */
pub trait RecordStore<T>: Send + Sync {
    /**
     * \brief Read all records. A store that does not exist yet is created empty.
     */
    fn load(&self) -> Result<Vec<T>, StorageError>;

    /**
     * \brief Overwrite the store with `records`.
     */
    fn save(&self, records: &[T]) -> Result<(), StorageError>;
}

/**
 * \brief JSON array on disk, pretty printed with two-space indentation.
 */
pub struct JsonFileStore<T> {
    path: PathBuf,
    _records: PhantomData<fn() -> T>,
}

impl<T> JsonFileStore<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn write_document(&self, document: &str) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| self.io_err(e))?;
            }
        }
        std::fs::write(&self.path, document).map_err(|e| self.io_err(e))
    }
}

impl<T> RecordStore<T> for JsonFileStore<T>
where
    T: Serialize + DeserializeOwned,
{
    fn load(&self) -> Result<Vec<T>, StorageError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                self.write_document("[]")?;
                return Ok(Vec::new());
            }
            Err(e) => return Err(self.io_err(e)),
        };
        serde_json::from_str(&contents).map_err(|source| StorageError::Decode {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, records: &[T]) -> Result<(), StorageError> {
        let document = serde_json::to_string_pretty(records).map_err(StorageError::Encode)?;
        self.write_document(&document)
    }
}

/**
 * \brief In-process store used by tests and throwaway sessions.
 */
pub struct MemoryStore<T> {
    records: Mutex<Vec<T>>,
}

impl<T> MemoryStore<T> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<T>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> RecordStore<T> for MemoryStore<T>
where
    T: Clone + Send,
{
    fn load(&self) -> Result<Vec<T>, StorageError> {
        let guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.clone())
    }

    fn save(&self, records: &[T]) -> Result<(), StorageError> {
        let mut guard = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = records.to_vec();
        Ok(())
    }
}
