//! Whole-document text storage used by the fixer.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::err_msg;
use crate::errors::TesterError;

pub trait TextStore {
    fn read(&self, path: &Path) -> Result<String, TesterError>;
    fn write(&mut self, path: &Path, text: &str) -> Result<(), TesterError>;
}

/// Reads and writes files on disk.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStore;

impl TextStore for FileStore {
    fn read(&self, path: &Path) -> Result<String, TesterError> {
        fs::read_to_string(path)
            .map_err(|e| err_msg!(FixStructural, "couldn't read '{}': {}", path.display(), e))
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), TesterError> {
        fs::write(path, text)
            .map_err(|e| err_msg!(FixStructural, "couldn't write '{}': {}", path.display(), e))
    }
}

/// In-memory documents. Clones share the same contents.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<PathBuf, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, path: impl Into<PathBuf>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }

    pub fn insert(&self, path: impl Into<PathBuf>, text: impl Into<String>) {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(path.into(), text.into());
    }

    pub fn get(&self, path: impl AsRef<Path>) -> Option<String> {
        self.documents
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(path.as_ref())
            .cloned()
    }
}

impl TextStore for MemoryStore {
    fn read(&self, path: &Path) -> Result<String, TesterError> {
        self.get(path)
            .ok_or_else(|| err_msg!(FixStructural, "couldn't read '{}': no such document", path.display()))
    }

    fn write(&mut self, path: &Path, text: &str) -> Result<(), TesterError> {
        self.insert(path, text);
        Ok(())
    }
}
