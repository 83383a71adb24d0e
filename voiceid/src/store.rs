//! Enrollment-template persistence boundary.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;

use parking_lot::Mutex;

use crate::error::StoreError;
use crate::template::TemplateMode;

/// Persisted enrollment templates, keyed by template mode.
///
/// External collaborator boundary: the verify task loads from it
/// synchronously, enrollment flows save through it. Absent or corrupt data
/// surfaces as an error, never a panic.
pub trait TemplateStore: Send + Sync {
    /// Loads the serialized enrollment template for `mode`.
    fn load(&self, mode: TemplateMode) -> Result<Vec<u8>, StoreError>;

    /// Persists the serialized enrollment template for `mode`, replacing any
    /// previous one.
    fn save(&self, mode: TemplateMode, template: &[u8]) -> Result<(), StoreError>;
}

/// In-memory store for tests and demos.
#[derive(Default)]
pub struct MemoryTemplateStore {
    templates: Mutex<HashMap<TemplateMode, Vec<u8>>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TemplateStore for MemoryTemplateStore {
    fn load(&self, mode: TemplateMode) -> Result<Vec<u8>, StoreError> {
        self.templates
            .lock()
            .get(&mode)
            .cloned()
            .ok_or(StoreError::NotFound { mode })
    }

    fn save(&self, mode: TemplateMode, template: &[u8]) -> Result<(), StoreError> {
        self.templates.lock().insert(mode, template.to_vec());
        Ok(())
    }
}

/// Directory-backed store: one file per mode.
pub struct FileTemplateStore {
    dir: PathBuf,
}

impl FileTemplateStore {
    /// Opens a store rooted at `dir`, creating the directory if missing.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, mode: TemplateMode) -> PathBuf {
        self.dir.join(format!("enroll-{mode}.bin"))
    }
}

impl TemplateStore for FileTemplateStore {
    fn load(&self, mode: TemplateMode) -> Result<Vec<u8>, StoreError> {
        match fs::read(self.path_for(mode)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                Err(StoreError::NotFound { mode })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn save(&self, mode: TemplateMode, template: &[u8]) -> Result<(), StoreError> {
        fs::write(self.path_for(mode), template)?;
        Ok(())
    }
}
