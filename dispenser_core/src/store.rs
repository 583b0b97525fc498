//! Persistent calibration slot implementations.
use std::path::{Path, PathBuf};

use dispenser_traits::{BoxError, CalibrationStore};
use serde::{Deserialize, Serialize};

use crate::atomic::write_atomic;

#[derive(Debug, Serialize, Deserialize)]
struct Slot {
    revolutions_per_ml: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    calibration: Slot,
}

/// Calibration slot kept in a small TOML file:
///
/// ```toml
/// [calibration]
/// revolutions_per_ml = 2.0
/// ```
///
/// Writes go through `write_atomic`, so losing power mid-write keeps the
/// previous value.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CalibrationStore for FileStore {
    fn load(&self) -> Result<Option<f32>, BoxError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let file: StoreFile = toml::from_str(&text)?;
        Ok(Some(file.calibration.revolutions_per_ml))
    }

    fn store(&mut self, revolutions_per_ml: f32) -> Result<(), BoxError> {
        let body = toml::to_string(&StoreFile {
            calibration: Slot { revolutions_per_ml },
        })?;
        write_atomic(&self.path, body.as_bytes())?;
        Ok(())
    }
}

/// In-memory slot for simulation and tests.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    slot: Option<f32>,
    writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(v: f32) -> Self {
        Self {
            slot: Some(v),
            writes: 0,
        }
    }

    /// Number of completed `store` calls.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl CalibrationStore for MemoryStore {
    fn load(&self) -> Result<Option<f32>, BoxError> {
        Ok(self.slot)
    }

    fn store(&mut self, revolutions_per_ml: f32) -> Result<(), BoxError> {
        self.slot = Some(revolutions_per_ml);
        self.writes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_store_round_trips_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = FileStore::new(dir.path().join("nested").join("cal.toml"));
        assert_eq!(s.load().unwrap(), None);
        s.store(2.0).unwrap();
        assert_eq!(s.load().unwrap(), Some(2.0));
        s.store(0.5).unwrap();
        assert_eq!(s.load().unwrap(), Some(0.5));
        assert!(!s.path().with_extension("new").exists());
    }

    #[test]
    fn file_store_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.toml");
        std::fs::write(&path, "not = [valid").unwrap();
        assert!(FileStore::new(&path).load().is_err());
    }

    #[test]
    fn interrupted_write_keeps_previous_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cal.toml");
        let mut s = FileStore::new(&path);
        s.store(2.0).unwrap();
        // A crash after the temp file was written but before the rename.
        std::fs::write(path.with_extension("new"), "[calibration]\nrevolutions_per_ml = 9").unwrap();
        assert_eq!(s.load().unwrap(), Some(2.0));
    }
}
