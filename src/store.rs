//! Alarm persistence.
//!
//! Alarms are stored as whole records keyed by their `AlarmId`; an update
//! always replaces the complete record.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::alarm::{Alarm, AlarmId};
use crate::{Error, Result};

/// Storage for alarms
pub trait AlarmStore {
    /// Every stored alarm in storage order
    fn load_all(&self) -> Result<Vec<Alarm>>;

    /// Replaces the record with the alarm's id or inserts a new one,
    /// assigning an id if the alarm has none yet
    fn upsert(&mut self, alarm: Alarm) -> Result<AlarmId>;

    fn remove(&mut self, id: AlarmId) -> Result<()>;

    fn get(&self, id: AlarmId) -> Result<Alarm> {
        self.load_all()?
            .into_iter()
            .find(|alarm| alarm.id() == Some(id))
            .ok_or(Error::AlarmNotFound(id))
    }
}

/// Shared upsert on an in-memory list
fn upsert_into(alarms: &mut Vec<Alarm>, alarm: Alarm) -> AlarmId {
    let id = alarm.id().unwrap_or_else(AlarmId::generate);
    let alarm = alarm.with_id(id);
    match alarms.iter_mut().find(|stored| stored.id() == Some(id)) {
        Some(stored) => {
            debug!(%id, "Updating stored alarm");
            *stored = alarm;
        }
        None => {
            debug!(%id, "Inserting new alarm");
            alarms.push(alarm);
        }
    }
    id
}

fn remove_from(alarms: &mut Vec<Alarm>, id: AlarmId) -> Result<()> {
    let index = alarms
        .iter()
        .position(|alarm| alarm.id() == Some(id))
        .ok_or(Error::AlarmNotFound(id))?;
    alarms.remove(index);
    Ok(())
}

/// Alarms kept in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    alarms: Vec<Alarm>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AlarmStore for MemoryStore {
    fn load_all(&self) -> Result<Vec<Alarm>> {
        Ok(self.alarms.clone())
    }

    fn upsert(&mut self, alarm: Alarm) -> Result<AlarmId> {
        Ok(upsert_into(&mut self.alarms, alarm))
    }

    fn remove(&mut self, id: AlarmId) -> Result<()> {
        remove_from(&mut self.alarms, id)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AlarmFile {
    #[serde(default)]
    alarms: Vec<Alarm>,
}

/// Alarms kept in a pretty-printed JSON file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<AlarmFile> {
        if !self.path.exists() {
            debug!("No alarm file at {:?}, starting empty", self.path);
            return Ok(AlarmFile::default());
        }
        let contents = std::fs::read_to_string(&self.path)?;
        let file: AlarmFile = serde_json::from_str(&contents)?;

        let mut seen = HashSet::new();
        for id in file.alarms.iter().filter_map(Alarm::id) {
            if !seen.insert(id) {
                return Err(Error::Config(format!(
                    "duplicate alarm id {} in {:?}",
                    id, self.path
                )));
            }
        }
        Ok(file)
    }

    /// Atomically replaces the file: write a temp file, sync, rename
    fn write(&self, file: &AlarmFile) -> Result<()> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent)?;

        let mut temp = NamedTempFile::new_in(parent)?;
        let contents = serde_json::to_string_pretty(file)?;
        temp.write_all(contents.as_bytes())?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        info!("Saved {} alarms to {:?}", file.alarms.len(), self.path);
        Ok(())
    }
}

impl AlarmStore for JsonFileStore {
    #[instrument(skip(self), fields(path = ?self.path))]
    fn load_all(&self) -> Result<Vec<Alarm>> {
        Ok(self.read()?.alarms)
    }

    #[instrument(skip(self, alarm), fields(path = ?self.path))]
    fn upsert(&mut self, alarm: Alarm) -> Result<AlarmId> {
        let mut file = self.read()?;
        let id = upsert_into(&mut file.alarms, alarm);
        self.write(&file)?;
        Ok(id)
    }

    #[instrument(skip(self), fields(path = ?self.path))]
    fn remove(&mut self, id: AlarmId) -> Result<()> {
        let mut file = self.read()?;
        remove_from(&mut file.alarms, id)?;
        self.write(&file)
    }
}
