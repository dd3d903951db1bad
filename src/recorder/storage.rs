use super::types::Step;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::broadcast;

pub const STEPS_FILE: &str = "recordingSteps.json";
pub const SETTINGS_FILE: &str = "guideSettings.json";
pub const DEFAULT_TITLE: &str = "My Step Guide";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Title and description of the guide, owned by the control panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideSettings {
    pub title: String,
    pub description: String,
}

impl Default for GuideSettings {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            description: String::new(),
        }
    }
}

/// Local key-value store for the step list and guide settings.
/// Every save overwrites the stored value wholesale.
pub trait StepStore: Send + Sync {
    fn load_steps(&self) -> Result<Vec<Step>, StorageError>;
    fn save_steps(&self, steps: &[Step]) -> Result<(), StorageError>;
    fn load_settings(&self) -> Result<GuideSettings, StorageError>;
    fn save_settings(&self, settings: &GuideSettings) -> Result<(), StorageError>;
}

/// One JSON file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: for<'de> Deserialize<'de> + Default>(&self, file: &str) -> Result<T, StorageError> {
        match std::fs::read_to_string(self.dir.join(file)) {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write to a sibling temp file, then rename over the target.
    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string_pretty(value)?;
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!(".{file}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl StepStore for JsonFileStore {
    fn load_steps(&self) -> Result<Vec<Step>, StorageError> {
        self.read(STEPS_FILE)
    }

    fn save_steps(&self, steps: &[Step]) -> Result<(), StorageError> {
        self.write(STEPS_FILE, steps)
    }

    fn load_settings(&self) -> Result<GuideSettings, StorageError> {
        self.read(SETTINGS_FILE)
    }

    fn save_settings(&self, settings: &GuideSettings) -> Result<(), StorageError> {
        self.write(SETTINGS_FILE, settings)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    steps: Mutex<Vec<Step>>,
    settings: Mutex<GuideSettings>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn locked<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl StepStore for MemoryStore {
    fn load_steps(&self) -> Result<Vec<Step>, StorageError> {
        Ok(locked(&self.steps).clone())
    }

    fn save_steps(&self, steps: &[Step]) -> Result<(), StorageError> {
        *locked(&self.steps) = steps.to_vec();
        Ok(())
    }

    fn load_settings(&self) -> Result<GuideSettings, StorageError> {
        Ok(locked(&self.settings).clone())
    }

    fn save_settings(&self, settings: &GuideSettings) -> Result<(), StorageError> {
        *locked(&self.settings) = settings.clone();
        Ok(())
    }
}

/// Wraps a store and announces every successful step-list write.
///
/// This is how the control panel learns about steps written by the
/// recorder: it subscribes instead of sharing the list in memory.
pub struct ObservedStore<S> {
    inner: S,
    changes: broadcast::Sender<Vec<Step>>,
}

impl<S: StepStore> ObservedStore<S> {
    pub fn new(inner: S) -> Self {
        let (changes, _) = broadcast::channel(64);
        Self { inner, changes }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Vec<Step>> {
        self.changes.subscribe()
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: StepStore> StepStore for ObservedStore<S> {
    fn load_steps(&self) -> Result<Vec<Step>, StorageError> {
        self.inner.load_steps()
    }

    fn save_steps(&self, steps: &[Step]) -> Result<(), StorageError> {
        self.inner.save_steps(steps)?;
        // nobody listening is fine
        let _ = self.changes.send(steps.to_vec());
        Ok(())
    }

    fn load_settings(&self) -> Result<GuideSettings, StorageError> {
        self.inner.load_settings()
    }

    fn save_settings(&self, settings: &GuideSettings) -> Result<(), StorageError> {
        self.inner.save_settings(settings)
    }
}
