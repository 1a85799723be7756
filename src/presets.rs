//! Drying presets - two built-ins plus user presets kept in a JSON file

use crate::dryer::{TEMP_MAX, TEMP_MIN};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum PresetError {
    #[error("Temperature must be between {TEMP_MIN} and {TEMP_MAX}°C")]
    TemperatureOutOfRange(f64),

    #[error("Cannot {0} built-in presets")]
    Builtin(&'static str),

    #[error("Preset not found")]
    NotFound,

    #[error("Preset file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Preset encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub temperature: f64,
    #[serde(default)]
    pub builtin: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresetCreate {
    pub name: String,
    pub temperature: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PresetUpdate {
    pub name: Option<String>,
    pub temperature: Option<f64>,
}

fn builtins() -> Vec<Preset> {
    vec![
        Preset {
            id: "pla".into(),
            name: "PLA".into(),
            temperature: 50.0,
            builtin: true,
        },
        Preset {
            id: "petg".into(),
            name: "PETG".into(),
            temperature: 65.0,
            builtin: true,
        },
    ]
}

fn check_temperature(temperature: f64) -> Result<(), PresetError> {
    if (TEMP_MIN..=TEMP_MAX).contains(&temperature) {
        Ok(())
    } else {
        Err(PresetError::TemperatureOutOfRange(temperature))
    }
}

fn is_builtin(id: &str) -> bool {
    builtins().iter().any(|p| p.id == id)
}

/// File-backed preset storage. Writes are serialized through one lock.
pub struct PresetStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl PresetStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// A missing or unreadable file means no user presets
    async fn read_user(&self) -> Vec<Preset> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice::<Vec<Preset>>(&raw) {
            Ok(mut presets) => {
                for p in &mut presets {
                    p.builtin = false;
                }
                presets
            }
            Err(e) => {
                warn!("Ignoring corrupt preset file {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    async fn write_user(&self, presets: &[Preset]) -> Result<(), PresetError> {
        let json = serde_json::to_vec_pretty(presets)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Built-ins first, then user presets
    pub async fn list(&self) -> Vec<Preset> {
        let mut all = builtins();
        all.extend(self.read_user().await);
        all
    }

    pub async fn create(&self, new: PresetCreate) -> Result<Preset, PresetError> {
        check_temperature(new.temperature)?;

        let _guard = self.lock.lock().await;
        let mut user = self.read_user().await;
        let preset = Preset {
            id: uuid::Uuid::new_v4().simple().to_string()[..8].to_string(),
            name: new.name,
            temperature: new.temperature,
            builtin: false,
        };
        user.push(preset.clone());
        self.write_user(&user).await?;

        info!("Created preset {} ({})", preset.id, preset.name);
        Ok(preset)
    }

    pub async fn update(&self, id: &str, changes: PresetUpdate) -> Result<Preset, PresetError> {
        if is_builtin(id) {
            return Err(PresetError::Builtin("modify"));
        }
        if let Some(temperature) = changes.temperature {
            check_temperature(temperature)?;
        }

        let _guard = self.lock.lock().await;
        let mut user = self.read_user().await;
        let preset = user
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(PresetError::NotFound)?;

        if let Some(name) = changes.name {
            preset.name = name;
        }
        if let Some(temperature) = changes.temperature {
            preset.temperature = temperature;
        }
        let updated = preset.clone();
        self.write_user(&user).await?;
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> Result<(), PresetError> {
        if is_builtin(id) {
            return Err(PresetError::Builtin("delete"));
        }

        let _guard = self.lock.lock().await;
        let mut user = self.read_user().await;
        let before = user.len();
        user.retain(|p| p.id != id);
        if user.len() == before {
            return Err(PresetError::NotFound);
        }
        self.write_user(&user).await?;

        info!("Deleted preset {}", id);
        Ok(())
    }
}
