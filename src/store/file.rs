use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::category::Category;
use crate::core::habit::Habit;
use crate::core::note::Note;
use crate::core::profile::UserProfile;
use crate::core::task::Task;

use super::StoreError;

/// Everything the store holds, as written to disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub habits: Vec<Habit>,
    #[serde(default)]
    pub profiles: Vec<UserProfile>,
}

/// Load a snapshot. A missing file is a fresh store; an unreadable one is
/// logged and treated as empty rather than refusing to start.
pub fn load_snapshot(path: &Path) -> Snapshot {
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::error!("Unreadable store file {}: {}", path.display(), e);
                Snapshot::default()
            }
        },
        Err(_) => Snapshot::default(),
    }
}

pub fn save_snapshot(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    std::fs::write(path, json)?;
    Ok(())
}
