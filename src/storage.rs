use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Local;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

use crate::{
    constants::STORAGE_FILE,
    domain::{ActivityEntry, Category, FocusSession, Taxonomy, default_taxonomy},
};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// In-memory state the engine computes from. Collections are replaced in
/// bulk on import; the taxonomy persists across imports.
pub struct AppState {
    pub entries: Vec<ActivityEntry>,
    pub sessions: Vec<FocusSession>,
    pub taxonomy: Taxonomy,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            sessions: Vec::new(),
            taxonomy: default_taxonomy(),
        }
    }
}

#[derive(Serialize, Deserialize)]
pub struct StoredCategory {
    pub color: String,
    #[serde(default)]
    pub apps: Vec<String>,
    #[serde(rename = "isFocused", default)]
    pub is_focused: bool,
}

/// Persisted blob shape. `appToCategory` is a derived cache; it is written
/// for completeness but the index is rebuilt from the category app sets on
/// load. Dates serialize as ISO-8601 and rehydrate to instants.
#[derive(Serialize, Deserialize, Default)]
struct StoredState {
    #[serde(rename = "timeSinkData", default)]
    time_sink_data: Vec<ActivityEntry>,
    #[serde(rename = "balanceData", default)]
    balance_data: Vec<FocusSession>,
    #[serde(default)]
    categories: BTreeMap<String, StoredCategory>,
    #[serde(rename = "appToCategory", default)]
    app_to_category: BTreeMap<String, String>,
}

pub fn categories_to_map(taxonomy: &Taxonomy) -> BTreeMap<String, StoredCategory> {
    taxonomy
        .categories()
        .iter()
        .map(|category| {
            (
                category.name.clone(),
                StoredCategory {
                    color: category.color.clone(),
                    apps: category.apps.clone(),
                    is_focused: category.is_focused,
                },
            )
        })
        .collect()
}

pub fn categories_from_map(map: BTreeMap<String, StoredCategory>) -> Vec<Category> {
    map.into_iter()
        .map(|(name, stored)| Category {
            name,
            color: stored.color,
            apps: stored.apps,
            is_focused: stored.is_focused,
        })
        .collect()
}

pub fn get_data_dir() -> PathBuf {
    // A blob in the working directory wins over the platform data dir.
    let local = Path::new(STORAGE_FILE);
    if local.exists() {
        return PathBuf::from(".");
    }

    if let Some(proj_dirs) = ProjectDirs::from("com", "timeflow", "timeflow") {
        let data_dir = proj_dirs.data_dir().to_path_buf();
        fs::create_dir_all(&data_dir).ok();
        data_dir
    } else {
        PathBuf::from(".")
    }
}

pub fn get_state_path() -> PathBuf {
    get_data_dir().join(STORAGE_FILE)
}

pub fn load_state(path: &Path) -> AppState {
    if !path.exists() {
        return AppState::default();
    }

    let stored: StoredState = match read_json(path) {
        Ok(stored) => stored,
        Err(e) => {
            eprintln!("Warning: could not load stored data: {e}");
            return AppState::default();
        }
    };

    let taxonomy = if stored.categories.is_empty() {
        default_taxonomy()
    } else {
        Taxonomy::new(categories_from_map(stored.categories))
    };

    AppState {
        entries: stored.time_sink_data,
        sessions: stored.balance_data,
        taxonomy,
    }
}

pub fn save_state(path: &Path, state: &AppState) -> Result<(), StorageError> {
    let stored = StoredState {
        time_sink_data: state.entries.clone(),
        balance_data: state.sessions.clone(),
        categories: categories_to_map(&state.taxonomy),
        app_to_category: state
            .taxonomy
            .app_index()
            .iter()
            .map(|(app, category)| (app.clone(), category.clone()))
            .collect(),
    };

    write_json_atomic(path, &stored)
}

pub fn delete_state(path: &Path) -> Result<(), StorageError> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_string_pretty(value)?;
    atomic_write(path, &json)
}

pub fn write_text_file(path: &Path, content: &str) -> Result<(), StorageError> {
    atomic_write(path, content)
}

fn create_backup(path: &Path) -> Result<(), StorageError> {
    if !path.exists() {
        return Ok(());
    }

    let backup_dir = path.parent().unwrap_or(Path::new(".")).join("backups");
    fs::create_dir_all(&backup_dir)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let filename = format!(
        "{}.{}",
        path.file_name().unwrap_or_default().to_string_lossy(),
        timestamp
    );
    fs::copy(path, backup_dir.join(&filename))?;

    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    if let Ok(entries) = fs::read_dir(&backup_dir) {
        let mut backups: Vec<_> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().starts_with(&*stem))
            .collect();
        backups.sort_by_key(|entry| entry.metadata().ok().and_then(|m| m.modified().ok()));

        while backups.len() > 10 {
            let oldest = backups.remove(0);
            let _ = fs::remove_file(oldest.path());
        }
    }

    Ok(())
}

pub fn atomic_write(path: &Path, content: &str) -> Result<(), StorageError> {
    if path.exists() {
        create_backup(path)?;
    }

    let tmp_path = path.with_extension("tmp");
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(content.as_bytes())?;
    tmp_file.sync_all()?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}
