//! Settings persistence
//!
//! One JSON document owned by the application root and passed by
//! reference: data URL, column rename map, visibility, the persisted
//! filter list, and a small runtime log. Saves are whole-file rewrites
//! and best-effort; a corrupt file on load is renamed aside and
//! replaced with defaults rather than crashing.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use mw_core::FilterSpec;

/// Default market watch endpoint.
pub const URL_DEFAULT: &str = "https://old.tsetmc.com/tsev2/data/MarketWatchPlus.aspx?h=0&r=0";
/// Default settings file name.
pub const SETTINGS_FILE: &str = "marketwatch_settings.json";
/// Default CSV export name.
pub const DEFAULT_EXPORT_NAME: &str = "marketwatch.csv";

/// Everything persisted across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_url: String,
    /// Column key → display label overrides, merged over defaults.
    pub column_name_map: IndexMap<String, String>,
    /// Column key → visibility for the main table.
    pub visible_columns: HashMap<String, bool>,
    /// Columns shown in the summary statistics panel; `None` means all.
    pub bottom_visible_columns: Option<Vec<String>>,
    /// Persisted filter list, replayed against each new base table.
    pub saved_filters: Vec<FilterSpec>,
    pub runtime_log: RuntimeLog,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_url: URL_DEFAULT.to_string(),
            column_name_map: IndexMap::new(),
            visible_columns: HashMap::new(),
            bottom_visible_columns: None,
            saved_filters: Vec::new(),
            runtime_log: RuntimeLog::default(),
        }
    }
}

/// Bookkeeping written after each successful refresh.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeLog {
    pub last_fetch_time: Option<String>,
    pub load_duration_secs: Option<f64>,
    pub rows_shown: Option<usize>,
}

impl RuntimeLog {
    pub fn record_fetch(&mut self, duration_secs: f64) {
        self.last_fetch_time = Some(chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string());
        self.load_duration_secs = Some(duration_secs);
    }
}

/// File-backed settings store.
pub struct SettingsStore {
    path: PathBuf,
    pub settings: Settings,
}

impl SettingsStore {
    /// Load settings from `path`. A missing file yields defaults; a
    /// file that fails to parse is renamed to `<path>.corrupt` and
    /// replaced with defaults.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let settings = match std::fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(settings) => settings,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "settings file corrupt, resetting");
                    Self::quarantine(&path);
                    Settings::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Settings::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings unreadable, using defaults");
                Settings::default()
            }
        };
        Self { path, settings }
    }

    fn quarantine(path: &Path) {
        let mut backup = path.as_os_str().to_os_string();
        backup.push(".corrupt");
        if let Err(e) = std::fs::rename(path, &backup) {
            warn!(path = %path.display(), error = %e, "failed to move corrupt settings aside");
        } else {
            info!(path = %path.display(), "corrupt settings moved to .corrupt backup");
        }
    }

    /// Whole-file rewrite. Failure is logged, never fatal.
    pub fn save(&self) {
        let text = match serde_json::to_string_pretty(&self.settings) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "failed to serialize settings");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, text) {
            warn!(path = %self.path.display(), error = %e, "failed to write settings");
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mw_core::{FilterSpec, PatternMode};

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("settings.json"));
        assert_eq!(store.settings.data_url, URL_DEFAULT);
        assert!(store.settings.saved_filters.is_empty());
    }

    #[test]
    fn save_and_reload_round_trips_filters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::load(&path);
        store.settings.saved_filters.push(FilterSpec::Pattern {
            column: "کد_بین_المللی".to_string(),
            mode: PatternMode::End,
            text: "0001".to_string(),
            length: Some(4),
            exclude: false,
        });
        store
            .settings
            .column_name_map
            .insert("نماد".to_string(), "Symbol".to_string());
        store.save();

        let reloaded = SettingsStore::load(&path);
        assert_eq!(reloaded.settings.saved_filters, store.settings.saved_filters);
        assert_eq!(
            reloaded.settings.column_name_map.get("نماد"),
            Some(&"Symbol".to_string())
        );
    }

    #[test]
    fn corrupt_file_is_quarantined_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.settings.data_url, URL_DEFAULT);
        assert!(dir.path().join("settings.json.corrupt").exists());
        assert!(!path.exists());
    }

    #[test]
    fn filter_list_schema_is_stable() {
        let settings = Settings {
            saved_filters: vec![FilterSpec::Value {
                column: "کد_بازار".to_string(),
                values: vec!["300".to_string()],
                exclude: true,
            }],
            ..Settings::default()
        };
        let json = serde_json::to_string(&settings).unwrap();
        assert!(json.contains("\"type\":\"value\""));
        assert!(json.contains("\"exclude\":true"));
    }
}
