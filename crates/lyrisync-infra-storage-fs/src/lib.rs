use lyrisync_ports::settings::{RenderSettings, SettingsStore, StorageError};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "lyrisync";
const SETTINGS_FILE: &str = "settings.json";

/// Keeps `RenderSettings` as pretty-printed JSON on disk.
pub struct FsSettingsStore {
    path: PathBuf,
}

impl FsSettingsStore {
    /// Store backed by an explicit file instead of the user config directory.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_path() -> Result<PathBuf, StorageError> {
        let base = dirs_next::config_dir()
            .ok_or_else(|| StorageError::Io("config dir not found".to_string()))?;
        Ok(base.join(APP_DIR).join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
        let data = fs::read(path).map_err(|e| StorageError::Io(e.to_string()))?;
        serde_json::from_slice(&data).map_err(|e| StorageError::Serde(e.to_string()))
    }

    fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::Io(e.to_string()))?;
        }
        let data =
            serde_json::to_vec_pretty(value).map_err(|e| StorageError::Serde(e.to_string()))?;
        fs::write(path, data).map_err(|e| StorageError::Io(e.to_string()))
    }
}

impl Default for FsSettingsStore {
    fn default() -> Self {
        let path = Self::default_path().unwrap_or_else(|_| PathBuf::from(SETTINGS_FILE));
        Self { path }
    }
}

impl SettingsStore for FsSettingsStore {
    fn load_settings(&self) -> Result<RenderSettings, StorageError> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no settings file, using defaults");
            return Ok(RenderSettings::default());
        }
        Self::read_json(&self.path)
    }

    fn save_settings(&self, s: &RenderSettings) -> Result<(), StorageError> {
        Self::write_json(&self.path, s)?;
        tracing::info!(path = %self.path.display(), "settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lyrisync_ports::settings::PlacementMode;
    use lyrisync_ports::types::Rgb;
    use pretty_assertions::assert_eq;

    fn temp_settings_path(label: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("clock")
            .as_nanos();
        std::env::temp_dir()
            .join(format!("lyrisync_store_{label}_{nanos}"))
            .join(SETTINGS_FILE)
    }

    #[test]
    fn missing_file_loads_defaults() {
        let store = FsSettingsStore::with_path(temp_settings_path("missing"));
        assert_eq!(store.load_settings().expect("load"), RenderSettings::default());
    }

    #[test]
    fn saved_settings_load_back() {
        let store = FsSettingsStore::with_path(temp_settings_path("roundtrip"));
        let settings = RenderSettings {
            fps: 24,
            placement_mode: PlacementMode::Fixed,
            text_color: Rgb([255, 200, 0]),
            font_path: Some(PathBuf::from("/fonts/song.ttf")),
            ..RenderSettings::default()
        };

        store.save_settings(&settings).expect("save");
        let raw = fs::read_to_string(store.path()).expect("file written");
        assert!(raw.contains("\"#FFC800\""));
        assert_eq!(store.load_settings().expect("load"), settings);
    }

    #[test]
    fn malformed_json_is_a_serde_error() {
        let path = temp_settings_path("malformed");
        fs::create_dir_all(path.parent().expect("parent")).expect("dir");
        fs::write(&path, "{ not json").expect("write");

        let err = FsSettingsStore::with_path(path).load_settings().err();
        assert!(matches!(err, Some(StorageError::Serde(_))));
    }
}
