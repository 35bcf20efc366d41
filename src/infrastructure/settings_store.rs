//! 全局设置持久化（`settings.toml`）

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::StorageError;
use crate::models::settings::GlobalSettings;

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取设置；文件不存在时返回默认值
    pub async fn load(&self) -> Result<GlobalSettings, StorageError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("设置文件不存在，使用默认设置: {}", self.path.display());
                return Ok(GlobalSettings::default());
            }
            Err(e) => {
                return Err(StorageError::ReadFailed {
                    path: self.path.display().to_string(),
                    source: e,
                })
            }
        };

        toml::from_str(&text).map_err(|e| StorageError::SettingsParseFailed {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })
    }

    pub async fn save(&self, settings: &GlobalSettings) -> Result<(), StorageError> {
        let text = toml::to_string(settings).map_err(|e| StorageError::SettingsParseFailed {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;

        let write_failed = |e| StorageError::WriteFailed {
            path: self.path.display().to_string(),
            source: e,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_failed)?;
        }
        tokio::fs::write(&self.path, text).await.map_err(write_failed)?;

        info!("💾 设置已保存: {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.toml"));
        let settings = store.load().await.unwrap();
        assert_eq!(settings, GlobalSettings::default());
        assert!(settings.include_spec_table);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("nested").join("settings.toml"));
        let settings = GlobalSettings {
            institution_name: "Liceo Bicentenario".to_string(),
            logo: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
            include_spec_table: false,
        };
        store.save(&settings).await.unwrap();
        assert_eq!(store.load().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn test_invalid_toml_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        tokio::fs::write(&path, "include_spec_table = \"tal vez\"").await.unwrap();
        let err = SettingsStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StorageError::SettingsParseFailed { .. }));
    }
}
