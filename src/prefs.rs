use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::AppError;

const PREFS_FILE: &str = "prefs.json";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortColumn {
    Name,
    Planned,
    Actual,
    Diff,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// UI state that survives process restarts, independent of the remote store.
/// Everything else (trips, members, categories, expenses) is refetched fresh.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UiPrefs {
    pub trip_id: Option<String>,
    pub sort_column: Option<SortColumn>,
    #[serde(default)]
    pub sort_direction: SortDirection,
    #[serde(default)]
    pub hydrated: bool,
}

#[derive(Clone)]
pub struct PrefsStore {
    root: Arc<PathBuf>,
}

impl PrefsStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root: Arc::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self) -> PathBuf {
        self.root().join(PREFS_FILE)
    }

    pub async fn ensure_structure(&self) -> Result<(), AppError> {
        fs::create_dir_all(self.root()).await?;
        Ok(())
    }

    pub async fn load(&self) -> Result<UiPrefs, AppError> {
        let path = self.path();
        if !fs::try_exists(&path).await? {
            return Ok(UiPrefs::default());
        }
        let raw = fs::read(&path).await?;
        if raw.is_empty() {
            return Ok(UiPrefs::default());
        }
        let prefs = serde_json::from_slice(&raw).map_err(|err| AppError::Other(err.into()))?;
        Ok(prefs)
    }

    pub async fn save(&self, prefs: &UiPrefs) -> Result<(), AppError> {
        self.ensure_structure().await?;
        let data = serde_json::to_vec_pretty(prefs).map_err(|err| AppError::Other(err.into()))?;
        fs::write(self.path(), data).await?;
        Ok(())
    }
}
