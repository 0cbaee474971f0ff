//! Single JSON document keyed by identifier

use super::{SessionMap, SessionStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

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

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn load(&self) -> SessionMap {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No session file, starting empty");
                return SessionMap::new();
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Cannot read session file, starting empty");
                return SessionMap::new();
            }
        };

        match serde_json::from_slice::<SessionMap>(&bytes) {
            Ok(sessions) => {
                tracing::info!(count = sessions.len(), "Loaded sessions");
                sessions
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Corrupt session file, starting empty");
                SessionMap::new()
            }
        }
    }

    async fn save(&self, sessions: &SessionMap) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(sessions)?;
        let tmp = self.temp_path();
        // Write-then-rename so a crash never leaves a half-written file
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}
