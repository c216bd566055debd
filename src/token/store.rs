use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::errors::AuthError;

use super::{Credentials, TokenKind};

/// Secure storage for the current credential pair.
///
/// `load`/`save`/`clear` are the primitives; `save` replaces both tokens in one
/// step. `get`/`set` are per-token conveniences on top of them.
pub trait TokenStore: Send + Sync + 'static {
    fn load(&self) -> impl Future<Output = Option<Credentials>> + Send;

    fn save(&self, credentials: &Credentials) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn clear(&self) -> impl Future<Output = Result<(), AuthError>> + Send;

    fn get(&self, kind: TokenKind) -> impl Future<Output = Result<String, AuthError>> + Send {
        async move {
            self.load()
                .await
                .and_then(|creds| creds.token(kind).map(str::to_string))
                .ok_or(AuthError::NotFound(kind))
        }
    }

    fn set(
        &self,
        kind: TokenKind,
        value: String,
    ) -> impl Future<Output = Result<(), AuthError>> + Send {
        async move {
            let mut creds = self.load().await.unwrap_or_default();
            creds.set_token(kind, value);
            self.save(&creds).await
        }
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credentials: RwLock<Option<Credentials>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            credentials: RwLock::new(Some(credentials)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Option<Credentials> {
        self.credentials.read().await.clone()
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        *self.credentials.write().await = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        *self.credentials.write().await = None;
        Ok(())
    }
}

/// JSON file store. Writes go to a sibling temp file that is renamed over the
/// target, so readers see either the old pair or the new one.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

impl TokenStore for FileTokenStore {
    async fn load(&self) -> Option<Credentials> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("token file '{}' unreadable: {}", self.path.display(), err);
                return None;
            }
        };
        match serde_json::from_slice(&contents) {
            Ok(creds) => Some(creds),
            Err(err) => {
                warn!("token file '{}' is corrupt: {}", self.path.display(), err);
                None
            }
        }
    }

    async fn save(&self, credentials: &Credentials) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        let data =
            serde_json::to_vec(credentials).map_err(|e| AuthError::Write(e.to_string()))?;
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AuthError::Write(e.to_string()))?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| AuthError::Write(e.to_string()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tokio::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .await
                .map_err(|e| AuthError::Write(e.to_string()))?;
        }
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AuthError::Write(e.to_string()))?;
        debug!("token file '{}' updated", self.path.display());
        Ok(())
    }

    async fn clear(&self) -> Result<(), AuthError> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(AuthError::Write(err.to_string())),
        }
    }
}
