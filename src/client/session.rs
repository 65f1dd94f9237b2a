use std::{
    io,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use tracing::{info, warn};

use super::{api::AccountApi, ClientError};
use crate::auth::dto::{AuthResponse, PublicUser};

/// Where the bearer token survives between runs.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Option<String>;
    fn save(&self, token: &str) -> io::Result<()>;
    fn clear(&self) -> io::Result<()>;
}

#[derive(Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Option<String> {
        self.token.lock().ok().and_then(|t| t.clone())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> io::Result<()> {
        if let Ok(mut slot) = self.token.lock() {
            *slot = None;
        }
        Ok(())
    }
}

pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Option<String> {
        std::fs::read_to_string(&self.path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn save(&self, token: &str) -> io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, token)
    }

    fn clear(&self) -> io::Result<()> {
        match std::fs::remove_file(&self.path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

/// Who is signed in. Views read the token from here; login and logout update
/// it in place and re-fetch only the profile.
pub struct Session {
    api: Arc<dyn AccountApi>,
    tokens: Arc<dyn TokenStore>,
    token: Option<String>,
    profile: Option<PublicUser>,
}

impl Session {
    pub fn new(api: Arc<dyn AccountApi>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            api,
            tokens,
            token: None,
            profile: None,
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn profile(&self) -> Option<&PublicUser> {
        self.profile.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() && self.profile.is_some()
    }

    /// Pick up a persisted token; a token the backend no longer accepts is dropped.
    pub async fn restore(&mut self) {
        let Some(token) = self.tokens.load() else {
            return;
        };
        self.token = Some(token);
        let fetched = self.refresh_profile().await.map(|_| ());
        if let Err(e) = fetched {
            warn!(error = %e, "stored token rejected; clearing it");
            self.forget();
        }
    }

    pub async fn refresh_profile(&mut self) -> Result<&PublicUser, ClientError> {
        let token = self.token.as_deref().ok_or(ClientError::NotSignedIn)?;
        let profile = self.api.profile(token).await?;
        Ok(self.profile.insert(profile))
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&PublicUser, ClientError> {
        let auth = self.api.login(email, password).await?;
        self.adopt(auth).await
    }

    pub async fn register(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<&PublicUser, ClientError> {
        let auth = self.api.register(name, email, password).await?;
        self.adopt(auth).await
    }

    pub fn logout(&mut self) {
        info!("signed out");
        self.forget();
    }

    /// The token is kept only once the backend has served a profile for it.
    async fn adopt(&mut self, auth: AuthResponse) -> Result<&PublicUser, ClientError> {
        let profile = match self.api.profile(&auth.access_token).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(error = %e, "issued token was not accepted; staying signed out");
                self.forget();
                return Err(e);
            }
        };
        if let Err(e) = self.tokens.save(&auth.access_token) {
            warn!(error = %e, "could not persist token; session lasts until exit");
        }
        self.token = Some(auth.access_token);
        Ok(self.profile.insert(profile))
    }

    fn forget(&mut self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "could not clear persisted token");
        }
        self.token = None;
        self.profile = None;
    }
}
