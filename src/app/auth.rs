// LogDeck - app/auth.rs
//
// Auth store and auth service operations.
//
// `AuthStore` is the single process-wide holder of the bearer token and
// user identity. It is cheap to clone (shared `Arc`) and is injected into
// the HTTP client, which reads the token on every request and clears it
// on a 401. Writers are login/logout only; last write wins.
//
// Every write is persisted to auth-storage.json when the store was opened
// from a file. Persistence failures on the 401 path are logged, not raised.

use crate::app::api::ApiClient;
use crate::core::model::User;
use crate::platform::credentials::{self, PersistedAuth};
use crate::util::error::{ApiError, CredentialError, LogDeckError};
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct AuthState {
    user: Option<User>,
    token: Option<String>,
}

/// Shared auth state container.
#[derive(Debug, Clone, Default)]
pub struct AuthStore {
    inner: Arc<RwLock<AuthState>>,
    storage_path: Option<PathBuf>,
}

impl AuthStore {
    /// Store that is never written to disk.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Store backed by `path`, rehydrated from it if a valid file exists.
    pub fn open(path: PathBuf) -> Self {
        let state = match credentials::load(&path) {
            Some(persisted) => AuthState {
                user: persisted.user,
                token: persisted.token,
            },
            None => AuthState::default(),
        };
        tracing::debug!(
            path = %path.display(),
            logged_in = state.token.is_some(),
            "Auth state restored"
        );
        Self {
            inner: Arc::new(RwLock::new(state)),
            storage_path: Some(path),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, AuthState> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, AuthState> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn token(&self) -> Option<String> {
        self.read().token.clone()
    }

    pub fn user(&self) -> Option<User> {
        self.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().token.is_some()
    }

    pub fn login(&self, user: User, token: String) -> Result<(), CredentialError> {
        {
            let mut state = self.write();
            state.user = Some(user);
            state.token = Some(token);
        }
        self.persist()
    }

    /// Store a token before the identity is known (OAuth exchange).
    pub fn set_token(&self, token: String) -> Result<(), CredentialError> {
        self.write().token = Some(token);
        self.persist()
    }

    pub fn logout(&self) -> Result<(), CredentialError> {
        {
            let mut state = self.write();
            state.user = None;
            state.token = None;
        }
        self.persist()
    }

    /// Drop the token after the server rejected it.
    pub fn clear_token(&self) {
        let had_token = self.write().token.take().is_some();
        if had_token {
            tracing::info!("Server rejected the stored token; credentials cleared");
            if let Err(e) = self.persist() {
                tracing::warn!(error = %e, "Could not persist cleared credentials");
            }
        }
    }

    /// Clear in-memory state without touching storage.
    pub fn reset(&self) {
        *self.write() = AuthState::default();
    }

    fn persist(&self) -> Result<(), CredentialError> {
        let Some(path) = &self.storage_path else {
            return Ok(());
        };
        let snapshot = {
            let state = self.read();
            PersistedAuth::new(state.user.clone(), state.token.clone())
        };
        credentials::save(&snapshot, path)
    }
}

// =============================================================================
// Auth service operations
// =============================================================================

/// Password login. Stores token and identity on success.
pub fn login(client: &ApiClient, email: &str, password: &str) -> Result<User, LogDeckError> {
    let response = client.login(email, password)?;
    let token = response
        .token
        .ok_or_else(|| missing_token("/auth/login"))?;
    client.auth().login(response.user.clone(), token)?;
    tracing::info!(user = %response.user.email, "Logged in");
    Ok(response.user)
}

/// Create an account. The server logs the new user in directly.
pub fn signup(
    client: &ApiClient,
    name: &str,
    email: &str,
    password: &str,
) -> Result<User, LogDeckError> {
    let response = client.signup(name, email, password)?;
    let token = response
        .token
        .ok_or_else(|| missing_token("/auth/signup"))?;
    client.auth().login(response.user.clone(), token)?;
    tracing::info!(user = %response.user.email, "Signed up");
    Ok(response.user)
}

/// Tell the server, then clear local credentials even if the call failed.
pub fn logout(client: &ApiClient) -> Result<(), LogDeckError> {
    if let Err(e) = client.logout() {
        tracing::warn!(error = %e, "Server logout failed; clearing local credentials anyway");
    }
    client.auth().logout()?;
    Ok(())
}

/// Refresh the stored identity from `/auth/me`.
pub fn me(client: &ApiClient) -> Result<User, LogDeckError> {
    let response = client.me()?;
    let token = client.auth().token().ok_or(LogDeckError::NotAuthenticated)?;
    client.auth().login(response.user.clone(), token)?;
    Ok(response.user)
}

/// Exchange a Google ID token for a session.
pub fn login_google(client: &ApiClient, google_token: &str) -> Result<User, LogDeckError> {
    let tokens = client.exchange_google(google_token)?;
    complete_oauth(client, tokens.access)
}

/// Exchange a GitHub authorization code for a session.
pub fn login_github(client: &ApiClient, code: &str) -> Result<User, LogDeckError> {
    let tokens = client.exchange_github(code)?;
    complete_oauth(client, tokens.access)
}

fn complete_oauth(client: &ApiClient, access: String) -> Result<User, LogDeckError> {
    client.auth().set_token(access)?;
    match me(client) {
        Ok(user) => {
            tracing::info!(user = %user.email, "Logged in via OAuth");
            Ok(user)
        }
        Err(e) => {
            // Half-finished login: do not leave a token without identity.
            client.auth().logout()?;
            Err(e)
        }
    }
}

fn missing_token(endpoint: &str) -> ApiError {
    ApiError::Decode {
        endpoint: endpoint.to_string(),
        source: serde::de::Error::missing_field("token"),
    }
}
