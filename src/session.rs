use serde_json::{Map, Value};

use crate::api::ApiClient;
use crate::error::{ClientError, ClientResult};
use crate::models::user::{normalize_user_value, RawUserRecord, UserData, UserId, UserPatch};
use crate::storage::{KeyValueStore, TOKEN_KEY, USER_KEY};

/// What to do with the user when the token changes.
#[derive(Debug, Clone, PartialEq)]
pub enum UserUpdate {
    /// Leave the current user untouched.
    Keep,
    /// Forget the user and remove it from storage.
    Clear,
    /// Normalize and adopt this backend payload.
    Replace(Value),
}

pub struct Session<S: KeyValueStore> {
    api: ApiClient,
    store: S,
    token: Option<String>,
    user: Option<UserData>,
    loading: bool,
}

impl<S: KeyValueStore> Session<S> {
    /// A fresh session is loading until [`Session::restore`] has run.
    pub fn new(api: ApiClient, store: S) -> Self {
        Self {
            api,
            store,
            token: None,
            user: None,
            loading: true,
        }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn user(&self) -> Option<&UserData> {
        self.user.as_ref()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    // ------------------------------------------------------------------
    // Storage helpers
    // ------------------------------------------------------------------

    fn stored(&self, key: &str) -> Option<String> {
        match self.store.get(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, key = key, "Failed to read session storage");
                None
            }
        }
    }

    fn persist(&self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            tracing::error!(error = %e, key = key, "Failed to write session storage");
        }
    }

    fn forget(&self, key: &str) {
        if let Err(e) = self.store.remove(key) {
            tracing::error!(error = %e, key = key, "Failed to clear session storage");
        }
    }

    fn persist_user(&self, payload: &Map<String, Value>) {
        match serde_json::to_string(payload) {
            Ok(json) => self.persist(USER_KEY, &json),
            Err(e) => tracing::error!(error = %e, "Failed to serialize user payload"),
        }
    }

    fn stored_user_payload(&self) -> Option<Value> {
        let raw = self.stored(USER_KEY)?;
        match serde_json::from_str::<Value>(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(error = %e, "Stored user payload is not valid JSON");
                None
            }
        }
    }

    fn clear_user(&mut self) {
        self.user = None;
        self.forget(USER_KEY);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Adopt the stored token and user without touching the network.
    /// Returns true when a token was found.
    pub fn restore_from_storage(&mut self) -> bool {
        let token = self.stored(TOKEN_KEY).filter(|t| !t.is_empty());
        if let Some(token) = &token {
            self.token = Some(token.clone());
            self.api.set_auth_token(Some(token.clone()));
        }

        if let Some(value) = self.stored_user_payload() {
            match normalize_user_value(&value) {
                Some(normalized) => self.user = Some(normalized.user),
                None => tracing::warn!("Stored user payload holds no usable record"),
            }
        }

        token.is_some()
    }

    /// Restore from storage, then refresh the user from the backend when a
    /// token was stored.
    pub async fn restore(&mut self) {
        self.loading = true;
        if self.restore_from_storage() {
            self.fetch_user_data().await;
        }
        self.loading = false;
    }

    /// Set or clear the token, then apply `user` to the current user.
    pub fn sync_auth_state(&mut self, token: Option<String>, user: UserUpdate) {
        match token.filter(|t| !t.is_empty()) {
            Some(token) => {
                self.persist(TOKEN_KEY, &token);
                self.api.set_auth_token(Some(token.clone()));
                self.token = Some(token);
            }
            None => {
                self.token = None;
                self.api.set_auth_token(None);
                self.forget(TOKEN_KEY);
            }
        }

        match user {
            UserUpdate::Keep => {}
            UserUpdate::Clear => self.clear_user(),
            UserUpdate::Replace(value) => match normalize_user_value(&value) {
                Some(normalized) => {
                    self.persist_user(&normalized.storage_payload);
                    self.user = Some(normalized.user);
                }
                None => tracing::warn!("Could not normalize the user data received"),
            },
        }
    }

    /// Log in and load the full user record. Backend errors are returned
    /// unchanged; the session is left as it was.
    pub async fn login(&mut self, email: &str, senha: &str) -> ClientResult<()> {
        self.loading = true;
        let result = self.api.login(email, senha).await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.loading = false;
                return Err(e);
            }
        };

        let has_token = response.token.is_some();
        let user = response
            .user
            .map(UserUpdate::Replace)
            .unwrap_or(UserUpdate::Keep);
        self.sync_auth_state(response.token, user);

        if has_token {
            tracing::info!("Logged in");
            self.fetch_user_data().await;
        }
        self.loading = false;
        Ok(())
    }

    /// Clear token and user, in memory and in storage. Safe to repeat.
    pub fn logout(&mut self) {
        self.sync_auth_state(None, UserUpdate::Clear);
    }

    /// Refresh the user from `GET /auth/me`. Any failure leaves the session
    /// without a user; an expired token is dropped as well.
    pub async fn fetch_user_data(&mut self) -> Option<&UserData> {
        match self.api.current_user().await {
            // `{ user: .. }` is unwrapped whatever the inner shape is
            Ok(value) => match normalize_user_value(value.get("user").unwrap_or(&value)) {
                Some(normalized) => {
                    self.persist_user(&normalized.storage_payload);
                    self.user = Some(normalized.user);
                }
                None => {
                    tracing::warn!("Current user response holds no usable record");
                    self.clear_user();
                }
            },
            Err(ClientError::Unauthorized) => {
                tracing::warn!("Stored token rejected, clearing session");
                self.logout();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load user data");
                self.clear_user();
            }
        }
        self.user.as_ref()
    }

    /// Merge a partial update into the current user and its stored payload.
    /// Without a current user this does nothing.
    pub fn update_user_data(&mut self, patch: &UserPatch) {
        let Some(user) = self.user.as_mut() else {
            return;
        };
        patch.apply_to(user);

        match self.stored(USER_KEY) {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(Value::Object(mut payload)) => {
                    patch.merge_into(&mut payload);
                    self.persist_user(&payload);
                }
                Ok(_) => tracing::warn!("Stored user payload is not an object, left as is"),
                Err(e) => tracing::error!(error = %e, "Failed to update stored user payload"),
            },
            None => {
                if let Some(user) = &self.user {
                    match serde_json::to_string(user) {
                        Ok(json) => self.persist(USER_KEY, &json),
                        Err(e) => tracing::error!(error = %e, "Failed to serialize user"),
                    }
                }
            }
        }
    }

    /// Submit a profile edit and merge it locally once the backend accepts it.
    pub async fn save_profile(&mut self, patch: &UserPatch) -> ClientResult<()> {
        let id = self
            .user_id()
            .ok_or_else(|| ClientError::Validation("Usuário não identificado".into()))?;
        if patch.is_empty() {
            return Ok(());
        }
        self.api.update_profile(&id, patch).await?;
        self.update_user_data(patch);
        Ok(())
    }

    /// True with a token in memory or in storage.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some() || self.stored(TOKEN_KEY).is_some_and(|t| !t.is_empty())
    }

    /// The current user's id, falling back to the stored payload.
    pub fn user_id(&self) -> Option<UserId> {
        if let Some(id) = self.user.as_ref().and_then(|u| u.id.clone()) {
            return Some(id);
        }
        match self.stored_user_payload()? {
            Value::Object(obj) => RawUserRecord(obj).user_id(),
            _ => None,
        }
    }
}
