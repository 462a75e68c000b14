//! User session cache
//!
//! Maps chat users to their eurocore session. Tokens are cached after login
//! or registration and refreshed with the stored credentials when eurocore
//! rejects them.

use chrono::{DateTime, Utc};
use r4n_client::{ClientError, EurocoreClient};
use r4n_core::domain::job::UserRef;
use r4n_core::dto::user::Credentials;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("user {0} is not logged in to eurocore")]
    NotLoggedIn(u64),

    #[error("eurocore authentication failed: {0}")]
    Client(#[from] ClientError),
}

/// A logged-in eurocore user
#[derive(Debug, Clone)]
pub struct Session {
    pub user: UserRef,
    credentials: Credentials,
    token: String,
    pub last_login: DateTime<Utc>,
}

impl Session {
    pub fn token(&self) -> &str {
        &self.token
    }
}

/// Cache of eurocore sessions keyed by chat user id
pub struct UserSessions {
    client: Arc<EurocoreClient>,
    sessions: RwLock<HashMap<u64, Session>>,
}

impl UserSessions {
    pub fn new(client: Arc<EurocoreClient>) -> Self {
        Self {
            client,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Logs a user in and caches the session
    pub async fn login(&self, user_id: u64, credentials: Credentials) -> Result<UserRef, SessionError> {
        let token = self.client.login(&credentials).await?;
        let user = self.cache(user_id, credentials, token);

        info!("logged in user: {}", user.name);
        Ok(user)
    }

    /// Registers a new eurocore user and caches the session
    pub async fn register(
        &self,
        user_id: u64,
        credentials: Credentials,
    ) -> Result<UserRef, SessionError> {
        let token = self.client.register(&credentials).await?;
        let user = self.cache(user_id, credentials, token);

        info!("registered user: {}", user.name);
        Ok(user)
    }

    /// Logs in again with the cached credentials and returns the new token
    pub async fn refresh(&self, user_id: u64) -> Result<String, SessionError> {
        let credentials = self
            .get(user_id)
            .map(|session| session.credentials)
            .ok_or(SessionError::NotLoggedIn(user_id))?;

        let token = self.client.login(&credentials).await?;
        self.cache(user_id, credentials, token.clone());

        info!("refreshed token for user {}", user_id);
        Ok(token)
    }

    pub fn get(&self, user_id: u64) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user_id)
            .cloned()
    }

    /// The user and token to submit with
    pub fn credentials(&self, user_id: u64) -> Result<(UserRef, String), SessionError> {
        self.get(user_id)
            .map(|session| (session.user, session.token))
            .ok_or(SessionError::NotLoggedIn(user_id))
    }

    pub fn remove(&self, user_id: u64) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user_id)
            .is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cache(&self, user_id: u64, credentials: Credentials, token: String) -> UserRef {
        let user = UserRef::new(user_id, credentials.username.clone());
        let session = Session {
            user: user.clone(),
            credentials,
            token,
            last_login: Utc::now(),
        };

        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user_id, session);
        user
    }
}
