//! HTTP backend for the hosted auth + table service
//!
//! Endpoints used:
//! - `POST auth/v1/token?grant_type=password` - sign in
//! - `GET  auth/v1/user` - current user for the held access token
//! - `POST auth/v1/logout` - sign out
//! - `GET  rest/v1/user_settings?user_id=eq.<id>&select=*` - settings row
//! - `POST rest/v1/user_settings` with `Prefer: resolution=merge-duplicates` - upsert
//!
//! Every request carries the public API key in `apikey`. `Authorization` is
//! the session's access token when signed in, the API key otherwise.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};
use url::Url;

use super::{
    AuthBroadcaster, AuthEvent, AuthStateChange, BackendClient, BackendError, BackendResult,
};
use crate::config::BackendConfig;
use crate::model::{Session, SettingsRow, SettingsUpsert, User, UserId};

const SETTINGS_TABLE: &str = "rest/v1/user_settings";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    user: User,
}

/// [`BackendClient`] over the hosted HTTP API
pub struct RestBackend {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    session: RwLock<Option<Session>>,
    events: AuthBroadcaster,
}

impl RestBackend {
    /// Build a client from validated backend configuration
    pub fn new(config: &BackendConfig, event_capacity: usize) -> BackendResult<Self> {
        let mut base_url = Url::parse(&config.url)?;
        // Url::join replaces the last path segment unless the base ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base_url,
            anon_key: config.anon_key.clone(),
            session: RwLock::new(None),
            events: AuthBroadcaster::new(event_capacity),
        })
    }

    fn endpoint(&self, path: &str) -> BackendResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    fn current_session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn replace_session(&self, session: Option<Session>) -> Option<Session> {
        let mut current = self.session.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *current, session)
    }

    fn bearer(&self) -> String {
        self.current_session()
            .map(|session| session.access_token)
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    /// Exchange email and password for a session, then broadcast `SignedIn`
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> BackendResult<Session> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            return Err(BackendError::InvalidCredentials);
        }

        let token: TokenResponse = check_status(response).await?.json().await?;
        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            user: token.user,
        };

        debug!(user_id = %session.user.id, "signed in");
        self.replace_session(Some(session.clone()));
        self.events
            .emit(AuthStateChange::new(AuthEvent::SignedIn, Some(session.clone())));
        Ok(session)
    }

    /// Revoke the session, then broadcast `SignedOut`
    ///
    /// The local session is cleared even if the revoke request fails.
    pub async fn sign_out(&self) -> BackendResult<()> {
        let result = match self.current_session() {
            Some(_) => {
                let url = self.endpoint("auth/v1/logout")?;
                match self.request(reqwest::Method::POST, url).send().await {
                    Ok(response) => check_status(response).await.map(|_| ()),
                    Err(err) => Err(err.into()),
                }
            }
            None => Ok(()),
        };

        if let Err(err) = &result {
            warn!(error = %err, "remote sign-out failed; clearing local session anyway");
        }

        self.replace_session(None);
        self.events
            .emit(AuthStateChange::new(AuthEvent::SignedOut, None));
        result
    }
}

/// Turn a non-success response into a [`BackendError`]
async fn check_status(response: Response) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(BackendError::Unauthenticated);
    }

    let message = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl BackendClient for RestBackend {
    async fn get_session(&self) -> BackendResult<Option<Session>> {
        Ok(self.current_session())
    }

    fn auth_changes(&self) -> broadcast::Receiver<AuthStateChange> {
        self.events.subscribe()
    }

    async fn get_user(&self) -> BackendResult<Option<User>> {
        if self.current_session().is_none() {
            return Ok(None);
        }

        let url = self.endpoint("auth/v1/user")?;
        let response = self.request(reqwest::Method::GET, url).send().await?;
        let user: User = check_status(response).await?.json().await?;
        Ok(Some(user))
    }

    async fn fetch_settings_row(&self, user_id: &UserId) -> BackendResult<Option<SettingsRow>> {
        let mut url = self.endpoint(SETTINGS_TABLE)?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{}", user_id))
            .append_pair("select", "*");

        let response = self.request(reqwest::Method::GET, url).send().await?;
        let rows: Vec<SettingsRow> = check_status(response).await?.json().await?;
        Ok(rows.into_iter().next())
    }

    async fn upsert_settings_row(&self, upsert: SettingsUpsert) -> BackendResult<()> {
        let url = self.endpoint(SETTINGS_TABLE)?;
        let response = self
            .request(reqwest::Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&upsert)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }
}
