//! Remote gateway for the `/auth/*` endpoints.
//!
//! Login and registration carry no credential; logout and profile
//! updates read the bearer token from the credential store right
//! before the call. The gateway never retries, and it publishes a
//! session-expiry event whenever the server rejects a stored token.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use swwap_shared::{
    AuthResponse, ClientError, LoginRequest, RegisterRequest, UpdateProfileRequest, UserRecord,
};

use crate::api_client::ApiClient;
use crate::expiry::ExpiryPublisher;
use crate::session::RemoteSignOut;
use crate::storage::{CredentialStore, AUTH_TOKEN_KEY};

pub struct AuthGateway {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    expiry: ExpiryPublisher,
}

impl AuthGateway {
    pub fn new(api: ApiClient, store: Arc<dyn CredentialStore>, expiry: ExpiryPublisher) -> Self {
        Self { api, store, expiry }
    }

    pub async fn login(&self, request: &LoginRequest) -> Result<AuthResponse, ClientError> {
        debug!("attempting login for {}", request.email);
        self.api
            .post_json("/auth/login", request, None)
            .await
            .map_err(|e| e.or_message("failed to login"))
    }

    pub async fn sign_up(&self, request: &RegisterRequest) -> Result<AuthResponse, ClientError> {
        debug!("attempting signup for {}", request.email);
        self.api
            .post_json("/auth/register", request, None)
            .await
            .map_err(|e| e.or_message("failed to register"))
    }

    /// Server-side logout. Returns Ok without a network call when no
    /// token is stored; local session clearing is the session
    /// manager's job either way.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let Some(token) = self.store.get(AUTH_TOKEN_KEY).await? else {
            debug!("no stored token, skipping server-side logout");
            return Ok(());
        };

        let result: Result<serde_json::Value, ClientError> =
            self.api.post_empty("/auth/logout", Some(&token)).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.note_rejection(&e);
                Err(e.or_message("failed to logout"))
            }
        }
    }

    pub async fn update_profile(
        &self,
        request: &UpdateProfileRequest,
    ) -> Result<UserRecord, ClientError> {
        let token = self
            .store
            .get(AUTH_TOKEN_KEY)
            .await?
            .ok_or(ClientError::AuthRequired)?;

        self.api
            .put_json("/auth/profile", request, Some(&token))
            .await
            .map_err(|e| {
                self.note_rejection(&e);
                e.or_message("failed to update profile")
            })
    }

    fn note_rejection(&self, error: &ClientError) {
        if error.is_unauthorized() {
            self.expiry.publish();
        }
    }
}

#[async_trait]
impl RemoteSignOut for AuthGateway {
    async fn sign_out(&self) -> Result<(), ClientError> {
        self.logout().await
    }
}
