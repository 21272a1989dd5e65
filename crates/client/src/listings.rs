//! Remote gateway for the listings resource.
//!
//! Every call is bearer-authenticated. The token is read from the
//! credential store immediately before each request, never from the
//! in-memory session, so a logout mid-request cannot resurrect a stale
//! token. With no token stored, calls fail fast with `AuthRequired`
//! and the network is never touched.

use std::sync::Arc;

use swwap_shared::{ClientError, Listing, ListingPatch, NewListing};

use crate::api_client::ApiClient;
use crate::expiry::ExpiryPublisher;
use crate::storage::{CredentialStore, AUTH_TOKEN_KEY};

pub struct ListingsGateway {
    api: ApiClient,
    store: Arc<dyn CredentialStore>,
    expiry: ExpiryPublisher,
}

impl ListingsGateway {
    pub fn new(api: ApiClient, store: Arc<dyn CredentialStore>, expiry: ExpiryPublisher) -> Self {
        Self { api, store, expiry }
    }

    async fn bearer(&self) -> Result<String, ClientError> {
        self.store
            .get(AUTH_TOKEN_KEY)
            .await?
            .ok_or(ClientError::AuthRequired)
    }

    pub async fn create(&self, listing: &NewListing) -> Result<Listing, ClientError> {
        let token = self.bearer().await?;
        self.api
            .post_json("/listings", listing, Some(&token))
            .await
            .map_err(|e| self.normalize(e, "failed to create listing"))
    }

    pub async fn list(&self) -> Result<Vec<Listing>, ClientError> {
        let token = self.bearer().await?;
        self.api
            .get_json("/listings", Some(&token))
            .await
            .map_err(|e| self.normalize(e, "failed to fetch listings"))
    }

    pub async fn get_by_id(&self, id: &str) -> Result<Listing, ClientError> {
        let token = self.bearer().await?;
        self.api
            .get_json(&format!("/listings/{id}"), Some(&token))
            .await
            .map_err(|e| self.normalize(e, "failed to fetch listing"))
    }

    pub async fn update(&self, id: &str, patch: &ListingPatch) -> Result<Listing, ClientError> {
        let token = self.bearer().await?;
        self.api
            .put_json(&format!("/listings/{id}"), patch, Some(&token))
            .await
            .map_err(|e| self.normalize(e, "failed to update listing"))
    }

    pub async fn remove(&self, id: &str) -> Result<(), ClientError> {
        let token = self.bearer().await?;
        self.api
            .delete(&format!("/listings/{id}"), Some(&token))
            .await
            .map_err(|e| self.normalize(e, "failed to delete listing"))
    }

    fn normalize(&self, error: ClientError, default: &str) -> ClientError {
        if error.is_unauthorized() {
            self.expiry.publish();
        }
        error.or_message(default)
    }
}
