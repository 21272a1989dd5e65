//! swwap client core.
//!
//! Headless application core for the swwap marketplace: credential
//! persistence, session lifecycle, bearer-authenticated REST gateways,
//! and the query/mutation cache. The presentation layer (screens,
//! navigation) lives outside this crate and consumes session snapshots
//! and gateways through [`AppCore`].

pub mod api_client;
pub mod auth_gateway;
pub mod config;
pub mod expiry;
pub mod listings;
pub mod logging;
pub mod media;
pub mod query;
pub mod session;
pub mod storage;

pub use api_client::ApiClient;
pub use auth_gateway::AuthGateway;
pub use config::ClientConfig;
pub use listings::ListingsGateway;
pub use media::MediaGateway;
pub use query::{Mutation, QueryClient, QueryKey, QuerySpec, QueryState};
pub use session::{Session, SessionManager};
pub use storage::{CredentialStore, FileStore, MemoryStore, AUTH_TOKEN_KEY, USER_DATA_KEY};

use std::sync::Arc;

use swwap_shared::ClientError;

/// The composition root.
///
/// Builds and wires every core component from one configuration and
/// owns the session-expiry consumer. The embedding application creates
/// exactly one and passes it down; nothing in this crate is a global.
pub struct AppCore {
    pub config: ClientConfig,
    pub store: Arc<dyn CredentialStore>,
    pub session: Arc<SessionManager>,
    pub auth: Arc<AuthGateway>,
    pub listings: ListingsGateway,
    pub media: MediaGateway,
    pub queries: QueryClient,
}

impl AppCore {
    /// Wire the core against the platform credential store.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let store = Arc::new(FileStore::new()?);
        Self::with_store(config, store)
    }

    /// Wire the core against an injected store (tests use
    /// [`MemoryStore`]).
    pub fn with_store(
        config: ClientConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let api = ApiClient::new(&config)?;
        let (expiry_publisher, expiry_events) = expiry::channel();

        let auth = Arc::new(AuthGateway::new(
            api.clone(),
            store.clone(),
            expiry_publisher.clone(),
        ));
        let session = Arc::new(
            SessionManager::new(store.clone()).with_remote_sign_out(auth.clone()),
        );
        session.watch_expiry(expiry_events);

        let listings = ListingsGateway::new(api, store.clone(), expiry_publisher);
        let media = MediaGateway::new(&config);
        let queries = QueryClient::new(&config);

        Ok(Self {
            config,
            store,
            session,
            auth,
            listings,
            media,
            queries,
        })
    }

    /// Restore any persisted session. Call once at startup; the UI
    /// shows its loading state until this returns.
    pub async fn start(&self) {
        self.session.hydrate().await;
    }
}
