//! Shared handler state.

use crate::dispatcher::SyncDispatcher;
use markpub_cloud::{OAuthProvider, SyncEngine};
use markpub_store::CredentialStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub dispatcher: SyncDispatcher,
    pub credentials: Arc<dyn CredentialStore>,
    pub oauth: Arc<dyn OAuthProvider>,
    app_secret: Arc<str>,
}

impl AppState {
    pub fn new(
        engine: Arc<SyncEngine>,
        credentials: Arc<dyn CredentialStore>,
        oauth: Arc<dyn OAuthProvider>,
        app_secret: &str,
        max_concurrent_syncs: usize,
    ) -> Self {
        let dispatcher = SyncDispatcher::new(Arc::clone(&engine), max_concurrent_syncs);
        Self {
            engine,
            dispatcher,
            credentials,
            oauth,
            app_secret: Arc::from(app_secret),
        }
    }

    pub fn app_secret(&self) -> &[u8] {
        self.app_secret.as_bytes()
    }
}
