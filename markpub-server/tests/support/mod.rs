//! Test doubles for the server: storage that records who synced, and a
//! scripted OAuth provider.

#![allow(dead_code)]

use async_trait::async_trait;
use markpub_cloud::{
    AuthorizedAccount, ChangeBatch, CloudConfig, CloudError, CloudResult, FileMetadata,
    GfmRenderer, OAuthProvider, ShareLink, StorageClient, SyncEngine,
};
use markpub_server::{AppState, SIGNATURE_HEADER, router, sign};
use markpub_store::{CredentialStore, MemoryAccountStore};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET: &str = "app-secret";

/// Storage with an empty change log that records every delta call.
///
/// Credentials are `token-<uid>`, so recorded credentials identify users.
pub struct RecordingStorage {
    delay: Duration,
    lists: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: AtomicBool,
    panic_next: AtomicBool,
}

impl RecordingStorage {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            lists: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
            panic_next: AtomicBool::new(false),
        }
    }

    pub fn fail_all(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// The next delta call panics after being recorded.
    pub fn panic_once(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    /// Users whose delta was requested, in call order.
    pub fn synced_users(&self) -> Vec<String> {
        self.lists
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.trim_start_matches("token-").to_string())
            .collect()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn list_changes(
        &self,
        credential: &str,
        _cursor: Option<&str>,
    ) -> CloudResult<ChangeBatch> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.lists.lock().unwrap().push(credential.to_string());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("storage client bug");
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CloudError::Api("storage unavailable".into()));
        }
        Ok(ChangeBatch {
            entries: Vec::new(),
            cursor: "c1".into(),
            has_more: false,
        })
    }

    async fn read_file(&self, _: &str, path: &str) -> CloudResult<(Vec<u8>, FileMetadata)> {
        Err(CloudError::Api(format!("unexpected read of {path}")))
    }

    async fn write_file(
        &self,
        _: &str,
        path: &str,
        _: Vec<u8>,
        _: bool,
    ) -> CloudResult<FileMetadata> {
        Err(CloudError::Api(format!("unexpected write of {path}")))
    }

    async fn create_share_link(&self, _: &str, path: &str, _: bool) -> CloudResult<ShareLink> {
        Err(CloudError::Api(format!("unexpected share of {path}")))
    }
}

/// What the fake provider answers to a code exchange.
pub enum Exchange {
    Grant { uid: String, token: String },
    Reject,
    Outage,
}

pub struct FakeOAuth {
    answer: Exchange,
    pub redirects: Mutex<Vec<String>>,
}

impl FakeOAuth {
    pub fn new(answer: Exchange) -> Self {
        Self {
            answer,
            redirects: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OAuthProvider for FakeOAuth {
    fn authorize_url(&self, redirect_uri: &str) -> String {
        format!("https://provider.test/authorize?redirect_uri={redirect_uri}")
    }

    async fn exchange_code(
        &self,
        _code: &str,
        redirect_uri: &str,
    ) -> CloudResult<AuthorizedAccount> {
        self.redirects.lock().unwrap().push(redirect_uri.to_string());
        match &self.answer {
            Exchange::Grant { uid, token } => Ok(AuthorizedAccount {
                access_token: token.clone(),
                uid: uid.clone(),
            }),
            Exchange::Reject => Err(CloudError::AuthFailed("invalid_grant".into())),
            Exchange::Outage => Err(CloudError::Api("token endpoint returned 500".into())),
        }
    }
}

pub struct Harness {
    pub state: AppState,
    pub storage: Arc<RecordingStorage>,
    pub accounts: Arc<MemoryAccountStore>,
    pub oauth: Arc<FakeOAuth>,
}

/// App state over fakes, with credentials stored for `uids`.
pub fn harness(uids: &[&str], delay: Duration, max_syncs: usize, answer: Exchange) -> Harness {
    let storage = Arc::new(RecordingStorage::new(delay));
    let accounts = Arc::new(MemoryAccountStore::new());
    for uid in uids {
        accounts.set_credential(uid, &format!("token-{uid}")).unwrap();
    }
    let oauth = Arc::new(FakeOAuth::new(answer));
    let engine = Arc::new(SyncEngine::new(
        storage.clone(),
        Arc::new(GfmRenderer),
        accounts.clone(),
        accounts.clone(),
        &CloudConfig::default(),
    ));
    let state = AppState::new(engine, accounts.clone(), oauth.clone(), SECRET, max_syncs);
    Harness {
        state,
        storage,
        accounts,
        oauth,
    }
}

/// Serves the app on an ephemeral local port and returns its base URL.
pub async fn serve(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router(state)).await.unwrap() });
    format!("http://{addr}")
}

/// HTTP client that reports redirects instead of following them.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap()
}

/// Posts `body` to the webhook, signed with [`SECRET`].
pub async fn notify(base: &str, body: &str) -> reqwest::Response {
    client()
        .post(format!("{base}/webhook"))
        .header(SIGNATURE_HEADER, sign(body.as_bytes(), SECRET.as_bytes()))
        .body(body.to_string())
        .send()
        .await
        .unwrap()
}
