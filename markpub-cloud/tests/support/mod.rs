//! Shared test helpers: an in-memory storage provider with a change log.

#![allow(dead_code)]

use async_trait::async_trait;
use markpub_cloud::{
    ChangeBatch, ChangeEntry, CloudConfig, CloudError, CloudResult, FileMetadata, GfmRenderer,
    ShareLink, StorageClient, SyncEngine,
};
use markpub_store::{CredentialStore, MemoryAccountStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call observed by the mock, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Call {
    ListChanges(Option<String>),
    Read(String),
    Write(String),
    Share(String),
}

/// Operation a test can make fail.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailOn {
    ListChangesAfter(usize),
    Read(String),
    Write(String),
    Share(String),
}

#[derive(Default)]
struct State {
    files: HashMap<String, Vec<u8>>,
    log: Vec<ChangeEntry>,
    calls: Vec<Call>,
    failures: HashSet<FailOn>,
    list_calls: usize,
    shares: usize,
}

/// Storage provider whose cursor is an index into an append-only change log.
pub struct MockStorage {
    state: Mutex<State>,
    page_size: usize,
    /// When set, the engine's own writes show up as new changes.
    record_own_writes: bool,
    /// Artificial latency on `list_changes`, to widen race windows.
    list_delay: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockStorage {
    pub fn new(page_size: usize) -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size,
            record_own_writes: false,
            list_delay: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn recording_own_writes(mut self) -> Self {
        self.record_own_writes = true;
        self
    }

    pub fn with_list_delay(mut self, delay: Duration) -> Self {
        self.list_delay = Some(delay);
        self
    }

    /// Puts a file in storage and logs the change.
    pub fn put(&self, path: &str, content: &str) {
        self.put_bytes(path, content.as_bytes());
    }

    pub fn put_bytes(&self, path: &str, content: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.files.insert(path.to_string(), content.to_vec());
        state
            .log
            .push(ChangeEntry::new(path, Some(FileMetadata::file(path))));
    }

    /// Logs a change without storing content.
    pub fn log_change(&self, entry: ChangeEntry) {
        self.state.lock().unwrap().log.push(entry);
    }

    pub fn fail(&self, on: FailOn) {
        self.state.lock().unwrap().failures.insert(on);
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failures.clear();
    }

    pub fn file(&self, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(path)
            .map(|b| String::from_utf8(b.clone()).unwrap())
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn share_count(&self) -> usize {
        self.state.lock().unwrap().shares
    }

    pub fn writes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Write(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn head_cursor(&self) -> String {
        self.state.lock().unwrap().log.len().to_string()
    }

    pub fn max_concurrent_lists(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check(state: &State, on: FailOn) -> CloudResult<()> {
        if state.failures.contains(&on) {
            return Err(CloudError::Api(format!("injected failure: {on:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageClient for MockStorage {
    async fn list_changes(
        &self,
        _credential: &str,
        cursor: Option<&str>,
    ) -> CloudResult<ChangeBatch> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.list_delay {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(Call::ListChanges(cursor.map(str::to_string)));
            let call_index = state.list_calls;
            state.list_calls += 1;

            match Self::check(&state, FailOn::ListChangesAfter(call_index)) {
                Err(e) => Err(e),
                Ok(()) => {
                    let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
                    let end = (start + self.page_size).min(state.log.len());
                    Ok(ChangeBatch {
                        entries: state.log[start..end].to_vec(),
                        cursor: end.to_string(),
                        has_more: end < state.log.len(),
                    })
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn read_file(
        &self,
        _credential: &str,
        path: &str,
    ) -> CloudResult<(Vec<u8>, FileMetadata)> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Read(path.to_string()));
        Self::check(&state, FailOn::Read(path.to_string()))?;
        let content = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| CloudError::Api(format!("404 for {path}")))?;
        Ok((content, FileMetadata::file(path)))
    }

    async fn write_file(
        &self,
        _credential: &str,
        path: &str,
        content: Vec<u8>,
        overwrite: bool,
    ) -> CloudResult<FileMetadata> {
        assert!(overwrite, "engine must always overwrite");
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Write(path.to_string()));
        Self::check(&state, FailOn::Write(path.to_string()))?;
        state.files.insert(path.to_string(), content);
        if self.record_own_writes {
            state
                .log
                .push(ChangeEntry::new(path, Some(FileMetadata::file(path))));
        }
        Ok(FileMetadata::file(path))
    }

    async fn create_share_link(
        &self,
        _credential: &str,
        path: &str,
        short_url: bool,
    ) -> CloudResult<ShareLink> {
        assert!(!short_url, "engine must request long share urls");
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Share(path.to_string()));
        Self::check(&state, FailOn::Share(path.to_string()))?;
        state.shares += 1;
        let name = path.rsplit('/').next().unwrap_or(path);
        Ok(ShareLink {
            url: format!("https://www.dropbox.com/s/key{}/{name}", state.shares),
            expires: None,
        })
    }
}

pub const UID: &str = "12345";

/// Engine over `storage` with one authorized user, [`UID`].
pub fn engine_with(storage: Arc<MockStorage>) -> (SyncEngine, Arc<MemoryAccountStore>) {
    let accounts = Arc::new(MemoryAccountStore::new());
    accounts.set_credential(UID, "token-abc").unwrap();
    let engine = SyncEngine::new(
        storage,
        Arc::new(GfmRenderer),
        accounts.clone(),
        accounts.clone(),
        &CloudConfig::default(),
    );
    (engine, accounts)
}
