//! Incremental publish-and-annotate sync for one user.
//!
//! A run pages through every change since the user's stored cursor. Each
//! changed Markdown document is rendered to a sibling `.html` file, and the
//! first time a document is seen it gets a public link plus an annotation
//! comment pointing at it. The cursor is persisted after each batch.
//!
//! # Invariants
//!
//! - Deletions, folders, and non-Markdown paths never touch storage.
//! - A document whose first line is the marker is never annotated again.
//! - The cursor for a batch is saved only after every entry in it succeeded,
//!   and before the next batch is requested.
//! - At most one run per user executes at a time (see [`UserLocks`]).

use crate::api_client::StorageClient;
use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::marker;
use crate::render::MarkdownRenderer;
use crate::types::*;
use chrono::Utc;
use markpub_store::{CredentialStore, CursorStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, error, info};

type TokioMutex<T> = tokio::sync::Mutex<T>;

/// Keyed async locks, one per user id.
///
/// Entries nobody holds or waits on are pruned whenever a new lock is
/// handed out, so the map only grows with concurrently active users.
#[derive(Default)]
pub struct UserLocks {
    locks: Mutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

impl UserLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no other holder has `uid`, then returns the guard.
    pub async fn acquire(&self, uid: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            Arc::clone(locks.entry(uid.to_string()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of users with a held or awaited lock.
    pub fn active(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}

/// What happened to one relevant change entry.
enum EntryOutcome {
    Published(PublishedArtifact),
    AlreadyPublished,
}

/// Publishes changed Markdown documents and advances per-user cursors.
pub struct SyncEngine {
    storage: Arc<dyn StorageClient>,
    renderer: Arc<dyn MarkdownRenderer>,
    credentials: Arc<dyn CredentialStore>,
    cursors: Arc<dyn CursorStore>,
    download_base_url: String,
    locks: UserLocks,
}

impl SyncEngine {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        renderer: Arc<dyn MarkdownRenderer>,
        credentials: Arc<dyn CredentialStore>,
        cursors: Arc<dyn CursorStore>,
        config: &CloudConfig,
    ) -> Self {
        Self {
            storage,
            renderer,
            credentials,
            cursors,
            download_base_url: config.download_base_url.clone(),
            locks: UserLocks::new(),
        }
    }

    /// Number of users with a run in progress or waiting to start.
    pub fn active_users(&self) -> usize {
        self.locks.active()
    }

    /// Brings one user's published HTML in line with their Markdown sources.
    ///
    /// Concurrent calls for the same `uid` run one after another; the later
    /// call resumes from whatever cursor the earlier one persisted.
    pub async fn run(&self, uid: &str) -> CloudResult<SyncReport> {
        let _guard = self.locks.acquire(uid).await;

        let result = self.run_exclusive(uid).await;
        match &result {
            Ok(report) => info!(
                uid = %uid,
                run_id = %report.run_id,
                "sync finished: {} batches, {} entries, {} published, {} already published",
                report.batches,
                report.entries_seen,
                report.published.len(),
                report.already_published
            ),
            Err(e) => match e.stage() {
                Some(stage) => error!(uid = %uid, stage = %stage, "sync failed: {e}"),
                None => error!(uid = %uid, "sync failed: {e}"),
            },
        }
        result
    }

    async fn run_exclusive(&self, uid: &str) -> CloudResult<SyncReport> {
        let credential = self
            .credentials
            .credential(uid)
            .map_err(|e| run_failed(uid, SyncStage::LoadAccount, e.into()))?
            .ok_or_else(|| CloudError::MissingCredential(uid.to_string()))?;
        let mut cursor = self
            .cursors
            .cursor(uid)
            .map_err(|e| run_failed(uid, SyncStage::LoadAccount, e.into()))?;

        let mut report = SyncReport::start(uid, cursor.clone());
        debug!(uid = %uid, run_id = %report.run_id, "starting sync from cursor {cursor:?}");

        loop {
            let batch = self
                .storage
                .list_changes(&credential, cursor.as_deref())
                .await
                .map_err(|e| run_failed(uid, SyncStage::ListChanges, e))?;
            report.batches += 1;

            for entry in &batch.entries {
                report.entries_seen += 1;
                if !is_publishable(entry) {
                    debug!(path = %entry.path, "skipping change entry");
                    report.skipped += 1;
                    continue;
                }

                let outcome = self
                    .publish_entry(&credential, &entry.path)
                    .await
                    .map_err(|(stage, e)| run_failed(uid, stage, e))?;
                report.rendered += 1;
                match outcome {
                    EntryOutcome::Published(artifact) => report.published.push(artifact),
                    EntryOutcome::AlreadyPublished => report.already_published += 1,
                }
            }

            self.cursors
                .set_cursor(uid, &batch.cursor)
                .map_err(|e| run_failed(uid, SyncStage::SaveCursor, e.into()))?;
            cursor = Some(batch.cursor);

            if !batch.has_more {
                break;
            }
        }

        report.final_cursor = cursor;
        report.finished_at = Utc::now();
        Ok(report)
    }

    /// Renders one document, and annotates it if it has never been published.
    async fn publish_entry(
        &self,
        credential: &str,
        path: &str,
    ) -> Result<EntryOutcome, (SyncStage, CloudError)> {
        let (content, _metadata) = self
            .storage
            .read_file(credential, path)
            .await
            .map_err(|e| (SyncStage::ReadFile, e))?;
        let markdown = String::from_utf8(content)
            .map_err(|e| (SyncStage::Decode, CloudError::Decode(format!("{path}: {e}"))))?;

        let html = self.renderer.render(&markdown);
        let html_path = marker::html_path_for(path);
        self.storage
            .write_file(credential, &html_path, html.into_bytes(), true)
            .await
            .map_err(|e| (SyncStage::WriteHtml, e))?;

        if marker::is_published(&markdown) {
            debug!(path = %path, "already published, html refreshed");
            return Ok(EntryOutcome::AlreadyPublished);
        }

        let share = self
            .storage
            .create_share_link(credential, &html_path, false)
            .await
            .map_err(|e| (SyncStage::CreateShareLink, e))?;
        let file_key =
            marker::file_key_from_share_url(&share.url).map_err(|e| (SyncStage::CreateShareLink, e))?;
        let download_url = marker::download_url(&self.download_base_url, file_key, &html_path);

        let annotated = marker::annotate(&markdown, &download_url);
        self.storage
            .write_file(credential, path, annotated.into_bytes(), true)
            .await
            .map_err(|e| (SyncStage::Annotate, e))?;

        info!(path = %path, "published {download_url}");
        Ok(EntryOutcome::Published(PublishedArtifact {
            source_path: path.to_string(),
            html_path,
            share_url: share.url,
            download_url,
        }))
    }
}

/// Live, non-folder Markdown files only.
pub fn is_publishable(entry: &ChangeEntry) -> bool {
    match &entry.metadata {
        Some(metadata) => !metadata.is_dir && marker::is_markdown_path(&entry.path),
        None => false,
    }
}

fn run_failed(uid: &str, stage: SyncStage, source: CloudError) -> CloudError {
    CloudError::RunFailed {
        uid: uid.to_string(),
        stage,
        source: Box::new(source),
    }
}
