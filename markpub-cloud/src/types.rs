//! Shared types for change sync.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Metadata the provider reports for a file or folder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    #[serde(default)]
    pub path: String,
    pub is_dir: bool,
    #[serde(default)]
    pub rev: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    /// RFC 2822 timestamp as sent by the provider.
    #[serde(default)]
    pub modified: Option<String>,
}

impl FileMetadata {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_dir: false,
            rev: None,
            bytes: None,
            modified: None,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            is_dir: true,
            ..Self::file(path)
        }
    }
}

/// One reported filesystem event.
///
/// On the wire this is a two-element array `[path, metadata]`, where a
/// `null` metadata means the path was deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(String, Option<FileMetadata>)",
    into = "(String, Option<FileMetadata>)"
)]
pub struct ChangeEntry {
    pub path: String,
    pub metadata: Option<FileMetadata>,
}

impl ChangeEntry {
    pub fn new(path: impl Into<String>, metadata: Option<FileMetadata>) -> Self {
        Self {
            path: path.into(),
            metadata,
        }
    }

    pub fn deleted(path: impl Into<String>) -> Self {
        Self::new(path, None)
    }

    pub fn is_deleted(&self) -> bool {
        self.metadata.is_none()
    }

    pub fn is_dir(&self) -> bool {
        self.metadata.as_ref().is_some_and(|m| m.is_dir)
    }
}

impl From<(String, Option<FileMetadata>)> for ChangeEntry {
    fn from((path, metadata): (String, Option<FileMetadata>)) -> Self {
        Self { path, metadata }
    }
}

impl From<ChangeEntry> for (String, Option<FileMetadata>) {
    fn from(entry: ChangeEntry) -> Self {
        (entry.path, entry.metadata)
    }
}

/// One page of changes since a cursor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub entries: Vec<ChangeEntry>,
    pub cursor: String,
    pub has_more: bool,
}

/// A public link returned by the provider for a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareLink {
    pub url: String,
    #[serde(default)]
    pub expires: Option<String>,
}

/// Credential and identity issued when a user completes authorization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthorizedAccount {
    pub access_token: String,
    pub uid: String,
}

/// A Markdown document that was published during a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PublishedArtifact {
    pub source_path: String,
    pub html_path: String,
    pub share_url: String,
    pub download_url: String,
}

/// Point in a run where a failure happened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStage {
    LoadAccount,
    ListChanges,
    ReadFile,
    Decode,
    WriteHtml,
    CreateShareLink,
    Annotate,
    SaveCursor,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStage::LoadAccount => "load_account",
            SyncStage::ListChanges => "list_changes",
            SyncStage::ReadFile => "read_file",
            SyncStage::Decode => "decode",
            SyncStage::WriteHtml => "write_html",
            SyncStage::CreateShareLink => "create_share_link",
            SyncStage::Annotate => "annotate",
            SyncStage::SaveCursor => "save_cursor",
        };
        f.write_str(name)
    }
}

/// Outcome of one completed `SyncEngine::run`.
#[derive(Clone, Debug, Serialize)]
pub struct SyncReport {
    pub uid: String,
    pub run_id: uuid::Uuid,
    pub batches: usize,
    pub entries_seen: usize,
    /// Deletions, folders, and non-Markdown paths.
    pub skipped: usize,
    /// Documents rendered to HTML (published or not).
    pub rendered: usize,
    pub published: Vec<PublishedArtifact>,
    /// Documents whose first line already carried the marker.
    pub already_published: usize,
    pub final_cursor: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub(crate) fn start(uid: &str, cursor: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            uid: uid.to_string(),
            run_id: uuid::Uuid::now_v7(),
            batches: 0,
            entries_seen: 0,
            skipped: 0,
            rendered: 0,
            published: Vec::new(),
            already_published: 0,
            final_cursor: cursor,
            started_at: now,
            finished_at: now,
        }
    }
}
