//! Incremental change sync for markpub.
//!
//! Watches a user's cloud storage for changed Markdown documents and
//! publishes them:
//! - Storage API client (change pages, file content, share links)
//! - GitHub-flavored Markdown rendering
//! - Published-URL annotation, which doubles as the idempotency flag
//! - Per-user sync engine with cursor tracking and single-flight runs
//! - OAuth code exchange for newly authorized users

pub mod api_client;
pub mod config;
pub mod error;
pub mod marker;
pub mod oauth;
pub mod render;
pub mod sync_engine;
pub mod types;

pub use api_client::{DropboxClient, StorageClient};
pub use config::CloudConfig;
pub use error::{CloudError, CloudResult};
pub use oauth::{DropboxOAuth, OAuthProvider};
pub use render::{GfmRenderer, MarkdownRenderer};
pub use sync_engine::{SyncEngine, UserLocks};
pub use types::*;
