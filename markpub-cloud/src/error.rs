//! Cloud sync error types.

use crate::types::SyncStage;
use thiserror::Error;

/// Result type for cloud operations.
pub type CloudResult<T> = Result<T, CloudError>;

/// Errors that can occur in cloud sync operations.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("no access credential stored for user {0}")]
    MissingCredential(String),

    #[error("API request failed: {0}")]
    Api(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("account store error: {0}")]
    Store(#[from] markpub_store::StoreError),

    #[error("file content is not valid UTF-8: {0}")]
    Decode(String),

    #[error("unrecognized share URL: {0}")]
    InvalidShareUrl(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("sync for user {uid} failed during {stage}: {source}")]
    RunFailed {
        uid: String,
        stage: SyncStage,
        #[source]
        source: Box<CloudError>,
    },
}

impl CloudError {
    /// Returns true for failures of the storage provider or the network.
    ///
    /// A run that fails this way leaves its last persisted cursor in place;
    /// the next trigger resumes from there.
    pub fn is_upstream(&self) -> bool {
        match self {
            CloudError::Api(_)
            | CloudError::AuthFailed(_)
            | CloudError::Http(_)
            | CloudError::Serialization(_)
            | CloudError::Store(_)
            | CloudError::Decode(_)
            | CloudError::InvalidShareUrl(_) => true,
            CloudError::RunFailed { source, .. } => source.is_upstream(),
            CloudError::MissingCredential(_) | CloudError::Config(_) => false,
        }
    }

    /// Returns true when the user has no stored credential.
    pub fn is_missing_credential(&self) -> bool {
        match self {
            CloudError::MissingCredential(_) => true,
            CloudError::RunFailed { source, .. } => source.is_missing_credential(),
            _ => false,
        }
    }

    /// The stage a failed run stopped at, if this error came out of a run.
    pub fn stage(&self) -> Option<SyncStage> {
        match self {
            CloudError::RunFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
