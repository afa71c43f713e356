//! Account persistence for markpub.
//!
//! Every authorized user owns two opaque values:
//! - an access credential, written once at authorization time
//! - a change cursor, advanced after every processed batch
//!
//! Both live in flat key-value maps keyed by the user identifier. Nothing
//! here interprets the values; they are handed back exactly as stored.
//!
//! # Backends
//!
//! - [`SqliteAccountStore`] persists to a SQLite file (or memory)
//! - [`MemoryAccountStore`] keeps everything in process, for tests and
//!   throwaway deployments

mod account_store;
mod error;

pub use account_store::{CredentialStore, CursorStore, MemoryAccountStore, SqliteAccountStore};
pub use error::{StoreError, StoreResult};
