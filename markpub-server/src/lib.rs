//! markpub HTTP service.
//!
//! Accepts signed change notifications, schedules one background sync per
//! referenced user, and runs the authorization round trip that registers new
//! users.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod notification;
pub mod routes;
pub mod signature;
pub mod state;

pub use config::ServerConfig;
pub use dispatcher::{Scheduled, SyncDispatcher};
pub use error::{ServerError, ServerResult};
pub use routes::router;
pub use signature::{SIGNATURE_HEADER, sign, verify_signature};
pub use state::AppState;
