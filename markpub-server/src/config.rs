//! Service configuration, read once from the environment at startup.

use crate::error::{ServerError, ServerResult};
use markpub_cloud::CloudConfig;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "127.0.0.1:5000";
pub const DEFAULT_DATABASE: &str = "markpub.db";
pub const DEFAULT_MAX_CONCURRENT_SYNCS: usize = 8;

#[derive(Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// OAuth client id of the storage app.
    pub app_key: String,
    /// Shared secret for OAuth and webhook signatures.
    pub app_secret: String,
    /// SQLite file holding credentials and cursors.
    pub database_path: PathBuf,
    /// Upper bound on sync runs executing at once, across all users.
    pub max_concurrent_syncs: usize,
    pub cloud: CloudConfig,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_addr", &self.bind_addr)
            .field("app_key", &self.app_key)
            .field("app_secret", &"<redacted>")
            .field("database_path", &self.database_path)
            .field("max_concurrent_syncs", &self.max_concurrent_syncs)
            .field("cloud", &self.cloud)
            .finish()
    }
}

impl ServerConfig {
    /// Reads `APP_KEY` and `APP_SECRET` (required) plus the optional
    /// `MARKPUB_BIND`, `MARKPUB_DATABASE`, `MARKPUB_MAX_SYNCS`,
    /// `MARKPUB_API_URL` and `MARKPUB_CONTENT_URL`.
    pub fn from_env() -> ServerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ServerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            get(name).ok_or_else(|| ServerError::Config(format!("{name} is not set")))
        };

        let bind = get("MARKPUB_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind_addr: SocketAddr = bind
            .parse()
            .map_err(|e| ServerError::Config(format!("MARKPUB_BIND {bind:?}: {e}")))?;

        let max_concurrent_syncs = match get("MARKPUB_MAX_SYNCS") {
            None => DEFAULT_MAX_CONCURRENT_SYNCS,
            Some(raw) => match raw.parse::<usize>() {
                Ok(0) => {
                    return Err(ServerError::Config(
                        "MARKPUB_MAX_SYNCS must be at least 1".to_string(),
                    ));
                }
                Ok(n) => n,
                Err(e) => {
                    return Err(ServerError::Config(format!("MARKPUB_MAX_SYNCS {raw:?}: {e}")));
                }
            },
        };

        let mut cloud = CloudConfig::default();
        if let Some(url) = get("MARKPUB_API_URL") {
            cloud.api_base_url = url;
        }
        if let Some(url) = get("MARKPUB_CONTENT_URL") {
            cloud.content_base_url = url;
        }

        Ok(Self {
            bind_addr,
            app_key: required("APP_KEY")?,
            app_secret: required("APP_SECRET")?,
            database_path: get("MARKPUB_DATABASE")
                .unwrap_or_else(|| DEFAULT_DATABASE.to_string())
                .into(),
            max_concurrent_syncs,
            cloud,
        })
    }
}
