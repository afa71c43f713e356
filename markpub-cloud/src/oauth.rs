//! OAuth2 authorization-code flow against the storage provider.
//!
//! Only the two halves the service needs: building the authorize URL that
//! `/login` redirects to, and exchanging the returned code for an access
//! token plus the provider's user id. CSRF state lives in the session layer,
//! which is not part of this crate.

use crate::config::CloudConfig;
use crate::error::{CloudError, CloudResult};
use crate::types::AuthorizedAccount;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

/// Issues access credentials for users completing authorization.
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    /// URL the user's browser is sent to in order to grant access.
    fn authorize_url(&self, redirect_uri: &str) -> String;

    /// Exchanges an authorization code for `(access_token, uid)`.
    async fn exchange_code(&self, code: &str, redirect_uri: &str)
    -> CloudResult<AuthorizedAccount>;
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Sent as a string by some API versions and a number by others.
    uid: serde_json::Value,
}

/// Authorization-code flow for a Dropbox app.
pub struct DropboxOAuth {
    client: Client,
    config: CloudConfig,
    app_key: String,
    app_secret: String,
}

impl DropboxOAuth {
    pub fn new(config: CloudConfig, app_key: String, app_secret: String) -> CloudResult<Self> {
        if app_key.is_empty() {
            return Err(CloudError::Config("app key is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            config,
            app_key,
            app_secret,
        })
    }
}

#[async_trait]
impl OAuthProvider for DropboxOAuth {
    fn authorize_url(&self, redirect_uri: &str) -> String {
        format!(
            "{}/1/oauth2/authorize?response_type=code&client_id={}&redirect_uri={}",
            self.config.oauth_base_url,
            urlencoding::encode(&self.app_key),
            urlencoding::encode(redirect_uri)
        )
    }

    async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> CloudResult<AuthorizedAccount> {
        let url = format!("{}/1/oauth2/token", self.config.api_base_url);
        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.app_key, Some(&self.app_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            let body = resp.text().await.unwrap_or_default();
            return Err(CloudError::AuthFailed(format!("code exchange rejected: {body}")));
        }
        let token: TokenResponse = resp
            .error_for_status()
            .map_err(|e| CloudError::Api(e.to_string()))?
            .json()
            .await?;

        let uid = match token.uid {
            serde_json::Value::String(s) => s,
            serde_json::Value::Number(n) => n.to_string(),
            other => {
                return Err(CloudError::Api(format!("unexpected uid in token response: {other}")));
            }
        };
        debug!("exchanged authorization code for user {uid}");

        Ok(AuthorizedAccount {
            access_token: token.access_token,
            uid,
        })
    }
}
