//! HTTP routes: webhook intake and the authorization round trip.

use crate::error::{ServerError, ServerResult};
use crate::notification::Notification;
use crate::signature::{SIGNATURE_HEADER, verify_signature};
use crate::state::AppState;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde::Deserialize;
use tracing::{info, warn};

pub const WEBHOOK_PATH: &str = "/webhook";
pub const LOGIN_PATH: &str = "/login";
pub const CALLBACK_PATH: &str = "/oauth_callback";
pub const DONE_PATH: &str = "/done";

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, get(webhook_challenge).post(webhook_notify))
        .route(LOGIN_PATH, get(login))
        .route(CALLBACK_PATH, get(oauth_callback))
        .route(DONE_PATH, get(done))
        .with_state(state)
}

#[derive(Deserialize)]
struct ChallengeQuery {
    challenge: Option<String>,
}

/// Registration handshake: echo the challenge back as plain text.
async fn webhook_challenge(Query(query): Query<ChallengeQuery>) -> String {
    query.challenge.unwrap_or_default()
}

/// Verifies a change notification and schedules a sync per listed user.
async fn webhook_notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .ok_or(ServerError::MissingSignature)?
        .to_str()
        .map_err(|_| ServerError::InvalidSignature)?;
    if !verify_signature(&body, signature, state.app_secret()) {
        warn!("rejected notification with invalid signature");
        return Err(ServerError::InvalidSignature);
    }

    let uids = Notification::parse(&body)?.uids();
    for uid in &uids {
        state.dispatcher.schedule(uid);
    }
    info!("accepted notification for {} users", uids.len());
    Ok(StatusCode::OK)
}

async fn login(State(state): State<AppState>, headers: HeaderMap) -> Response {
    found(&state.oauth.authorize_url(&callback_url(&headers)))
}

#[derive(Deserialize)]
struct CallbackQuery {
    code: Option<String>,
}

/// Stores the new user's credential and publishes their documents once
/// before sending them on.
async fn oauth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<CallbackQuery>,
) -> ServerResult<Response> {
    let code = query
        .code
        .filter(|c| !c.is_empty())
        .ok_or(ServerError::MissingCode)?;

    let account = state
        .oauth
        .exchange_code(&code, &callback_url(&headers))
        .await
        .map_err(ServerError::OAuth)?;
    state
        .credentials
        .set_credential(&account.uid, &account.access_token)?;
    info!(uid = %account.uid, "user authorized");

    if let Err(e) = state.engine.run(&account.uid).await {
        warn!(uid = %account.uid, "initial sync did not complete: {e}");
    }
    Ok(found(DONE_PATH))
}

async fn done() -> &'static str {
    "Done! Markdown files in your app folder will now be published as HTML."
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn callback_url(headers: &HeaderMap) -> String {
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    redirect_uri(host)
}

/// Absolute callback URL for `host`; plain http only for local hosts.
pub fn redirect_uri(host: &str) -> String {
    let name = host.split(':').next().unwrap_or(host);
    let scheme = if name == "127.0.0.1" || name == "localhost" {
        "http"
    } else {
        "https"
    };
    format!("{scheme}://{host}{CALLBACK_PATH}")
}
