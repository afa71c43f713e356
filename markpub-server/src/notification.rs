//! Change notification payload.

use crate::error::{ServerError, ServerResult};
use serde::Deserialize;
use std::fmt;

/// Body of a change notification: `{"delta": {"users": [uid, ...]}}`.
#[derive(Debug, Deserialize)]
pub struct Notification {
    pub delta: DeltaNotice,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeltaNotice {
    #[serde(default)]
    pub users: Vec<UserId>,
}

/// A user id as sent by the notifier: usually a number, sometimes a string.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UserId {
    Number(u64),
    Text(String),
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserId::Number(n) => write!(f, "{n}"),
            UserId::Text(s) => f.write_str(s),
        }
    }
}

impl Notification {
    pub fn parse(body: &[u8]) -> ServerResult<Self> {
        serde_json::from_slice(body).map_err(|e| ServerError::InvalidPayload(e.to_string()))
    }

    /// Distinct user ids in arrival order.
    pub fn uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = Vec::with_capacity(self.delta.users.len());
        for uid in self.delta.users.iter().map(ToString::to_string) {
            if !uid.is_empty() && !uids.contains(&uid) {
                uids.push(uid);
            }
        }
        uids
    }
}
