//! Platform sign-in state.
//!
//! Authentication itself belongs to the platform layer; this module only
//! tracks where the handshake is and turns its result into events. A failed
//! sign-in leaves the game running local-only.

use ballrush_gameplay::GameEvent;
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::save_record::SaveRecord;

/// Sign-in progress.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub enum AccountState {
    /// Never signed in this run.
    #[default]
    Anonymous,
    /// Waiting on the platform.
    Authenticating,
    /// Signed in; cloud sync allowed.
    SignedIn {
        /// Platform account id
        account_id: String,
    },
    /// Sign-in failed; local-only until the next attempt.
    Failed {
        /// Platform error text
        reason: String,
    },
}

impl AccountState {
    /// Marks a sign-in attempt as started. Returns `false` if one is running
    /// or already succeeded.
    pub fn begin_sign_in(&mut self) -> bool {
        match self {
            Self::Authenticating | Self::SignedIn { .. } => {
                debug!(state = ?self, "Sign-in already in progress or done");
                false
            },
            Self::Anonymous | Self::Failed { .. } => {
                *self = Self::Authenticating;
                true
            },
        }
    }

    /// Applies the platform's answer. Failures yield [`GameEvent::AuthFailed`].
    pub fn on_auth_result(&mut self, result: Result<String, String>) -> Option<GameEvent> {
        match result {
            Ok(account_id) => {
                info!(%account_id, "Signed in");
                *self = Self::SignedIn { account_id };
                None
            },
            Err(reason) => {
                warn!("Sign-in failed, continuing local-only: {reason}");
                *self = Self::Failed {
                    reason: reason.clone(),
                };
                Some(GameEvent::AuthFailed { reason })
            },
        }
    }

    /// Drops back to anonymous.
    pub fn sign_out(&mut self) {
        *self = Self::Anonymous;
    }

    /// Whether cloud sync may run.
    #[must_use]
    pub fn is_signed_in(&self) -> bool {
        matches!(self, Self::SignedIn { .. })
    }

    /// Platform account id, when signed in.
    #[must_use]
    pub fn account_id(&self) -> Option<&str> {
        match self {
            Self::SignedIn { account_id } => Some(account_id),
            _ => None,
        }
    }
}

/// Fresh random id for a local-only player.
#[must_use]
pub fn new_local_account_id() -> String {
    Uuid::new_v4().to_string()
}

/// Gives the record an account id if it has none. Returns `true` if one was
/// generated.
pub fn ensure_account_id(record: &mut SaveRecord) -> bool {
    if !record.account_id.is_empty() {
        return false;
    }
    record.account_id = new_local_account_id();
    info!(account_id = %record.account_id, "Created local account");
    true
}
