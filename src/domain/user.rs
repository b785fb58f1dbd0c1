use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

/// Users are identified by their unique username.
pub type Username = String;

/// An account owner. Owns a roster of friends and a list of transactions;
/// `cassa` is the running cash balance and is mutated only through the
/// transaction ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub username: Username,
    pub email: String,
    /// SHA-256 digest stored at registration. Verification belongs to the
    /// session layer, not to this crate.
    pub password_hash: Option<String>,
    pub cassa: Cents,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<Username>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: None,
            cassa: 0,
            created_at: Utc::now(),
        }
    }

    pub fn with_password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }
}
