use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Username;

/// Database-assigned numeric id, unique within an owner's roster.
pub type FriendId = i64;

/// A friend in a user's carpool roster. The `score` tracks ride-sharing
/// fairness: it rises when the friend drives and falls when they ride along.
/// Only trip settlements may change it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friend {
    pub id: FriendId,
    pub nome: String,
    pub cognome: String,
    pub email: String,
    pub score: i64,
    /// Owning user; every lookup is scoped to this.
    pub owner: Username,
    pub created_at: DateTime<Utc>,
}

impl Friend {
    /// Build a new friend for the given owner. The id is assigned by the
    /// repository on insert.
    pub fn new(
        owner: Username,
        nome: impl Into<String>,
        cognome: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            nome: nome.into(),
            cognome: cognome.into(),
            email: email.into(),
            score: 0,
            owner,
            created_at: Utc::now(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.nome, self.cognome)
    }
}
