use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::{Cents, Username};

/// Database-assigned numeric id, unique within an owner's transactions.
pub type TransazioneId = i64;

/// A cash transaction. `costo` is signed: a positive amount flows into the
/// owner's cassa, a negative one out of it. Creating, editing or deleting a
/// transazione must always be persisted together with the matching cassa
/// adjustment on the owner (see the ledger module).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transazione {
    pub id: TransazioneId,
    pub titolo: String,
    pub descrizione: String,
    /// The day the transaction happened in the real world.
    pub data: NaiveDate,
    pub costo: Cents,
    pub owner: Username,
    pub created_at: DateTime<Utc>,
}

impl Transazione {
    /// Build a new transaction for the given owner. The id is assigned by
    /// the repository on insert.
    pub fn new(owner: Username, titolo: impl Into<String>, data: NaiveDate, costo: Cents) -> Self {
        Self {
            id: 0,
            titolo: titolo.into(),
            descrizione: String::new(),
            data,
            costo,
            owner,
            created_at: Utc::now(),
        }
    }

    pub fn with_descrizione(mut self, descrizione: impl Into<String>) -> Self {
        self.descrizione = descrizione.into();
        self
    }
}
