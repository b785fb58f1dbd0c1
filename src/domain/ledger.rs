use super::{Cents, Transazione};

/// Cassa arithmetic for the transaction lifecycle. Each function returns the
/// new balance; persisting it together with the transaction row is the
/// repository's job. None of these can fail on well-typed input.
///
/// Invariant: a user's cassa equals the sum of the `costo` of their live
/// transactions. [`audit_cassa`] checks it.
pub fn cassa_after_create(cassa: Cents, costo: Cents) -> Cents {
    cassa + costo
}

/// Net adjustment for an edit, in one step. The intermediate
/// "old costo removed, new not yet added" balance never exists.
pub fn cassa_after_update(cassa: Cents, old_costo: Cents, new_costo: Cents) -> Cents {
    cassa - old_costo + new_costo
}

pub fn cassa_after_delete(cassa: Cents, costo: Cents) -> Cents {
    cassa - costo
}

/// Recompute a cassa from scratch by summing live transactions.
pub fn recompute_cassa(transazioni: &[Transazione]) -> Cents {
    transazioni.iter().map(|t| t.costo).sum()
}

/// Comparison of a stored cassa against the sum of the transactions that
/// should back it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CassaAudit {
    pub stored: Cents,
    pub computed: Cents,
}

impl CassaAudit {
    pub fn is_consistent(&self) -> bool {
        self.stored == self.computed
    }

    /// How far the stored balance has drifted from the transaction log.
    pub fn drift(&self) -> Cents {
        self.stored - self.computed
    }
}

pub fn audit_cassa(stored: Cents, transazioni: &[Transazione]) -> CassaAudit {
    CassaAudit {
        stored,
        computed: recompute_cassa(transazioni),
    }
}
