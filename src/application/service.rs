use std::collections::BTreeSet;

use chrono::NaiveDate;
use sha2::{Digest, Sha256};

use crate::domain::{
    audit_cassa, settle_trip, CassaAudit, Cents, Friend, FriendId, ScoreDeltas, Transazione,
    TransazioneId, User,
};
use crate::storage::Repository;

use super::AppError;

/// Application service providing high-level operations for the tracker.
/// This is the primary interface for any client (CLI, API, TUI, etc.).
///
/// Every operation takes the owning username explicitly; there is no notion
/// of a current session here.
pub struct TrackerService {
    repo: Repository,
}

/// A trip to settle: the distance plus the driver/passenger partition of the
/// owner's roster. Trips are never persisted; only their score deltas are.
#[derive(Debug, Clone)]
pub struct TripPlan {
    pub distance: f64,
    pub drivers: Vec<FriendId>,
    pub passengers: Vec<FriendId>,
}

/// One participant of a settled trip: the friend as stored after the
/// settlement, and the delta that was applied.
#[derive(Debug)]
pub struct SettledParticipant {
    pub friend: Friend,
    pub delta: i64,
}

/// Result of settling a trip.
#[derive(Debug)]
pub struct TripOutcome {
    pub distance: f64,
    pub participants: Vec<SettledParticipant>,
}

/// Result of a transaction create/edit/delete: the transaction involved and
/// the owner's cassa after the operation.
#[derive(Debug)]
pub struct TransazioneOutcome {
    pub transazione: Transazione,
    pub cassa: Cents,
}

/// Everything the dashboard shows for one user.
#[derive(Debug)]
pub struct Dashboard {
    pub user: User,
    /// Roster ordered by score, best first.
    pub friends: Vec<Friend>,
    pub best_friends: Vec<Friend>,
    pub worst_friends: Vec<Friend>,
    /// Transactions, most recent date first.
    pub transazioni: Vec<Transazione>,
}

/// Per-user snapshot used by the JSON export.
#[derive(serde::Serialize)]
pub struct Snapshot {
    pub user: User,
    pub friends: Vec<Friend>,
    pub transazioni: Vec<Transazione>,
}

impl TrackerService {
    /// Create a new tracker service with the given repository.
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// Initialize a new database at the given path.
    pub async fn init(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let repo = Repository::init(&db_url).await?;
        Ok(Self::new(repo))
    }

    /// Connect to an existing database.
    pub async fn connect(database_path: &str) -> Result<Self, AppError> {
        let db_url = format!("sqlite:{}", database_path);
        let repo = Repository::connect(&db_url).await?;
        Ok(Self::new(repo))
    }

    // ========================
    // User operations
    // ========================

    /// Register a new user. The password, when given, is stored as a SHA-256
    /// digest; this crate never verifies it.
    pub async fn register_user(
        &self,
        username: String,
        email: String,
        password: Option<&str>,
    ) -> Result<User, AppError> {
        if self.repo.get_user(&username).await?.is_some() {
            return Err(AppError::UserAlreadyExists(username));
        }

        let mut user = User::new(username, email);
        if let Some(password) = password {
            user = user.with_password_hash(format!("{:x}", Sha256::digest(password.as_bytes())));
        }

        self.repo.save_user(&user).await?;
        Ok(user)
    }

    pub async fn get_user(&self, username: &str) -> Result<User, AppError> {
        self.repo
            .get_user(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        Ok(self.repo.list_users().await?)
    }

    // ========================
    // Friend operations
    // ========================

    /// Add a friend to the owner's roster.
    pub async fn add_friend(
        &self,
        owner: &str,
        nome: String,
        cognome: String,
        email: String,
    ) -> Result<Friend, AppError> {
        let user = self.get_user(owner).await?;
        let mut friend = Friend::new(user.username, nome, cognome, email);
        self.repo.save_friend(&mut friend).await?;
        Ok(friend)
    }

    pub async fn get_friend(&self, owner: &str, id: FriendId) -> Result<Friend, AppError> {
        self.get_user(owner).await?;
        self.repo
            .get_friend(owner, id)
            .await?
            .ok_or(AppError::FriendNotFound(id))
    }

    /// List the owner's roster, ordered by score, best first.
    pub async fn list_friends(&self, owner: &str) -> Result<Vec<Friend>, AppError> {
        self.get_user(owner).await?;
        Ok(self.repo.list_friends(owner).await?)
    }

    /// Update a friend's profile fields. Scores can only move through trip
    /// settlements.
    pub async fn edit_friend(
        &self,
        owner: &str,
        id: FriendId,
        nome: Option<String>,
        cognome: Option<String>,
        email: Option<String>,
    ) -> Result<Friend, AppError> {
        let mut friend = self.get_friend(owner, id).await?;
        if let Some(nome) = nome {
            friend.nome = nome;
        }
        if let Some(cognome) = cognome {
            friend.cognome = cognome;
        }
        if let Some(email) = email {
            friend.email = email;
        }
        self.repo.update_friend_profile(&friend).await?;
        Ok(friend)
    }

    /// Remove a friend from the roster.
    pub async fn delete_friend(&self, owner: &str, id: FriendId) -> Result<Friend, AppError> {
        let friend = self.get_friend(owner, id).await?;
        self.repo.delete_friend(owner, id).await?;
        Ok(friend)
    }

    // ========================
    // Trip settlement
    // ========================

    /// Settle a trip for the owner: validate the driver/passenger partition,
    /// compute score deltas and apply them to the roster in a single
    /// transactional write group. A validation failure changes nothing.
    pub async fn record_trip(&self, owner: &str, plan: &TripPlan) -> Result<TripOutcome, AppError> {
        if !plan.distance.is_finite() || plan.distance < 0.0 {
            return Err(AppError::InvalidDistance(
                "must be a non-negative number".to_string(),
            ));
        }

        self.get_user(owner).await?;
        let roster = self.repo.list_friends(owner).await?;
        let eligible: BTreeSet<FriendId> = roster.iter().map(|f| f.id).collect();

        let deltas = settle_trip(plan.distance, &plan.drivers, &plan.passengers, &eligible)?;

        self.repo.apply_score_deltas(owner, &deltas).await?;

        let updated = self.repo.list_friends(owner).await?;
        let participants = collect_participants(updated, &deltas);

        Ok(TripOutcome {
            distance: plan.distance,
            participants,
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Record a new transaction; the owner's cassa moves by `costo` in the
    /// same write group.
    pub async fn add_transazione(
        &self,
        owner: &str,
        titolo: String,
        descrizione: String,
        data: NaiveDate,
        costo: Cents,
    ) -> Result<TransazioneOutcome, AppError> {
        let user = self.get_user(owner).await?;
        let mut transazione =
            Transazione::new(user.username, titolo, data, costo).with_descrizione(descrizione);
        let cassa = self.repo.insert_transazione(&mut transazione).await?;
        Ok(TransazioneOutcome { transazione, cassa })
    }

    pub async fn get_transazione(
        &self,
        owner: &str,
        id: TransazioneId,
    ) -> Result<Transazione, AppError> {
        self.get_user(owner).await?;
        self.repo
            .get_transazione(owner, id)
            .await?
            .ok_or(AppError::TransazioneNotFound(id))
    }

    /// List the owner's transactions, most recent date first.
    pub async fn list_transazioni(&self, owner: &str) -> Result<Vec<Transazione>, AppError> {
        self.get_user(owner).await?;
        Ok(self.repo.list_transazioni(owner).await?)
    }

    /// Edit a transaction. The cassa absorbs the cost difference as one net
    /// adjustment; no intermediate balance is ever persisted.
    pub async fn edit_transazione(
        &self,
        owner: &str,
        id: TransazioneId,
        titolo: Option<String>,
        descrizione: Option<String>,
        data: Option<NaiveDate>,
        costo: Option<Cents>,
    ) -> Result<TransazioneOutcome, AppError> {
        let mut transazione = self.get_transazione(owner, id).await?;
        if let Some(titolo) = titolo {
            transazione.titolo = titolo;
        }
        if let Some(descrizione) = descrizione {
            transazione.descrizione = descrizione;
        }
        if let Some(data) = data {
            transazione.data = data;
        }
        if let Some(costo) = costo {
            transazione.costo = costo;
        }

        let cassa = self
            .repo
            .update_transazione(&transazione)
            .await?
            .ok_or(AppError::TransazioneNotFound(id))?;
        Ok(TransazioneOutcome { transazione, cassa })
    }

    /// Delete a transaction, removing its costo from the cassa in the same
    /// write group.
    pub async fn delete_transazione(
        &self,
        owner: &str,
        id: TransazioneId,
    ) -> Result<TransazioneOutcome, AppError> {
        let transazione = self.get_transazione(owner, id).await?;
        let cassa = self
            .repo
            .delete_transazione(owner, id)
            .await?
            .ok_or(AppError::TransazioneNotFound(id))?;
        Ok(TransazioneOutcome { transazione, cassa })
    }

    // ========================
    // Views
    // ========================

    /// Assemble the dashboard for one user: roster by score with the two
    /// best and two worst friends called out, plus recent transactions.
    pub async fn dashboard(&self, owner: &str) -> Result<Dashboard, AppError> {
        let user = self.get_user(owner).await?;
        let friends = self.repo.list_friends(owner).await?;
        let transazioni = self.repo.list_transazioni(owner).await?;

        let best_friends: Vec<Friend> = friends.iter().take(2).cloned().collect();
        let worst_friends: Vec<Friend> = friends
            .iter()
            .rev()
            .take(2)
            .rev()
            .cloned()
            .collect();

        Ok(Dashboard {
            user,
            friends,
            best_friends,
            worst_friends,
            transazioni,
        })
    }

    /// Check that the stored cassa matches the sum of the owner's live
    /// transactions.
    pub async fn audit(&self, owner: &str) -> Result<CassaAudit, AppError> {
        let user = self.get_user(owner).await?;
        let transazioni = self.repo.list_transazioni(owner).await?;
        Ok(audit_cassa(user.cassa, &transazioni))
    }

    /// Full snapshot of one user's data, for export.
    pub async fn snapshot(&self, owner: &str) -> Result<Snapshot, AppError> {
        let user = self.get_user(owner).await?;
        let friends = self.repo.list_friends(owner).await?;
        let transazioni = self.repo.list_transazioni(owner).await?;
        Ok(Snapshot {
            user,
            friends,
            transazioni,
        })
    }
}

/// Pair each settled friend with the delta that was applied to it.
fn collect_participants(roster: Vec<Friend>, deltas: &ScoreDeltas) -> Vec<SettledParticipant> {
    roster
        .into_iter()
        .filter_map(|friend| {
            deltas.get(&friend.id).map(|&delta| SettledParticipant { friend, delta })
        })
        .collect()
}
