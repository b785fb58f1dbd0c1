use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Cents, Friend, FriendId, ScoreDeltas, Transazione, TransazioneId, User, cassa_after_create,
    cassa_after_delete, cassa_after_update,
};

use super::MIGRATION_001_INITIAL;

/// Repository for persisting and querying users, friends and transactions.
///
/// Ownership is an explicit foreign key: every friend/transaction query is
/// scoped to its owner. Operations that touch more than one row (a trip's
/// score deltas, a transaction plus the owner's cassa) run inside a single
/// SQLite transaction, so they apply all-or-nothing; SQLite's write lock is
/// the serialization boundary between concurrent operations on the same
/// database.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // User operations
    // ========================

    /// Save a new user to the database.
    pub async fn save_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash, cassa, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.cassa)
        .bind(user.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save user")?;
        Ok(())
    }

    /// Get a user by username.
    pub async fn get_user(&self, username: &str) -> Result<Option<User>> {
        let row = sqlx::query(
            r#"
            SELECT username, email, password_hash, cassa, created_at
            FROM users
            WHERE username = ?
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch user")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_user(&row)?)),
            None => Ok(None),
        }
    }

    /// List all users.
    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            "SELECT username, email, password_hash, cassa, created_at FROM users ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list users")?;

        rows.iter().map(Self::row_to_user).collect()
    }

    fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
        let created_at_str: String = row.get("created_at");
        Ok(User {
            username: row.get("username"),
            email: row.get("email"),
            password_hash: row.get("password_hash"),
            cassa: row.get("cassa"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Friend operations
    // ========================

    /// Save a new friend and assign its database id.
    pub async fn save_friend(&self, friend: &mut Friend) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO friends (owner, nome, cognome, email, score, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&friend.owner)
        .bind(&friend.nome)
        .bind(&friend.cognome)
        .bind(&friend.email)
        .bind(friend.score)
        .bind(friend.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save friend")?;

        friend.id = result.last_insert_rowid();
        Ok(())
    }

    /// Get a friend by id, scoped to its owner.
    pub async fn get_friend(&self, owner: &str, id: FriendId) -> Result<Option<Friend>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, nome, cognome, email, score, created_at
            FROM friends
            WHERE owner = ? AND id = ?
            "#,
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch friend")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_friend(&row)?)),
            None => Ok(None),
        }
    }

    /// List an owner's roster, best score first.
    pub async fn list_friends(&self, owner: &str) -> Result<Vec<Friend>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, nome, cognome, email, score, created_at
            FROM friends
            WHERE owner = ?
            ORDER BY score DESC, id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list friends")?;

        rows.iter().map(Self::row_to_friend).collect()
    }

    /// Update a friend's profile fields. The score is deliberately not
    /// touched here; it only moves through [`apply_score_deltas`].
    ///
    /// [`apply_score_deltas`]: Repository::apply_score_deltas
    pub async fn update_friend_profile(&self, friend: &Friend) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE friends
            SET nome = ?, cognome = ?, email = ?
            WHERE owner = ? AND id = ?
            "#,
        )
        .bind(&friend.nome)
        .bind(&friend.cognome)
        .bind(&friend.email)
        .bind(&friend.owner)
        .bind(friend.id)
        .execute(&self.pool)
        .await
        .context("Failed to update friend")?;
        Ok(())
    }

    /// Delete a friend from the owner's roster.
    pub async fn delete_friend(&self, owner: &str, id: FriendId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM friends WHERE owner = ? AND id = ?")
            .bind(owner)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete friend")?;
        Ok(result.rows_affected() > 0)
    }

    /// Apply a settlement's score deltas to the owner's roster as one
    /// all-or-nothing write group. Scores are adjusted in place
    /// (`score = score + delta`) so no concurrent settlement can be lost.
    pub async fn apply_score_deltas(&self, owner: &str, deltas: &ScoreDeltas) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin settlement transaction")?;

        for (&id, &delta) in deltas {
            let result = sqlx::query(
                "UPDATE friends SET score = score + ? WHERE owner = ? AND id = ?",
            )
            .bind(delta)
            .bind(owner)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to apply score delta")?;

            if result.rows_affected() == 0 {
                bail!("friend {} disappeared while settling a trip", id);
            }
        }

        tx.commit()
            .await
            .context("Failed to commit settlement transaction")?;
        Ok(())
    }

    fn row_to_friend(row: &sqlx::sqlite::SqliteRow) -> Result<Friend> {
        let created_at_str: String = row.get("created_at");
        Ok(Friend {
            id: row.get("id"),
            owner: row.get("owner"),
            nome: row.get("nome"),
            cognome: row.get("cognome"),
            email: row.get("email"),
            score: row.get("score"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }

    // ========================
    // Transaction operations
    // ========================

    /// Insert a transaction and move the owner's cassa by its costo, in one
    /// write group. Assigns the database id and returns the new cassa.
    pub async fn insert_transazione(&self, transazione: &mut Transazione) -> Result<Cents> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction write group")?;

        let cassa: Cents = sqlx::query("SELECT cassa FROM users WHERE username = ?")
            .bind(&transazione.owner)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read cassa")?
            .get("cassa");

        let result = sqlx::query(
            r#"
            INSERT INTO transazioni (owner, titolo, descrizione, data, costo, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&transazione.owner)
        .bind(&transazione.titolo)
        .bind(&transazione.descrizione)
        .bind(transazione.data.to_string())
        .bind(transazione.costo)
        .bind(transazione.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .context("Failed to save transazione")?;
        transazione.id = result.last_insert_rowid();

        let new_cassa = cassa_after_create(cassa, transazione.costo);
        Self::write_cassa(&mut tx, &transazione.owner, new_cassa).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction write group")?;
        Ok(new_cassa)
    }

    /// Get a transaction by id, scoped to its owner.
    pub async fn get_transazione(
        &self,
        owner: &str,
        id: TransazioneId,
    ) -> Result<Option<Transazione>> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, titolo, descrizione, data, costo, created_at
            FROM transazioni
            WHERE owner = ? AND id = ?
            "#,
        )
        .bind(owner)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch transazione")?;

        match row {
            Some(row) => Ok(Some(Self::row_to_transazione(&row)?)),
            None => Ok(None),
        }
    }

    /// List an owner's transactions, most recent date first.
    pub async fn list_transazioni(&self, owner: &str) -> Result<Vec<Transazione>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, titolo, descrizione, data, costo, created_at
            FROM transazioni
            WHERE owner = ?
            ORDER BY data DESC, id DESC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list transazioni")?;

        rows.iter().map(Self::row_to_transazione).collect()
    }

    /// Rewrite a transaction and absorb the cost difference into the cassa
    /// as one net adjustment inside a single write group. The old costo is
    /// re-read inside the transaction so a concurrent edit cannot skew the
    /// balance. Returns the new cassa, or `None` when the row is gone.
    pub async fn update_transazione(&self, transazione: &Transazione) -> Result<Option<Cents>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction write group")?;

        let old_row = sqlx::query("SELECT costo FROM transazioni WHERE owner = ? AND id = ?")
            .bind(&transazione.owner)
            .bind(transazione.id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read old costo")?;
        let Some(old_row) = old_row else {
            return Ok(None);
        };
        let old_costo: Cents = old_row.get("costo");

        sqlx::query(
            r#"
            UPDATE transazioni
            SET titolo = ?, descrizione = ?, data = ?, costo = ?
            WHERE owner = ? AND id = ?
            "#,
        )
        .bind(&transazione.titolo)
        .bind(&transazione.descrizione)
        .bind(transazione.data.to_string())
        .bind(transazione.costo)
        .bind(&transazione.owner)
        .bind(transazione.id)
        .execute(&mut *tx)
        .await
        .context("Failed to update transazione")?;

        let cassa: Cents = sqlx::query("SELECT cassa FROM users WHERE username = ?")
            .bind(&transazione.owner)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read cassa")?
            .get("cassa");

        let new_cassa = cassa_after_update(cassa, old_costo, transazione.costo);
        Self::write_cassa(&mut tx, &transazione.owner, new_cassa).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction write group")?;
        Ok(Some(new_cassa))
    }

    /// Delete a transaction and remove its costo from the cassa, in one
    /// write group. Returns the new cassa, or `None` when the row is gone.
    pub async fn delete_transazione(
        &self,
        owner: &str,
        id: TransazioneId,
    ) -> Result<Option<Cents>> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction write group")?;

        let row = sqlx::query("SELECT costo FROM transazioni WHERE owner = ? AND id = ?")
            .bind(owner)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .context("Failed to read costo")?;
        let Some(row) = row else {
            return Ok(None);
        };
        let costo: Cents = row.get("costo");

        sqlx::query("DELETE FROM transazioni WHERE owner = ? AND id = ?")
            .bind(owner)
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete transazione")?;

        let cassa: Cents = sqlx::query("SELECT cassa FROM users WHERE username = ?")
            .bind(owner)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read cassa")?
            .get("cassa");

        let new_cassa = cassa_after_delete(cassa, costo);
        Self::write_cassa(&mut tx, owner, new_cassa).await?;

        tx.commit()
            .await
            .context("Failed to commit transaction write group")?;
        Ok(Some(new_cassa))
    }

    async fn write_cassa(
        tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
        owner: &str,
        cassa: Cents,
    ) -> Result<()> {
        sqlx::query("UPDATE users SET cassa = ? WHERE username = ?")
            .bind(cassa)
            .bind(owner)
            .execute(&mut **tx)
            .await
            .context("Failed to write cassa")?;
        Ok(())
    }

    fn row_to_transazione(row: &sqlx::sqlite::SqliteRow) -> Result<Transazione> {
        let data_str: String = row.get("data");
        let created_at_str: String = row.get("created_at");
        Ok(Transazione {
            id: row.get("id"),
            owner: row.get("owner"),
            titolo: row.get("titolo"),
            descrizione: row.get("descrizione"),
            data: NaiveDate::parse_from_str(&data_str, "%Y-%m-%d").context("Invalid data")?,
            costo: row.get("costo"),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .context("Invalid created_at timestamp")?
                .with_timezone(&Utc),
        })
    }
}
