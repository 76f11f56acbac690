pub mod id;
#[cfg(test)]
mod memory;

#[cfg(test)]
pub use memory::MemoryStore;

use async_trait::async_trait;
use futures::TryStreamExt;
use oupafamilly_core::{
    Error as CoreError, Game, Match, MatchId, Result as CoreResult, ResultUpdate, Tournament,
    TournamentId, TournamentStatus,
};
use sqlx::mysql::{MySql, MySqlPool, MySqlRow};
use sqlx::{Row, Transaction};

use crate::Error;

/// Restricts the tournaments returned by [`Repository::list_tournaments`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TournamentFilter {
    pub status: Option<TournamentStatus>,
    pub game: Option<Game>,
}

impl TournamentFilter {
    pub fn matches(&self, tournament: &Tournament) -> bool {
        self.status.map_or(true, |status| tournament.status == status)
            && self.game.map_or(true, |game| tournament.game == game)
    }
}

/// Persistent storage for tournaments and their matches.
///
/// Ids are assigned by the caller before inserting. All methods writing more than one record
/// either write all of them or none. Methods changing an existing tournament re-check their
/// rules against the stored state while holding it locked, so concurrent callers never
/// overwrite each other's changes.
#[async_trait]
pub trait Repository: Send + Sync {
    async fn insert_tournament(&self, tournament: &Tournament) -> Result<(), Error>;

    async fn get_tournament(&self, id: TournamentId) -> Result<Option<Tournament>, Error>;

    /// Returns all tournaments matching `filter`, oldest first.
    async fn list_tournaments(&self, filter: TournamentFilter) -> Result<Vec<Tournament>, Error>;

    /// Applies `f` to the stored tournament and writes the result back. Nothing is written if
    /// `f` fails.
    async fn update_tournament<F>(&self, id: TournamentId, f: F) -> Result<Tournament, Error>
    where
        F: FnOnce(&mut Tournament) -> CoreResult<()> + Send;

    /// Deletes a tournament together with all of its matches. Returns `false` if the tournament
    /// did not exist.
    ///
    /// # Errors
    ///
    /// Fails with [`CoreError::TournamentCompleted`] if the tournament is completed.
    async fn delete_tournament(&self, id: TournamentId) -> Result<bool, Error>;

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error>;

    /// Returns all matches of a tournament ordered by match number.
    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>, Error>;

    /// Stores a newly generated bracket and the started tournament.
    ///
    /// # Errors
    ///
    /// Fails if the stored tournament is no longer open or its participants changed since the
    /// bracket was generated, see [`Tournament::ensure_startable`].
    async fn insert_bracket(&self, tournament: &Tournament, matches: &[Match])
        -> Result<(), Error>;

    /// Stores the result of `update`, rebased onto the stored state of the tournament. Returns
    /// the update that was actually written.
    ///
    /// # Errors
    ///
    /// Fails like [`ResultUpdate::rebase`], e.g. with [`CoreError::MatchCompleted`] if the
    /// stored match already has a result. In this case nothing is written.
    async fn commit_result(&self, update: &ResultUpdate) -> Result<ResultUpdate, Error>;
}

macro_rules! get_one {
    ($query:expr) => {
        match $query {
            Ok(v) => v,
            Err(sqlx::Error::RowNotFound) => return Ok(None),
            Err(err) => return Err(err.into()),
        }
    };
}

fn tournament_from_row(row: &MySqlRow) -> Result<Tournament, Error> {
    let id = row.try_get("id")?;
    let data: Vec<u8> = row.try_get("data")?;

    let mut tournament: Tournament = serde_json::from_slice(&data)?;
    tournament.id = TournamentId(id);

    Ok(tournament)
}

fn match_from_row(row: &MySqlRow) -> Result<Match, Error> {
    let id = row.try_get("id")?;
    let data: Vec<u8> = row.try_get("data")?;

    let mut m: Match = serde_json::from_slice(&data)?;
    m.id = MatchId(id);

    Ok(m)
}

/// A [`Repository`] backed by a MySQL database.
///
/// Records are stored as JSON blobs. The columns next to the blob only exist for filtering.
/// Writes to an existing tournament lock its row with `SELECT ... FOR UPDATE` first.
#[derive(Clone, Debug)]
pub struct Store {
    pub pool: MySqlPool,
    pub table_prefix: String,
}

impl Store {
    /// Creates all tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<(), Error> {
        let tables = [
            format!(
                "CREATE TABLE IF NOT EXISTS {}tournaments (
                    id BIGINT UNSIGNED PRIMARY KEY,
                    status VARCHAR(16) NOT NULL,
                    game VARCHAR(16) NOT NULL,
                    data BLOB NOT NULL
                )",
                self.table_prefix
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}matches (
                    id BIGINT UNSIGNED PRIMARY KEY,
                    tournament_id BIGINT UNSIGNED NOT NULL,
                    number INT UNSIGNED NOT NULL,
                    status VARCHAR(16) NOT NULL,
                    data BLOB NOT NULL,
                    INDEX (tournament_id)
                )",
                self.table_prefix
            ),
        ];

        for sql in &tables {
            sqlx::query(sql).execute(&self.pool).await?;
        }

        log::info!("Database tables are up to date");
        Ok(())
    }

    /// Loads a tournament and locks its row until `tx` ends.
    async fn lock_tournament(
        &self,
        tx: &mut Transaction<'_, MySql>,
        id: TournamentId,
    ) -> Result<Option<Tournament>, Error> {
        let row = sqlx::query(&format!(
            "SELECT id, data FROM {}tournaments WHERE id = ? FOR UPDATE",
            self.table_prefix
        ))
        .bind(id.0)
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(row) => Ok(Some(tournament_from_row(&row)?)),
            None => Ok(None),
        }
    }

    /// Loads all matches of a tournament and locks their rows until `tx` ends.
    async fn lock_matches(
        &self,
        tx: &mut Transaction<'_, MySql>,
        tournament_id: TournamentId,
    ) -> Result<Vec<Match>, Error> {
        let rows = sqlx::query(&format!(
            "SELECT id, data FROM {}matches WHERE tournament_id = ? ORDER BY number FOR UPDATE",
            self.table_prefix
        ))
        .bind(tournament_id.0)
        .fetch_all(&mut *tx)
        .await?;

        rows.iter().map(match_from_row).collect()
    }

    async fn write_tournament(
        &self,
        tx: &mut Transaction<'_, MySql>,
        tournament: &Tournament,
    ) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}tournaments SET status = ?, game = ?, data = ? WHERE id = ?",
            self.table_prefix
        ))
        .bind(tournament.status.as_str())
        .bind(tournament.game.as_str())
        .bind(serde_json::to_vec(tournament)?)
        .bind(tournament.id.0)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }

    async fn write_match(&self, tx: &mut Transaction<'_, MySql>, m: &Match) -> Result<(), Error> {
        sqlx::query(&format!(
            "UPDATE {}matches SET status = ?, data = ? WHERE id = ?",
            self.table_prefix
        ))
        .bind(m.status.as_str())
        .bind(serde_json::to_vec(m)?)
        .bind(m.id.0)
        .execute(&mut *tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Repository for Store {
    async fn insert_tournament(&self, tournament: &Tournament) -> Result<(), Error> {
        sqlx::query(&format!(
            "INSERT INTO {}tournaments (id, status, game, data) VALUES (?, ?, ?, ?)",
            self.table_prefix
        ))
        .bind(tournament.id.0)
        .bind(tournament.status.as_str())
        .bind(tournament.game.as_str())
        .bind(serde_json::to_vec(tournament)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_tournament(&self, id: TournamentId) -> Result<Option<Tournament>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, data FROM {}tournaments WHERE id = ?",
                self.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
        );

        Ok(Some(tournament_from_row(&row)?))
    }

    async fn list_tournaments(&self, filter: TournamentFilter) -> Result<Vec<Tournament>, Error> {
        let mut conditions = Vec::new();
        if filter.status.is_some() {
            conditions.push("status = ?");
        }
        if filter.game.is_some() {
            conditions.push("game = ?");
        }

        let mut sql = format!("SELECT id, data FROM {}tournaments", self.table_prefix);
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY id");

        let mut query = sqlx::query(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(game) = filter.game {
            query = query.bind(game.as_str());
        }

        let mut rows = query.fetch(&self.pool);

        let mut tournaments = Vec::new();
        while let Some(row) = rows.try_next().await? {
            tournaments.push(tournament_from_row(&row)?);
        }

        Ok(tournaments)
    }

    async fn update_tournament<F>(&self, id: TournamentId, f: F) -> Result<Tournament, Error>
    where
        F: FnOnce(&mut Tournament) -> CoreResult<()> + Send,
    {
        let mut tx = self.pool.begin().await?;

        let mut tournament = self
            .lock_tournament(&mut tx, id)
            .await?
            .ok_or(CoreError::TournamentNotFound(id))?;

        f(&mut tournament)?;

        self.write_tournament(&mut tx, &tournament).await?;
        tx.commit().await?;

        Ok(tournament)
    }

    async fn delete_tournament(&self, id: TournamentId) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;

        match self.lock_tournament(&mut tx, id).await? {
            Some(tournament) if tournament.status == TournamentStatus::Completed => {
                return Err(CoreError::TournamentCompleted(id).into());
            }
            Some(_) => (),
            None => return Ok(false),
        }

        sqlx::query(&format!(
            "DELETE FROM {}matches WHERE tournament_id = ?",
            self.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        sqlx::query(&format!(
            "DELETE FROM {}tournaments WHERE id = ?",
            self.table_prefix
        ))
        .bind(id.0)
        .execute(&mut tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let row = get_one!(
            sqlx::query(&format!(
                "SELECT id, data FROM {}matches WHERE id = ?",
                self.table_prefix
            ))
            .bind(id.0)
            .fetch_one(&self.pool)
            .await
        );

        Ok(Some(match_from_row(&row)?))
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>, Error> {
        let sql = format!(
            "SELECT id, data FROM {}matches WHERE tournament_id = ? ORDER BY number",
            self.table_prefix
        );

        let mut rows = sqlx::query(&sql).bind(tournament_id.0).fetch(&self.pool);

        let mut matches = Vec::new();
        while let Some(row) = rows.try_next().await? {
            matches.push(match_from_row(&row)?);
        }

        Ok(matches)
    }

    async fn insert_bracket(
        &self,
        tournament: &Tournament,
        matches: &[Match],
    ) -> Result<(), Error> {
        let mut tx = self.pool.begin().await?;

        let stored = self
            .lock_tournament(&mut tx, tournament.id)
            .await?
            .ok_or(CoreError::TournamentNotFound(tournament.id))?;
        stored.ensure_startable(&tournament.participants)?;

        for m in matches {
            sqlx::query(&format!(
                "INSERT INTO {}matches (id, tournament_id, number, status, data) VALUES (?, ?, ?, ?, ?)",
                self.table_prefix
            ))
            .bind(m.id.0)
            .bind(m.tournament_id.0)
            .bind(m.number)
            .bind(m.status.as_str())
            .bind(serde_json::to_vec(m)?)
            .execute(&mut tx)
            .await?;
        }

        self.write_tournament(&mut tx, tournament).await?;
        tx.commit().await?;

        Ok(())
    }

    async fn commit_result(&self, update: &ResultUpdate) -> Result<ResultUpdate, Error> {
        let tournament_id = update.reported.tournament_id;
        let mut tx = self.pool.begin().await?;

        // The tournament row is locked first, so commits within one tournament run one after
        // another.
        let mut tournament = self
            .lock_tournament(&mut tx, tournament_id)
            .await?
            .ok_or(CoreError::TournamentNotFound(tournament_id))?;
        let matches = self.lock_matches(&mut tx, tournament_id).await?;

        let update = update.rebase(&tournament, &matches)?;

        for m in update.matches() {
            self.write_match(&mut tx, m).await?;
        }

        if let Some(completion) = &update.completion {
            completion.apply(&mut tournament);
            self.write_tournament(&mut tx, &tournament).await?;
        }

        tx.commit().await?;

        Ok(update)
    }
}
