use std::collections::BTreeMap;

use async_trait::async_trait;
use oupafamilly_core::{
    Error as CoreError, Match, MatchId, Result as CoreResult, ResultUpdate, Tournament,
    TournamentId, TournamentStatus,
};
use parking_lot::RwLock;

use super::{Repository, TournamentFilter};
use crate::Error;

/// A [`Repository`] keeping everything in memory.
///
/// Every write takes the lock once, so multi-record writes are never observed half done.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    tournaments: BTreeMap<TournamentId, Tournament>,
    matches: BTreeMap<MatchId, Match>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn insert_tournament(&self, tournament: &Tournament) -> Result<(), Error> {
        let mut inner = self.inner.write();
        inner.tournaments.insert(tournament.id, tournament.clone());
        Ok(())
    }

    async fn get_tournament(&self, id: TournamentId) -> Result<Option<Tournament>, Error> {
        let inner = self.inner.read();
        Ok(inner.tournaments.get(&id).cloned())
    }

    async fn list_tournaments(&self, filter: TournamentFilter) -> Result<Vec<Tournament>, Error> {
        let inner = self.inner.read();

        Ok(inner
            .tournaments
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect())
    }

    async fn update_tournament<F>(&self, id: TournamentId, f: F) -> Result<Tournament, Error>
    where
        F: FnOnce(&mut Tournament) -> CoreResult<()> + Send,
    {
        let mut inner = self.inner.write();

        let stored = inner
            .tournaments
            .get_mut(&id)
            .ok_or(CoreError::TournamentNotFound(id))?;

        let mut tournament = stored.clone();
        f(&mut tournament)?;
        *stored = tournament.clone();

        Ok(tournament)
    }

    async fn delete_tournament(&self, id: TournamentId) -> Result<bool, Error> {
        let mut inner = self.inner.write();

        match inner.tournaments.get(&id) {
            Some(tournament) if tournament.status == TournamentStatus::Completed => {
                return Err(CoreError::TournamentCompleted(id).into());
            }
            Some(_) => (),
            None => return Ok(false),
        }

        inner.matches.retain(|_, m| m.tournament_id != id);
        inner.tournaments.remove(&id);
        Ok(true)
    }

    async fn get_match(&self, id: MatchId) -> Result<Option<Match>, Error> {
        let inner = self.inner.read();
        Ok(inner.matches.get(&id).cloned())
    }

    async fn list_matches(&self, tournament_id: TournamentId) -> Result<Vec<Match>, Error> {
        let inner = self.inner.read();
        Ok(inner.tournament_matches(tournament_id))
    }

    async fn insert_bracket(
        &self,
        tournament: &Tournament,
        matches: &[Match],
    ) -> Result<(), Error> {
        let mut inner = self.inner.write();

        inner
            .tournaments
            .get(&tournament.id)
            .ok_or(CoreError::TournamentNotFound(tournament.id))?
            .ensure_startable(&tournament.participants)?;

        for m in matches {
            inner.matches.insert(m.id, m.clone());
        }

        inner.tournaments.insert(tournament.id, tournament.clone());
        Ok(())
    }

    async fn commit_result(&self, update: &ResultUpdate) -> Result<ResultUpdate, Error> {
        let mut inner = self.inner.write();
        let tournament_id = update.reported.tournament_id;

        let mut tournament = inner
            .tournaments
            .get(&tournament_id)
            .cloned()
            .ok_or(CoreError::TournamentNotFound(tournament_id))?;
        let matches = inner.tournament_matches(tournament_id);

        let update = update.rebase(&tournament, &matches)?;

        for m in update.matches() {
            inner.matches.insert(m.id, m.clone());
        }

        if update.completion.is_some() {
            update.apply_to_tournament(&mut tournament);
            inner.tournaments.insert(tournament.id, tournament);
        }

        Ok(update)
    }
}

impl Inner {
    fn tournament_matches(&self, tournament_id: TournamentId) -> Vec<Match> {
        let mut matches: Vec<Match> = self
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect();

        matches.sort_by_key(|m| m.number);
        matches
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use oupafamilly_core::{
        bracket, progression, Error as CoreError, Game, Match, MatchId, MatchReport, MatchSlot,
        Tournament, TournamentId, TournamentKind, TournamentStatus,
    };

    use super::MemoryStore;
    use crate::store::Repository;
    use crate::Error;

    fn core_error(err: Error) -> CoreError {
        match err {
            Error::Core(err) => err,
            err => panic!("unexpected error: {}", err),
        }
    }

    async fn open_tournament(store: &MemoryStore, participants: &[&str]) -> Tournament {
        let mut tournament =
            Tournament::new("Cup", Game::Cs2, TournamentKind::Elimination, 4).unwrap();
        tournament.id = TournamentId(1);
        tournament.status = TournamentStatus::Open;
        tournament.participants = participants.iter().map(|&p| p.into()).collect();

        store.insert_tournament(&tournament).await.unwrap();
        tournament
    }

    /// Generates the bracket of `tournament`, numbering match ids from `first_id`.
    fn generate(tournament: &Tournament, first_id: u64) -> (Tournament, Vec<Match>) {
        let mut matches = bracket::generate(tournament.id, &tournament.participants).unwrap();
        for m in &mut matches {
            m.id = MatchId(first_id + m.number as u64);
        }

        let mut started = tournament.clone();
        started.start(&matches);
        (started, matches)
    }

    #[tokio::test]
    async fn test_commit_sibling_results() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store, &["u1", "u2", "u3", "u4"]).await;

        let (tournament, matches) = generate(&tournament, 0);
        store.insert_bracket(&tournament, &matches).await.unwrap();

        let first =
            progression::report(&tournament, &matches, &MatchReport::new(MatchId(1), "u1"))
                .unwrap();
        let second =
            progression::report(&tournament, &matches, &MatchReport::new(MatchId(2), "u3"))
                .unwrap();

        store.commit_result(&first).await.unwrap();
        let second = store.commit_result(&second).await.unwrap();
        assert_eq!(second.advanced.as_ref().map(|m| m.number), Some(3));

        let final_match = store.get_match(MatchId(3)).await.unwrap().unwrap();
        assert_eq!(
            final_match.slots,
            [
                MatchSlot::Participant("u1".into()),
                MatchSlot::Participant("u3".into())
            ]
        );

        // Committing the same result again is rejected against the stored state.
        assert_eq!(
            core_error(store.commit_result(&first).await.unwrap_err()),
            CoreError::MatchCompleted(1)
        );
    }

    #[tokio::test]
    async fn test_commit_completes_stored_tournament() {
        let store = MemoryStore::new();
        let tournament = open_tournament(&store, &["u1", "u2"]).await;

        let (tournament, matches) = generate(&tournament, 0);
        store.insert_bracket(&tournament, &matches).await.unwrap();

        let update =
            progression::report(&tournament, &matches, &MatchReport::new(MatchId(1), "u2"))
                .unwrap();
        store.commit_result(&update).await.unwrap();

        let stored = store.get_tournament(tournament.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TournamentStatus::Completed);
        assert_eq!(stored.winner, Some("u2".into()));

        assert_eq!(
            core_error(store.delete_tournament(tournament.id).await.unwrap_err()),
            CoreError::TournamentCompleted(tournament.id)
        );
    }

    #[tokio::test]
    async fn test_insert_bracket_twice() {
        let store = MemoryStore::new();
        let snapshot = open_tournament(&store, &["u1", "u2", "u3", "u4"]).await;

        let (first, first_matches) = generate(&snapshot, 0);
        let (second, second_matches) = generate(&snapshot, 100);

        store.insert_bracket(&first, &first_matches).await.unwrap();

        let err = store
            .insert_bracket(&second, &second_matches)
            .await
            .unwrap_err();
        assert_eq!(
            core_error(err),
            CoreError::InvalidTransition {
                from: TournamentStatus::InProgress,
                to: TournamentStatus::InProgress,
            }
        );

        assert_eq!(store.list_matches(snapshot.id).await.unwrap().len(), 3);
        assert_eq!(
            store.get_tournament(snapshot.id).await.unwrap().unwrap().matches,
            first.matches
        );
    }

    #[tokio::test]
    async fn test_insert_bracket_participants_changed() {
        let store = MemoryStore::new();
        let snapshot = open_tournament(&store, &["u1", "u2"]).await;

        store
            .update_tournament(snapshot.id, |t| t.register("u3".into(), Utc::now()))
            .await
            .unwrap();

        let (tournament, matches) = generate(&snapshot, 0);
        assert_eq!(
            core_error(store.insert_bracket(&tournament, &matches).await.unwrap_err()),
            CoreError::ParticipantsChanged(snapshot.id)
        );
        assert!(store.list_matches(snapshot.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_tournament_uses_stored_state() {
        let store = MemoryStore::new();
        let snapshot = open_tournament(&store, &["u1", "u2", "u3"]).await;

        store
            .update_tournament(snapshot.id, |t| t.register("u4".into(), Utc::now()))
            .await
            .unwrap();

        // The snapshot still has room, the stored tournament does not.
        assert!(snapshot.participants.len() < snapshot.max_participants as usize);
        let err = store
            .update_tournament(snapshot.id, |t| t.register("u5".into(), Utc::now()))
            .await
            .unwrap_err();
        assert_eq!(core_error(err), CoreError::TournamentFull(4));

        let stored = store.get_tournament(snapshot.id).await.unwrap().unwrap();
        assert_eq!(stored.participants.len(), 4);

        let err = store
            .update_tournament(TournamentId(2), |t| t.set_status(TournamentStatus::Open))
            .await
            .unwrap_err();
        assert_eq!(core_error(err), CoreError::TournamentNotFound(TournamentId(2)));
    }
}
