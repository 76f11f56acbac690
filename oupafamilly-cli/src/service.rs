//! Tournament management operations on top of a [`Repository`].
use chrono::{DateTime, Utc};
use oupafamilly_core::{
    progression, Error as CoreError, Game, Match, MatchId, MatchReport, ParticipantId,
    ResultUpdate, Tournament, TournamentId, TournamentKind, TournamentStatus,
};
use rand::seq::SliceRandom;

use crate::store::{id, Repository, TournamentFilter};
use crate::Error;

/// The values required to create a new [`Tournament`].
#[derive(Clone, Debug)]
pub struct NewTournament {
    pub title: String,
    pub description: String,
    pub game: Game,
    pub kind: TournamentKind,
    pub max_participants: u32,
    /// Entry fee in cents.
    pub entry_fee: u64,
    /// Prize pool in cents.
    pub prize_pool: u64,
    pub rules: String,
    pub registration_start: Option<DateTime<Utc>>,
    pub registration_end: Option<DateTime<Utc>>,
    pub tournament_start: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct Service<R> {
    repo: R,
    shuffle: bool,
}

impl<R> Service<R>
where
    R: Repository,
{
    /// Creates a new `Service`. If `shuffle` is `true` participants are seeded randomly when
    /// generating a bracket, otherwise in order of registration.
    pub fn new(repo: R, shuffle: bool) -> Self {
        Self { repo, shuffle }
    }

    pub async fn create_tournament(&self, new: NewTournament) -> Result<Tournament, Error> {
        let mut tournament =
            Tournament::new(new.title, new.game, new.kind, new.max_participants)?;
        tournament.id = TournamentId(id::TOURNAMENT.generate());
        tournament.description = new.description;
        tournament.entry_fee = new.entry_fee;
        tournament.prize_pool = new.prize_pool;
        tournament.rules = new.rules;
        tournament.registration_start = new.registration_start;
        tournament.registration_end = new.registration_end;
        tournament.tournament_start = new.tournament_start;

        self.repo.insert_tournament(&tournament).await?;

        log::info!("Created tournament {} ({})", tournament.id, tournament.title);
        Ok(tournament)
    }

    pub async fn list_tournaments(&self, filter: TournamentFilter) -> Result<Vec<Tournament>, Error> {
        self.repo.list_tournaments(filter).await
    }

    pub async fn get_tournament(&self, id: TournamentId) -> Result<Tournament, Error> {
        match self.repo.get_tournament(id).await? {
            Some(tournament) => Ok(tournament),
            None => Err(CoreError::TournamentNotFound(id).into()),
        }
    }

    pub async fn register(
        &self,
        id: TournamentId,
        participant: ParticipantId,
    ) -> Result<Tournament, Error> {
        let now = Utc::now();
        self.repo
            .update_tournament(id, move |tournament| tournament.register(participant, now))
            .await
    }

    pub async fn unregister(
        &self,
        id: TournamentId,
        participant: &ParticipantId,
    ) -> Result<Tournament, Error> {
        self.repo
            .update_tournament(id, |tournament| tournament.unregister(participant))
            .await
    }

    pub async fn set_status(
        &self,
        id: TournamentId,
        status: TournamentStatus,
    ) -> Result<Tournament, Error> {
        self.repo
            .update_tournament(id, |tournament| tournament.set_status(status))
            .await
    }

    /// Generates the bracket of an open tournament and starts it.
    ///
    /// The matches and the tournament status are stored together. If generation fails, or the
    /// tournament changed in the meantime, nothing is written.
    pub async fn generate_bracket(&self, id: TournamentId) -> Result<Vec<Match>, Error> {
        let mut tournament = self.get_tournament(id).await?;

        let mut seeding = tournament.participants.clone();
        if self.shuffle {
            seeding.shuffle(&mut rand::thread_rng());
        }

        let mut matches = tournament.generate_bracket(&seeding)?;
        for m in &mut matches {
            m.id = MatchId(id::MATCH.generate());
        }

        tournament.start(&matches);
        self.repo.insert_bracket(&tournament, &matches).await?;

        log::info!(
            "Generated bracket for tournament {} with {} matches",
            tournament.id,
            matches.len()
        );

        Ok(matches)
    }

    /// Reports the result of a match and moves the winner forward.
    ///
    /// Returns the update as it was stored. Results committed by others since the tournament
    /// was loaded are kept.
    pub async fn report_result(&self, report: &MatchReport) -> Result<ResultUpdate, Error> {
        let current = self.get_match(report.match_id).await?;
        let tournament = self.get_tournament(current.tournament_id).await?;
        let matches = self.repo.list_matches(tournament.id).await?;

        let update = progression::report(&tournament, &matches, report)?;
        let update = self.repo.commit_result(&update).await?;

        if let Some(completion) = &update.completion {
            log::info!(
                "Tournament {} completed, winner: {}",
                tournament.id,
                completion.winner
            );
        }

        Ok(update)
    }

    /// Returns a tournament together with all of its matches.
    pub async fn get_bracket(&self, id: TournamentId) -> Result<(Tournament, Vec<Match>), Error> {
        let tournament = self.get_tournament(id).await?;
        let matches = self.repo.list_matches(id).await?;

        Ok((tournament, matches))
    }

    pub async fn get_match(&self, id: MatchId) -> Result<Match, Error> {
        match self.repo.get_match(id).await? {
            Some(m) => Ok(m),
            None => Err(CoreError::MatchNotFound(id).into()),
        }
    }

    pub async fn list_matches(&self, id: TournamentId) -> Result<Vec<Match>, Error> {
        // Distinguish an unknown tournament from one without a bracket.
        self.get_tournament(id).await?;
        self.repo.list_matches(id).await
    }

    /// Deletes a tournament and all of its matches. Completed tournaments are kept.
    pub async fn delete_tournament(&self, id: TournamentId) -> Result<(), Error> {
        if !self.repo.delete_tournament(id).await? {
            return Err(CoreError::TournamentNotFound(id).into());
        }

        log::info!("Deleted tournament {}", id);
        Ok(())
    }
}
