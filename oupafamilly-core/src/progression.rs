//! Match progression.
//!
//! Reporting a result never touches any storage. [`report`] validates the report against the
//! current state of the tournament and returns a [`ResultUpdate`] containing every record that
//! changes. The caller has to persist the whole update as a single unit.
//!
//! An update is only valid for the state it was built from. A store that cannot guarantee the
//! state is unchanged when writing uses [`ResultUpdate::rebase`] to apply the same result to the
//! current state instead.
use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    Error, Match, MatchId, MatchSlot, MatchStatus, ParticipantId, Result, Tournament,
    TournamentStatus,
};

/// The result of a match as reported by an organizer.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MatchReport {
    pub match_id: MatchId,
    pub winner: ParticipantId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scores: [u32; 2],
    #[cfg_attr(feature = "serde", serde(default))]
    pub notes: Option<String>,
}

impl MatchReport {
    /// Creates a new `MatchReport` with both scores set to 0 and no notes.
    pub fn new<T>(match_id: MatchId, winner: T) -> Self
    where
        T: Into<ParticipantId>,
    {
        Self {
            match_id,
            winner: winner.into(),
            scores: [0, 0],
            notes: None,
        }
    }

    pub fn scores(mut self, first: u32, second: u32) -> Self {
        self.scores = [first, second];
        self
    }

    pub fn notes<T>(mut self, notes: T) -> Self
    where
        T: Into<String>,
    {
        self.notes = Some(notes.into());
        self
    }
}

/// The tournament outcome produced by the result of the final.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    pub winner: ParticipantId,
    pub completed_at: DateTime<Utc>,
}

impl Completion {
    /// Marks `tournament` as completed.
    pub fn apply(&self, tournament: &mut Tournament) {
        tournament.status = TournamentStatus::Completed;
        tournament.winner = Some(self.winner.clone());
        tournament.completed_at = Some(self.completed_at);
    }
}

/// All changes caused by a single [`MatchReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResultUpdate {
    /// The report this update was built from.
    pub report: MatchReport,
    /// The reported match with its result.
    pub reported: Match,
    /// The match that received the winner, `None` if the reported match was the final.
    pub advanced: Option<Match>,
    /// Set if the tournament is complete after this result.
    pub completion: Option<Completion>,
}

impl ResultUpdate {
    /// Returns an iterator over all changed matches.
    pub fn matches(&self) -> impl Iterator<Item = &Match> {
        std::iter::once(&self.reported).chain(self.advanced.as_ref())
    }

    /// Applies the update to `matches`, replacing the changed matches in place.
    pub fn apply(&self, matches: &mut [Match]) {
        for changed in self.matches() {
            if let Some(m) = matches.iter_mut().find(|m| m.number == changed.number) {
                *m = changed.clone();
            }
        }
    }

    /// Applies the completion, if any, to `tournament`.
    pub fn apply_to_tournament(&self, tournament: &mut Tournament) {
        if let Some(completion) = &self.completion {
            completion.apply(tournament);
        }
    }

    /// Applies the same result to the current state of the tournament.
    ///
    /// The returned update keeps the completion time of `self`. Other results committed since
    /// `self` was built are preserved, the winner only takes the slot still waiting for it.
    ///
    /// # Errors
    ///
    /// Fails like [`report`] against the current state, e.g. with [`Error::MatchCompleted`] if
    /// the match got a result in the meantime.
    pub fn rebase(&self, tournament: &Tournament, matches: &[Match]) -> Result<Self> {
        let now = self.reported.completed_at.unwrap_or_else(Utc::now);
        report_at(tournament, matches, &self.report, now)
    }
}

/// Reports the result of a match in `tournament`.
///
/// `matches` must contain all matches of the tournament.
///
/// # Errors
///
/// Returns an [`enum@Error`] if the tournament is not in progress, the match does not exist or
/// already has a result, or `winner` is not one of the two participants of the match. Nothing
/// is changed in this case.
pub fn report(
    tournament: &Tournament,
    matches: &[Match],
    report: &MatchReport,
) -> Result<ResultUpdate> {
    report_at(tournament, matches, report, Utc::now())
}

/// Reports the result of a match, completing it at `now`.
///
/// See [`report`].
pub fn report_at(
    tournament: &Tournament,
    matches: &[Match],
    report: &MatchReport,
    now: DateTime<Utc>,
) -> Result<ResultUpdate> {
    tournament.ensure_in_progress()?;

    let current = matches
        .iter()
        .find(|m| m.id == report.match_id)
        .ok_or(Error::MatchNotFound(report.match_id))?;

    if current.is_completed() {
        return Err(Error::MatchCompleted(current.number));
    }

    if !current.slots.iter().all(MatchSlot::is_participant) {
        return Err(Error::MatchNotReady(current.number));
    }

    if current.position_of(&report.winner).is_none() {
        return Err(Error::InvalidWinner {
            number: current.number,
            winner: report.winner.clone(),
        });
    }

    let mut reported = current.clone();
    reported.winner = Some(report.winner.clone());
    reported.scores = report.scores;
    reported.status = MatchStatus::Completed;
    reported.completed_at = Some(now);
    reported.notes = report.notes.clone();

    let advanced = advance(matches, &reported);

    let updated = matches.iter().map(|m| {
        if m.number == reported.number {
            &reported
        } else {
            match &advanced {
                Some(next) if next.number == m.number => next,
                _ => m,
            }
        }
    });

    let completion = champion(updated).map(|winner| Completion {
        winner: winner.clone(),
        completed_at: now,
    });

    log::debug!(
        "Match {} of tournament {} won by {}",
        reported.number,
        tournament.id,
        report.winner
    );

    if let Some(completion) = &completion {
        log::debug!(
            "Tournament {} completed, winner: {}",
            tournament.id,
            completion.winner
        );
    }

    Ok(ResultUpdate {
        report: report.clone(),
        reported,
        advanced,
        completion,
    })
}

/// Moves the winner of `reported` into the slot waiting for it.
///
/// Every match except the final has exactly one slot holding its [`MatchSlot::Winner`]
/// placeholder. In a bracket without byes that slot is in the next round: the winner of the
/// match at odd position `p` within its round takes the first slot of match `(p + 1) / 2` of the
/// next round, the one at even position the second slot. A winner coming from a pairing with a
/// bye skips rounds until the placeholder's match.
fn advance(matches: &[Match], reported: &Match) -> Option<Match> {
    let winner = reported.winner.clone()?;

    matches.iter().find_map(|m| {
        let position = m.position_of_winner(reported.number)?;

        let mut next = m.clone();
        next[position] = MatchSlot::Participant(winner.clone());
        Some(next)
    })
}

/// Returns the winner of the tournament if every match is completed.
///
/// The winner is the winner of the match in the highest round.
pub fn champion<'a, I>(matches: I) -> Option<&'a ParticipantId>
where
    I: IntoIterator<Item = &'a Match>,
{
    let mut last: Option<&Match> = None;

    for m in matches {
        if !m.is_completed() {
            return None;
        }

        if last.map_or(true, |last| m.round > last.round) {
            last = Some(m);
        }
    }

    last?.winner.as_ref()
}
