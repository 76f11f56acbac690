//! Single elimination bracket generation.
//!
//! The generator pairs the participants of a round in list order. A round with an odd number of
//! entries gets a [`MatchSlot::Bye`] appended, the entry paired with it advances directly
//! without a match. Every other pair becomes a [`Match`] and is replaced in the next round by a
//! [`MatchSlot::Winner`] placeholder. Each pair contributes exactly one entry to the next round,
//! so the next round keeps the pairing order.
//!
//! Match numbers are one running sequence for the whole bracket. With `n` participants the
//! bracket always contains `n - 1` matches.
use std::collections::HashSet;
use std::ops::Range;

use chrono::{DateTime, Utc};

use crate::{Error, Match, MatchSlot, ParticipantId, Result, TournamentId};

/// The maximum number of rounds a bracket may have. This allows up to 1024 participants.
pub const MAX_ROUNDS: u32 = 10;

/// Generates all matches of a single elimination bracket for `participants`.
///
/// The participants are seeded in the given order. Matches are scheduled at the current time.
///
/// # Errors
///
/// Returns [`Error::NotEnoughParticipants`] when less than 2 participants are given,
/// [`Error::DuplicateParticipant`] if a participant appears twice and
/// [`Error::SafetyLimitExceeded`] if the bracket would need more than [`MAX_ROUNDS`] rounds.
pub fn generate(tournament_id: TournamentId, participants: &[ParticipantId]) -> Result<Vec<Match>> {
    generate_at(tournament_id, participants, Utc::now())
}

/// Generates all matches of a single elimination bracket, scheduling them at `now`.
///
/// See [`generate`].
pub fn generate_at(
    tournament_id: TournamentId,
    participants: &[ParticipantId],
    now: DateTime<Utc>,
) -> Result<Vec<Match>> {
    if participants.len() < 2 {
        return Err(Error::NotEnoughParticipants(participants.len()));
    }

    let mut seen = HashSet::with_capacity(participants.len());
    for participant in participants {
        if !seen.insert(participant) {
            return Err(Error::DuplicateParticipant(participant.clone()));
        }
    }

    log::debug!(
        "Creating new bracket with {} participants for tournament {}",
        participants.len(),
        tournament_id
    );

    let mut entries: Vec<MatchSlot> = participants
        .iter()
        .cloned()
        .map(MatchSlot::Participant)
        .collect();

    let mut matches = Vec::with_capacity(participants.len() - 1);
    let mut next_number = 1;
    let mut round = 1;

    while entries.len() > 1 {
        if round > MAX_ROUNDS {
            log::warn!(
                "Bracket for tournament {} still has {} entries after {} rounds",
                tournament_id,
                entries.len(),
                MAX_ROUNDS
            );

            return Err(Error::SafetyLimitExceeded(MAX_ROUNDS));
        }

        let paired = pair_round(tournament_id, round, next_number, entries, now);

        log::trace!(
            "Round {} has {} matches, {} entries advance",
            round,
            paired.matches.len(),
            paired.next_round.len()
        );

        next_number = paired.next_number;
        entries = paired.next_round;
        matches.extend(paired.matches);
        round += 1;
    }

    log::debug!(
        "Created new bracket with {} matches in {} rounds",
        matches.len(),
        round - 1
    );

    Ok(matches)
}

/// The result of pairing a single round.
#[derive(Clone, Debug)]
struct PairedRound {
    matches: Vec<Match>,
    next_round: Vec<MatchSlot>,
    /// The number to use for the first match of the next round.
    next_number: u32,
}

/// Pairs `entries` into matches for `round`, numbering them starting at `first_number`.
fn pair_round(
    tournament_id: TournamentId,
    round: u32,
    first_number: u32,
    mut entries: Vec<MatchSlot>,
    now: DateTime<Utc>,
) -> PairedRound {
    if entries.len() % 2 != 0 {
        entries.push(MatchSlot::Bye);
    }

    let mut matches = Vec::with_capacity(entries.len() / 2);
    let mut next_round = Vec::with_capacity(entries.len() / 2);
    let mut number = first_number;

    let mut entries = entries.into_iter();
    while let (Some(first), Some(second)) = (entries.next(), entries.next()) {
        match (first, second) {
            (MatchSlot::Bye, entry) | (entry, MatchSlot::Bye) => {
                next_round.push(entry);
            }
            (first, second) => {
                let mut m = Match::new(tournament_id, round, number, [first, second]);
                m.scheduled_at = Some(now);
                matches.push(m);

                next_round.push(MatchSlot::Winner(number));
                number += 1;
            }
        }
    }

    PairedRound {
        matches,
        next_round,
        next_number: number,
    }
}

/// A view over the matches of a tournament, grouped by round.
#[derive(Clone, Debug)]
pub struct Bracket<'a> {
    matches: Vec<&'a Match>,
}

impl<'a> Bracket<'a> {
    /// Creates a new `Bracket` over `matches`. The matches may be given in any order.
    pub fn new<I>(matches: I) -> Self
    where
        I: IntoIterator<Item = &'a Match>,
    {
        let mut matches: Vec<&Match> = matches.into_iter().collect();
        matches.sort_by_key(|m| (m.round, m.number));

        Self { matches }
    }

    /// Returns the number of rounds in the bracket.
    pub fn num_rounds(&self) -> u32 {
        self.matches.last().map(|m| m.round).unwrap_or(0)
    }

    /// Returns the final of the bracket, which is the only match in the last round.
    pub fn final_match(&self) -> Option<&'a Match> {
        match self.rounds().last() {
            Some(round) if round.matches.len() == 1 => Some(round.matches[0]),
            _ => None,
        }
    }

    /// Returns an iterator over all rounds in ascending order.
    pub fn rounds(&self) -> Rounds<'_, 'a> {
        Rounds {
            matches: &self.matches,
            range: 0..self.matches.len(),
        }
    }
}

/// A single round of a [`Bracket`].
#[derive(Clone, Debug)]
pub struct Round<'a> {
    pub number: u32,
    pub matches: Vec<&'a Match>,
}

/// An iterator over the [`Round`]s of a [`Bracket`].
#[derive(Clone, Debug)]
pub struct Rounds<'b, 'a> {
    matches: &'b [&'a Match],
    range: Range<usize>,
}

impl<'b, 'a> Iterator for Rounds<'b, 'a> {
    type Item = Round<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.matches.get(self.range.start)?;
        let number = first.round;

        let len = self.matches[self.range.clone()]
            .iter()
            .take_while(|m| m.round == number)
            .count();

        let matches = self.matches[self.range.start..self.range.start + len].to_vec();
        self.range.start += len;

        Some(Round { number, matches })
    }
}
