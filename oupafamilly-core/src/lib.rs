//! # oupafamilly-core
//!
//! This crate contains the tournament logic of the Oupafamilly platform: building a single
//! elimination bracket from a list of participants and moving winners through it until the
//! tournament has a champion.
//!
//! Important types:
//! - [`Tournament`]: A tournament with its participants, status and registration rules.
//! - [`Match`]: A *match* of two parties, identified by a round and a running match number.
//! - [`MatchSlot`]: A *spot* within a match, which can contain a participant, the pending winner
//! of an earlier match, a bye or nothing at all.
//! - [`bracket::generate`]: The bracket generator.
//! - [`progression::report`]: The match progression engine.
//!
//! Nothing in this crate performs I/O. Loading and persisting tournaments and matches is the
//! job of the caller.
//!
//! ## Feature Flags
//!
//! `serde`: Adds `Serialize` and `Deserialize` impls to all model types.
//!
pub mod bracket;
pub mod progression;
pub mod tournament;

mod id;

pub use bracket::Bracket;
pub use id::{MatchId, ParticipantId, TournamentId};
pub use progression::{Completion, MatchReport, ResultUpdate};
pub use tournament::{Game, Tournament, TournamentKind, TournamentStatus};

use chrono::{DateTime, Utc};
use thiserror::Error;

use std::fmt::{self, Display, Formatter};
use std::ops::{Index, IndexMut};
use std::result;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An `Result<T>` using [`enum@Error`] as an error type.
pub type Result<T> = result::Result<T, Error>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("a bracket requires at least 2 participants, found {0}")]
    NotEnoughParticipants(usize),
    #[error("participant {0} is listed more than once")]
    DuplicateParticipant(ParticipantId),
    #[error("bracket generation is not supported for {0} tournaments")]
    UnsupportedKind(TournamentKind),
    #[error("seeding does not match the registered participants")]
    InvalidSeeding,
    #[error("a tournament needs room for at least 2 participants, got {0}")]
    InvalidMaxParticipants(u32),
    #[error("bracket did not converge to a single participant within {0} rounds")]
    SafetyLimitExceeded(u32),
    #[error("tournament {0} not found")]
    TournamentNotFound(TournamentId),
    #[error("match {0} not found")]
    MatchNotFound(MatchId),
    #[error("{winner} is not a participant of match {number}")]
    InvalidWinner { number: u32, winner: ParticipantId },
    #[error("match {0} already has a result")]
    MatchCompleted(u32),
    #[error("match {0} is still waiting for its participants")]
    MatchNotReady(u32),
    #[error("tournament {0} is already completed")]
    TournamentCompleted(TournamentId),
    #[error("tournament {id} is {status}, expected in_progress")]
    TournamentNotInProgress {
        id: TournamentId,
        status: TournamentStatus,
    },
    #[error("tournament is not open for registration")]
    RegistrationNotOpen,
    #[error("registration period has ended")]
    RegistrationClosed,
    #[error("{0} is already registered")]
    AlreadyRegistered(ParticipantId),
    #[error("{0} is not registered")]
    NotRegistered(ParticipantId),
    #[error("tournament is full ({0} participants)")]
    TournamentFull(u32),
    #[error("cannot unregister from a tournament that is {0}")]
    CannotUnregister(TournamentStatus),
    #[error("participants of tournament {0} changed while the bracket was generated")]
    ParticipantsChanged(TournamentId),
    #[error("cannot change tournament status from {from} to {to}")]
    InvalidTransition {
        from: TournamentStatus,
        to: TournamentStatus,
    },
}

impl Error {
    /// Returns the [`ErrorKind`] of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotEnoughParticipants(_)
            | Self::DuplicateParticipant(_)
            | Self::UnsupportedKind(_)
            | Self::InvalidSeeding
            | Self::InvalidMaxParticipants(_)
            | Self::RegistrationNotOpen
            | Self::RegistrationClosed
            | Self::AlreadyRegistered(_)
            | Self::NotRegistered(_)
            | Self::TournamentFull(_)
            | Self::CannotUnregister(_) => ErrorKind::InvalidInput,
            Self::TournamentNotFound(_) | Self::MatchNotFound(_) => ErrorKind::NotFound,
            Self::InvalidWinner { .. } | Self::MatchNotReady(_) => ErrorKind::Validation,
            Self::MatchCompleted(_)
            | Self::TournamentCompleted(_)
            | Self::TournamentNotInProgress { .. }
            | Self::ParticipantsChanged(_)
            | Self::InvalidTransition { .. } => ErrorKind::Conflict,
            Self::SafetyLimitExceeded(_) => ErrorKind::SafetyLimitExceeded,
        }
    }
}

/// A coarse classification of an [`enum@Error`].
///
/// Every kind maps to exactly one caller-visible outcome, so a boundary layer never needs to
/// inspect the concrete variant.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The input was rejected before anything was computed (bad request).
    InvalidInput,
    /// A referenced tournament or match does not exist.
    NotFound,
    /// The reported result does not fit the match.
    Validation,
    /// The request conflicts with the current state, e.g. the tournament is already completed.
    Conflict,
    /// The bracket did not converge. This indicates broken data upstream.
    SafetyLimitExceeded,
}

/// The state of a [`Match`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for MatchStatus {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A spot for a participant in a [`Match`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MatchSlot {
    /// The occupant is not known yet.
    #[default]
    Unfilled,
    /// A synthetic opponent. The other side of a pairing with a bye advances without playing.
    /// A bye never ends up in a generated [`Match`].
    Bye,
    /// The occupant is the winner of the match with the given number.
    Winner(u32),
    /// The spot is taken by a participant.
    Participant(ParticipantId),
}

impl MatchSlot {
    /// Returns `true` if the `MatchSlot` is [`Participant`].
    ///
    /// [`Participant`]: Self::Participant
    #[inline]
    pub fn is_participant(&self) -> bool {
        matches!(self, Self::Participant(_))
    }

    /// Returns `true` if the `MatchSlot` is [`Bye`].
    ///
    /// [`Bye`]: Self::Bye
    #[inline]
    pub fn is_bye(&self) -> bool {
        matches!(self, Self::Bye)
    }

    /// Returns `true` if the slot waits for the winner of match `number`.
    #[inline]
    pub fn is_winner_of(&self, number: u32) -> bool {
        matches!(self, Self::Winner(n) if *n == number)
    }

    /// Returns the participant in this slot, if any.
    #[inline]
    pub fn participant(&self) -> Option<&ParticipantId> {
        match self {
            Self::Participant(id) => Some(id),
            _ => None,
        }
    }
}

impl Display for MatchSlot {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Unfilled => f.write_str("TBD"),
            Self::Bye => f.write_str("BYE"),
            Self::Winner(number) => write!(f, "Winner of Match {}", number),
            Self::Participant(id) => id.fmt(f),
        }
    }
}

impl From<ParticipantId> for MatchSlot {
    #[inline]
    fn from(id: ParticipantId) -> Self {
        Self::Participant(id)
    }
}

/// A match between two parties.
///
/// `round` starts at 1 and grows towards the final. `number` is the running match number of the
/// whole bracket, it is never reset between rounds.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Match {
    pub id: MatchId,
    pub tournament_id: TournamentId,
    pub round: u32,
    pub number: u32,
    pub slots: [MatchSlot; 2],
    pub winner: Option<ParticipantId>,
    pub scores: [u32; 2],
    pub status: MatchStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl Match {
    /// Creates a new scheduled `Match` without an id.
    pub fn new(tournament_id: TournamentId, round: u32, number: u32, slots: [MatchSlot; 2]) -> Self {
        Self {
            id: MatchId::default(),
            tournament_id,
            round,
            number,
            slots,
            winner: None,
            scores: [0, 0],
            status: MatchStatus::Scheduled,
            scheduled_at: None,
            completed_at: None,
            notes: None,
        }
    }

    /// Returns the index of the slot taken by `participant`.
    pub fn position_of(&self, participant: &ParticipantId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.participant() == Some(participant))
    }

    /// Returns the index of the slot waiting for the winner of match `number`.
    pub fn position_of_winner(&self, number: u32) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_winner_of(number))
    }

    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == MatchStatus::Completed
    }
}

impl Index<usize> for Match {
    type Output = MatchSlot;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.slots[index]
    }
}

impl IndexMut<usize> for Match {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.slots[index]
    }
}

/// Error returned when parsing one of the string enums of this crate fails.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseError {
    kind: &'static str,
    value: String,
}

impl ParseError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl FromStr for MatchStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> result::Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(ParseError::new("match status", s)),
        }
    }
}
