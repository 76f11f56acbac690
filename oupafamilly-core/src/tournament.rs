use std::collections::HashSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{bracket, Error, Match, MatchId, ParseError, ParticipantId, Result, TournamentId};

macro_rules! string_enum {
    ($name:ident, $kind:expr, { $($variant:ident => $label:expr),*$(,)? }) => {
        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)*
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s {
                    $($label => Ok(Self::$variant),)*
                    _ => Err(ParseError::new($kind, s)),
                }
            }
        }
    };
}

/// The games played on the platform.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Game {
    Cs2,
    Wow,
    Lol,
    Sc2,
    Minecraft,
}

string_enum!(Game, "game", {
    Cs2 => "cs2",
    Wow => "wow",
    Lol => "lol",
    Sc2 => "sc2",
    Minecraft => "minecraft",
});

/// The declared format of a tournament.
///
/// `Elimination` and `Bracket` are two labels for the same single elimination format. Round robin
/// can be declared but no bracket can be generated for it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TournamentKind {
    Elimination,
    Bracket,
    RoundRobin,
}

string_enum!(TournamentKind, "tournament kind", {
    Elimination => "elimination",
    Bracket => "bracket",
    RoundRobin => "round_robin",
});

impl TournamentKind {
    /// Returns `true` if brackets for this kind are built using single elimination.
    #[inline]
    pub fn is_single_elimination(&self) -> bool {
        matches!(self, Self::Elimination | Self::Bracket)
    }

    /// Generates the matches for a tournament of this kind.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedKind`] for kinds without a bracket generator, otherwise see
    /// [`bracket::generate`].
    pub fn generate(
        &self,
        tournament_id: TournamentId,
        participants: &[ParticipantId],
    ) -> Result<Vec<Match>> {
        if !self.is_single_elimination() {
            return Err(Error::UnsupportedKind(*self));
        }

        bracket::generate(tournament_id, participants)
    }
}

/// The lifecycle state of a [`Tournament`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum TournamentStatus {
    #[default]
    Draft,
    Open,
    InProgress,
    Completed,
    Cancelled,
}

string_enum!(TournamentStatus, "tournament status", {
    Draft => "draft",
    Open => "open",
    InProgress => "in_progress",
    Completed => "completed",
    Cancelled => "cancelled",
});

impl TournamentStatus {
    /// Returns `true` if no further changes are allowed in this state.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns `true` if an organizer may move a tournament from `self` to `to` directly.
    ///
    /// `InProgress` is only reachable by generating a bracket and `Completed` only by reporting
    /// the result of the final.
    pub fn can_transition_to(&self, to: Self) -> bool {
        use TournamentStatus::*;

        if self.is_terminal() {
            return false;
        }

        match (self, to) {
            (Draft, Open) | (Open, Draft) => true,
            (Draft | Open | InProgress, Cancelled) => true,
            _ => false,
        }
    }
}

/// A tournament and its participants.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Tournament {
    pub id: TournamentId,
    pub title: String,
    pub description: String,
    pub game: Game,
    pub kind: TournamentKind,
    pub max_participants: u32,
    /// The entry fee in cents.
    #[cfg_attr(feature = "serde", serde(default))]
    pub entry_fee: u64,
    /// The prize pool in cents.
    #[cfg_attr(feature = "serde", serde(default))]
    pub prize_pool: u64,
    #[cfg_attr(feature = "serde", serde(default))]
    pub rules: String,
    pub status: TournamentStatus,
    pub participants: Vec<ParticipantId>,
    pub matches: Vec<MatchId>,
    pub winner: Option<ParticipantId>,
    pub created_at: DateTime<Utc>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub registration_start: Option<DateTime<Utc>>,
    pub registration_end: Option<DateTime<Utc>>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub tournament_start: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Tournament {
    /// Creates a new `Tournament` in the [`Draft`] state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidMaxParticipants`] if `max_participants` is smaller than 2.
    ///
    /// [`Draft`]: TournamentStatus::Draft
    pub fn new<T>(title: T, game: Game, kind: TournamentKind, max_participants: u32) -> Result<Self>
    where
        T: Into<String>,
    {
        if max_participants < 2 {
            return Err(Error::InvalidMaxParticipants(max_participants));
        }

        Ok(Self {
            id: TournamentId::default(),
            title: title.into(),
            description: String::new(),
            game,
            kind,
            max_participants,
            entry_fee: 0,
            prize_pool: 0,
            rules: String::new(),
            status: TournamentStatus::Draft,
            participants: Vec::new(),
            matches: Vec::new(),
            winner: None,
            created_at: Utc::now(),
            registration_start: None,
            registration_end: None,
            tournament_start: None,
            completed_at: None,
        })
    }

    /// Returns `true` if `participant` is registered.
    #[inline]
    pub fn is_registered(&self, participant: &ParticipantId) -> bool {
        self.participants.contains(participant)
    }

    /// Registers a new participant.
    ///
    /// # Errors
    ///
    /// Fails when the tournament is not open, the registration period is over, the participant
    /// is already registered or the tournament is full.
    pub fn register(&mut self, participant: ParticipantId, now: DateTime<Utc>) -> Result<()> {
        if self.status != TournamentStatus::Open {
            return Err(Error::RegistrationNotOpen);
        }

        if matches!(self.registration_end, Some(end) if now > end) {
            return Err(Error::RegistrationClosed);
        }

        if self.is_registered(&participant) {
            return Err(Error::AlreadyRegistered(participant));
        }

        if self.participants.len() >= self.max_participants as usize {
            return Err(Error::TournamentFull(self.max_participants));
        }

        log::debug!("Registering {} for tournament {}", participant, self.id);
        self.participants.push(participant);
        Ok(())
    }

    /// Removes a participant.
    ///
    /// # Errors
    ///
    /// Fails when the participant is not registered or the tournament has already started.
    pub fn unregister(&mut self, participant: &ParticipantId) -> Result<()> {
        if !self.is_registered(participant) {
            return Err(Error::NotRegistered(participant.clone()));
        }

        match self.status {
            TournamentStatus::Draft | TournamentStatus::Open => (),
            status => return Err(Error::CannotUnregister(status)),
        }

        self.participants.retain(|p| p != participant);
        Ok(())
    }

    /// Changes the status as requested by an organizer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the change is not allowed, see
    /// [`TournamentStatus::can_transition_to`].
    pub fn set_status(&mut self, status: TournamentStatus) -> Result<()> {
        if self.status == status {
            return Ok(());
        }

        if !self.status.can_transition_to(status) {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: status,
            });
        }

        log::debug!(
            "Tournament {} status changed from {} to {}",
            self.id,
            self.status,
            status
        );

        self.status = status;
        Ok(())
    }

    /// Generates the bracket for the tournament using the given participant order.
    ///
    /// The order is used as is, callers wanting a random seeding must shuffle beforehand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the tournament is not [`Open`] and
    /// [`Error::InvalidSeeding`] if `seeding` is not a reordering of the participants, otherwise
    /// see [`TournamentKind::generate`].
    ///
    /// [`Open`]: TournamentStatus::Open
    pub fn generate_bracket(&self, seeding: &[ParticipantId]) -> Result<Vec<Match>> {
        if self.status != TournamentStatus::Open {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: TournamentStatus::InProgress,
            });
        }

        // The seeding must be a permutation of the registered participants.
        let registered: HashSet<&ParticipantId> = self.participants.iter().collect();
        if seeding.len() != self.participants.len()
            || seeding.iter().any(|p| !registered.contains(p))
        {
            return Err(Error::InvalidSeeding);
        }

        self.kind.generate(self.id, seeding)
    }

    /// Checks that a bracket generated for `participants` can still start this tournament.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] if the tournament is no longer [`Open`] and
    /// [`Error::ParticipantsChanged`] if the registered participants differ from `participants`.
    ///
    /// [`Open`]: TournamentStatus::Open
    pub fn ensure_startable(&self, participants: &[ParticipantId]) -> Result<()> {
        if self.status != TournamentStatus::Open {
            return Err(Error::InvalidTransition {
                from: self.status,
                to: TournamentStatus::InProgress,
            });
        }

        if self.participants != participants {
            return Err(Error::ParticipantsChanged(self.id));
        }

        Ok(())
    }

    /// Marks the tournament as started with the given persisted matches.
    pub fn start<'a, I>(&mut self, matches: I)
    where
        I: IntoIterator<Item = &'a Match>,
    {
        self.matches = matches.into_iter().map(|m| m.id).collect();
        self.status = TournamentStatus::InProgress;
    }

    /// Returns an error if results may not be reported for this tournament.
    pub fn ensure_in_progress(&self) -> Result<()> {
        match self.status {
            TournamentStatus::InProgress => Ok(()),
            TournamentStatus::Completed => Err(Error::TournamentCompleted(self.id)),
            status => Err(Error::TournamentNotInProgress {
                id: self.id,
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use super::{Game, Tournament, TournamentKind, TournamentStatus};
    use crate::{Error, ParticipantId, TournamentId};

    fn open_tournament(max: u32) -> Tournament {
        let mut tournament =
            Tournament::new("Cup", Game::Cs2, TournamentKind::Elimination, max).unwrap();
        tournament.id = TournamentId(1);
        tournament.set_status(TournamentStatus::Open).unwrap();
        tournament
    }

    #[test]
    fn test_tournament_new() {
        assert_eq!(
            Tournament::new("Cup", Game::Lol, TournamentKind::Bracket, 1).unwrap_err(),
            Error::InvalidMaxParticipants(1)
        );

        let tournament = Tournament::new("Cup", Game::Lol, TournamentKind::Bracket, 8).unwrap();
        assert_eq!(tournament.status, TournamentStatus::Draft);
        assert!(tournament.participants.is_empty());
    }

    #[test]
    fn test_tournament_register() {
        let now = Utc::now();
        let mut tournament = open_tournament(2);

        tournament.register("u1".into(), now).unwrap();
        assert_eq!(
            tournament.register("u1".into(), now).unwrap_err(),
            Error::AlreadyRegistered("u1".into())
        );

        tournament.register("u2".into(), now).unwrap();
        assert_eq!(
            tournament.register("u3".into(), now).unwrap_err(),
            Error::TournamentFull(2)
        );

        let mut tournament = open_tournament(8);
        tournament.registration_end = Some(now - Duration::hours(1));
        assert_eq!(
            tournament.register("u1".into(), now).unwrap_err(),
            Error::RegistrationClosed
        );

        let mut tournament = open_tournament(8);
        tournament.set_status(TournamentStatus::Draft).unwrap();
        assert_eq!(
            tournament.register("u1".into(), now).unwrap_err(),
            Error::RegistrationNotOpen
        );
    }

    #[test]
    fn test_tournament_unregister() {
        let mut tournament = open_tournament(4);
        tournament.register("u1".into(), Utc::now()).unwrap();

        assert_eq!(
            tournament.unregister(&"u2".into()).unwrap_err(),
            Error::NotRegistered("u2".into())
        );

        tournament.unregister(&"u1".into()).unwrap();
        assert!(tournament.participants.is_empty());

        tournament.participants.push("u1".into());
        tournament.status = TournamentStatus::InProgress;
        assert_eq!(
            tournament.unregister(&"u1".into()).unwrap_err(),
            Error::CannotUnregister(TournamentStatus::InProgress)
        );
    }

    #[test]
    fn test_tournament_status_transitions() {
        use TournamentStatus::*;

        assert!(Draft.can_transition_to(Open));
        assert!(Open.can_transition_to(Draft));
        assert!(InProgress.can_transition_to(Cancelled));
        assert!(!Open.can_transition_to(InProgress));
        assert!(!InProgress.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Open));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(Completed.is_terminal() && Cancelled.is_terminal());
        assert!(!InProgress.is_terminal());

        let mut tournament = open_tournament(4);
        tournament.status = Completed;
        assert_eq!(
            tournament.set_status(Open).unwrap_err(),
            Error::InvalidTransition {
                from: Completed,
                to: Open
            }
        );
    }

    #[test]
    fn test_tournament_generate_bracket() {
        let now = Utc::now();
        let mut tournament = open_tournament(4);
        for id in ["u1", "u2", "u3"] {
            tournament.register(id.into(), now).unwrap();
        }

        let seeding: Vec<ParticipantId> = vec!["u3".into(), "u1".into(), "u2".into()];
        let matches = tournament.generate_bracket(&seeding).unwrap();
        assert_eq!(matches.len(), 2);

        let foreign: Vec<ParticipantId> = vec!["u1".into(), "x".into(), "u2".into()];
        assert_eq!(
            tournament.generate_bracket(&foreign).unwrap_err(),
            Error::InvalidSeeding
        );
        assert_eq!(
            tournament.generate_bracket(&seeding[..2]).unwrap_err(),
            Error::InvalidSeeding
        );

        tournament.start(&matches);
        assert_eq!(tournament.status, TournamentStatus::InProgress);
        assert_eq!(tournament.matches.len(), 2);
        assert!(matches!(
            tournament.generate_bracket(&seeding).unwrap_err(),
            Error::InvalidTransition { .. }
        ));
    }

    #[test]
    fn test_tournament_kind_dispatch() {
        let participants: Vec<ParticipantId> = vec!["a".into(), "b".into(), "c".into(), "d".into()];

        let elimination = TournamentKind::Elimination
            .generate(TournamentId(1), &participants)
            .unwrap();
        let bracket = TournamentKind::Bracket
            .generate(TournamentId(1), &participants)
            .unwrap();

        assert_eq!(elimination.len(), 3);
        assert_eq!(
            elimination.iter().map(|m| &m.slots).collect::<Vec<_>>(),
            bracket.iter().map(|m| &m.slots).collect::<Vec<_>>()
        );

        assert_eq!(
            TournamentKind::RoundRobin
                .generate(TournamentId(1), &participants)
                .unwrap_err(),
            Error::UnsupportedKind(TournamentKind::RoundRobin)
        );
    }

    #[test]
    fn test_string_enums() {
        assert_eq!("round_robin".parse::<TournamentKind>().unwrap(), TournamentKind::RoundRobin);
        assert_eq!("in_progress".parse::<TournamentStatus>().unwrap(), TournamentStatus::InProgress);
        assert_eq!(Game::Minecraft.to_string(), "minecraft");
        assert!("chess".parse::<Game>().is_err());
    }

    #[test]
    fn test_ensure_in_progress() {
        let mut tournament = open_tournament(4);
        assert!(matches!(
            tournament.ensure_in_progress().unwrap_err(),
            Error::TournamentNotInProgress { .. }
        ));

        tournament.status = TournamentStatus::Completed;
        assert_eq!(
            tournament.ensure_in_progress().unwrap_err(),
            Error::TournamentCompleted(TournamentId(1))
        );
    }

    #[test]
    fn test_ensure_startable() {
        let now = Utc::now();
        let mut tournament = open_tournament(4);
        tournament.register("u1".into(), now).unwrap();
        tournament.register("u2".into(), now).unwrap();

        let snapshot = tournament.participants.clone();
        tournament.ensure_startable(&snapshot).unwrap();

        tournament.register("u3".into(), now).unwrap();
        assert_eq!(
            tournament.ensure_startable(&snapshot).unwrap_err(),
            Error::ParticipantsChanged(TournamentId(1))
        );

        let matches = tournament
            .generate_bracket(&tournament.participants.clone())
            .unwrap();
        tournament.start(&matches);
        assert_eq!(
            tournament
                .ensure_startable(&tournament.participants.clone())
                .unwrap_err(),
            Error::InvalidTransition {
                from: TournamentStatus::InProgress,
                to: TournamentStatus::InProgress
            }
        );
    }
}
