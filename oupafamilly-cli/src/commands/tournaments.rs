use chrono::{DateTime, Utc};
use clap::Subcommand;
use oupafamilly_core::{Bracket, Game, ParticipantId, TournamentId, TournamentKind, TournamentStatus};

use super::{parse_cents, print_match, print_tournament};
use crate::service::{NewTournament, Service};
use crate::store::{Repository, TournamentFilter};
use crate::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List tournaments.
    List {
        #[arg(long)]
        status: Option<TournamentStatus>,
        #[arg(long)]
        game: Option<Game>,
    },
    /// Show a single tournament.
    Show { id: TournamentId },
    /// Create a new tournament in the draft state.
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        game: Game,
        #[arg(long, default_value = "elimination")]
        kind: TournamentKind,
        #[arg(long)]
        max_participants: u32,
        #[arg(long, default_value = "")]
        description: String,
        /// Entry fee, e.g. `5` or `4.99`.
        #[arg(long, default_value = "0", value_parser = parse_cents)]
        entry_fee: u64,
        /// Prize pool, e.g. `250`.
        #[arg(long, default_value = "0", value_parser = parse_cents)]
        prize_pool: u64,
        #[arg(long, default_value = "")]
        rules: String,
        /// Start of the registration period (RFC 3339).
        #[arg(long)]
        registration_start: Option<DateTime<Utc>>,
        /// End of the registration period (RFC 3339).
        #[arg(long)]
        registration_end: Option<DateTime<Utc>>,
        /// Scheduled start of the tournament (RFC 3339).
        #[arg(long)]
        tournament_start: Option<DateTime<Utc>>,
    },
    /// Change the status of a tournament.
    Status {
        id: TournamentId,
        status: TournamentStatus,
    },
    Register {
        id: TournamentId,
        participant: ParticipantId,
    },
    Unregister {
        id: TournamentId,
        participant: ParticipantId,
    },
    /// Generate the bracket and start the tournament.
    Generate { id: TournamentId },
    /// Show the bracket of a tournament by round.
    Bracket { id: TournamentId },
    /// Delete a tournament and its matches.
    Delete { id: TournamentId },
}

impl Command {
    pub async fn run<R>(&self, service: &Service<R>) -> Result<(), Error>
    where
        R: Repository,
    {
        match self {
            Self::List { status, game } => {
                let filter = TournamentFilter {
                    status: *status,
                    game: *game,
                };

                let tournaments = service.list_tournaments(filter).await?;

                println!("ID | Title | Game | Kind | Status | Participants");
                for tournament in tournaments {
                    println!(
                        "{} | {} | {} | {} | {} | {}/{}",
                        tournament.id,
                        tournament.title,
                        tournament.game,
                        tournament.kind,
                        tournament.status,
                        tournament.participants.len(),
                        tournament.max_participants
                    );
                }
            }
            Self::Show { id } => {
                let tournament = service.get_tournament(*id).await?;
                print_tournament(&tournament);
            }
            Self::Create {
                title,
                game,
                kind,
                max_participants,
                description,
                entry_fee,
                prize_pool,
                rules,
                registration_start,
                registration_end,
                tournament_start,
            } => {
                let tournament = service
                    .create_tournament(NewTournament {
                        title: title.clone(),
                        description: description.clone(),
                        game: *game,
                        kind: *kind,
                        max_participants: *max_participants,
                        entry_fee: *entry_fee,
                        prize_pool: *prize_pool,
                        rules: rules.clone(),
                        registration_start: *registration_start,
                        registration_end: *registration_end,
                        tournament_start: *tournament_start,
                    })
                    .await?;

                println!("Created tournament {}", tournament.id);
            }
            Self::Status { id, status } => {
                let tournament = service.set_status(*id, *status).await?;
                println!("Tournament {} is now {}", tournament.id, tournament.status);
            }
            Self::Register { id, participant } => {
                let tournament = service.register(*id, participant.clone()).await?;
                println!(
                    "Registered {} ({}/{})",
                    participant,
                    tournament.participants.len(),
                    tournament.max_participants
                );
            }
            Self::Unregister { id, participant } => {
                service.unregister(*id, participant).await?;
                println!("Unregistered {}", participant);
            }
            Self::Generate { id } => {
                let matches = service.generate_bracket(*id).await?;

                println!("Generated {} matches", matches.len());
                for m in &matches {
                    print_match(m);
                }
            }
            Self::Bracket { id } => {
                let (tournament, matches) = service.get_bracket(*id).await?;
                println!("{} ({})", tournament.title, tournament.status);

                let bracket = Bracket::new(&matches);
                for round in bracket.rounds() {
                    println!("Round {}", round.number);
                    for m in round.matches {
                        print_match(m);
                    }
                }

                if let Some(winner) = &tournament.winner {
                    println!("Winner: {}", winner);
                }
            }
            Self::Delete { id } => {
                service.delete_tournament(*id).await?;
                println!("Deleted tournament {}", id);
            }
        }

        Ok(())
    }
}
