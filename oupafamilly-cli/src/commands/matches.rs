use clap::Subcommand;
use oupafamilly_core::{MatchId, MatchReport, ParticipantId, TournamentId};

use super::print_match;
use crate::service::Service;
use crate::store::Repository;
use crate::Error;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show a single match.
    Show { id: MatchId },
    /// List all matches of a tournament.
    List { tournament: TournamentId },
    /// Report the result of a match.
    Report {
        id: MatchId,
        #[arg(long)]
        winner: ParticipantId,
        #[arg(long, default_value_t = 0)]
        score1: u32,
        #[arg(long, default_value_t = 0)]
        score2: u32,
        #[arg(long)]
        notes: Option<String>,
    },
}

impl Command {
    pub async fn run<R>(&self, service: &Service<R>) -> Result<(), Error>
    where
        R: Repository,
    {
        match self {
            Self::Show { id } => {
                let m = service.get_match(*id).await?;
                print_match(&m);

                if let Some(notes) = &m.notes {
                    println!("Notes: {}", notes);
                }
            }
            Self::List { tournament } => {
                let matches = service.list_matches(*tournament).await?;

                println!("ID | Round | Slots | Status | Score");
                for m in &matches {
                    print_match(m);
                }
            }
            Self::Report {
                id,
                winner,
                score1,
                score2,
                notes,
            } => {
                let mut report = MatchReport::new(*id, winner.clone()).scores(*score1, *score2);
                report.notes = notes.clone();

                let update = service.report_result(&report).await?;
                print_match(&update.reported);

                if let Some(next) = &update.advanced {
                    println!("{} advances to match {}", winner, next.number);
                }

                if let Some(completion) = &update.completion {
                    println!("Tournament completed, winner: {}", completion.winner);
                }
            }
        }

        Ok(())
    }
}
