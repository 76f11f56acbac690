pub mod matches;
pub mod tournaments;

use oupafamilly_core::{Match, Tournament};

pub(crate) fn print_tournament(tournament: &Tournament) {
    println!("ID: {}", tournament.id);
    println!("Title: {}", tournament.title);
    if !tournament.description.is_empty() {
        println!("Description: {}", tournament.description);
    }
    println!("Game: {}", tournament.game);
    println!("Kind: {}", tournament.kind);
    println!("Status: {}", tournament.status);
    println!(
        "Participants ({}/{}): {}",
        tournament.participants.len(),
        tournament.max_participants,
        join(&tournament.participants)
    );
    println!("Entry fee: {}", format_cents(tournament.entry_fee));
    println!("Prize pool: {}", format_cents(tournament.prize_pool));
    if let Some(start) = tournament.registration_start {
        println!("Registration starts: {}", start);
    }
    if let Some(end) = tournament.registration_end {
        println!("Registration ends: {}", end);
    }
    if let Some(start) = tournament.tournament_start {
        println!("Starts: {}", start);
    }
    if !tournament.rules.is_empty() {
        println!("Rules: {}", tournament.rules);
    }
    if let Some(winner) = &tournament.winner {
        println!("Winner: {}", winner);
    }
}

pub(crate) fn print_match(m: &Match) {
    println!(
        "{} | R{} M{} | {} vs {} | {} | {}-{}{}",
        m.id,
        m.round,
        m.number,
        m.slots[0],
        m.slots[1],
        m.status,
        m.scores[0],
        m.scores[1],
        match &m.winner {
            Some(winner) => format!(" | winner: {}", winner),
            None => String::new(),
        }
    );
}

fn join<T>(values: &[T]) -> String
where
    T: ToString,
{
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats an amount of cents as `units.cents`.
fn format_cents(cents: u64) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

/// Parses an amount like `12`, `12.5` or `12.50` into cents.
pub(crate) fn parse_cents(s: &str) -> Result<u64, String> {
    let invalid = || format!("invalid amount: {:?}", s);

    let (units, fraction) = match s.split_once('.') {
        Some((units, fraction)) => (units, fraction),
        None => (s, ""),
    };

    if fraction.len() > 2 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let units: u64 = units.parse().map_err(|_| invalid())?;
    let cents = match fraction.len() {
        0 => 0,
        1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
        _ => fraction.parse().map_err(|_| invalid())?,
    };

    units
        .checked_mul(100)
        .and_then(|v| v.checked_add(cents))
        .ok_or_else(invalid)
}
