use crate::dashboard::unique_teams;
use crate::models::{Criterion, Leaderboard, ResponseRow, TeamStanding};

/// Score shown for one team and round: the first matching row wins, the
/// way an exact-match VLOOKUP does, and anything missing counts as 0.
pub fn round_score(rows: &[ResponseRow], team: &str, criterion: Criterion) -> u32 {
    rows.iter()
        .find(|row| row.team().to_lowercase() == team.to_lowercase())
        .and_then(|row| row.cell(criterion.score_column()).trim().parse::<u32>().ok())
        .unwrap_or(0)
}

/// Spreadsheet RANK: descending, ties share the better rank.
pub fn rank(total: u32, totals: &[u32]) -> usize {
    1 + totals.iter().filter(|&&other| other > total).count()
}

fn average(values: impl Iterator<Item = u32>, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        values.map(f64::from).sum::<f64>() / count as f64
    }
}

pub fn compute_leaderboard(rows: &[ResponseRow]) -> Leaderboard {
    let teams = unique_teams(rows.iter().map(ResponseRow::team));

    let scored: Vec<(String, [u32; 5])> = teams
        .into_iter()
        .map(|team| {
            let mut rounds = [0u32; 5];
            for criterion in Criterion::ALL {
                rounds[criterion.round() - 1] = round_score(rows, &team, criterion);
            }
            (team, rounds)
        })
        .collect();

    let totals: Vec<u32> = scored.iter().map(|(_, r)| r.iter().sum()).collect();

    let standings: Vec<TeamStanding> = scored
        .into_iter()
        .zip(totals.iter())
        .map(|((team, rounds), &total)| TeamStanding {
            team,
            rounds,
            total,
            rank: rank(total, &totals),
        })
        .collect();

    let count = standings.len();
    let mut round_averages = [0.0; 5];
    for (index, slot) in round_averages.iter_mut().enumerate() {
        *slot = average(standings.iter().map(|s| s.rounds[index]), count);
    }
    let total_average = average(standings.iter().map(|s| s.total), count);

    Leaderboard {
        standings,
        round_averages,
        total_average,
    }
}
