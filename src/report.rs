use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::{Leaderboard, TeamStanding};

/// Standings ordered by rank, keeping first-seen order among ties.
pub fn ranked(board: &Leaderboard) -> Vec<&TeamStanding> {
    let mut standings: Vec<&TeamStanding> = board.standings.iter().collect();
    standings.sort_by_key(|s| s.rank);
    standings
}

pub fn build_report(board: &Leaderboard, generated_at: DateTime<Utc>) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Leaderboard");
    let _ = writeln!(
        output,
        "Generated {} for {} teams",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        board.standings.len()
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Standings");

    if board.standings.is_empty() {
        let _ = writeln!(output, "No team responses recorded yet.");
    } else {
        let _ = writeln!(
            output,
            "| Rank | Team | Round 1 | Round 2 | Round 3 | Round 4 | Round 5 | Total |"
        );
        let _ = writeln!(output, "|---|---|---|---|---|---|---|---|");
        for standing in ranked(board) {
            let rounds: Vec<String> = standing.rounds.iter().map(u32::to_string).collect();
            let _ = writeln!(
                output,
                "| {} | {} | {} | {} |",
                standing.rank,
                standing.team.replace('|', "\\|"),
                rounds.join(" | "),
                standing.total
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Averages");
    if board.standings.is_empty() {
        let _ = writeln!(output, "No averages for an empty leaderboard.");
    } else {
        let rounds: Vec<String> = board
            .round_averages
            .iter()
            .enumerate()
            .map(|(i, avg)| format!("Round {} {:.2}", i + 1, avg))
            .collect();
        let _ = writeln!(
            output,
            "- {}; total {:.2}",
            rounds.join(", "),
            board.total_average
        );
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn standing(team: &str, total: u32, rank: usize) -> TeamStanding {
        TeamStanding {
            team: team.to_string(),
            rounds: [total, 0, 0, 0, 0],
            total,
            rank,
        }
    }

    #[test]
    fn report_lists_teams_by_rank() {
        let board = Leaderboard {
            standings: vec![
                standing("Alpha", 2, 2),
                standing("Beta", 3, 1),
                standing("Gamma", 2, 2),
            ],
            round_averages: [2.33, 0.0, 0.0, 0.0, 0.0],
            total_average: 2.33,
        };
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap();

        let report = build_report(&board, at);
        assert!(report.contains("Generated 2026-03-01 09:30 UTC for 3 teams"));

        let beta = report.find("| 1 | Beta |").unwrap();
        let alpha = report.find("| 2 | Alpha |").unwrap();
        let gamma = report.find("| 2 | Gamma |").unwrap();
        assert!(beta < alpha && alpha < gamma);
        assert!(report.contains("| 1 | Beta | 3 | 0 | 0 | 0 | 0 | 3 |"));
        assert!(report.contains("total 2.33"));
    }

    #[test]
    fn empty_board_says_so() {
        let board = Leaderboard {
            standings: Vec::new(),
            round_averages: [0.0; 5],
            total_average: 0.0,
        };
        let report = build_report(&board, Utc::now());
        assert!(report.contains("No team responses recorded yet."));
    }
}
