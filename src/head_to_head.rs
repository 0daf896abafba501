use crate::match_data::{MatchRow, Outcome};

/// Head-to-head record between two teams, tallied from `team_a`'s perspective
/// regardless of which side hosted.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct H2HStats {
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_for: f64,
    pub goals_against: f64,
    pub matches_played: usize,
}

/// Last `window` meetings of (`team_a`, `team_b`) in either orientation,
/// strictly before `cutoff_unix`. No meetings yields the all-zero record;
/// counts and differences need no neutral default.
pub fn h2h(
    matches: &[MatchRow],
    team_a: u32,
    team_b: u32,
    cutoff_unix: i64,
    window: usize,
) -> H2HStats {
    let mut stats = H2HStats::default();
    let mut goals_for = 0i32;
    let mut goals_against = 0i32;

    for m in matches.iter().rev() {
        if stats.matches_played >= window {
            break;
        }
        if m.date_unix >= cutoff_unix {
            continue;
        }
        let same = m.home_team_id == team_a && m.away_team_id == team_b;
        let reversed = m.home_team_id == team_b && m.away_team_id == team_a;
        if !same && !reversed {
            continue;
        }

        match m.result {
            Outcome::Draw => stats.draws += 1,
            Outcome::Home if same => stats.wins += 1,
            Outcome::Away if reversed => stats.wins += 1,
            _ => stats.losses += 1,
        }
        goals_for += if same { m.home_goals } else { m.away_goals };
        goals_against += if same { m.away_goals } else { m.home_goals };
        stats.matches_played += 1;
    }

    if stats.matches_played > 0 {
        let n = stats.matches_played as f64;
        stats.goals_for = goals_for as f64 / n;
        stats.goals_against = goals_against as f64 / n;
    }
    stats
}
