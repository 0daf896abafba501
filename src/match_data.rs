use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    #[default]
    Draw,
    Away,
}

impl Outcome {
    pub fn from_goals(home_goals: i32, away_goals: i32) -> Self {
        if home_goals > away_goals {
            Outcome::Home
        } else if home_goals < away_goals {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Outcome::Home => 'H',
            Outcome::Draw => 'D',
            Outcome::Away => 'A',
        }
    }

    pub fn from_char(c: char) -> Option<Self> {
        match c {
            'H' => Some(Outcome::Home),
            'D' => Some(Outcome::Draw),
            'A' => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn home_points(self) -> i32 {
        match self {
            Outcome::Home => 3,
            Outcome::Draw => 1,
            Outcome::Away => 0,
        }
    }

    pub fn away_points(self) -> i32 {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 3,
        }
    }

    pub fn class_index(self) -> usize {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }
}

/// One completed fixture. `date_unix` is the sole temporal ordering key; it is
/// immutable once the match is final and every leakage check relies on it.
/// The `*_ppg`, `*_xg_prematch` and `fs_*` fields are provider-guaranteed to
/// be computable before kickoff and are safe model inputs as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRow {
    pub id: u64,
    pub season_id: u32,
    pub league_id: u32,
    pub date_unix: i64,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_team: String,
    pub away_team: String,
    pub home_goals: i32,
    pub away_goals: i32,
    pub result: Outcome,
    pub home_shots: Option<f64>,
    pub away_shots: Option<f64>,
    pub home_xg: Option<f64>,
    pub away_xg: Option<f64>,
    pub odds_home: Option<f64>,
    pub odds_draw: Option<f64>,
    pub odds_away: Option<f64>,
    pub odds_over_25: Option<f64>,
    pub odds_btts_yes: Option<f64>,
    pub home_ppg: Option<f64>,
    pub away_ppg: Option<f64>,
    pub home_xg_prematch: Option<f64>,
    pub away_xg_prematch: Option<f64>,
    pub fs_btts_potential: Option<f64>,
    pub fs_o25_potential: Option<f64>,
    pub fs_o35_potential: Option<f64>,
}

impl MatchRow {
    pub fn total_goals(&self) -> i32 {
        self.home_goals + self.away_goals
    }

    pub fn btts(&self) -> bool {
        self.home_goals > 0 && self.away_goals > 0
    }

    pub fn over_25(&self) -> bool {
        self.total_goals() >= 3
    }

    pub fn involves(&self, team_id: u32) -> bool {
        self.home_team_id == team_id || self.away_team_id == team_id
    }
}

/// Season metadata used for per-league holdout splits. Start/end dates are
/// min/max match dates and widen as matches arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeasonRow {
    pub id: u32,
    pub league_id: u32,
    pub league_name: String,
    pub country: String,
    pub year: String,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
}

/// Sort matches into the canonical order every downstream calculator assumes:
/// ascending kickoff time, match id as the stable tiebreak.
pub fn sort_chronologically(matches: &mut [MatchRow]) {
    matches.sort_by_key(|m| (m.date_unix, m.id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_from_goals() {
        assert_eq!(Outcome::from_goals(2, 1), Outcome::Home);
        assert_eq!(Outcome::from_goals(0, 0), Outcome::Draw);
        assert_eq!(Outcome::from_goals(1, 3), Outcome::Away);
    }

    #[test]
    fn outcome_char_round_trip() {
        for o in [Outcome::Home, Outcome::Draw, Outcome::Away] {
            assert_eq!(Outcome::from_char(o.as_char()), Some(o));
        }
        assert_eq!(Outcome::from_char('X'), None);
    }

    #[test]
    fn points_split_sums_to_three_or_two() {
        assert_eq!(Outcome::Home.home_points() + Outcome::Home.away_points(), 3);
        assert_eq!(Outcome::Draw.home_points() + Outcome::Draw.away_points(), 2);
        assert_eq!(Outcome::Away.home_points() + Outcome::Away.away_points(), 3);
    }
}
