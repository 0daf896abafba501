use std::collections::BTreeMap;
use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::features::FeatureRow;
use crate::match_data::Outcome;

pub const DEFAULT_MIN_EDGE: f64 = 0.05;
pub const DEFAULT_MIN_ODDS: f64 = 1.5;
pub const DEFAULT_MAX_ODDS: f64 = 10.0;
pub const DEFAULT_KELLY_FRACTION: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    Home,
    Draw,
    Away,
    Over25,
    Btts,
}

impl Market {
    pub const ALL: [Market; 5] = [
        Market::Home,
        Market::Draw,
        Market::Away,
        Market::Over25,
        Market::Btts,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Market::Home => "Home",
            Market::Draw => "Draw",
            Market::Away => "Away",
            Market::Over25 => "Over 2.5",
            Market::Btts => "BTTS",
        }
    }
}

/// Coarse tier for display; ordering is by edge only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
}

impl ConfidenceTier {
    pub fn from_edge(edge: f64) -> Self {
        if edge >= 0.10 {
            ConfidenceTier::High
        } else if edge >= 0.07 {
            ConfidenceTier::Medium
        } else {
            ConfidenceTier::Low
        }
    }
}

/// Model probabilities for one match, one row per prediction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub match_id: u64,
    pub prob_home: f64,
    pub prob_draw: f64,
    pub prob_away: f64,
    pub prob_over_25: f64,
    pub prob_btts: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValueBet {
    pub match_id: u64,
    pub home_team: String,
    pub away_team: String,
    pub market: Market,
    pub model_prob: f64,
    pub odds: f64,
    pub implied_prob: f64,
    pub edge: f64,
    pub confidence: ConfidenceTier,
    pub stake_fraction: f64,
    pub actual_win: bool,
}

/// Implied probability of decimal odds; zero or negative odds carry no
/// information and map to 0 rather than an infinite edge.
pub fn implied_prob(odds: f64) -> f64 {
    if odds <= 0.0 { 0.0 } else { 1.0 / odds }
}

/// Model probability minus bookmaker-implied probability.
pub fn edge(model_prob: f64, odds: f64) -> f64 {
    model_prob - implied_prob(odds)
}

/// Fractional Kelly stake as a share of bankroll. Fails closed: no edge,
/// invalid odds or a degenerate denominator all return 0, never a negative
/// stake suggestion.
pub fn kelly_fraction(model_prob: f64, odds: f64, fraction: f64) -> f64 {
    if odds <= 1.0 || model_prob <= 0.0 {
        return 0.0;
    }
    let full = (model_prob * odds - 1.0) / (odds - 1.0);
    (full * fraction).max(0.0)
}

/// Candidate bets across the five supported markets. Three independent gates:
/// edge >= `min_edge`, odds within `[min_odds, max_odds]`, odds present and
/// positive. Output is sorted by edge, best first.
pub fn find_value_bets(
    predictions: &[Prediction],
    features: &[FeatureRow],
    min_edge: f64,
    min_odds: f64,
    max_odds: f64,
) -> Vec<ValueBet> {
    let by_id: HashMap<u64, &FeatureRow> = features.iter().map(|f| (f.match_id, f)).collect();

    let mut out = Vec::new();
    for pred in predictions {
        let Some(row) = by_id.get(&pred.match_id) else {
            continue;
        };

        let markets: [(Market, f64, Option<f64>, bool); 5] = [
            (
                Market::Home,
                pred.prob_home,
                row.odds_home,
                row.target_result == Outcome::Home,
            ),
            (
                Market::Draw,
                pred.prob_draw,
                row.odds_draw,
                row.target_result == Outcome::Draw,
            ),
            (
                Market::Away,
                pred.prob_away,
                row.odds_away,
                row.target_result == Outcome::Away,
            ),
            (
                Market::Over25,
                pred.prob_over_25,
                row.odds_over_25,
                row.target_over_25,
            ),
            (Market::Btts, pred.prob_btts, row.odds_btts_yes, row.target_btts),
        ];

        for (market, model_prob, odds, actual_win) in markets {
            let Some(odds) = odds else {
                continue;
            };
            if odds <= 0.0 || odds < min_odds || odds > max_odds {
                continue;
            }
            let bet_edge = edge(model_prob, odds);
            if bet_edge < min_edge {
                continue;
            }
            out.push(ValueBet {
                match_id: pred.match_id,
                home_team: row.home_team.clone(),
                away_team: row.away_team.clone(),
                market,
                model_prob,
                odds,
                implied_prob: implied_prob(odds),
                edge: bet_edge,
                confidence: ConfidenceTier::from_edge(bet_edge),
                stake_fraction: kelly_fraction(model_prob, odds, DEFAULT_KELLY_FRACTION),
                actual_win,
            });
        }
    }

    out.sort_by(|a, b| b.edge.total_cmp(&a.edge).then(a.match_id.cmp(&b.match_id)));
    out
}

/// Flat-stake simulation summary. `total_bets == 0` is the explicit
/// "no bets" result; every ratio in it is zero by construction, never NaN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BacktestSummary {
    pub total_bets: usize,
    pub wins: usize,
    pub win_rate: f64,
    pub total_staked: f64,
    pub total_returned: f64,
    pub profit: f64,
    pub roi: f64,
    pub avg_odds: f64,
    pub avg_edge: f64,
}

pub fn backtest(bets: &[ValueBet], stake: f64) -> BacktestSummary {
    if bets.is_empty() {
        return BacktestSummary::default();
    }

    let total_staked = bets.len() as f64 * stake;
    let mut total_returned = 0.0;
    let mut wins = 0usize;
    for bet in bets {
        if bet.actual_win {
            total_returned += stake * bet.odds;
            wins += 1;
        }
    }

    let profit = total_returned - total_staked;
    let n = bets.len() as f64;
    BacktestSummary {
        total_bets: bets.len(),
        wins,
        win_rate: wins as f64 / n,
        total_staked,
        total_returned,
        profit,
        roi: profit / total_staked * 100.0,
        avg_odds: bets.iter().map(|b| b.odds).sum::<f64>() / n,
        avg_edge: bets.iter().map(|b| b.edge).sum::<f64>() / n,
    }
}

/// Same simulation grouped by market label, deterministically ordered.
pub fn backtest_by_market(bets: &[ValueBet], stake: f64) -> BTreeMap<&'static str, BacktestSummary> {
    let mut grouped: BTreeMap<&'static str, Vec<ValueBet>> = BTreeMap::new();
    for bet in bets {
        grouped.entry(bet.market.label()).or_default().push(bet.clone());
    }
    grouped
        .into_iter()
        .map(|(label, group)| (label, backtest(&group, stake)))
        .collect()
}
