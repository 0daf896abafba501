use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};

use crate::match_data::{MatchRow, Outcome, SeasonRow};

#[derive(Debug, Clone, Copy, Default)]
pub struct StoreSummary {
    pub matches_upserted: usize,
    pub seasons_upserted: usize,
    pub incomplete_deleted: usize,
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS matches (
            id INTEGER PRIMARY KEY,
            season_id INTEGER NOT NULL,
            league_id INTEGER NOT NULL,
            date_unix INTEGER NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            home_team TEXT NOT NULL,
            away_team TEXT NOT NULL,
            home_goals INTEGER NOT NULL,
            away_goals INTEGER NOT NULL,
            outcome TEXT NOT NULL,
            home_shots REAL NULL,
            away_shots REAL NULL,
            home_xg REAL NULL,
            away_xg REAL NULL,
            odds_home REAL NULL,
            odds_draw REAL NULL,
            odds_away REAL NULL,
            odds_over_25 REAL NULL,
            odds_btts_yes REAL NULL,
            home_ppg REAL NULL,
            away_ppg REAL NULL,
            home_xg_prematch REAL NULL,
            away_xg_prematch REAL NULL,
            fs_btts_potential REAL NULL,
            fs_o25_potential REAL NULL,
            fs_o35_potential REAL NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_season ON matches(season_id);
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_id);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date_unix);

        CREATE TABLE IF NOT EXISTS seasons (
            id INTEGER PRIMARY KEY,
            league_id INTEGER NOT NULL,
            league_name TEXT NOT NULL,
            country TEXT NOT NULL,
            year TEXT NOT NULL,
            start_date INTEGER NULL,
            end_date INTEGER NULL
        );
        CREATE INDEX IF NOT EXISTS idx_seasons_league ON seasons(league_id);
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Upsert matches and season metadata, then refresh each season's start/end
/// dates from its stored matches and drop rows missing a usable score line.
pub fn store(
    conn: &mut Connection,
    matches: &[MatchRow],
    seasons: &[SeasonRow],
) -> Result<StoreSummary> {
    let tx = conn.transaction().context("begin store transaction")?;
    let mut summary = StoreSummary::default();

    for m in matches {
        upsert_match(&tx, m)?;
        summary.matches_upserted += 1;
    }
    for s in seasons {
        upsert_season(&tx, s)?;
        summary.seasons_upserted += 1;
    }

    summary.incomplete_deleted = tx
        .execute(
            "DELETE FROM matches WHERE home_goals < 0 OR away_goals < 0",
            [],
        )
        .context("delete incomplete matches")?;

    tx.execute_batch(
        r#"
        UPDATE seasons SET
            start_date = (SELECT MIN(date_unix) FROM matches WHERE matches.season_id = seasons.id),
            end_date = (SELECT MAX(date_unix) FROM matches WHERE matches.season_id = seasons.id)
        WHERE EXISTS (SELECT 1 FROM matches WHERE matches.season_id = seasons.id)
        "#,
    )
    .context("refresh season date bounds")?;

    tx.commit().context("commit store transaction")?;
    Ok(summary)
}

/// Loads every stored match in canonical chronological order.
pub fn load_matches(conn: &Connection) -> Result<Vec<MatchRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                id, season_id, league_id, date_unix,
                home_team_id, away_team_id, home_team, away_team,
                home_goals, away_goals, outcome,
                home_shots, away_shots, home_xg, away_xg,
                odds_home, odds_draw, odds_away, odds_over_25, odds_btts_yes,
                home_ppg, away_ppg, home_xg_prematch, away_xg_prematch,
                fs_btts_potential, fs_o25_potential, fs_o35_potential
            FROM matches
            ORDER BY date_unix ASC, id ASC
            "#,
        )
        .context("prepare load matches query")?;

    let rows = stmt
        .query_map([], |row| {
            let home_goals: i32 = row.get(8)?;
            let away_goals: i32 = row.get(9)?;
            let outcome: String = row.get(10)?;
            Ok(MatchRow {
                id: row.get::<_, u64>(0)?,
                season_id: row.get::<_, u32>(1)?,
                league_id: row.get::<_, u32>(2)?,
                date_unix: row.get(3)?,
                home_team_id: row.get::<_, u32>(4)?,
                away_team_id: row.get::<_, u32>(5)?,
                home_team: row.get(6)?,
                away_team: row.get(7)?,
                home_goals,
                away_goals,
                result: outcome
                    .chars()
                    .next()
                    .and_then(Outcome::from_char)
                    .unwrap_or_else(|| Outcome::from_goals(home_goals, away_goals)),
                home_shots: row.get(11)?,
                away_shots: row.get(12)?,
                home_xg: row.get(13)?,
                away_xg: row.get(14)?,
                odds_home: row.get(15)?,
                odds_draw: row.get(16)?,
                odds_away: row.get(17)?,
                odds_over_25: row.get(18)?,
                odds_btts_yes: row.get(19)?,
                home_ppg: row.get(20)?,
                away_ppg: row.get(21)?,
                home_xg_prematch: row.get(22)?,
                away_xg_prematch: row.get(23)?,
                fs_btts_potential: row.get(24)?,
                fs_o25_potential: row.get(25)?,
                fs_o35_potential: row.get(26)?,
            })
        })
        .context("query load matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

pub fn load_seasons(conn: &Connection) -> Result<Vec<SeasonRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, league_id, league_name, country, year, start_date, end_date
             FROM seasons ORDER BY league_id ASC, start_date ASC, id ASC",
        )
        .context("prepare load seasons query")?;

    let rows = stmt
        .query_map([], |row| {
            Ok(SeasonRow {
                id: row.get::<_, u32>(0)?,
                league_id: row.get::<_, u32>(1)?,
                league_name: row.get(2)?,
                country: row.get(3)?,
                year: row.get(4)?,
                start_date: row.get(5)?,
                end_date: row.get(6)?,
            })
        })
        .context("query load seasons")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode season row")?);
    }
    Ok(out)
}

fn upsert_match(tx: &rusqlite::Transaction<'_>, m: &MatchRow) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            id, season_id, league_id, date_unix,
            home_team_id, away_team_id, home_team, away_team,
            home_goals, away_goals, outcome,
            home_shots, away_shots, home_xg, away_xg,
            odds_home, odds_draw, odds_away, odds_over_25, odds_btts_yes,
            home_ppg, away_ppg, home_xg_prematch, away_xg_prematch,
            fs_btts_potential, fs_o25_potential, fs_o35_potential, updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4,
            ?5, ?6, ?7, ?8,
            ?9, ?10, ?11,
            ?12, ?13, ?14, ?15,
            ?16, ?17, ?18, ?19, ?20,
            ?21, ?22, ?23, ?24,
            ?25, ?26, ?27, ?28
        )
        ON CONFLICT(id) DO UPDATE SET
            season_id = excluded.season_id,
            league_id = excluded.league_id,
            date_unix = excluded.date_unix,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            home_team = excluded.home_team,
            away_team = excluded.away_team,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            outcome = excluded.outcome,
            home_shots = excluded.home_shots,
            away_shots = excluded.away_shots,
            home_xg = excluded.home_xg,
            away_xg = excluded.away_xg,
            odds_home = excluded.odds_home,
            odds_draw = excluded.odds_draw,
            odds_away = excluded.odds_away,
            odds_over_25 = excluded.odds_over_25,
            odds_btts_yes = excluded.odds_btts_yes,
            home_ppg = excluded.home_ppg,
            away_ppg = excluded.away_ppg,
            home_xg_prematch = excluded.home_xg_prematch,
            away_xg_prematch = excluded.away_xg_prematch,
            fs_btts_potential = excluded.fs_btts_potential,
            fs_o25_potential = excluded.fs_o25_potential,
            fs_o35_potential = excluded.fs_o35_potential,
            updated_at = excluded.updated_at
        "#,
        params![
            m.id as i64,
            m.season_id as i64,
            m.league_id as i64,
            m.date_unix,
            m.home_team_id as i64,
            m.away_team_id as i64,
            m.home_team,
            m.away_team,
            m.home_goals,
            m.away_goals,
            m.result.as_char().to_string(),
            m.home_shots,
            m.away_shots,
            m.home_xg,
            m.away_xg,
            m.odds_home,
            m.odds_draw,
            m.odds_away,
            m.odds_over_25,
            m.odds_btts_yes,
            m.home_ppg,
            m.away_ppg,
            m.home_xg_prematch,
            m.away_xg_prematch,
            m.fs_btts_potential,
            m.fs_o25_potential,
            m.fs_o35_potential,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

fn upsert_season(tx: &rusqlite::Transaction<'_>, s: &SeasonRow) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO seasons (id, league_id, league_name, country, year, start_date, end_date)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(id) DO UPDATE SET
            league_id = excluded.league_id,
            league_name = excluded.league_name,
            country = excluded.country,
            year = excluded.year,
            start_date = excluded.start_date,
            end_date = excluded.end_date
        "#,
        params![
            s.id as i64,
            s.league_id as i64,
            s.league_name,
            s.country,
            s.year,
            s.start_date,
            s.end_date,
        ],
    )
    .context("upsert season")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synthetic::{SyntheticConfig, generate};

    fn memory_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn store_and_load_round_trip() {
        let data = generate(&SyntheticConfig {
            leagues: 1,
            seasons_per_league: 1,
            teams_per_league: 4,
            seed: 1,
        });
        let mut conn = memory_db();
        let summary = store(&mut conn, &data.matches, &data.seasons).unwrap();
        assert_eq!(summary.matches_upserted, data.matches.len());
        assert_eq!(summary.seasons_upserted, 1);

        let loaded = load_matches(&conn).unwrap();
        assert_eq!(loaded.len(), data.matches.len());
        // Canonical order regardless of insertion order.
        for pair in loaded.windows(2) {
            assert!((pair[0].date_unix, pair[0].id) < (pair[1].date_unix, pair[1].id));
        }
        let original: std::collections::HashMap<u64, &MatchRow> =
            data.matches.iter().map(|m| (m.id, m)).collect();
        for m in &loaded {
            let orig = original[&m.id];
            assert_eq!(m.result, orig.result);
            assert_eq!(m.odds_home, orig.odds_home);
            assert_eq!(m.home_xg, orig.home_xg);
        }
    }

    #[test]
    fn upsert_is_idempotent_and_new_wins() {
        let data = generate(&SyntheticConfig {
            leagues: 1,
            seasons_per_league: 1,
            teams_per_league: 3,
            seed: 2,
        });
        let mut conn = memory_db();
        store(&mut conn, &data.matches, &data.seasons).unwrap();

        let mut edited = data.matches.clone();
        edited[0].home_goals = 9;
        edited[0].result = Outcome::from_goals(9, edited[0].away_goals);
        store(&mut conn, &edited, &data.seasons).unwrap();

        let loaded = load_matches(&conn).unwrap();
        assert_eq!(loaded.len(), data.matches.len());
        let row = loaded.iter().find(|m| m.id == edited[0].id).unwrap();
        assert_eq!(row.home_goals, 9);
    }

    #[test]
    fn season_dates_refresh_from_matches() {
        let data = generate(&SyntheticConfig {
            leagues: 1,
            seasons_per_league: 1,
            teams_per_league: 3,
            seed: 3,
        });
        let mut seasons = data.seasons.clone();
        seasons[0].start_date = None;
        seasons[0].end_date = None;

        let mut conn = memory_db();
        store(&mut conn, &data.matches, &seasons).unwrap();
        let loaded = load_seasons(&conn).unwrap();
        let min = data.matches.iter().map(|m| m.date_unix).min().unwrap();
        let max = data.matches.iter().map(|m| m.date_unix).max().unwrap();
        assert_eq!(loaded[0].start_date, Some(min));
        assert_eq!(loaded[0].end_date, Some(max));
    }
}
