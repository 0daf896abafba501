use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::features::FeatureRow;
use crate::match_data::MatchRow;

pub const CACHE_SCHEMA_VERSION: u32 = 1;

const ROWS_FILE: &str = "features.json";
const META_FILE: &str = "features.meta";

/// Sidecar recorded next to the cached feature table; the cache is only valid
/// while all three version/fingerprint fields still match the live input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub schema_version: u32,
    pub feature_version: String,
    pub source_fingerprint: String,
    pub match_count: usize,
}

/// Stable hash over the ordering-relevant columns of the match table. Rows are
/// hashed in (id, date_unix) order so the fingerprint is independent of input
/// order but sensitive to any historical-data correction, including ones that
/// add no new matches.
pub fn source_fingerprint(matches: &[MatchRow]) -> String {
    if matches.is_empty() {
        return "empty".to_string();
    }

    let mut keys: Vec<(u64, i64, usize)> = matches
        .iter()
        .enumerate()
        .map(|(idx, m)| (m.id, m.date_unix, idx))
        .collect();
    keys.sort_by_key(|(id, date, _)| (*id, *date));

    let mut hasher = Sha256::new();
    let mut line = String::new();
    for (_, _, idx) in keys {
        let m = &matches[idx];
        line.clear();
        let _ = write!(
            line,
            "{}|{}|{}|{}|{}|{}|{}|{}|{}",
            m.id,
            m.season_id,
            m.league_id,
            m.date_unix,
            m.home_team_id,
            m.away_team_id,
            m.home_goals,
            m.away_goals,
            m.result.as_char(),
        );
        for v in [
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
        ] {
            match v {
                Some(x) => {
                    let _ = write!(line, "|{}", x.to_bits());
                }
                None => line.push_str("|-"),
            }
        }
        line.push('\n');
        hasher.update(line.as_bytes());
    }

    let digest = hasher.finalize();
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Why a cached table was rejected; callers log it and fall back to a full
/// recomputation (never an error).
#[derive(Debug, Clone, PartialEq)]
pub enum CacheMiss {
    Missing,
    Unreadable(String),
    SchemaVersion { cached: u32 },
    FeatureVersion { cached: String },
    SourceChanged,
}

impl std::fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheMiss::Missing => write!(f, "no cached feature table"),
            CacheMiss::Unreadable(err) => write!(f, "cache unreadable: {err}"),
            CacheMiss::SchemaVersion { cached } => {
                write!(f, "cache schema {cached} != {CACHE_SCHEMA_VERSION}")
            }
            CacheMiss::FeatureVersion { cached } => {
                write!(f, "cached feature version {cached:?} is stale")
            }
            CacheMiss::SourceChanged => write!(f, "source match data changed"),
        }
    }
}

pub fn validate_meta(
    meta: &CacheMeta,
    feature_version: &str,
    fingerprint: &str,
) -> Result<(), CacheMiss> {
    if meta.schema_version != CACHE_SCHEMA_VERSION {
        return Err(CacheMiss::SchemaVersion {
            cached: meta.schema_version,
        });
    }
    if meta.feature_version != feature_version {
        return Err(CacheMiss::FeatureVersion {
            cached: meta.feature_version.clone(),
        });
    }
    if meta.source_fingerprint != fingerprint {
        return Err(CacheMiss::SourceChanged);
    }
    Ok(())
}

/// Directory-backed store for the feature table and its `.meta` sidecar.
/// Deliberately an explicit value passed between pipeline stages rather than
/// an ambient path, so stages can be tested against a scratch directory.
#[derive(Debug, Clone)]
pub struct FeatureCacheStore {
    dir: PathBuf,
}

impl FeatureCacheStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn rows_path(&self) -> PathBuf {
        self.dir.join(ROWS_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Cached rows if the sidecar still matches the live feature version and
    /// source fingerprint; the `Err` side says why not.
    pub fn load(
        &self,
        feature_version: &str,
        fingerprint: &str,
    ) -> Result<Vec<FeatureRow>, CacheMiss> {
        let meta = match fs::read_to_string(self.meta_path()) {
            Ok(raw) => match serde_json::from_str::<CacheMeta>(&raw) {
                Ok(meta) => meta,
                Err(err) => return Err(CacheMiss::Unreadable(err.to_string())),
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheMiss::Missing);
            }
            Err(err) => return Err(CacheMiss::Unreadable(err.to_string())),
        };
        validate_meta(&meta, feature_version, fingerprint)?;

        let raw = fs::read_to_string(self.rows_path())
            .map_err(|err| CacheMiss::Unreadable(err.to_string()))?;
        serde_json::from_str::<Vec<FeatureRow>>(&raw)
            .map_err(|err| CacheMiss::Unreadable(err.to_string()))
    }

    /// Writes rows plus sidecar, each through a tmp-file rename so a crashed
    /// run never leaves a torn table behind.
    pub fn save(
        &self,
        rows: &[FeatureRow],
        feature_version: &str,
        fingerprint: &str,
        match_count: usize,
    ) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create cache dir {}", self.dir.display()))?;

        let meta = CacheMeta {
            schema_version: CACHE_SCHEMA_VERSION,
            feature_version: feature_version.to_string(),
            source_fingerprint: fingerprint.to_string(),
            match_count,
        };

        write_atomic(
            &self.rows_path(),
            &serde_json::to_string(rows).context("serialize feature rows")?,
        )?;
        write_atomic(
            &self.meta_path(),
            &serde_json::to_string_pretty(&meta).context("serialize cache meta")?,
        )?;
        Ok(())
    }
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::match_data::Outcome;

    fn sample_match(id: u64, date_unix: i64) -> MatchRow {
        MatchRow {
            id,
            season_id: 1,
            league_id: 1,
            date_unix,
            home_team_id: 1,
            away_team_id: 2,
            home_goals: 1,
            away_goals: 0,
            result: Outcome::Home,
            odds_home: Some(2.1),
            ..MatchRow::default()
        }
    }

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("betbot_cache_{name}_{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn fingerprint_ignores_row_order() {
        let a = vec![sample_match(1, 100), sample_match(2, 200)];
        let b = vec![sample_match(2, 200), sample_match(1, 100)];
        assert_eq!(source_fingerprint(&a), source_fingerprint(&b));
    }

    #[test]
    fn fingerprint_sees_historical_corrections() {
        let a = vec![sample_match(1, 100), sample_match(2, 200)];
        let mut b = a.clone();
        b[0].odds_home = Some(2.2);
        assert_ne!(source_fingerprint(&a), source_fingerprint(&b));
    }

    #[test]
    fn empty_input_has_sentinel_fingerprint() {
        assert_eq!(source_fingerprint(&[]), "empty");
    }

    #[test]
    fn stale_feature_version_invalidates() {
        let meta = CacheMeta {
            schema_version: CACHE_SCHEMA_VERSION,
            feature_version: "1".to_string(),
            source_fingerprint: "abc".to_string(),
            match_count: 10,
        };
        assert!(validate_meta(&meta, "1", "abc").is_ok());
        assert!(matches!(
            validate_meta(&meta, "2", "abc"),
            Err(CacheMiss::FeatureVersion { .. })
        ));
        assert!(matches!(
            validate_meta(&meta, "1", "def"),
            Err(CacheMiss::SourceChanged)
        ));
    }

    #[test]
    fn store_round_trip() {
        let dir = scratch_dir("round_trip");
        let store = FeatureCacheStore::new(&dir);

        assert_eq!(store.load("1", "fp"), Err(CacheMiss::Missing));

        let rows: Vec<FeatureRow> = Vec::new();
        store.save(&rows, "1", "fp", 0).unwrap();
        assert_eq!(store.load("1", "fp").unwrap(), rows);
        assert!(matches!(
            store.load("1", "other"),
            Err(CacheMiss::SourceChanged)
        ));

        let _ = fs::remove_dir_all(&dir);
    }
}
