//! Bulk feature tables.
//!
//! A [`FeatureTable`] holds one [`PlayerSeason`] per `(player_id, season)`.
//! Tables are produced by an upstream feature pipeline and read once at the
//! start of a batch run.
//!
//! # Formats
//!
//! **CSV**: a header row with the identity columns `player_id`, `player_name`
//! and `season`; every other column is a feature. Empty cells and the markers
//! `NA`, `NaN`, `nan`, `null` and `None` are read as "not measured".
//!
//! ```text
//! player_id,player_name,season,usg_pct,creation_tax,age
//! 201939,Example Player,2016-17,0.301,0.04,28
//! 1628369,Other Player,2018-19,0.197,,21
//! ```
//!
//! **JSON**: an array of seasons with a `features` object (`null` = not measured).
//!
//! ```json
//! [
//!   {
//!     "player_id": "201939",
//!     "player_name": "Example Player",
//!     "season": "2016-17",
//!     "features": { "usg_pct": 0.301, "creation_tax": 0.04, "age": 28 }
//!   }
//! ]
//! ```

use std::{
    collections::{BTreeSet, HashMap},
    io,
};

use serde::Deserialize;

use crate::{
    feature::FeatureVector,
    interaction,
    season::{PlayerSeason, SeasonKey},
};

const PLAYER_ID: &str = "player_id";
const PLAYER_NAME: &str = "player_name";
const SEASON: &str = "season";

const MISSING_MARKERS: [&str; 6] = ["", "NA", "NaN", "nan", "null", "None"];

#[derive(Debug, derive_more::Display, derive_more::Error)]
pub enum FeatureTableError {
    #[display("failed to read CSV feature table")]
    Csv(csv::Error),
    #[display("failed to parse JSON feature table")]
    Json(serde_json::Error),
    #[display("feature table is missing required column '{column}'")]
    MissingColumn { column: &'static str },
    #[display("column '{column}' is reserved for a derived feature")]
    ReservedColumn { column: String },
    #[display("row {row}: invalid value '{value}' in column '{column}'")]
    InvalidValue {
        row: usize,
        column: String,
        value: String,
    },
    #[display("duplicate row for {key}")]
    DuplicateSeason { key: SeasonKey },
}

#[derive(Deserialize)]
struct RawSeason {
    player_id: String,
    player_name: String,
    season: String,
    features: FeatureVector,
}

/// Collection of player-seasons keyed by `(player_id, season)`.
#[derive(Debug, Clone, Default)]
pub struct FeatureTable {
    seasons: Vec<PlayerSeason>,
    index: HashMap<SeasonKey, usize>,
    columns: BTreeSet<String>,
}

impl FeatureTable {
    /// Builds a table from seasons, rejecting duplicate keys and reserved columns.
    pub fn from_seasons<I>(seasons: I) -> Result<Self, FeatureTableError>
    where
        I: IntoIterator<Item = PlayerSeason>,
    {
        let mut table = Self::default();
        for season in seasons {
            table.insert(season)?;
        }
        Ok(table)
    }

    fn insert(&mut self, season: PlayerSeason) -> Result<(), FeatureTableError> {
        let key = season.key();
        if self.index.contains_key(&key) {
            return Err(FeatureTableError::DuplicateSeason { key });
        }
        self.columns
            .extend(season.features().keys().map(str::to_owned));
        self.index.insert(key, self.seasons.len());
        self.seasons.push(season);
        Ok(())
    }

    /// Reads a CSV table (see the module documentation for the layout).
    pub fn from_csv_reader<R>(reader: R) -> Result<Self, FeatureTableError>
    where
        R: io::Read,
    {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = reader.headers().map_err(FeatureTableError::Csv)?.clone();

        let position = |column: &'static str| {
            headers
                .iter()
                .position(|h| h == column)
                .ok_or(FeatureTableError::MissingColumn { column })
        };
        let id_idx = position(PLAYER_ID)?;
        let name_idx = position(PLAYER_NAME)?;
        let season_idx = position(SEASON)?;

        let feature_columns = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| ![id_idx, name_idx, season_idx].contains(i))
            .map(|(i, name)| (i, name.to_owned()))
            .collect::<Vec<_>>();
        if let Some((_, column)) = feature_columns
            .iter()
            .find(|(_, name)| interaction::is_derived(name))
        {
            return Err(FeatureTableError::ReservedColumn {
                column: column.clone(),
            });
        }

        let mut table = Self::default();
        for (row, record) in reader.records().enumerate() {
            let record = record.map_err(FeatureTableError::Csv)?;
            let cell = |idx: usize| record.get(idx).unwrap_or_default();
            let mut features = FeatureVector::new();
            for (idx, column) in &feature_columns {
                let value = parse_cell(cell(*idx)).ok_or_else(|| {
                    FeatureTableError::InvalidValue {
                        // header is row 1
                        row: row + 2,
                        column: column.clone(),
                        value: cell(*idx).to_owned(),
                    }
                })?;
                features.set(column.as_str(), value);
            }
            table.insert(PlayerSeason::new(
                cell(id_idx),
                cell(name_idx),
                cell(season_idx),
                features,
            ))?;
        }
        Ok(table)
    }

    /// Reads a JSON table (see the module documentation for the layout).
    pub fn from_json_reader<R>(reader: R) -> Result<Self, FeatureTableError>
    where
        R: io::Read,
    {
        let raw: Vec<RawSeason> =
            serde_json::from_reader(reader).map_err(FeatureTableError::Json)?;
        if let Some(column) = raw
            .iter()
            .flat_map(|s| s.features.keys())
            .find(|k| interaction::is_derived(k))
        {
            return Err(FeatureTableError::ReservedColumn {
                column: column.to_owned(),
            });
        }
        Self::from_seasons(
            raw.into_iter()
                .map(|s| PlayerSeason::new(s.player_id, s.player_name, s.season, s.features)),
        )
    }

    #[must_use]
    pub fn get(&self, player_id: &str, season: &str) -> Option<&PlayerSeason> {
        let key = SeasonKey {
            player_id: player_id.to_owned(),
            season: season.to_owned(),
        };
        self.index.get(&key).map(|&i| &self.seasons[i])
    }

    #[must_use]
    pub fn seasons(&self) -> &[PlayerSeason] {
        &self.seasons
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.seasons.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seasons.is_empty()
    }

    /// Every feature key present in at least one season, derived keys included.
    ///
    /// This is the key schema the table supplies to a classifier.
    #[must_use]
    pub fn columns(&self) -> &BTreeSet<String> {
        &self.columns
    }
}

/// Parses one CSV cell. `Some(None)` is a missing value, `None` a parse error.
fn parse_cell(cell: &str) -> Option<Option<f32>> {
    if MISSING_MARKERS.contains(&cell) {
        return Some(None);
    }
    cell.parse::<f32>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Some)
}

#[cfg(test)]
mod tests {
    use crate::feature::keys;

    use super::*;

    const CSV: &str = "\
player_id,player_name,season,usg_pct,creation_tax,age
201939,Example Player,2016-17,0.301,0.04,28
1628369,Other Player,2018-19,0.197,,21
1628369,Other Player,2019-20,0.221,NA,22
";

    #[test]
    fn test_csv_reads_rows_and_missing_cells() {
        let table = FeatureTable::from_csv_reader(CSV.as_bytes()).unwrap();
        assert_eq!(table.len(), 3);

        let season = table.get("1628369", "2018-19").unwrap();
        assert_eq!(season.player_name, "Other Player");
        assert_eq!(season.usage(), Some(0.197));
        assert!(season.features().contains_key(keys::CREATION_TAX));
        assert_eq!(season.features().get(keys::CREATION_TAX), None);
        assert_eq!(
            table
                .get("1628369", "2019-20")
                .unwrap()
                .features()
                .get(keys::CREATION_TAX),
            None
        );
    }

    #[test]
    fn test_columns_include_derived_keys() {
        let table = FeatureTable::from_csv_reader(CSV.as_bytes()).unwrap();
        assert!(table.columns().contains(keys::USG_PCT));
        assert!(table.columns().contains(keys::USG_X_CREATION_TAX));
        assert!(!table.columns().contains(PLAYER_ID));
    }

    #[test]
    fn test_csv_rejects_bad_numbers() {
        let csv = "player_id,player_name,season,usg_pct\n1,A,2020-21,high\n";
        let err = FeatureTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FeatureTableError::InvalidValue { row: 2, ref column, .. } if column == "usg_pct"
        ));
    }

    #[test]
    fn test_csv_rejects_infinite_values() {
        for value in ["inf", "-inf", "infinity"] {
            let csv = format!("player_id,player_name,season,rim_fg_pct\n1,A,2020-21,{value}\n");
            let err = FeatureTable::from_csv_reader(csv.as_bytes()).unwrap_err();
            assert!(
                matches!(err, FeatureTableError::InvalidValue { row: 2, .. }),
                "{value}: {err}"
            );
        }
    }

    #[test]
    fn test_csv_requires_identity_columns() {
        let csv = "player_id,season,usg_pct\n1,2020-21,0.2\n";
        let err = FeatureTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(
            err,
            FeatureTableError::MissingColumn {
                column: PLAYER_NAME
            }
        ));
    }

    #[test]
    fn test_csv_rejects_reserved_columns() {
        let csv = "player_id,player_name,season,usg_x_creation_tax\n1,A,2020-21,0.2\n";
        let err = FeatureTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, FeatureTableError::ReservedColumn { .. }));
    }

    #[test]
    fn test_duplicate_seasons_are_rejected() {
        let csv = "player_id,player_name,season\n1,A,2020-21\n1,A,2020-21\n";
        let err = FeatureTable::from_csv_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, FeatureTableError::DuplicateSeason { .. }));
    }

    #[test]
    fn test_json_table() {
        let json = r#"[
            {"player_id": "1", "player_name": "A", "season": "2020-21",
             "features": {"usg_pct": 0.25, "creation_tax": null}}
        ]"#;
        let table = FeatureTable::from_json_reader(json.as_bytes()).unwrap();
        let season = table.get("1", "2020-21").unwrap();
        assert_eq!(season.usage(), Some(0.25));
        assert!(season.features().contains_key(keys::CREATION_TAX));
        assert_eq!(season.features().get(keys::CREATION_TAX), None);
    }
}
