//! Categorical encoding maps, keyed by column name.
//!
//! Older artifacts store the maps as a bare list whose i-th entry belongs to
//! the i-th categorical column of the feature table. Those are bound to
//! column names once, at load time, so nothing downstream depends on
//! column position.

use crate::errors::{ArtifactError, Result};
use salescast_types::columns::{is_categorical, CATEGORICAL_COLUMNS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Raw category value to numeric code, for one column
pub type CategoryMap = BTreeMap<String, f64>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodingMaps {
    columns: BTreeMap<String, CategoryMap>,
}

/// On-disk JSON shape: either name-keyed or the legacy positional list
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum EncodingMapsFile {
    ByName(BTreeMap<String, CategoryMap>),
    Positional(Vec<CategoryMap>),
}

impl EncodingMaps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, mostly for fixtures.
    pub fn with_column<I, K>(mut self, column: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        self.insert(
            column,
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        );
        self
    }

    pub fn insert(&mut self, column: &str, map: CategoryMap) {
        self.columns.insert(column.to_string(), map);
    }

    /// Bind a positional list to [`CATEGORICAL_COLUMNS`].
    ///
    /// A list longer than the set of categorical columns cannot be bound
    /// unambiguously and is rejected. A shorter list leaves the trailing
    /// columns without a map.
    pub fn from_positional(maps: Vec<CategoryMap>) -> Result<Self> {
        if maps.len() > CATEGORICAL_COLUMNS.len() {
            return Err(ArtifactError::Inconsistent(format!(
                "{} positional encoding maps for {} categorical columns",
                maps.len(),
                CATEGORICAL_COLUMNS.len()
            )));
        }
        if maps.len() < CATEGORICAL_COLUMNS.len() {
            warn!(
                "positional encoding maps cover {} of {} categorical columns; {:?} left unmapped",
                maps.len(),
                CATEGORICAL_COLUMNS.len(),
                &CATEGORICAL_COLUMNS[maps.len()..]
            );
        }

        let columns = CATEGORICAL_COLUMNS
            .iter()
            .zip(maps)
            .map(|(column, map)| (column.to_string(), map))
            .collect();
        Ok(Self { columns })
    }

    pub fn from_file(file: EncodingMapsFile) -> Result<Self> {
        let maps = match file {
            EncodingMapsFile::ByName(columns) => Self { columns },
            EncodingMapsFile::Positional(list) => Self::from_positional(list)?,
        };
        maps.validate()?;
        Ok(maps)
    }

    /// Every map must belong to a categorical column of the feature table.
    pub fn validate(&self) -> Result<()> {
        for column in self.columns.keys() {
            if !is_categorical(column) {
                return Err(ArtifactError::Inconsistent(format!(
                    "encoding map for {column:?}, which is not a categorical feature column"
                )));
            }
        }
        Ok(())
    }

    /// Code for `value` in `column`, if the map knows it.
    pub fn encode(&self, column: &str, value: &str) -> Option<f64> {
        self.column(column)?.get(value).copied()
    }

    pub fn column(&self, column: &str) -> Option<&CategoryMap> {
        self.columns.get(column)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use salescast_types::columns::{ASSORTMENT, PROMO, STATE_HOLIDAY, STORE_TYPE, YEAR};

    #[test]
    fn test_encode_by_name() {
        let maps = EncodingMaps::new().with_column(STATE_HOLIDAY, [("a", 3.0)]);
        assert_eq!(maps.encode(STATE_HOLIDAY, "a"), Some(3.0));
        assert_eq!(maps.encode(STATE_HOLIDAY, "0"), None);
        assert_eq!(maps.encode(STORE_TYPE, "a"), None);
    }

    #[test]
    fn test_positional_maps_bind_in_table_order() {
        let list: Vec<CategoryMap> = (0..4)
            .map(|i| CategoryMap::from([(format!("v{i}"), i as f64)]))
            .collect();
        let maps = EncodingMaps::from_positional(list).unwrap();

        assert_eq!(maps.len(), 4);
        assert_eq!(maps.encode(PROMO, "v0"), Some(0.0));
        assert_eq!(maps.encode(STATE_HOLIDAY, "v1"), Some(1.0));
        assert_eq!(maps.encode(STORE_TYPE, "v3"), Some(3.0));
        assert!(maps.column(ASSORTMENT).is_none());
        assert_eq!(
            maps.column_names().collect::<Vec<_>>(),
            vec![PROMO, "SchoolHoliday", STATE_HOLIDAY, STORE_TYPE]
        );
    }

    #[test]
    fn test_too_many_positional_maps_rejected() {
        let list = vec![CategoryMap::new(); CATEGORICAL_COLUMNS.len() + 1];
        assert!(matches!(
            EncodingMaps::from_positional(list),
            Err(ArtifactError::Inconsistent(_))
        ));
    }

    #[test]
    fn test_map_for_numeric_column_rejected() {
        let maps = EncodingMaps::new().with_column(YEAR, [("2015", 1.0)]);
        assert!(maps.validate().is_err());
    }

    #[test]
    fn test_file_shapes() {
        let by_name: EncodingMapsFile =
            serde_json::from_str(r#"{"StateHoliday": {"0": 0, "a": 1}}"#).unwrap();
        let maps = EncodingMaps::from_file(by_name).unwrap();
        assert_eq!(maps.encode(STATE_HOLIDAY, "a"), Some(1.0));

        let positional: EncodingMapsFile =
            serde_json::from_str(r#"[{"0": 0, "1": 1}, {"0": 0, "a": 1, "b": 2, "c": 3}]"#)
                .unwrap();
        let maps = EncodingMaps::from_file(positional).unwrap();
        assert_eq!(maps.encode(PROMO, "1"), Some(1.0));
        assert_eq!(maps.encode(STATE_HOLIDAY, "c"), Some(3.0));
    }
}
