//! Request-to-feature transformation
//!
//! Turns a batch of validated requests into the feature table the model was
//! trained on. Per row, in order:
//! 1. Flatten the request; `Open` is dropped, `Id` is carried beside the row
//! 2. Decompose `Date` into Year, Month, DayOfMonth and ISO WeekOfYear
//! 3. Inner-join against the store table on `Store`
//! 4. Derive Current-OpenComp and Current-OpenPromo
//! 5. Replace categorical values with their encoded codes
//!
//! Column layout is fixed, see [`salescast_types::columns::FEATURE_COLUMNS`].

use crate::encoding::EncodingMaps;
use crate::errors::TransformError;
use crate::stores::StoreTable;
use crate::validation::parse_date;
use chrono::Datelike;
use salescast_types::columns::{is_categorical, FEATURE_COLUMNS};
use salescast_types::{PredictionRequest, StoreAttributes};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// One cell of the feature table
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    /// A categorical value that was not (or not yet) encoded
    Category(String),
    /// A categorical store attribute that is null in the store table
    Missing,
}

/// How a null category shows up in logs and errors
pub const MISSING_CATEGORY: &str = "null";

impl FeatureValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FeatureValue::Number(v) => Some(*v),
            FeatureValue::Category(_) | FeatureValue::Missing => None,
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(value: f64) -> Self {
        FeatureValue::Number(value)
    }
}

/// Transformed batch. Rows line up with `ids` and `source_rows`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureTable {
    ids: Vec<i64>,
    /// Position of each row's record in the transformer's input
    source_rows: Vec<usize>,
    rows: Vec<Vec<FeatureValue>>,
}

impl FeatureTable {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        FEATURE_COLUMNS.iter().position(|c| *c == name)
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    pub fn source_rows(&self) -> &[usize] {
        &self.source_rows
    }

    pub fn rows(&self) -> &[Vec<FeatureValue>] {
        &self.rows
    }

    /// Cell lookup by row index and column name.
    pub fn value(&self, row: usize, column: &str) -> Option<&FeatureValue> {
        let col = self.column_index(column)?;
        self.rows.get(row)?.get(col)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What to do with a record whose store has no attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JoinMissPolicy {
    /// Inner-join semantics: the row is left out of the table (logged)
    #[default]
    Drop,
    /// Fail the whole batch
    Reject,
}

/// What to do with a categorical value absent from its encoding map
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum UnknownCategoryPolicy {
    /// Keep the raw value (logged); the model sees it as a missing feature
    #[default]
    PassThrough,
    /// Fail the whole batch
    Reject,
    /// Substitute a fixed code
    Sentinel(f64),
}

impl UnknownCategoryPolicy {
    /// Parse a policy name; `code` is only used by `sentinel`.
    pub fn parse(mode: &str, code: f64) -> Result<Self, String> {
        match mode.trim().to_lowercase().as_str() {
            "passthrough" | "pass_through" | "pass-through" => Ok(Self::PassThrough),
            "reject" => Ok(Self::Reject),
            "sentinel" => Ok(Self::Sentinel(code)),
            other => Err(format!("unknown category policy {other:?}")),
        }
    }
}

impl FromStr for JoinMissPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "drop" => Ok(Self::Drop),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown join miss policy {other:?}")),
        }
    }
}

impl fmt::Display for JoinMissPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinMissPolicy::Drop => f.write_str("drop"),
            JoinMissPolicy::Reject => f.write_str("reject"),
        }
    }
}

/// Edge-case handling for the transformer
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformPolicy {
    pub join_miss: JoinMissPolicy,
    pub unknown_category: UnknownCategoryPolicy,
}

/// Owns the store table and encoding maps; read-only after construction.
#[derive(Debug, Clone)]
pub struct FeatureTransformer {
    stores: StoreTable,
    maps: EncodingMaps,
    policy: TransformPolicy,
}

impl FeatureTransformer {
    pub fn new(stores: StoreTable, maps: EncodingMaps, policy: TransformPolicy) -> Self {
        Self {
            stores,
            maps,
            policy,
        }
    }

    pub fn stores(&self) -> &StoreTable {
        &self.stores
    }

    pub fn maps(&self) -> &EncodingMaps {
        &self.maps
    }

    /// Transform a batch into a feature table.
    ///
    /// Rows keep input order; rows dropped by the join simply do not appear,
    /// so callers must use [`FeatureTable::source_rows`] to line results up.
    pub fn transform<'a, I>(&self, records: I) -> Result<FeatureTable, TransformError>
    where
        I: IntoIterator<Item = &'a PredictionRequest>,
    {
        let mut table = FeatureTable {
            ids: Vec::new(),
            source_rows: Vec::new(),
            rows: Vec::new(),
        };
        let mut dropped = 0usize;

        for (position, record) in records.into_iter().enumerate() {
            let Some(attrs) = self.stores.get(record.store) else {
                match self.policy.join_miss {
                    JoinMissPolicy::Drop => {
                        warn!(
                            id = record.id,
                            store = record.store,
                            "store has no attributes; record dropped from batch"
                        );
                        dropped += 1;
                        continue;
                    }
                    JoinMissPolicy::Reject => {
                        return Err(TransformError::JoinMiss {
                            id: record.id,
                            store: record.store,
                        });
                    }
                }
            };

            let mut row = raw_row(record, attrs)?;
            self.encode_row(record.id, &mut row)?;

            table.ids.push(record.id);
            table.source_rows.push(position);
            table.rows.push(row);
        }

        debug!(rows = table.len(), dropped, "feature table built");
        Ok(table)
    }

    fn encode_row(&self, id: i64, row: &mut [FeatureValue]) -> Result<(), TransformError> {
        for (column, cell) in FEATURE_COLUMNS.iter().zip(row.iter_mut()) {
            if !is_categorical(column) {
                continue;
            }
            let raw = match &*cell {
                FeatureValue::Number(_) => continue,
                FeatureValue::Category(raw) => Some(raw.clone()),
                FeatureValue::Missing => None,
            };
            if let Some(code) = raw.as_deref().and_then(|v| self.maps.encode(column, v)) {
                *cell = FeatureValue::Number(code);
                continue;
            }
            let raw = raw.unwrap_or_else(|| MISSING_CATEGORY.to_string());
            match self.policy.unknown_category {
                UnknownCategoryPolicy::PassThrough => {
                    warn!(id, column = *column, value = %raw, "category has no encoding; passed through raw");
                }
                UnknownCategoryPolicy::Reject => {
                    return Err(TransformError::UnknownCategory {
                        id,
                        column: *column,
                        value: raw.clone(),
                    });
                }
                UnknownCategoryPolicy::Sentinel(code) => {
                    warn!(id, column = *column, value = %raw, code, "category has no encoding; sentinel used");
                    *cell = FeatureValue::Number(code);
                }
            }
        }
        Ok(())
    }
}

/// Months elapsed since competition opened nearby. NaN when either
/// opening field is missing.
pub fn current_open_comp(year: f64, month: f64, attrs: &StoreAttributes) -> f64 {
    12.0 * (year - attrs.competition_open_since_year)
        + (month - attrs.competition_open_since_month)
}

/// Months elapsed since the store joined Promo2. The start week is turned
/// into a fractional month as `week * 12 / 52`.
pub fn current_open_promo(year: f64, month: f64, attrs: &StoreAttributes) -> f64 {
    12.0 * (year - attrs.promo2_since_year) + (month - attrs.promo2_since_week * 12.0 / 52.0)
}

fn flag_category(value: i64) -> FeatureValue {
    FeatureValue::Category(value.to_string())
}

fn store_category(value: Option<&str>) -> FeatureValue {
    value.map_or(FeatureValue::Missing, |v| FeatureValue::Category(v.to_string()))
}

/// Unencoded row in [`FEATURE_COLUMNS`] order.
fn raw_row(
    record: &PredictionRequest,
    attrs: &StoreAttributes,
) -> Result<Vec<FeatureValue>, TransformError> {
    let date = parse_date(&record.date).ok_or_else(|| TransformError::InvalidDate {
        id: record.id,
        date: record.date.clone(),
    })?;

    let year = f64::from(date.year());
    let month = f64::from(date.month());
    let day_of_month = f64::from(date.day());
    let week_of_year = f64::from(date.iso_week().week());

    Ok(vec![
        FeatureValue::Number(record.store as f64),
        FeatureValue::Number(record.day_of_week as f64),
        flag_category(record.promo),
        FeatureValue::Category(record.state_holiday.clone()),
        flag_category(record.school_holiday),
        FeatureValue::Number(year),
        FeatureValue::Number(month),
        FeatureValue::Number(day_of_month),
        FeatureValue::Number(week_of_year),
        store_category(attrs.store_type.as_deref()),
        store_category(attrs.assortment.as_deref()),
        FeatureValue::Number(attrs.competition_distance),
        FeatureValue::Number(attrs.competition_open_since_month),
        FeatureValue::Number(attrs.competition_open_since_year),
        FeatureValue::Number(attrs.promo2),
        FeatureValue::Number(attrs.promo2_since_week),
        FeatureValue::Number(attrs.promo2_since_year),
        store_category(attrs.promo_interval.as_deref()),
        FeatureValue::Number(current_open_comp(year, month, attrs)),
        FeatureValue::Number(current_open_promo(year, month, attrs)),
    ])
}
