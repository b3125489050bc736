use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single sales-forecast query as submitted by a caller.
///
/// Field names follow the wire format (PascalCase). Omitted fields take the
/// defaults below; range checks happen later, in the validator, so the
/// decoder deliberately accepts out-of-range integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredictionRequest {
    /// Caller supplied correlation identifier (not checked for uniqueness)
    #[serde(default)]
    pub id: i64,
    #[serde(default = "default_store")]
    pub store: i64,
    #[serde(default = "default_day_of_week")]
    pub day_of_week: i64,
    /// Calendar date in `YYYY-MM-DD` form
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default = "default_open", deserialize_with = "flag")]
    pub open: i64,
    #[serde(default, deserialize_with = "flag")]
    pub promo: i64,
    #[serde(default = "default_state_holiday", deserialize_with = "category")]
    pub state_holiday: String,
    #[serde(default, deserialize_with = "flag")]
    pub school_holiday: i64,
}

fn default_store() -> i64 {
    1
}

fn default_day_of_week() -> i64 {
    1
}

fn default_date() -> String {
    "2015-08-01".to_string()
}

fn default_open() -> i64 {
    1
}

fn default_state_holiday() -> String {
    "0".to_string()
}

impl Default for PredictionRequest {
    fn default() -> Self {
        Self {
            id: 0,
            store: default_store(),
            day_of_week: default_day_of_week(),
            date: default_date(),
            open: default_open(),
            promo: 0,
            state_holiday: default_state_holiday(),
            school_holiday: 0,
        }
    }
}

impl PredictionRequest {
    /// Whether the store is closed on the requested day.
    pub fn is_closed(&self) -> bool {
        self.open == 0
    }
}

/// Result for one request: the forecast sales figure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PredictionResult {
    pub id: i64,
    pub sales: f64,
}

impl PredictionResult {
    pub fn new(id: i64, sales: f64) -> Self {
        Self { id, sales }
    }

    /// Result for a closed store; never scored.
    pub fn closed(id: i64) -> Self {
        Self { id, sales: 0.0 }
    }
}

/// Accepts `0`/`1` style integers as well as JSON booleans.
fn flag<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    struct FlagVisitor;

    impl<'de> Visitor<'de> for FlagVisitor {
        type Value = i64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer or a boolean")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<i64, E> {
            Ok(i64::from(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
            i64::try_from(v).map_err(|_| E::custom(format!("integer {v} out of range")))
        }
    }

    deserializer.deserialize_any(FlagVisitor)
}

/// Accepts a string, or an integer which is rendered as its decimal string.
fn category<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct CategoryVisitor;

    impl<'de> Visitor<'de> for CategoryVisitor {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a string or an integer")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_string<E: de::Error>(self, v: String) -> Result<String, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(CategoryVisitor)
}
