use serde::{Deserialize, Serialize};

/// Static per-store metadata joined onto every request.
///
/// The exported store table keeps its gaps: a `null` numeric attribute is
/// read as NaN and a `null` categorical attribute as `None`, so both reach
/// the model as missing features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StoreAttributes {
    pub store: i64,
    pub store_type: Option<String>,
    pub assortment: Option<String>,
    #[serde(with = "nullable_f64")]
    pub competition_distance: f64,
    #[serde(with = "nullable_f64")]
    pub competition_open_since_month: f64,
    #[serde(with = "nullable_f64")]
    pub competition_open_since_year: f64,
    #[serde(with = "nullable_f64")]
    pub promo2: f64,
    #[serde(with = "nullable_f64")]
    pub promo2_since_week: f64,
    #[serde(with = "nullable_f64")]
    pub promo2_since_year: f64,
    pub promo_interval: Option<String>,
}

/// `null` <-> NaN. Goes through `Option<f64>` on both sides so binary
/// formats stay symmetric.
mod nullable_f64 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        let value = (!value.is_nan()).then_some(*value);
        value.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}
