//! Column names of the feature table, in the order the transformer emits them.

pub const STORE: &str = "Store";
pub const DAY_OF_WEEK: &str = "DayOfWeek";
pub const PROMO: &str = "Promo";
pub const STATE_HOLIDAY: &str = "StateHoliday";
pub const SCHOOL_HOLIDAY: &str = "SchoolHoliday";
pub const YEAR: &str = "Year";
pub const MONTH: &str = "Month";
pub const DAY_OF_MONTH: &str = "DayOfMonth";
pub const WEEK_OF_YEAR: &str = "WeekOfYear";
pub const STORE_TYPE: &str = "StoreType";
pub const ASSORTMENT: &str = "Assortment";
pub const COMPETITION_DISTANCE: &str = "CompetitionDistance";
pub const COMPETITION_OPEN_SINCE_MONTH: &str = "CompetitionOpenSinceMonth";
pub const COMPETITION_OPEN_SINCE_YEAR: &str = "CompetitionOpenSinceYear";
pub const PROMO2: &str = "Promo2";
pub const PROMO2_SINCE_WEEK: &str = "Promo2SinceWeek";
pub const PROMO2_SINCE_YEAR: &str = "Promo2SinceYear";
pub const PROMO_INTERVAL: &str = "PromoInterval";
pub const CURRENT_OPEN_COMP: &str = "Current-OpenComp";
pub const CURRENT_OPEN_PROMO: &str = "Current-OpenPromo";

/// Every feature column, in table order.
pub const FEATURE_COLUMNS: [&str; 20] = [
    STORE,
    DAY_OF_WEEK,
    PROMO,
    STATE_HOLIDAY,
    SCHOOL_HOLIDAY,
    YEAR,
    MONTH,
    DAY_OF_MONTH,
    WEEK_OF_YEAR,
    STORE_TYPE,
    ASSORTMENT,
    COMPETITION_DISTANCE,
    COMPETITION_OPEN_SINCE_MONTH,
    COMPETITION_OPEN_SINCE_YEAR,
    PROMO2,
    PROMO2_SINCE_WEEK,
    PROMO2_SINCE_YEAR,
    PROMO_INTERVAL,
    CURRENT_OPEN_COMP,
    CURRENT_OPEN_PROMO,
];

/// Categorical columns, in table order. Legacy positional encoding maps
/// are bound against this list.
pub const CATEGORICAL_COLUMNS: [&str; 6] = [
    PROMO,
    STATE_HOLIDAY,
    SCHOOL_HOLIDAY,
    STORE_TYPE,
    ASSORTMENT,
    PROMO_INTERVAL,
];

/// Position of a column in [`FEATURE_COLUMNS`].
pub fn column_index(name: &str) -> Option<usize> {
    FEATURE_COLUMNS.iter().position(|c| *c == name)
}

pub fn is_categorical(name: &str) -> bool {
    CATEGORICAL_COLUMNS.contains(&name)
}
