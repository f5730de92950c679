use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};

use crate::constants;
use crate::metrics::TransformMetrics;
use crate::types::{value_to_cell, Category, NormalizedRecord, RawRecord};

/// Keys consumed into the fixed record shape rather than carried as extras
const FIXED_KEYS: [&str; 9] = [
    constants::PLACE_ID,
    constants::NAME,
    constants::RATING,
    constants::USER_RATINGS_TOTAL,
    constants::ADDRESS,
    constants::TYPES,
    constants::LATITUDE,
    constants::LONGITUDE,
    constants::LEGACY_LONGITUDE,
];

/// Counts surfaced as a schema warning instead of per-row errors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImputationSummary {
    pub total_records: usize,
    /// Null or absent ratings replaced with the default
    pub missing_ratings: usize,
    /// Null or absent review counts replaced with the default
    pub missing_user_ratings_total: usize,
    /// Non-null ratings that are not numbers, also replaced with the default
    pub unparseable_ratings: usize,
    /// Non-null review counts that are not numbers, also replaced with the default
    pub unparseable_user_ratings_total: usize,
    pub coordinates_extracted: usize,
}

impl ImputationSummary {
    pub fn any_imputed(&self) -> bool {
        self.imputed_ratings() > 0 || self.imputed_user_ratings_total() > 0
    }

    pub fn imputed_ratings(&self) -> usize {
        self.missing_ratings + self.unparseable_ratings
    }

    pub fn imputed_user_ratings_total(&self) -> usize {
        self.missing_user_ratings_total + self.unparseable_user_ratings_total
    }
}

/// Where a score came from
enum Score<T> {
    Present(T),
    Missing,
    Unparseable,
}

impl<T> Score<T> {
    fn read(value: Option<&Value>, parse: impl Fn(&Value) -> Option<T>) -> Self {
        match value {
            None => Score::Missing,
            Some(v) => parse(v).map_or(Score::Unparseable, Score::Present),
        }
    }
}

/// Normalized rows plus the column set observed across the batch
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<NormalizedRecord>,
    /// Columns in first-seen order; `rating`, `user_ratings_total`, `latitude`
    /// and `longitude` are always present.
    pub schema: Vec<String>,
    pub imputation: ImputationSummary,
}

/// Convert heterogeneous raw records into fixed-shape rows.
///
/// Null `rating` / `user_ratings_total` values are replaced with the given defaults.
/// Non-null values that are not numbers are replaced too but tallied separately;
/// fractional review counts are rounded. Coordinates come from the `geometry` mapping; a legacy `longtitude`
/// column anywhere in the batch overrides `longitude` for every row.
#[instrument(skip_all, fields(records = raw.len()))]
pub fn normalize(raw: &[RawRecord], rating_default: f64, reviews_default: i64) -> NormalizedBatch {
    let legacy_longitude = raw.iter().any(|r| r.contains_key(constants::LEGACY_LONGITUDE));
    let mut summary = ImputationSummary {
        total_records: raw.len(),
        ..Default::default()
    };

    let records: Vec<NormalizedRecord> = raw
        .iter()
        .map(|record| {
            let rating = match Score::read(record.non_null(constants::RATING), numeric) {
                Score::Present(v) => v,
                Score::Missing => {
                    summary.missing_ratings += 1;
                    rating_default
                }
                Score::Unparseable => {
                    summary.unparseable_ratings += 1;
                    rating_default
                }
            };
            let user_ratings_total =
                match Score::read(record.non_null(constants::USER_RATINGS_TOTAL), integral) {
                    Score::Present(v) => v,
                    Score::Missing => {
                        summary.missing_user_ratings_total += 1;
                        reviews_default
                    }
                    Score::Unparseable => {
                        summary.unparseable_user_ratings_total += 1;
                        reviews_default
                    }
                };

            let (latitude, mut longitude) = coordinates(record.get(constants::GEOMETRY));
            if legacy_longitude {
                longitude = record.non_null(constants::LEGACY_LONGITUDE).and_then(numeric);
            }
            if latitude.is_some() {
                summary.coordinates_extracted += 1;
            }

            let extra: BTreeMap<String, Value> = record
                .0
                .iter()
                .filter(|(key, _)| !FIXED_KEYS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();

            NormalizedRecord {
                place_id: record.get(constants::PLACE_ID).and_then(value_to_cell),
                name: record.get(constants::NAME).and_then(value_to_cell),
                rating,
                user_ratings_total,
                latitude,
                longitude,
                address: record.get(constants::ADDRESS).and_then(value_to_cell),
                types: record.get(constants::TYPES).and_then(Category::from_value),
                extra,
            }
        })
        .collect();

    TransformMetrics::record_batch(raw.len());
    if summary.any_imputed() {
        TransformMetrics::record_imputed(constants::RATING, summary.imputed_ratings());
        TransformMetrics::record_imputed(
            constants::USER_RATINGS_TOTAL,
            summary.imputed_user_ratings_total(),
        );
    }
    if summary.missing_ratings > 0 || summary.missing_user_ratings_total > 0 {
        warn!(
            missing_ratings = summary.missing_ratings,
            missing_reviews = summary.missing_user_ratings_total,
            default_rating = rating_default,
            default_reviews = reviews_default,
            "Filled null ratings and review counts with defaults"
        );
    }
    if summary.unparseable_ratings > 0 || summary.unparseable_user_ratings_total > 0 {
        warn!(
            unparseable_ratings = summary.unparseable_ratings,
            unparseable_reviews = summary.unparseable_user_ratings_total,
            default_rating = rating_default,
            default_reviews = reviews_default,
            "Replaced non-numeric ratings and review counts with defaults"
        );
    }
    info!("Extracted coordinates for {} places", summary.coordinates_extracted);

    NormalizedBatch {
        schema: batch_schema(raw),
        records,
        imputation: summary,
    }
}

/// Union of raw keys in first-seen order, with the derived and imputed columns appended
fn batch_schema(raw: &[RawRecord]) -> Vec<String> {
    let mut schema: Vec<String> = Vec::new();
    let mut push = |column: &str| {
        if !schema.iter().any(|c| c == column) {
            schema.push(column.to_string());
        }
    };

    for key in raw.iter().flat_map(RawRecord::keys) {
        if key.as_str() != constants::LEGACY_LONGITUDE {
            push(key.as_str());
        }
    }
    for column in [
        constants::RATING,
        constants::USER_RATINGS_TOTAL,
        constants::LATITUDE,
        constants::LONGITUDE,
    ] {
        push(column);
    }
    schema
}

/// `lat` / `lng` from a location mapping; any other shape yields no coordinates
fn coordinates(location: Option<&Value>) -> (Option<f64>, Option<f64>) {
    match location {
        Some(Value::Object(map)) => (
            map.get(constants::LAT).and_then(numeric),
            map.get(constants::LNG).and_then(numeric),
        ),
        _ => (None, None),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn integral(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(rounded)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(rounded))
        }
        _ => None,
    }
}

/// Nearest integer for a finite count that fits in `i64`
fn rounded(v: f64) -> Option<i64> {
    let r = v.round();
    (r.is_finite() && r >= i64::MIN as f64 && r < i64::MAX as f64).then_some(r as i64)
}
