//! Phase metrics for the transform, load and rank stages.
//!
//! Emitted through the `metrics` facade; a binary that wants them exported installs a
//! recorder, otherwise every call is a no-op.

/// Metrics for the normalize + project stage
pub struct TransformMetrics;

impl TransformMetrics {
    pub fn record_batch(records: usize) {
        ::metrics::counter!("places_transform_records_total").increment(records as u64);
    }

    pub fn record_imputed(field: &'static str, rows: usize) {
        ::metrics::counter!("places_transform_imputed_total", "field" => field)
            .increment(rows as u64);
    }

    pub fn record_dropped_columns(columns: usize) {
        ::metrics::counter!("places_transform_dropped_columns_total").increment(columns as u64);
    }
}

/// Metrics for the relational load
pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_load(rows: usize) {
        ::metrics::counter!("places_store_rows_loaded_total").increment(rows as u64);
    }

    pub fn record_categories_derived(rows: usize) {
        ::metrics::counter!("places_store_main_type_derived_total").increment(rows as u64);
    }
}

/// Metrics for ranking and export
pub struct RankMetrics;

impl RankMetrics {
    pub fn record_ranked(rows: usize) {
        ::metrics::counter!("places_rank_rows_total").increment(rows as u64);
    }
}

pub fn record_stage_duration(stage: &'static str, secs: f64) {
    ::metrics::histogram!("places_stage_duration_seconds", "stage" => stage).record(secs);
}

pub fn record_stage_failure(stage: &'static str) {
    ::metrics::counter!("places_stage_failures_total", "stage" => stage).increment(1);
}
