use rusqlite::types::Value as SqlValue;
use rusqlite::Row;
use std::path::Path;
use tracing::{info, instrument};

use crate::constants;
use crate::error::{PipelineError, Result};
use crate::metrics::RankMetrics;
use crate::pipeline::storage::artifacts::write_ranked_artifact;
use crate::pipeline::storage::tabular_store::{quote_ident, TabularStore};
use crate::types::RankedRow;

/// Columns the ranking query reads from the places table
const REQUIRED_COLUMNS: [&str; 5] = [
    constants::PLACE_ID,
    constants::NAME,
    constants::RATING,
    constants::USER_RATINGS_TOTAL,
    constants::TYPES,
];

/// Dense per-category ranking over the places table.
///
/// Category is `COALESCE(main_type, types)`; within a category rows are ordered by
/// `rating` then `user_ratings_total`, both descending. Ties share a rank and the next
/// distinct pair gets the next integer.
pub struct RankEngine<'a> {
    store: &'a TabularStore,
}

impl<'a> RankEngine<'a> {
    pub fn new(store: &'a TabularStore) -> Self {
        Self { store }
    }

    /// Drop and rebuild the ranking table, returning its rows sorted by category then rank.
    #[instrument(skip(self), fields(db = %self.store.path().display()))]
    pub fn rank(&self) -> Result<Vec<RankedRow>> {
        let settings = self.store.settings();
        if !self.store.table_exists(&settings.places_table)? {
            return Err(PipelineError::SourceNotFound {
                path: self.store.path().to_path_buf(),
            });
        }

        let columns = self.store.columns(&settings.places_table)?;
        for required in REQUIRED_COLUMNS {
            if !columns.iter().any(|c| c == required) {
                return Err(PipelineError::MissingColumn {
                    table: settings.places_table.clone(),
                    column: required.to_string(),
                });
            }
        }
        let category_expr = if columns.iter().any(|c| c == constants::MAIN_TYPE) {
            "COALESCE(main_type, types)"
        } else {
            "types"
        };

        let places = quote_ident(&settings.places_table);
        let ranking = quote_ident(&settings.ranking_table);
        let conn = self.store.connection();

        info!("Creating {} table with dense rank", settings.ranking_table);
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(&format!(
            "DROP TABLE IF EXISTS {ranking};
             CREATE TABLE {ranking} AS
             SELECT
                 place_id,
                 name,
                 rating,
                 user_ratings_total,
                 {category_expr} AS category,
                 DENSE_RANK() OVER (
                     PARTITION BY {category_expr}
                     ORDER BY rating DESC, user_ratings_total DESC
                 ) AS rating_rank
             FROM {places};"
        ))?;
        tx.commit()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT place_id, name, rating, user_ratings_total, category, rating_rank
             FROM {ranking}
             ORDER BY category, rating_rank, place_id, name"
        ))?;
        let rows = stmt
            .query_map([], ranked_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        RankMetrics::record_ranked(rows.len());
        info!("Ranked {} places", rows.len());
        Ok(rows)
    }

    /// Write ranked rows to the ranked artifact, preserving their order.
    pub fn export(&self, rows: &[RankedRow], destination: &Path) -> Result<()> {
        info!("Exporting ranked results to {}", destination.display());
        write_ranked_artifact(destination, rows)
    }
}

fn ranked_row(row: &Row<'_>) -> rusqlite::Result<RankedRow> {
    Ok(RankedRow {
        place_id: as_text(row.get(0)?),
        name: as_text(row.get(1)?),
        rating: as_real(row.get(2)?),
        user_ratings_total: as_integer(row.get(3)?),
        category: as_text(row.get(4)?),
        rating_rank: row.get(5)?,
    })
}

// Loaded columns keep unparseable cells as text, so read values by storage class.

fn as_text(value: SqlValue) -> Option<String> {
    match value {
        SqlValue::Null => None,
        SqlValue::Integer(v) => Some(v.to_string()),
        SqlValue::Real(v) => Some(v.to_string()),
        SqlValue::Text(s) => Some(s),
        SqlValue::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
    }
}

fn as_real(value: SqlValue) -> Option<f64> {
    match value {
        SqlValue::Integer(v) => Some(v as f64),
        SqlValue::Real(v) => Some(v),
        SqlValue::Text(s) => s.trim().parse().ok(),
        SqlValue::Null | SqlValue::Blob(_) => None,
    }
}

fn as_integer(value: SqlValue) -> Option<i64> {
    match value {
        SqlValue::Integer(v) => Some(v),
        SqlValue::Real(v) if v.fract() == 0.0 => Some(v as i64),
        SqlValue::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}
