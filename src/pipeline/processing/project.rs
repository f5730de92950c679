use tracing::{debug, warn};

use crate::metrics::TransformMetrics;
use crate::pipeline::processing::normalize::NormalizedBatch;

/// Anything with a named column set whose cells can be read as text
pub trait ColumnSource {
    fn columns(&self) -> &[String];
    fn row_count(&self) -> usize;
    fn cell(&self, row: usize, column: &str) -> Option<String>;

    fn has_column(&self, column: &str) -> bool {
        self.columns().iter().any(|c| c == column)
    }
}

impl ColumnSource for NormalizedBatch {
    fn columns(&self) -> &[String] {
        &self.schema
    }

    fn row_count(&self) -> usize {
        self.records.len()
    }

    fn cell(&self, row: usize, column: &str) -> Option<String> {
        self.records.get(row).and_then(|r| r.cell(column))
    }
}

/// Rows restricted to an ordered column list; `None` cells are nulls
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectedTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ProjectedTable {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

impl ColumnSource for ProjectedTable {
    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn cell(&self, row: usize, column: &str) -> Option<String> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|r| r.get(idx).cloned().flatten())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionOutcome {
    pub table: ProjectedTable,
    /// Configured columns the source did not have, in configured order
    pub missing_columns: Vec<String>,
}

/// Select `configured_columns` from `source`, in configured order.
///
/// Columns the source lacks are dropped from the projection and reported back;
/// this is a warning condition, never an error.
pub fn project<S: ColumnSource>(source: &S, configured_columns: &[String]) -> ProjectionOutcome {
    let (effective, missing): (Vec<String>, Vec<String>) = configured_columns
        .iter()
        .cloned()
        .partition(|c| source.has_column(c));

    if !missing.is_empty() {
        TransformMetrics::record_dropped_columns(missing.len());
        warn!(missing = ?missing, "Missing columns dropped from projection");
    }
    debug!(columns = ?effective, "Projecting {} rows", source.row_count());

    let rows = (0..source.row_count())
        .map(|row| effective.iter().map(|c| source.cell(row, c)).collect())
        .collect();

    ProjectionOutcome {
        table: ProjectedTable {
            columns: effective,
            rows,
        },
        missing_columns: missing,
    }
}
