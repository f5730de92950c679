use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

use crate::config::StoreSettings;
use crate::constants;
use crate::error::{PipelineError, Result};
use crate::metrics::StoreMetrics;
use crate::pipeline::processing::project::ProjectedTable;

/// SQLite storage class a loaded column is converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    Real,
    Integer,
    Text,
}

impl Affinity {
    pub fn for_column(column: &str) -> Self {
        match column {
            constants::RATING | constants::LATITUDE | constants::LONGITUDE => Affinity::Real,
            constants::USER_RATINGS_TOTAL => Affinity::Integer,
            _ => Affinity::Text,
        }
    }

    fn sql_type(self) -> &'static str {
        match self {
            Affinity::Real => "REAL",
            Affinity::Integer => "INTEGER",
            Affinity::Text => "TEXT",
        }
    }

    /// Convert a CSV cell; text that does not parse is stored as-is, like SQLite would.
    fn convert(self, cell: Option<&str>) -> SqlValue {
        let Some(text) = cell else {
            return SqlValue::Null;
        };
        match self {
            Affinity::Text => SqlValue::Text(text.to_string()),
            Affinity::Real => text
                .trim()
                .parse::<f64>()
                .map(SqlValue::Real)
                .unwrap_or_else(|_| SqlValue::Text(text.to_string())),
            Affinity::Integer => {
                let trimmed = text.trim();
                if let Ok(v) = trimmed.parse::<i64>() {
                    SqlValue::Integer(v)
                } else if let Ok(v) = trimmed.parse::<f64>() {
                    if v.fract() == 0.0 {
                        SqlValue::Integer(v as i64)
                    } else {
                        SqlValue::Real(v)
                    }
                } else {
                    SqlValue::Text(text.to_string())
                }
            }
        }
    }
}

/// Relational home of the places table and its ranking
pub struct TabularStore {
    conn: Connection,
    path: PathBuf,
    settings: StoreSettings,
}

impl TabularStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path, settings: StoreSettings) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(path, e))?;
        }
        let conn = Connection::open(path).map_err(|e| PipelineError::persistence(path, e))?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
            settings,
        })
    }

    pub fn open_in_memory(settings: StoreSettings) -> Result<Self> {
        Ok(Self {
            conn: Connection::open_in_memory()?,
            path: PathBuf::from(":memory:"),
            settings,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    /// Replace the places table with `table`'s rows. Returns the number of rows written.
    #[instrument(skip(self, table), fields(db = %self.path.display(), rows = table.rows.len()))]
    pub fn load(&mut self, table: &ProjectedTable) -> Result<usize> {
        let path = self.path.clone();
        let places = quote_ident(&self.settings.places_table);
        let affinities: Vec<Affinity> = table.columns.iter().map(|c| Affinity::for_column(c)).collect();

        let write = |conn: &mut Connection| -> Result<usize> {
            let tx = conn.transaction()?;
            tx.execute_batch(&format!("DROP TABLE IF EXISTS {places};"))?;

            let column_defs: Vec<String> = table
                .columns
                .iter()
                .zip(&affinities)
                .map(|(c, a)| format!("{} {}", quote_ident(c), a.sql_type()))
                .collect();
            tx.execute_batch(&format!("CREATE TABLE {places} ({});", column_defs.join(", ")))?;

            {
                let column_list: Vec<String> = table.columns.iter().map(|c| quote_ident(c)).collect();
                let placeholders: Vec<String> = (1..=table.columns.len()).map(|i| format!("?{i}")).collect();
                let mut stmt = tx.prepare(&format!(
                    "INSERT INTO {places} ({}) VALUES ({})",
                    column_list.join(", "),
                    placeholders.join(", ")
                ))?;
                for row in &table.rows {
                    let values = affinities
                        .iter()
                        .enumerate()
                        .map(|(i, a)| a.convert(row.get(i).and_then(|c| c.as_deref())));
                    stmt.execute(params_from_iter(values))?;
                }
            }

            tx.commit()?;
            Ok(table.rows.len())
        };

        let written = write(&mut self.conn).map_err(|e| PipelineError::persistence(&path, e))?;
        StoreMetrics::record_load(written);
        info!("Wrote {} rows to table {}", written, self.settings.places_table);
        Ok(written)
    }

    /// Populate `main_type` from `types` where it is null or empty. Returns the rows populated.
    ///
    /// The column is added when absent and reused when present; populated values are
    /// never recomputed.
    #[instrument(skip(self), fields(db = %self.path.display()))]
    pub fn derive_category(&self) -> Result<usize> {
        let table = &self.settings.places_table;
        if !self.table_exists(table)? {
            return Err(PipelineError::SourceNotFound {
                path: self.path.clone(),
            });
        }
        let columns = self.columns(table)?;
        if !columns.iter().any(|c| c == constants::TYPES) {
            return Err(PipelineError::MissingColumn {
                table: table.clone(),
                column: constants::TYPES.to_string(),
            });
        }

        let places = quote_ident(table);
        if !columns.iter().any(|c| c == constants::MAIN_TYPE) {
            debug!("Adding main_type column");
            self.conn
                .execute_batch(&format!("ALTER TABLE {places} ADD COLUMN main_type TEXT;"))?;
        }

        let updated = self.conn.execute(
            &format!(
                "UPDATE {places}
                 SET main_type = TRIM(REPLACE(REPLACE(REPLACE(types, '[', ''), ']', ''), '\"', ''))
                 WHERE main_type IS NULL OR main_type = ''"
            ),
            [],
        )?;

        StoreMetrics::record_categories_derived(updated);
        info!("Derived main_type for {} rows", updated);
        Ok(updated)
    }

    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Column names of `table` in declaration order
    pub fn columns(&self, table: &str) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> StoreSettings {
        StoreSettings {
            places_table: "places".to_string(),
            ranking_table: "place_ranking".to_string(),
        }
    }

    fn table(rows: &[(&str, &str, &str, Option<&str>)]) -> ProjectedTable {
        ProjectedTable {
            columns: vec![
                "place_id".into(),
                "rating".into(),
                "user_ratings_total".into(),
                "types".into(),
            ],
            rows: rows
                .iter()
                .map(|(id, rating, total, types)| {
                    vec![
                        Some(id.to_string()),
                        Some(rating.to_string()),
                        Some(total.to_string()),
                        types.map(str::to_string),
                    ]
                })
                .collect(),
        }
    }

    fn main_types(store: &TabularStore) -> Vec<Option<String>> {
        let mut stmt = store
            .connection()
            .prepare("SELECT main_type FROM places ORDER BY place_id")
            .unwrap();
        let values = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        values
    }

    #[test]
    fn load_replaces_previous_contents() {
        let mut store = TabularStore::open_in_memory(settings()).unwrap();
        store
            .load(&table(&[("a", "4.5", "10", Some("cafe")), ("b", "4", "3", Some("bar"))]))
            .unwrap();
        store.load(&table(&[("c", "3", "1", Some("cafe"))])).unwrap();

        let count: i64 = store
            .connection()
            .query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn load_applies_column_affinity() {
        let mut store = TabularStore::open_in_memory(settings()).unwrap();
        store.load(&table(&[("a", "4.5", "120", None)])).unwrap();

        let (rating, total, types): (f64, i64, Option<String>) = store
            .connection()
            .query_row("SELECT rating, user_ratings_total, types FROM places", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap();
        assert_eq!(rating, 4.5);
        assert_eq!(total, 120);
        assert_eq!(types, None);
    }

    #[test]
    fn derive_category_strips_brackets_and_quotes() {
        let mut store = TabularStore::open_in_memory(settings()).unwrap();
        store
            .load(&table(&[
                ("a", "4", "1", Some(r#"["cafe","bar"]"#)),
                ("b", "4", "1", Some(" bakery ")),
                ("c", "4", "1", None),
            ]))
            .unwrap();

        let updated = store.derive_category().unwrap();
        assert_eq!(updated, 3);
        assert_eq!(
            main_types(&store),
            vec![Some("cafe,bar".to_string()), Some("bakery".to_string()), None]
        );
    }

    #[test]
    fn derive_category_keeps_populated_values() {
        let mut store = TabularStore::open_in_memory(settings()).unwrap();
        store
            .load(&table(&[("a", "4", "1", Some("cafe")), ("b", "4", "1", Some("bar"))]))
            .unwrap();
        store.derive_category().unwrap();
        store
            .connection()
            .execute("UPDATE places SET main_type = 'custom' WHERE place_id = 'a'", [])
            .unwrap();
        store
            .connection()
            .execute("UPDATE places SET main_type = '' WHERE place_id = 'b'", [])
            .unwrap();

        let updated = store.derive_category().unwrap();
        assert_eq!(updated, 1);
        assert_eq!(
            main_types(&store),
            vec![Some("custom".to_string()), Some("bar".to_string())]
        );
    }

    #[test]
    fn derive_category_requires_types() {
        let mut store = TabularStore::open_in_memory(settings()).unwrap();
        store
            .load(&ProjectedTable {
                columns: vec!["place_id".into()],
                rows: vec![vec![Some("a".into())]],
            })
            .unwrap();
        let err = store.derive_category().unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { column, .. } if column == "types"));
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output/places.db");
        let mut store = TabularStore::open(&path, settings()).unwrap();
        store.load(&table(&[("a", "1", "1", Some("cafe"))])).unwrap();
        assert!(path.exists());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_destination_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let result = TabularStore::open(&blocker.join("places.db"), settings());
        assert!(matches!(result, Err(PipelineError::Persistence { .. })));
    }

    #[test]
    fn affinity_conversion_falls_back_to_text() {
        assert_eq!(Affinity::Real.convert(Some("4.5")), SqlValue::Real(4.5));
        assert_eq!(Affinity::Real.convert(Some("n/a")), SqlValue::Text("n/a".into()));
        assert_eq!(Affinity::Integer.convert(Some("85.0")), SqlValue::Integer(85));
        assert_eq!(Affinity::Text.convert(Some("85")), SqlValue::Text("85".into()));
        assert_eq!(Affinity::Integer.convert(None), SqlValue::Null);
    }
}
