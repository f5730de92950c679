//! CSV artifacts exchanged between stages.
//!
//! Every artifact is UTF-8 with a byte-order marker and comma-delimited; readers accept
//! files with or without the marker.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, instrument};

use crate::constants::UTF8_BOM;
use crate::error::{PipelineError, Result};
use crate::pipeline::processing::project::ProjectedTable;
use crate::types::RankedRow;

/// Write the clean artifact: header is the effective projected column list.
#[instrument(skip(table), fields(rows = table.rows.len()))]
pub fn write_clean_artifact(path: &Path, table: &ProjectedTable) -> Result<()> {
    let mut writer = bom_writer(path)?;
    writer
        .write_record(&table.columns)
        .map_err(|e| PipelineError::persistence(path, e))?;
    for row in &table.rows {
        writer
            .write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))
            .map_err(|e| PipelineError::persistence(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::persistence(path, e))?;

    info!("Saved {} records to {}", table.rows.len(), path.display());
    Ok(())
}

/// Read a clean artifact back; empty fields become nulls.
pub fn read_clean_artifact(path: &Path) -> Result<ProjectedTable> {
    let bytes = fs::read(path)?;
    let mut reader = csv_reader(&bytes);

    let columns: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| (!field.is_empty()).then(|| field.to_string()))
                .collect(),
        );
    }

    Ok(ProjectedTable { columns, rows })
}

/// Write ranked rows in the order given, header `place_id,name,rating,user_ratings_total,category,rating_rank`.
#[instrument(skip(rows), fields(rows = rows.len()))]
pub fn write_ranked_artifact(path: &Path, rows: &[RankedRow]) -> Result<()> {
    let mut writer = bom_writer(path)?;
    if rows.is_empty() {
        // serde only emits the header alongside the first record
        writer
            .write_record(crate::constants::RANKED_HEADER)
            .map_err(|e| PipelineError::persistence(path, e))?;
    }
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| PipelineError::persistence(path, e))?;
    }
    writer.flush().map_err(|e| PipelineError::persistence(path, e))?;

    info!("Exported {} ranked rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn read_ranked_artifact(path: &Path) -> Result<Vec<RankedRow>> {
    let bytes = fs::read(path)?;
    let mut reader = csv_reader(&bytes);
    let rows = reader
        .deserialize::<RankedRow>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn bom_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| PipelineError::persistence(path, e))?;
    }
    let mut file = BufWriter::new(File::create(path).map_err(|e| PipelineError::persistence(path, e))?);
    file.write_all(UTF8_BOM)
        .map_err(|e| PipelineError::persistence(path, e))?;
    Ok(csv::Writer::from_writer(file))
}

fn csv_reader(bytes: &[u8]) -> csv::Reader<&[u8]> {
    let data = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    csv::ReaderBuilder::new().has_headers(true).from_reader(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ProjectedTable {
        ProjectedTable {
            columns: vec!["place_id".into(), "name".into(), "types".into()],
            rows: vec![
                vec![Some("a".into()), Some("Cafe, \"The\"".into()), Some(r#"["cafe","bar"]"#.into())],
                vec![Some("b".into()), None, None],
            ],
        }
    }

    #[test]
    fn clean_artifact_starts_with_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/clean.csv");
        write_clean_artifact(&path, &table()).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert!(text.starts_with("place_id,name,types\n"));
    }

    #[test]
    fn clean_artifact_reads_back_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        write_clean_artifact(&path, &table()).unwrap();

        assert_eq!(read_clean_artifact(&path).unwrap(), table());
    }

    #[test]
    fn header_only_clean_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.csv");
        let empty = ProjectedTable {
            columns: vec!["place_id".into()],
            rows: Vec::new(),
        };
        write_clean_artifact(&path, &empty).unwrap();
        assert_eq!(read_clean_artifact(&path).unwrap(), empty);
    }

    #[test]
    fn ranked_artifact_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranked.csv");
        let rows = vec![
            RankedRow {
                place_id: Some("a".into()),
                name: Some("Alpha".into()),
                rating: Some(4.5),
                user_ratings_total: Some(120),
                category: Some("cafe".into()),
                rating_rank: 1,
            },
            RankedRow {
                place_id: None,
                name: Some("Nameless".into()),
                rating: Some(0.0),
                user_ratings_total: Some(0),
                category: None,
                rating_rank: 1,
            },
        ];
        write_ranked_artifact(&path, &rows).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        assert!(text.starts_with("place_id,name,rating,user_ratings_total,category,rating_rank\n"));

        assert_eq!(read_ranked_artifact(&path).unwrap(), rows);
    }

    #[test]
    fn empty_ranked_artifact_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranked.csv");
        write_ranked_artifact(&path, &[]).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_start_matches('\u{feff}').trim_end(), "place_id,name,rating,user_ratings_total,category,rating_rank");
        assert!(read_ranked_artifact(&path).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn unwritable_destination_is_persistence_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let err = write_clean_artifact(&blocker.join("clean.csv"), &table()).unwrap_err();
        assert!(matches!(err, PipelineError::Persistence { .. }));
    }
}
