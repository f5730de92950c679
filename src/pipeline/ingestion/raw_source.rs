use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, info, instrument, warn};

use crate::error::{PipelineError, Result};
use crate::types::RawRecord;

/// Shape of the records inside a raw artifact
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RawFormat {
    /// Records already in the crawler's place shape
    #[default]
    Places,
    /// Items straight from the scraping provider's dataset export
    ProviderExport,
}

/// Read raw records from a JSON array or JSON-lines file.
#[instrument(skip_all, fields(path = %path.display(), ?format))]
pub fn load_raw_records(path: &Path, format: RawFormat) -> Result<Vec<RawRecord>> {
    if !path.exists() {
        return Err(PipelineError::MissingInput {
            path: path.to_path_buf(),
        });
    }

    let content = fs::read_to_string(path)?;
    let values = parse_values(&content)?;
    debug!("Parsed {} raw values", values.len());

    let mut records = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        match value {
            Value::Object(fields) => records.push(match format {
                RawFormat::Places => RawRecord::new(fields),
                RawFormat::ProviderExport => RawRecord::from_provider_item(&fields),
            }),
            other => warn!(index = i, kind = value_kind(&other), "Skipping non-object raw entry"),
        }
    }

    info!("Loaded {} records from raw artifact", records.len());
    Ok(records)
}

fn parse_values(content: &str) -> Result<Vec<Value>> {
    let trimmed = content.trim_start_matches('\u{feff}').trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str::<Vec<Value>>(trimmed)?);
    }

    // JSON lines
    trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| serde_json::from_str::<Value>(line).map_err(PipelineError::from))
        .collect()
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
