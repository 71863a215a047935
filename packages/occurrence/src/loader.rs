//! Loads occurrence records from JSON or CSV exports.
//!
//! Both formats are first turned into a list of field maps so that the
//! same validation applies regardless of the source. Validation is strict
//! and happens before any processing: a record missing a required field
//! aborts the load.

use std::path::Path;

use aedes_map_occurrence_models::{Coordinates, Occurrence};
use serde_json::{Map, Value};

use crate::LoadError;
use crate::parsing::{parse_coordinate, parse_epoch_millis, parse_timestamp};

/// Field holding the report timestamp.
pub const FIELD_TIMESTAMP: &str = "Data_interacao";
/// Field holding the suspected disease label.
pub const FIELD_DISEASE: &str = "Doenca_suspeita";
/// Field holding the latitude.
pub const FIELD_LATITUDE: &str = "Latitude";
/// Field holding the longitude.
pub const FIELD_LONGITUDE: &str = "Longitude";
/// Field holding the free-text street address.
pub const FIELD_ADDRESS: &str = "Endereco";

/// Which fields a record source must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordSchema {
    /// Every record carries `Latitude`/`Longitude`.
    #[default]
    Located,
    /// Coordinates are optional; records without them must carry an
    /// `Endereco` so they can be geocoded.
    Geocodable,
}

/// Loads occurrence records from `path`, choosing the parser by file
/// extension (`.json` or `.csv`).
///
/// # Errors
///
/// Returns [`LoadError`] if the file cannot be read, is malformed, or any
/// record fails validation against `schema`.
pub fn load_occurrences(path: &Path, schema: RecordSchema) -> Result<Vec<Occurrence>, LoadError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    let rows = match extension.as_deref() {
        Some("json") => read_json_rows(&std::fs::read_to_string(path)?)?,
        Some("csv") => read_csv_rows(std::fs::File::open(path)?)?,
        _ => {
            return Err(LoadError::UnsupportedFormat {
                path: path.display().to_string(),
            });
        }
    };

    let records = parse_rows(&rows, schema)?;
    log::info!(
        "Loaded {} occurrence record(s) from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Parses occurrence JSON into field maps.
///
/// Accepts an array of record objects, or a column-oriented object as
/// written by pandas' `to_json` (`{"field": {"0": v, "1": v}}` or
/// `{"field": [v, v]}`).
///
/// # Errors
///
/// Returns [`LoadError::NotARecordArray`] if the top-level value has
/// neither shape, or [`LoadError::Json`] on syntax errors.
pub fn read_json_rows(json: &str) -> Result<Vec<Map<String, Value>>, LoadError> {
    let value: Value = serde_json::from_str(json)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                _ => Err(LoadError::NotARecordArray),
            })
            .collect(),
        Value::Object(columns) => columns_to_rows(columns),
        _ => Err(LoadError::NotARecordArray),
    }
}

/// Transposes `{field: {index: value}}` or `{field: [value]}` into one map
/// per index. Integer indexes are ordered numerically.
fn columns_to_rows(columns: Map<String, Value>) -> Result<Vec<Map<String, Value>>, LoadError> {
    let mut cells: Vec<(String, String, Value)> = Vec::new();
    for (field, column) in columns {
        match column {
            Value::Object(entries) => {
                cells.extend(entries.into_iter().map(|(index, v)| (index, field.clone(), v)));
            }
            Value::Array(values) => {
                cells.extend(
                    values
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), field.clone(), v)),
                );
            }
            _ => return Err(LoadError::NotARecordArray),
        }
    }

    let mut indexes: Vec<String> = Vec::new();
    for (index, _, _) in &cells {
        if !indexes.contains(index) {
            indexes.push(index.clone());
        }
    }
    if indexes.iter().all(|i| i.parse::<u64>().is_ok()) {
        indexes.sort_by_key(|i| i.parse::<u64>().unwrap_or_default());
    }

    let mut rows = vec![Map::new(); indexes.len()];
    for (index, field, value) in cells {
        if let Some(pos) = indexes.iter().position(|i| *i == index) {
            rows[pos].insert(field, value);
        }
    }
    Ok(rows)
}

/// Reads CSV rows with a header line into field maps of string values.
///
/// # Errors
///
/// Returns [`LoadError::Csv`] if the CSV is malformed.
pub fn read_csv_rows<R: std::io::Read>(reader: R) -> Result<Vec<Map<String, Value>>, LoadError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let map = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.trim().to_string(), Value::String(v.to_string())))
            .collect();
        rows.push(map);
    }
    Ok(rows)
}

/// Validates and converts field maps into [`Occurrence`] values.
///
/// # Errors
///
/// Returns the first validation failure encountered.
pub fn parse_rows(
    rows: &[Map<String, Value>],
    schema: RecordSchema,
) -> Result<Vec<Occurrence>, LoadError> {
    rows.iter()
        .enumerate()
        .map(|(row, fields)| parse_row(row, fields, schema))
        .collect()
}

fn parse_row(
    row: usize,
    fields: &Map<String, Value>,
    schema: RecordSchema,
) -> Result<Occurrence, LoadError> {
    let timestamp = match fields.get(FIELD_TIMESTAMP) {
        None | Some(Value::Null) => {
            return Err(LoadError::MissingField {
                row,
                field: FIELD_TIMESTAMP,
            });
        }
        Some(Value::Number(n)) => n.as_i64().and_then(parse_epoch_millis),
        Some(Value::String(s)) if s.trim().is_empty() => {
            return Err(LoadError::MissingField {
                row,
                field: FIELD_TIMESTAMP,
            });
        }
        Some(Value::String(s)) => parse_timestamp(s),
        Some(_) => None,
    }
    .ok_or_else(|| LoadError::InvalidTimestamp {
        row,
        value: fields
            .get(FIELD_TIMESTAMP)
            .map(value_text)
            .unwrap_or_default(),
    })?;

    let disease = non_blank_text(fields.get(FIELD_DISEASE)).ok_or(LoadError::MissingField {
        row,
        field: FIELD_DISEASE,
    })?;

    let latitude = coordinate(row, fields, FIELD_LATITUDE)?;
    let longitude = coordinate(row, fields, FIELD_LONGITUDE)?;
    let address = non_blank_text(fields.get(FIELD_ADDRESS));

    let coordinates = match (latitude, longitude) {
        (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
        (lat, _) => {
            match schema {
                RecordSchema::Located => {
                    return Err(LoadError::MissingField {
                        row,
                        field: if lat.is_none() {
                            FIELD_LATITUDE
                        } else {
                            FIELD_LONGITUDE
                        },
                    });
                }
                RecordSchema::Geocodable if address.is_none() => {
                    return Err(LoadError::MissingField {
                        row,
                        field: FIELD_ADDRESS,
                    });
                }
                RecordSchema::Geocodable => {}
            }
            None
        }
    };

    Ok(Occurrence {
        timestamp,
        coordinates,
        disease,
        address,
    })
}

fn coordinate(
    row: usize,
    fields: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<f64>, LoadError> {
    parse_coordinate(fields.get(field))
        .map_err(|value| LoadError::InvalidCoordinate { row, field, value })
}

fn non_blank_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
