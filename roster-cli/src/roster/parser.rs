//! Spreadsheet bytes to flat records
//!
//! Reads the first sheet of any workbook calamine can detect. The first row
//! names the fields; every following non-blank row becomes one record.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use log::debug;
use serde_json::{Value, json};

use crate::api::models::Fields;
use crate::error::ParseError;

/// Name given to header cells that are blank
const EMPTY_HEADER: &str = "__EMPTY";

/// Parse raw workbook bytes into ordered field maps
pub fn parse_records(bytes: &[u8]) -> Result<Vec<Fields>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ParseError::UnrecognizedContainer(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoSheets)?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ParseError::Sheet {
            sheet: sheet_name.clone(),
            message: e.to_string(),
        })?;

    let mut rows = range.rows();
    let header_row = rows
        .next()
        .ok_or_else(|| ParseError::MissingHeader(sheet_name.clone()))?;
    let headers = header_names(header_row);

    let records: Vec<Fields> = rows.filter_map(|row| row_to_fields(&headers, row)).collect();

    debug!(
        "Parsed {} records with {} columns from sheet '{}'",
        records.len(),
        headers.len(),
        sheet_name
    );

    Ok(records)
}

/// Field names from the header row, with blank and duplicate names made unique
fn header_names(row: &[Data]) -> Vec<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();

    row.iter()
        .map(|cell| {
            let base = match cell_text(cell) {
                text if text.is_empty() => EMPTY_HEADER.to_string(),
                text => text,
            };

            let name = match counts.get(&base).copied() {
                None => base.clone(),
                Some(mut counter) => {
                    let mut candidate = format!("{}_{}", base, counter);
                    counter += 1;
                    while counts.contains_key(&candidate) {
                        candidate = format!("{}_{}", base, counter);
                        counter += 1;
                    }
                    counts.insert(base, counter);
                    candidate
                }
            };

            counts.entry(name.clone()).or_insert(1);
            name
        })
        .collect()
}

/// One record per row; `None` for rows with no values at all
fn row_to_fields(headers: &[String], row: &[Data]) -> Option<Fields> {
    let mut fields = Fields::new();

    for (header, cell) in headers.iter().zip(row) {
        if let Some(value) = cell_to_value(cell) {
            fields.insert(header.clone(), value);
        }
    }

    (!fields.is_empty()).then_some(fields)
}

/// Convert a cell to JSON; blank cells are omitted
fn cell_to_value(cell: &Data) -> Option<Value> {
    match cell {
        Data::Empty => None,
        Data::String(s) => Some(Value::String(s.clone())),
        Data::Int(i) => Some(json!(*i)),
        Data::Float(f) => Some(number_value(*f)),
        Data::Bool(b) => Some(Value::Bool(*b)),
        // Date serials stay numeric, as the cell stores them
        Data::DateTime(dt) => Some(number_value(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Some(Value::String(s.clone())),
        Data::Error(e) => Some(Value::String(e.to_string())),
    }
}

fn number_value(f: f64) -> Value {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        json!(f as i64)
    } else {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null)
    }
}

/// Display text of a header cell
fn cell_text(cell: &Data) -> String {
    match cell_to_value(cell) {
        None => String::new(),
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}
