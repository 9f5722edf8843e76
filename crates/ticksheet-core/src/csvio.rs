//! Minimal RFC-4180 style CSV reading and writing.
//!
//! Handles quoted fields, embedded commas, doubled quotes, and CRLF line
//! endings. Covers exactly what the master-list and output files need.

use std::fmt::Write as _;
use thiserror::Error;

/// Errors from CSV parsing.
#[derive(Error, Debug)]
pub enum CsvError {
    #[error("Unterminated quoted field starting on line {0}")]
    UnterminatedQuote(usize),
}

/// Parse CSV text into records of fields.
///
/// Blank lines outside of quoted fields are skipped.
pub fn parse(text: &str) -> Result<Vec<Vec<String>>, CsvError> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut quote_start_line = 0usize;
    let mut line = 1usize;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' => {
                    if chars.peek() == Some(&'"') {
                        chars.next();
                        field.push('"');
                    } else {
                        in_quotes = false;
                    }
                }
                '\n' => {
                    line += 1;
                    field.push(c);
                }
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' => {
                in_quotes = true;
                quote_start_line = line;
            }
            ',' => {
                record.push(std::mem::take(&mut field));
            }
            '\r' => {
                // Swallowed; the \n that follows ends the record.
            }
            '\n' => {
                line += 1;
                record.push(std::mem::take(&mut field));
                if !(record.len() == 1 && record[0].is_empty()) {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }

    if in_quotes {
        return Err(CsvError::UnterminatedQuote(quote_start_line));
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    Ok(records)
}

/// Quote a field if it contains a comma, quote, or newline.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Render records as CSV text with a trailing newline.
pub fn write_records<R, F>(records: R) -> String
where
    R: IntoIterator<Item = F>,
    F: IntoIterator<Item = String>,
{
    let mut out = String::new();
    for record in records {
        let fields: Vec<String> = record.into_iter().map(|f| escape(&f)).collect();
        let _ = writeln!(out, "{}", fields.join(","));
    }
    out
}
