//! Output file rendering and re-reading.
//!
//! Every output file carries one row per master row, in master order. The
//! reader is used on reviewed prior runs fed back into the review merge.

use crate::csvio::{self, CsvError};
use crate::types::{ConsensusTally, DualRow, OutputRow, OutputRowSet, Verdict};
use thiserror::Error;

/// Errors from reading a prior output file.
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to parse output CSV: {0}")]
    CsvError(#[from] CsvError),

    #[error("Output file is missing required column: {0}")]
    MissingColumn(String),

    #[error("Output file contains no rows")]
    Empty,
}

fn title_flag(is_title: bool) -> String {
    if is_title { "Y" } else { "N" }.to_string()
}

/// Render a single-language result to CSV.
///
/// Header: `code,name,is_title,match,evidence,reason,include`.
pub fn single_csv(rows: &OutputRowSet) -> String {
    let header = vec![
        "code", "name", "is_title", "match", "evidence", "reason", "include",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();

    let records = std::iter::once(header).chain(rows.iter().map(|r| {
        vec![
            r.code.clone(),
            r.name.clone(),
            title_flag(r.is_title),
            r.verdict.as_str().to_string(),
            r.evidence.clone(),
            r.reason.clone(),
            title_flag(r.include),
        ]
    }));
    csvio::write_records(records)
}

/// Render a merged bilingual result to CSV.
pub fn dual_csv(rows: &[DualRow]) -> String {
    let header = vec![
        "code",
        "name",
        "is_title",
        "lv_match",
        "lv_evidence",
        "en_match",
        "en_evidence",
        "final_match",
        "include",
        "reason",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();

    let records = std::iter::once(header).chain(rows.iter().map(|r| {
        vec![
            r.code.clone(),
            r.name.clone(),
            title_flag(r.is_title),
            r.lv_verdict.as_str().to_string(),
            r.lv_evidence.clone(),
            r.en_verdict.as_str().to_string(),
            r.en_evidence.clone(),
            r.final_verdict.as_str().to_string(),
            title_flag(r.include),
            r.reason.clone(),
        ]
    }));
    csvio::write_records(records)
}

/// Render a consensus result to CSV, including the per-row vote summary.
pub fn consensus_csv(tallies: &[ConsensusTally]) -> String {
    let header = vec![
        "code", "name", "is_title", "match", "evidence", "reason", "votes", "include",
    ]
    .into_iter()
    .map(String::from)
    .collect::<Vec<_>>();

    let records = std::iter::once(header).chain(tallies.iter().map(|t| {
        let votes = if t.is_title {
            String::new()
        } else {
            t.vote_string()
        };
        vec![
            t.code.clone(),
            t.name.clone(),
            title_flag(t.is_title),
            t.final_verdict.as_str().to_string(),
            t.evidence.clone(),
            t.reason.clone(),
            votes,
            title_flag(t.final_verdict.is_positive()),
        ]
    }));
    csvio::write_records(records)
}

/// Read a (possibly human-edited) prior output file back into a row set.
///
/// Requires the single-language columns; an `include` column is honored when
/// present and derived from the verdict otherwise. Unknown match strings go
/// through the same coercion as oracle labels.
pub fn read_output_csv(text: &str) -> Result<OutputRowSet, OutputError> {
    let records = csvio::parse(text)?;
    let mut iter = records.into_iter();
    let header = iter.next().ok_or(OutputError::Empty)?;

    let col = |name: &str| -> Result<usize, OutputError> {
        header
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or_else(|| OutputError::MissingColumn(name.to_string()))
    };
    let code_col = col("code")?;
    let name_col = col("name")?;
    let title_col = col("is_title")?;
    let match_col = col("match")?;
    let evidence_col = col("evidence")?;
    let reason_col = col("reason")?;
    let include_col = header
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("include"));

    let get = |record: &[String], i: usize| -> String {
        record.get(i).map(|s| s.trim().to_string()).unwrap_or_default()
    };

    let mut rows = Vec::new();
    for record in iter {
        let is_title = get(&record, title_col).eq_ignore_ascii_case("y");
        let label = get(&record, match_col);
        let verdict = if is_title || label.is_empty() {
            Verdict::Blank
        } else {
            crate::parser::coerce_label(&label).0
        };
        let include = match include_col {
            Some(i) => get(&record, i).eq_ignore_ascii_case("y"),
            None => verdict.is_positive(),
        };
        rows.push(OutputRow {
            code: get(&record, code_col),
            name: get(&record, name_col),
            is_title,
            verdict,
            evidence: get(&record, evidence_col),
            reason: get(&record, reason_col),
            include,
        });
    }

    if rows.is_empty() {
        return Err(OutputError::Empty);
    }
    Ok(OutputRowSet::new(rows))
}
