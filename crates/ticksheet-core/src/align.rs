//! Row aligner: forces parsed output to the master row count and order.
//!
//! The oracle can omit rows, invent extras, or echo back a distorted row
//! identity. Alignment recovers all of that structurally: rows are matched
//! positionally, extras are truncated, gaps are padded with defaults, and the
//! master's `code`/`name`/`is_title` always win over whatever the oracle
//! echoed. Coercion is never fatal; every distortion becomes a warning.

use crate::evidence;
use crate::parser::ParsedRow;
use crate::types::{MasterRow, OutputRow, OutputRowSet};
use tracing::warn;

/// An aligned, validated row set plus the audit warnings produced on the way.
#[derive(Debug, Clone)]
pub struct Aligned {
    pub rows: OutputRowSet,
    pub warnings: Vec<String>,
}

/// Align parsed candidate rows to the master list and validate evidence.
///
/// The result always has exactly one row per master row, in master order,
/// with title rows blank.
pub fn align_and_validate(master: &[MasterRow], parsed: &[ParsedRow]) -> Aligned {
    let mut warnings = Vec::new();

    if parsed.len() != master.len() {
        let msg = format!(
            "row count coerced: oracle returned {} rows for {} master rows",
            parsed.len(),
            master.len()
        );
        warn!("{}", msg);
        warnings.push(msg);
    }

    let mut rows = Vec::with_capacity(master.len());
    for (i, m) in master.iter().enumerate() {
        let mut row = match parsed.get(i) {
            Some(p) if !m.is_title => {
                if p.code != m.code {
                    warnings.push(format!(
                        "row {}: oracle echoed code {:?}, master identity {:?} kept",
                        i, p.code, m.code
                    ));
                }
                OutputRow {
                    code: m.code.clone(),
                    name: m.name.clone(),
                    is_title: false,
                    verdict: p.verdict,
                    evidence: p.evidence.clone(),
                    reason: p.reason.clone(),
                    include: false,
                }
            }
            Some(_) => OutputRow::title_row(m),
            None if m.is_title => OutputRow::title_row(m),
            None => OutputRow::not_stated(m),
        };

        warnings.extend(evidence::validate_row(&mut row));
        row.include = row.verdict.is_positive();
        rows.push(row);
    }

    Aligned {
        rows: OutputRowSet::new(rows),
        warnings,
    }
}

/// Pad or truncate an already-built row set to master length and order.
///
/// Used by the mergers, whose two inputs may come from runs that each coerced
/// differently. Verdicts are carried as-is; a blank data-row verdict keeps
/// its zero merge priority.
pub fn conform(master: &[MasterRow], rows: &OutputRowSet) -> OutputRowSet {
    let mut out = Vec::with_capacity(master.len());
    for (i, m) in master.iter().enumerate() {
        let row = match rows.rows.get(i) {
            Some(r) if !m.is_title => OutputRow {
                code: m.code.clone(),
                name: m.name.clone(),
                is_title: false,
                verdict: r.verdict,
                evidence: r.evidence.clone(),
                reason: r.reason.clone(),
                include: r.include,
            },
            Some(_) => OutputRow::title_row(m),
            None if m.is_title => OutputRow::title_row(m),
            None => OutputRow::not_stated(m),
        };
        out.push(row);
    }
    OutputRowSet::new(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser;
    use crate::types::{MasterRow, Verdict};

    fn master() -> Vec<MasterRow> {
        vec![
            MasterRow::feature("N1", "LED headlights"),
            MasterRow::title("T1", "LIGHTING"),
            MasterRow::feature("N2", "Heated mirrors"),
        ]
    }

    #[test]
    fn test_exact_alignment() {
        let parsed = parser::parse(
            "N1: Yes | LED headlights with DRL | stated\n\
             T1: | |\n\
             N2: No | | not mentioned\n",
        );
        let aligned = align_and_validate(&master(), &parsed);
        assert_eq!(aligned.rows.len(), 3);
        assert_eq!(aligned.rows.rows[0].verdict, Verdict::Yes);
        assert_eq!(aligned.rows.rows[1].verdict, Verdict::Blank);
        assert_eq!(aligned.rows.rows[2].verdict, Verdict::No);
    }

    #[test]
    fn test_short_output_padded_with_defaults() {
        let parsed = parser::parse("N1: Yes | LED headlights | ok\n");
        let aligned = align_and_validate(&master(), &parsed);
        assert_eq!(aligned.rows.len(), 3);
        // Title padded blank, missing data row padded "not stated"
        assert_eq!(aligned.rows.rows[1].verdict, Verdict::Blank);
        assert_eq!(aligned.rows.rows[2].verdict, Verdict::No);
        assert_eq!(aligned.rows.rows[2].reason, "not stated");
        assert!(aligned
            .warnings
            .iter()
            .any(|w| w.contains("row count coerced")));
    }

    #[test]
    fn test_extra_rows_truncated() {
        let parsed = parser::parse(
            "N1: Yes | LED headlights | a\n\
             T1: | |\n\
             N2: No | | b\n\
             N3: Yes | invented row | c\n",
        );
        let aligned = align_and_validate(&master(), &parsed);
        assert_eq!(aligned.rows.len(), 3);
    }

    #[test]
    fn test_master_identity_wins() {
        let parsed = parser::parse(
            "WRONG: Yes | LED headlights | a\n\
             T1: | |\n\
             N2: No | | b\n",
        );
        let aligned = align_and_validate(&master(), &parsed);
        assert_eq!(aligned.rows.rows[0].code, "N1");
        assert_eq!(aligned.rows.rows[0].name, "LED headlights");
        assert!(aligned.warnings.iter().any(|w| w.contains("echoed code")));
    }

    #[test]
    fn test_empty_parse_pads_everything() {
        let aligned = align_and_validate(&master(), &[]);
        assert_eq!(aligned.rows.len(), 3);
        assert_eq!(aligned.rows.rows[0].verdict, Verdict::No);
        assert_eq!(aligned.rows.rows[1].verdict, Verdict::Blank);
    }

    #[test]
    fn test_include_follows_verdict() {
        let parsed = parser::parse(
            "N1: Yes | LED headlights | a\n\
             T1: | |\n\
             N2: Maybe | heated mirrors maybe | b\n",
        );
        let aligned = align_and_validate(&master(), &parsed);
        assert!(aligned.rows.rows[0].include);
        assert!(!aligned.rows.rows[1].include);
        assert!(aligned.rows.rows[2].include);
    }

    #[test]
    fn test_conform_pads_and_truncates() {
        let short = OutputRowSet::new(vec![OutputRow {
            code: "N1".to_string(),
            name: "LED headlights".to_string(),
            is_title: false,
            verdict: Verdict::Yes,
            evidence: "LED headlights".to_string(),
            reason: String::new(),
            include: true,
        }]);
        let conformed = conform(&master(), &short);
        assert_eq!(conformed.len(), 3);
        assert_eq!(conformed.rows[2].reason, "not stated");
    }
}
