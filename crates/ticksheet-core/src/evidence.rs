//! Evidence validation.
//!
//! Downgrades or blanks verdicts whose evidence is weak or conceptually
//! unrelated to the master row's name. Validation never fails a run; every
//! distortion is returned as a warning for the audit trail.

use crate::types::{OutputRow, Verdict, MAX_EVIDENCE_LEN};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    /// Alphanumeric word tokens (Unicode-aware, covers Latvian diacritics).
    static ref TOKEN: Regex = Regex::new(r"[\p{L}\d]+").unwrap();

    /// Bilingual (Latvian/English) stopwords excluded from the relation check.
    static ref STOPWORDS: HashSet<&'static str> = [
        "un", "ar", "vai", "bez", "pie", "par", "no", "uz", "in", "on", "and",
        "or", "with", "w", "the", "a", "an", "of", "to", "for", "at", "by",
    ]
    .into_iter()
    .collect();
}

/// Trim evidence to [`MAX_EVIDENCE_LEN`] chars, appending an ellipsis when cut.
pub fn trim_evidence(evidence: &str) -> String {
    let evidence = evidence.trim();
    let count = evidence.chars().count();
    if count <= MAX_EVIDENCE_LEN {
        return evidence.to_string();
    }
    let mut out: String = evidence.chars().take(MAX_EVIDENCE_LEN - 3).collect();
    out = out.trim_end().to_string();
    out.push('…');
    out
}

/// Lowercase alphanumeric tokens of length >= 4, stopwords excluded.
fn significant_tokens(text: &str) -> HashSet<String> {
    TOKEN
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .filter(|t| t.chars().count() >= 4 && !STOPWORDS.contains(t.as_str()))
        .collect()
}

/// Whether the evidence shares at least one significant token with the name.
pub fn evidence_relates(name: &str, evidence: &str) -> bool {
    let name_tokens = significant_tokens(name);
    let evidence_tokens = significant_tokens(evidence);
    !name_tokens.is_disjoint(&evidence_tokens)
}

/// Validate one output row in place, returning audit warnings.
///
/// Title rows are forced blank. For data rows:
/// 1. Evidence is trimmed to the length cap.
/// 2. Evidence with no alphabetic character or fewer than 2 chars is blanked;
///    a Yes verdict riding on it drops to Maybe.
/// 3. A Yes verdict whose evidence shares no significant token with the row
///    name drops to Maybe (evidence present but unrelated).
pub fn validate_row(row: &mut OutputRow) -> Vec<String> {
    let mut warnings = Vec::new();

    if row.is_title {
        if row.verdict != Verdict::Blank || !row.evidence.is_empty() || !row.reason.is_empty() {
            warnings.push(format!("{}: title row carried match data, blanked", row.code));
        }
        row.verdict = Verdict::Blank;
        row.evidence.clear();
        row.reason.clear();
        row.include = false;
        return warnings;
    }

    row.evidence = trim_evidence(&row.evidence);

    let no_alpha = !row.evidence.chars().any(|c| c.is_alphabetic());
    if no_alpha || row.evidence.chars().count() < 2 {
        if !row.evidence.is_empty() {
            warnings.push(format!("{}: evidence too weak, blanked", row.code));
        }
        row.evidence.clear();
        if row.verdict == Verdict::Yes {
            row.verdict = Verdict::Maybe;
            warnings.push(format!("{}: Yes without usable evidence, downgraded", row.code));
        }
        return warnings;
    }

    if row.verdict == Verdict::Yes && !evidence_relates(&row.name, &row.evidence) {
        row.verdict = Verdict::Maybe;
        warnings.push(format!(
            "{}: evidence unrelated to row name, downgraded",
            row.code
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MasterRow;

    fn row(name: &str, verdict: Verdict, evidence: &str) -> OutputRow {
        OutputRow {
            code: "N1".to_string(),
            name: name.to_string(),
            is_title: false,
            verdict,
            evidence: evidence.to_string(),
            reason: String::new(),
            include: false,
        }
    }

    #[test]
    fn test_trim_long_evidence() {
        let long = "x".repeat(200);
        let trimmed = trim_evidence(&long);
        assert_eq!(trimmed.chars().count(), MAX_EVIDENCE_LEN - 2);
        assert!(trimmed.ends_with('…'));
    }

    #[test]
    fn test_short_evidence_untouched() {
        assert_eq!(trim_evidence("LED headlights"), "LED headlights");
    }

    #[test]
    fn test_related_evidence_keeps_yes() {
        let mut r = row(
            "LED headlights",
            Verdict::Yes,
            "LED headlights with adaptive lighting",
        );
        let warnings = validate_row(&mut r);
        assert_eq!(r.verdict, Verdict::Yes);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unrelated_evidence_downgrades_yes() {
        let mut r = row("Heated seats", Verdict::Yes, "17 inch wheels");
        validate_row(&mut r);
        assert_eq!(r.verdict, Verdict::Maybe);
    }

    #[test]
    fn test_stopwords_do_not_relate() {
        // "with" is the only shared token and it is a stopword
        let mut r = row("Mirrors with memory", Verdict::Yes, "Wheels with bolts");
        validate_row(&mut r);
        assert_eq!(r.verdict, Verdict::Maybe);
    }

    #[test]
    fn test_non_alphabetic_evidence_blanked() {
        let mut r = row("LED headlights", Verdict::Yes, "12345 --- !!");
        validate_row(&mut r);
        assert_eq!(r.evidence, "");
        assert_eq!(r.verdict, Verdict::Maybe);
    }

    #[test]
    fn test_no_verdict_with_empty_evidence_passes() {
        let mut r = row("LED headlights", Verdict::No, "");
        let warnings = validate_row(&mut r);
        assert_eq!(r.verdict, Verdict::No);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_title_row_forced_blank() {
        let master = MasterRow::title("T1", "LIGHTING");
        let mut r = OutputRow {
            code: master.code.clone(),
            name: master.name.clone(),
            is_title: true,
            verdict: Verdict::Yes,
            evidence: "bogus".to_string(),
            reason: "bogus".to_string(),
            include: true,
        };
        let warnings = validate_row(&mut r);
        assert_eq!(r.verdict, Verdict::Blank);
        assert!(r.evidence.is_empty());
        assert!(!r.include);
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_latvian_evidence_relates() {
        let mut r = row("Apsildāmi spoguļi", Verdict::Yes, "apsildāmi ārējie spoguļi");
        validate_row(&mut r);
        assert_eq!(r.verdict, Verdict::Yes);
    }
}
