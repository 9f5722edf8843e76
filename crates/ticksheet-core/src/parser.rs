//! Response parser: converts the oracle's delimited free text into per-code
//! candidate verdicts.
//!
//! Expected line shape is `CODE: Match | evidence | reason`. The oracle is
//! unreliable, so parsing is tolerant: unparseable lines are skipped rather
//! than fabricated into rows, labels are coerced to the canonical set, and
//! the payload is located via explicit markers, an embedded fenced block, or
//! the whole text in that order.

use crate::types::Verdict;
use lazy_static::lazy_static;
use regex::Regex;

/// Marker pair the prompt asks the oracle to wrap its table in.
pub const BEGIN_MARKER: &str = "BEGIN_CSV";
pub const END_MARKER: &str = "END_CSV";

lazy_static! {
    /// A line that starts like a code record: short alphanumeric code, colon.
    static ref CODE_LINE: Regex = Regex::new(r"(?m)^\s*[A-Za-z0-9_.\-]{1,24}\s*:").unwrap();

    /// Fenced block in the response body.
    static ref FENCED_BLOCK: Regex = Regex::new(r"```[a-zA-Z]*\n([\s\S]*?)```").unwrap();
}

/// One candidate row recovered from the oracle's text.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRow {
    pub code: String,
    pub verdict: Verdict,
    pub evidence: String,
    pub reason: String,
}

/// Parse an oracle response into candidate rows.
///
/// Lines lacking either the code separator (`:`) or the field separator (`|`)
/// are skipped silently. Anything the parser returns still has to survive row
/// alignment and evidence validation before it becomes output.
pub fn parse(raw: &str) -> Vec<ParsedRow> {
    let payload = extract_payload(raw);
    payload.lines().filter_map(parse_line).collect()
}

/// Locate the table span inside the raw response.
///
/// Priority: explicit BEGIN_CSV/END_CSV markers, then a fenced block that
/// looks record-shaped (has a field separator and a code prefix), then the
/// whole text.
fn extract_payload(raw: &str) -> &str {
    if let Some(start) = raw.find(BEGIN_MARKER) {
        let after = &raw[start + BEGIN_MARKER.len()..];
        let end = after.find(END_MARKER).unwrap_or(after.len());
        return &after[..end];
    }

    for cap in FENCED_BLOCK.captures_iter(raw) {
        if let Some(body) = cap.get(1) {
            let body_str = body.as_str();
            if body_str.contains('|') && CODE_LINE.is_match(body_str) {
                return &raw[body.start()..body.end()];
            }
        }
    }

    raw
}

fn parse_line(line: &str) -> Option<ParsedRow> {
    let line = line.trim();
    if !line.contains(':') || !line.contains('|') {
        return None;
    }

    let (code, rest) = line.split_once(':')?;
    let code = code.trim();
    if code.is_empty() || code.len() > 24 || !code.chars().all(is_code_char) {
        return None;
    }

    let mut fields = rest.splitn(4, '|').map(str::trim);
    let label = fields.next().unwrap_or("");
    let evidence = fields.next().unwrap_or("").to_string();
    let mut reason = fields.next().unwrap_or("").to_string();

    let (verdict, coerced) = coerce_label(label);
    if coerced {
        if reason.is_empty() {
            reason = "label coerced".to_string();
        } else {
            reason.push_str("; label coerced");
        }
    }

    Some(ParsedRow {
        code: code.to_string(),
        verdict,
        evidence,
        reason,
    })
}

fn is_code_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')
}

/// Coerce a free-form label to a canonical verdict.
///
/// Exact matches pass through untouched; anything else goes through substring
/// heuristics and is flagged as coerced. An unrecognizable label becomes
/// Maybe, never Yes.
pub fn coerce_label(label: &str) -> (Verdict, bool) {
    match label.trim() {
        "Yes" => return (Verdict::Yes, false),
        "No" => return (Verdict::No, false),
        "Maybe" => return (Verdict::Maybe, false),
        "" => return (Verdict::Maybe, true),
        _ => {}
    }

    let lower = label.trim().to_lowercase();
    if lower.contains("yes") {
        (Verdict::Yes, true)
    } else if lower.contains("maybe") || lower.contains("partial") || lower.contains("unclear") {
        (Verdict::Maybe, true)
    } else if lower.contains("no") {
        (Verdict::No, true)
    } else {
        (Verdict::Maybe, true)
    }
}
