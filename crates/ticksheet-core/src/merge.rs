//! Result merging: bilingual merge of two language passes, and review merge
//! of a fresh automated run with a human-reviewed prior run.

use crate::align;
use crate::evidence;
use crate::types::{DualRow, MasterRow, OutputRow, OutputRowSet, Verdict};

/// Strip a leading language tag ("LV: " or "EN: ") from a reason string.
fn strip_language_prefix(reason: &str) -> &str {
    let trimmed = reason.trim();
    for prefix in ["LV: ", "EN: ", "LV:", "EN:"] {
        if let Some(rest) = trimmed.strip_prefix(prefix) {
            return rest.trim_start();
        }
    }
    trimmed
}

/// Merge two independent language-specific result sets into one final verdict
/// per master row.
///
/// Both inputs are conformed to master length and order first. The side with
/// the strictly higher verdict priority wins; on tie, the side with the longer
/// non-empty evidence; if still tied, LV wins over EN, and two blanks fall to
/// No.
pub fn merge_bilingual(
    master: &[MasterRow],
    lv: &OutputRowSet,
    en: &OutputRowSet,
) -> Vec<DualRow> {
    let lv = align::conform(master, lv);
    let en = align::conform(master, en);

    master
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let l = &lv.rows[i];
            let e = &en.rows[i];

            if m.is_title {
                return DualRow {
                    code: m.code.clone(),
                    name: m.name.clone(),
                    is_title: true,
                    lv_verdict: Verdict::Blank,
                    lv_evidence: String::new(),
                    en_verdict: Verdict::Blank,
                    en_evidence: String::new(),
                    final_verdict: Verdict::Blank,
                    include: false,
                    reason: String::new(),
                };
            }

            let final_verdict = pick_final(l, e);

            let mut reasons = Vec::new();
            if !l.reason.is_empty() {
                reasons.push(format!("LV: {}", strip_language_prefix(&l.reason)));
            }
            if !e.reason.is_empty() {
                reasons.push(format!("EN: {}", strip_language_prefix(&e.reason)));
            }

            DualRow {
                code: m.code.clone(),
                name: m.name.clone(),
                is_title: false,
                lv_verdict: l.verdict,
                lv_evidence: l.evidence.clone(),
                en_verdict: e.verdict,
                en_evidence: e.evidence.clone(),
                final_verdict,
                include: final_verdict.is_positive(),
                reason: reasons.join("; "),
            }
        })
        .collect()
}

fn pick_final(lv: &OutputRow, en: &OutputRow) -> Verdict {
    let lp = lv.verdict.priority();
    let ep = en.verdict.priority();
    if lp > ep {
        return lv.verdict;
    }
    if ep > lp {
        return en.verdict;
    }

    // Equal priority: longer non-empty evidence breaks the tie.
    if lv.evidence.len() > en.evidence.len() && !lv.evidence.is_empty() {
        return lv.verdict;
    }
    if en.evidence.len() > lv.evidence.len() && !en.evidence.is_empty() {
        return en.verdict;
    }

    if lv.verdict != Verdict::Blank {
        lv.verdict
    } else if en.verdict != Verdict::Blank {
        en.verdict
    } else {
        Verdict::No
    }
}

/// Reconcile a fresh automated run with a human-reviewed prior run.
///
/// Human judgment is sticky: a prior Yes or Maybe row is kept verbatim,
/// including its include flag. Everything else adopts the fresh result after
/// evidence validation, with include derived from the fresh verdict.
pub fn merge_with_prior(
    master: &[MasterRow],
    prior: &OutputRowSet,
    fresh: &OutputRowSet,
) -> OutputRowSet {
    let prior = align::conform(master, prior);
    let fresh = align::conform(master, fresh);

    let rows = master
        .iter()
        .enumerate()
        .map(|(i, m)| {
            if m.is_title {
                return OutputRow::title_row(m);
            }

            let p = &prior.rows[i];
            if p.verdict.is_positive() {
                return p.clone();
            }

            let mut row = fresh.rows[i].clone();
            evidence::validate_row(&mut row);
            row.include = row.verdict.is_positive();
            row
        })
        .collect();

    OutputRowSet::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MasterRow;

    fn master() -> Vec<MasterRow> {
        vec![
            MasterRow::feature("N1", "LED headlights"),
            MasterRow::title("T1", "LIGHTING"),
            MasterRow::feature("N2", "Heated mirrors"),
        ]
    }

    fn row(code: &str, verdict: Verdict, evidence: &str, reason: &str, include: bool) -> OutputRow {
        let name = match code {
            "N1" => "LED headlights",
            "N2" => "Heated mirrors",
            _ => "LIGHTING",
        };
        OutputRow {
            code: code.to_string(),
            name: name.to_string(),
            is_title: code.starts_with('T'),
            verdict,
            evidence: evidence.to_string(),
            reason: reason.to_string(),
            include,
        }
    }

    fn set(rows: Vec<OutputRow>) -> OutputRowSet {
        OutputRowSet::new(rows)
    }

    #[test]
    fn test_higher_priority_side_wins() {
        let lv = set(vec![
            row("N1", Verdict::Yes, "LED lukturi", "LV: atrasts", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let en = set(vec![
            row("N1", Verdict::Maybe, "some lights", "maybe", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::Maybe, "heated mirrors", "seen", true),
        ]);
        let merged = merge_bilingual(&master(), &lv, &en);
        assert_eq!(merged[0].final_verdict, Verdict::Yes);
        assert_eq!(merged[2].final_verdict, Verdict::Maybe);
        assert!(merged[0].include);
    }

    #[test]
    fn test_tie_broken_by_evidence_length() {
        let lv = set(vec![
            row("N1", Verdict::Yes, "LED", "", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let en = set(vec![
            row("N1", Verdict::Yes, "LED headlights with DRL", "", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let merged = merge_bilingual(&master(), &lv, &en);
        // Same verdict either way, but the EN side carried it
        assert_eq!(merged[0].final_verdict, Verdict::Yes);
        assert_eq!(merged[0].en_evidence, "LED headlights with DRL");
    }

    #[test]
    fn test_language_prefixes_stripped_once() {
        let lv = set(vec![
            row("N1", Verdict::Yes, "LED lukturi", "LV: atrasts tekstā", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let en = set(vec![
            row("N1", Verdict::No, "", "EN: not found", false),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let merged = merge_bilingual(&master(), &lv, &en);
        assert_eq!(merged[0].reason, "LV: atrasts tekstā; EN: not found");
    }

    #[test]
    fn test_title_rows_stay_blank() {
        let lv = set(vec![
            row("N1", Verdict::No, "", "", false),
            row("T1", Verdict::Yes, "bogus", "bogus", true),
            row("N2", Verdict::No, "", "", false),
        ]);
        let en = lv.clone();
        let merged = merge_bilingual(&master(), &lv, &en);
        assert_eq!(merged[1].final_verdict, Verdict::Blank);
        assert!(!merged[1].include);
    }

    #[test]
    fn test_include_follows_final_verdict() {
        let lv = set(vec![
            row("N1", Verdict::No, "", "", false),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let en = lv.clone();
        let merged = merge_bilingual(&master(), &lv, &en);
        assert!(merged.iter().all(|r| !r.include));
    }

    #[test]
    fn test_prior_yes_is_sticky() {
        let prior = set(vec![
            row("N1", Verdict::Yes, "LED headlights", "human confirmed", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "not stated", false),
        ]);
        let fresh = set(vec![
            row("N1", Verdict::No, "", "rerun missed it", false),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::Yes, "heated mirrors included", "found", true),
        ]);
        let merged = merge_with_prior(&master(), &prior, &fresh);
        // Prior Yes survives a fresh No
        assert_eq!(merged.rows[0].verdict, Verdict::Yes);
        assert_eq!(merged.rows[0].reason, "human confirmed");
        assert!(merged.rows[0].include);
        // Prior No adopts the fresh Yes
        assert_eq!(merged.rows[2].verdict, Verdict::Yes);
        assert!(merged.rows[2].include);
    }

    #[test]
    fn test_review_merge_idempotent() {
        let prior = set(vec![
            row("N1", Verdict::Maybe, "some lights", "unsure", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "not stated", false),
        ]);
        let fresh = set(vec![
            row("N1", Verdict::No, "", "", false),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::Maybe, "mirrors, heated", "weak", true),
        ]);
        let once = merge_with_prior(&master(), &prior, &fresh);
        let twice = merge_with_prior(&master(), &once, &fresh);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_fresh_result_revalidated() {
        let prior = set(vec![
            row("N1", Verdict::No, "", "", false),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        // Fresh Yes with unrelated evidence must be downgraded on adoption
        let fresh = set(vec![
            row("N1", Verdict::Yes, "17 inch wheels", "", true),
            row("T1", Verdict::Blank, "", "", false),
            row("N2", Verdict::No, "", "", false),
        ]);
        let merged = merge_with_prior(&master(), &prior, &fresh);
        assert_eq!(merged.rows[0].verdict, Verdict::Maybe);
    }
}
