//! Consensus voting over N independent oracle attempts.
//!
//! Each attempt is parsed, aligned, and validated on its own before it gets
//! here, so every successful attempt is a full-length row set. Failed and
//! empty attempts carry zero votes; they only abort the round when nothing
//! succeeded at all.
//!
//! Tally policy is unanimity-for-Yes: every successful attempt must say Yes
//! for the final verdict to be Yes, any Yes vote short of unanimity yields
//! Maybe, and no Yes votes yield No.

use crate::types::{AttemptOutcome, ConsensusTally, MasterRow, OutputRow, OutputRowSet, Verdict};
use thiserror::Error;
use tracing::warn;

/// Errors from consensus tallying.
#[derive(Error, Debug)]
pub enum ConsensusError {
    #[error("All {0} oracle attempts failed, no votes to tally")]
    AllAttemptsFailed(usize),
}

/// Tally attempt outcomes into one consensus result per master row.
///
/// The returned vector is index-aligned to `master`. Only `Success` attempts
/// vote; `Empty` and `Failed` attempts are logged and skipped. Fails only if
/// no attempt succeeded.
pub fn tally(
    master: &[MasterRow],
    outcomes: &[AttemptOutcome],
) -> Result<Vec<ConsensusTally>, ConsensusError> {
    let successes: Vec<&OutputRowSet> = outcomes.iter().filter_map(|o| o.row_set()).collect();

    for (i, outcome) in outcomes.iter().enumerate() {
        match outcome {
            AttemptOutcome::Success(_) => {}
            AttemptOutcome::Empty => warn!("attempt {}: oracle returned no parseable rows", i + 1),
            AttemptOutcome::Failed(e) => warn!("attempt {}: oracle call failed: {}", i + 1, e),
        }
    }

    if successes.is_empty() {
        return Err(ConsensusError::AllAttemptsFailed(outcomes.len()));
    }

    let n = successes.len();
    let mut tallies = Vec::with_capacity(master.len());

    for (i, m) in master.iter().enumerate() {
        if m.is_title {
            tallies.push(ConsensusTally {
                code: m.code.clone(),
                name: m.name.clone(),
                is_title: true,
                yes_votes: 0,
                maybe_votes: 0,
                no_votes: 0,
                final_verdict: Verdict::Blank,
                evidence: String::new(),
                reason: String::new(),
            });
            continue;
        }

        let votes: Vec<&OutputRow> = successes.iter().map(|s| &s.rows[i]).collect();
        let yes = votes.iter().filter(|r| r.verdict == Verdict::Yes).count();
        let maybe = votes.iter().filter(|r| r.verdict == Verdict::Maybe).count();
        let no = votes.iter().filter(|r| r.verdict == Verdict::No).count();

        let final_verdict = if yes == n {
            Verdict::Yes
        } else if yes >= 1 {
            Verdict::Maybe
        } else {
            Verdict::No
        };

        // Representative evidence: first Yes vote, else first Maybe vote,
        // else first vote carrying any reason.
        let representative = votes
            .iter()
            .find(|r| r.verdict == Verdict::Yes)
            .or_else(|| votes.iter().find(|r| r.verdict == Verdict::Maybe))
            .or_else(|| votes.iter().find(|r| !r.reason.is_empty()));
        let evidence = representative.map(|r| r.evidence.clone()).unwrap_or_default();

        // Reasons are joined without deduplication; repetition signals agreement.
        let reason = votes
            .iter()
            .filter(|r| !r.reason.is_empty())
            .map(|r| r.reason.as_str())
            .collect::<Vec<_>>()
            .join("; ");

        tallies.push(ConsensusTally {
            code: m.code.clone(),
            name: m.name.clone(),
            is_title: false,
            yes_votes: yes,
            maybe_votes: maybe,
            no_votes: no,
            final_verdict,
            evidence,
            reason,
        });
    }

    Ok(tallies)
}

/// Collapse tallies into an output row set (final verdict per row).
pub fn to_row_set(tallies: &[ConsensusTally]) -> OutputRowSet {
    let rows = tallies
        .iter()
        .map(|t| OutputRow {
            code: t.code.clone(),
            name: t.name.clone(),
            is_title: t.is_title,
            verdict: t.final_verdict,
            evidence: t.evidence.clone(),
            reason: t.reason.clone(),
            include: t.final_verdict.is_positive(),
        })
        .collect();
    OutputRowSet::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align;
    use crate::parser;
    use crate::types::MasterRow;

    fn master() -> Vec<MasterRow> {
        vec![
            MasterRow::feature("N1", "LED headlights"),
            MasterRow::title("T1", "LIGHTING"),
            MasterRow::feature("N2", "Heated mirrors"),
        ]
    }

    fn attempt(raw: &str) -> AttemptOutcome {
        let parsed = parser::parse(raw);
        AttemptOutcome::Success(align::align_and_validate(&master(), &parsed).rows)
    }

    const YES_N1: &str = "N1: Yes | LED headlights with adaptive lighting | in spec\n\
                          T1: | |\n\
                          N2: No | | not mentioned\n";
    const NO_BOTH: &str = "N1: No | | absent\n\
                           T1: | |\n\
                           N2: No | | absent\n";

    #[test]
    fn test_split_vote_yields_maybe() {
        let outcomes = vec![attempt(YES_N1), attempt(YES_N1), attempt(NO_BOTH)];
        let tallies = tally(&master(), &outcomes).unwrap();
        assert_eq!(tallies[0].final_verdict, Verdict::Maybe);
        assert_eq!(tallies[0].vote_string(), "2Y/0M/1N");
        assert_eq!(tallies[2].final_verdict, Verdict::No);
    }

    #[test]
    fn test_unanimous_yes() {
        let outcomes = vec![attempt(YES_N1), attempt(YES_N1), attempt(YES_N1)];
        let tallies = tally(&master(), &outcomes).unwrap();
        assert_eq!(tallies[0].final_verdict, Verdict::Yes);
        assert_eq!(tallies[0].vote_string(), "3Y/0M/0N");
    }

    #[test]
    fn test_zero_yes_votes_yields_no() {
        let outcomes = vec![attempt(NO_BOTH), attempt(NO_BOTH), attempt(NO_BOTH)];
        let tallies = tally(&master(), &outcomes).unwrap();
        assert_eq!(tallies[0].final_verdict, Verdict::No);
        assert_eq!(tallies[2].final_verdict, Verdict::No);
    }

    #[test]
    fn test_title_rows_never_vote() {
        let outcomes = vec![attempt(YES_N1), attempt(YES_N1), attempt(YES_N1)];
        let tallies = tally(&master(), &outcomes).unwrap();
        assert_eq!(tallies[1].final_verdict, Verdict::Blank);
        assert_eq!(tallies[1].yes_votes, 0);
    }

    #[test]
    fn test_failed_attempts_carry_no_votes() {
        let outcomes = vec![
            attempt(YES_N1),
            AttemptOutcome::Failed("timeout".to_string()),
            AttemptOutcome::Empty,
        ];
        let tallies = tally(&master(), &outcomes).unwrap();
        // One successful attempt, unanimous among successes
        assert_eq!(tallies[0].final_verdict, Verdict::Yes);
        assert_eq!(tallies[0].vote_string(), "1Y/0M/0N");
    }

    #[test]
    fn test_all_attempts_failed_is_fatal() {
        let outcomes = vec![
            AttemptOutcome::Failed("timeout".to_string()),
            AttemptOutcome::Empty,
        ];
        assert!(matches!(
            tally(&master(), &outcomes),
            Err(ConsensusError::AllAttemptsFailed(2))
        ));
    }

    #[test]
    fn test_representative_evidence_prefers_yes() {
        let maybe_first = "N1: Maybe | possibly LED headlights | weak\n\
                           T1: | |\n\
                           N2: No | | absent\n";
        let outcomes = vec![attempt(maybe_first), attempt(YES_N1)];
        let tallies = tally(&master(), &outcomes).unwrap();
        assert_eq!(tallies[0].evidence, "LED headlights with adaptive lighting");
    }

    #[test]
    fn test_reasons_joined_without_dedup() {
        let outcomes = vec![attempt(YES_N1), attempt(YES_N1)];
        let tallies = tally(&master(), &outcomes).unwrap();
        assert_eq!(tallies[0].reason, "in spec; in spec");
    }

    #[test]
    fn test_row_set_includes_positive_verdicts() {
        let outcomes = vec![attempt(YES_N1), attempt(NO_BOTH)];
        let tallies = tally(&master(), &outcomes).unwrap();
        let rows = to_row_set(&tallies);
        assert_eq!(rows.len(), 3);
        assert!(rows.rows[0].include);
        assert!(!rows.rows[2].include);
    }
}
