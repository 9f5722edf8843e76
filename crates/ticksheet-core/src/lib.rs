//! # ticksheet-core
//!
//! Deterministic consensus extraction-and-matching engine.
//!
//! This crate contains every stage of the matching pipeline that does not
//! talk to the outside world: response parsing, row alignment, evidence
//! validation, consensus tallying, bilingual and review merging, and the
//! learning heuristics. Oracle calls and persistence live in
//! `ticksheet-runtime`.
//!
//! ## Key Guarantees
//!
//! 1. **Structural**: every stage emits exactly one row per master row, in
//!    master order, no matter what the oracle returned
//! 2. **Deterministic**: same parsed input always produces the same output
//! 3. **Degrading, not failing**: schema and evidence violations are coerced
//!    and logged, never raised
//! 4. **Traceable**: every coercion and downgrade produces an audit warning
//!
//! ## Example
//!
//! ```rust,ignore
//! use ticksheet_core::{match_response, MasterList};
//!
//! let master = MasterList::from_csv_file("master.csv")?;
//! let aligned = match_response(master.rows(), &oracle_reply);
//! assert_eq!(aligned.rows.len(), master.len());
//! ```

pub mod align;
pub mod consensus;
pub mod csvio;
pub mod evidence;
pub mod learn;
pub mod master;
pub mod merge;
pub mod normalize;
pub mod output;
pub mod parser;
pub mod types;

// Re-export main types at crate root
pub use align::{align_and_validate, Aligned};
pub use consensus::{tally, ConsensusError};
pub use master::{MasterError, MasterList};
pub use merge::{merge_bilingual, merge_with_prior};
pub use normalize::{normalize, NormalizeError, Normalized};
pub use types::{
    AttemptOutcome, ConsensusTally, DualRow, Language, MasterRow, OutputRow, OutputRowSet,
    Verdict,
};

/// Parse one raw oracle response and force it into master shape.
///
/// This is the per-attempt entry point: parser, row aligner, and evidence
/// validator in sequence.
pub fn match_response(master: &[MasterRow], raw: &str) -> Aligned {
    let parsed = parser::parse(raw);
    align::align_and_validate(master, &parsed)
}


#[cfg(test)]
mod properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_master() -> impl Strategy<Value = Vec<MasterRow>> {
        prop::collection::vec(("[A-Z][0-9]{1,3}", "[a-z]{4,12} [a-z]{4,12}", any::<bool>()), 1..12)
            .prop_map(|rows| {
                rows.into_iter()
                    .enumerate()
                    .map(|(i, (code, name, is_title))| MasterRow {
                        // Suffix keeps codes unique regardless of the draw
                        code: format!("{}_{}", code, i),
                        name,
                        is_title,
                    })
                    .collect()
            })
    }

    proptest! {
        /// Length and order hold for arbitrary oracle noise.
        #[test]
        fn output_always_mirrors_master(master in arb_master(), raw in ".{0,400}") {
            let aligned = match_response(&master, &raw);
            prop_assert_eq!(aligned.rows.len(), master.len());
            for (row, m) in aligned.rows.iter().zip(master.iter()) {
                prop_assert_eq!(&row.code, &m.code);
            }
        }

        /// Title rows never carry match data, whatever the oracle said.
        #[test]
        fn title_rows_stay_blank(master in arb_master(), raw in ".{0,400}") {
            let aligned = match_response(&master, &raw);
            for (row, m) in aligned.rows.iter().zip(master.iter()) {
                if m.is_title {
                    prop_assert_eq!(row.verdict, Verdict::Blank);
                    prop_assert!(row.evidence.is_empty());
                    prop_assert!(row.reason.is_empty());
                }
            }
        }

        /// A Yes whose evidence shares no vocabulary with the row name is
        /// always downgraded. Name and evidence are drawn from disjoint
        /// alphabets, so no shared token can exist.
        #[test]
        fn disjoint_evidence_never_stays_yes(
            name in "[a-m]{4,10}( [a-m]{4,10}){0,2}",
            evidence in "[n-z]{4,10}( [n-z]{4,10}){0,2}",
        ) {
            let mut row = OutputRow {
                code: "N1".to_string(),
                name,
                is_title: false,
                verdict: Verdict::Yes,
                evidence,
                reason: String::new(),
                include: false,
            };
            evidence::validate_row(&mut row);
            prop_assert_eq!(row.verdict, Verdict::Maybe);
        }
    }
}
