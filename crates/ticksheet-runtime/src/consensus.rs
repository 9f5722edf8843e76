//! Concurrent consensus rounds.
//!
//! Issues N independent oracle attempts concurrently (they share no state),
//! pushes each response through the parser, aligner, and validator on its
//! own, and tallies after all attempts complete. A failed call becomes
//! attempt data with zero votes; only a round where every attempt failed is
//! an error.

use crate::prompts;
use crate::providers::Oracle;
use futures::future::join_all;
use std::sync::Arc;
use ticksheet_core::consensus::ConsensusError;
use ticksheet_core::types::{AttemptOutcome, ConsensusTally, MasterRow};
use tracing::info;

/// Forensic record of one attempt, kept for the audit trail.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    /// 1-based attempt number
    pub attempt: usize,

    pub temperature: f32,

    /// Raw oracle response, verbatim; None when the call failed
    pub raw_response: Option<String>,

    /// Coercion and validation warnings from this attempt
    pub warnings: Vec<String>,

    pub outcome: AttemptOutcome,
}

/// A completed consensus round.
#[derive(Debug, Clone)]
pub struct ConsensusRun {
    pub tallies: Vec<ConsensusTally>,
    pub records: Vec<AttemptRecord>,
}

/// Run one consensus round of `attempts` independent oracle calls.
pub async fn run_consensus(
    oracle: &Arc<dyn Oracle>,
    master: &[MasterRow],
    prompt: &str,
    attempts: usize,
) -> Result<ConsensusRun, ConsensusError> {
    let futures = (0..attempts).map(|i| {
        let oracle = Arc::clone(oracle);
        async move {
            let temperature = prompts::temperature_for_attempt(i);
            match oracle.generate(prompt, temperature).await {
                Ok(raw) => {
                    let parsed = ticksheet_core::parser::parse(&raw);
                    if parsed.is_empty() {
                        AttemptRecord {
                            attempt: i + 1,
                            temperature,
                            raw_response: Some(raw),
                            warnings: Vec::new(),
                            outcome: AttemptOutcome::Empty,
                        }
                    } else {
                        let aligned = ticksheet_core::align::align_and_validate(master, &parsed);
                        AttemptRecord {
                            attempt: i + 1,
                            temperature,
                            raw_response: Some(raw),
                            warnings: aligned.warnings,
                            outcome: AttemptOutcome::Success(aligned.rows),
                        }
                    }
                }
                Err(e) => AttemptRecord {
                    attempt: i + 1,
                    temperature,
                    raw_response: None,
                    warnings: Vec::new(),
                    outcome: AttemptOutcome::Failed(e.to_string()),
                },
            }
        }
    });

    let mut records = join_all(futures).await;
    records.sort_by_key(|r| r.attempt);

    let outcomes: Vec<AttemptOutcome> = records.iter().map(|r| r.outcome.clone()).collect();
    let tallies = ticksheet_core::consensus::tally(master, &outcomes)?;

    let successes = outcomes.iter().filter(|o| o.row_set().is_some()).count();
    info!(attempts, successes, "consensus round complete");

    Ok(ConsensusRun { tallies, records })
}
