//! Pipelines: the one place that sequences normalization, oracle calls,
//! alignment, merging, auditing, and learning.
//!
//! Three run shapes exist: a single-language single call, an N-attempt
//! consensus round, and a dual-language run merging two independent passes.
//! Reruns go through the review merge so human verdicts stay sticky.

use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use ticksheet_core::consensus::ConsensusError;
use ticksheet_core::master::MasterList;
use ticksheet_core::normalize::NormalizeError;
use ticksheet_core::types::{
    ConsensusTally, DualRow, Language, OutputRowSet, Verdict,
};
use ticksheet_core::{align, merge, output};

use crate::audit::AuditTrail;
use crate::config::RunConfig;
use crate::consensus::{run_consensus, ConsensusRun};
use crate::hints::HintCache;
use crate::normalizer;
use crate::prompts;
use crate::providers::{Oracle, OracleError};
use crate::store::{LearnSummary, LearningStore, StoreError};

/// Errors from pipeline runs.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Input rejected: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Oracle call failed: {0}")]
    Oracle(#[from] OracleError),

    #[error("Consensus round failed: {0}")]
    Consensus(#[from] ConsensusError),

    #[error("Learning store error: {0}")]
    Store(#[from] StoreError),

    #[error("Audit trail error: {0}")]
    Audit(#[from] std::io::Error),
}

/// Result of a single-language run.
#[derive(Debug, Clone)]
pub struct SingleRunResult {
    pub rows: OutputRowSet,
    pub warnings: Vec<String>,
}

/// Result of a consensus run.
#[derive(Debug, Clone)]
pub struct ConsensusRunResult {
    pub tallies: Vec<ConsensusTally>,
    pub rows: OutputRowSet,
}

/// Matching pipeline over one oracle and an optional learning store.
pub struct Pipeline {
    oracle: Arc<dyn Oracle>,
    store: Option<Arc<LearningStore>>,
    hints: Option<HintCache>,
    config: RunConfig,
}

impl Pipeline {
    pub fn new(oracle: Arc<dyn Oracle>, config: RunConfig) -> Self {
        Self {
            oracle,
            store: None,
            hints: None,
            config,
        }
    }

    /// Attach a learning store; enables hints, negative checks, and learning.
    pub fn with_store(mut self, store: Arc<LearningStore>) -> Self {
        self.hints = Some(HintCache::new(Arc::clone(&store)));
        self.store = Some(store);
        self
    }

    /// Build the prompt, returning the codes any learned hints applied to.
    async fn prompt_for(
        &self,
        master: &MasterList,
        text: &str,
        language: Language,
    ) -> Result<(String, Vec<String>), PipelineError> {
        let hints = match &self.hints {
            Some(cache) => cache
                .hints_for(text, language, self.config.hint_threshold)
                .await?,
            None => Arc::new(Vec::new()),
        };
        let codes = hints.iter().map(|h| h.code.clone()).collect();
        let prompt = prompts::match_prompt(master.rows(), text, language, &hints);
        Ok((prompt, codes))
    }

    /// Downgrade Yes rows that collide with stored negative examples.
    fn apply_negative_examples(
        &self,
        rows: &mut OutputRowSet,
        text: &str,
    ) -> Result<Vec<String>, PipelineError> {
        let store = match &self.store {
            Some(s) => s,
            None => return Ok(Vec::new()),
        };
        let mut warnings = Vec::new();
        for row in rows.rows.iter_mut() {
            if row.verdict != Verdict::Yes {
                continue;
            }
            if let Some(reason) = store.check_negative_examples(text, &row.code)? {
                row.verdict = Verdict::Maybe;
                row.include = false;
                if !row.reason.is_empty() {
                    row.reason.push_str("; ");
                }
                row.reason
                    .push_str(&format!("previously rejected: {}", reason));
                warnings.push(format!("{}: downgraded by negative example", row.code));
            }
        }
        Ok(warnings)
    }

    /// One normalized input, one oracle call, one aligned row set.
    pub async fn run_single(
        &self,
        master: &MasterList,
        text: &str,
        language: Language,
    ) -> Result<SingleRunResult, PipelineError> {
        let trail = AuditTrail::create(&self.config.audit_dir, language.as_str())?;
        let normalized =
            normalizer::normalize_input(&self.oracle, text, self.config.allow_generative).await?;
        trail.write_input(&normalized.text, &normalized.notes)?;

        let (prompt, hint_codes) = self.prompt_for(master, &normalized.text, language).await?;
        trail.write_artifact("prompt.txt", &prompt)?;
        let raw = self
            .oracle
            .generate(&prompt, prompts::BASE_TEMPERATURE)
            .await?;
        trail.write_artifact(&format!("{}_response.txt", language), &raw)?;

        let aligned = ticksheet_core::match_response(master.rows(), &raw);
        let mut rows = aligned.rows;
        let mut warnings = aligned.warnings;
        warnings.extend(self.apply_negative_examples(&mut rows, &normalized.text)?);
        if !hint_codes.is_empty() {
            warnings.push(format!("learning applied: {}", hint_codes.join(", ")));
        }

        trail.write_warnings(language.as_str(), &warnings)?;
        trail.write_artifact("result.csv", &output::single_csv(&rows))?;

        info!(
            language = %language,
            rows = rows.len(),
            warnings = warnings.len(),
            "single run complete"
        );
        Ok(SingleRunResult { rows, warnings })
    }

    /// N concurrent attempts, tallied by unanimity-for-Yes.
    pub async fn run_consensus_round(
        &self,
        master: &MasterList,
        text: &str,
        language: Language,
    ) -> Result<ConsensusRunResult, PipelineError> {
        let trail = AuditTrail::create(&self.config.audit_dir, "consensus")?;
        let normalized =
            normalizer::normalize_input(&self.oracle, text, self.config.allow_generative).await?;
        trail.write_input(&normalized.text, &normalized.notes)?;

        let (prompt, hint_codes) = self.prompt_for(master, &normalized.text, language).await?;
        trail.write_artifact("prompt.txt", &prompt)?;
        let ConsensusRun { tallies, records } =
            run_consensus(&self.oracle, master.rows(), &prompt, self.config.attempts).await?;

        for record in &records {
            trail.write_attempt(language.as_str(), record)?;
        }

        let mut rows = ticksheet_core::consensus::to_row_set(&tallies);
        let mut warnings = self.apply_negative_examples(&mut rows, &normalized.text)?;
        if !hint_codes.is_empty() {
            warnings.push(format!("learning applied: {}", hint_codes.join(", ")));
        }
        trail.write_warnings("consensus", &warnings)?;
        trail.write_artifact("result.csv", &output::consensus_csv(&tallies))?;

        Ok(ConsensusRunResult { tallies, rows })
    }

    /// Two independent language passes, merged per row.
    pub async fn run_dual(
        &self,
        master: &MasterList,
        text_lv: &str,
        text_en: &str,
    ) -> Result<Vec<DualRow>, PipelineError> {
        let (lv, en) = tokio::join!(
            self.run_single(master, text_lv, Language::Lv),
            self.run_single(master, text_en, Language::En),
        );
        let lv = lv?;
        let en = en?;

        let merged = merge::merge_bilingual(master.rows(), &lv.rows, &en.rows);

        let trail = AuditTrail::create(&self.config.audit_dir, "dual")?;
        trail.write_artifact("result.csv", &output::dual_csv(&merged))?;
        info!(rows = merged.len(), "dual run merged");
        Ok(merged)
    }

    /// Rerun over a human-reviewed prior result; prior Yes/Maybe rows win.
    pub async fn rerun_with_review(
        &self,
        master: &MasterList,
        prior: &OutputRowSet,
        text: &str,
        language: Language,
    ) -> Result<SingleRunResult, PipelineError> {
        let fresh = self.run_single(master, text, language).await?;
        let rows = merge::merge_with_prior(master.rows(), prior, &fresh.rows);
        let rows = align::conform(master.rows(), &rows);
        Ok(SingleRunResult {
            rows,
            warnings: fresh.warnings,
        })
    }

    /// Feed a human-reviewed result back into the learning store and the
    /// long-term dictionary.
    pub fn learn_from_review(
        &self,
        reviewed: &OutputRowSet,
        language: Language,
    ) -> Result<LearnSummary, PipelineError> {
        let store = match &self.store {
            Some(s) => s,
            None => return Ok(LearnSummary::default()),
        };
        let summary = store.learn_from_results(reviewed, language, &self.config.model)?;

        for row in reviewed.iter() {
            if row.is_title || !row.include || row.evidence.is_empty() {
                continue;
            }
            store.add_dictionary_entry(
                &row.evidence,
                &row.code,
                row.verdict,
                1.0,
                "review",
                true,
            )?;
        }

        if let Some(cache) = &self.hints {
            cache.invalidate_all();
        }
        Ok(summary)
    }
}
