//! Input normalization with the optional generative reorganization pass.
//!
//! The deterministic cleanup always runs. When enabled and the input is long
//! enough, one oracle call reorganizes the text cosmetically; the drift guard
//! rejects any response that grew vocabulary or length, and every rejection
//! falls back to the deterministic output. A failed call degrades the same
//! way - normalization never fails a run once cleanup has produced text.

use crate::prompts;
use crate::providers::Oracle;
use std::sync::Arc;
use ticksheet_core::normalize::{self, NormalizeError, Normalized};
use tracing::{debug, warn};

/// Temperature for the reorganization call; cosmetic work wants determinism.
const REORGANIZE_TEMPERATURE: f32 = 0.1;

/// Normalize source text for a pipeline run.
///
/// Returns the normalized text plus audit notes describing anything the pass
/// changed structurally (truncation, generative fallback reasons).
pub async fn normalize_input(
    oracle: &Arc<dyn Oracle>,
    text: &str,
    allow_generative: bool,
) -> Result<Normalized, NormalizeError> {
    let mut normalized = normalize::normalize(text)?;

    if !allow_generative {
        return Ok(normalized);
    }
    if !normalize::generative_eligible(&normalized.text) {
        debug!("input below generative threshold, deterministic output kept");
        return Ok(normalized);
    }

    let prompt = prompts::reorganize_prompt(&normalized.text);
    match oracle.generate(&prompt, REORGANIZE_TEMPERATURE).await {
        Ok(reply) => match normalize::check_drift(&normalized.text, &reply) {
            Ok(()) => {
                normalized
                    .notes
                    .push("generative reorganization applied".to_string());
                normalized.text = reply.trim().to_string();
            }
            Err(violation) => {
                warn!(?violation, "reorganized output rejected, falling back");
                normalized
                    .notes
                    .push(format!("generative pass rejected: {:?}", violation));
            }
        },
        Err(e) => {
            warn!(error = %e, "reorganization call failed, falling back");
            normalized
                .notes
                .push(format!("generative pass failed: {}", e));
        }
    }

    Ok(normalized)
}
