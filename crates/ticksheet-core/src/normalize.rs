//! Normalization guard: deterministic text cleanup plus the drift limits that
//! bound the optional generative reorganization pass.
//!
//! The deterministic pass always runs and preserves line order. The generative
//! pass (issued by the runtime) is cosmetic only; [`check_drift`] rejects any
//! reorganized output that grew new vocabulary or length beyond narrow limits,
//! in which case the caller falls back to the deterministic output.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use thiserror::Error;

/// Hard cap on input length. Longer inputs are truncated with an audit note.
pub const MAX_INPUT_LEN: usize = 80_000;

/// Minimum input length for the generative pass to be worth a call.
pub const MIN_GENERATIVE_LEN: usize = 100;

/// Max fraction of word-types a reorganized output may introduce.
pub const MAX_NEW_WORD_RATIO: f64 = 0.10;

/// Max output/input length ratio for a reorganized output.
pub const MAX_LENGTH_RATIO: f64 = 1.20;

/// Errors from input normalization.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("Source text is empty after cleanup")]
    EmptyInput,
}

lazy_static! {
    /// Runs of spaces and tabs.
    static ref MULTI_SPACE: Regex = Regex::new(r"[ \t]+").unwrap();

    /// Three or more consecutive newlines.
    static ref MULTI_NEWLINE: Regex = Regex::new(r"\n{3,}").unwrap();

    /// Space before closing punctuation.
    static ref SPACE_BEFORE_PUNCT: Regex = Regex::new(r"\s+([,.;:!?%])").unwrap();

    /// A number split from a short unit token ("180 mm" -> "180mm").
    static ref DIGIT_UNIT: Regex = Regex::new(r"(\d)\s+(mm|cm|kw|hp|kg|nm|km|kmh|v|ah)\b").unwrap();

    /// Characters outside the supported set (Latin incl. Latvian diacritics,
    /// digits, common punctuation).
    static ref UNSUPPORTED: Regex = Regex::new(
        r#"[^\w\sāčēģīķļņšūžĀČĒĢĪĶĻŅŠŪŽ,.;:!?%/()\[\]\-+'"°×–]"#
    ).unwrap();

    static ref WORD: Regex = Regex::new(r"[\p{L}\d]+").unwrap();
}

/// Result of the deterministic pass.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub text: String,

    /// Audit notes for anything the pass had to distort (e.g. truncation).
    pub notes: Vec<String>,
}

/// Deterministic cleanup: collapse whitespace, normalize punctuation spacing,
/// strip unsupported symbols, join digit-unit pairs. Line order is preserved.
pub fn normalize(text: &str) -> Result<Normalized, NormalizeError> {
    let mut notes = Vec::new();

    let mut text = text.replace("\r\n", "\n").replace('\r', "\n");
    if text.len() > MAX_INPUT_LEN {
        let mut cut = MAX_INPUT_LEN;
        while !text.is_char_boundary(cut) {
            cut -= 1;
        }
        text.truncate(cut);
        notes.push(format!("input truncated to {} chars", cut));
    }

    let text = UNSUPPORTED.replace_all(&text, " ");
    let text = MULTI_SPACE.replace_all(&text, " ");
    let text = SPACE_BEFORE_PUNCT.replace_all(&text, "$1");
    let text = DIGIT_UNIT.replace_all(&text, "$1$2");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    let text = lines.join("\n");
    let text = MULTI_NEWLINE.replace_all(&text, "\n\n").into_owned();
    let text = text.trim().to_string();

    if text.is_empty() {
        return Err(NormalizeError::EmptyInput);
    }

    Ok(Normalized { text, notes })
}

/// Whether the generative pass should be attempted at all for this input.
pub fn generative_eligible(text: &str) -> bool {
    text.len() >= MIN_GENERATIVE_LEN
}

/// Why a reorganized output was rejected by the drift guard.
#[derive(Debug, Clone, PartialEq)]
pub enum DriftViolation {
    /// The output introduced too many word-types absent from the input.
    NewVocabulary { new_types: usize, original_types: usize },

    /// The output grew beyond the allowed length ratio.
    LengthGrowth { output_len: usize, input_len: usize },
}

/// Validate a generatively reorganized output against its input.
///
/// Returns `Ok(())` if the output stays within the drift limits, otherwise
/// the violated limit. Callers fall back to the deterministic output on `Err`.
pub fn check_drift(input: &str, output: &str) -> Result<(), DriftViolation> {
    if output.len() as f64 > input.len() as f64 * MAX_LENGTH_RATIO {
        return Err(DriftViolation::LengthGrowth {
            output_len: output.len(),
            input_len: input.len(),
        });
    }

    let input_types = word_types(input);
    let output_types = word_types(output);
    let new_types = output_types.difference(&input_types).count();
    if new_types as f64 > input_types.len() as f64 * MAX_NEW_WORD_RATIO {
        return Err(DriftViolation::NewVocabulary {
            new_types,
            original_types: input_types.len(),
        });
    }

    Ok(())
}

fn word_types(text: &str) -> HashSet<String> {
    WORD.find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}
