//! Prompt construction for the matching oracle.
//!
//! Prompts pin down the exact output contract the response parser expects:
//! one line per master row, `CODE: Match | evidence | reason`, wrapped in
//! BEGIN_CSV/END_CSV markers. Learned hints are injected as a
//! `LEARNED KNOWLEDGE HINTS` block to bias the oracle toward
//! human-verified answers.

use ticksheet_core::learn::Hint;
use ticksheet_core::parser::{BEGIN_MARKER, END_MARKER};
use ticksheet_core::types::{Language, MasterRow};

/// Base temperature for the first consensus attempt.
pub const BASE_TEMPERATURE: f32 = 0.3;

/// Temperature increment per further attempt, for answer diversity.
pub const TEMPERATURE_STEP: f32 = 0.1;

/// Temperature schedule across consensus attempts (0-based).
pub fn temperature_for_attempt(attempt: usize) -> f32 {
    BASE_TEMPERATURE + TEMPERATURE_STEP * attempt as f32
}

/// Build the matching prompt for one oracle attempt.
pub fn match_prompt(
    master: &[MasterRow],
    source_text: &str,
    language: Language,
    hints: &[Hint],
) -> String {
    let mut prompt = String::new();

    let language_line = match language {
        Language::Lv => "The source text is in Latvian. Match against it as written; do not translate feature names.",
        Language::En => "The source text is in English.",
    };

    prompt.push_str(
        "You are matching a vehicle specification text against a fixed feature checklist.\n",
    );
    prompt.push_str(language_line);
    prompt.push_str("\n\nFEATURE CHECKLIST (answer for every row, in this exact order):\n");
    for row in master {
        if row.is_title {
            prompt.push_str(&format!("{}: [section] {}\n", row.code, row.name));
        } else {
            prompt.push_str(&format!("{}: {}\n", row.code, row.name));
        }
    }

    if !hints.is_empty() {
        prompt.push_str("\nLEARNED KNOWLEDGE HINTS (human-verified, trust these):\n");
        for hint in hints {
            prompt.push_str(&format!(
                "{}: \"{}\" (confidence {:.2})\n",
                hint.code, hint.text, hint.confidence
            ));
        }
    }

    prompt.push_str("\nSOURCE TEXT:\n");
    prompt.push_str(source_text);

    prompt.push_str(&format!(
        "\n\nRULES:\n\
         - Output exactly {count} lines, one per checklist row, in checklist order.\n\
         - Line format: CODE: Yes|No|Maybe | evidence | reason\n\
         - evidence must be a verbatim snippet from the source text, or empty.\n\
         - For [section] rows output: CODE: | |\n\
         - Say Yes only when the text explicitly states the feature.\n\
         - Wrap the table between {begin} and {end} with nothing else inside.\n",
        count = master.len(),
        begin = BEGIN_MARKER,
        end = END_MARKER,
    ));

    prompt
}

/// Build the cosmetic reorganization prompt for the generative normalizer.
pub fn reorganize_prompt(text: &str) -> String {
    format!(
        "Reorganize the following vehicle specification text into clean, \
         one-feature-per-line form. Do NOT add, remove, translate, or invent \
         any content; use only words that already appear in the text.\n\n{}",
        text
    )
}
