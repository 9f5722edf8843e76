//! Core data model for the matching engine.
//!
//! One tagged row type (`OutputRow`) carries every pipeline variant's fields;
//! positional tuples of varying arity are deliberately absent. The binding
//! contract of every stage is [`OutputRowSet`]: same length and order as the
//! master list, always.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum evidence length after trimming.
pub const MAX_EVIDENCE_LEN: usize = 140;

/// A per-row match verdict.
///
/// `Blank` is legal only on title rows, which never carry match data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Yes,
    No,
    Maybe,
    /// Title rows only.
    Blank,
}

impl Verdict {
    /// Canonical output string ("Yes", "No", "Maybe", "").
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Yes => "Yes",
            Verdict::No => "No",
            Verdict::Maybe => "Maybe",
            Verdict::Blank => "",
        }
    }

    /// Merge priority: Yes > Maybe > No > Blank.
    pub fn priority(&self) -> u8 {
        match self {
            Verdict::Yes => 3,
            Verdict::Maybe => 2,
            Verdict::No => 1,
            Verdict::Blank => 0,
        }
    }

    /// Whether a row with this verdict should be ticked for inclusion.
    pub fn is_positive(&self) -> bool {
        matches!(self, Verdict::Yes | Verdict::Maybe)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the fixed reference list being matched against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MasterRow {
    /// Unique, stable ordering key.
    pub code: String,

    /// Human-readable feature name.
    pub name: String,

    /// Title rows are section headers; they never carry match data and are
    /// excluded from voting and evidence checks.
    pub is_title: bool,
}

impl MasterRow {
    pub fn feature(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            is_title: false,
        }
    }

    pub fn title(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            is_title: true,
        }
    }
}

/// One output row: master identity plus the verdict fields the oracle supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub code: String,
    pub name: String,
    pub is_title: bool,

    pub verdict: Verdict,

    /// Verbatim snippet claimed to support the verdict, trimmed to
    /// [`MAX_EVIDENCE_LEN`].
    pub evidence: String,

    pub reason: String,

    /// Whether the row is ticked for inclusion. Set from the verdict by the
    /// pipelines; only the review boundary may override it.
    pub include: bool,
}

impl OutputRow {
    /// An empty title row for the given master entry.
    pub fn title_row(master: &MasterRow) -> Self {
        Self {
            code: master.code.clone(),
            name: master.name.clone(),
            is_title: true,
            verdict: Verdict::Blank,
            evidence: String::new(),
            reason: String::new(),
            include: false,
        }
    }

    /// The padding default for a data row the oracle never answered.
    pub fn not_stated(master: &MasterRow) -> Self {
        Self {
            code: master.code.clone(),
            name: master.name.clone(),
            is_title: false,
            verdict: Verdict::No,
            evidence: String::new(),
            reason: "not stated".to_string(),
            include: false,
        }
    }
}

/// An ordered set of output rows whose length and order exactly equal the
/// master row sequence. Constructed only by the row aligner and the mergers,
/// which uphold that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRowSet {
    pub rows: Vec<OutputRow>,
}

impl OutputRowSet {
    pub fn new(rows: Vec<OutputRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, OutputRow> {
        self.rows.iter()
    }

    /// Look up a row by master code.
    pub fn by_code(&self, code: &str) -> Option<&OutputRow> {
        self.rows.iter().find(|r| r.code == code)
    }
}

/// Per-code vote counts across N independent oracle attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusTally {
    pub code: String,
    pub name: String,
    pub is_title: bool,

    pub yes_votes: usize,
    pub maybe_votes: usize,
    pub no_votes: usize,

    /// Derived verdict under the unanimity-for-Yes policy.
    pub final_verdict: Verdict,

    /// Representative evidence: first Yes attempt, else first Maybe attempt,
    /// else first attempt carrying any reason.
    pub evidence: String,

    /// Semicolon-joined non-empty per-attempt reasons, not deduplicated.
    pub reason: String,
}

impl ConsensusTally {
    /// Vote summary in the "2Y/1M/0N" form.
    pub fn vote_string(&self) -> String {
        format!(
            "{}Y/{}M/{}N",
            self.yes_votes, self.maybe_votes, self.no_votes
        )
    }
}

/// One row of a merged bilingual run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DualRow {
    pub code: String,
    pub name: String,
    pub is_title: bool,

    pub lv_verdict: Verdict,
    pub lv_evidence: String,

    pub en_verdict: Verdict,
    pub en_evidence: String,

    pub final_verdict: Verdict,

    /// Ticked iff the final verdict is Yes or Maybe.
    pub include: bool,

    pub reason: String,
}

/// The outcome of one oracle attempt inside a consensus round.
///
/// A failed attempt is data fed into the tally, never an unwind of the
/// consensus loop.
#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    /// The attempt produced an aligned, validated row set.
    Success(OutputRowSet),

    /// The oracle returned text but no parseable rows.
    Empty,

    /// The oracle call itself failed.
    Failed(String),
}

impl AttemptOutcome {
    pub fn row_set(&self) -> Option<&OutputRowSet> {
        match self {
            AttemptOutcome::Success(rows) => Some(rows),
            _ => None,
        }
    }
}

/// Pipeline language selector. Language is always an explicit parameter;
/// nothing in the engine infers it from content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Lv,
    En,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Lv => "lv",
            Language::En => "en",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
