//! Learning heuristics: storage-key normalization, lexical pattern
//! extraction, similarity scoring, and hint ranking.
//!
//! Everything here is deterministic and IO-free; persistence of the learned
//! records lives in the runtime crate's store.

use crate::types::{Language, Verdict};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};

/// Minimum combined confidence for a hint to reach a prompt.
pub const HINT_THRESHOLD: f64 = 0.6;

/// Confidence discount applied to pattern-derived hints.
pub const PATTERN_CONFIDENCE_DISCOUNT: f64 = 0.8;

/// Jaccard similarity above which a dictionary candidate is a near-duplicate.
pub const NEAR_DUPLICATE_REJECT: f64 = 0.95;

/// Jaccard similarity above which an accepted candidate gets annotated.
pub const NEAR_DUPLICATE_ANNOTATE: f64 = 0.85;

/// A human-verified positive observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedFeature {
    pub normalized_text: String,
    pub code: String,
    pub language: Language,
    pub model: String,
    pub method: String,
    pub confidence: f64,
    pub usage_count: u64,
    pub success_rate: f64,
    pub verified_at: DateTime<Utc>,
}

/// A lexical pattern extracted from verified text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnedPattern {
    pub pattern_text: String,
    pub pattern_type: PatternType,
    pub code: String,
    pub language: Language,
    pub confidence: f64,
    pub usage_count: u64,
}

/// What kind of lexical rule produced a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    /// Digit plus measurement unit ("180mm", "110kw").
    TechnicalSpec,

    /// Domain feature-name stem ("apsild", "luktur", "sensor").
    FeatureStem,
}

impl PatternType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternType::TechnicalSpec => "technical_spec",
            PatternType::FeatureStem => "feature_stem",
        }
    }
}

/// A human correction of an automated Yes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NegativeExample {
    pub original_text: String,
    pub code: String,
    pub reason: String,
}

/// One entry of the long-term feature dictionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub text_hash: String,
    pub original_text: String,
    pub code: String,
    pub match_status: Verdict,
    pub confidence: f64,
    pub method: String,
    pub user_verified: bool,
}

/// A ranked hint fed back into a future prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct Hint {
    pub code: String,
    pub text: String,
    pub confidence: f64,

    /// "learned" for direct lookups, "pattern" for pattern hits.
    pub source: &'static str,
}

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();

    /// Digit followed by a measurement unit, optionally spaced.
    static ref TECHNICAL_SPEC: Regex = Regex::new(
        r"(?i)\b\d+(?:[.,]\d+)?\s*(?:mm|cm|kw|hp|zs|kg|nm|km/h|kmh|collas|collu|inch|v|ah)\b"
    ).unwrap();

    /// Automotive feature stems, Latvian and English.
    static ref FEATURE_STEM: Regex = Regex::new(concat!(
        r"(?i)\b(?:apsild\p{L}*|luktur\p{L}*|sensor\p{L}*|kamer\p{L}*|navig\p{L}*",
        r"|klimat\p{L}*|spogu\p{L}*|disk\p{L}*|bremz\p{L}*|sēdekl\p{L}*|stūre\p{L}*",
        r"|heated|led|adaptive|cruise|camera|parking|leather|sunroof|alloy|keyless)\b"
    )).unwrap();

    static ref TOKEN: Regex = Regex::new(r"[\p{L}\d]+").unwrap();
}

/// Normalize text for storage and lookup: lowercase, collapsed whitespace,
/// stripped terminal punctuation. Applied identically on both sides so a
/// stored key always matches its own query.
pub fn normalize_key(text: &str) -> String {
    let lower = text.trim().to_lowercase();
    let collapsed = WHITESPACE.replace_all(&lower, " ");
    collapsed
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .trim()
        .to_string()
}

/// Hex-encoded SHA-256 of the normalized text, used as the dictionary's
/// exact-duplicate key.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_key(text).as_bytes());
    hex::encode(hasher.finalize())
}

/// Extract lexical patterns from verified evidence text.
pub fn extract_patterns(text: &str) -> Vec<(String, PatternType)> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for m in TECHNICAL_SPEC.find_iter(text) {
        let p = normalize_key(m.as_str());
        if seen.insert(p.clone()) {
            out.push((p, PatternType::TechnicalSpec));
        }
    }
    for m in FEATURE_STEM.find_iter(text) {
        let p = normalize_key(m.as_str());
        if seen.insert(p.clone()) {
            out.push((p, PatternType::FeatureStem));
        }
    }
    out
}

/// Token-set Jaccard similarity of two texts after key normalization.
pub fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let ta: HashSet<String> = TOKEN
        .find_iter(&normalize_key(a))
        .map(|m| m.as_str().to_string())
        .collect();
    let tb: HashSet<String> = TOKEN
        .find_iter(&normalize_key(b))
        .map(|m| m.as_str().to_string())
        .collect();
    if ta.is_empty() && tb.is_empty() {
        return 1.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

/// Outcome of the long-term dictionary's duplicate check.
#[derive(Debug, Clone, PartialEq)]
pub enum DedupeDecision {
    /// No similar entry exists.
    Insert,

    /// Similar entry in the annotate band; store with the similarity noted.
    InsertAnnotated { similarity: f64 },

    /// Content-hash collision with an existing entry.
    RejectExact,

    /// Near-duplicate above the reject threshold.
    RejectNear { similarity: f64 },
}

/// Decide whether a candidate text may enter the dictionary, given the
/// existing entries for the same code.
pub fn dedupe_decision<'a, I>(candidate: &str, existing: I) -> DedupeDecision
where
    I: IntoIterator<Item = &'a DictionaryEntry>,
{
    let hash = content_hash(candidate);
    let mut best_similarity = 0.0f64;

    for entry in existing {
        if entry.text_hash == hash {
            return DedupeDecision::RejectExact;
        }
        let sim = jaccard_similarity(candidate, &entry.original_text);
        if sim > best_similarity {
            best_similarity = sim;
        }
    }

    if best_similarity > NEAR_DUPLICATE_REJECT {
        DedupeDecision::RejectNear {
            similarity: best_similarity,
        }
    } else if best_similarity > NEAR_DUPLICATE_ANNOTATE {
        DedupeDecision::InsertAnnotated {
            similarity: best_similarity,
        }
    } else {
        DedupeDecision::Insert
    }
}

/// Rank candidate hints: dedupe by code keeping the highest confidence, drop
/// everything below the threshold, sort descending.
pub fn rank_hints(candidates: Vec<Hint>, threshold: f64) -> Vec<Hint> {
    let mut best: HashMap<String, Hint> = HashMap::new();
    for hint in candidates {
        match best.get(&hint.code) {
            Some(existing) if existing.confidence >= hint.confidence => {}
            _ => {
                best.insert(hint.code.clone(), hint);
            }
        }
    }
    let mut ranked: Vec<Hint> = best
        .into_values()
        .filter(|h| h.confidence >= threshold)
        .collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.code.cmp(&b.code))
    });
    ranked
}

/// Score a direct learned-feature lookup for ranking.
pub fn feature_score(feature: &LearnedFeature) -> f64 {
    feature.success_rate * feature.confidence
}

/// Score a pattern hit for ranking (fixed discount on stored confidence).
pub fn pattern_score(pattern: &LearnedPattern) -> f64 {
    pattern.confidence * PATTERN_CONFIDENCE_DISCOUNT
}
