//! Persistent learning store.
//!
//! Owns the human-feedback tables: learned features, extracted patterns,
//! negative examples, and the long-term feature dictionary. Records are
//! append-or-increment only; nothing is deleted automatically. Writes are
//! serialized through one connection guard so concurrent reviews cannot lose
//! usage-count updates, while hint lookups tolerate a few seconds of
//! staleness by design.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::path::Path;
use thiserror::Error;
use ticksheet_core::learn::{self, content_hash, normalize_key, DedupeDecision, Hint};
use ticksheet_core::types::{Language, OutputRowSet, Verdict};
use tracing::{debug, info};

/// Errors from the learning store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Failed to serialize knowledge export: {0}")]
    Export(#[from] serde_json::Error),
}

/// What one review pass taught the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LearnSummary {
    pub features: usize,
    pub patterns: usize,
    pub negatives: usize,
}

/// Row counts per table.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreStats {
    pub features: u64,
    pub patterns: u64,
    pub negatives: u64,
    pub dictionary: u64,
}

/// SQLite-backed learning store.
pub struct LearningStore {
    conn: Mutex<Connection>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS learned_features (
    id              INTEGER PRIMARY KEY,
    normalized_text TEXT NOT NULL,
    code            TEXT NOT NULL,
    language        TEXT NOT NULL,
    model           TEXT NOT NULL,
    method          TEXT NOT NULL,
    confidence      REAL NOT NULL,
    usage_count     INTEGER NOT NULL DEFAULT 1,
    success_rate    REAL NOT NULL DEFAULT 1.0,
    verified_at     TEXT NOT NULL,
    UNIQUE(normalized_text, code, language)
);

CREATE TABLE IF NOT EXISTS learned_patterns (
    id           INTEGER PRIMARY KEY,
    pattern_text TEXT NOT NULL,
    pattern_type TEXT NOT NULL,
    code         TEXT NOT NULL,
    language     TEXT NOT NULL,
    confidence   REAL NOT NULL,
    usage_count  INTEGER NOT NULL DEFAULT 1,
    UNIQUE(pattern_text, code, language)
);

CREATE TABLE IF NOT EXISTS negative_examples (
    id            INTEGER PRIMARY KEY,
    original_text TEXT NOT NULL,
    code          TEXT NOT NULL,
    reason        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS dictionary (
    id            INTEGER PRIMARY KEY,
    text_hash     TEXT NOT NULL UNIQUE,
    original_text TEXT NOT NULL,
    code          TEXT NOT NULL,
    match_status  TEXT NOT NULL,
    confidence    REAL NOT NULL,
    method        TEXT NOT NULL,
    user_verified INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_features_lang ON learned_features(language);
CREATE INDEX IF NOT EXISTS idx_patterns_lang ON learned_patterns(language);
CREATE INDEX IF NOT EXISTS idx_negatives_code ON negative_examples(code);
CREATE INDEX IF NOT EXISTS idx_dictionary_code ON dictionary(code);
";

impl LearningStore {
    /// Open (and migrate) a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, used in tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Learn from a human-reviewed row set.
    ///
    /// For each non-title row: an included Yes/Maybe row with evidence becomes
    /// a learned feature (plus extracted patterns); a row the human unticked
    /// after the automation said Yes becomes a negative example.
    pub fn learn_from_results(
        &self,
        reviewed: &OutputRowSet,
        language: Language,
        model: &str,
    ) -> Result<LearnSummary, StoreError> {
        let mut summary = LearnSummary::default();
        let conn = self.conn.lock();

        for row in reviewed.iter().filter(|r| !r.is_title) {
            if row.include && row.verdict.is_positive() && !row.evidence.is_empty() {
                let key = normalize_key(&row.evidence);
                if key.is_empty() {
                    continue;
                }
                conn.execute(
                    "INSERT INTO learned_features
                       (normalized_text, code, language, model, method, confidence,
                        usage_count, success_rate, verified_at)
                     VALUES (?1, ?2, ?3, ?4, 'review', ?5, 1, 1.0, ?6)
                     ON CONFLICT(normalized_text, code, language) DO UPDATE SET
                       usage_count = usage_count + 1,
                       confidence = MAX(confidence, excluded.confidence),
                       verified_at = excluded.verified_at",
                    params![
                        key,
                        row.code,
                        language.as_str(),
                        model,
                        confidence_for(row.verdict),
                        Utc::now().to_rfc3339(),
                    ],
                )?;
                summary.features += 1;

                for (pattern, pattern_type) in learn::extract_patterns(&row.evidence) {
                    conn.execute(
                        "INSERT INTO learned_patterns
                           (pattern_text, pattern_type, code, language, confidence, usage_count)
                         VALUES (?1, ?2, ?3, ?4, ?5, 1)
                         ON CONFLICT(pattern_text, code, language) DO UPDATE SET
                           usage_count = usage_count + 1",
                        params![
                            pattern,
                            pattern_type.as_str(),
                            row.code,
                            language.as_str(),
                            confidence_for(row.verdict),
                        ],
                    )?;
                    summary.patterns += 1;
                }
            } else if !row.include && row.verdict == Verdict::Yes {
                conn.execute(
                    "INSERT INTO negative_examples (original_text, code, reason)
                     VALUES (?1, ?2, ?3)",
                    params![
                        normalize_key(&row.evidence),
                        row.code,
                        if row.reason.is_empty() {
                            "unticked by reviewer"
                        } else {
                            row.reason.as_str()
                        },
                    ],
                )?;
                summary.negatives += 1;
            }
        }

        info!(
            features = summary.features,
            patterns = summary.patterns,
            negatives = summary.negatives,
            "review learned"
        );
        Ok(summary)
    }

    /// Ranked hints for a source text: direct learned-feature lookups plus
    /// discounted pattern hits, deduplicated by code, filtered by threshold.
    pub fn get_learned_matches(
        &self,
        text: &str,
        language: Language,
        threshold: f64,
    ) -> Result<Vec<Hint>, StoreError> {
        let key = normalize_key(text);
        if key.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let mut candidates = Vec::new();

        // Direct lookups: substring containment in either direction, so a
        // fragment of a longer stored snippet still resolves.
        let mut stmt = conn.prepare(
            "SELECT normalized_text, code, confidence, success_rate
             FROM learned_features
             WHERE language = ?1
               AND (instr(?2, normalized_text) > 0 OR instr(normalized_text, ?2) > 0)",
        )?;
        let rows = stmt.query_map(params![language.as_str(), key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, f64>(3)?,
            ))
        })?;
        for row in rows {
            let (text, code, confidence, success_rate) = row?;
            candidates.push(Hint {
                code,
                text,
                confidence: success_rate * confidence,
                source: "learned",
            });
        }

        // Pattern hits at a fixed confidence discount.
        let mut stmt = conn.prepare(
            "SELECT pattern_text, code, confidence
             FROM learned_patterns
             WHERE language = ?1 AND instr(?2, pattern_text) > 0",
        )?;
        let rows = stmt.query_map(params![language.as_str(), key], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
            ))
        })?;
        for row in rows {
            let (text, code, confidence) = row?;
            candidates.push(Hint {
                code,
                text,
                confidence: confidence * learn::PATTERN_CONFIDENCE_DISCOUNT,
                source: "pattern",
            });
        }

        let ranked = learn::rank_hints(candidates, threshold);
        debug!(hints = ranked.len(), "hint lookup");
        Ok(ranked)
    }

    /// Check whether stored negative examples argue against this code.
    pub fn check_negative_examples(
        &self,
        text: &str,
        code: &str,
    ) -> Result<Option<String>, StoreError> {
        let key = normalize_key(text);
        let conn = self.conn.lock();
        let reason = conn
            .query_row(
                "SELECT reason FROM negative_examples
                 WHERE code = ?1 AND original_text != '' AND instr(?2, original_text) > 0
                 LIMIT 1",
                params![code, key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(reason)
    }

    /// Add a candidate to the long-term dictionary, applying duplicate
    /// rejection. Exact and >0.95-similar candidates are rejected; candidates
    /// in the (0.85, 0.95] band are stored with the similarity annotated.
    pub fn add_dictionary_entry(
        &self,
        text: &str,
        code: &str,
        match_status: Verdict,
        confidence: f64,
        method: &str,
        user_verified: bool,
    ) -> Result<DedupeDecision, StoreError> {
        let conn = self.conn.lock();

        // The whole table is consulted: text_hash is unique across codes, so
        // a cross-code exact duplicate must reject, not trip the constraint.
        let mut stmt = conn.prepare(
            "SELECT text_hash, original_text, code, match_status, confidence, method, user_verified
             FROM dictionary",
        )?;
        let existing: Vec<learn::DictionaryEntry> = stmt
            .query_map([], |row| {
                Ok(learn::DictionaryEntry {
                    text_hash: row.get(0)?,
                    original_text: row.get(1)?,
                    code: row.get(2)?,
                    match_status: verdict_from_str(&row.get::<_, String>(3)?),
                    confidence: row.get(4)?,
                    method: row.get(5)?,
                    user_verified: row.get::<_, i64>(6)? != 0,
                })
            })?
            .collect::<Result<_, _>>()?;

        let decision = learn::dedupe_decision(text, existing.iter());
        let stored_method = match &decision {
            DedupeDecision::Insert => method.to_string(),
            DedupeDecision::InsertAnnotated { similarity } => {
                format!("{} (similar {:.2} to existing entry)", method, similarity)
            }
            DedupeDecision::RejectExact | DedupeDecision::RejectNear { .. } => {
                debug!(code, ?decision, "dictionary candidate rejected");
                return Ok(decision);
            }
        };

        conn.execute(
            "INSERT INTO dictionary
               (text_hash, original_text, code, match_status, confidence, method, user_verified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                content_hash(text),
                normalize_key(text),
                code,
                match_status.as_str(),
                confidence,
                stored_method,
                user_verified as i64,
            ],
        )?;
        Ok(decision)
    }

    /// Table row counts.
    pub fn stats(&self) -> Result<StoreStats, StoreError> {
        let conn = self.conn.lock();
        let count = |table: &str| -> Result<u64, rusqlite::Error> {
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
                row.get::<_, u64>(0)
            })
        };
        Ok(StoreStats {
            features: count("learned_features")?,
            patterns: count("learned_patterns")?,
            negatives: count("negative_examples")?,
            dictionary: count("dictionary")?,
        })
    }

    /// Dump all learned knowledge as a JSON document.
    pub fn export_knowledge(&self) -> Result<String, StoreError> {
        let conn = self.conn.lock();

        let mut features = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT normalized_text, code, language, model, method, confidence,
                    usage_count, success_rate, verified_at
             FROM learned_features ORDER BY code, normalized_text",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(json!({
                "normalized_text": row.get::<_, String>(0)?,
                "code": row.get::<_, String>(1)?,
                "language": row.get::<_, String>(2)?,
                "model": row.get::<_, String>(3)?,
                "method": row.get::<_, String>(4)?,
                "confidence": row.get::<_, f64>(5)?,
                "usage_count": row.get::<_, u64>(6)?,
                "success_rate": row.get::<_, f64>(7)?,
                "verified_at": row.get::<_, String>(8)?,
            }))
        })?;
        for row in rows {
            features.push(row?);
        }

        let mut patterns = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT pattern_text, pattern_type, code, language, confidence, usage_count
             FROM learned_patterns ORDER BY code, pattern_text",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(json!({
                "pattern_text": row.get::<_, String>(0)?,
                "pattern_type": row.get::<_, String>(1)?,
                "code": row.get::<_, String>(2)?,
                "language": row.get::<_, String>(3)?,
                "confidence": row.get::<_, f64>(4)?,
                "usage_count": row.get::<_, u64>(5)?,
            }))
        })?;
        for row in rows {
            patterns.push(row?);
        }

        let mut negatives = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT original_text, code, reason FROM negative_examples ORDER BY code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(json!({
                "original_text": row.get::<_, String>(0)?,
                "code": row.get::<_, String>(1)?,
                "reason": row.get::<_, String>(2)?,
            }))
        })?;
        for row in rows {
            negatives.push(row?);
        }

        let mut dictionary = Vec::new();
        let mut stmt = conn.prepare(
            "SELECT text_hash, original_text, code, match_status, confidence, method, user_verified
             FROM dictionary ORDER BY code",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(json!({
                "text_hash": row.get::<_, String>(0)?,
                "original_text": row.get::<_, String>(1)?,
                "code": row.get::<_, String>(2)?,
                "match_status": row.get::<_, String>(3)?,
                "confidence": row.get::<_, f64>(4)?,
                "method": row.get::<_, String>(5)?,
                "user_verified": row.get::<_, i64>(6)? != 0,
            }))
        })?;
        for row in rows {
            dictionary.push(row?);
        }

        let doc = json!({
            "exported_at": Utc::now().to_rfc3339(),
            "learned_features": features,
            "learned_patterns": patterns,
            "negative_examples": negatives,
            "dictionary": dictionary,
        });
        Ok(serde_json::to_string_pretty(&doc)?)
    }
}

fn confidence_for(verdict: Verdict) -> f64 {
    match verdict {
        Verdict::Yes => 1.0,
        Verdict::Maybe => 0.7,
        _ => 0.5,
    }
}

fn verdict_from_str(s: &str) -> Verdict {
    match s {
        "Yes" => Verdict::Yes,
        "No" => Verdict::No,
        "Maybe" => Verdict::Maybe,
        _ => Verdict::Blank,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ticksheet_core::types::{MasterRow, OutputRow};

    fn reviewed() -> OutputRowSet {
        OutputRowSet::new(vec![
            OutputRow {
                code: "N1".to_string(),
                name: "LED headlights".to_string(),
                is_title: false,
                verdict: Verdict::Yes,
                evidence: "LED lukturi ar 180mm klīrensu".to_string(),
                reason: "confirmed".to_string(),
                include: true,
            },
            OutputRow::title_row(&MasterRow::title("T1", "LIGHTING")),
            OutputRow {
                code: "N2".to_string(),
                name: "Heated mirrors".to_string(),
                is_title: false,
                verdict: Verdict::Yes,
                evidence: "apsildāmi spoguļi".to_string(),
                reason: "wrong row".to_string(),
                include: false,
            },
        ])
    }

    #[test]
    fn test_learn_records_features_and_negatives() {
        let store = LearningStore::open_in_memory().unwrap();
        let summary = store
            .learn_from_results(&reviewed(), Language::Lv, "gpt-4o-mini")
            .unwrap();
        assert_eq!(summary.features, 1);
        assert_eq!(summary.negatives, 1);
        assert!(summary.patterns >= 1);

        let stats = store.stats().unwrap();
        assert_eq!(stats.features, 1);
        assert_eq!(stats.negatives, 1);
    }

    #[test]
    fn test_relearning_increments_usage() {
        let store = LearningStore::open_in_memory().unwrap();
        store
            .learn_from_results(&reviewed(), Language::Lv, "gpt-4o-mini")
            .unwrap();
        store
            .learn_from_results(&reviewed(), Language::Lv, "gpt-4o-mini")
            .unwrap();
        // Still one feature row, not two
        assert_eq!(store.stats().unwrap().features, 1);
    }

    #[test]
    fn test_hint_lookup_matches_substring() {
        let store = LearningStore::open_in_memory().unwrap();
        store
            .learn_from_results(&reviewed(), Language::Lv, "gpt-4o-mini")
            .unwrap();

        let hints = store
            .get_learned_matches(
                "Auto ar LED lukturi ar 180mm klīrensu un citu aprīkojumu",
                Language::Lv,
                0.6,
            )
            .unwrap();
        assert!(!hints.is_empty());
        assert_eq!(hints[0].code, "N1");

        // Wrong language finds nothing
        let none = store
            .get_learned_matches("LED lukturi ar 180mm klīrensu", Language::En, 0.6)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_negative_example_lookup() {
        let store = LearningStore::open_in_memory().unwrap();
        store
            .learn_from_results(&reviewed(), Language::Lv, "gpt-4o-mini")
            .unwrap();

        let hit = store
            .check_negative_examples("teksts ar apsildāmi spoguļi iekšā", "N2")
            .unwrap();
        assert_eq!(hit.as_deref(), Some("wrong row"));

        // Different code is not consulted
        let miss = store
            .check_negative_examples("teksts ar apsildāmi spoguļi iekšā", "N1")
            .unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_dictionary_dedupe() {
        let store = LearningStore::open_in_memory().unwrap();
        let first = store
            .add_dictionary_entry("LED lukturi priekšā", "N1", Verdict::Yes, 0.9, "consensus", true)
            .unwrap();
        assert_eq!(first, DedupeDecision::Insert);

        let exact = store
            .add_dictionary_entry("led  lukturi priekšā.", "N1", Verdict::Yes, 0.9, "consensus", true)
            .unwrap();
        assert_eq!(exact, DedupeDecision::RejectExact);
        assert_eq!(store.stats().unwrap().dictionary, 1);
    }

    #[test]
    fn test_dictionary_dedupe_spans_codes() {
        let store = LearningStore::open_in_memory().unwrap();
        store
            .add_dictionary_entry("led lukturi", "N1", Verdict::Yes, 0.9, "review", true)
            .unwrap();

        // Same text under a different code rejects gracefully instead of
        // tripping the unique text_hash constraint
        let cross = store
            .add_dictionary_entry("led lukturi", "N2", Verdict::Yes, 0.9, "review", true)
            .unwrap();
        assert_eq!(cross, DedupeDecision::RejectExact);
        assert_eq!(store.stats().unwrap().dictionary, 1);
    }

    #[test]
    fn test_hint_lookup_matches_fragment_of_stored_text() {
        let store = LearningStore::open_in_memory().unwrap();
        let reviewed = OutputRowSet::new(vec![OutputRow {
            code: "N1".to_string(),
            name: "LED headlights".to_string(),
            is_title: false,
            verdict: Verdict::Yes,
            evidence: "led lukturi ar adaptīvo gaismu un drl funkciju".to_string(),
            reason: "confirmed".to_string(),
            include: true,
        }]);
        store
            .learn_from_results(&reviewed, Language::Lv, "gpt-4o-mini")
            .unwrap();

        // Query is a fragment of the stored snippet, not a superset
        let hints = store
            .get_learned_matches("led lukturi ar adaptīvo gaismu", Language::Lv, 0.6)
            .unwrap();
        assert!(hints.iter().any(|h| h.code == "N1" && h.source == "learned"));
    }

    #[test]
    fn test_export_knowledge_contains_everything() {
        let store = LearningStore::open_in_memory().unwrap();
        store
            .learn_from_results(&reviewed(), Language::Lv, "gpt-4o-mini")
            .unwrap();
        store
            .add_dictionary_entry("LED lukturi", "N1", Verdict::Yes, 0.9, "consensus", true)
            .unwrap();

        let exported = store.export_knowledge().unwrap();
        let doc: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert!(doc["learned_features"].as_array().unwrap().len() == 1);
        assert!(doc["negative_examples"].as_array().unwrap().len() == 1);
        assert!(doc["dictionary"].as_array().unwrap().len() == 1);
    }
}
