//! Core domain types for Hireflow applicant records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A raw row as delivered by the data source: opaque field name → scalar value.
///
/// Field names arrive however the upstream form labels them ("Phone Number",
/// "Resume/CV"); normalization happens during ingest, not here.
pub type RawRecord = BTreeMap<String, String>;

// ---------------------------------------------------------------------------
// Attachment
// ---------------------------------------------------------------------------

/// Resolution state of a single attachment field, successful or not.
///
/// A failed resolution still produces an `Attachment` — the failure lives in
/// `error` and the record keeps moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    /// The reference as submitted (a Drive-style URL).
    pub source_reference: String,
    /// Path of the locally persisted copy, once downloaded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_reference: Option<String>,
    /// Text extracted from the binary, when the field policy asks for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
    /// Failure description from any step of resolution, if one occurred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attachment {
    /// A fresh attachment with only the source reference filled in.
    pub fn new(source_reference: impl Into<String>) -> Self {
        Self {
            source_reference: source_reference.into(),
            local_reference: None,
            extracted_text: None,
            error: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Result of the answer-evaluation stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Aggregated per-question judgements, in question order.
    pub commentary: String,
    /// Mean of the per-question scores.
    pub score: f64,
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One applicant submission and its accumulated processing state.
///
/// Stage fields (`questions`, `evaluation`) progress forward only: once
/// populated they are never cleared or replaced by later submissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Identity of the record, derived from the applicant's phone number.
    pub dedup_key: String,
    /// Source-supplied submission timestamp. Together with `dedup_key` it
    /// identifies an exact-duplicate submission.
    pub submitted_at: String,
    /// Normalized field name → applicant-supplied value.
    #[serde(default)]
    pub profile_fields: BTreeMap<String, String>,
    /// Attachment resolution state, present after the attachment field has
    /// been processed (successfully or not).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    /// Generated interview questions; empty until question generation succeeds.
    #[serde(default)]
    pub questions: Vec<String>,
    /// Applicant answers, written by an external collection step.
    #[serde(default)]
    pub answers: Vec<String>,
    /// Evaluation result; `None` until answer evaluation succeeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evaluation: Option<Evaluation>,
}

impl Record {
    /// Create an empty record for the given identity and submission time.
    pub fn new(dedup_key: impl Into<String>, submitted_at: impl Into<String>) -> Self {
        Self {
            dedup_key: dedup_key.into(),
            submitted_at: submitted_at.into(),
            profile_fields: BTreeMap::new(),
            attachment: None,
            questions: Vec::new(),
            answers: Vec::new(),
            evaluation: None,
        }
    }

    /// Text extracted from the record's attachment, if any.
    pub fn extracted_text(&self) -> Option<&str> {
        self.attachment.as_ref().and_then(|a| a.extracted_text.as_deref())
    }

    /// Merge a newer submission for the same `dedup_key` into this record.
    ///
    /// Non-stage fields (`submitted_at`, `profile_fields`, `attachment`) take
    /// the incoming value. `answers` is overwritten only when the incoming
    /// value is non-empty, so a re-ingest never wipes externally-collected
    /// answers. `questions` and `evaluation` keep the existing value once
    /// populated.
    pub fn merge_update(&mut self, incoming: Record) {
        debug_assert_eq!(self.dedup_key, incoming.dedup_key);
        self.submitted_at = incoming.submitted_at;
        self.profile_fields = incoming.profile_fields;
        if incoming.attachment.is_some() {
            self.attachment = incoming.attachment;
        }
        if self.questions.is_empty() {
            self.questions = incoming.questions;
        }
        if !incoming.answers.is_empty() {
            self.answers = incoming.answers;
        }
        if self.evaluation.is_none() {
            self.evaluation = incoming.evaluation;
        }
    }
}

// ---------------------------------------------------------------------------
// RecordFilter
// ---------------------------------------------------------------------------

/// The closed set of predicates the record store can evaluate.
///
/// Stage eligibility lives here and nowhere else; the scheduler asks the
/// store for records matching a filter rather than composing ad hoc queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    /// Every stored record.
    All,
    /// Eligible for question generation: no questions yet, and the
    /// attachment yielded non-empty extracted text.
    AwaitingQuestions,
    /// Eligible for evaluation: questions and answers both present,
    /// evaluation not yet produced.
    AwaitingEvaluation,
    /// Terminal: evaluation has been produced.
    Evaluated,
}

impl RecordFilter {
    /// Whether `record` satisfies this predicate.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Self::All => true,
            Self::AwaitingQuestions => {
                record.questions.is_empty()
                    && record.extracted_text().is_some_and(|t| !t.is_empty())
            }
            Self::AwaitingEvaluation => {
                !record.questions.is_empty()
                    && !record.answers.is_empty()
                    && record.evaluation.is_none()
            }
            Self::Evaluated => record.evaluation.is_some(),
        }
    }
}
