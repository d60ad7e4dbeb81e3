//! Question-generation and answer-evaluation stage handlers.
//!
//! Both handlers are pure over their inputs: they read a record, talk to the
//! model, and return the new stage value — the scheduler owns the write-back.
//! A `None` return means "not ready yet"; the record stays eligible and is
//! retried on a later tick.

use hireflow_llm::{ChatClient, extract, prompts};
use hireflow_shared::{Evaluation, Record};
use tracing::{debug, warn};

/// Generate interview questions for a record with extracted résumé text.
///
/// Two sequential model calls: a commentary comparing the résumé against the
/// applicant's target position, then bracketed questions derived from it.
pub async fn generate_questions(
    client: &dyn ChatClient,
    record: &Record,
    position_field: &str,
) -> Option<Vec<String>> {
    let resume = record.extracted_text()?;
    let position = record
        .profile_fields
        .get(position_field)
        .map(String::as_str)
        .unwrap_or_default();
    if position.is_empty() {
        debug!(dedup_key = %record.dedup_key, position_field, "record has no target position");
    }

    let commentary = client
        .complete(&prompts::resume_commentary(resume, position))
        .await?;
    let raw = client
        .complete(&prompts::interview_questions(&commentary))
        .await?;

    let questions = extract::extract_bracketed(&raw);
    if questions.is_empty() {
        warn!(
            dedup_key = %record.dedup_key,
            "question output had no bracketed segments, will retry"
        );
        return None;
    }

    debug!(dedup_key = %record.dedup_key, count = questions.len(), "questions generated");
    Some(questions)
}

/// Evaluate a record's answers against its questions.
///
/// Each question/answer pair costs two model calls: a qualitative judgement,
/// then a bracketed score derived from it. Scores are averaged; judgements
/// are aggregated in question order. Any failed call or unparseable score
/// abandons the whole pass so the record is retried intact.
pub async fn evaluate_answers(client: &dyn ChatClient, record: &Record) -> Option<Evaluation> {
    let mut commentaries = Vec::new();
    let mut scores = Vec::new();

    for (i, (question, answer)) in record
        .questions
        .iter()
        .zip(record.answers.iter())
        .enumerate()
    {
        let judgement = client
            .complete(&prompts::answer_judgement(question, answer))
            .await?;
        let raw_score = client.complete(&prompts::answer_score(&judgement)).await?;

        let Some(score) = extract::extract_score(&raw_score) else {
            warn!(
                dedup_key = %record.dedup_key,
                pair = i + 1,
                "score output had no bracketed number, will retry"
            );
            return None;
        };

        commentaries.push(format!("{}. {}", i + 1, judgement.trim()));
        scores.push(score);
    }

    if scores.is_empty() {
        return None;
    }

    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    debug!(dedup_key = %record.dedup_key, pairs = scores.len(), score = mean, "answers evaluated");
    Some(Evaluation {
        commentary: commentaries.join("\n\n"),
        score: mean,
    })
}
