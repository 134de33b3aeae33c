//! Incremental journal-analysis pipeline.
//!
//! Decides when enough unanalyzed journal content has accumulated, fetches
//! that batch, asks the completion service to analyze it under a fixed
//! rubric, and persists the result exactly once per qualifying batch.
//!
//! Each analysis row carries a deterministic `batch_key` derived from the
//! watermark (the previous analysis's creation time). The unique index on
//! (user_id, batch_key) makes the final insert idempotent: two concurrent
//! runs that read the same watermark can both generate, but only one row
//! lands.

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::analysis::AnalysisKind;
use crate::models::entry::JournalEntry;
use crate::services::completion::{CompletionClient, CompletionError};

/// Content stored on a sentinel row when generation was deferred by quota.
pub const SENTINEL_CONTENT: &str =
    "Analysis deferred: generation was temporarily unavailable due to high demand.";

const ANALYST_SYSTEM_PROMPT: &str = "\
You are an insightful journal analyst. Analyze the user's journal entries to \
identify patterns, emotional themes, and personal growth. Structure your \
response in four sections:
1. Keywords: a few short thematic keywords
2. Theme: one statement naming the unifying theme
3. Emotional pattern: a description of the recurring emotional pattern
4. Guidance: one to three actionable steps for deeper reflection

Write clearly and warmly; the reader is the journal's author.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdDecision {
    Generate,
    Defer,
}

/// Final outcome of one pipeline run. Every invocation maps to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisOutcome {
    /// Not enough new entries since the watermark.
    Deferred,
    /// Threshold said generate but there were no entries to analyze
    /// (bootstrap with an empty journal). Nothing persisted.
    NoContent,
    /// A new analysis row was generated and persisted.
    Generated,
    /// A concurrent run already persisted this batch; nothing new written.
    AlreadyGenerated,
    /// The completion service reported quota exhaustion; a sentinel row
    /// records the attempt.
    QuotaDeferred,
}

enum PersistOutcome {
    Inserted,
    Duplicate,
}

/// Threshold rule: generate when no analysis has ever been produced
/// (bootstrap), or when at least `batch_size` entries have accumulated
/// past the watermark.
pub fn evaluate_threshold(
    watermark: Option<DateTime<Utc>>,
    new_entries: i64,
    batch_size: i64,
) -> ThresholdDecision {
    match watermark {
        None => ThresholdDecision::Generate,
        Some(_) if new_entries >= batch_size => ThresholdDecision::Generate,
        Some(_) => ThresholdDecision::Defer,
    }
}

/// Deterministic idempotence key for the batch that starts at `watermark`.
pub fn batch_key(watermark: Option<DateTime<Utc>>) -> String {
    match watermark {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Micros, true),
        None => "bootstrap".to_string(),
    }
}

/// Render the ordered batch into the user message for the completion
/// service. Entries must already be in ascending chronological order so the
/// model reads the journal the way it was written. Returns None for an
/// empty batch: there is nothing to send.
pub fn render_batch_prompt(entries: &[JournalEntry]) -> Option<String> {
    if entries.is_empty() {
        return None;
    }

    let mut prompt = String::from(
        "Please analyze these journal entries. Each entry contains the daily \
         sentence the user was given and their response, oldest first:\n",
    );
    for (i, entry) in entries.iter().enumerate() {
        prompt.push_str(&format!(
            "\nEntry {} ({}):\nPrompt: {}\nResponse: {}\n",
            i + 1,
            entry.created_at.format("%Y-%m-%d"),
            entry.daily_sentence,
            entry.content,
        ));
    }
    Some(prompt)
}

/// Watermark read: creation timestamp of the user's most recent analysis.
async fn latest_analysis_at(
    db: &PgPool,
    user_id: Uuid,
) -> Result<Option<DateTime<Utc>>, sqlx::Error> {
    sqlx::query_scalar::<_, DateTime<Utc>>(
        r#"
        SELECT created_at FROM analyses
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT 1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
}

async fn count_entries_since(
    db: &PgPool,
    user_id: Uuid,
    watermark: Option<DateTime<Utc>>,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*) FROM journal_entries
        WHERE user_id = $1
          AND ($2::timestamptz IS NULL OR created_at > $2)
        "#,
    )
    .bind(user_id)
    .bind(watermark)
    .fetch_one(db)
    .await
}

/// Fetch the batch: up to `limit` entries past the watermark, ascending.
async fn fetch_batch(
    db: &PgPool,
    user_id: Uuid,
    watermark: Option<DateTime<Utc>>,
    limit: i64,
) -> Result<Vec<JournalEntry>, sqlx::Error> {
    sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT * FROM journal_entries
        WHERE user_id = $1
          AND ($2::timestamptz IS NULL OR created_at > $2)
        ORDER BY created_at ASC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(watermark)
    .bind(limit)
    .fetch_all(db)
    .await
}

/// Insert-only persistence. The conditional insert on (user_id, batch_key)
/// is what enforces at-most-one-analysis-per-batch under concurrent runs.
#[allow(clippy::too_many_arguments)]
async fn persist_analysis(
    db: &PgPool,
    user_id: Uuid,
    email: &str,
    content: &str,
    kind: AnalysisKind,
    batch_key: &str,
    covers_from: DateTime<Utc>,
    covers_to: DateTime<Utc>,
) -> Result<PersistOutcome, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO analyses (id, user_id, email, content, kind, batch_key, covers_from, covers_to)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (user_id, batch_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(email)
    .bind(content)
    .bind(kind)
    .bind(batch_key)
    .bind(covers_from)
    .bind(covers_to)
    .execute(db)
    .await?;

    if result.rows_affected() == 0 {
        Ok(PersistOutcome::Duplicate)
    } else {
        Ok(PersistOutcome::Inserted)
    }
}

/// Run the full pipeline for one user: threshold, selection, generation,
/// persistence. One response per invocation, no retries.
pub async fn run(
    db: &PgPool,
    completions: &CompletionClient,
    batch_size: i64,
    user_id: Uuid,
    email: &str,
) -> AppResult<AnalysisOutcome> {
    let watermark = latest_analysis_at(db, user_id).await?;
    let new_entries = count_entries_since(db, user_id, watermark).await?;

    tracing::debug!(
        user_id = %user_id,
        ?watermark,
        new_entries,
        "Evaluated analysis threshold"
    );

    if evaluate_threshold(watermark, new_entries, batch_size) == ThresholdDecision::Defer {
        return Ok(AnalysisOutcome::Deferred);
    }

    let batch = fetch_batch(db, user_id, watermark, batch_size).await?;

    let (Some(first), Some(last)) = (batch.first(), batch.last()) else {
        // Bootstrap with an empty journal: nothing to analyze, nothing to
        // persist, and no call to the completion service.
        return Ok(AnalysisOutcome::NoContent);
    };
    let (covers_from, covers_to) = (first.created_at, last.created_at);

    let Some(prompt) = render_batch_prompt(&batch) else {
        return Ok(AnalysisOutcome::NoContent);
    };
    let key = batch_key(watermark);

    match completions.complete(ANALYST_SYSTEM_PROMPT, &prompt).await {
        Ok(text) => {
            let outcome = persist_analysis(
                db,
                user_id,
                email,
                &text,
                AnalysisKind::Generated,
                &key,
                covers_from,
                covers_to,
            )
            .await?;

            match outcome {
                PersistOutcome::Inserted => {
                    tracing::info!(user_id = %user_id, batch_len = batch.len(), "Analysis saved");
                    Ok(AnalysisOutcome::Generated)
                }
                PersistOutcome::Duplicate => {
                    tracing::info!(user_id = %user_id, "Concurrent run already saved this batch");
                    Ok(AnalysisOutcome::AlreadyGenerated)
                }
            }
        }
        Err(CompletionError::QuotaExceeded) => {
            // Record the attempt so downstream consumers can see a
            // generation was deferred, then surface "try later".
            let _ = persist_analysis(
                db,
                user_id,
                email,
                SENTINEL_CONTENT,
                AnalysisKind::Deferred,
                &key,
                covers_from,
                covers_to,
            )
            .await?;
            tracing::warn!(user_id = %user_id, "Completion quota exceeded, analysis deferred");
            Ok(AnalysisOutcome::QuotaDeferred)
        }
        Err(CompletionError::Failed(e)) => Err(AppError::Internal(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_at(ts: DateTime<Utc>, daily_sentence: &str, content: &str) -> JournalEntry {
        JournalEntry {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            content: content.to_string(),
            daily_sentence: daily_sentence.to_string(),
            created_at: ts,
        }
    }

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn test_threshold_bootstrap_always_generates() {
        assert_eq!(evaluate_threshold(None, 0, 3), ThresholdDecision::Generate);
        assert_eq!(evaluate_threshold(None, 1, 3), ThresholdDecision::Generate);
        assert_eq!(evaluate_threshold(None, 100, 3), ThresholdDecision::Generate);
    }

    #[test]
    fn test_threshold_defers_below_batch_size() {
        let wm = Some(ts(0));
        assert_eq!(evaluate_threshold(wm, 0, 3), ThresholdDecision::Defer);
        assert_eq!(evaluate_threshold(wm, 2, 3), ThresholdDecision::Defer);
    }

    #[test]
    fn test_threshold_generates_at_batch_size() {
        let wm = Some(ts(0));
        assert_eq!(evaluate_threshold(wm, 3, 3), ThresholdDecision::Generate);
        assert_eq!(evaluate_threshold(wm, 7, 3), ThresholdDecision::Generate);
    }

    #[test]
    fn test_threshold_respects_configured_batch_size() {
        let wm = Some(ts(0));
        assert_eq!(evaluate_threshold(wm, 4, 5), ThresholdDecision::Defer);
        assert_eq!(evaluate_threshold(wm, 5, 5), ThresholdDecision::Generate);
    }

    #[test]
    fn test_batch_key_bootstrap_is_stable() {
        assert_eq!(batch_key(None), "bootstrap");
    }

    #[test]
    fn test_batch_key_deterministic_and_distinct() {
        let k1 = batch_key(Some(ts(10)));
        let k2 = batch_key(Some(ts(10)));
        let k3 = batch_key(Some(ts(11)));
        assert_eq!(k1, k2);
        assert_ne!(k1, k3);
        assert_ne!(k1, "bootstrap");
    }

    #[test]
    fn test_render_empty_batch_is_none() {
        assert!(render_batch_prompt(&[]).is_none());
    }

    #[test]
    fn test_render_preserves_ascending_order() {
        let entries = vec![
            entry_at(ts(0), "What made you smile?", "the first morning"),
            entry_at(ts(86_400), "What did you let go of?", "an old grudge"),
            entry_at(ts(172_800), "Who do you miss?", "my grandmother"),
        ];

        let prompt = render_batch_prompt(&entries).unwrap();
        let p1 = prompt.find("the first morning").unwrap();
        let p2 = prompt.find("an old grudge").unwrap();
        let p3 = prompt.find("my grandmother").unwrap();
        assert!(p1 < p2 && p2 < p3, "entries must render oldest first");
    }

    #[test]
    fn test_render_includes_prompt_and_response() {
        let entries = vec![entry_at(ts(0), "What made you smile?", "the rain stopped")];
        let prompt = render_batch_prompt(&entries).unwrap();
        assert!(prompt.contains("What made you smile?"));
        assert!(prompt.contains("the rain stopped"));
        assert!(prompt.contains("2023-11-14")); // ts(0) in UTC
    }
}
