use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One generated reflection-on-reflections. Append-only: rows are never
/// updated, and each row covers a distinct batch of journal entries
/// identified by `covers_from`..`covers_to` and the idempotence `batch_key`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Analysis {
    pub id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub content: String,
    pub kind: AnalysisKind,
    #[serde(skip_serializing)]
    pub batch_key: String,
    pub covers_from: Option<DateTime<Utc>>,
    pub covers_to: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::Type, PartialEq)]
#[sqlx(type_name = "analysis_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AnalysisKind {
    /// Real generated content from the completion service.
    Generated,
    /// Sentinel written when generation was deferred by a quota error.
    Deferred,
}
