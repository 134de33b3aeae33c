use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// The rotating journal prompt for a given calendar date.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DailySentence {
    pub id: Uuid,
    pub content: String,
    pub active_date: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct DailySentenceQuery {
    pub date: Option<NaiveDate>,
}
