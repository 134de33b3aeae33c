use axum::{
    extract::{Query, State},
    Json,
};
use chrono::Utc;

use crate::error::{AppError, AppResult};
use crate::models::daily_sentence::{DailySentence, DailySentenceQuery};
use crate::AppState;

/// The journal prompt scheduled for the given date (caller-local date sent
/// by the client; defaults to the current UTC date).
pub async fn get_daily_sentence(
    State(state): State<AppState>,
    Query(query): Query<DailySentenceQuery>,
) -> AppResult<Json<DailySentence>> {
    let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

    let sentence = sqlx::query_as::<_, DailySentence>(
        "SELECT * FROM daily_sentences WHERE active_date = $1",
    )
    .bind(date)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("No daily sentence scheduled for {}", date)))?;

    Ok(Json(sentence))
}
