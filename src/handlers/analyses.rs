use axum::{extract::State, Extension, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::analysis::Analysis;
use crate::services::analysis::{self, AnalysisOutcome};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RunAnalysisRequest {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

/// Trigger the analysis pipeline. The client calls this after a journal
/// save; the pipeline decides whether a new analysis is due and responds
/// with exactly one outcome.
pub async fn run_analysis(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<RunAnalysisRequest>,
) -> AppResult<Json<Value>> {
    // Both fields are required before any store access.
    let user_id = body
        .user_id
        .ok_or_else(|| AppError::Validation("user_id is required".into()))?;
    let email = body
        .email
        .filter(|e| !e.is_empty())
        .ok_or_else(|| AppError::Validation("email is required".into()))?;

    if user_id != auth_user.id {
        return Err(AppError::Forbidden);
    }

    let outcome = analysis::run(
        &state.db,
        &state.completions,
        state.config.analysis_batch_size,
        user_id,
        &email,
    )
    .await?;

    let message = match outcome {
        AnalysisOutcome::Deferred => "No analysis needed yet",
        AnalysisOutcome::NoContent => "No journal entries to analyze yet",
        AnalysisOutcome::Generated => "Analysis generated and saved successfully",
        AnalysisOutcome::AlreadyGenerated => "Analysis already generated for this batch",
        AnalysisOutcome::QuotaDeferred => return Err(AppError::QuotaExceeded),
    };

    Ok(Json(json!({
        "status": "success",
        "message": message,
    })))
}

pub async fn list_analyses(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Analysis>>> {
    let analyses = sqlx::query_as::<_, Analysis>(
        r#"
        SELECT * FROM analyses
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(analyses))
}
