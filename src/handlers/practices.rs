use axum::{extract::State, Extension, Json};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::practice::{CreatePracticeRequest, Practice};
use crate::AppState;

pub async fn create_practice(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreatePracticeRequest>,
) -> AppResult<Json<Practice>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let practice = sqlx::query_as::<_, Practice>(
        r#"
        INSERT INTO practices (id, user_id, action_taken, reflection)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&body.action_taken)
    .bind(&body.reflection)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(practice))
}

pub async fn list_practices(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Practice>>> {
    let practices = sqlx::query_as::<_, Practice>(
        r#"
        SELECT * FROM practices
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(practices))
}
