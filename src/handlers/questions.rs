use axum::{extract::State, Extension, Json};
use uuid::Uuid;
use validator::Validate;

use crate::auth::middleware::AuthUser;
use crate::error::{AppError, AppResult};
use crate::models::question::{CreateQuestionRequest, Question};
use crate::services::completion::CompletionClient;
use crate::AppState;

const INTERPRETER_SYSTEM_PROMPT: &str = "\
You are the Love Journey tarot interpreter. The user asks a question about \
their relationships; answer with a short themed reading: name the card that \
speaks to their question, what it reveals, and one gentle suggestion. Keep \
it under 200 words and never present the reading as certainty.";

/// Stores the question and detaches the themed interpretation. The caller
/// gets the row back immediately; the interpretation column fills in later.
pub async fn create_question(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(body): Json<CreateQuestionRequest>,
) -> AppResult<Json<Question>> {
    body.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let question = sqlx::query_as::<_, Question>(
        r#"
        INSERT INTO questions (id, user_id, content)
        VALUES ($1, $2, $3)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.id)
    .bind(&body.content)
    .fetch_one(&state.db)
    .await?;

    spawn_interpretation(
        state.db.clone(),
        state.completions.clone(),
        question.id,
        body.content,
    );

    Ok(Json(question))
}

pub async fn list_questions(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> AppResult<Json<Vec<Question>>> {
    let questions = sqlx::query_as::<_, Question>(
        r#"
        SELECT * FROM questions
        WHERE user_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(auth_user.id)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(questions))
}

/// Best-effort: quota or failure leaves interpretation NULL, to be picked
/// up when the user asks again. Never surfaces to the submitting request.
fn spawn_interpretation(
    db: sqlx::PgPool,
    completions: CompletionClient,
    question_id: Uuid,
    content: String,
) {
    tokio::spawn(async move {
        match completions.complete(INTERPRETER_SYSTEM_PROMPT, &content).await {
            Ok(text) => {
                let result = sqlx::query(
                    r#"
                    UPDATE questions
                    SET interpretation = $2, interpreted_at = NOW()
                    WHERE id = $1 AND interpretation IS NULL
                    "#,
                )
                .bind(question_id)
                .bind(&text)
                .execute(&db)
                .await;

                if let Err(e) = result {
                    tracing::warn!(question_id = %question_id, error = %e, "Failed to store interpretation");
                }
            }
            Err(e) => {
                tracing::warn!(question_id = %question_id, error = %e, "Interpretation unavailable");
            }
        }
    });
}
