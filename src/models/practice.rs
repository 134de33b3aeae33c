use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Practice {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action_taken: String,
    pub reflection: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePracticeRequest {
    #[validate(length(min = 1, message = "Action taken must not be empty"))]
    pub action_taken: String,
    #[validate(length(min = 1, message = "Reflection must not be empty"))]
    pub reflection: String,
}
