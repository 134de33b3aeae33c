//! Best-effort milestone notification.
//!
//! When a user's journal first reaches the milestone entry count, an email
//! digest of those entries goes out through Resend. This is the one path
//! where errors are logged and swallowed: a failed email must never block
//! or fail the journal write that triggered it.

use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::models::entry::JournalEntry;

const RESEND_EMAILS_URL: &str = "https://api.resend.com/emails";

/// Fire the milestone email as a detached task. Returns immediately.
pub fn spawn_milestone_notification(db: PgPool, config: std::sync::Arc<Config>, user_id: Uuid) {
    tokio::spawn(async move {
        if let Err(e) = send_milestone_email(&db, &config, user_id).await {
            tracing::warn!(user_id = %user_id, error = %e, "Milestone email failed");
        }
    });
}

async fn send_milestone_email(
    db: &PgPool,
    config: &Config,
    user_id: Uuid,
) -> Result<(), anyhow::Error> {
    if config.resend_api_key.is_empty() || config.milestone_notify_to.is_empty() {
        tracing::debug!("Milestone email not configured, skipping");
        return Ok(());
    }

    let email = sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    let entries = sqlx::query_as::<_, JournalEntry>(
        r#"
        SELECT * FROM journal_entries
        WHERE user_id = $1
        ORDER BY created_at ASC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(config.milestone_entry_count)
    .fetch_all(db)
    .await?;

    let body = render_milestone_html(&email, &entries);

    let response = reqwest::Client::new()
        .post(RESEND_EMAILS_URL)
        .bearer_auth(&config.resend_api_key)
        .json(&serde_json::json!({
            "from": "Love Journey <onboarding@resend.dev>",
            "to": [config.milestone_notify_to],
            "subject": format!(
                "New journal milestone: {} has written {} entries!",
                email, entries.len()
            ),
            "html": body,
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        anyhow::bail!("Email provider returned {}", response.status());
    }

    tracing::info!(user_id = %user_id, entries = entries.len(), "Milestone email sent");
    Ok(())
}

fn render_milestone_html(email: &str, entries: &[JournalEntry]) -> String {
    let mut html = format!(
        "<h2>User Milestone Reached</h2>\
         <p>User {} has written their first {} journal entries!</p>\
         <h3>Journal Entries:</h3>",
        email,
        entries.len()
    );
    for (i, entry) in entries.iter().enumerate() {
        html.push_str(&format!(
            "<div style=\"margin-bottom: 20px;\">\
             <h4>Entry {} ({})</h4>\
             <p>{}</p>\
             </div>",
            i + 1,
            entry.created_at.format("%Y-%m-%d"),
            entry.content,
        ));
    }
    html
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_milestone_html_lists_entries_in_order() {
        let entries: Vec<JournalEntry> = (0..3)
            .map(|i| JournalEntry {
                id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                content: format!("entry number {}", i),
                daily_sentence: "prompt".into(),
                created_at: Utc.timestamp_opt(1_700_000_000 + i * 86_400, 0).unwrap(),
            })
            .collect();

        let html = render_milestone_html("user@example.com", &entries);
        assert!(html.contains("user@example.com"));
        let p0 = html.find("entry number 0").unwrap();
        let p2 = html.find("entry number 2").unwrap();
        assert!(p0 < p2);
        assert!(html.contains("Entry 1"));
        assert!(html.contains("Entry 3"));
    }
}
