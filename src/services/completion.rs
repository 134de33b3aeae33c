use reqwest::StatusCode;
use serde_json::Value;

use crate::config::Config;

const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Outcome classification for a completion request. Quota exhaustion is an
/// expected, recoverable condition and must stay distinguishable from every
/// other failure so callers can answer "try again later" instead of "broken".
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Completion quota exceeded")]
    QuotaExceeded,

    #[error("Completion request failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Thin client over the OpenAI chat-completions API. One synchronous
/// request/response per call, bounded by a request timeout; no retries here.
#[derive(Clone)]
pub struct CompletionClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.completion_timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            api_key: config.openai_api_key.clone(),
            model: config.openai_model.clone(),
        }
    }

    /// Submit a system + user message pair, returning the generated text.
    pub async fn complete(&self, system: &str, user: &str) -> Result<String, CompletionError> {
        let response = self
            .http
            .post(OPENAI_CHAT_COMPLETIONS_URL)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ],
                "temperature": 0.7,
                "max_tokens": 1000
            }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Completion request error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_api_error(status, &body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Malformed completion response: {}", e))?;

        let text = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("Completion response missing message content"))?;

        Ok(text.to_string())
    }
}

/// Classify a non-2xx completion-service response. The quota signal is the
/// `insufficient_quota` error code in the response body; everything else is
/// a generic failure.
fn classify_api_error(status: StatusCode, body: &str) -> CompletionError {
    let code = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["code"].as_str().map(str::to_string));

    if code.as_deref() == Some("insufficient_quota") {
        return CompletionError::QuotaExceeded;
    }

    CompletionError::Failed(anyhow::anyhow!(
        "Completion API error {}: {}",
        status,
        body
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_error_classified() {
        let body = r#"{"error":{"message":"You exceeded your current quota","type":"insufficient_quota","code":"insufficient_quota"}}"#;
        let err = classify_api_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, CompletionError::QuotaExceeded));
    }

    #[test]
    fn test_rate_limit_without_quota_code_is_generic() {
        let body = r#"{"error":{"message":"Rate limit reached","type":"requests","code":"rate_limit_exceeded"}}"#;
        let err = classify_api_error(StatusCode::TOO_MANY_REQUESTS, body);
        assert!(matches!(err, CompletionError::Failed(_)));
    }

    #[test]
    fn test_server_error_is_generic() {
        let err = classify_api_error(StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded");
        assert!(matches!(err, CompletionError::Failed(_)));
    }

    #[test]
    fn test_unparseable_body_is_generic() {
        let err = classify_api_error(StatusCode::BAD_GATEWAY, "<html>502</html>");
        assert!(matches!(err, CompletionError::Failed(_)));
    }
}
