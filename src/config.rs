use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub frontend_url: String,
    /// Extra allowed CORS origins beyond the frontend URL (dev/LAN access).
    pub cors_extra_origins: Vec<String>,

    pub jwt_secret: String,
    pub jwt_access_ttl_secs: i64,
    pub jwt_refresh_ttl_secs: i64,

    pub openai_api_key: String,
    pub openai_model: String,
    pub completion_timeout_secs: u64,

    /// How many unanalyzed entries must accumulate before a new analysis
    /// is generated. A user's first analysis ignores this threshold.
    pub analysis_batch_size: i64,

    pub resend_api_key: String,
    pub milestone_notify_to: String,
    pub milestone_entry_count: i64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()
                .expect("PORT must be a number"),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            cors_extra_origins: parse_origin_list(
                &env::var("CORS_EXTRA_ORIGINS").unwrap_or_default(),
            ),

            jwt_secret: env::var("JWT_SECRET").expect("JWT_SECRET must be set"),
            jwt_access_ttl_secs: env::var("JWT_ACCESS_TTL_SECS")
                .unwrap_or_else(|_| "900".into())
                .parse()
                .expect("JWT_ACCESS_TTL_SECS must be a number"),
            jwt_refresh_ttl_secs: env::var("JWT_REFRESH_TTL_SECS")
                .unwrap_or_else(|_| "604800".into())
                .parse()
                .expect("JWT_REFRESH_TTL_SECS must be a number"),

            openai_api_key: env::var("OPENAI_API_KEY").unwrap_or_else(|_| String::new()),
            openai_model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into()),
            completion_timeout_secs: env::var("COMPLETION_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".into())
                .parse()
                .expect("COMPLETION_TIMEOUT_SECS must be a number"),

            analysis_batch_size: require_positive(
                env::var("ANALYSIS_BATCH_SIZE")
                    .unwrap_or_else(|_| "3".into())
                    .parse()
                    .expect("ANALYSIS_BATCH_SIZE must be a number"),
                "ANALYSIS_BATCH_SIZE",
            ),

            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_else(|_| String::new()),
            milestone_notify_to: env::var("MILESTONE_NOTIFY_TO")
                .unwrap_or_else(|_| String::new()),
            milestone_entry_count: require_positive(
                env::var("MILESTONE_ENTRY_COUNT")
                    .unwrap_or_else(|_| "5".into())
                    .parse()
                    .expect("MILESTONE_ENTRY_COUNT must be a number"),
                "MILESTONE_ENTRY_COUNT",
            ),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Split a comma-separated origin list, dropping empty segments.
fn parse_origin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// A threshold of zero or less would make every pipeline run generate;
/// refuse to start rather than silently misbehave.
fn require_positive(value: i64, name: &str) -> i64 {
    if value <= 0 {
        panic!("{} must be positive, got {}", name, value);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_origin_list_splits_and_trims() {
        let origins = parse_origin_list("http://localhost:5173, http://192.168.1.5:3000");
        assert_eq!(
            origins,
            vec!["http://localhost:5173", "http://192.168.1.5:3000"]
        );
    }

    #[test]
    fn test_parse_origin_list_handles_empty() {
        assert!(parse_origin_list("").is_empty());
        assert!(parse_origin_list(" , ,").is_empty());
    }

    #[test]
    fn test_require_positive_passes_through() {
        assert_eq!(require_positive(3, "ANALYSIS_BATCH_SIZE"), 3);
    }

    #[test]
    #[should_panic(expected = "ANALYSIS_BATCH_SIZE must be positive")]
    fn test_require_positive_rejects_zero() {
        require_positive(0, "ANALYSIS_BATCH_SIZE");
    }

    #[test]
    #[should_panic(expected = "MILESTONE_ENTRY_COUNT must be positive")]
    fn test_require_positive_rejects_negative() {
        require_positive(-1, "MILESTONE_ENTRY_COUNT");
    }
}
