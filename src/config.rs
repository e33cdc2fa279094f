//! Service configuration, built from environment variables.

/// Runtime configuration for the Guestpitch service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Path to the local database file.
    pub db_path: String,
    /// Port for the REST API server.
    pub port: u16,
    /// Maximum number of follow-ups allowed per show.
    pub max_followups: u32,
    /// Days before a referral attribution record expires.
    pub attribution_ttl_days: i64,
    /// Default sender name for template rendering (`{{your_name}}`).
    pub sender_name: Option<String>,
    /// Address stamped on outbound messages.
    pub sender_email: Option<String>,
    /// Default sender title for template rendering (`{{your_title}}`).
    pub sender_title: Option<String>,
    /// Default sender link for template rendering (`{{your_main_link}}`).
    pub sender_main_link: Option<String>,
}

impl AppConfig {
    /// Build config from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let db_path = std::env::var("GUESTPITCH_DB_PATH")
            .unwrap_or_else(|_| "./data/guestpitch.db".to_string());

        let port: u16 = std::env::var("GUESTPITCH_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8080);

        let max_followups: u32 = std::env::var("GUESTPITCH_MAX_FOLLOWUPS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3);

        let attribution_ttl_days: i64 = std::env::var("GUESTPITCH_ATTRIBUTION_TTL_DAYS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let sender_name = std::env::var("GUESTPITCH_SENDER_NAME").ok();
        let sender_email = std::env::var("GUESTPITCH_SENDER_EMAIL").ok();
        let sender_title = std::env::var("GUESTPITCH_SENDER_TITLE").ok();
        let sender_main_link = std::env::var("GUESTPITCH_SENDER_MAIN_LINK").ok();

        Self {
            db_path,
            port,
            max_followups,
            attribution_ttl_days,
            sender_name,
            sender_email,
            sender_title,
            sender_main_link,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "./data/guestpitch.db".to_string(),
            port: 8080,
            max_followups: 3,
            attribution_ttl_days: 30,
            sender_name: None,
            sender_email: None,
            sender_title: None,
            sender_main_link: None,
        }
    }
}
