use secrecy::Secret;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,

    // Transactional email API (optional: absent means emails are skipped)
    pub email_api_url: Option<String>,
    pub email_api_key: Option<Secret<String>>,

    // Shared secret presented by the external cron that drives batch jobs
    pub internal_job_token: Secret<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if it exists (for local development)
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(Self {
            database_url: config.get("database_url")?,
            host: config.get("host").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: config.get("port")?,

            email_api_url: config.get("email_api_url").ok(),
            email_api_key: config
                .get::<String>("email_api_key")
                .ok()
                .map(Secret::new),

            internal_job_token: Secret::new(config.get("internal_job_token")?),
        })
    }
}
