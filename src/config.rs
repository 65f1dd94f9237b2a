use anyhow::Context;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Which persistence backend the stores run on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres { database_url: String },
    Memory,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub jwt: JwtConfig,
    /// Allowed cross-origin client; `None` means permissive CORS.
    pub client_url: Option<String>,
    /// Trim and lowercase emails before they reach the credential store.
    pub normalize_email: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match std::env::var("APP_STORE")
            .unwrap_or_else(|_| "postgres".into())
            .as_str()
        {
            "memory" => StoreBackend::Memory,
            "postgres" => StoreBackend::Postgres {
                database_url: std::env::var("DATABASE_URL").context("DATABASE_URL is not set")?,
            },
            other => anyhow::bail!("unknown APP_STORE `{other}` (expected postgres or memory)"),
        };
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "hiring-history".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "hiring-history-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let client_url = std::env::var("CLIENT_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let normalize_email = std::env::var("AUTH_NORMALIZE_EMAIL")
            .map(|v| matches!(v.as_str(), "true" | "1" | "yes"))
            .unwrap_or(false);
        Ok(Self {
            store,
            jwt,
            client_url,
            normalize_email,
        })
    }
}
