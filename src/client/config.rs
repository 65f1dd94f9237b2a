/// Where the client finds the history backend and the AI service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub ai_base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".into(),
            ai_base_url: "http://localhost:8000".into(),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            ai_base_url: std::env::var("AI_BASE_URL").unwrap_or(defaults.ai_base_url),
        }
    }
}
