use std::env;

pub const DEMO_KEY: &str = "DEMO_KEY";

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// `None` runs the service in demo mode with placeholder images.
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub log_level: String,
    pub gemini: GeminiConfig,
    pub placeholder_image_base: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            log_level: "info".into(),
            gemini: GeminiConfig {
                api_key: None,
                base_url: "https://generativelanguage.googleapis.com/v1beta".into(),
                image_model: "gemini-2.5-flash-image-preview".into(),
            },
            placeholder_image_base: "https://ai-generated-images.example.com".into(),
        }
    }
}

impl AppConfig {
    /// Reads the process environment (call `dotenv` first if a `.env` file should apply).
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let api_key = lookup("GEMINI_API_KEY")
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != DEMO_KEY);
        Self {
            port: lookup("PORT").and_then(|v| v.parse().ok()).unwrap_or(defaults.port),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            gemini: GeminiConfig {
                api_key,
                base_url: lookup("GEMINI_API_BASE").unwrap_or(defaults.gemini.base_url),
                image_model: lookup("GEMINI_IMAGE_MODEL").unwrap_or(defaults.gemini.image_model),
            },
            placeholder_image_base: lookup("PLACEHOLDER_IMAGE_BASE").unwrap_or(defaults.placeholder_image_base),
        }
    }
}
