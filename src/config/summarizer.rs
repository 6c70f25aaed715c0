// src/config/summarizer.rs
use serde::{Deserialize, Serialize};
use std::env;

fn default_provider() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_api_key() -> String {
    "ENV".to_string()
}
fn default_db_path() -> String {
    "data/summaries.sqlite3".to_string()
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// "openai" | "mock" (case-insensitive)
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// "ENV" means: read from OPENAI_API_KEY
    #[serde(default = "default_api_key")]
    pub api_key: String,
    /// SQLite file for the summary cache; ":memory:" keeps it in-process.
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default = "default_true")]
    pub dedup_in_flight: bool,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            model: default_model(),
            api_key: default_api_key(),
            db_path: default_db_path(),
            dedup_in_flight: true,
        }
    }
}

impl SummarizerConfig {
    /// Lowercase the provider and resolve an "ENV" key. A missing key is not an
    /// error here: the generator refuses to run without one.
    pub fn resolve(mut self) -> Self {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "openai" => env::var("OPENAI_API_KEY").unwrap_or_default(),
                _ => String::new(),
            };
        }
        if self.model.trim().is_empty() {
            self.model = default_model();
        }
        if self.db_path.trim().is_empty() {
            self.db_path = default_db_path();
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[serial_test::serial]
    #[test]
    fn env_key_is_resolved_from_environment() {
        env::set_var("OPENAI_API_KEY", "sk-test");
        let cfg = SummarizerConfig {
            provider: " OpenAI ".into(),
            ..Default::default()
        }
        .resolve();
        assert_eq!(cfg.provider, "openai");
        assert_eq!(cfg.api_key, "sk-test");
        env::remove_var("OPENAI_API_KEY");

        let cfg = SummarizerConfig::default().resolve();
        assert!(!cfg.has_api_key());
    }

    #[test]
    fn literal_key_is_kept() {
        let cfg = SummarizerConfig {
            api_key: "sk-literal".into(),
            ..Default::default()
        }
        .resolve();
        assert_eq!(cfg.api_key, "sk-literal");
    }
}
