//! Collaborator configuration from the environment.

use std::env;

const BASE_URL_VAR: &str = "MARGINALIA_AI_BASE_URL";
const API_KEY_VAR: &str = "MARGINALIA_AI_API_KEY";
const MODEL_VAR: &str = "MARGINALIA_AI_MODEL";
const IMAGE_MODEL_VAR: &str = "MARGINALIA_AI_IMAGE_MODEL";

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Connection settings for [`crate::GeminiClient`].
///
/// Everything except the API key has a working default; without a key the
/// client cannot be built and callers fall back to [`crate::Unconfigured`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub image_model: String,
}

impl AiConfig {
    /// Read `MARGINALIA_AI_*` variables, filling defaults for anything unset.
    pub fn from_env() -> Self {
        Self {
            base_url: var_or(BASE_URL_VAR, DEFAULT_BASE_URL),
            api_key: env::var(API_KEY_VAR).ok().filter(|key| !key.is_empty()),
            model: var_or(MODEL_VAR, DEFAULT_MODEL),
            image_model: var_or(IMAGE_MODEL_VAR, DEFAULT_IMAGE_MODEL),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: None,
            model: DEFAULT_MODEL.to_owned(),
            image_model: DEFAULT_IMAGE_MODEL.to_owned(),
        }
    }
}

fn var_or(name: &str, default: &str) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default.to_owned(),
    }
}
