//! Blocking client for an OpenAI-compatible chat-completions endpoint (Groq by default).

use std::fmt::{Debug, Formatter};

use serde_json::{json, Value};

use crate::{DelegateError, Prompt, TextGenerator};

pub const DEFAULT_ENDPOINT: &str = "https://api.groq.com/openai/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

pub const API_KEY_VAR: &str = "GROQ_API_KEY";
pub const MODEL_VAR: &str = "CARBON_LEDGER_MODEL";
pub const TEMPERATURE_VAR: &str = "CARBON_LEDGER_TEMPERATURE";
pub const ENDPOINT_VAR: &str = "CARBON_LEDGER_LLM_ENDPOINT";

const MAX_ERROR_DETAIL_CHARS: usize = 512;

#[derive(Clone, PartialEq)]
pub struct GroqConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f64,
    pub endpoint: String,
}

impl Debug for GroqConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|raw| raw.trim().to_string()).filter(|raw| !raw.is_empty())
}

impl GroqConfig {
    /// Read the client configuration from process environment variables.
    ///
    /// # Errors
    /// Returns [`DelegateError::MissingApiKey`] when no key is set and
    /// [`DelegateError::Config`] for an unusable temperature.
    pub fn from_env() -> Result<Self, DelegateError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DelegateError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = non_blank(lookup(API_KEY_VAR)).ok_or(DelegateError::MissingApiKey)?;
        let model = non_blank(lookup(MODEL_VAR)).unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let endpoint =
            non_blank(lookup(ENDPOINT_VAR)).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let temperature = match non_blank(lookup(TEMPERATURE_VAR)) {
            None => DEFAULT_TEMPERATURE,
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|value| (0.0..=2.0).contains(value))
                .ok_or_else(|| {
                    DelegateError::Config(format!(
                        "{TEMPERATURE_VAR} MUST be a number between 0 and 2, got {raw}"
                    ))
                })?,
        };

        Ok(Self { api_key, model, temperature, endpoint })
    }
}

pub struct GroqClient {
    agent: ureq::Agent,
    config: GroqConfig,
}

impl GroqClient {
    #[must_use]
    pub fn new(config: GroqConfig) -> Self {
        Self { agent: ureq::AgentBuilder::new().build(), config }
    }

    /// # Errors
    /// Returns the configuration error from [`GroqConfig::from_env`].
    pub fn from_env() -> Result<Self, DelegateError> {
        Ok(Self::new(GroqConfig::from_env()?))
    }

    #[must_use]
    pub fn config(&self) -> &GroqConfig {
        &self.config
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
        })
    }
}

impl Debug for GroqClient {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroqClient").field("config", &self.config).finish_non_exhaustive()
    }
}

impl TextGenerator for GroqClient {
    fn generate(&self, prompt: &Prompt) -> Result<String, DelegateError> {
        tracing::debug!(
            endpoint = %self.config.endpoint,
            model = %self.config.model,
            "sending chat completion request"
        );

        let response = self
            .agent
            .post(&self.config.endpoint)
            .set("Authorization", &format!("Bearer {}", self.config.api_key))
            .send_json(self.request_body(prompt));

        match response {
            Ok(response) => {
                let body: Value = response.into_json().map_err(|err| {
                    DelegateError::Response(format!("failed to decode completion body: {err}"))
                })?;
                extract_completion_text(&body)
            }
            Err(ureq::Error::Status(code, response)) => {
                let detail = response.into_string().unwrap_or_default();
                Err(classify_status(code, &detail))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(DelegateError::Network(transport.to_string()))
            }
        }
    }
}

/// Map a non-success HTTP status to the matching delegate failure.
#[must_use]
pub fn classify_status(code: u16, detail: &str) -> DelegateError {
    let detail = detail.trim().chars().take(MAX_ERROR_DETAIL_CHARS).collect::<String>();
    let message =
        if detail.is_empty() { format!("HTTP {code}") } else { format!("HTTP {code}: {detail}") };
    match code {
        401 | 403 => DelegateError::Auth(message),
        429 => DelegateError::RateLimited(message),
        _ => DelegateError::Response(message),
    }
}

/// Pull the first choice's message content out of a chat-completions body.
///
/// # Errors
/// Returns [`DelegateError::Response`] when the body has no textual content.
pub fn extract_completion_text(body: &Value) -> Result<String, DelegateError> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(ToString::to_string)
        .ok_or_else(|| {
            DelegateError::Response("completion body carried no message content".to_string())
        })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect::<BTreeMap<_, _>>();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn missing_or_blank_key_is_reported() {
        assert_eq!(GroqConfig::from_lookup(lookup_from(&[])), Err(DelegateError::MissingApiKey));
        assert_eq!(
            GroqConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "   ")])),
            Err(DelegateError::MissingApiKey)
        );
    }

    #[test]
    fn defaults_apply_when_only_key_is_set() {
        let config = match GroqConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "gsk_test")])) {
            Ok(config) => config,
            Err(err) => panic!("config should load: {err}"),
        };

        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert!(!format!("{config:?}").contains("gsk_test"));
    }

    #[test]
    fn overrides_and_bad_temperature() {
        let config = GroqConfig::from_lookup(lookup_from(&[
            (API_KEY_VAR, "k"),
            (MODEL_VAR, "llama-3.1-8b-instant"),
            (TEMPERATURE_VAR, "0.2"),
            (ENDPOINT_VAR, "http://127.0.0.1:9/v1/chat/completions"),
        ]));
        assert!(matches!(
            config,
            Ok(ref c) if c.model == "llama-3.1-8b-instant" && c.temperature == 0.2
        ));

        let bad =
            GroqConfig::from_lookup(lookup_from(&[(API_KEY_VAR, "k"), (TEMPERATURE_VAR, "hot")]));
        assert!(matches!(bad, Err(DelegateError::Config(_))));
    }

    #[test]
    fn status_codes_map_to_failure_kinds() {
        assert!(matches!(classify_status(401, "bad key"), DelegateError::Auth(_)));
        assert!(matches!(classify_status(403, ""), DelegateError::Auth(_)));
        assert_eq!(
            classify_status(429, " slow down "),
            DelegateError::RateLimited("HTTP 429: slow down".into())
        );
        assert_eq!(classify_status(500, ""), DelegateError::Response("HTTP 500".into()));
    }

    #[test]
    fn completion_text_is_extracted_verbatim() {
        let body = json!({
            "choices": [{"message": {"role": "assistant", "content": "Use solar.\n"}}]
        });
        assert_eq!(extract_completion_text(&body), Ok("Use solar.\n".to_string()));

        let empty = json!({"choices": []});
        assert!(matches!(extract_completion_text(&empty), Err(DelegateError::Response(_))));
    }

    #[test]
    fn unreachable_endpoint_is_a_network_error() {
        let client = GroqClient::new(GroqConfig {
            api_key: "k".into(),
            model: DEFAULT_MODEL.into(),
            temperature: DEFAULT_TEMPERATURE,
            endpoint: "http://127.0.0.1:9/v1/chat/completions".into(),
        });
        let prompt = Prompt { system: "s".into(), user: "u".into() };

        assert!(matches!(client.generate(&prompt), Err(DelegateError::Network(_))));
    }
}
