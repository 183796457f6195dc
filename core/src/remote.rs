use std::future::Future;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::BrewError;
use crate::methods::method_info;
use crate::models::{Brew, BrewMethod, Suggestion};

pub const SYSTEM_PROMPT: &str = "You are a coffee brewing expert. Provide precise brewing recommendations based on taste feedback and brewing history.";

pub struct SuggestionRequest<'a> {
    /// Recent brews for the method, newest first.
    pub history: &'a [Brew],
    pub method: BrewMethod,
    pub bean_name: &'a str,
}

/// Remote source of next-brew suggestions.
///
/// The CLI implements this with reqwest against a chat-completions endpoint.
/// Implementations only need to report failures; falling back to the local
/// rules is the caller's job.
pub trait SuggestionProvider {
    /// Whether a credential is available. Unconfigured providers are never
    /// called.
    fn is_configured(&self) -> bool;

    fn fetch_suggestion(
        &self,
        request: &SuggestionRequest<'_>,
    ) -> impl Future<Output = Result<Suggestion>>;
}

/// Provider used when no remote service is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRemote;

impl SuggestionProvider for NoRemote {
    fn is_configured(&self) -> bool {
        false
    }

    async fn fetch_suggestion(&self, _request: &SuggestionRequest<'_>) -> Result<Suggestion> {
        Err(BrewError::RemoteSuggestion("no remote suggestion service configured".into()).into())
    }
}

#[must_use]
pub fn build_prompt(request: &SuggestionRequest<'_>) -> String {
    let info = method_info(request.method);
    let history = serde_json::to_string(request.history).unwrap_or_else(|_| "[]".to_string());
    let unit = match info.time_unit {
        crate::methods::TimeUnit::Seconds => "seconds",
        crate::methods::TimeUnit::Minutes => "minutes",
    };
    let mut keys = vec![
        "method",
        "grindSize",
        "ratio",
        "brewTime",
        "waterTempC",
        "explanation",
    ];
    if request.method == BrewMethod::Espresso {
        keys.push("pressureBar");
    }
    format!(
        "Bean: {bean}. Brew method: {key} ({name}). Previous brews, newest first: {history}. \
         Recommend the next brew's grind size (descriptive text), ratio (e.g. {example}), \
         brew time in {unit}, and water temperature in Celsius{pressure}. \
         Explain briefly in simple language why these adjustments are made. \
         Return only JSON with keys: {keys}. The \"method\" key must be \"{key}\".",
        bean = request.bean_name,
        key = request.method.key(),
        name = info.name,
        example = if request.method == BrewMethod::Espresso {
            "2:1"
        } else {
            "15:1"
        },
        pressure = if request.method == BrewMethod::Espresso {
            ", plus pump pressure in bar"
        } else {
            ""
        },
        keys = keys.join(", "),
    )
}

// --- Chat completions wire types ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl<'a> ChatRequest<'a> {
    #[must_use]
    pub fn for_suggestion(model: &'a str, request: &SuggestionRequest<'_>) -> Self {
        ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(request),
                },
            ],
            max_tokens: 300,
            temperature: 0.3,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

/// Suggestion as returned by the model. Every key is optional here so that
/// missing keys are reported together instead of as a parse error.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteSuggestion {
    pub method: Option<String>,
    pub grind_size: Option<serde_json::Value>,
    pub ratio: Option<String>,
    pub brew_time: Option<f64>,
    pub water_temp_c: Option<f64>,
    pub pressure_bar: Option<f64>,
    pub explanation: Option<String>,
}

fn grind_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl RemoteSuggestion {
    /// Check the required keys and convert. `expected` is the method that was
    /// asked for; an answer for a different method is rejected.
    pub fn into_suggestion(self, expected: BrewMethod) -> Result<Suggestion> {
        let grind_size = self.grind_size.and_then(grind_text);
        let ratio = self.ratio.filter(|r| !r.trim().is_empty());
        let explanation = self.explanation.filter(|e| !e.trim().is_empty());

        let mut missing = Vec::new();
        if self.method.is_none() {
            missing.push("method");
        }
        if grind_size.is_none() {
            missing.push("grindSize");
        }
        if ratio.is_none() {
            missing.push("ratio");
        }
        if self.brew_time.is_none() {
            missing.push("brewTime");
        }
        if self.water_temp_c.is_none() {
            missing.push("waterTempC");
        }
        if explanation.is_none() {
            missing.push("explanation");
        }
        if expected == BrewMethod::Espresso && self.pressure_bar.is_none() {
            missing.push("pressureBar");
        }
        if !missing.is_empty() {
            return Err(BrewError::RemoteSuggestion(format!(
                "response is missing required keys: {}",
                missing.join(", ")
            ))
            .into());
        }

        let method_key = self.method.unwrap_or_default();
        let method: BrewMethod = method_key.parse().map_err(|_| {
            BrewError::RemoteSuggestion(format!("response has unknown method '{method_key}'"))
        })?;
        if method != expected {
            return Err(BrewError::RemoteSuggestion(format!(
                "asked for {expected} but got a suggestion for {method}"
            ))
            .into());
        }

        Ok(Suggestion {
            method,
            grind_size: grind_size.unwrap_or_default(),
            ratio: ratio.unwrap_or_default(),
            brew_time: self.brew_time.unwrap_or_default(),
            water_temp_c: self.water_temp_c.unwrap_or_default(),
            pressure_bar: if method == BrewMethod::Espresso {
                self.pressure_bar
            } else {
                None
            },
            explanation: explanation.unwrap_or_default(),
            updated_at: None,
        })
    }
}

/// Strip a surrounding markdown code fence, which chat models like to add.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Parse the JSON text the model produced into a validated suggestion.
pub fn parse_suggestion_content(content: &str, expected: BrewMethod) -> Result<Suggestion> {
    let remote: RemoteSuggestion = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| BrewError::RemoteSuggestion(format!("response is not valid JSON: {e}")))?;
    remote.into_suggestion(expected)
}

pub fn parse_chat_response(response: ChatResponse, expected: BrewMethod) -> Result<Suggestion> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| BrewError::RemoteSuggestion("response has no choices".into()))?;
    parse_suggestion_content(&choice.message.content, expected)
        .context("Failed to read suggestion from chat response")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BrewParams, TasteTag};

    const POUROVER_JSON: &str = r#"{"method":"pourover","grindSize":"medium-fine","ratio":"16:1",
        "brewTime":210,"waterTempC":93,"explanation":"Slightly coarser to cut bitterness."}"#;

    fn remote_error(err: &anyhow::Error) -> bool {
        matches!(
            err.downcast_ref::<BrewError>(),
            Some(BrewError::RemoteSuggestion(_))
        )
    }

    #[test]
    fn test_parse_valid_pourover() {
        let s = parse_suggestion_content(POUROVER_JSON, BrewMethod::Pourover).unwrap();
        assert_eq!(s.method, BrewMethod::Pourover);
        assert_eq!(s.grind_size, "medium-fine");
        assert_eq!(s.ratio, "16:1");
        assert_eq!(s.brew_time, 210.0);
        assert_eq!(s.water_temp_c, 93.0);
        assert!(s.pressure_bar.is_none());
    }

    #[test]
    fn test_parse_strips_code_fence() {
        let fenced = format!("```json\n{POUROVER_JSON}\n```");
        assert!(parse_suggestion_content(&fenced, BrewMethod::Pourover).is_ok());
    }

    #[test]
    fn test_numeric_grind_is_accepted() {
        let json = r#"{"method":"mokapot","grindSize":3,"ratio":"7:1","brewTime":3.5,
            "waterTempC":90,"explanation":"ok"}"#;
        let s = parse_suggestion_content(json, BrewMethod::Mokapot).unwrap();
        assert_eq!(s.grind_size, "3");
    }

    #[test]
    fn test_espresso_requires_pressure() {
        let json = r#"{"method":"espresso","grindSize":"fine","ratio":"2:1","brewTime":28,
            "waterTempC":93,"explanation":"ok"}"#;
        let err = parse_suggestion_content(json, BrewMethod::Espresso).unwrap_err();
        assert!(remote_error(&err));
        assert!(err.to_string().contains("pressureBar"));

        let json = r#"{"method":"espresso","grindSize":"fine","ratio":"2:1","brewTime":28,
            "waterTempC":93,"pressureBar":9,"explanation":"ok"}"#;
        let s = parse_suggestion_content(json, BrewMethod::Espresso).unwrap();
        assert_eq!(s.pressure_bar, Some(9.0));
    }

    #[test]
    fn test_missing_keys_are_listed() {
        let content = r#"{"method":"pourover","ratio":"15:1"}"#;
        let err = parse_suggestion_content(content, BrewMethod::Pourover).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("grindSize"));
        assert!(msg.contains("brewTime"));
        assert!(msg.contains("waterTempC"));
        assert!(msg.contains("explanation"));
        assert!(!msg.contains("pressureBar"));
    }

    #[test]
    fn test_invalid_json() {
        let err = parse_suggestion_content("Sure! Try a finer grind.", BrewMethod::Pourover)
            .unwrap_err();
        assert!(remote_error(&err));
    }

    #[test]
    fn test_method_mismatch_rejected() {
        let err = parse_suggestion_content(POUROVER_JSON, BrewMethod::Frenchpress).unwrap_err();
        assert!(remote_error(&err));
    }

    #[test]
    fn test_parse_chat_response() {
        let response: ChatResponse = serde_json::from_value(serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": POUROVER_JSON } }]
        }))
        .unwrap();
        let s = parse_chat_response(response, BrewMethod::Pourover).unwrap();
        assert_eq!(s.ratio, "16:1");

        let empty = ChatResponse { choices: vec![] };
        assert!(remote_error(
            &parse_chat_response(empty, BrewMethod::Pourover).unwrap_err()
        ));
    }

    #[test]
    fn test_build_prompt_mentions_method_and_history() {
        let brew = Brew {
            id: "1".to_string(),
            bean_id: "b".to_string(),
            method: BrewMethod::Frenchpress,
            params: BrewParams {
                brew_time_min: Some(4.0),
                ..Default::default()
            },
            taste: [TasteTag::TooSour].into_iter().collect(),
            notes: None,
            created_at: String::new(),
        };
        let history = [brew];
        let prompt = build_prompt(&SuggestionRequest {
            history: &history,
            method: BrewMethod::Frenchpress,
            bean_name: "Kenya AA",
        });
        assert!(prompt.contains("Kenya AA"));
        assert!(prompt.contains("frenchpress"));
        assert!(prompt.contains("minutes"));
        assert!(prompt.contains("too_sour"));
        assert!(!prompt.contains("pressureBar"));
    }

    #[test]
    fn test_chat_request_shape() {
        let req = SuggestionRequest {
            history: &[],
            method: BrewMethod::Espresso,
            bean_name: "House",
        };
        let chat = ChatRequest::for_suggestion("gpt-4o-mini", &req);
        let value = serde_json::to_value(&chat).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"][0]["role"], "system");
        assert!(value["messages"][1]["content"]
            .as_str()
            .unwrap()
            .contains("pressureBar"));
    }
}
