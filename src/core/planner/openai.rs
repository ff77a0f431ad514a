use anyhow::{Result, anyhow};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{PlanGenerator, PlanPrompt};
use crate::core::config::PlannerConfig;
use crate::core::registry::SettingsSource;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Plan generator backed by any OpenAI-compatible chat completions endpoint.
pub struct ChatCompletionsPlanner {
    config: PlannerConfig,
    api_key: String,
    client: Client,
}

impl ChatCompletionsPlanner {
    pub fn new(config: PlannerConfig, api_key: String) -> Self {
        Self {
            config,
            api_key,
            client: Client::new(),
        }
    }

    /// Reads the API key from the setting named by `config.api_key_env`.
    pub fn from_settings(config: PlannerConfig, settings: &dyn SettingsSource) -> Result<Self> {
        let api_key = settings
            .get(&config.api_key_env)
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                anyhow!(
                    "No API key for the plan generator. Set {} in the environment.",
                    config.api_key_env
                )
            })?;
        Ok(Self::new(config, api_key))
    }

    fn request_body<'a>(&'a self, prompt: &'a PlanPrompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        }
    }
}

#[async_trait]
impl PlanGenerator for ChatCompletionsPlanner {
    async fn generate(&self, prompt: &PlanPrompt) -> Result<String> {
        let res = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body(prompt))
            .send()
            .await?;

        if !res.status().is_success() {
            return Err(anyhow!(
                "Plan generator API error ({}): {}",
                res.status(),
                res.text().await.unwrap_or_default()
            ));
        }

        let parsed: ChatResponse = res.json().await?;
        first_content(parsed).ok_or_else(|| anyhow!("Plan generator returned no content"))
    }
}

fn first_content(response: ChatResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn prompt() -> PlanPrompt {
        PlanPrompt {
            system: "sys".to_string(),
            user: "question".to_string(),
        }
    }

    #[test]
    fn request_carries_model_sampling_and_both_messages() {
        let planner = ChatCompletionsPlanner::new(PlannerConfig::default(), "k".to_string());
        let prompt = prompt();
        let body = serde_json::to_value(planner.request_body(&prompt)).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 2000);
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "question");
    }

    #[test]
    fn first_choice_content_is_trimmed() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "  [] \n"}}, {"message": {"content": "x"}}]}"#,
        )
        .unwrap();
        assert_eq!(first_content(response).as_deref(), Some("[]"));
    }

    #[test]
    fn missing_or_blank_content_is_none() {
        let response: ChatResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert!(first_content(response).is_none());
        let response: ChatResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(first_content(response).is_none());
    }

    #[test]
    fn api_key_comes_from_settings() {
        let mut settings: HashMap<String, String> = HashMap::new();
        assert!(ChatCompletionsPlanner::from_settings(PlannerConfig::default(), &settings).is_err());
        settings.insert("GITHUB_TOKEN".to_string(), "secret".to_string());
        let planner =
            ChatCompletionsPlanner::from_settings(PlannerConfig::default(), &settings).unwrap();
        assert_eq!(planner.api_key, "secret");
    }
}
