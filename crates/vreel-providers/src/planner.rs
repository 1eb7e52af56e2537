//! Video plan generation via an OpenAI-compatible chat API.
//!
//! Planning runs in two passes: a creator drafts the plan, then a critic
//! model refines it. The critic is advisory; when it fails or returns an
//! invalid plan, the draft ships as-is.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

use reqwest::Client;
use schemars::schema_for;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use vreel_models::VideoPlan;

use crate::error::{ProviderError, ProviderResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

const PROVIDER: &str = "planner";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
/// Total creator attempts = retries + 1.
const DRAFT_RETRIES: u32 = 2;
const CREATOR_TEMPERATURE: f32 = 0.8;
const CRITIC_TEMPERATURE: f32 = 0.4;

/// Client for the planning model.
pub struct PlannerClient {
    api_key: String,
    client: Client,
    base_url: String,
    creator_model: String,
    critic_model: String,
}

/// Both passes of a planning run. `refined` equals `draft` when the
/// critic pass was skipped or failed.
#[derive(Debug)]
pub struct PlanDrafts {
    pub draft: VideoPlan,
    pub refined: VideoPlan,
    pub was_refined: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    response_format: ResponseFormat,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

impl PlannerClient {
    /// Create a planner client.
    pub fn new(
        api_key: impl Into<String>,
        client: Client,
        creator_model: impl Into<String>,
        critic_model: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            creator_model: creator_model.into(),
            critic_model: critic_model.into(),
        }
    }

    /// Point the client at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Generate a validated plan for `topic`, refining it with the critic.
    pub async fn generate_plan(&self, topic: &str, persona: &str) -> ProviderResult<PlanDrafts> {
        let draft = self.draft_plan(topic, persona).await?;
        info!(
            title = %draft.video_title,
            segments = draft.segments.len(),
            "Draft plan accepted"
        );

        match self.refine_plan(topic, persona, &draft).await {
            Ok(refined) => {
                info!(title = %refined.video_title, "Critic pass accepted");
                Ok(PlanDrafts {
                    draft,
                    refined,
                    was_refined: true,
                })
            }
            Err(err) => {
                warn!(error = %err, "Critic pass failed, shipping the draft");
                Ok(PlanDrafts {
                    refined: draft.clone(),
                    draft,
                    was_refined: false,
                })
            }
        }
    }

    async fn draft_plan(&self, topic: &str, persona: &str) -> ProviderResult<VideoPlan> {
        let config = RetryConfig::new("planner_draft").with_max_retries(DRAFT_RETRIES);
        let system = creator_system_prompt(persona);
        let attempts = AtomicU32::new(0);

        retry_async(&config, || {
            if attempts.fetch_add(1, Ordering::SeqCst) > 0 {
                metrics::record_retry(PROVIDER, "draft");
            }
            async {
                let content = self
                    .chat_json(&self.creator_model, &system, topic, CREATOR_TEMPERATURE, "draft")
                    .await?;
                Ok(VideoPlan::from_json(strip_code_fences(&content))?)
            }
        })
        .await
    }

    async fn refine_plan(
        &self,
        topic: &str,
        persona: &str,
        draft: &VideoPlan,
    ) -> ProviderResult<VideoPlan> {
        let system = critic_system_prompt(persona);
        let user = format!(
            "Topic: {topic}\n\nDraft plan:\n{}\n\n\
             Tighten the hook, fix pacing, and sharpen the visual search queries. \
             Return the improved plan as a complete JSON object.",
            draft.to_json_pretty()?,
        );

        let content = self
            .chat_json(&self.critic_model, &system, &user, CRITIC_TEMPERATURE, "refine")
            .await?;
        Ok(VideoPlan::from_json(strip_code_fences(&content))?)
    }

    async fn chat_json(
        &self,
        model: &str,
        system: &str,
        user: &str,
        temperature: f32,
        operation: &'static str,
    ) -> ProviderResult<String> {
        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
            temperature,
        };

        let started = Instant::now();
        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        metrics::record_request(
            PROVIDER,
            operation,
            status.as_u16(),
            started.elapsed().as_millis() as f64,
        );

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::api(PROVIDER, status.as_u16(), body));
        }

        let completion: ChatCompletionResponse = response.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or(ProviderError::EmptyResponse(PROVIDER))
    }
}

fn creator_system_prompt(persona: &str) -> String {
    let schema = schema_for!(VideoPlan);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        "You write scripts for short-form vertical videos. {persona}\n\n\
         Return ONLY a single JSON object matching this schema:\n{schema_json}\n\n\
         Rules:\n\
         - segments is an ordered array; every element carries a \"kind\" of \
           \"hook\", \"section\", or \"call_to_action\".\n\
         - Open with one hook, follow with 3-5 sections, close with one call_to_action.\n\
         - narration_text is spoken aloud; keep each segment under 30 words.\n\
         - visual_search_query describes concrete stock footage, 2-5 words.\n\
         - keywords_for_highlighting picks the 1-2 most emphatic words of the narration."
    )
}

fn critic_system_prompt(persona: &str) -> String {
    let schema = schema_for!(VideoPlan);
    let schema_json = serde_json::to_string_pretty(&schema).unwrap_or_default();

    format!(
        "You are a ruthless script editor for short-form video. {persona}\n\n\
         You receive a draft plan and return an improved version as ONLY a single \
         JSON object matching this schema:\n{schema_json}"
    )
}

/// Strip markdown code fences some models wrap around JSON.
pub(crate) fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("```json").unwrap_or(text);
    let text = text.strip_prefix("```").unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);
    text.trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_creator_prompt_embeds_schema() {
        let prompt = creator_system_prompt("Explain like a science teacher.");
        assert!(prompt.contains("science teacher"));
        assert!(prompt.contains("video_title"));
        assert!(prompt.contains("call_to_action"));
    }
}
