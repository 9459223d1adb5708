use crate::error::ReviewError;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::{config::OpenAIConfig, Client};
use serde::{Deserialize, Serialize};
use tokio::time::{sleep, Duration};

const MAX_RETRIES: u64 = 3;
const COLLABORATOR: &str = "summarizer";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeedbackSummary {
    pub overall_summary: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub improvement_areas: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

#[derive(Clone)]
pub struct AiService {
    client: Client<OpenAIConfig>,
    model: String,
}

impl AiService {
    pub fn new(api_key: String, model: String) -> Self {
        let config = OpenAIConfig::new().with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model,
        }
    }

    /// Summarises anonymous peer-review free text into strengths and next steps.
    pub async fn summarize_feedback(&self, feedback: &str) -> Result<FeedbackSummary, ReviewError> {
        let system_prompt = r#"You summarise anonymous peer-review comments for the employee who received them.
Output a JSON object with fields:
- overall_summary: two or three sentences
- strengths: array of short phrases
- improvement_areas: array of short phrases
- next_steps: array of concrete actions
Never guess who wrote a comment. Answer in the language the comments are written in."#;

        let mut retries = 0;
        loop {
            let messages = vec![
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    role: Role::System,
                    content: system_prompt.to_string(),
                    name: None,
                }),
                ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                    role: Role::User,
                    content: ChatCompletionRequestUserMessageContent::Text(format!(
                        "Comments:\n{feedback}"
                    )),
                    name: None,
                }),
            ];

            let request = CreateChatCompletionRequestArgs::default()
                .model(self.model.as_str())
                .messages(messages)
                .build()
                .map_err(|e| {
                    tracing::error!("Failed to build summary request: {}", e);
                    ReviewError::CollaboratorUnavailable {
                        collaborator: COLLABORATOR,
                    }
                })?;

            match self.client.chat().create(request).await {
                Ok(resp) => {
                    let content = resp
                        .choices
                        .first()
                        .and_then(|c| c.message.content.clone())
                        .unwrap_or_default();
                    return Ok(parse_summary(&content));
                }
                Err(err) => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        tracing::error!(
                            "OpenAI summary failed after {} retries: {}",
                            MAX_RETRIES,
                            err
                        );
                        return Err(ReviewError::CollaboratorUnavailable {
                            collaborator: COLLABORATOR,
                        });
                    }
                    tracing::warn!("OpenAI summary attempt {} failed: {}", retries, err);
                    sleep(Duration::from_millis(500 * retries)).await;
                }
            }
        }
    }
}

/// Reads the model's JSON answer, tolerating a fenced code block. Anything that is
/// not the expected object becomes the overall summary verbatim.
pub fn parse_summary(content: &str) -> FeedbackSummary {
    let trimmed = content.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    serde_json::from_str(body).unwrap_or_else(|_| FeedbackSummary {
        overall_summary: trimmed.to_string(),
        ..FeedbackSummary::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_json() {
        let content = concat!(
            "```json\n",
            r#"{"overall_summary":"Dependable","strengths":["punctual"],"#,
            r#""improvement_areas":[],"next_steps":["lead a standup"]}"#,
            "\n```"
        );
        let summary = parse_summary(content);
        assert_eq!(summary.overall_summary, "Dependable");
        assert_eq!(summary.strengths, vec!["punctual".to_string()]);
        assert_eq!(summary.next_steps, vec!["lead a standup".to_string()]);
    }

    #[test]
    fn missing_lists_default_to_empty() {
        let summary = parse_summary("{\"overall_summary\":\"Solid\"}");
        assert!(summary.strengths.is_empty());
        assert!(summary.improvement_areas.is_empty());
    }

    #[test]
    fn plain_text_falls_back_to_summary() {
        let summary = parse_summary("  Works well with others.  ");
        assert_eq!(summary.overall_summary, "Works well with others.");
        assert!(summary.next_steps.is_empty());
    }
}
