use anyhow::Error;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs, Role,
};
use async_openai::Client;

use crate::config::{Config, SharedConfig};

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct ChatModelResult {
    pub content: String,
    pub token_usage: u32,
}

#[derive(Clone)]
pub(crate) struct OpenAIClient {
    client: Client,
    config: SharedConfig,
}

impl OpenAIClient {
    pub(crate) fn new(api_key: &str, config: SharedConfig) -> Self {
        Self {
            client: Client::new().with_api_key(api_key),
            config,
        }
    }

    pub(crate) async fn request_chat_model(
        &self,
        question: String,
    ) -> Result<ChatModelResult, Error> {
        let req = build_request(&self.config, question)?;

        let resp = self.client.chat().create(req).await?;
        let content = resp
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(anyhow!("Server responds with empty data"));
        }

        Ok(ChatModelResult {
            content,
            token_usage: resp.usage.map(|u| u.total_tokens).unwrap_or(0),
        })
    }
}

/// Builds the completion request. The token limit is left to the model
/// unless `maxTokens` is configured.
pub(crate) fn build_request(
    config: &Config,
    question: String,
) -> Result<CreateChatCompletionRequest, Error> {
    let msgs = build_messages(config.system_prompt.as_deref(), question)?;

    let mut args = CreateChatCompletionRequestArgs::default();
    args.model(&config.openai_gpt_model)
        .temperature(0.6)
        .messages(msgs);
    if let Some(max_tokens) = config.max_tokens {
        args.max_tokens(max_tokens);
    }
    Ok(args.build()?)
}

pub(crate) fn build_messages(
    system_prompt: Option<&str>,
    question: String,
) -> Result<Vec<ChatCompletionRequestMessage>, Error> {
    let mut msgs = Vec::with_capacity(2);
    if let Some(system_prompt) = system_prompt {
        msgs.push(
            ChatCompletionRequestMessageArgs::default()
                .role(Role::System)
                .content(system_prompt)
                .build()?,
        );
    }
    msgs.push(
        ChatCompletionRequestMessageArgs::default()
            .role(Role::User)
            .content(question)
            .build()?,
    );
    Ok(msgs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_without_system_prompt() {
        let msgs = build_messages(None, "Where is the kitchen?".to_owned()).unwrap();
        assert_eq!(msgs.len(), 1);
        assert!(matches!(msgs[0].role, Role::User));
        assert_eq!(msgs[0].content, "Where is the kitchen?");
    }

    #[test]
    fn test_system_prompt_comes_first() {
        let msgs = build_messages(Some("You are an office assistant."), "Hi".to_owned()).unwrap();
        assert_eq!(msgs.len(), 2);
        assert!(matches!(msgs[0].role, Role::System));
        assert_eq!(msgs[0].content, "You are an office assistant.");
        assert!(matches!(msgs[1].role, Role::User));
    }

    fn config(extra: serde_json::Value) -> Config {
        let mut value = serde_json::json!({ "botToken": "123:abc", "openaiAPIKey": "sk-test" });
        if let (Some(config), Some(extra)) = (value.as_object_mut(), extra.as_object()) {
            config.extend(extra.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_request_has_no_token_limit_by_default() {
        let req = build_request(&config(serde_json::json!({})), "Hi".to_owned()).unwrap();
        assert_eq!(req.max_tokens, None);
        assert_eq!(req.model, "gpt-3.5-turbo");
        assert_eq!(req.temperature, Some(0.6));
    }

    #[test]
    fn test_request_uses_configured_token_limit() {
        let config = config(serde_json::json!({ "maxTokens": 256, "systemPrompt": "Be brief." }));
        let req = build_request(&config, "Hi".to_owned()).unwrap();
        assert_eq!(req.max_tokens, Some(256));
        assert_eq!(req.messages.len(), 2);
    }
}
