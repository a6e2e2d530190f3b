mod openai_client;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use teloxide::dptree::di::DependencySupplier;
use teloxide::prelude::*;
use teloxide::types::BotCommand;

use crate::{
    config::SharedConfig,
    identity::BotIdentity,
    module_mgr::Module,
    types::{HandlerResult, TeloxideHandler},
    utils::dptree_ext::{command_filter, is_command, CommandArgs},
};
use openai_client::OpenAIClient;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Question(String);

/// Extracts a question from free text: anything in a private chat, or
/// the rest of a group message that mentions the bot.
fn extract_question(
    text: &str,
    is_private: bool,
    is_mentioned: bool,
    identity: &BotIdentity,
) -> Option<Question> {
    if is_command(text) {
        return None;
    }
    if !is_private && !is_mentioned {
        return None;
    }

    let question = identity.strip_mention(text);
    if question.is_empty() {
        return None;
    }
    Some(Question(question))
}

fn question_filter(msg: Message, identity: BotIdentity) -> Option<Question> {
    let text = msg.text()?;
    let is_private = msg.chat.is_private();
    let is_mentioned = !is_private && identity.is_mentioned_in(&msg);
    extract_question(text, is_private, is_mentioned, &identity)
}

async fn ask_command(
    bot: Bot,
    msg: Message,
    args: CommandArgs,
    openai_client: OpenAIClient,
    config: SharedConfig,
) -> HandlerResult {
    if args.0.is_empty() {
        bot.send_message(msg.chat.id, &config.i18n.empty_question)
            .reply_to_message_id(msg.id)
            .await?;
        return Ok(());
    }
    answer_question(bot, msg, Question(args.0), openai_client, config).await
}

async fn answer_question(
    bot: Bot,
    msg: Message,
    question: Question,
    openai_client: OpenAIClient,
    config: SharedConfig,
) -> HandlerResult {
    // Send a progress indicator message first.
    let sent_progress_msg = bot
        .send_message(msg.chat.id, &config.i18n.thinking_prompt)
        .reply_to_message_id(msg.id)
        .await?;

    let timeout = Duration::from_secs(config.openai_api_timeout);
    let result = tokio::time::timeout(timeout, openai_client.request_chat_model(question.0)).await;

    let reply = match result {
        Ok(Ok(res)) => {
            debug!("Question answered with {} tokens", res.token_usage);
            res.content
        }
        Ok(Err(err)) => {
            error!("Failed to request the model: {}", err);
            config.i18n.api_error_prompt.clone()
        }
        Err(_) => {
            error!("Model request timed out after {}s", config.openai_api_timeout);
            config.i18n.api_error_prompt.clone()
        }
    };

    bot.edit_message_text(msg.chat.id, sent_progress_msg.id, reply)
        .await?;
    Ok(())
}

/// Forwards questions to the OpenAI chat model.
pub(crate) struct Ask;

#[async_trait]
impl Module for Ask {
    async fn register_dependency(&mut self, dep_map: &mut DependencyMap) -> Result<(), Error> {
        let config: Arc<SharedConfig> = dep_map.get();

        let api_key = config
            .openai_api_key
            .as_deref()
            .ok_or_else(|| anyhow!("Ask module requires `openaiAPIKey`"))?;
        dep_map.insert(OpenAIClient::new(api_key, config.as_ref().clone()));
        Ok(())
    }

    fn handler_chain(&self) -> TeloxideHandler {
        dptree::entry().branch(
            Update::filter_message()
                .branch(dptree::filter_map(command_filter("ask")).endpoint(ask_command))
                .branch(dptree::filter_map(question_filter).endpoint(answer_question)),
        )
    }

    fn commands(&self) -> Vec<BotCommand> {
        vec![BotCommand::new("ask", "Ask the assistant a question")]
    }
}
