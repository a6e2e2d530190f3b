use anyhow::Error;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, InlineKeyboardButton, InlineKeyboardMarkup};

use crate::{
    config::{Config, DocumentLink, SharedConfig},
    identity::BotIdentity,
    module_mgr::Module,
    modules::quotes::QUOTE_BUTTON_DATA,
    types::{HandlerResult, TeloxideHandler},
    utils::dptree_ext::{command_filter, is_command, parse_command},
};

pub(crate) fn menu_keyboard(config: &Config) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = config
        .documents
        .iter()
        .map(|doc| vec![InlineKeyboardButton::callback(&doc.title, &doc.id)])
        .collect();
    rows.push(vec![InlineKeyboardButton::callback(
        &config.quote_button_title,
        QUOTE_BUTTON_DATA,
    )]);
    InlineKeyboardMarkup::new(rows)
}

async fn send_menu(
    bot: &Bot,
    msg: &Message,
    prompt: &str,
    config: &SharedConfig,
) -> HandlerResult {
    bot.send_message(msg.chat.id, prompt)
        .reply_markup(menu_keyboard(config))
        .await?;
    Ok(())
}

async fn start(bot: Bot, msg: Message, config: SharedConfig) -> HandlerResult {
    send_menu(&bot, &msg, &config.i18n.menu_prompt, &config).await
}

async fn greet(bot: Bot, msg: Message, config: SharedConfig) -> HandlerResult {
    send_menu(&bot, &msg, &config.i18n.greeting, &config).await
}

async fn whoami(bot: Bot, msg: Message) -> HandlerResult {
    if let Some(user) = msg.from() {
        bot.send_message(
            msg.chat.id,
            format!("Your Telegram ID: {}\nName: {}", user.id, user.full_name()),
        )
        .await?;
    }
    Ok(())
}

fn document_command(
    msg: Message,
    identity: BotIdentity,
    config: SharedConfig,
) -> Option<DocumentLink> {
    let text = msg.text()?;
    config
        .documents
        .iter()
        .find(|doc| {
            doc.command
                .as_deref()
                .map(|cmd| parse_command(text, cmd, &identity).is_some())
                .unwrap_or(false)
        })
        .cloned()
}

async fn send_document(bot: Bot, msg: Message, doc: DocumentLink) -> HandlerResult {
    bot.send_message(msg.chat.id, doc.url).await?;
    Ok(())
}

async fn handle_button(bot: Bot, query: CallbackQuery, config: SharedConfig) -> HandlerResult {
    bot.answer_callback_query(query.id).await?;

    let message = match query.message {
        Some(message) => message,
        None => return Ok(()),
    };

    let reply = match query.data.as_deref().and_then(|data| config.document(data)) {
        Some(doc) => doc.url.clone(),
        None => {
            warn!("Unknown button pressed: {:?}", query.data);
            config.i18n.unknown_button.clone()
        }
    };
    bot.send_message(message.chat.id, reply).await?;

    Ok(())
}

/// A group message that mentions the bot without asking anything (or
/// while questions are disabled) brings up the menu.
fn is_menu_mention(msg: Message, identity: BotIdentity, config: SharedConfig) -> bool {
    if msg.chat.is_private() {
        return false;
    }
    let text = match msg.text() {
        Some(text) if !is_command(text) => text,
        _ => return false,
    };
    if !identity.is_mentioned_in(&msg) {
        return false;
    }

    config.openai_api_key.is_none() || identity.strip_mention(text).is_empty()
}

/// Free text in a private chat when questions are disabled.
fn is_private_text_without_ask(msg: Message, config: SharedConfig) -> bool {
    msg.chat.is_private()
        && config.openai_api_key.is_none()
        && msg.text().map(|text| !is_command(text)).unwrap_or(false)
}

pub(crate) struct Menu {
    config: SharedConfig,
}

impl Menu {
    pub(crate) fn new(config: SharedConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Module for Menu {
    async fn register_dependency(&mut self, _dep_map: &mut DependencyMap) -> Result<(), Error> {
        Ok(())
    }

    fn handler_chain(&self) -> TeloxideHandler {
        dptree::entry()
            .branch(
                Update::filter_message()
                    .branch(dptree::filter_map(command_filter("start")).endpoint(start))
                    .branch(dptree::filter_map(command_filter("whoami")).endpoint(whoami))
                    .branch(dptree::filter_map(document_command).endpoint(send_document))
                    .branch(dptree::filter(is_menu_mention).endpoint(greet))
                    .branch(dptree::filter(is_private_text_without_ask).endpoint(greet)),
            )
            .branch(Update::filter_callback_query().endpoint(handle_button))
    }

    fn commands(&self) -> Vec<BotCommand> {
        let mut commands = vec![
            BotCommand::new("start", "Show the menu"),
            BotCommand::new("whoami", "Show your Telegram ID"),
        ];
        commands.extend(self.config.documents.iter().filter_map(|doc| {
            doc.command
                .as_ref()
                .map(|cmd| BotCommand::new(cmd, &doc.title))
        }));
        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use teloxide::types::UserId;

    fn config() -> Config {
        serde_json::from_value(serde_json::json!({
            "botToken": "123:abc",
            "documents": [
                {"id": "list", "title": "Marathon", "url": "https://a", "command": "list"},
                {"id": "list2", "title": "Coins", "url": "https://b"},
                {"id": "Reserve", "title": "Booking", "url": "https://c"}
            ],
            "quoteButtonTitle": "Quote"
        }))
        .unwrap()
    }

    #[test]
    fn test_menu_keyboard_rows() {
        let keyboard = menu_keyboard(&config());
        let titles: Vec<Vec<&str>> = keyboard
            .inline_keyboard
            .iter()
            .map(|row| row.iter().map(|button| button.text.as_str()).collect())
            .collect();
        assert_eq!(
            titles,
            vec![vec!["Marathon"], vec!["Coins"], vec!["Booking"], vec!["Quote"]]
        );
    }

    #[test]
    fn test_menu_commands_include_documents() {
        let menu = Menu::new(SharedConfig::new(config()));
        let commands: Vec<String> = menu.commands().into_iter().map(|c| c.command).collect();
        assert_eq!(commands, vec!["start", "whoami", "list"]);
    }

    fn with_api_key(mut config: Config) -> SharedConfig {
        config.openai_api_key = Some("sk-test".to_owned());
        SharedConfig::new(config)
    }

    fn identity() -> BotIdentity {
        BotIdentity::new(UserId(42), "desk_bot")
    }

    fn message(chat: serde_json::Value, text: &str, entities: serde_json::Value) -> Message {
        serde_json::from_value(serde_json::json!({
            "message_id": 5,
            "date": 1761264000,
            "chat": chat,
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "text": text,
            "entities": entities,
        }))
        .unwrap()
    }

    fn group_mention(text: &str) -> Message {
        message(
            serde_json::json!({ "id": -1001, "type": "group", "title": "Office" }),
            text,
            serde_json::json!([{ "type": "mention", "offset": 0, "length": 9 }]),
        )
    }

    fn private_text(text: &str) -> Message {
        message(
            serde_json::json!({ "id": 7, "type": "private", "first_name": "Ann" }),
            text,
            serde_json::json!([]),
        )
    }

    #[test]
    fn test_bare_group_mention_shows_menu() {
        let msg = group_mention("@desk_bot");
        assert!(is_menu_mention(msg, identity(), with_api_key(config())));
    }

    #[test]
    fn test_group_mention_with_question_is_left_to_ask() {
        let msg = group_mention("@desk_bot where is the printer?");
        assert!(!is_menu_mention(msg.clone(), identity(), with_api_key(config())));

        // Without an API key every mention brings up the menu.
        assert!(is_menu_mention(msg, identity(), SharedConfig::new(config())));
    }

    #[test]
    fn test_private_chat_never_shows_mention_menu() {
        let msg = private_text("@desk_bot");
        assert!(!is_menu_mention(msg, identity(), SharedConfig::new(config())));
    }

    #[test]
    fn test_private_text_without_ask() {
        let shared = SharedConfig::new(config());
        assert!(is_private_text_without_ask(private_text("hello"), shared.clone()));
        assert!(!is_private_text_without_ask(private_text("/start"), shared.clone()));
        assert!(!is_private_text_without_ask(group_mention("@desk_bot hi"), shared));
        assert!(!is_private_text_without_ask(
            private_text("hello"),
            with_api_key(config())
        ));
    }
}
