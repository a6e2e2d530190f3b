mod pending;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Error;
use teloxide::dptree::di::DependencySupplier;
use teloxide::prelude::*;
use teloxide::types::{BotCommand, InputFile, PhotoSize};

use crate::{
    config::SharedConfig,
    daily::QuoteOfTheDay,
    module_mgr::Module,
    quote_store::AppendOutcome,
    types::{HandlerResult, TeloxideHandler},
    utils::dptree_ext::command_filter,
};
pub(crate) use pending::{PendingState, PendingUploads};

/// Callback data of the "quote of the day" menu button.
pub(crate) const QUOTE_BUTTON_DATA: &str = "quote";

async fn send_quote_of_the_day(
    bot: &Bot,
    chat_id: ChatId,
    qotd: &QuoteOfTheDay,
    config: &SharedConfig,
) -> HandlerResult {
    match qotd.today().await {
        Ok(Some(file_id)) => {
            bot.send_photo(chat_id, InputFile::file_id(file_id)).await?;
        }
        Ok(None) => {
            bot.send_message(chat_id, &config.i18n.quotes_empty).await?;
        }
        Err(err) => {
            error!("Failed to pick the quote of the day: {}", err);
            bot.send_message(chat_id, &config.i18n.quotes_unavailable)
                .await?;
        }
    }
    Ok(())
}

async fn quote_command(
    bot: Bot,
    msg: Message,
    qotd: QuoteOfTheDay,
    config: SharedConfig,
) -> HandlerResult {
    send_quote_of_the_day(&bot, msg.chat.id, &qotd, &config).await
}

async fn quote_button(
    bot: Bot,
    query: CallbackQuery,
    qotd: QuoteOfTheDay,
    config: SharedConfig,
) -> HandlerResult {
    bot.answer_callback_query(query.id).await?;
    if let Some(message) = query.message {
        send_quote_of_the_day(&bot, message.chat.id, &qotd, &config).await?;
    }
    Ok(())
}

async fn add_quote(
    bot: Bot,
    msg: Message,
    pending: PendingUploads,
    config: SharedConfig,
) -> HandlerResult {
    let user_id = match msg.from() {
        Some(user) => user.id,
        None => return Ok(()),
    };

    if !config.is_admin(user_id.0) {
        warn!("Non-admin user {} tried to add a quote", user_id);
        bot.send_message(msg.chat.id, &config.i18n.not_allowed_prompt)
            .reply_to_message_id(msg.id)
            .await?;
        return Ok(());
    }

    pending.begin(user_id);
    bot.send_message(msg.chat.id, &config.i18n.send_quote_photo)
        .reply_to_message_id(msg.id)
        .await?;
    Ok(())
}

fn largest_photo_file_id(photos: &[PhotoSize]) -> Option<String> {
    photos.last().map(|photo| photo.file.id.clone())
}

fn format_saved(template: &str, index: usize, file_id: &str) -> String {
    template
        .replace("{index}", &index.to_string())
        .replace("{file_id}", file_id)
}

async fn handle_quote_photo(
    bot: Bot,
    msg: Message,
    qotd: QuoteOfTheDay,
    pending: PendingUploads,
    config: SharedConfig,
) -> HandlerResult {
    let user_id = match msg.from() {
        Some(user) => user.id,
        None => return Ok(()),
    };

    // Photos from anyone else are regular chat content.
    if !config.is_admin(user_id.0) {
        return Ok(());
    }

    match pending.take(user_id) {
        PendingState::Waiting => {}
        state => {
            debug!("Photo from {} without a pending upload ({:?})", user_id, state);
            bot.send_message(msg.chat.id, &config.i18n.add_quote_first)
                .reply_to_message_id(msg.id)
                .await?;
            return Ok(());
        }
    }

    let file_id = match msg.photo().and_then(largest_photo_file_id) {
        Some(file_id) => file_id,
        None => {
            bot.send_message(msg.chat.id, &config.i18n.need_photo)
                .reply_to_message_id(msg.id)
                .await?;
            return Ok(());
        }
    };

    let reply = match qotd.store().append(file_id.clone()).await {
        Ok(AppendOutcome::Added { index }) => {
            info!("Quote #{} is added by {}", index, user_id);
            format_saved(&config.i18n.quote_saved, index, &file_id)
        }
        Ok(AppendOutcome::Duplicate) => {
            warn!("Quote {} had already been added", file_id);
            config.i18n.quote_duplicate.clone()
        }
        Err(err) => {
            error!("Failed to add quote: {}", err);
            config.i18n.quote_save_failed.clone()
        }
    };
    bot.send_message(msg.chat.id, reply)
        .reply_to_message_id(msg.id)
        .await?;

    Ok(())
}

fn is_quote_button(query: CallbackQuery) -> bool {
    query.data.as_deref() == Some(QUOTE_BUTTON_DATA)
}

fn is_photo(msg: Message) -> bool {
    msg.photo().is_some()
}

/// Media other than a photo sent while an upload is pending.
fn is_misplaced_upload(msg: Message, pending: PendingUploads) -> bool {
    if msg.photo().is_some() || msg.text().is_some() {
        return false;
    }
    msg.from()
        .map(|user| pending.state(user.id) == PendingState::Waiting)
        .unwrap_or(false)
}

async fn reject_misplaced_upload(bot: Bot, msg: Message, config: SharedConfig) -> HandlerResult {
    bot.send_message(msg.chat.id, &config.i18n.need_photo)
        .reply_to_message_id(msg.id)
        .await?;
    Ok(())
}

pub(crate) struct Quotes {
    qotd: Option<QuoteOfTheDay>,
}

impl Quotes {
    pub(crate) fn new(qotd: QuoteOfTheDay) -> Self {
        Self { qotd: Some(qotd) }
    }
}

#[async_trait]
impl Module for Quotes {
    async fn register_dependency(&mut self, dep_map: &mut DependencyMap) -> Result<(), Error> {
        let config: Arc<SharedConfig> = dep_map.get();

        let qotd = self
            .qotd
            .take()
            .ok_or_else(|| anyhow!("Quotes module is registered twice"))?;
        dep_map.insert(qotd);
        dep_map.insert(PendingUploads::new(Duration::from_secs(
            config.pending_upload_timeout,
        )));
        Ok(())
    }

    fn handler_chain(&self) -> TeloxideHandler {
        dptree::entry()
            .branch(
                Update::filter_message()
                    .branch(dptree::filter_map(command_filter("quote")).endpoint(quote_command))
                    .branch(dptree::filter_map(command_filter("addquote")).endpoint(add_quote))
                    .branch(dptree::filter(is_photo).endpoint(handle_quote_photo))
                    .branch(dptree::filter(is_misplaced_upload).endpoint(reject_misplaced_upload)),
            )
            .branch(
                Update::filter_callback_query()
                    .filter(is_quote_button)
                    .endpoint(quote_button),
            )
    }

    fn commands(&self) -> Vec<BotCommand> {
        // `/addquote` is for admins only, don't advertise it.
        vec![BotCommand::new("quote", "Show the quote of the day")]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use teloxide::types::UserId;

    fn photo(id: &str, width: u32) -> PhotoSize {
        serde_json::from_value(serde_json::json!({
            "file_id": id,
            "file_unique_id": format!("u-{}", id),
            "file_size": width * width,
            "width": width,
            "height": width,
        }))
        .unwrap()
    }

    #[test]
    fn test_largest_photo_is_last() {
        let photos = [photo("small", 90), photo("medium", 320), photo("large", 1280)];
        assert_eq!(largest_photo_file_id(&photos).as_deref(), Some("large"));
        assert_eq!(largest_photo_file_id(&[]), None);
    }

    #[test]
    fn test_format_saved() {
        assert_eq!(
            format_saved("Saved as #{index}.\nfile_id = {file_id}", 3, "AgAD"),
            "Saved as #3.\nfile_id = AgAD"
        );
        assert_eq!(format_saved("Saved!", 0, "AgAD"), "Saved!");
    }

    fn callback(data: &str) -> CallbackQuery {
        serde_json::from_value(json!({
            "id": "cb-1",
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "chat_instance": "office",
            "data": data,
        }))
        .unwrap()
    }

    fn private_message(content: serde_json::Value) -> Message {
        let mut value = json!({
            "message_id": 3,
            "date": 1761264000,
            "chat": { "id": 7, "type": "private", "first_name": "Ann" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
        });
        if let (Some(msg), Some(content)) = (value.as_object_mut(), content.as_object()) {
            msg.extend(content.clone());
        }
        serde_json::from_value(value).unwrap()
    }

    fn document() -> Message {
        private_message(json!({
            "document": {
                "file_id": "doc",
                "file_unique_id": "u-doc",
                "file_size": 2048,
                "file_name": "quote.png",
            },
        }))
    }

    #[test]
    fn test_quote_button_data() {
        assert!(is_quote_button(callback(QUOTE_BUTTON_DATA)));
        assert!(!is_quote_button(callback("list")));
    }

    #[test]
    fn test_misplaced_upload_needs_pending_record() {
        let pending = PendingUploads::new(Duration::from_secs(300));
        assert!(!is_misplaced_upload(document(), pending.clone()));

        pending.begin(UserId(7));
        assert!(is_misplaced_upload(document(), pending.clone()));
        // The record is kept for the photo that follows.
        assert_eq!(pending.state(UserId(7)), PendingState::Waiting);
    }

    #[test]
    fn test_text_and_photos_are_not_misplaced_uploads() {
        let pending = PendingUploads::new(Duration::from_secs(300));
        pending.begin(UserId(7));

        let text = private_message(json!({ "text": "here it comes" }));
        assert!(!is_misplaced_upload(text, pending.clone()));

        let photo = private_message(json!({
            "photo": [{
                "file_id": "p",
                "file_unique_id": "u-p",
                "file_size": 1024,
                "width": 320,
                "height": 320,
            }],
        }));
        assert!(is_photo(photo.clone()));
        assert!(!is_misplaced_upload(photo, pending));
    }
}
