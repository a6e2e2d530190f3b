//! The bot's own identity, fetched once at startup.

use teloxide::types::{Me, MessageEntityKind, User, UserId};
use teloxide::prelude::*;

/// Immutable information about the running bot. Built from `getMe`
/// before the dispatcher starts and shared with every handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BotIdentity {
    user_id: UserId,
    username_lower: String,
}

impl BotIdentity {
    pub fn new(user_id: UserId, username: &str) -> Self {
        Self {
            user_id,
            username_lower: username.to_ascii_lowercase(),
        }
    }

    pub fn from_me(me: &Me) -> Self {
        Self::new(me.id, me.username())
    }

    pub fn username(&self) -> &str {
        &self.username_lower
    }

    /// Returns `true` if `name` (as written after the `@` of a command
    /// suffix) refers to this bot.
    pub fn is_addressed_as(&self, name: &str) -> bool {
        !self.username_lower.is_empty() && name.eq_ignore_ascii_case(&self.username_lower)
    }

    fn is_self(&self, user: &User) -> bool {
        user.id == self.user_id
    }

    /// Checks whether the message mentions the bot, either through a
    /// mention entity or, as a fallback, a word of its text naming it.
    pub fn is_mentioned_in(&self, msg: &Message) -> bool {
        let text = match msg.text() {
            Some(text) => text,
            None => return false,
        };

        if let Some(entities) = msg.parse_entities() {
            for entity in entities {
                match entity.kind() {
                    MessageEntityKind::Mention => {
                        if self.matches_mention(entity.text()) {
                            return true;
                        }
                    }
                    MessageEntityKind::TextMention { user } => {
                        if self.is_self(user) {
                            return true;
                        }
                    }
                    _ => {}
                }
            }
        }

        self.is_mentioned_in_text(text)
    }

    fn matches_mention(&self, mention_text: &str) -> bool {
        let name = mention_text.strip_prefix('@').unwrap_or(mention_text);
        !self.username_lower.is_empty() && name.eq_ignore_ascii_case(&self.username_lower)
    }

    /// Returns `true` if `word` is the bot's username, with or without the
    /// `@` and surrounding punctuation. Telegram usernames are ASCII, so
    /// only ASCII case is folded.
    fn is_self_word(&self, word: &str) -> bool {
        let name = word.trim_matches(|c: char| c.is_ascii_punctuation() && c != '_');
        !self.username_lower.is_empty() && name.eq_ignore_ascii_case(&self.username_lower)
    }

    pub fn is_mentioned_in_text(&self, text: &str) -> bool {
        text.split_whitespace().any(|word| self.is_self_word(word))
    }

    /// Removes every word naming this bot (`@username` or the bare
    /// username) from `text` and returns the rest, trimmed.
    pub fn strip_mention(&self, text: &str) -> String {
        text.split_whitespace()
            .filter(|word| !self.is_self_word(word))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn group_message(text: &str, entities: serde_json::Value) -> Message {
        serde_json::from_value(json!({
            "message_id": 1,
            "date": 1761264000,
            "chat": { "id": -1001, "type": "group", "title": "Office" },
            "from": { "id": 7, "is_bot": false, "first_name": "Ann" },
            "text": text,
            "entities": entities,
        }))
        .unwrap()
    }

    fn identity() -> BotIdentity {
        BotIdentity::new(UserId(42), "DeskmateBot")
    }

    #[test]
    fn test_username_is_lowercased() {
        assert_eq!(identity().username(), "deskmatebot");
        assert!(identity().is_addressed_as("DeskmateBOT"));
        assert!(!identity().is_addressed_as("other_bot"));
    }

    #[test]
    fn test_mention_entity_text() {
        let id = identity();
        assert!(id.matches_mention("@DeskmateBot"));
        assert!(id.matches_mention("@deskmatebot"));
        assert!(!id.matches_mention("@someone"));
    }

    #[test]
    fn test_textual_fallback() {
        let id = identity();
        assert!(id.is_mentioned_in_text("hey @DESKMATEBOT show the menu"));
        assert!(id.is_mentioned_in_text("deskmatebot?"));
        assert!(!id.is_mentioned_in_text("hello everyone"));
    }

    #[test]
    fn test_empty_username_never_matches() {
        let id = BotIdentity::new(UserId(1), "");
        assert!(!id.is_mentioned_in_text("anything"));
        assert!(!id.is_addressed_as(""));
    }

    #[test]
    fn test_strip_mention() {
        let id = identity();
        assert_eq!(id.strip_mention("@DeskmateBot"), "");
        assert_eq!(
            id.strip_mention("@deskmatebot  how do I book a desk?"),
            "how do I book a desk?"
        );
        assert_eq!(
            id.strip_mention("where is @DeskmateBot the office"),
            "where is the office"
        );
    }

    #[test]
    fn test_strip_mention_after_non_ascii_text() {
        let id = BotIdentity::new(UserId(42), "desk_bot");
        assert_eq!(id.strip_mention("İ @desk_bot hi"), "İ hi");
        assert_eq!(
            id.strip_mention("Straße İstanbul @Desk_Bot где кухня?"),
            "Straße İstanbul где кухня?"
        );
    }

    #[test]
    fn test_strip_bare_username() {
        let id = BotIdentity::new(UserId(42), "desk_bot");
        assert_eq!(
            id.strip_mention("deskmate desk_bot what time"),
            "deskmate what time"
        );
        assert_eq!(id.strip_mention("Desk_Bot, open the menu"), "open the menu");
        assert_eq!(id.strip_mention("ask desk_bots"), "ask desk_bots");
        assert!(!id.is_mentioned_in_text("ask desk_bots"));
    }

    #[test]
    fn test_mention_entity_in_group() {
        let id = identity();
        let msg = group_message(
            "@DeskmateBot where is the printer",
            json!([{ "type": "mention", "offset": 0, "length": 12 }]),
        );
        assert!(id.is_mentioned_in(&msg));

        let other = group_message(
            "@someone_else where is the printer",
            json!([{ "type": "mention", "offset": 0, "length": 13 }]),
        );
        assert!(!id.is_mentioned_in(&other));
    }

    #[test]
    fn test_text_mention_of_bot_id() {
        let id = identity();
        let entities = |user_id: u64| {
            json!([{
                "type": "text_mention",
                "offset": 0,
                "length": 4,
                "user": { "id": user_id, "is_bot": true, "first_name": "Desk" },
            }])
        };

        assert!(id.is_mentioned_in(&group_message("Desk, lunch menu?", entities(42))));
        assert!(!id.is_mentioned_in(&group_message("Desk, lunch menu?", entities(43))));
    }

    #[test]
    fn test_message_without_mention() {
        let msg = group_message("good morning", json!([]));
        assert!(!identity().is_mentioned_in(&msg));
    }
}
