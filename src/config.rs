//! Configuration-related types.
//!
//! The configuration can be represented in and deserialized from JSON,
//! here is an example:
//!
//! ```json
//! {
//!   "botToken": "8888888888:XXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXXX",
//!   "openaiAPIKey": "sk-xxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxxx",
//!   "adminUserIds": [536451470],
//!   "quotesPath": "./quotes.json",
//!   "healthCheckAddr": "0.0.0.0:8080",
//!   "documents": [
//!     {
//!       "id": "list",
//!       "title": "Office attendance marathon",
//!       "url": "https://docs.example.com/marathon",
//!       "command": "list"
//!     }
//!   ],
//!   "i18n": {
//!     "menuPrompt": "Pick a command"
//!   }
//! }
//! ```
//!
//! See [`Config`] for more detailed descriptions.

use std::collections::HashSet;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Error};
use paste::paste;
use serde::Deserialize;

/// A thread-safe reference-counting object that represents
/// a [`Config`] instance.
#[derive(Debug, Clone)]
pub struct SharedConfig {
    config: Arc<Config>,
}

impl SharedConfig {
    /// Constructs a new `SharedConfig`.
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

impl Deref for SharedConfig {
    type Target = Config;

    fn deref(&self) -> &Self::Target {
        self.config.as_ref()
    }
}

/// Top-level config type for the bot.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// The token of your Telegram bot.
    /// JSON key: `botToken`
    #[serde(rename = "botToken")]
    pub telegram_bot_token: String,

    /// The API key of your OpenAI account. Questions are not forwarded
    /// to the language model when this is absent.
    /// JSON key: `openaiAPIKey`
    #[serde(default, rename = "openaiAPIKey")]
    pub openai_api_key: Option<String>,

    /// The openai model your want to use for answering questions.
    /// Value is default to "gpt-3.5-turbo".
    /// JSON key: `openaiGptModel`
    #[serde(default = "default_openai_gpt_model", rename = "openaiGptModel")]
    pub openai_gpt_model: String,

    /// A timeout in seconds for waiting for the OpenAI server response.
    /// JSON key: `openaiAPITimeout`
    #[serde(default = "default_openai_api_timeout", rename = "openaiAPITimeout")]
    pub openai_api_timeout: u64,

    /// The maximum number of tokens allowed for the generated answer. Left
    /// to the model when unset.
    /// JSON key: `maxTokens`
    #[serde(default, rename = "maxTokens")]
    pub max_tokens: Option<u16>,

    /// An optional system message prepended to every question.
    /// JSON key: `systemPrompt`
    #[serde(default, rename = "systemPrompt")]
    pub system_prompt: Option<String>,

    /// Telegram user ids that are allowed to add quotes. Use `/whoami`
    /// to find out the id of an account.
    /// JSON key: `adminUserIds`
    #[serde(default, rename = "adminUserIds")]
    pub admin_user_ids: HashSet<u64>,

    /// The path of the JSON document that stores the quotes.
    /// JSON key: `quotesPath`
    #[serde(default = "default_quotes_path", rename = "quotesPath")]
    pub quotes_path: String,

    /// How long (in seconds) the bot waits for a photo after `/addquote`.
    /// JSON key: `pendingUploadTimeout`
    #[serde(
        default = "default_pending_upload_timeout",
        rename = "pendingUploadTimeout"
    )]
    pub pending_upload_timeout: u64,

    /// An address to serve the health-check endpoint on, [`None`] to
    /// disable it.
    /// JSON key: `healthCheckAddr`
    #[serde(default, rename = "healthCheckAddr")]
    pub health_check_addr: Option<String>,

    /// Document links shown in the menu.
    /// JSON key: `documents`
    #[serde(default)]
    pub documents: Vec<DocumentLink>,

    /// The title of the "quote of the day" menu button.
    /// JSON key: `quoteButtonTitle`
    #[serde(default = "default_quote_button_title", rename = "quoteButtonTitle")]
    pub quote_button_title: String,

    /// Strings for I18N.
    /// JSON key: `i18n`
    #[serde(default)]
    pub i18n: I18nStrings,
}

impl Config {
    /// Reads and parses a JSON config file.
    pub fn from_path<P>(path: P) -> Result<Self, Error>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Returns `true` if the user is allowed to manage quotes.
    pub fn is_admin(&self, user_id: u64) -> bool {
        self.admin_user_ids.contains(&user_id)
    }

    /// Looks up a document by its button id.
    pub fn document(&self, id: &str) -> Option<&DocumentLink> {
        self.documents.iter().find(|doc| doc.id == id)
    }
}

/// A static link sent back when its menu button is pressed.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DocumentLink {
    /// Callback data of the menu button.
    pub id: String,
    /// Text of the menu button.
    pub title: String,
    /// The link to send.
    pub url: String,
    /// An optional command (without the leading slash) that sends the
    /// link directly.
    #[serde(default)]
    pub command: Option<String>,
}

/// Strings for I18N.
#[derive(Debug, Clone, Deserialize)]
pub struct I18nStrings {
    /// Text shown above the menu on `/start`.
    /// JSON key: `menuPrompt`
    #[serde(default = "default_menu_prompt", rename = "menuPrompt")]
    pub menu_prompt: String,
    /// Text shown above the menu when the bot is mentioned.
    /// JSON key: `greeting`
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// A text to display when no quote has been added yet.
    /// JSON key: `quotesEmpty`
    #[serde(default = "default_quotes_empty", rename = "quotesEmpty")]
    pub quotes_empty: String,
    /// A text to display when the quote store cannot be read.
    /// JSON key: `quotesUnavailable`
    #[serde(default = "default_quotes_unavailable", rename = "quotesUnavailable")]
    pub quotes_unavailable: String,
    /// A text to display when the current user is not allowed to add quotes.
    /// JSON key: `notAllowedPrompt`
    #[serde(default = "default_not_allowed_prompt", rename = "notAllowedPrompt")]
    pub not_allowed_prompt: String,
    /// Reply to `/addquote`.
    /// JSON key: `sendQuotePhoto`
    #[serde(default = "default_send_quote_photo", rename = "sendQuotePhoto")]
    pub send_quote_photo: String,
    /// A text to display when a photo arrives without a pending `/addquote`.
    /// JSON key: `addQuoteFirst`
    #[serde(default = "default_add_quote_first", rename = "addQuoteFirst")]
    pub add_quote_first: String,
    /// A text to display when something other than a photo arrives while
    /// waiting for a quote.
    /// JSON key: `needPhoto`
    #[serde(default = "default_need_photo", rename = "needPhoto")]
    pub need_photo: String,
    /// A text to display when the quote is already stored.
    /// JSON key: `quoteDuplicate`
    #[serde(default = "default_quote_duplicate", rename = "quoteDuplicate")]
    pub quote_duplicate: String,
    /// A text to display after a quote is stored. `{index}` and `{file_id}`
    /// are substituted.
    /// JSON key: `quoteSaved`
    #[serde(default = "default_quote_saved", rename = "quoteSaved")]
    pub quote_saved: String,
    /// A text to display when the quote cannot be stored.
    /// JSON key: `quoteSaveFailed`
    #[serde(default = "default_quote_save_failed", rename = "quoteSaveFailed")]
    pub quote_save_failed: String,
    /// A text to display for a button the bot doesn't know.
    /// JSON key: `unknownButton`
    #[serde(default = "default_unknown_button", rename = "unknownButton")]
    pub unknown_button: String,
    /// A placeholder shown while waiting for the language model.
    /// JSON key: `thinkingPrompt`
    #[serde(default = "default_thinking_prompt", rename = "thinkingPrompt")]
    pub thinking_prompt: String,
    /// A text to display when `/ask` is sent without a question.
    /// JSON key: `emptyQuestion`
    #[serde(default = "default_empty_question", rename = "emptyQuestion")]
    pub empty_question: String,
    /// A text to display when there are something wrong with the OpenAI service.
    /// JSON key: `apiErrorPrompt`
    #[serde(default = "default_api_error_prompt", rename = "apiErrorPrompt")]
    pub api_error_prompt: String,
}

macro_rules! define_defaults {
    ($ty_name:ident { $($name:ident: $ty:ty = $default:expr,)* }) => {
        define_defaults! { $($name: $ty = $default,)* }
        paste! {
            impl Default for $ty_name {
                fn default() -> Self {
                    Self {
                        $($name: [<default_ $name>](),)*
                    }
                }
            }
        }
    };
    ($($name:ident: $ty:ty = $default:expr,)*) => {
        paste! {
            $(
                fn [<default_ $name>]() -> $ty {
                    $default
                }
            )*
        }
    };
}

define_defaults! {
    openai_api_timeout: u64 = 30,
    openai_gpt_model: String = "gpt-3.5-turbo".to_owned(),
    quotes_path: String = "quotes.json".to_owned(),
    pending_upload_timeout: u64 = 300,
    quote_button_title: String = "Quote of the day".to_owned(),
}

define_defaults!(I18nStrings {
    menu_prompt: String = "Pick a command".to_owned(),
    greeting: String = "Hi!".to_owned(),
    quotes_empty: String = "No quotes have been added yet \u{1F937}".to_owned(),
    quotes_unavailable: String = "Quotes are unavailable right now, try again later.".to_owned(),
    not_allowed_prompt: String = "You are not allowed to add quotes \u{1F645}".to_owned(),
    send_quote_photo: String = "OK \u{1F44D} Send me the quote as a photo and I'll save it.".to_owned(),
    add_quote_first: String = "To add a quote, send /addquote first.".to_owned(),
    need_photo: String = "I need a photo, not a document or a sticker \u{1F642}".to_owned(),
    quote_duplicate: String = "This quote is already saved \u{1F44C}".to_owned(),
    quote_saved: String = "Done \u{2705} Saved the quote as #{index}.\nfile_id = {file_id}".to_owned(),
    quote_save_failed: String = "Failed to save the quote, internal error occurred".to_owned(),
    unknown_button: String = "I don't know what to do with this button yet \u{1F914}".to_owned(),
    thinking_prompt: String = "Thinking... \u{1F914}".to_owned(),
    empty_question: String = "Send your question after the command, e.g. /ask How do I book a desk?".to_owned(),
    api_error_prompt: String = "Hmm, something went wrong...".to_owned(),
});
