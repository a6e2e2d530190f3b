//! Running the bot inside an existing tokio runtime.
//!
//! ```no_run
//! # async fn run_bot() -> anyhow::Result<()> {
//! use deskmate_core::{app, config::{Config, SharedConfig}};
//!
//! let config = Config::from_path("config.json")?;
//! app::run(SharedConfig::new(config)).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::{Context, Error};
use teloxide::{prelude::*, types::MenuButton};

use crate::{
    config::{Config, SharedConfig},
    daily::{QuoteOfTheDay, SystemClock},
    dispatcher::build_dispatcher,
    health::spawn_health_server,
    identity::BotIdentity,
    module_mgr::ModuleManager,
    modules,
    quote_store::QuoteStore,
};

async fn update_menu(bot: &Bot, module_mgr: &ModuleManager) -> Result<(), Error> {
    let mut commands = vec![];
    module_mgr.with_all_modules(|m| commands.extend(m.commands()));
    bot.set_my_commands(commands).await?;
    Ok(())
}

async fn init_bot(config: &Config) -> Result<(Bot, BotIdentity), Error> {
    let bot = Bot::new(&config.telegram_bot_token);
    let me = bot.get_me().await?;
    let identity = BotIdentity::from_me(&me);
    info!("Bot username: @{}", identity.username());

    bot.set_chat_menu_button()
        .menu_button(MenuButton::Commands)
        .await?;
    // Start from a clean slate: polling doesn't work with a webhook set.
    bot.delete_webhook().drop_pending_updates(true).await?;
    Ok((bot, identity))
}

/// Opens the quote store and makes sure its document is readable. A corrupt
/// document stops the bot here instead of failing every quote request.
async fn init_quote_store(config: &Config) -> Result<QuoteStore, Error> {
    let store = QuoteStore::open(&config.quotes_path)?;
    let quotes = store
        .load()
        .await
        .with_context(|| format!("Failed to load quotes from {}", config.quotes_path))?;
    info!("Loaded {} quote(s) from {}", quotes.len(), config.quotes_path);
    Ok(store)
}

/// Runs the bot until it's interrupted with Ctrl-C.
pub async fn run(config: SharedConfig) -> Result<(), Error> {
    debug!("Initializing quote store...");
    let store = init_quote_store(&config).await?;

    if let Some(addr) = &config.health_check_addr {
        spawn_health_server(addr, store.clone()).await?;
    }

    info!("Initializing bot...");
    let (bot, identity) = init_bot(&config).await?;

    debug!("Initializing modules...");
    let mut module_mgr = ModuleManager::new();
    module_mgr.register_module(modules::config::Config::new(config.clone(), identity));
    module_mgr.register_module(modules::quotes::Quotes::new(QuoteOfTheDay::new(
        store,
        Arc::new(SystemClock),
    )));
    module_mgr.register_module(modules::menu::Menu::new(config.clone()));
    if config.openai_api_key.is_some() {
        module_mgr.register_module(modules::ask::Ask);
    } else {
        warn!("`openaiAPIKey` is not set, questions won't be answered");
    }

    update_menu(&bot, &module_mgr).await?;

    let mut built_dispatcher = build_dispatcher(bot, module_mgr).await?;
    info!("Bot is started!");
    built_dispatcher.dispatch().await;

    info!("Bot is stopped");
    Ok(())
}
