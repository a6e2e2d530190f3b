use anyhow::Error;
use teloxide::prelude::*;
use teloxide::types::{UpdateKind, User};

use crate::{
    module_mgr::ModuleManager,
    types::{HandlerResult, TeloxideDispatcher},
};

fn describe_sender(user: Option<&User>) -> String {
    user.map(|u| {
        let full_name = u.full_name();
        if full_name.is_empty() {
            u.id.to_string()
        } else {
            full_name
        }
    })
    .unwrap_or_else(|| "<unknown>".to_owned())
}

fn update_filter(update: Update) -> bool {
    let from = describe_sender(update.user());

    match &update.kind {
        UpdateKind::Message(msg) => {
            if let Some(text) = msg.text() {
                info!("{} sent a message: {}", from, text);
            } else if msg.photo().is_some() {
                info!("{} sent a photo", from);
            } else {
                debug!("{} sent a message: {:#?}", from, msg.kind);
            }
        }
        UpdateKind::CallbackQuery(query) => {
            info!("{} pressed a button: {:?}", from, query.data);
        }
        _ => {}
    }

    true
}

async fn default_handler(update: Update) -> HandlerResult {
    debug!("Update ({}) is not handled!", update.id);
    Ok(())
}

pub(crate) async fn build_dispatcher(
    bot: Bot,
    mut module_mgr: ModuleManager,
) -> Result<TeloxideDispatcher, Error> {
    // Load dependencies.
    let mut dep_map = DependencyMap::new();
    module_mgr.register_dependencies(&mut dep_map).await?;

    // Build handler chain.
    let mut biz_handler = dptree::entry();
    module_mgr.with_all_modules(|m| {
        biz_handler = biz_handler.clone().branch(m.handler_chain());
    });
    let handler = dptree::filter(update_filter)
        .chain(biz_handler)
        .branch(dptree::endpoint(default_handler));

    Ok(Dispatcher::builder(bot, handler)
        .dependencies(dep_map)
        .enable_ctrlc_handler()
        .build())
}
