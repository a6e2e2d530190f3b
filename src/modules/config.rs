use anyhow::Error;
use teloxide::prelude::*;

use crate::{config::SharedConfig, identity::BotIdentity, module_mgr::Module};

/// Provides the values every other module reads: the configuration and
/// the bot's identity.
pub(crate) struct Config {
    config: Option<SharedConfig>,
    identity: Option<BotIdentity>,
}

impl Config {
    pub(crate) fn new(config: SharedConfig, identity: BotIdentity) -> Self {
        Self {
            config: Some(config),
            identity: Some(identity),
        }
    }
}

#[async_trait]
impl Module for Config {
    async fn register_dependency(&mut self, dep_map: &mut DependencyMap) -> Result<(), Error> {
        let config = self
            .config
            .take()
            .ok_or_else(|| anyhow!("Config module is registered twice"))?;
        let identity = self
            .identity
            .take()
            .ok_or_else(|| anyhow!("Config module is registered twice"))?;
        dep_map.insert(config);
        dep_map.insert(identity);
        Ok(())
    }
}
