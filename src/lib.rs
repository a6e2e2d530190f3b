//! An office helper bot for Telegram.
//!
//! Deskmate is a Telegram bot based on [`teloxide`](https://docs.rs/teloxide/latest/teloxide/)
//! framework. It shows a menu with links to the team's documents, serves a
//! "quote of the day" image picked deterministically from a shared
//! collection, and forwards questions to an OpenAI chat model.
//!
//! ## Getting Started
//!
//! ### Using via CLI
//!
//! Deskmate features a single-binary executable, you can serve the bot by
//! simply running the command below:
//!
//! ```shell
//! $ /path/to/deskmate -c your_config.json
//! ```
//!
//! The configuration is described in [`config`] module.
//!
//! ### Using via library
//!
//! Deskmate can also be used as a library, therefore you can run it along
//! with your code in the same process. Checkout the [`app`] module to learn
//! more about it.
//!
//! ## Quote of the day
//!
//! Admins add quotes with `/addquote` followed by a photo. The collection
//! lives in a JSON document (see [`quote_store`]) and [`daily`] picks one
//! entry per UTC day from the SHA-256 digest of the date.

#[macro_use]
extern crate log;
#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate async_trait;

pub mod app;
pub mod config;
pub mod daily;
mod dispatcher;
mod health;
mod identity;
mod module_mgr;
mod modules;
pub mod quote_store;
mod types;
mod utils;
