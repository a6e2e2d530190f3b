pub(crate) mod ask;
pub(crate) mod config;
pub(crate) mod menu;
pub(crate) mod quotes;
