pub mod browser;
pub mod config;
pub mod notifier;
pub mod pipeline;
pub mod scrape;
pub mod store;
pub mod telegram;
