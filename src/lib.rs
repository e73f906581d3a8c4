pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod orders;
pub mod state;
pub mod store;
pub mod types;
pub mod webhooks;
