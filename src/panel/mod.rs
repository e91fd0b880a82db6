pub mod actions;
pub mod config;
pub mod server;

pub use actions::{DataFile, OnlineStatus, ServerActions};
pub use config::PanelConfig;
