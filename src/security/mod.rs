pub mod audit_log;
pub mod token_cache;

pub use token_cache::{TokenCache, TokenSource};
