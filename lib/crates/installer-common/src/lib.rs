pub mod config;
pub mod types;

pub use config::ServerConfig;
pub use types::*;
