pub mod backoff;
pub mod config;
pub mod types;

pub use backoff::RetryPolicy;
pub use config::{Config, ConfigError};
pub use types::*;
