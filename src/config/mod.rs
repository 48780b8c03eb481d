pub use self::error::ConfigError;
pub use self::parser::{Config, LimitsConfig};

mod error;
mod parser;
