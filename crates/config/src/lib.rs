// Configuration loading

pub mod context;
pub mod date_mask;
pub mod error;

pub use context::Context;
pub use error::ConfigError;
