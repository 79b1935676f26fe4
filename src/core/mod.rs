//! Core utilities, configuration, and the quota/entitlement logic

pub mod admission;
pub mod config;
pub mod error;
pub mod logging;
pub mod quota;
pub mod stats;
pub mod utils;
pub mod vip;

// Re-exports for convenience
pub use admission::{Decision, ContentType};
pub use error::{AppError, AppResult};
pub use logging::init_logger;
