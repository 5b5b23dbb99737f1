//! Common types shared by the certkeep crates.

pub mod ids;
pub mod logging;
pub mod retry;

pub use ids::{SiteId, SYSTEM_SITE};
pub use logging::LogFormat;
pub use retry::{RetryContext, DEFAULT_MAX_ATTEMPTS};
