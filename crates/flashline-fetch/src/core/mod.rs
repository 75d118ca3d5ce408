//! Pure helpers: backoff arithmetic and URL/status checks.

mod retry;
mod validation;

pub use retry::retry_delay;
pub use validation::{is_ok, validate_url};
