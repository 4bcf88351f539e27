//! CLI command handlers. Each command is in its own file.

mod clear_cache;
mod fetch;
mod get;

pub use clear_cache::run_clear_cache;
pub use fetch::run_fetch;
pub use get::run_get;
