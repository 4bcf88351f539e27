pub mod config;
pub mod logging;

pub mod fetch;
pub mod inflight;
