pub mod app;
pub mod config;
pub mod error;
pub mod listing;
pub mod logging;
pub mod media;
pub mod mortgage;
pub mod submission;
pub mod ui;
pub mod valuation;

pub use config::{AppConfig, CliArgs};
pub use logging::init_logging;
