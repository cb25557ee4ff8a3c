pub mod actions;
pub mod client;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod projector;
pub mod scheduler;
pub mod sink;
pub mod state;
pub mod status;
pub mod text_sanitize;
pub mod ui;
pub mod view;

pub use error::{Error, Result};
