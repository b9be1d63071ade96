pub mod commands;
pub mod config;
pub mod conversation;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod llm;
pub mod loader;
pub mod pipeline;
pub mod qa;
pub mod splitter;

pub use error::{DocQaError, Result};
