//! Context augmented generation over a single document: extract its text,
//! embed it in a chat-completion prompt, and answer questions about it.

pub mod cli;
pub mod commands;
pub mod doc_processor;
pub mod error;
pub mod llm;
pub mod prompt;

pub use error::{Error, Result};
