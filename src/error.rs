use crate::commands::settings::ConfigError;
use crate::doc_processor::DocumentError;
use crate::llm::LlmError;

/// Top-level error for everything that can go wrong between startup and exit.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("Console I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// Short advice printed alongside a startup failure.
    pub fn hint(&self) -> &'static str {
        match self {
            Error::Config(_) => "Check LLM_PROVIDER and OPENAI_API_KEY in your .env file",
            Error::Document(_) => "Check that the file exists and the PDF is not corrupted or encrypted",
            Error::Llm(_) => "Check your connection, or for ollama make sure `ollama serve` is running",
            Error::Io(_) => "The console could not be read or written",
        }
    }

    /// The one message printed to stderr when startup fails.
    pub fn report(&self) -> String {
        format!("Error: {self}\n{}", self.hint())
    }
}
