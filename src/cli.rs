//! Command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use crate::commands::settings::SettingsOverrides;

/// Ask questions about a PDF by handing its full text to a chat model
#[derive(Parser, Debug)]
#[command(name = "pdf-chat", about, version)]
pub struct Cli {
    /// Document to chat about (.pdf, .txt or .md). When omitted, PDFs in --data-dir are offered.
    pub document: Option<PathBuf>,

    /// Directory searched for PDFs when no document is given
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Provider to use (openai or ollama). Uses LLM_PROVIDER env if not set.
    #[arg(long)]
    pub provider: Option<String>,

    /// Model to use. Uses OPENAI_MODEL / OLLAMA_MODEL env if not set.
    #[arg(long)]
    pub model: Option<String>,

    /// Sampling temperature between 0.0 and 1.0. Uses TEMPERATURE env if not set.
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Answer a single question and exit instead of starting an interactive session
    #[arg(long, value_name = "QUESTION")]
    pub ask: Option<String>,

    /// Print the first CHARS characters of the extracted text before chatting
    #[arg(long, value_name = "CHARS")]
    pub preview: Option<usize>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            provider: self.provider.clone(),
            model: self.model.clone(),
            temperature: self.temperature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_flags() {
        let cli = Cli::parse_from([
            "pdf-chat",
            "book.pdf",
            "--provider",
            "ollama",
            "--temperature",
            "0.3",
            "--ask",
            "Who is the author?",
        ]);
        assert_eq!(cli.document, Some(PathBuf::from("book.pdf")));
        assert_eq!(cli.data_dir, PathBuf::from("data"));
        assert_eq!(cli.ask.as_deref(), Some("Who is the author?"));

        let overrides = cli.overrides();
        assert_eq!(overrides.provider.as_deref(), Some("ollama"));
        assert_eq!(overrides.temperature, Some(0.3));
        assert!(overrides.model.is_none());
    }
}
