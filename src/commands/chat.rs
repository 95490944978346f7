use std::future::Future;
use std::io::{self, Write};
use std::path::PathBuf;

use tracing::{info, warn};

use super::input::InputLines;

use crate::doc_processor::Document;
use crate::llm::{ChatCompletion, ChatResponse, LlmError};
use crate::prompt::PromptAssembler;

const EXIT_COMMANDS: &[&str] = &["quit", "exit", "q"];

/// How a line typed at the prompt is interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input<'a> {
    Quit,
    Empty,
    Question(&'a str),
}

pub fn parse_input(line: &str) -> Input<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        Input::Empty
    } else if EXIT_COMMANDS.contains(&trimmed.to_lowercase().as_str()) {
        Input::Quit
    } else {
        Input::Question(trimmed)
    }
}

/// Why the session stopped. All of these are a clean exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Quit,
    EndOfInput,
    Interrupted,
}

/// One question/answer loop over a document that stays loaded for the whole session.
pub struct Session<'a, C> {
    client: &'a C,
    assembler: &'a PromptAssembler,
    document: &'a Document,
}

impl<'a, C: ChatCompletion> Session<'a, C> {
    pub fn new(client: &'a C, assembler: &'a PromptAssembler, document: &'a Document) -> Self {
        Self {
            client,
            assembler,
            document,
        }
    }

    /// Answer a single question with the document as context.
    pub async fn ask(&self, question: &str) -> Result<ChatResponse, LlmError> {
        let prompt = self.assembler.assemble(question, Some(&self.document.text));
        let request = self.client.build_request(prompt.messages);
        self.client.complete(&request).await
    }

    /// Run until the user quits, input ends, or `shutdown` resolves.
    ///
    /// A failed turn is reported on `out` and the loop carries on.
    pub async fn run<W, S>(
        &self,
        lines: &mut InputLines,
        out: &mut W,
        shutdown: S,
    ) -> io::Result<SessionEnd>
    where
        W: Write,
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        writeln!(out, "Ask questions about {} (type 'quit' or 'exit' to stop)", self.document.file_name())?;
        writeln!(out)?;

        loop {
            write!(out, "You: ")?;
            out.flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = &mut shutdown => return goodbye(out, SessionEnd::Interrupted),
            };
            let Some(line) = line else {
                return goodbye(out, SessionEnd::EndOfInput);
            };

            let question = match parse_input(&line) {
                Input::Quit => return goodbye(out, SessionEnd::Quit),
                Input::Empty => continue,
                Input::Question(q) => q,
            };

            let result = tokio::select! {
                result = self.ask(question) => result,
                _ = &mut shutdown => return goodbye(out, SessionEnd::Interrupted),
            };

            match result {
                Ok(response) => {
                    writeln!(out)?;
                    writeln!(out, "Bot: {}", response.answer)?;
                    writeln!(out)?;
                }
                Err(e) => {
                    warn!(error = %e, "Question failed");
                    writeln!(out)?;
                    writeln!(out, "Error: {e}")?;
                    writeln!(out)?;
                }
            }
        }
    }
}

fn goodbye<W: Write>(out: &mut W, end: SessionEnd) -> io::Result<SessionEnd> {
    writeln!(out)?;
    writeln!(out, "Goodbye!")?;
    info!(reason = ?end, "Session ended");
    Ok(end)
}

/// Let the user pick one of several documents by number.
///
/// Returns `None` when input ends or the user types an exit command.
pub async fn choose_document<W: Write>(
    lines: &mut InputLines,
    out: &mut W,
    candidates: &[PathBuf],
) -> io::Result<Option<PathBuf>> {
    match candidates {
        [] => return Ok(None),
        [only] => return Ok(Some(only.clone())),
        _ => {}
    }

    writeln!(out, "Available PDF files:")?;
    for (i, path) in candidates.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        writeln!(out, "   {}. {}", i + 1, name)?;
    }
    writeln!(out)?;

    loop {
        write!(out, "Select a PDF (1-{}): ", candidates.len())?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            return Ok(None);
        };
        if parse_input(&line) == Input::Quit {
            return Ok(None);
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=candidates.len()).contains(&n) => return Ok(Some(candidates[n - 1].clone())),
            Ok(_) => writeln!(out, "Please enter a number between 1 and {}", candidates.len())?,
            Err(_) => writeln!(out, "Please enter a valid number")?,
        }
    }
}
