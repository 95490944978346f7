pub mod chat;
pub mod input;
pub mod settings;

use std::future::Future;
use std::io::Write;

use tracing::{debug, info};

use crate::cli::Cli;
use crate::doc_processor::{discover_documents, load_document, DocumentError};
use crate::llm::CompletionClient;
use crate::prompt::{PromptAssembler, DEFAULT_SYSTEM_INSTRUCTION};
use crate::Result;
use chat::{choose_document, parse_input, Input, Session};
use input::InputLines;
use settings::Settings;

/// Resolves once the user presses Ctrl-C.
async fn interrupted() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; never fire.
        std::future::pending::<()>().await;
    }
}

/// Output of `task`, or `None` if `shutdown` resolves first.
pub async fn or_interrupt<T, F, S>(task: F, shutdown: S) -> Option<T>
where
    F: Future<Output = T>,
    S: Future<Output = ()>,
{
    tokio::select! {
        out = task => Some(out),
        _ = shutdown => None,
    }
}

/// Load settings and the document, build the client, then chat.
///
/// Every error returned from here happens before the session starts; errors
/// during the session are reported per turn. Ctrl-C at any step is a clean exit.
pub async fn handle(cli: Cli) -> Result<()> {
    let settings = Settings::from_env()?.with_overrides(cli.overrides())?;
    debug!(?settings, "Resolved settings");

    let mut lines = InputLines::stdin()?;
    let mut out = std::io::stdout();
    let shutdown = interrupted();
    tokio::pin!(shutdown);

    writeln!(out, "{}", "=".repeat(60))?;
    writeln!(out, "{:^60}", "PDF CHATBOT")?;
    writeln!(out, "{}", "=".repeat(60))?;

    let path = match cli.document {
        Some(path) => path,
        None => {
            let candidates = discover_documents(&cli.data_dir)?;
            let picked = or_interrupt(choose_document(&mut lines, &mut out, &candidates), &mut shutdown)
                .await
                .transpose()?
                .flatten();
            match picked {
                Some(path) => path,
                None => {
                    writeln!(out, "\nGoodbye!")?;
                    return Ok(());
                }
            }
        }
    };

    let load = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || load_document(&path))
    };
    let Some(loaded) = or_interrupt(load, &mut shutdown).await else {
        info!("Interrupted while loading the document");
        writeln!(out, "\nGoodbye!")?;
        return Ok(());
    };
    let document = loaded.map_err(|e| DocumentError::Extraction {
        path,
        message: e.to_string(),
    })??;

    if let Some(chars) = cli.preview {
        writeln!(out, "\nPreview:\n{}\n", document.preview(chars))?;
    }

    let client = CompletionClient::from_settings(&settings)?;
    let assembler = PromptAssembler::new(DEFAULT_SYSTEM_INSTRUCTION, settings.context_budget);
    let session = Session::new(&client, &assembler, &document);

    writeln!(out, "Chatbot ready!\n")?;

    match cli.ask {
        Some(question) => match parse_input(&question) {
            Input::Question(q) => match or_interrupt(session.ask(q), &mut shutdown).await {
                Some(response) => writeln!(out, "{}", response?.answer)?,
                None => {
                    info!("Interrupted while waiting for the answer");
                    writeln!(out, "\nGoodbye!")?;
                }
            },
            Input::Empty | Input::Quit => writeln!(out, "Nothing to ask.")?,
        },
        None => {
            session.run(&mut lines, &mut out, &mut shutdown).await?;
        }
    }
    Ok(())
}
