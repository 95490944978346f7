use std::io::{self, BufRead};
use std::thread;

use tokio::sync::mpsc;

/// Console lines read on a dedicated blocking thread and forwarded over a channel.
///
/// `next_line` is cancel safe, and a read still pending on the thread does not
/// hold up runtime shutdown: the thread is detached and dies with the process.
pub struct InputLines {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl InputLines {
    pub fn stdin() -> io::Result<Self> {
        Self::spawn_with(|| io::stdin().lock())
    }

    pub fn from_reader<R>(reader: R) -> io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        Self::spawn_with(move || reader)
    }

    fn spawn_with<F, R>(open: F) -> io::Result<Self>
    where
        F: FnOnce() -> R + Send + 'static,
        R: BufRead,
    {
        let (tx, rx) = mpsc::channel(1);
        thread::Builder::new()
            .name("input-lines".to_string())
            .spawn(move || {
                for line in open().lines() {
                    let failed = line.is_err();
                    if tx.blocking_send(line).is_err() || failed {
                        break;
                    }
                }
            })?;
        Ok(Self { rx })
    }

    /// Next line without its terminator, or `None` once input has ended.
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        match self.rx.recv().await {
            Some(line) => line.map(Some),
            None => Ok(None),
        }
    }
}
