use async_trait::async_trait;
use std::io::{BufRead, Write};

/// Answers yes/no questions raised while planning a transfer.
#[async_trait]
pub trait Confirm: Send + Sync {
    /// Returns `true` only on an explicit yes.
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Asks on the terminal: prompt to stderr, answer from stdin.
///
/// Anything but `y`/`yes` (case-insensitive), including EOF or a read
/// error, counts as no.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

#[async_trait]
impl Confirm for TerminalConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let prompt = prompt.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr().lock();
            let _ = write!(stderr, "{prompt} [y/N] ");
            let _ = stderr.flush();
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await;
        match answer {
            Ok(Ok(line)) => is_yes(&line),
            Ok(Err(error)) => {
                tracing::warn!(%error, "failed to read confirmation, assuming no");
                false
            },
            Err(error) => {
                tracing::warn!(%error, "confirmation prompt failed, assuming no");
                false
            },
        }
    }
}

/// Fixed answer, for non-interactive use.
#[derive(Debug, Clone, Copy)]
pub struct Always(pub bool);

#[async_trait]
impl Confirm for Always {
    async fn confirm(&self, prompt: &str) -> bool {
        tracing::debug!(prompt, answer = self.0, "answered confirmation without asking");
        self.0
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
