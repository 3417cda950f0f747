use std::future::Future;

use tracing::warn;

use super::error::AppError;

/// Reusable CLI application runner that handles:
/// - Signal handling (SIGINT, SIGTERM, SIGHUP)
/// - Stdout buffering and flushing
/// - Exit codes (0 = success, 1 = error, 130 = SIGINT, 143 = SIGTERM, 129 = SIGHUP)
pub struct CliApp {
    name: String,
    interrupt_note: Option<String>,
}

impl CliApp {
    /// Create a new CLI application runner
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            interrupt_note: None,
        }
    }

    /// Message printed to stderr when a signal cuts the run short
    ///
    /// Loads are not resumable, so the note usually tells the operator that
    /// both stores may hold a partial dataset until the next full load.
    pub fn with_interrupt_note(mut self, note: impl Into<String>) -> Self {
        self.interrupt_note = Some(note.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Run the CLI application with signal handling and exit codes
    ///
    /// Creates a buffered stdout writer and passes it to the main function,
    /// which is responsible for flushing it.
    ///
    /// This function never returns - it calls std::process::exit with the appropriate code
    pub async fn run<F, Fut>(self, main_fn: F) -> !
    where
        F: FnOnce(tokio::io::BufWriter<tokio::io::Stdout>) -> Fut,
        Fut: Future<Output = Result<(), AppError>>,
    {
        let writer = tokio::io::BufWriter::new(tokio::io::stdout());

        tokio::select! {
            result = main_fn(writer) => {
                match result {
                    Ok(()) => std::process::exit(0),
                    Err(e) => {
                        eprintln!("{}: {}", self.name, e);
                        std::process::exit(1);
                    }
                }
            }
            signal_code = wait_for_signal() => {
                if let Some(note) = &self.interrupt_note {
                    eprintln!("{}: {}", self.name, note);
                }
                std::process::exit(signal_code);
            }
        }
    }
}

/// Wait for SIGINT, SIGTERM or SIGHUP (Ctrl+C elsewhere) and return the exit code
///
/// If a handler cannot be installed the future never resolves, so the run is
/// left to finish on its own.
async fn wait_for_signal() -> i32 {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let handlers = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
            signal(SignalKind::hangup()),
        );
        let (mut sigterm, mut sigint, mut sighup) = match handlers {
            (Ok(term), Ok(int), Ok(hup)) => (term, int, hup),
            (term, int, hup) => {
                let error = [term.err(), int.err(), hup.err()]
                    .into_iter()
                    .flatten()
                    .next()
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!(%error, "Signal handlers unavailable");
                return std::future::pending().await;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                eprintln!("Received SIGTERM");
                143
            }
            _ = sigint.recv() => {
                eprintln!("Received SIGINT");
                130
            }
            _ = sighup.recv() => {
                eprintln!("Received SIGHUP");
                129
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(error) = tokio::signal::ctrl_c().await {
            warn!(%error, "Ctrl+C handler unavailable");
            return std::future::pending().await;
        }
        eprintln!("Received Ctrl+C");
        130
    }
}
