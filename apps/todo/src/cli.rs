//! Line-oriented front end.
//!
//! Each input line becomes one submission and each creation becomes one JSON
//! line of output. [`run`] owns the application for its whole life: it
//! settles and shuts it down once the input ends.

use crate::app::{App, AppError};
use crate::types::{Creation, Submission, WorkerStatus};
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use todo_ports_core::port::PortReceiver;

/// Errors of the line-oriented front end
#[derive(Error, Debug)]
pub enum CliError {
    /// Reading input or writing output failed
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A creation could not be rendered as JSON
    #[error("failed to render creation: {0}")]
    Json(#[from] serde_json::Error),

    /// The application refused a submission or failed to stop cleanly
    #[error(transparent)]
    App(#[from] AppError),

    /// The creation port was already taken from the application
    #[error("creation output already taken")]
    OutputTaken,
}

/// What a run did
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Summary {
    /// Non-blank input lines submitted
    pub submitted: usize,
    /// Creations written to the output
    pub printed: usize,
    /// Todos held by the core at the end
    pub todos: usize,
    /// Caching worker status at the end
    pub worker: WorkerStatus,
    /// Last error recorded by the core
    pub last_error: Option<String>,
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} todo(s) created, caching worker ", self.todos)?;
        match &self.worker {
            WorkerStatus::NotStarted => write!(f, "not started")?,
            WorkerStatus::Disabled => write!(f, "disabled")?,
            WorkerStatus::Registering => write!(f, "still registering")?,
            WorkerStatus::Registered { scope } => write!(f, "registered for {scope}")?,
            WorkerStatus::Failed { error } => write!(f, "failed ({error})")?,
        }
        if let Some(error) = &self.last_error {
            write!(f, "\nlast error: {error}")?;
        }
        Ok(())
    }
}

/// Submit every input line, write every creation, then stop the application
///
/// A line holding a JSON object is submitted verbatim, any other non-blank
/// line becomes `{ "text": line }`. Creations are written in arrival order,
/// one JSON object per line.
///
/// # Errors
///
/// Returns [`CliError::OutputTaken`] if the creation port was taken before,
/// [`CliError::Io`] or [`CliError::Json`] if output fails, and
/// [`CliError::App`] if a submission is refused or the application does not
/// stop cleanly.
#[tracing::instrument(skip_all, name = "cli_run")]
pub async fn run<R, W>(mut app: App, input: R, mut output: W) -> Result<Summary, CliError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut creations = app.take_creations().ok_or(CliError::OutputTaken)?;
    let mut submitted = 0;
    let mut printed = 0;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(submission) = Submission::from_input_line(&line) else {
            continue;
        };
        app.submit(submission).await?;
        submitted += 1;
        printed += write_ready(&mut creations, &mut output).await?;
    }

    let timeout = app.config().shutdown_timeout();
    if let Err(error) = app.settle(timeout).await {
        tracing::warn!(%error, "Input finished with submissions still pending");
    }
    let (todos, worker, last_error) = app
        .state(|s| (s.count(), s.worker.clone(), s.last_error.clone()))
        .await;

    app.shutdown().await?;

    // The port closes once the application has stopped
    while let Some(creation) = creations.recv().await {
        write_creation(&creation, &mut output).await?;
        printed += 1;
    }
    output.flush().await?;

    Ok(Summary {
        submitted,
        printed,
        todos,
        worker,
        last_error,
    })
}

async fn write_ready<W>(
    creations: &mut PortReceiver<Creation>,
    output: &mut W,
) -> Result<usize, CliError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while let Some(creation) = creations.try_recv() {
        write_creation(&creation, output).await?;
        written += 1;
    }
    Ok(written)
}

async fn write_creation<W>(creation: &Creation, output: &mut W) -> Result<(), CliError>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_vec(creation)?;
    line.push(b'\n');
    output.write_all(&line).await?;
    Ok(())
}
