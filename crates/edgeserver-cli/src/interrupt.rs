use std::future::Future;

use edgeserver_client::AbortHandle;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::errors::CliError;

/// Runs `fut` unless Ctrl-C arrives first.
pub async fn until_interrupted<F: Future>(fut: F) -> Result<F::Output, CliError> {
    tokio::select! {
        output = fut => Ok(output),
        _ = tokio::signal::ctrl_c() => {
            warn!(event = "cli.interrupted", domain = "edgeserver", "received interrupt signal");
            Err(CliError::Interrupted)
        }
    }
}

/// Aborts `handle` on Ctrl-C for as long as the returned guard lives.
pub struct AbortOnInterrupt {
    task: JoinHandle<()>,
}

impl AbortOnInterrupt {
    pub fn arm(handle: AbortHandle) -> Self {
        let task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!(event = "cli.interrupted", domain = "edgeserver", "aborting in-flight stream");
                handle.abort();
            }
        });
        Self { task }
    }
}

impl Drop for AbortOnInterrupt {
    fn drop(&mut self) {
        self.task.abort();
    }
}
