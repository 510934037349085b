use std::io;

use tokio::{
    select,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
    task::{self, JoinHandle},
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels `cancel_token` on Ctrl+C or SIGTERM.
pub fn run(cancel_token: CancellationToken) -> io::Result<JoinHandle<()>> {
    let mut sigterm = signal(SignalKind::terminate())?;
    Ok(task::spawn(async move {
        select! {
            _ = cancel_token.cancelled() => return,
            _ = ctrl_c() => warn!("Ctrl+C received"),
            _ = sigterm.recv() => warn!("SIGTERM received"),
        };
        info!("Cancelling pending retries");
        cancel_token.cancel();
    }))
}
