//! Background listener for a joined channel.
//!
//! Joining a channel must never block the command loop, so each joined
//! channel owns one task that drains its [`Subscription`] and prints what
//! arrives. The dispatcher keeps the [`ChannelListener`] handle and stops the
//! task through a oneshot when the user leaves the channel; the receive
//! timeout keeps the loop returning to the `select!` so a stop signal or a
//! closed store is always noticed.

use std::time::Duration;

use tokio::io::{self, AsyncWriteExt};
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::store::Subscription;

/// Handle to one channel's listen task.
pub struct ChannelListener {
    channel: String,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl ChannelListener {
    /// Spawns the receive loop for an already-established subscription.
    pub fn spawn(subscription: Subscription, receive_timeout: Duration) -> Self {
        let channel = subscription.channel().to_string();
        let (shutdown, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(listen(subscription, receive_timeout, shutdown_rx));
        Self {
            channel,
            shutdown,
            task,
        }
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Signals the task to stop and waits for it to finish.
    pub async fn stop(self) {
        // The send only fails when the task already exited on its own.
        let _ = self.shutdown.send(());
        if let Err(error) = self.task.await {
            warn!(channel = %self.channel, ?error, "listener task did not shut down cleanly");
        }
    }
}

async fn listen(
    mut subscription: Subscription,
    receive_timeout: Duration,
    mut shutdown: oneshot::Receiver<()>,
) {
    let channel = subscription.channel().to_string();
    info!(%channel, "listening");

    loop {
        select! {
            _ = &mut shutdown => break,
            received = subscription.next(receive_timeout) => match received {
                Ok(Some(published)) => {
                    let line = format!("[{channel}] {}", published.text);
                    if let Err(error) = write_stdout(&line).await {
                        warn!(%channel, ?error, "failed to print received message");
                        break;
                    }
                }
                // Nothing arrived within the window; go around so the
                // shutdown arm stays live.
                Ok(None) => {}
                Err(_) => {
                    warn!(%channel, "store connection lost; leaving channel");
                    break;
                }
            }
        }
    }

    info!(%channel, "listener stopped");
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}
