//! Background tasks that keep a frame client in step with its coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::frame_client::FrameClient;

/// Synchronize the client every `interval` until its coordinator is gone.
pub async fn run_sync_loop(client: Arc<FrameClient>, interval: Duration) {
    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick fires immediately.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        if client.is_detached() {
            break;
        }
        client.synchronize_hints().await;
    }
    debug!(
        tab_id = client.tab_id(),
        frame_id = client.frame_id(),
        "Sync loop stopped"
    );
}

pub fn spawn_sync_loop(client: Arc<FrameClient>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(run_sync_loop(client, interval))
}

/// Apply the coordinator's pool events to the client until the tab closes.
///
/// Returns `None` when the transport offers no event stream.
pub async fn spawn_event_listener(client: Arc<FrameClient>) -> Option<JoinHandle<()>> {
    let mut events = client.transport().subscribe(client.tab_id()).await?;
    let frame_id = client.frame_id();

    Some(tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.affects(frame_id) {
                        client.handle_event(event).await;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(frame_id, skipped, "Missed pool events, resynchronizing");
                    client.synchronize_hints().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
        info!(frame_id, "Event listener stopped");
    }))
}
