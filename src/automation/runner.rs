// Copyright (c) 2024 Mike Tsao

use crate::{traits::HandlesTransport, types::TransportEvent};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use log::{error, info};
use std::{
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

/// How long the run loop waits for a message before checking the stop flag.
pub const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Feeds transport messages from `receiver` to `handler`, one at a time,
/// until `stop` is set, the channel disconnects, or the handler fails.
///
/// On every exit path, the handler sees a final [TransportEvent::Stop] and
/// then [HandlesTransport::shutdown()]. The handler's error, if any, wins
/// over a shutdown error.
pub fn run_until_stopped<H: HandlesTransport + ?Sized>(
    handler: &mut H,
    receiver: &Receiver<TransportEvent>,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let result = loop {
        if stop.load(Ordering::Relaxed) {
            info!("Stop requested; shutting down");
            break Ok(());
        }
        match receiver.recv_timeout(POLL_INTERVAL) {
            Ok(event) => {
                if let Err(e) = handler.handle_transport(event) {
                    error!("While handling {event}: {e:?}");
                    break Err(e);
                }
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                info!("Transport source closed");
                break Ok(());
            }
        }
    };

    let stopped = handler.handle_transport(TransportEvent::Stop);
    let shut_down = handler.shutdown();
    result.and(stopped).and(shut_down)
}
