//! Host loop: ticks on the scheduler's cadence, transport events as they
//! arrive.

use std::future::Future;

use rift_protocol::Codec;
use rift_tick::TickScheduler;
use rift_transport::{SessionTransport, TransportEvent};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{CoreEvent, RiftCore};

/// Drives `core` until `shutdown` resolves.
///
/// Transport events are drained before the next tick fires, so a tick
/// never runs on state older than what already arrived. Errors from a
/// single event or tick are logged and the loop carries on; every
/// [`CoreEvent`] produced is handed to `on_event`.
pub async fn run<T, C>(
    core: &mut RiftCore<T, C>,
    events: &mut mpsc::UnboundedReceiver<TransportEvent>,
    scheduler: &mut TickScheduler,
    shutdown: impl Future<Output = ()>,
    mut on_event: impl FnMut(CoreEvent),
) where
    T: SessionTransport,
    C: Codec,
{
    tokio::pin!(shutdown);
    info!(node = %core.local_id(), "driver started");

    loop {
        tokio::select! {
            biased;

            () = &mut shutdown => break,

            Some(event) = events.recv() => {
                debug!(?event, "transport event");
                match core.handle_event(event) {
                    Ok(out) => out.into_iter().for_each(&mut on_event),
                    Err(e) => warn!(error = %e, "transport event failed"),
                }
            }

            tick = scheduler.next_tick() => {
                match core.tick(tick.dt) {
                    Ok(out) => out.into_iter().for_each(&mut on_event),
                    Err(e) => warn!(tick = tick.number, error = %e, "tick failed"),
                }
                scheduler.finish_tick();
            }
        }
    }

    info!(node = %core.local_id(), ticks = scheduler.tick_count(), "driver stopped");
}
