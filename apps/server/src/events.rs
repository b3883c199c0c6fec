//! Background listeners turning domain events into structured log lines.

use apex::features::ladder::LadderChanged;
use apex::features::placement::PlacementChanged;
use apex_event_bus::{Event, EventBus, EventReceiverExt};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Spawns one listener per event type. The tasks end when the bus shuts down.
///
/// # Errors
/// Returns an error if the bus refuses a subscription.
pub(crate) fn spawn_listeners(events: &EventBus) -> anyhow::Result<Vec<JoinHandle<()>>> {
    Ok(vec![
        listen(events, |event: &PlacementChanged| {
            info!(
                domain = %event.domain_id,
                candidate = %event.candidate_id,
                reason = event.reason.as_str(),
                from = ?event.from_tier,
                to = ?event.to_tier,
                status = ?event.status,
                "Placement changed"
            );
        })?,
        listen(events, |event: &LadderChanged| {
            info!(domain = %event.domain_id, change = ?event.change, "Ladder changed");
        })?,
    ])
}

fn listen<T, F>(events: &EventBus, handle: F) -> anyhow::Result<JoinHandle<()>>
where
    T: Event,
    F: Fn(&T) + Send + 'static,
{
    let mut receiver = events.subscribe::<T>()?;
    Ok(tokio::spawn(async move {
        while let Some(event) = receiver.next_event().await {
            handle(&*event);
        }
        debug!(event = std::any::type_name::<T>(), "Event listener stopped");
    }))
}
