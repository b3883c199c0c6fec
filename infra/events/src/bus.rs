use crate::error::EventBusError;
use fxhash::FxHashMap;
use parking_lot::RwLock;
use std::any::{Any, TypeId, type_name};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::trace;

/// Buffered events per channel before lagging subscribers start skipping.
pub const DEFAULT_CAPACITY: usize = 256;
const MAX_CAPACITY: usize = 1 << 16;

/// Anything that can travel on the bus.
pub trait Event: Any + Clone + Send + Sync + 'static {}
impl<T: Any + Clone + Send + Sync + 'static> Event for T {}

#[derive(Debug)]
struct Channel {
    capacity: usize,
    sender: Box<dyn Any + Send + Sync>,
}

#[derive(Debug, Default)]
struct Registry {
    channels: RwLock<FxHashMap<TypeId, Channel>>,
    closed: AtomicBool,
}

/// Cloneable handle to the shared channel registry.
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    registry: Arc<Registry>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to `T` with the default channel capacity.
    ///
    /// # Errors
    /// Returns [`EventBusError::Closed`] after [`EventBus::shutdown`].
    pub fn subscribe<T: Event>(&self) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        self.subscribe_with_capacity::<T>(DEFAULT_CAPACITY)
    }

    /// Subscribes to `T`; `capacity` only applies when this call creates the channel.
    ///
    /// # Errors
    /// Returns [`EventBusError::InvalidCapacity`] for a zero or oversized capacity and
    /// [`EventBusError::Closed`] after shutdown.
    pub fn subscribe_with_capacity<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Receiver<Arc<T>>, EventBusError> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(EventBusError::InvalidCapacity {
                message: format!("{capacity} (expected 1..={MAX_CAPACITY})").into(),
                context: Some(type_name::<T>().into()),
            });
        }
        Ok(self.sender::<T>(capacity)?.subscribe())
    }

    /// Publishes `event` to every current subscriber and returns how many received it.
    ///
    /// # Errors
    /// Returns [`EventBusError::Closed`] after shutdown.
    pub fn publish<T: Event>(&self, event: T) -> Result<usize, EventBusError> {
        self.publish_arc(Arc::new(event))
    }

    /// Same as [`EventBus::publish`] for an already shared event.
    ///
    /// # Errors
    /// Returns [`EventBusError::Closed`] after shutdown.
    pub fn publish_arc<T: Event>(&self, event: Arc<T>) -> Result<usize, EventBusError> {
        let sender = self.sender::<T>(DEFAULT_CAPACITY)?;
        let delivered = sender.send(event).unwrap_or(0);
        trace!(event = type_name::<T>(), delivered, "Event published");
        Ok(delivered)
    }

    /// Number of live subscribers for `T`.
    #[must_use]
    pub fn receiver_count<T: Event>(&self) -> usize {
        self.registry
            .channels
            .read()
            .get(&TypeId::of::<T>())
            .and_then(|channel| channel.sender.downcast_ref::<broadcast::Sender<Arc<T>>>())
            .map_or(0, broadcast::Sender::receiver_count)
    }

    /// Closes every channel; receivers drain what is buffered and then end.
    ///
    /// Returns the number of channels closed.
    #[must_use]
    pub fn shutdown(&self) -> usize {
        self.registry.closed.store(true, Ordering::Release);
        let mut channels = self.registry.channels.write();
        let count = channels.len();
        channels.clear();
        count
    }

    fn sender<T: Event>(
        &self,
        capacity: usize,
    ) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
        if self.registry.closed.load(Ordering::Acquire) {
            return Err(EventBusError::Closed {
                message: type_name::<T>().into(),
                context: None,
            });
        }

        let id = TypeId::of::<T>();
        if let Some(channel) = self.registry.channels.read().get(&id) {
            return downcast::<T>(channel);
        }

        let mut channels = self.registry.channels.write();
        let channel = channels.entry(id).or_insert_with(|| {
            trace!(event = type_name::<T>(), capacity, "Creating event channel");
            let (sender, _) = broadcast::channel::<Arc<T>>(capacity);
            Channel { capacity, sender: Box::new(sender) }
        });
        downcast::<T>(channel)
    }
}

fn downcast<T: Event>(channel: &Channel) -> Result<broadcast::Sender<Arc<T>>, EventBusError> {
    channel.sender.downcast_ref::<broadcast::Sender<Arc<T>>>().cloned().ok_or_else(|| {
        EventBusError::TypeMismatch {
            message: type_name::<T>().into(),
            context: Some(format!("channel registered with capacity {}", channel.capacity).into()),
        }
    })
}
