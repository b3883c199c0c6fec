//! # Event Bus
//!
//! Typed, in-process fan-out for domain events shared by the feature slices.
//!
//! One `tokio::sync::broadcast` channel exists per event type, created lazily on the
//! first subscribe or publish. Publishers never block: an event without subscribers
//! is dropped, and a slow subscriber skips ahead instead of stalling everyone else.
//!
//! # Example
//!
//! ```rust
//! use apex_event_bus::{EventBus, EventBusError, EventReceiverExt};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct TierChanged { level: u8 }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), EventBusError> {
//!     let bus = EventBus::new();
//!     let mut rx = bus.subscribe::<TierChanged>()?;
//!     bus.publish(TierChanged { level: 2 })?;
//!
//!     let event = rx.next_event().await;
//!     assert_eq!(event.map(|e| e.level), Some(2));
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod receiver;

pub use bus::{DEFAULT_CAPACITY, Event, EventBus};
pub use error::{EventBusError, EventBusErrorExt};
pub use receiver::EventReceiverExt;
