//! Event notification hub for resource lifecycle events.
//!
//! This crate fans out create/change/delete events to registered webhook
//! listeners:
//!
//! - [`ListenerRegistry`]: the set of listeners, their callbacks and filters.
//! - [`EventFilter`]: the `query` language a listener narrows its feed with.
//! - [`Event`]: the immutable, uniquely identified event envelope.
//! - [`Dispatcher`]: concurrent, bounded, per-listener-isolated fan-out
//!   with retry and backoff.
//! - [`delivery`]: the [`DeliveryChannel`] seam and its webhook implementation.
//! - [`DispatchReport`]: the structured outcome of one fan-out.
//! - [`NotificationHub`]: owns all of the above, receives committed
//!   mutations from the resource store, and shuts down within a grace period.

pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod envelope;
pub mod filter;
pub mod hub;
pub mod registry;
pub mod report;

pub use config::{HubConfig, RetryPolicy};
pub use delivery::webhook::WebhookDelivery;
pub use delivery::{DeliveryChannel, DeliveryError};
pub use dispatcher::{Dispatcher, PendingDispatch};
pub use envelope::Event;
pub use filter::{EventFilter, FilterError};
pub use hub::NotificationHub;
pub use registry::{Listener, ListenerId, ListenerRegistry, RegistryError};
pub use report::{AttemptRecord, DeliveryOutcome, DispatchReport, ListenerReport};
