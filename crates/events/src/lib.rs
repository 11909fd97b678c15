//! Service bus event model and HTTP delivery.
//!
//! - [`ServiceBusEvent`] -- the event descriptor and its versioned wire
//!   parameters ([`EventParams`]).
//! - [`ToServiceBus`] -- the extension point notifications implement.
//! - [`TokenCache`] -- storage for the bus auth token.
//! - [`delivery`] -- the HTTP delivery channel.

pub mod cache;
pub mod delivery;
pub mod event;
pub mod notification;

pub use cache::{InMemoryTokenCache, TokenCache};
pub use delivery::http::{DeliveryError, HttpDeliveryChannel, RequestFailure};
pub use event::{EventParams, ServiceBusEvent};
pub use notification::ToServiceBus;
