//! External delivery channels for service bus events.
//!
//! The HTTP channel lives here; the queue channel is in `servicebus-cloud`.

pub mod http;
