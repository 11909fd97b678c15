//! `servicebus-core` -- zero-I/O building blocks shared by the delivery
//! channels: configuration, the action-type vocabulary, the common error
//! type, and hashing helpers.

pub mod action;
pub mod config;
pub mod error;
pub mod hashing;
pub mod types;

pub use action::ActionType;
pub use config::{ServiceBusConfig, SqsConfig};
pub use error::CoreError;
