//! Extension point through which applications describe their events.

use servicebus_core::CoreError;

use crate::event::ServiceBusEvent;

/// Implemented by notifications that can be delivered to the service bus.
///
/// `N` is the notifiable the notification is addressed to. Building the
/// event may fail when the notification carries an invalid action type.
pub trait ToServiceBus<N: ?Sized> {
    fn to_service_bus(&self, notifiable: &N) -> Result<ServiceBusEvent, CoreError>;
}
