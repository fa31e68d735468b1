//! The external location-service client the facade drives.

use std::fmt::Debug;

use crate::{ConnectionHooks, Fix, LocationRequest, LocationResult};

/// Listener for a location request.
///
/// Invoked at most `num_updates` times with a fix, or `None` when the
/// provider reported an update without a location.
pub type FixListener = Box<dyn FnMut(Option<Fix>) + Send>;

/// Whether the provider service is usable on this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceAvailability {
    /// The service is installed and current.
    Available,
    /// The service is installed but must be updated first.
    UpdateRequired,
    /// The service is not present.
    Missing,
}

/// A location-service client.
///
/// Implementations connect asynchronously and report the outcome through the
/// [`ConnectionHooks`] installed by the facade.
pub trait LocationClient: Send + Sync + Debug {
    /// Installs the sink for connection events. Called once by the facade.
    fn set_connection_hooks(&self, hooks: ConnectionHooks);

    /// Starts connecting. Returns immediately.
    fn connect(&self);

    /// Whether the client is connected.
    fn is_connected(&self) -> bool;

    /// Whether a connection attempt is in flight.
    fn is_connecting(&self) -> bool;

    /// Registers `listener` for the updates described by `request`.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::NotConnected`](crate::LocationError::NotConnected)
    /// if the client is not connected, or
    /// [`LocationError::PermissionDenied`](crate::LocationError::PermissionDenied)
    /// if the application may not read location.
    fn request_updates(&self, request: LocationRequest, listener: FixListener)
    -> LocationResult<()>;

    /// Whether the provider service is usable.
    fn availability(&self) -> ServiceAvailability {
        ServiceAvailability::Available
    }

    /// Whether device location is switched on.
    fn is_provider_enabled(&self) -> bool {
        true
    }
}
