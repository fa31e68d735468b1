//! Windows location implementation using WinRT Geolocator and MapLocationFinder.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, warn};
use windows::Devices::Geolocation::{
    BasicGeoposition, GeolocationAccessStatus, Geolocator, Geopoint, PositionAccuracy,
    PositionStatus,
};
use windows::Services::Maps::{MapLocationFinder, MapLocationFinderStatus};
use windows::core::HSTRING;

use crate::permission::{PermissionError, PermissionStatus};
use crate::{
    Address, ConnectionHooks, ConnectionResult, Fix, FixListener, GeocodeError, Geocoder,
    LocationClient, LocationError, LocationRequest, LocationResult, Priority, Resolution,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Phase {
    #[default]
    Idle,
    Connecting,
    Connected,
}

#[derive(Default)]
struct Inner {
    phase: Phase,
    hooks: Option<ConnectionHooks>,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn request_access() -> windows::core::Result<GeolocationAccessStatus> {
    Geolocator::RequestAccessAsync()?.get()
}

/// Location client backed by the WinRT `Geolocator`.
///
/// Connecting requests geolocation access; each request reads one position.
#[derive(Default)]
pub struct WinRtClient {
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for WinRtClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WinRtClient")
            .field("phase", &lock(&self.inner).phase)
            .finish()
    }
}

impl WinRtClient {
    /// Creates a disconnected client.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocationClient for WinRtClient {
    fn set_connection_hooks(&self, hooks: ConnectionHooks) {
        lock(&self.inner).hooks = Some(hooks);
    }

    fn connect(&self) {
        {
            let mut inner = lock(&self.inner);
            if inner.phase != Phase::Idle {
                return;
            }
            inner.phase = Phase::Connecting;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("winrt-connect".into())
            .spawn(move || {
                let outcome = match request_access() {
                    Ok(GeolocationAccessStatus::Allowed) => Ok(()),
                    Ok(GeolocationAccessStatus::Denied) => Err(ConnectionResult::resolvable(
                        ConnectionResult::ACCESS_DENIED,
                        Resolution::GrantPermission,
                    )),
                    Ok(_) => Err(ConnectionResult::fatal(ConnectionResult::API_UNAVAILABLE)),
                    Err(err) => Err(ConnectionResult::fatal(ConnectionResult::INTERNAL_ERROR)
                        .with_message(err.message().to_string())),
                };

                let hooks = {
                    let mut guard = lock(&inner);
                    guard.phase = if outcome.is_ok() {
                        Phase::Connected
                    } else {
                        Phase::Idle
                    };
                    guard.hooks.clone()
                };

                let Some(hooks) = hooks else {
                    warn!("Geolocator access finished with no hooks installed");
                    return;
                };
                match outcome {
                    Ok(()) => hooks.connected(),
                    Err(result) => hooks.failed(result),
                }
            });

        if let Err(err) = spawned {
            let hooks = {
                let mut guard = lock(&self.inner);
                guard.phase = Phase::Idle;
                guard.hooks.clone()
            };
            if let Some(hooks) = hooks {
                hooks.failed(
                    ConnectionResult::fatal(ConnectionResult::INTERNAL_ERROR)
                        .with_message(err.to_string()),
                );
            }
        }
    }

    fn is_connected(&self) -> bool {
        lock(&self.inner).phase == Phase::Connected
    }

    fn is_connecting(&self) -> bool {
        lock(&self.inner).phase == Phase::Connecting
    }

    fn request_updates(
        &self,
        request: LocationRequest,
        mut listener: FixListener,
    ) -> LocationResult<()> {
        if !self.is_connected() {
            return Err(LocationError::NotConnected);
        }

        thread::Builder::new()
            .name("winrt-fix".into())
            .spawn(move || {
                for update in 0..request.num_updates {
                    if update > 0 {
                        thread::sleep(request.interval);
                    }
                    match read_position(request.priority) {
                        Ok(fix) => listener(Some(fix)),
                        Err(err) => {
                            warn!("failed to read Geolocator position: {}", err.message());
                            listener(None);
                        }
                    }
                }
            })
            .map_err(|err| LocationError::Unknown(format!("failed to spawn fix thread: {err}")))?;

        Ok(())
    }

    fn is_provider_enabled(&self) -> bool {
        match Geolocator::new().and_then(|geolocator| geolocator.LocationStatus()) {
            Ok(status) => {
                status != PositionStatus::Disabled && status != PositionStatus::NotAvailable
            }
            Err(err) => {
                debug!("cannot read Geolocator status: {}", err.message());
                false
            }
        }
    }
}

fn read_position(priority: Priority) -> windows::core::Result<Fix> {
    let geolocator = Geolocator::new()?;
    geolocator.SetDesiredAccuracy(match priority {
        Priority::HighAccuracy => PositionAccuracy::High,
        _ => PositionAccuracy::Default,
    })?;

    let coord = geolocator.GetGeopositionAsync()?.get()?.Coordinate()?;
    let pos = coord.Point()?.Position()?;
    let accuracy = coord.Accuracy().ok();

    Ok(Fix {
        latitude: pos.Latitude,
        longitude: pos.Longitude,
        accuracy,
        timestamp: crate::timestamp_now(),
    })
}

/// Reverse geocoder backed by `MapLocationFinder`.
///
/// Results are localized by the system language; the requested locale is
/// not forwarded.
#[derive(Debug, Clone, Copy, Default)]
pub struct WinRtGeocoder;

impl Geocoder for WinRtGeocoder {
    fn reverse_geocode(
        &self,
        latitude: f64,
        longitude: f64,
        max_results: usize,
        locale: &str,
    ) -> Result<Vec<Address>, GeocodeError> {
        debug!("reverse geocoding ({latitude}, {longitude}) for {locale}");
        let io = |err: windows::core::Error| GeocodeError::Io(err.message().to_string());

        let point = Geopoint::Create(BasicGeoposition {
            Latitude: latitude,
            Longitude: longitude,
            Altitude: 0.0,
        })
        .map_err(io)?;
        let result = MapLocationFinder::FindLocationsAtAsync(&point)
            .and_then(|op| op.get())
            .map_err(io)?;

        match result.Status().map_err(io)? {
            MapLocationFinderStatus::Success => {}
            status => return Err(GeocodeError::Io(format!("map service status {}", status.0))),
        }

        let locations = result.Locations().map_err(io)?;
        let count = locations.Size().map_err(io)?;
        let mut addresses = Vec::new();
        for index in 0..count {
            if addresses.len() >= max_results {
                break;
            }
            let address = locations.GetAt(index).and_then(|l| l.Address()).map_err(io)?;
            addresses.push(Address {
                admin_area: non_empty(address.Region()),
                locality: non_empty(address.Town()),
                thoroughfare: non_empty(address.Street()),
                country_code: non_empty(address.CountryCode()),
                postal_code: non_empty(address.PostCode()),
            });
        }
        Ok(addresses)
    }
}

fn non_empty(value: windows::core::Result<HSTRING>) -> Option<String> {
    value
        .ok()
        .filter(|value| !value.is_empty())
        .map(|value| value.to_string())
}

/// Reads the access state from `Geolocator::LocationStatus`, which never
/// prompts. `NotInitialized` means access has not been requested yet.
pub(crate) async fn check_permission() -> PermissionStatus {
    match Geolocator::new().and_then(|geolocator| geolocator.LocationStatus()) {
        Ok(status) => permission_from_status(status),
        Err(err) => {
            debug!("cannot read Geolocator status: {}", err.message());
            PermissionStatus::NotDetermined
        }
    }
}

fn permission_from_status(status: PositionStatus) -> PermissionStatus {
    match status {
        PositionStatus::Disabled => PermissionStatus::Denied,
        PositionStatus::NotAvailable => PermissionStatus::Restricted,
        PositionStatus::NotInitialized => PermissionStatus::NotDetermined,
        _ => PermissionStatus::Granted,
    }
}

/// Blocks the calling task until the access prompt, if any, is answered.
pub(crate) async fn request_permission() -> Result<PermissionStatus, PermissionError> {
    match request_access() {
        Ok(GeolocationAccessStatus::Allowed) => Ok(PermissionStatus::Granted),
        Ok(GeolocationAccessStatus::Denied) => Ok(PermissionStatus::Denied),
        Ok(_) => Ok(PermissionStatus::NotDetermined),
        Err(err) => Err(PermissionError::Unknown(err.message().to_string())),
    }
}
