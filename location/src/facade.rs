use std::fmt;
use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{self, Either};
use futures_timer::Delay;
use log::{debug, info, warn};

use crate::permission::{self, PermissionStatus};
use crate::prefs::{LANGUAGE_KEY, PreferenceStore, normalize_language};
use crate::{
    ConnectionDelegate, ConnectionHooks, ConnectionResult, ConnectionState, Fix, GeocodeError,
    Geocoder, LocationClient, LocationError, LocationRequest, LocationResult, ServiceAvailability,
    sys,
};

/// Receiver of a one-shot location fix.
pub trait FixDelegate: Send + Sync {
    /// A fix arrived.
    fn on_location(&self, latitude: f64, longitude: f64);
}

impl<F> FixDelegate for F
where
    F: Fn(f64, f64) + Send + Sync,
{
    fn on_location(&self, latitude: f64, longitude: f64) {
        self(latitude, longitude);
    }
}

#[derive(Default)]
struct State {
    connection: ConnectionState,
    delegate: Option<Arc<dyn ConnectionDelegate>>,
    latest: Option<Fix>,
}

/// State shared between the facade and the hooks installed in its client.
#[derive(Default)]
pub(crate) struct Shared {
    state: Mutex<State>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn store_fix(&self, fix: Fix) {
        self.lock().latest = Some(fix);
    }

    pub(crate) fn handle_connected(&self) {
        let delegate = {
            let mut state = self.lock();
            state.connection = ConnectionState::Connected;
            state.delegate.clone()
        };
        info!("location client connected");

        match delegate {
            Some(delegate) => delegate.on_connected(),
            None => warn!("location client connected with no delegate registered"),
        }
    }

    pub(crate) fn handle_suspended(&self, cause: i32) {
        info!("location client connection suspended (cause {cause})");
        self.lock().connection = ConnectionState::Disconnected;
    }

    pub(crate) fn handle_failed(&self, result: ConnectionResult) {
        let delegate = {
            let mut state = self.lock();
            if state.connection.is_failed() {
                debug!("already resolving a connection failure, ignoring: {result}");
                return;
            }
            state.connection = if result.has_resolution() {
                ConnectionState::FailedResolvable(result.clone())
            } else {
                ConnectionState::FailedFatal {
                    error_code: result.error_code,
                }
            };
            state.delegate.clone()
        };
        warn!("location client {result}");

        let Some(delegate) = delegate else {
            warn!("connection failure with no delegate registered");
            return;
        };
        if result.has_resolution() {
            delegate.on_connect_need_retry(&result);
        } else {
            delegate.on_connect_failed(result.error_code);
        }
    }
}

/// Facade over a location client, a reverse geocoder and the stored language
/// preference.
///
/// Cloning yields another handle to the same facade.
#[derive(Clone)]
pub struct LocationFacade {
    shared: Arc<Shared>,
    client: Arc<dyn LocationClient>,
    geocoder: Arc<dyn Geocoder>,
    language_code: Arc<str>,
}

impl fmt::Debug for LocationFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationFacade")
            .field("client", &self.client)
            .field("geocoder", &self.geocoder)
            .field("language_code", &self.language_code)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl LocationFacade {
    /// Creates a facade over `client` and `geocoder`, reading the language
    /// code from `preferences`. Does not connect.
    pub fn new(
        client: Arc<dyn LocationClient>,
        geocoder: Arc<dyn Geocoder>,
        preferences: &dyn PreferenceStore,
    ) -> Self {
        let language_code = preferences.get_string(LANGUAGE_KEY).unwrap_or_default();
        let shared = Arc::new(Shared::default());
        client.set_connection_hooks(ConnectionHooks::new(Arc::downgrade(&shared)));

        Self {
            shared,
            client,
            geocoder,
            language_code: language_code.into(),
        }
    }

    /// Creates a facade over this platform's location backends.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::NotAvailable`] if the platform has no
    /// location backend.
    pub fn platform(preferences: &dyn PreferenceStore) -> LocationResult<Self> {
        let client = sys::platform_client()?;
        Ok(Self::new(client, sys::platform_geocoder(), preferences))
    }

    /// Whether the client is connected. Check this before requesting a fix.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.lock().connection.clone()
    }

    /// Connects the client, reporting the outcome to `delegate`.
    ///
    /// Only the first delegate is kept; later calls reuse it. Once a failure
    /// has been reported, further failures stay silent even across new
    /// `connect` calls, so a delegate reconnecting from
    /// [`on_connect_need_retry`](ConnectionDelegate::on_connect_need_retry)
    /// hears about at most one failure. Call [`retry`](Self::retry) after
    /// resolving the failure to have the next one reported again.
    pub fn connect(&self, delegate: Arc<dyn ConnectionDelegate>) {
        {
            let mut state = self.shared.lock();
            if state.delegate.is_none() {
                state.delegate = Some(delegate);
            } else {
                debug!("connection delegate already registered, keeping the first one");
            }

            if self.client.is_connecting() || self.client.is_connected() {
                return;
            }
            if !state.connection.is_failed() {
                state.connection = ConnectionState::Connecting;
            }
        }

        debug!("connecting location client");
        self.client.connect();
    }

    /// Clears a reported failure and connects again with the registered
    /// delegate. The next failure is reported to it.
    ///
    /// Does nothing unless the facade is in a failed state.
    pub fn retry(&self) {
        {
            let mut state = self.shared.lock();
            if !state.connection.is_failed() {
                debug!("nothing to retry in state {:?}", state.connection);
                return;
            }
            if self.client.is_connected() {
                state.connection = ConnectionState::Connected;
                return;
            }
            state.connection = ConnectionState::Connecting;
            if self.client.is_connecting() {
                return;
            }
        }

        info!("retrying location client connection");
        self.client.connect();
    }

    /// Requests a single fix and reports it to `delegate`.
    ///
    /// The fix is stored as the latest location before the delegate runs.
    /// An update without a location is dropped, and errors registering the
    /// request are only logged. Use [`request_location`](Self::request_location)
    /// to observe failures.
    pub fn force_request_location(&self, delegate: Arc<dyn FixDelegate>) {
        let shared = Arc::downgrade(&self.shared);
        let listener = Box::new(move |fix: Option<Fix>| {
            let Some(fix) = fix else {
                debug!("location update without a fix");
                return;
            };
            if let Some(shared) = shared.upgrade() {
                shared.store_fix(fix);
            }
            delegate.on_location(fix.latitude, fix.longitude);
        });

        if let Err(err) = self
            .client
            .request_updates(LocationRequest::one_shot(), listener)
        {
            warn!("location request failed: {err}");
        }
    }

    /// Requests a single fix.
    ///
    /// # Errors
    ///
    /// - [`LocationError::NotConnected`] if the client is not connected.
    /// - [`LocationError::NoFix`] if the provider reported no location.
    /// - [`LocationError::Cancelled`] if the client dropped the request.
    /// - Any error the client raised registering the request.
    pub async fn request_location(&self) -> LocationResult<Fix> {
        if !self.is_connected() {
            return Err(LocationError::NotConnected);
        }

        let (sender, receiver) = async_channel::bounded(1);
        let shared = Arc::downgrade(&self.shared);
        let listener = Box::new(move |fix: Option<Fix>| {
            if let (Some(fix), Some(shared)) = (fix, shared.upgrade()) {
                shared.store_fix(fix);
            }
            if sender.try_send(fix.ok_or(LocationError::NoFix)).is_err() {
                debug!("dropping location update, request already settled");
            }
        });
        self.client
            .request_updates(LocationRequest::one_shot(), listener)?;

        receiver
            .recv()
            .await
            .map_err(|_| LocationError::Cancelled)?
    }

    /// Requests a single fix, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// [`LocationError::Timeout`] if no update arrived in time, otherwise as
    /// [`request_location`](Self::request_location).
    pub async fn request_location_timeout(&self, timeout: Duration) -> LocationResult<Fix> {
        let request = pin!(self.request_location());
        match future::select(request, Delay::new(timeout)).await {
            Either::Left((result, _)) => result,
            Either::Right(((), _)) => Err(LocationError::Timeout),
        }
    }

    /// The most recent fix, if any has arrived.
    #[must_use]
    pub fn latest_location(&self) -> Option<Fix> {
        self.shared.lock().latest
    }

    /// District string for the latest fix.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::NoFix`] if no fix has arrived yet.
    pub fn latest_address_district(&self, language_code: &str) -> LocationResult<String> {
        let fix = self.latest_location().ok_or(LocationError::NoFix)?;
        Ok(self.address_district(language_code, fix.latitude, fix.longitude))
    }

    /// District string (admin area, locality, thoroughfare) at the
    /// coordinate. Any geocoding failure yields an empty string.
    #[must_use]
    pub fn address_district(&self, language_code: &str, latitude: f64, longitude: f64) -> String {
        self.lookup_district(language_code, latitude, longitude)
            .unwrap_or_else(|err| {
                debug!("district lookup at ({latitude}, {longitude}) failed: {err}");
                String::new()
            })
    }

    /// District string at the coordinate.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::NoResult`] if the geocoder found nothing, or
    /// the geocoder's own error.
    pub fn lookup_district(
        &self,
        language_code: &str,
        latitude: f64,
        longitude: f64,
    ) -> Result<String, GeocodeError> {
        let addresses = self
            .geocoder
            .reverse_geocode(latitude, longitude, 1, language_code)?;
        addresses
            .first()
            .map(crate::Address::district)
            .ok_or(GeocodeError::NoResult)
    }

    /// The stored language code if it names a Chinese locale, `"en"` otherwise.
    #[must_use]
    pub fn read_language_code(&self) -> String {
        normalize_language(&self.language_code).to_owned()
    }

    /// Whether the provider service is usable.
    #[must_use]
    pub fn service_availability(&self) -> ServiceAvailability {
        self.client.availability()
    }

    /// Whether device location is switched on.
    #[must_use]
    pub fn is_provider_enabled(&self) -> bool {
        self.client.is_provider_enabled()
    }

    /// Makes sure the location permission is granted, prompting if it has
    /// not been decided yet.
    ///
    /// # Errors
    ///
    /// Returns [`LocationError::PermissionDenied`] if the permission is
    /// refused or restricted.
    pub async fn ensure_permission(&self) -> LocationResult<()> {
        let status = match permission::check().await {
            PermissionStatus::NotDetermined => permission::request().await?,
            status => status,
        };

        if status == PermissionStatus::Granted {
            Ok(())
        } else {
            Err(LocationError::PermissionDenied)
        }
    }
}
