//! Linux location client using the GeoClue2 D-Bus service.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, warn};
use zbus::blocking::Connection;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Value};

use crate::permission::{PermissionError, PermissionStatus};
use crate::{
    ConnectionHooks, ConnectionResult, Fix, FixListener, LocationClient, LocationError,
    LocationRequest, LocationResult, Priority, Resolution, ServiceAvailability, timestamp_now,
};

const GEOCLUE_BUS: &str = "org.freedesktop.GeoClue2";
const MANAGER_PATH: &str = "/org/freedesktop/GeoClue2/Manager";
const MANAGER_IFACE: &str = "org.freedesktop.GeoClue2.Manager";
const CLIENT_IFACE: &str = "org.freedesktop.GeoClue2.Client";
const LOCATION_IFACE: &str = "org.freedesktop.GeoClue2.Location";
const PROPERTIES_IFACE: &str = "org.freedesktop.DBus.Properties";

const ACCESS_DENIED: &str = "org.freedesktop.DBus.Error.AccessDenied";
const SERVICE_UNKNOWN: &str = "org.freedesktop.DBus.Error.ServiceUnknown";
const NAME_HAS_NO_OWNER: &str = "org.freedesktop.DBus.Error.NameHasNoOwner";

pub(crate) const DEFAULT_DESKTOP_ID: &str = "geokit";

/// Longest a request waits for GeoClue to publish a location.
const FIX_WINDOW: Duration = Duration::from_secs(30);
const MIN_POLL: Duration = Duration::from_millis(100);

// GeoClue accuracy levels
const ACCURACY_COUNTRY: u32 = 1;
const ACCURACY_CITY: u32 = 4;
const ACCURACY_NEIGHBORHOOD: u32 = 5;
const ACCURACY_EXACT: u32 = 8;

#[derive(Clone)]
struct Session {
    connection: Connection,
    client_path: OwnedObjectPath,
}

#[derive(Default)]
enum Phase {
    #[default]
    Idle,
    Connecting,
    Connected(Session),
}

/// Requests sharing the GeoClue client object; only the last one to finish
/// may stop it.
#[derive(Debug, Default)]
struct Usage {
    active: usize,
}

impl Usage {
    const fn acquire(&mut self) {
        self.active += 1;
    }

    /// Returns whether this was the last active request.
    const fn release(&mut self) -> bool {
        self.active = self.active.saturating_sub(1);
        self.active == 0
    }
}

#[derive(Default)]
struct Inner {
    phase: Phase,
    hooks: Option<ConnectionHooks>,
    usage: Usage,
}

fn lock(inner: &Mutex<Inner>) -> MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Location client backed by GeoClue2 on the system bus.
///
/// Connecting obtains a GeoClue client object; each request starts it, waits
/// for a location and stops it again.
pub struct GeoClueClient {
    desktop_id: String,
    inner: Arc<Mutex<Inner>>,
}

impl fmt::Debug for GeoClueClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeoClueClient")
            .field("desktop_id", &self.desktop_id)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl GeoClueClient {
    /// Creates a client identifying itself to GeoClue as `desktop_id`.
    ///
    /// The id should match the application's `.desktop` file name, which is
    /// what GeoClue's agent uses to authorize access.
    #[must_use]
    pub fn new(desktop_id: impl Into<String>) -> Self {
        Self {
            desktop_id: desktop_id.into(),
            inner: Arc::new(Mutex::new(Inner::default())),
        }
    }

    fn session(&self) -> Option<Session> {
        match &lock(&self.inner).phase {
            Phase::Connected(session) => Some(session.clone()),
            _ => None,
        }
    }
}

impl LocationClient for GeoClueClient {
    fn set_connection_hooks(&self, hooks: ConnectionHooks) {
        lock(&self.inner).hooks = Some(hooks);
    }

    fn connect(&self) {
        {
            let mut inner = lock(&self.inner);
            if !matches!(inner.phase, Phase::Idle) {
                return;
            }
            inner.phase = Phase::Connecting;
        }

        let inner = Arc::clone(&self.inner);
        let desktop_id = self.desktop_id.clone();
        let spawned = thread::Builder::new()
            .name("geoclue-connect".into())
            .spawn(move || {
                let outcome = open_session(&desktop_id);
                let hooks = {
                    let mut guard = lock(&inner);
                    guard.phase = match &outcome {
                        Ok(session) => Phase::Connected(session.clone()),
                        Err(_) => Phase::Idle,
                    };
                    guard.hooks.clone()
                };

                let Some(hooks) = hooks else {
                    warn!("GeoClue connection finished with no hooks installed");
                    return;
                };
                match outcome {
                    Ok(_) => hooks.connected(),
                    Err(err) => hooks.failed(connection_result(&err)),
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
        matches!(lock(&self.inner).phase, Phase::Connected(_))
    }

    fn is_connecting(&self) -> bool {
        matches!(lock(&self.inner).phase, Phase::Connecting)
    }

    fn request_updates(
        &self,
        request: LocationRequest,
        mut listener: FixListener,
    ) -> LocationResult<()> {
        let session = self.session().ok_or(LocationError::NotConnected)?;
        lock(&self.inner).usage.acquire();

        let started = set_client_property(
            &session,
            "RequestedAccuracyLevel",
            Value::from(accuracy_level(request.priority)),
        )
        .and_then(|()| call_client(&session, "Start"));
        if let Err(err) = started {
            release(&self.inner, &session);
            return Err(start_error(&err));
        }

        let inner = Arc::clone(&self.inner);
        let worker_session = session.clone();
        let spawned = thread::Builder::new()
            .name("geoclue-fix".into())
            .spawn(move || {
                for update in 0..request.num_updates {
                    if update > 0 {
                        thread::sleep(request.interval);
                    }
                    listener(poll_fix(&worker_session, request.fastest_interval));
                }
                release(&inner, &worker_session);
            });

        if let Err(err) = spawned {
            release(&self.inner, &session);
            return Err(LocationError::Unknown(format!(
                "failed to spawn fix thread: {err}"
            )));
        }
        Ok(())
    }

    fn availability(&self) -> ServiceAvailability {
        let activatable = Connection::system().and_then(|connection| {
            connection
                .call_method(
                    Some("org.freedesktop.DBus"),
                    "/org/freedesktop/DBus",
                    Some("org.freedesktop.DBus"),
                    "ListActivatableNames",
                    &(),
                )?
                .body()
                .deserialize::<Vec<String>>()
        });

        match activatable {
            Ok(names) if names.iter().any(|name| name == GEOCLUE_BUS) => {
                ServiceAvailability::Available
            }
            Ok(_) => ServiceAvailability::Missing,
            Err(err) => {
                debug!("cannot list activatable D-Bus services: {err}");
                ServiceAvailability::Missing
            }
        }
    }

    fn is_provider_enabled(&self) -> bool {
        let level = Connection::system().and_then(|connection| {
            let value = get_property(
                &connection,
                MANAGER_PATH,
                MANAGER_IFACE,
                "AvailableAccuracyLevel",
            )?;
            Ok(u32::try_from(value)?)
        });

        match level {
            Ok(level) => level > 0,
            Err(err) => {
                debug!("cannot read GeoClue accuracy level: {err}");
                false
            }
        }
    }
}

/// Ends one request, stopping the GeoClue client once no request needs it.
fn release(inner: &Mutex<Inner>, session: &Session) {
    // Held across Stop so a concurrent request cannot Start in between
    let mut guard = lock(inner);
    if !guard.usage.release() {
        debug!("GeoClue client still used by {} requests", guard.usage.active);
        return;
    }
    if let Err(err) = call_client(session, "Stop") {
        debug!("failed to stop GeoClue client: {err}");
    }
}

fn open_session(desktop_id: &str) -> zbus::Result<Session> {
    let connection = Connection::system()?;

    let client_path: OwnedObjectPath = connection
        .call_method(
            Some(GEOCLUE_BUS),
            MANAGER_PATH,
            Some(MANAGER_IFACE),
            "GetClient",
            &(),
        )?
        .body()
        .deserialize()?;

    let session = Session {
        connection,
        client_path,
    };

    // Required by GeoClue2 before the client may start
    set_client_property(&session, "DesktopId", Value::from(desktop_id))?;
    Ok(session)
}

fn call_client(session: &Session, method: &str) -> zbus::Result<()> {
    session.connection.call_method(
        Some(GEOCLUE_BUS),
        session.client_path.as_str(),
        Some(CLIENT_IFACE),
        method,
        &(),
    )?;
    Ok(())
}

fn set_client_property(session: &Session, name: &str, value: Value<'_>) -> zbus::Result<()> {
    session.connection.call_method(
        Some(GEOCLUE_BUS),
        session.client_path.as_str(),
        Some(PROPERTIES_IFACE),
        "Set",
        &(CLIENT_IFACE, name, value),
    )?;
    Ok(())
}

fn get_property(
    connection: &Connection,
    path: &str,
    iface: &str,
    name: &str,
) -> zbus::Result<OwnedValue> {
    connection
        .call_method(
            Some(GEOCLUE_BUS),
            path,
            Some(PROPERTIES_IFACE),
            "Get",
            &(iface, name),
        )?
        .body()
        .deserialize()
}

/// Reads the client's current location; `None` while GeoClue has no fix yet.
fn read_fix(session: &Session) -> zbus::Result<Option<Fix>> {
    let value = get_property(
        &session.connection,
        session.client_path.as_str(),
        CLIENT_IFACE,
        "Location",
    )?;
    let location_path = OwnedObjectPath::try_from(value)?;
    if location_path.as_str() == "/" {
        return Ok(None);
    }

    let read = |name: &str| -> zbus::Result<f64> {
        let value = get_property(
            &session.connection,
            location_path.as_str(),
            LOCATION_IFACE,
            name,
        )?;
        Ok(f64::try_from(value)?)
    };

    Ok(Some(Fix {
        latitude: read("Latitude")?,
        longitude: read("Longitude")?,
        accuracy: read("Accuracy").ok(),
        timestamp: timestamp_now(),
    }))
}

fn poll_fix(session: &Session, every: Duration) -> Option<Fix> {
    let deadline = Instant::now() + FIX_WINDOW;
    loop {
        match read_fix(session) {
            Ok(Some(fix)) => return Some(fix),
            Ok(None) => {}
            Err(err) => {
                warn!("failed to read GeoClue location: {err}");
                return None;
            }
        }

        if Instant::now() >= deadline {
            debug!("no GeoClue fix within {FIX_WINDOW:?}");
            return None;
        }
        thread::sleep(every.max(MIN_POLL));
    }
}

const fn accuracy_level(priority: Priority) -> u32 {
    match priority {
        Priority::HighAccuracy => ACCURACY_EXACT,
        Priority::BalancedPowerAccuracy => ACCURACY_NEIGHBORHOOD,
        Priority::LowPower => ACCURACY_CITY,
        Priority::NoPower => ACCURACY_COUNTRY,
    }
}

fn connection_result(err: &zbus::Error) -> ConnectionResult {
    let result = match err {
        zbus::Error::MethodError(name, _, _) => result_for_error_name(name.as_str()),
        zbus::Error::InputOutput(_) => ConnectionResult::fatal(ConnectionResult::NETWORK_ERROR),
        _ => ConnectionResult::fatal(ConnectionResult::INTERNAL_ERROR),
    };
    result.with_message(err.to_string())
}

fn result_for_error_name(name: &str) -> ConnectionResult {
    match name {
        ACCESS_DENIED => ConnectionResult::resolvable(
            ConnectionResult::ACCESS_DENIED,
            Resolution::GrantPermission,
        ),
        SERVICE_UNKNOWN | NAME_HAS_NO_OWNER => {
            ConnectionResult::fatal(ConnectionResult::SERVICE_MISSING)
        }
        _ => ConnectionResult::fatal(ConnectionResult::INTERNAL_ERROR),
    }
}

fn start_error(err: &zbus::Error) -> LocationError {
    match err {
        zbus::Error::MethodError(name, _, _) if name.as_str() == ACCESS_DENIED => {
            LocationError::PermissionDenied
        }
        _ => LocationError::Unknown(format!("failed to start GeoClue client: {err}")),
    }
}

pub(crate) async fn check_permission() -> PermissionStatus {
    // GeoClue's agent authorizes each client when it starts
    PermissionStatus::Granted
}

pub(crate) async fn request_permission() -> Result<PermissionStatus, PermissionError> {
    Ok(PermissionStatus::Granted)
}
