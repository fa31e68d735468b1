//! Desktop test binary for geokit-location.
//!
//! Run with: cargo run -p geokit-location-demo

use std::sync::Arc;
use std::time::Duration;

use geokit_location::{
    ChannelConnectionDelegate, ConnectionEvent, FilePreferences, LocationFacade,
    MemoryPreferences, PreferenceStore, ServiceAvailability,
};

#[tokio::main]
async fn main() {
    println!("=== Geokit Location Test ===\n");

    let preferences: Box<dyn PreferenceStore> = match FilePreferences::default_path("geokit")
        .and_then(FilePreferences::load)
    {
        Ok(preferences) => {
            println!("Preferences: {}", preferences.path().display());
            Box::new(preferences)
        }
        Err(e) => {
            println!("Preferences unavailable ({e}), using defaults");
            Box::new(MemoryPreferences::new())
        }
    };

    let facade = match LocationFacade::platform(preferences.as_ref()) {
        Ok(facade) => facade,
        Err(e) => {
            println!("✗ No location backend: {e}");
            return;
        }
    };
    let language = facade.read_language_code();
    println!("Language: {language}");

    match facade.service_availability() {
        ServiceAvailability::Available => println!("Location service available"),
        other => {
            println!("✗ Location service unusable: {other:?}");
            return;
        }
    }
    if !facade.is_provider_enabled() {
        println!("✗ Device location is switched off");
        return;
    }

    if let Err(e) = facade.ensure_permission().await {
        println!("✗ Permission: {e}");
        return;
    }

    println!("\nConnecting...");
    let (delegate, events) = ChannelConnectionDelegate::new();
    facade.connect(Arc::new(delegate));
    match events.recv().await {
        Ok(ConnectionEvent::Connected) => println!("✓ Connected"),
        Ok(event) => {
            println!("✗ Connection failed: {event:?}");
            return;
        }
        Err(e) => {
            println!("✗ Connection events closed: {e}");
            return;
        }
    }

    println!("Getting current location...");
    match facade.request_location_timeout(Duration::from_secs(45)).await {
        Ok(fix) => {
            println!("✓ Location retrieved successfully!");
            println!("  Latitude:  {:.6}°", fix.latitude);
            println!("  Longitude: {:.6}°", fix.longitude);
            if let Some(acc) = fix.accuracy {
                println!("  Accuracy:  {acc:.1}m");
            }
            println!("  Timestamp: {}", fix.timestamp);

            match facade.lookup_district(&language, fix.latitude, fix.longitude) {
                Ok(district) => println!("  District:  {district}"),
                Err(e) => println!("  District unavailable: {e}"),
            }
        }
        Err(e) => {
            println!("✗ Failed to get location: {e}");
        }
    }
}
