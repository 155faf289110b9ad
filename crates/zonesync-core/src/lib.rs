//! zonesync core library
//!
//! Shared domain types for the zonesync delivery-zone mirror.
//!
//! # Modules
//!
//! - [`ids`] - Strongly typed identifiers (`BatchId`, `ProviderZoneId`)
//! - [`geo`] - Ordinate-tagged geofence types (`Geofence<LatLng>` vs
//!   `Geofence<LngLat>`)

pub mod geo;
pub mod ids;

pub use geo::{Geofence, LatLng, LngLat, OrdinateOrder, PolygonRings, Ring};
pub use ids::{BatchId, ParseIdError, ProviderZoneId};
