//! Wire and domain models for provider zones.

use serde::{Deserialize, Serialize};
use zonesync_core::{Geofence, LatLng, LngLat, ProviderZoneId};

/// A zone as the rest of the system sees it: geofence already swapped into
/// GeoJSON ordinate order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderZone {
    pub id: ProviderZoneId,
    pub name: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub geofence: Option<Geofence<LngLat>>,
    /// Postal code hints, as delivered.
    #[serde(default)]
    pub postal_codes: Vec<String>,
    /// Provider's city hint, when present.
    pub city_hint: Option<String>,
    pub country_code: Option<String>,
}

/// A zone exactly as Navio delivers it. Geofence coordinates are `[lat, lng]`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct NavioZoneWire {
    pub id: String,
    pub name: String,
    pub display_name: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub geofence: Option<Geofence<LatLng>>,
    #[serde(default)]
    pub postal_codes: Vec<String>,
    pub city: Option<String>,
    pub country_code: Option<String>,
}

fn default_active() -> bool {
    true
}

/// Top-level zone list response.
#[derive(Debug, Deserialize)]
pub(crate) struct ZonesResponse {
    pub zones: Vec<NavioZoneWire>,
}

impl From<NavioZoneWire> for ProviderZone {
    fn from(wire: NavioZoneWire) -> Self {
        Self {
            id: ProviderZoneId::new(wire.id),
            name: wire.name,
            display_name: wire.display_name,
            is_active: wire.is_active,
            // The ordinate swap happens exactly once, at ingestion.
            geofence: wire.geofence.map(Geofence::into_geojson_order),
            postal_codes: wire.postal_codes,
            city_hint: wire.city,
            country_code: wire.country_code,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_conversion_swaps_ordinates() {
        let wire: NavioZoneWire = serde_json::from_value(serde_json::json!({
            "id": "z-1",
            "name": "Sentrum",
            "geofence": {
                "type": "Polygon",
                "coordinates": [[[59.91, 10.75], [59.92, 10.76]]]
            },
            "city": "Oslo"
        }))
        .unwrap();

        let zone = ProviderZone::from(wire);
        let expected = Geofence::<LngLat>::polygon(vec![vec![[10.75, 59.91], [10.76, 59.92]]]);
        assert_eq!(zone.geofence, Some(expected));
        assert!(zone.is_active);
        assert_eq!(zone.city_hint.as_deref(), Some("Oslo"));
    }
}
