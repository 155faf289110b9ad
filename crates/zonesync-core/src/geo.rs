//! Ordinate-tagged geofence types.
//!
//! Navio delivers polygon coordinates as `[lat, lng]` pairs while GeoJSON
//! (and everything we persist) uses `[lng, lat]`. The ordinate order is part
//! of the type: a `Geofence<LatLng>` cannot be stored or compared against a
//! `Geofence<LngLat>` without going through [`Geofence::into_geojson_order`],
//! so a mixed-order comparison fails to compile instead of failing in
//! production.

use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// A closed ring of coordinate pairs.
pub type Ring = Vec<[f64; 2]>;

/// A polygon: one outer ring plus optional hole rings.
pub type PolygonRings = Vec<Ring>;

/// Marker trait for coordinate ordinate orders.
pub trait OrdinateOrder: 'static {
    /// Human-readable name, used in logs.
    const NAME: &'static str;
}

/// Provider ordinate order: `[lat, lng]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatLng;

/// GeoJSON ordinate order: `[lng, lat]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LngLat;

impl OrdinateOrder for LatLng {
    const NAME: &'static str = "lat-lng";
}

impl OrdinateOrder for LngLat {
    const NAME: &'static str = "lng-lat";
}

/// Polygon or multipolygon coordinate payload.
///
/// Serialized in the GeoJSON geometry shape (`type` + `coordinates`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
enum Shape {
    Polygon(PolygonRings),
    MultiPolygon(Vec<PolygonRings>),
}

/// A zone boundary with the ordinate order carried in the type parameter.
#[derive(Debug, Serialize, Deserialize)]
#[serde(transparent, bound = "")]
pub struct Geofence<O: OrdinateOrder> {
    shape: Shape,
    #[serde(skip)]
    order: PhantomData<fn() -> O>,
}

impl<O: OrdinateOrder> Clone for Geofence<O> {
    fn clone(&self) -> Self {
        Self {
            shape: self.shape.clone(),
            order: PhantomData,
        }
    }
}

impl<O: OrdinateOrder> PartialEq for Geofence<O> {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
    }
}

impl<O: OrdinateOrder> Geofence<O> {
    /// Build a single-polygon geofence from its rings.
    #[must_use]
    pub fn polygon(rings: PolygonRings) -> Self {
        Self {
            shape: Shape::Polygon(rings),
            order: PhantomData,
        }
    }

    /// Build a multipolygon geofence.
    #[must_use]
    pub fn multi_polygon(polygons: Vec<PolygonRings>) -> Self {
        Self {
            shape: Shape::MultiPolygon(polygons),
            order: PhantomData,
        }
    }

    /// All polygons, with a plain polygon viewed as a one-member multipolygon.
    #[must_use]
    pub fn polygons(&self) -> Vec<&PolygonRings> {
        match &self.shape {
            Shape::Polygon(rings) => vec![rings],
            Shape::MultiPolygon(polys) => polys.iter().collect(),
        }
    }

    /// Total number of coordinate pairs across all rings.
    #[must_use]
    pub fn coordinate_count(&self) -> usize {
        self.polygons()
            .iter()
            .flat_map(|rings| rings.iter())
            .map(Vec::len)
            .sum()
    }

    /// True when the geofence holds no coordinates at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.coordinate_count() == 0
    }

    /// Stable fingerprint over the exact coordinate content.
    ///
    /// Two geofences share a fingerprint iff they are structurally identical
    /// (same shape kind, same rings, same ordinate bit patterns). Used to
    /// detect differently-named areas sharing one polygon.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        // FNV-1a over the ordinate bit patterns; deterministic across
        // processes, unlike the std RandomState hasher.
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = FNV_OFFSET;
        let mut mix = |byte: u8| {
            hash ^= u64::from(byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        };
        let kind: u8 = match &self.shape {
            Shape::Polygon(_) => 1,
            Shape::MultiPolygon(_) => 2,
        };
        mix(kind);
        for rings in self.polygons() {
            mix(0xfe);
            for ring in rings.iter() {
                mix(0xff);
                for [a, b] in ring {
                    for byte in a.to_bits().to_le_bytes() {
                        mix(byte);
                    }
                    for byte in b.to_bits().to_le_bytes() {
                        mix(byte);
                    }
                }
            }
        }
        hash
    }

    fn map_coords(self, f: impl Fn([f64; 2]) -> [f64; 2] + Copy) -> Shape {
        let swap_rings =
            |rings: PolygonRings| -> PolygonRings {
                rings.into_iter()
                    .map(|ring| ring.into_iter().map(f).collect())
                    .collect()
            };
        match self.shape {
            Shape::Polygon(rings) => Shape::Polygon(swap_rings(rings)),
            Shape::MultiPolygon(polys) => {
                Shape::MultiPolygon(polys.into_iter().map(swap_rings).collect())
            }
        }
    }
}

impl Geofence<LatLng> {
    /// Swap every pair into GeoJSON `[lng, lat]` order.
    ///
    /// The only way to turn provider-order coordinates into something the
    /// rest of the system will accept.
    #[must_use]
    pub fn into_geojson_order(self) -> Geofence<LngLat> {
        Geofence {
            shape: self.map_coords(|[lat, lng]| [lng, lat]),
            order: PhantomData,
        }
    }
}

impl Geofence<LngLat> {
    /// Decode a persisted GeoJSON-order geofence from its JSON value.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value.clone())
    }

    /// Encode for JSONB storage.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(offset: f64) -> PolygonRings {
        vec![vec![
            [offset, offset],
            [offset + 1.0, offset],
            [offset + 1.0, offset + 1.0],
            [offset, offset + 1.0],
            [offset, offset],
        ]]
    }

    #[test]
    fn swap_produces_geojson_order() {
        let provider = Geofence::<LatLng>::polygon(vec![vec![[59.91, 10.75], [59.92, 10.76]]]);
        let geojson = provider.into_geojson_order();
        let expected = Geofence::<LngLat>::polygon(vec![vec![[10.75, 59.91], [10.76, 59.92]]]);
        assert_eq!(geojson, expected);
    }

    #[test]
    fn structural_equality_ignores_nothing() {
        let a = Geofence::<LngLat>::polygon(square(0.0));
        let b = Geofence::<LngLat>::polygon(square(0.0));
        let c = Geofence::<LngLat>::polygon(square(0.5));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fingerprint_matches_iff_structurally_equal() {
        let a = Geofence::<LngLat>::polygon(square(1.0));
        let b = Geofence::<LngLat>::polygon(square(1.0));
        let c = Geofence::<LngLat>::multi_polygon(vec![square(1.0)]);
        assert_eq!(a.fingerprint(), b.fingerprint());
        // Same coordinates but a different shape kind is a different polygon.
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn json_round_trip() {
        let fence = Geofence::<LngLat>::multi_polygon(vec![square(0.0), square(2.0)]);
        let value = fence.to_json().unwrap();
        assert_eq!(value["type"], "MultiPolygon");
        let back = Geofence::<LngLat>::from_json(&value).unwrap();
        assert_eq!(fence, back);
    }

    #[test]
    fn coordinate_count_spans_all_rings() {
        let fence = Geofence::<LngLat>::multi_polygon(vec![square(0.0), square(2.0)]);
        assert_eq!(fence.coordinate_count(), 10);
        assert!(!fence.is_empty());
    }
}
