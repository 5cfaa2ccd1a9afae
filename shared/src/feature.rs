use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::bounds::GeoBounds;

/// Closed ring of `(lng, lat)` positions.
pub type Ring = Vec<[f64; 2]>;

/// Outer ring followed by any holes.
pub type Polygon = Vec<Ring>;

/// GeoJSON geometry. The original JSON is kept verbatim; polygonal shapes are
/// decoded once for bounds, drawing and hit-testing. Other geometry types are
/// carried through with no shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub struct Geometry {
    raw: Value,
    polygons: Vec<Polygon>,
}

impl Geometry {
    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        GeoBounds::from_positions(
            self.polygons
                .iter()
                .filter_map(|polygon| polygon.first())
                .flatten()
                .copied(),
        )
    }

    /// Even-odd containment test; holes are honoured per polygon.
    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        self.polygons.iter().any(|polygon| {
            polygon
                .iter()
                .filter(|ring| ring_crosses(ring, lng, lat))
                .count()
                % 2
                == 1
        })
    }
}

fn ring_crosses(ring: &[[f64; 2]], lng: f64, lat: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > lat) != (yj > lat) && lng < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl From<Value> for Geometry {
    fn from(raw: Value) -> Self {
        let coordinates = raw.get("coordinates");
        let polygons = match (raw.get("type").and_then(Value::as_str), coordinates) {
            (Some("Polygon"), Some(coords)) => parse_polygon(coords).into_iter().collect(),
            (Some("MultiPolygon"), Some(Value::Array(items))) => {
                items.iter().filter_map(parse_polygon).collect()
            }
            _ => Vec::new(),
        };
        Self { raw, polygons }
    }
}

impl From<Geometry> for Value {
    fn from(geometry: Geometry) -> Self {
        geometry.raw
    }
}

fn parse_polygon(value: &Value) -> Option<Polygon> {
    let rings: Polygon = value
        .as_array()?
        .iter()
        .filter_map(|ring| {
            let positions: Ring = ring
                .as_array()?
                .iter()
                .filter_map(parse_position)
                .collect();
            (!positions.is_empty()).then_some(positions)
        })
        .collect();
    (!rings.is_empty()).then_some(rings)
}

fn parse_position(value: &Value) -> Option<[f64; 2]> {
    let position = value.as_array()?;
    let lng = position.first()?.as_f64()?;
    let lat = position.get(1)?.as_f64()?;
    Some([lng, lat])
}

/// Municipality attributes. Keys follow the source dataset; anything not
/// listed here is preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureProperties {
    #[serde(
        rename = "dp_nomb",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub department: Option<String>,
    #[serde(
        rename = "mpio_cnmbr",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub municipality: Option<String>,
    /// Hectares planted. `None` means no data, never zero.
    #[serde(
        rename = "AreaSembrada",
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub planted_area: Option<f64>,
    /// Crop names joined with `", "`.
    #[serde(
        rename = "Cultivos",
        default,
        deserialize_with = "lenient_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub crops: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64(),
        // Some exports quote the figure
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|value| value.is_finite()))
}

fn properties_or_default<'de, D>(deserializer: D) -> Result<FeatureProperties, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<FeatureProperties>::deserialize(deserializer)?.unwrap_or_default())
}

/// Separator between crop names inside the `Cultivos` property.
pub const CROP_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(default)]
    pub geometry: Option<Geometry>,
    #[serde(default, deserialize_with = "properties_or_default")]
    pub properties: FeatureProperties,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Feature {
    pub fn department(&self) -> Option<&str> {
        self.properties.department.as_deref()
    }

    pub fn municipality(&self) -> Option<&str> {
        self.properties.municipality.as_deref()
    }

    pub fn planted_area(&self) -> Option<f64> {
        self.properties.planted_area
    }

    /// Raw crop list; a blank value counts as absent.
    pub fn crops(&self) -> Option<&str> {
        self.properties
            .crops
            .as_deref()
            .filter(|crops| !crops.trim().is_empty())
    }

    /// Individual crop names, trimmed, blanks dropped.
    pub fn crop_tokens(&self) -> impl Iterator<Item = &str> {
        self.crops()
            .into_iter()
            .flat_map(|crops| crops.split(CROP_SEPARATOR))
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }

    pub fn bounds(&self) -> Option<GeoBounds> {
        self.geometry.as_ref().and_then(Geometry::bounds)
    }
}

/// Ordered features plus collection-level members (`type`, `name`, `crs`, ...)
/// that are passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<Arc<Feature>>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl FeatureCollection {
    /// New collection sharing this one's metadata.
    pub fn with_features(&self, features: Vec<Arc<Feature>>) -> Self {
        Self {
            features,
            metadata: self.metadata.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Feature>> {
        self.features.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn square(west: f64, south: f64, size: f64) -> Value {
        json!([[
            [west, south],
            [west + size, south],
            [west + size, south + size],
            [west, south + size],
            [west, south]
        ]])
    }

    #[test]
    fn properties_map_source_keys_and_keep_unknown_ones() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "properties": {
                "dp_nomb": "ANTIOQUIA",
                "mpio_cnmbr": "MEDELLÍN",
                "AreaSembrada": 1520.5,
                "Cultivos": "Café, Maíz",
                "mpio_cdpmp": "05001"
            },
            "geometry": { "type": "Polygon", "coordinates": square(-75.7, 6.1, 0.3) }
        }))
        .expect("feature parses");

        assert_eq!(feature.department(), Some("ANTIOQUIA"));
        assert_eq!(feature.municipality(), Some("MEDELLÍN"));
        assert_eq!(feature.planted_area(), Some(1520.5));
        assert_eq!(feature.crop_tokens().collect::<Vec<_>>(), ["Café", "Maíz"]);
        assert_eq!(
            feature.properties.extra.get("mpio_cdpmp"),
            Some(&json!("05001"))
        );
        assert_eq!(feature.extra.get("type"), Some(&json!("Feature")));
    }

    #[test]
    fn missing_and_malformed_properties_are_tolerated() {
        let feature: Feature = serde_json::from_value(json!({
            "type": "Feature",
            "properties": { "AreaSembrada": "n/a", "Cultivos": "  " },
            "geometry": null
        }))
        .expect("feature parses");

        assert_eq!(feature.department(), None);
        assert_eq!(feature.municipality(), None);
        assert_eq!(feature.planted_area(), None);
        assert_eq!(feature.crops(), None);
        assert_eq!(feature.crop_tokens().count(), 0);
        assert!(feature.bounds().is_none());

        let bare: Feature =
            serde_json::from_value(json!({ "type": "Feature", "properties": null }))
                .expect("null properties parse");
        assert_eq!(bare.properties, FeatureProperties::default());
    }

    #[test]
    fn multipolygon_bounds_cover_all_parts() {
        let geometry = Geometry::from(json!({
            "type": "MultiPolygon",
            "coordinates": [square(-76.0, 5.0, 0.5), square(-74.0, 7.0, 0.5)]
        }));
        assert_eq!(geometry.polygons().len(), 2);
        let bounds = geometry.bounds().expect("bounds");
        assert_eq!(bounds.west, -76.0);
        assert_eq!(bounds.east, -73.5);
        assert_eq!(bounds.south, 5.0);
        assert_eq!(bounds.north, 7.5);
    }

    #[test]
    fn contains_respects_holes() {
        let geometry = Geometry::from(json!({
            "type": "Polygon",
            "coordinates": [
                [[0.0, 0.0], [10.0, 0.0], [10.0, 10.0], [0.0, 10.0], [0.0, 0.0]],
                [[4.0, 4.0], [6.0, 4.0], [6.0, 6.0], [4.0, 6.0], [4.0, 4.0]]
            ]
        }));
        assert!(geometry.contains(2.0, 2.0));
        assert!(!geometry.contains(5.0, 5.0));
        assert!(!geometry.contains(11.0, 5.0));
    }

    #[test]
    fn unsupported_geometry_round_trips_without_shapes() {
        let raw = json!({ "type": "Point", "coordinates": [-74.0, 4.6] });
        let geometry: Geometry = serde_json::from_value(raw.clone()).expect("point parses");
        assert!(geometry.polygons().is_empty());
        assert!(geometry.bounds().is_none());
        assert_eq!(serde_json::to_value(&geometry).expect("serialize"), raw);
    }
}
