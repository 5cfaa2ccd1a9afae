use serde::{Deserialize, Serialize};

use crate::bounds::{GeoBounds, LatLng, union_all};
use crate::filter::{Choice, FilterSelection};
use crate::layer::RenderedLayer;

/// Whole-country overview.
pub const DEFAULT_CENTER: LatLng = LatLng::new(4.5, -74.1);
pub const DEFAULT_ZOOM: f64 = 6.0;
/// Zoom cap when framing a single municipality.
pub const MUNICIPALITY_MAX_ZOOM: f64 = 11.0;
/// Zoom cap when framing a whole department.
pub const DEPARTMENT_MAX_ZOOM: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViewCommand {
    Reset { center: LatLng, zoom: f64 },
    FitBounds { bounds: GeoBounds, max_zoom: f64 },
    /// Leave the current view as it is.
    Keep,
}

impl ViewCommand {
    pub const fn overview() -> Self {
        Self::Reset {
            center: DEFAULT_CENTER,
            zoom: DEFAULT_ZOOM,
        }
    }
}

/// Pick the view for a freshly rendered layer. Exactly one rule applies,
/// checked in order: no place filter, municipality, department.
pub fn decide(selection: &FilterSelection, layer: &RenderedLayer) -> ViewCommand {
    match (&selection.department, &selection.municipality) {
        (Choice::Any, Choice::Any) => ViewCommand::overview(),
        (_, Choice::Only(municipality)) => layer
            .features()
            .iter()
            .filter(|rendered| rendered.feature.municipality() == Some(municipality.as_str()))
            // Features without a drawable shape are skipped
            .find_map(|rendered| rendered.bounds)
            .map_or(ViewCommand::Keep, |bounds| ViewCommand::FitBounds {
                bounds,
                max_zoom: MUNICIPALITY_MAX_ZOOM,
            }),
        (Choice::Only(department), Choice::Any) => union_all(
            layer
                .features()
                .iter()
                .filter(|rendered| rendered.feature.department() == Some(department.as_str()))
                .filter_map(|rendered| rendered.bounds),
        )
        .map_or(ViewCommand::Keep, |bounds| ViewCommand::FitBounds {
            bounds,
            max_zoom: DEPARTMENT_MAX_ZOOM,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::load;
    use crate::feature::FeatureCollection;
    use crate::filter::apply;
    use serde_json::json;

    fn feature(dep: &str, mun: &str, west: f64, south: f64) -> serde_json::Value {
        json!({
            "type": "Feature",
            "properties": { "dp_nomb": dep, "mpio_cnmbr": mun },
            "geometry": {
                "type": "Polygon",
                "coordinates": [[
                    [west, south], [west + 0.5, south], [west + 0.5, south + 0.5],
                    [west, south + 0.5], [west, south]
                ]]
            }
        })
    }

    fn collection() -> FeatureCollection {
        load(
            &json!({
                "type": "FeatureCollection",
                "features": [
                    feature("ANTIOQUIA", "MEDELLÍN", -75.7, 6.1),
                    feature("VALLE DEL CAUCA", "CALI", -76.6, 3.3),
                    feature("ANTIOQUIA", "TURBO", -76.9, 7.9),
                    feature("BOYACÁ", "TUNJA", -73.5, 5.4),
                    feature("CAUCA", "POPAYÁN", -76.7, 2.3),
                ]
            })
            .to_string(),
        )
        .expect("fixture parses")
    }

    fn only(value: &str) -> Choice {
        Choice::Only(value.to_owned())
    }

    fn rendered(selection: &FilterSelection) -> RenderedLayer {
        RenderedLayer::build(&apply(&collection(), selection))
    }

    #[test]
    fn unfiltered_selection_resets_to_country_overview() {
        let selection = FilterSelection::default();
        let layer = rendered(&selection);
        assert_eq!(layer.len(), 5);
        assert_eq!(
            decide(&selection, &layer),
            ViewCommand::Reset {
                center: LatLng::new(4.5, -74.1),
                zoom: 6.0
            }
        );
    }

    #[test]
    fn crop_only_selection_still_resets() {
        let selection = FilterSelection {
            crop: only("Café"),
            ..FilterSelection::default()
        };
        assert_eq!(
            decide(&selection, &RenderedLayer::default()),
            ViewCommand::overview()
        );
    }

    #[test]
    fn department_selection_fits_union_of_its_features() {
        let selection = FilterSelection {
            department: only("ANTIOQUIA"),
            ..FilterSelection::default()
        };
        let layer = rendered(&selection);
        assert_eq!(layer.len(), 2);

        let ViewCommand::FitBounds { bounds, max_zoom } = decide(&selection, &layer) else {
            panic!("expected a department fit");
        };
        assert_eq!(max_zoom, DEPARTMENT_MAX_ZOOM);
        assert_eq!(bounds.west, -76.9);
        assert_eq!(bounds.south, 6.1);
        assert_eq!(bounds.east, -75.2);
        assert!((bounds.north - 8.4).abs() < 1e-9);
    }

    #[test]
    fn municipality_selection_fits_single_feature_closely() {
        let selection = FilterSelection {
            municipality: only("MEDELLÍN"),
            ..FilterSelection::default()
        };
        let layer = rendered(&selection);
        assert_eq!(layer.len(), 1);

        let ViewCommand::FitBounds { bounds, max_zoom } = decide(&selection, &layer) else {
            panic!("expected a municipality fit");
        };
        assert_eq!(max_zoom, MUNICIPALITY_MAX_ZOOM);
        assert_eq!(bounds.west, -75.7);
        assert_eq!(bounds.north, 6.6);
    }

    #[test]
    fn municipality_fit_skips_features_without_geometry() {
        let drawable = feature("ANTIOQUIA", "TURBO", -76.9, 7.9);
        let mut shapeless = drawable.clone();
        shapeless["geometry"] = serde_json::Value::Null;
        let collection = load(
            &json!({ "type": "FeatureCollection", "features": [shapeless, drawable] }).to_string(),
        )
        .expect("fixture parses");
        let selection = FilterSelection {
            municipality: only("TURBO"),
            ..FilterSelection::default()
        };
        let layer = RenderedLayer::build(&apply(&collection, &selection));
        assert_eq!(layer.len(), 2);

        let ViewCommand::FitBounds { bounds, max_zoom } = decide(&selection, &layer) else {
            panic!("expected a fit to the feature with a polygon");
        };
        assert_eq!(max_zoom, MUNICIPALITY_MAX_ZOOM);
        assert_eq!(bounds.west, -76.9);
        assert_eq!(bounds.south, 7.9);
    }

    #[test]
    fn inconsistent_selection_keeps_current_view() {
        let selection = FilterSelection {
            department: only("ANTIOQUIA"),
            municipality: only("CALI"),
            ..FilterSelection::default()
        };
        let layer = rendered(&selection);
        assert!(layer.is_empty());
        assert_eq!(decide(&selection, &layer), ViewCommand::Keep);
    }

    #[test]
    fn department_without_rendered_features_keeps_view() {
        let selection = FilterSelection {
            department: only("AMAZONAS"),
            ..FilterSelection::default()
        };
        assert_eq!(
            decide(&selection, &rendered(&selection)),
            ViewCommand::Keep
        );
    }
}
