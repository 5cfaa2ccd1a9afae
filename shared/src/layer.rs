use std::sync::Arc;

use crate::bounds::GeoBounds;
use crate::feature::{Feature, FeatureCollection};
use crate::viewport::ViewCommand;

/// A feature as drawn on the map, with its shape's bounds resolved.
#[derive(Debug, Clone)]
pub struct RenderedFeature {
    pub feature: Arc<Feature>,
    pub bounds: Option<GeoBounds>,
}

/// The overlay currently on the map. Replaced wholesale on every filter change.
#[derive(Debug, Clone, Default)]
pub struct RenderedLayer {
    features: Vec<RenderedFeature>,
}

impl RenderedLayer {
    pub fn build(collection: &FeatureCollection) -> Self {
        let features = collection
            .iter()
            .map(|feature| RenderedFeature {
                feature: Arc::clone(feature),
                bounds: feature.bounds(),
            })
            .collect();
        Self { features }
    }

    pub fn features(&self) -> &[RenderedFeature] {
        &self.features
    }

    pub fn get(&self, index: usize) -> Option<&RenderedFeature> {
        self.features.get(index)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// The map surface the controller draws on.
///
/// `render` must have finished building the new layer when it returns; the
/// viewport command for that layer is issued only afterwards.
pub trait RenderSurface {
    /// Drop the previous overlay and draw `collection` in its place.
    fn render(&mut self, collection: FeatureCollection) -> &RenderedLayer;

    fn apply_view(&mut self, command: &ViewCommand);
}
