use leptos::prelude::*;
use productividad_shared::viewport::ViewCommand;
use productividad_shared::{FeatureCollection, LatLng, PopupContent, RenderSurface, RenderedLayer};

use crate::spatial::SpatialGrid;
use crate::viewport::{Viewport, project};

/// Polygon rings of one feature in zoom-0 world pixels.
pub type ProjectedShape = Vec<Vec<Vec<(f64, f64)>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPopup {
    pub anchor: LatLng,
    pub content: PopupContent,
}

/// Reactive handles the surface writes through when the layer or view changes.
#[derive(Clone, Copy)]
pub struct SurfaceSignals {
    pub viewport: RwSignal<Viewport>,
    pub map_size: RwSignal<(f64, f64)>,
    pub hovered: RwSignal<Option<usize>>,
    pub popup: RwSignal<Option<OpenPopup>>,
    /// Bumped every time a new layer replaces the old one.
    pub layer_generation: RwSignal<u64>,
}

/// The canvas-backed overlay: the current layer plus everything derived from it
/// for drawing and hit-testing.
pub struct MapSurface {
    layer: RenderedLayer,
    shapes: Vec<ProjectedShape>,
    grid: SpatialGrid,
    signals: SurfaceSignals,
    /// A view decided while the canvas had no size yet.
    pending_view: Option<ViewCommand>,
}

impl MapSurface {
    pub fn new(signals: SurfaceSignals) -> Self {
        Self {
            layer: RenderedLayer::default(),
            shapes: Vec::new(),
            grid: SpatialGrid::default(),
            signals,
            pending_view: None,
        }
    }

    pub fn layer(&self) -> &RenderedLayer {
        &self.layer
    }

    pub fn shapes(&self) -> &[ProjectedShape] {
        &self.shapes
    }

    pub fn hit_test(&self, point: LatLng) -> Option<usize> {
        self.grid.find_at(&self.layer, point.lng, point.lat)
    }

    /// Track the canvas CSS size. The geographic center survives a resize.
    pub fn resize(&mut self, width: f64, height: f64) {
        let (old_w, old_h) = self.signals.map_size.get_untracked();
        if (old_w, old_h) == (width, height) {
            return;
        }
        self.signals.map_size.set((width, height));
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        if let Some(command) = self.pending_view.take() {
            self.signals.viewport.update(|vp| {
                vp.apply(&command, width, height);
            });
        } else if old_w > 0.0 && old_h > 0.0 {
            self.signals
                .viewport
                .update(|vp| vp.pan((width - old_w) / 2.0, (height - old_h) / 2.0));
        }
    }

    pub fn popup_for(&self, index: usize, anchor: LatLng) -> Option<OpenPopup> {
        self.layer.get(index).map(|rendered| OpenPopup {
            anchor,
            content: PopupContent::for_feature(&rendered.feature),
        })
    }
}

impl RenderSurface for MapSurface {
    fn render(&mut self, collection: FeatureCollection) -> &RenderedLayer {
        // Popups and emphasis belong to the old layer's shapes
        self.signals.hovered.set(None);
        self.signals.popup.set(None);

        self.layer = RenderedLayer::build(&collection);
        self.shapes = self
            .layer
            .features()
            .iter()
            .map(|rendered| {
                rendered
                    .feature
                    .geometry
                    .as_ref()
                    .map(|geometry| {
                        geometry
                            .polygons()
                            .iter()
                            .map(|polygon| {
                                polygon
                                    .iter()
                                    .map(|ring| {
                                        ring.iter().map(|&[lng, lat]| project(lat, lng)).collect()
                                    })
                                    .collect()
                            })
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();
        self.grid = SpatialGrid::build(&self.layer);
        self.signals.layer_generation.update(|generation| *generation += 1);
        &self.layer
    }

    fn apply_view(&mut self, command: &ViewCommand) {
        if matches!(command, ViewCommand::Keep) {
            return;
        }
        let (w, h) = self.signals.map_size.get_untracked();
        if w <= 0.0 || h <= 0.0 {
            self.pending_view = Some(command.clone());
            return;
        }
        self.pending_view = None;
        self.signals.viewport.update(|vp| {
            vp.apply(command, w, h);
        });
    }
}
