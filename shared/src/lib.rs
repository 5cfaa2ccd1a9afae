pub mod bounds;
pub mod controller;
pub mod dataset;
pub mod feature;
pub mod filter;
pub mod layer;
pub mod popup;
pub mod style;
pub mod viewport;
pub mod vocabulary;

pub use bounds::{GeoBounds, LatLng};
pub use controller::MapController;
pub use dataset::{DatasetError, DatasetStore};
pub use feature::{Feature, FeatureCollection, FeatureProperties, Geometry};
pub use filter::{Choice, CropMatch, FilterSelection};
pub use layer::{RenderSurface, RenderedFeature, RenderedLayer};
pub use popup::PopupContent;
pub use style::{FeatureStyle, Rgb};
pub use viewport::ViewCommand;
pub use vocabulary::Vocabulary;
