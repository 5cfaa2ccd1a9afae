use crate::dataset::DatasetStore;
use crate::filter::{Choice, CropMatch, FilterSelection, apply_with};
use crate::layer::RenderSurface;
use crate::viewport::{ViewCommand, decide};
use crate::vocabulary::{Vocabulary, extract, municipalities_for_department};

/// Application state for one map session.
///
/// Every user change runs the full cycle: filter the original collection,
/// render the result, then pick and apply a view for the rendered layer.
#[derive(Debug, Clone)]
pub struct MapController {
    store: DatasetStore,
    vocabulary: Vocabulary,
    municipality_options: Vec<String>,
    selection: FilterSelection,
    crop_match: CropMatch,
}

impl MapController {
    pub fn new(store: DatasetStore) -> Self {
        let vocabulary = extract(store.original());
        let municipality_options = vocabulary.municipalities.clone();
        Self {
            store,
            vocabulary,
            municipality_options,
            selection: FilterSelection::default(),
            crop_match: CropMatch::default(),
        }
    }

    pub fn with_crop_match(mut self, crop_match: CropMatch) -> Self {
        self.crop_match = crop_match;
        self
    }

    pub fn store(&self) -> &DatasetStore {
        &self.store
    }

    pub fn selection(&self) -> &FilterSelection {
        &self.selection
    }

    pub fn crop_match(&self) -> CropMatch {
        self.crop_match
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Municipality options for the current department.
    pub fn municipality_options(&self) -> &[String] {
        &self.municipality_options
    }

    /// Initial draw: clear the selection and show the whole collection.
    pub fn show_all<S: RenderSurface + ?Sized>(&mut self, surface: &mut S) -> ViewCommand {
        self.selection = FilterSelection::default();
        self.municipality_options = self.vocabulary.municipalities.clone();
        self.refresh(surface)
    }

    /// Also rescopes the municipality options and clears the municipality.
    pub fn set_department<S: RenderSurface + ?Sized>(
        &mut self,
        department: Choice,
        surface: &mut S,
    ) -> ViewCommand {
        self.municipality_options =
            municipalities_for_department(self.store.original(), &department);
        self.selection.department = department;
        self.selection.municipality = Choice::Any;
        self.refresh(surface)
    }

    pub fn set_municipality<S: RenderSurface + ?Sized>(
        &mut self,
        municipality: Choice,
        surface: &mut S,
    ) -> ViewCommand {
        self.selection.municipality = municipality;
        self.refresh(surface)
    }

    pub fn set_crop<S: RenderSurface + ?Sized>(
        &mut self,
        crop: Choice,
        surface: &mut S,
    ) -> ViewCommand {
        self.selection.crop = crop;
        self.refresh(surface)
    }

    fn refresh<S: RenderSurface + ?Sized>(&self, surface: &mut S) -> ViewCommand {
        let filtered = apply_with(self.store.original(), &self.selection, self.crop_match);
        let command = decide(&self.selection, surface.render(filtered));
        surface.apply_view(&command);
        command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureCollection;
    use crate::layer::RenderedLayer;
    use crate::viewport::{DEPARTMENT_MAX_ZOOM, MUNICIPALITY_MAX_ZOOM};
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq)]
    enum Event {
        Rendered(Vec<String>),
        View(ViewCommand),
    }

    #[derive(Default)]
    struct RecordingSurface {
        layer: RenderedLayer,
        events: Vec<Event>,
    }

    impl RenderSurface for RecordingSurface {
        fn render(&mut self, collection: FeatureCollection) -> &RenderedLayer {
            self.layer = RenderedLayer::build(&collection);
            let names = collection
                .iter()
                .filter_map(|f| f.municipality().map(str::to_owned))
                .collect();
            self.events.push(Event::Rendered(names));
            &self.layer
        }

        fn apply_view(&mut self, command: &ViewCommand) {
            self.events.push(Event::View(command.clone()));
        }
    }

    fn square(west: f64, south: f64) -> serde_json::Value {
        json!({
            "type": "Polygon",
            "coordinates": [[
                [west, south], [west + 0.25, south], [west + 0.25, south + 0.25],
                [west, south + 0.25], [west, south]
            ]]
        })
    }

    fn controller() -> MapController {
        let feature = |dep: &str, mun: &str, crops: &str, west: f64, south: f64| {
            json!({
                "type": "Feature",
                "properties": { "dp_nomb": dep, "mpio_cnmbr": mun, "Cultivos": crops },
                "geometry": square(west, south)
            })
        };
        let raw = json!({
            "type": "FeatureCollection",
            "features": [
                feature("ANTIOQUIA", "MEDELLÍN", "Maíz, Café", -75.75, 6.0),
                feature("ANTIOQUIA", "RIONEGRO", "Papa", -75.5, 6.0),
                feature("VALLE DEL CAUCA", "CALI", "Caña", -76.75, 3.25),
            ]
        })
        .to_string();
        MapController::new(DatasetStore::from_json(&raw).expect("fixture parses"))
    }

    fn only(value: &str) -> Choice {
        Choice::Only(value.to_owned())
    }

    #[test]
    fn show_all_renders_everything_then_resets_view() {
        let mut controller = controller();
        let mut surface = RecordingSurface::default();

        let command = controller.show_all(&mut surface);

        assert_eq!(command, ViewCommand::overview());
        assert_eq!(
            surface.events,
            [
                Event::Rendered(vec![
                    "MEDELLÍN".to_owned(),
                    "RIONEGRO".to_owned(),
                    "CALI".to_owned()
                ]),
                Event::View(ViewCommand::overview()),
            ]
        );
        assert_eq!(controller.vocabulary().departments, ["ANTIOQUIA", "VALLE DEL CAUCA"]);
    }

    #[test]
    fn department_change_rescopes_and_clears_municipality() {
        let mut controller = controller();
        let mut surface = RecordingSurface::default();
        controller.set_municipality(only("CALI"), &mut surface);

        let command = controller.set_department(only("ANTIOQUIA"), &mut surface);

        assert_eq!(controller.selection().municipality, Choice::Any);
        assert_eq!(controller.municipality_options(), ["MEDELLÍN", "RIONEGRO"]);
        let ViewCommand::FitBounds { bounds, max_zoom } = command else {
            panic!("expected department fit");
        };
        assert_eq!(max_zoom, DEPARTMENT_MAX_ZOOM);
        assert_eq!(bounds.west, -75.75);
        assert_eq!(bounds.east, -75.25);

        controller.set_department(Choice::Any, &mut surface);
        assert_eq!(controller.municipality_options().len(), 3);
    }

    #[test]
    fn view_is_applied_only_after_render() {
        let mut controller = controller();
        let mut surface = RecordingSurface::default();

        controller.set_municipality(only("RIONEGRO"), &mut surface);

        assert_eq!(surface.events.len(), 2);
        assert_eq!(surface.events[0], Event::Rendered(vec!["RIONEGRO".to_owned()]));
        assert!(matches!(
            surface.events[1],
            Event::View(ViewCommand::FitBounds { max_zoom, .. }) if max_zoom == MUNICIPALITY_MAX_ZOOM
        ));
    }

    #[test]
    fn inconsistent_pair_renders_empty_layer_and_keeps_view() {
        let mut controller = controller();
        let mut surface = RecordingSurface::default();
        controller.set_department(only("ANTIOQUIA"), &mut surface);

        let command = controller.set_municipality(only("CALI"), &mut surface);

        assert_eq!(command, ViewCommand::Keep);
        assert!(surface.layer.is_empty());
        assert_eq!(controller.store().original().len(), 3);
    }

    #[test]
    fn crop_filter_respects_match_mode() {
        let mut surface = RecordingSurface::default();

        let mut substring = controller();
        substring.set_crop(only("Caf"), &mut surface);
        assert_eq!(surface.layer.len(), 1);

        let mut token = controller().with_crop_match(CropMatch::Token);
        token.set_crop(only("Caf"), &mut surface);
        assert!(surface.layer.is_empty());
        token.set_crop(only("Café"), &mut surface);
        assert_eq!(surface.layer.len(), 1);
    }
}
