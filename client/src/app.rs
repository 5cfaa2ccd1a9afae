use leptos::prelude::*;
use wasm_bindgen::JsCast;

use std::cell::RefCell;

use productividad_shared::viewport::{DEFAULT_CENTER, DEFAULT_ZOOM};
use productividad_shared::{
    Choice, DatasetStore, FilterSelection, MapController, RenderSurface, ViewCommand, Vocabulary,
};

use crate::api;
use crate::canvas::MapCanvas;
use crate::surface::{MapSurface, OpenPopup, SurfaceSignals};
use crate::tiles::ATTRIBUTION;
use crate::viewport::Viewport;

pub(crate) fn canvas_dimensions() -> (f64, f64) {
    let Some(window) = web_sys::window() else {
        return (1200.0, 800.0);
    };
    let w = window
        .inner_width()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(1200.0);
    let h = window
        .inner_height()
        .ok()
        .and_then(|v| v.as_f64())
        .unwrap_or(800.0);
    (w, h)
}

struct WindowBinding {
    window: web_sys::Window,
    event: &'static str,
    handler: wasm_bindgen::closure::Closure<dyn Fn(web_sys::Event)>,
}

impl WindowBinding {
    fn detach(self) {
        let _ = self
            .window
            .remove_event_listener_with_callback(self.event, self.handler.as_ref().unchecked_ref());
    }
}

thread_local! {
    static RESIZE_BINDING: RefCell<Option<WindowBinding>> = const { RefCell::new(None) };
    static KEYDOWN_BINDING: RefCell<Option<WindowBinding>> = const { RefCell::new(None) };
}

/// Listen on `window`, replacing whatever the slot held before.
fn bind_window(
    slot: &'static std::thread::LocalKey<RefCell<Option<WindowBinding>>>,
    event: &'static str,
    handler: impl Fn(web_sys::Event) + 'static,
) {
    use wasm_bindgen::prelude::*;

    slot.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            old.detach();
        }
    });
    let Some(window) = web_sys::window() else {
        return;
    };
    let handler = Closure::<dyn Fn(web_sys::Event)>::new(handler);
    if window
        .add_event_listener_with_callback(event, handler.as_ref().unchecked_ref())
        .is_err()
    {
        return;
    }
    slot.with(|slot| {
        *slot.borrow_mut() = Some(WindowBinding {
            window,
            event,
            handler,
        });
    });
}

#[derive(Clone, Copy)]
pub(crate) struct MapSurfaceHandle(pub StoredValue<MapSurface>);
#[derive(Clone, Copy)]
pub(crate) struct ControllerHandle(pub StoredValue<Option<MapController>>);
/// Bumped on window resize so the canvas re-measures its container.
#[derive(Clone, Copy)]
pub(crate) struct ResizeNonce(pub RwSignal<u64>);

#[derive(Clone, Debug, PartialEq)]
pub(crate) enum LoadStatus {
    Loading,
    Ready,
    Failed(String),
}

/// Reactive mirror of the controller's filter state, for the select controls.
#[derive(Clone, Copy)]
pub(crate) struct FilterSignals {
    pub vocabulary: RwSignal<Vocabulary>,
    pub municipality_options: RwSignal<Vec<String>>,
    pub selection: RwSignal<FilterSelection>,
}

impl FilterSignals {
    fn sync(&self, controller: &MapController) {
        self.vocabulary.set(controller.vocabulary().clone());
        self.municipality_options
            .set(controller.municipality_options().to_vec());
        self.selection.set(controller.selection().clone());
    }
}

/// Run one controller step against the map surface, then mirror the new
/// filter state. A no-op until the dataset has loaded.
fn drive(
    controller: StoredValue<Option<MapController>>,
    surface: StoredValue<MapSurface>,
    filters: FilterSignals,
    step: impl FnOnce(&mut MapController, &mut MapSurface) -> ViewCommand,
) {
    controller.update_value(|slot| {
        let Some(controller) = slot.as_mut() else {
            return;
        };
        surface.update_value(|surface| {
            step(controller, surface);
        });
        filters.sync(controller);
    });
}

/// Root application component. Provides global reactive state via context.
#[component]
pub fn App() -> impl IntoView {
    let (w, h) = canvas_dimensions();
    let signals = SurfaceSignals {
        viewport: RwSignal::new(Viewport::centered(DEFAULT_CENTER, DEFAULT_ZOOM, w, h)),
        map_size: RwSignal::new((0.0, 0.0)),
        hovered: RwSignal::new(None),
        popup: RwSignal::new(None),
        layer_generation: RwSignal::new(0),
    };
    let surface: StoredValue<MapSurface> = StoredValue::new(MapSurface::new(signals));
    let controller: StoredValue<Option<MapController>> = StoredValue::new(None);
    let filters = FilterSignals {
        vocabulary: RwSignal::new(Vocabulary::default()),
        municipality_options: RwSignal::new(Vec::new()),
        selection: RwSignal::new(FilterSelection::default()),
    };
    let status: RwSignal<LoadStatus> = RwSignal::new(LoadStatus::Loading);
    let resize_nonce: RwSignal<u64> = RwSignal::new(0);

    // Until the canvas is measured this is held back and applied on first paint
    surface.update_value(|s| s.apply_view(&ViewCommand::overview()));

    provide_context(signals);
    provide_context(filters);
    provide_context(MapSurfaceHandle(surface));
    provide_context(ControllerHandle(controller));
    provide_context(ResizeNonce(resize_nonce));

    // Fetch the dataset once on mount, then draw everything
    Effect::new(move || {
        wasm_bindgen_futures::spawn_local(async move {
            let crop_match = api::fetch_crop_match().await;
            match api::fetch_dataset().await {
                Ok(collection) => {
                    let mut ready =
                        MapController::new(DatasetStore::new(collection)).with_crop_match(crop_match);
                    surface.update_value(|s| {
                        ready.show_all(s);
                    });
                    filters.sync(&ready);
                    controller.set_value(Some(ready));
                    status.set(LoadStatus::Ready);
                }
                Err(e) => {
                    web_sys::console::error_1(&format!("dataset load failed: {e}").into());
                    status.set(LoadStatus::Failed(e));
                }
            }
        });
    });

    Effect::new(move || {
        bind_window(&RESIZE_BINDING, "resize", move |_| {
            resize_nonce.update(|n| *n = n.wrapping_add(1));
        });
        bind_window(&KEYDOWN_BINDING, "keydown", move |e| {
            let Ok(e) = e.dyn_into::<web_sys::KeyboardEvent>() else {
                return;
            };
            if e.key() == "Escape" && signals.popup.get_untracked().is_some() {
                signals.popup.set(None);
            }
        });
        on_cleanup(|| {
            RESIZE_BINDING.with(|slot| slot.borrow_mut().take().map(WindowBinding::detach));
            KEYDOWN_BINDING.with(|slot| slot.borrow_mut().take().map(WindowBinding::detach));
        });
    });

    view! {
        <div style="width: 100%; height: 100%; position: relative; overflow: hidden;">
            <MapCanvas />
            <FilterPanel />
            <Popup />
            <StatusBanner status=status />
            <Attribution />
        </div>
    }
}

const SELECT_STYLE: &str = "width: 100%; margin-top: 4px; background: #ffffff; border: 1px solid #b9c4bd; border-radius: 4px; color: #1f2a24; font-family: 'Inter', system-ui, sans-serif; font-size: 0.8rem; padding: 4px 6px; outline: none;";
const LABEL_STYLE: &str = "display: block; margin-top: 8px; font-size: 0.72rem; font-weight: 600; color: #004c3f; font-family: 'Inter', system-ui, sans-serif; text-transform: uppercase; letter-spacing: 0.04em;";

fn department(s: &FilterSelection) -> &Choice {
    &s.department
}

fn municipality(s: &FilterSelection) -> &Choice {
    &s.municipality
}

fn crop(s: &FilterSelection) -> &Choice {
    &s.crop
}

fn select_value(e: &leptos::ev::Event) -> Option<String> {
    let target = e.target()?;
    let select = target.dyn_into::<web_sys::HtmlSelectElement>().ok()?;
    Some(select.value())
}

/// Department, municipality and crop selects. Every change goes through the
/// controller so the map redraws and refits.
#[component]
fn FilterPanel() -> impl IntoView {
    let MapSurfaceHandle(surface) = expect_context();
    let ControllerHandle(controller) = expect_context();
    let filters: FilterSignals = expect_context();
    let FilterSignals {
        vocabulary,
        municipality_options,
        selection,
    } = filters;

    let on_department = move |e: leptos::ev::Event| {
        let Some(value) = select_value(&e) else {
            return;
        };
        drive(controller, surface, filters, move |c, s| {
            c.set_department(Choice::from_option_value(&value), s)
        });
    };
    let on_municipality = move |e: leptos::ev::Event| {
        let Some(value) = select_value(&e) else {
            return;
        };
        drive(controller, surface, filters, move |c, s| {
            c.set_municipality(Choice::from_option_value(&value), s)
        });
    };
    let on_crop = move |e: leptos::ev::Event| {
        let Some(value) = select_value(&e) else {
            return;
        };
        drive(controller, surface, filters, move |c, s| {
            c.set_crop(Choice::from_option_value(&value), s)
        });
    };

    let options = move |names: Vec<String>, current: fn(&FilterSelection) -> &Choice| {
        names
            .into_iter()
            .map(|name| {
                let label = name.clone();
                let value = name.clone();
                view! {
                    <option
                        value=value
                        selected=move || selection.with(|s| current(s).value() == Some(name.as_str()))
                    >
                        {label}
                    </option>
                }
            })
            .collect::<Vec<_>>()
    };

    view! {
        <div style="position: absolute; top: 12px; left: 12px; z-index: 10; width: 240px; background: rgba(255,255,255,0.94); border: 1px solid #b9c4bd; border-radius: 6px; box-shadow: 0 2px 10px rgba(0,0,0,0.18); padding: 10px 12px;">
            <div style="font-size: 0.9rem; font-weight: 700; color: #004c3f; font-family: 'Inter', system-ui, sans-serif;">
                "Productividad agrícola"
            </div>

            <label style=LABEL_STYLE>
                "Departamento"
                <select on:change=on_department style=SELECT_STYLE>
                    <option value="" selected=move || selection.with(|s| s.department.is_any())>
                        "Todos"
                    </option>
                    {move || options(vocabulary.with(|v| v.departments.clone()), department)}
                </select>
            </label>

            <label style=LABEL_STYLE>
                "Municipio"
                <select on:change=on_municipality style=SELECT_STYLE>
                    <option value="" selected=move || selection.with(|s| s.municipality.is_any())>
                        "Todos"
                    </option>
                    {move || options(municipality_options.get(), municipality)}
                </select>
            </label>

            <label style=LABEL_STYLE>
                "Cultivo"
                <select on:change=on_crop style=SELECT_STYLE>
                    <option value="" selected=move || selection.with(|s| s.crop.is_any())>
                        "Todos"
                    </option>
                    {move || options(vocabulary.with(|v| v.crops.clone()), crop)}
                </select>
            </label>
        </div>
    }
}

/// Details of the clicked feature, anchored to the click location.
#[component]
fn Popup() -> impl IntoView {
    let signals: SurfaceSignals = expect_context();
    let SurfaceSignals {
        viewport, popup, ..
    } = signals;

    view! {
        {move || {
            let Some(OpenPopup { anchor, content }) = popup.get() else {
                return ().into_any();
            };
            let (x, y) = viewport.with(|vp| vp.latlng_to_screen(anchor));
            view! {
                <div
                    style=format!(
                        "position: absolute; left: {x:.1}px; top: {y:.1}px; transform: translate(-50%, calc(-100% - 12px)); z-index: 20; min-width: 180px; max-width: 280px; background: #ffffff; border-radius: 8px; box-shadow: 0 3px 14px rgba(0,0,0,0.4); padding: 10px 28px 10px 14px; font-family: 'Inter', system-ui, sans-serif; font-size: 0.8rem; color: #333333; line-height: 1.4;"
                    )
                >
                    <button
                        title="Cerrar"
                        style="position: absolute; top: 4px; right: 6px; border: none; background: none; color: #757575; font-size: 1rem; cursor: pointer; line-height: 1;"
                        on:click=move |_| popup.set(None)
                    >
                        "×"
                    </button>
                    <b>{content.municipality}</b>
                    <br />
                    <span>{content.department}</span>
                    <br />
                    <br />
                    <b>"Hectáreas:"</b>
                    " "
                    {content.planted_area}
                    <br />
                    <b>"Cultivos:"</b>
                    " "
                    {content.crops}
                </div>
            }
            .into_any()
        }}
    }
}

#[component]
fn StatusBanner(status: RwSignal<LoadStatus>) -> impl IntoView {
    view! {
        {move || {
            let (text, color) = match status.get() {
                LoadStatus::Ready => return ().into_any(),
                LoadStatus::Loading => ("Cargando datos…".to_owned(), "#004c3f"),
                LoadStatus::Failed(e) => (format!("No se pudieron cargar los datos ({e})"), "#a12a2a"),
            };
            view! {
                <div style=format!(
                    "position: absolute; top: 12px; left: 50%; transform: translateX(-50%); z-index: 30; background: rgba(255,255,255,0.96); border: 1px solid {color}; border-radius: 6px; padding: 6px 14px; color: {color}; font-family: 'Inter', system-ui, sans-serif; font-size: 0.8rem; box-shadow: 0 2px 8px rgba(0,0,0,0.15);"
                )>
                    {text}
                </div>
            }
            .into_any()
        }}
    }
}

#[component]
fn Attribution() -> impl IntoView {
    view! {
        <div style="position: absolute; right: 0; bottom: 0; z-index: 10; background: rgba(255,255,255,0.8); padding: 1px 6px; font-family: 'Inter', system-ui, sans-serif; font-size: 0.7rem; color: #333333;">
            <a
                href="https://www.openstreetmap.org/copyright"
                target="_blank"
                rel="noopener"
                style="color: #0078a8; text-decoration: none;"
            >
                {ATTRIBUTION}
            </a>
        </div>
    }
}
