#![cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

use crate::viewport::{MAX_ZOOM, TILE_SIZE, Viewport};

pub const TILE_URL_TEMPLATE: &str = "https://{s}.tile.openstreetmap.org/{z}/{x}/{y}.png";
pub const TILE_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];
pub const ATTRIBUTION: &str = "© OpenStreetMap";

const MAX_CONCURRENCY: usize = 6;
const MAX_CACHED_TILES: usize = 384;
const ONLOAD_HANDLE_KEY: &str = "__productividadTileOnload";
const ONERROR_HANDLE_KEY: &str = "__productividadTileOnerror";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    /// OSM subdomains rotate on `x + y` so neighbouring tiles spread across hosts.
    pub fn url(&self) -> String {
        let subdomain = TILE_SUBDOMAINS[(self.x as usize + self.y as usize) % TILE_SUBDOMAINS.len()];
        TILE_URL_TEMPLATE
            .replace("{s}", subdomain)
            .replace("{z}", &self.z.to_string())
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }

    /// Screen rectangle `(x, y, w, h)` of this tile under `vp`.
    pub fn screen_rect(&self, vp: &Viewport) -> (f64, f64, f64, f64) {
        let world_size = TILE_SIZE / f64::from(1u32 << self.z);
        let (sx, sy) = vp.world_to_screen(self.x as f64 * world_size, self.y as f64 * world_size);
        let (ex, ey) = vp.world_to_screen(
            (self.x + 1) as f64 * world_size,
            (self.y + 1) as f64 * world_size,
        );
        // Snap outward so adjacent tiles overlap by at most a pixel
        let sx = sx.floor();
        let sy = sy.floor();
        (sx, sy, ex.ceil() - sx, ey.ceil() - sy)
    }
}

/// Tile zoom level used for a fractional view zoom.
pub fn tile_zoom(vp: &Viewport) -> u8 {
    vp.zoom().round().clamp(0.0, MAX_ZOOM) as u8
}

/// Tiles covering the canvas, nearest to the center first.
pub fn visible_tiles(vp: &Viewport, canvas_w: f64, canvas_h: f64) -> Vec<TileKey> {
    if canvas_w <= 0.0 || canvas_h <= 0.0 {
        return Vec::new();
    }
    let z = tile_zoom(vp);
    let tiles_per_side = 1u32 << z;
    let world_size = TILE_SIZE / f64::from(tiles_per_side);

    let (min_wx, min_wy) = vp.screen_to_world(0.0, 0.0);
    let (max_wx, max_wy) = vp.screen_to_world(canvas_w, canvas_h);
    let last = f64::from(tiles_per_side - 1);
    let to_index = |w: f64| (w / world_size).floor().clamp(0.0, last) as u32;

    let (x0, x1) = (to_index(min_wx), to_index(max_wx));
    let (y0, y1) = (to_index(min_wy), to_index(max_wy));
    if max_wx < 0.0 || max_wy < 0.0 || min_wx > TILE_SIZE || min_wy > TILE_SIZE {
        return Vec::new();
    }

    let center_x = (min_wx + max_wx) / 2.0 / world_size;
    let center_y = (min_wy + max_wy) / 2.0 / world_size;
    let mut keys: Vec<TileKey> = (y0..=y1)
        .flat_map(|y| (x0..=x1).map(move |x| TileKey { z, x, y }))
        .collect();
    keys.sort_by(|a, b| {
        let da = (a.x as f64 + 0.5 - center_x).powi(2) + (a.y as f64 + 0.5 - center_y).powi(2);
        let db = (b.x as f64 + 0.5 - center_x).powi(2) + (b.y as f64 + 0.5 - center_y).powi(2);
        da.total_cmp(&db)
    });
    keys
}

enum TileSlot {
    Loading,
    Ready(HtmlImageElement),
    Failed,
}

struct LoaderState {
    slots: HashMap<TileKey, TileSlot>,
    queue: VecDeque<TileKey>,
    /// Insertion order of cached tiles, oldest first.
    order: VecDeque<TileKey>,
    in_flight: usize,
}

/// Concurrency-limited OSM tile fetcher with an in-memory cache.
#[derive(Clone)]
pub struct TileLoader {
    state: Rc<RefCell<LoaderState>>,
    on_ready: Rc<dyn Fn()>,
}

impl TileLoader {
    pub fn new(on_ready: impl Fn() + 'static) -> Self {
        Self {
            state: Rc::new(RefCell::new(LoaderState {
                slots: HashMap::new(),
                queue: VecDeque::new(),
                order: VecDeque::new(),
                in_flight: 0,
            })),
            on_ready: Rc::new(on_ready),
        }
    }

    pub fn image(&self, key: &TileKey) -> Option<HtmlImageElement> {
        match self.state.borrow().slots.get(key) {
            Some(TileSlot::Ready(img)) => Some(img.clone()),
            _ => None,
        }
    }

    /// Replace the pending queue with the tiles currently wanted.
    pub fn request(&self, wanted: &[TileKey]) {
        {
            let mut state = self.state.borrow_mut();
            let missing: VecDeque<TileKey> = wanted
                .iter()
                .filter(|key| !state.slots.contains_key(key))
                .copied()
                .collect();
            state.queue = missing;
            evict(&mut state, wanted);
        }
        self.pump();
    }

    fn pump(&self) {
        loop {
            let job = {
                let mut state = self.state.borrow_mut();
                if state.in_flight >= MAX_CONCURRENCY {
                    break;
                }
                let Some(key) = state.queue.pop_front() else {
                    break;
                };
                state.in_flight += 1;
                state.slots.insert(key, TileSlot::Loading);
                state.order.push_back(key);
                key
            };
            self.load(job);
        }
    }

    fn finish(&self, key: TileKey, slot: TileSlot) {
        let ready = matches!(slot, TileSlot::Ready(_));
        {
            let mut state = self.state.borrow_mut();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.slots.insert(key, slot);
        }
        if ready {
            (self.on_ready)();
        }
        self.pump();
    }

    fn load(&self, key: TileKey) {
        let img = match HtmlImageElement::new() {
            Ok(img) => img,
            Err(_) => {
                self.finish(key, TileSlot::Failed);
                return;
            }
        };
        img.set_cross_origin(Some("anonymous"));

        let loader = self.clone();
        let img_for_load = img.clone();
        let onload = Closure::<dyn FnMut()>::new(move || {
            clear_image_handlers(&img_for_load);
            loader.finish(key, TileSlot::Ready(img_for_load.clone()));
        });

        let loader = self.clone();
        let img_for_error = img.clone();
        let onerror = Closure::<dyn FnMut()>::new(move || {
            clear_image_handlers(&img_for_error);
            loader.finish(key, TileSlot::Failed);
        });

        let onload_js = onload.into_js_value();
        let onerror_js = onerror.into_js_value();
        img.set_onload(Some(onload_js.unchecked_ref()));
        img.set_onerror(Some(onerror_js.unchecked_ref()));
        let _ = Reflect::set(
            img.as_ref(),
            &JsValue::from_str(ONLOAD_HANDLE_KEY),
            &onload_js,
        );
        let _ = Reflect::set(
            img.as_ref(),
            &JsValue::from_str(ONERROR_HANDLE_KEY),
            &onerror_js,
        );
        img.set_src(&key.url());
    }
}

/// Drop the oldest settled tiles that are not currently wanted.
fn evict(state: &mut LoaderState, wanted: &[TileKey]) {
    let mut budget = state.order.len();
    while state.order.len() > MAX_CACHED_TILES && budget > 0 {
        budget -= 1;
        let Some(key) = state.order.pop_front() else {
            break;
        };
        let loading = matches!(state.slots.get(&key), Some(TileSlot::Loading));
        if loading || wanted.contains(&key) {
            state.order.push_back(key);
            continue;
        }
        state.slots.remove(&key);
    }
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}

#[cfg(test)]
mod tests {
    use super::*;
    use productividad_shared::LatLng;

    #[test]
    fn url_follows_osm_template() {
        let key = TileKey { z: 6, x: 18, y: 31 };
        assert_eq!(key.url(), "https://b.tile.openstreetmap.org/6/18/31.png");
        let key = TileKey { z: 0, x: 0, y: 0 };
        assert_eq!(key.url(), "https://a.tile.openstreetmap.org/0/0/0.png");
    }

    #[test]
    fn visible_tiles_cover_canvas_center_first() {
        let vp = Viewport::centered(LatLng::new(4.5, -74.1), 6.0, 800.0, 600.0);
        let keys = visible_tiles(&vp, 800.0, 600.0);
        assert!(!keys.is_empty());
        assert!(keys.iter().all(|key| key.z == 6));

        // Colombia's center sits in tile (18, 31) at zoom 6
        assert_eq!(keys[0], TileKey { z: 6, x: 18, y: 31 });

        let (x, y, w, h) = keys[0].screen_rect(&vp);
        assert!(x <= 400.0 && x + w >= 400.0);
        assert!(y <= 300.0 && y + h >= 300.0);
        assert!((w - TILE_SIZE).abs() <= 1.0);
    }

    #[test]
    fn fractional_zoom_rounds_to_nearest_tile_level() {
        let mut vp = Viewport::centered(LatLng::new(4.5, -74.1), 6.0, 800.0, 600.0);
        vp.scale = 6.6f64.exp2();
        assert_eq!(tile_zoom(&vp), 7);
        vp.scale = 6.4f64.exp2();
        assert_eq!(tile_zoom(&vp), 6);
    }

    #[test]
    fn nothing_visible_outside_world() {
        let mut vp = Viewport::centered(LatLng::new(0.0, 0.0), 3.0, 800.0, 600.0);
        vp.pan(100_000.0, 0.0);
        assert!(visible_tiles(&vp, 800.0, 600.0).is_empty());
    }
}
