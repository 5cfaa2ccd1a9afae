use productividad_shared::viewport::ViewCommand;
use productividad_shared::{GeoBounds, LatLng};

/// Side of one slippy-map tile, and of the whole world at zoom 0, in CSS pixels.
pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 3.0;
pub const MAX_ZOOM: f64 = 18.0;

const MAX_LATITUDE: f64 = 85.051_128_779_806_59;
const ZOOM_SENSITIVITY: f64 = 0.002;

/// Spherical Web Mercator: geographic degrees to zoom-0 world pixels.
pub fn project(lat: f64, lng: f64) -> (f64, f64) {
    let lat = lat.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
    let x = (lng + 180.0) / 360.0 * TILE_SIZE;
    let y = (std::f64::consts::PI - lat.tan().asinh()) / (2.0 * std::f64::consts::PI) * TILE_SIZE;
    (x, y)
}

pub fn unproject(x: f64, y: f64) -> LatLng {
    let lng = x / TILE_SIZE * 360.0 - 180.0;
    let n = std::f64::consts::PI - 2.0 * std::f64::consts::PI * y / TILE_SIZE;
    LatLng::new(n.sinh().atan().to_degrees(), lng)
}

/// Pan/zoom transform from zoom-0 world pixels to screen pixels.
/// `scale` is `2^zoom`.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    pub offset_x: f64,
    pub offset_y: f64,
    pub scale: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            offset_x: 0.0,
            offset_y: 0.0,
            scale: 1.0,
        }
    }
}

impl Viewport {
    pub fn centered(center: LatLng, zoom: f64, canvas_w: f64, canvas_h: f64) -> Self {
        let mut vp = Self::default();
        vp.set_view(center, zoom, canvas_w, canvas_h);
        vp
    }

    pub fn zoom(&self) -> f64 {
        self.scale.log2()
    }

    pub fn world_to_screen(&self, wx: f64, wy: f64) -> (f64, f64) {
        (
            wx * self.scale + self.offset_x,
            wy * self.scale + self.offset_y,
        )
    }

    pub fn screen_to_world(&self, sx: f64, sy: f64) -> (f64, f64) {
        (
            (sx - self.offset_x) / self.scale,
            (sy - self.offset_y) / self.scale,
        )
    }

    pub fn latlng_to_screen(&self, point: LatLng) -> (f64, f64) {
        let (wx, wy) = project(point.lat, point.lng);
        self.world_to_screen(wx, wy)
    }

    pub fn screen_to_latlng(&self, sx: f64, sy: f64) -> LatLng {
        let (wx, wy) = self.screen_to_world(sx, sy);
        unproject(wx, wy)
    }

    /// Zoom toward a focus point (screen coordinates).
    pub fn zoom_at(&mut self, delta: f64, screen_x: f64, screen_y: f64) {
        let factor = (-delta * ZOOM_SENSITIVITY).exp();
        let new_scale = (self.scale * factor).clamp(MIN_ZOOM.exp2(), MAX_ZOOM.exp2());
        let ratio = new_scale / self.scale;

        // Keep the point under the cursor fixed
        self.offset_x = screen_x - (screen_x - self.offset_x) * ratio;
        self.offset_y = screen_y - (screen_y - self.offset_y) * ratio;
        self.scale = new_scale;
    }

    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.offset_x += dx;
        self.offset_y += dy;
    }

    pub fn set_view(&mut self, center: LatLng, zoom: f64, canvas_w: f64, canvas_h: f64) {
        self.scale = zoom.clamp(MIN_ZOOM, MAX_ZOOM).exp2();
        let (cx, cy) = project(center.lat, center.lng);
        self.offset_x = canvas_w / 2.0 - cx * self.scale;
        self.offset_y = canvas_h / 2.0 - cy * self.scale;
    }

    /// Largest whole zoom at which `bounds` fits the canvas, capped at `max_zoom`.
    pub fn bounds_zoom(bounds: &GeoBounds, max_zoom: f64, canvas_w: f64, canvas_h: f64) -> f64 {
        let (x1, y1) = project(bounds.north, bounds.west);
        let (x2, y2) = project(bounds.south, bounds.east);
        let world_w = (x2 - x1).abs();
        let world_h = (y2 - y1).abs();
        let cap = max_zoom.min(MAX_ZOOM);
        if world_w <= 0.0 && world_h <= 0.0 {
            return cap;
        }

        let scale_x = if world_w > 0.0 { canvas_w / world_w } else { f64::INFINITY };
        let scale_y = if world_h > 0.0 { canvas_h / world_h } else { f64::INFINITY };
        let zoom = scale_x.min(scale_y).log2().floor();
        zoom.clamp(MIN_ZOOM, cap.max(MIN_ZOOM))
    }

    pub fn fit_bounds(&mut self, bounds: &GeoBounds, max_zoom: f64, canvas_w: f64, canvas_h: f64) {
        if canvas_w <= 0.0 || canvas_h <= 0.0 {
            return;
        }
        let zoom = Self::bounds_zoom(bounds, max_zoom, canvas_w, canvas_h);
        let (x1, y1) = project(bounds.north, bounds.west);
        let (x2, y2) = project(bounds.south, bounds.east);
        let center = unproject((x1 + x2) / 2.0, (y1 + y2) / 2.0);
        self.set_view(center, zoom, canvas_w, canvas_h);
    }

    /// Returns `false` for `Keep`.
    pub fn apply(&mut self, command: &ViewCommand, canvas_w: f64, canvas_h: f64) -> bool {
        match command {
            ViewCommand::Reset { center, zoom } => {
                self.set_view(*center, *zoom, canvas_w, canvas_h);
                true
            }
            ViewCommand::FitBounds { bounds, max_zoom } => {
                self.fit_bounds(bounds, *max_zoom, canvas_w, canvas_h);
                true
            }
            ViewCommand::Keep => false,
        }
    }
}
