use std::cell::{Cell, RefCell};
use std::rc::Rc;

use leptos::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{
    CanvasRenderingContext2d, CanvasWindingRule, HtmlCanvasElement, MouseEvent, PointerEvent,
    WheelEvent,
};

use productividad_shared::{FeatureStyle, GeoBounds};

use crate::app::{MapSurfaceHandle, ResizeNonce};
use crate::render_loop::RenderScheduler;
use crate::surface::{ProjectedShape, SurfaceSignals};
use crate::tiles::{TileLoader, visible_tiles};
use crate::viewport::{Viewport, project};

const BACKGROUND: &str = "#e8e6df";
/// Pointer travel (CSS px) below which a press-release counts as a click.
const CLICK_SLOP_PX: f64 = 5.0;

fn device_pixel_ratio() -> f64 {
    web_sys::window()
        .map(|w| w.device_pixel_ratio())
        .unwrap_or(1.0)
        .max(1.0)
}

/// Canvas 2D map: OSM tiles underneath, the rendered municipality layer on top.
#[component]
pub fn MapCanvas() -> impl IntoView {
    let MapSurfaceHandle(surface) = expect_context();
    let ResizeNonce(resize_nonce) = expect_context();
    let signals: SurfaceSignals = expect_context();
    let SurfaceSignals {
        viewport,
        hovered,
        popup,
        layer_generation,
        ..
    } = signals;

    let canvas_ref = NodeRef::<leptos::html::Canvas>::new();

    // Track drag state
    let is_dragging = Rc::new(Cell::new(false));
    let drag_start_x = Rc::new(Cell::new(0.0f64));
    let drag_start_y = Rc::new(Cell::new(0.0f64));
    let last_x = Rc::new(Cell::new(0.0f64));
    let last_y = Rc::new(Cell::new(0.0f64));

    // Track pinch state
    let pinch_dist = Rc::new(Cell::new(0.0f64));

    // Bumped by the tile loader whenever an image finishes
    let tiles_ready: RwSignal<u64> = RwSignal::new(0);
    let tiles = TileLoader::new(move || tiles_ready.update(|n| *n = n.wrapping_add(1)));

    // Cached 2D context (invalidated on canvas resize)
    let cached_ctx: Rc<RefCell<Option<CanvasRenderingContext2d>>> = Rc::new(RefCell::new(None));

    let scheduler = RenderScheduler::new(move || {
        let Some(canvas) = canvas_ref.get_untracked() else {
            return;
        };
        let canvas: &HtmlCanvasElement = &canvas;

        // Resize canvas to container with DPR
        let Some(parent) = canvas.parent_element() else {
            return;
        };
        let w = f64::from(parent.client_width());
        let h = f64::from(parent.client_height());
        if w <= 0.0 || h <= 0.0 {
            return;
        }
        let dpr = device_pixel_ratio();
        let pw = (w * dpr).round().max(1.0) as u32;
        let ph = (h * dpr).round().max(1.0) as u32;
        if canvas.width() != pw || canvas.height() != ph {
            canvas.set_width(pw);
            canvas.set_height(ph);
            // Canvas resize resets 2D context state
            *cached_ctx.borrow_mut() = None;
        }
        surface.update_value(|s| s.resize(w, h));

        let ctx = {
            let mut ctx_cache = cached_ctx.borrow_mut();
            if ctx_cache.is_none() {
                let Some(ctx) = canvas
                    .get_context("2d")
                    .ok()
                    .flatten()
                    .and_then(|ctx| ctx.dyn_into::<CanvasRenderingContext2d>().ok())
                else {
                    return;
                };
                // All drawing stays in CSS pixel coords
                ctx.scale(dpr, dpr).ok();
                *ctx_cache = Some(ctx);
            }
            let Some(ctx) = ctx_cache.clone() else {
                return;
            };
            ctx
        };

        let vp = viewport.get_untracked();
        let wanted = visible_tiles(&vp, w, h);
        tiles.request(&wanted);

        ctx.set_fill_style_str(BACKGROUND);
        ctx.fill_rect(0.0, 0.0, w, h);
        for key in &wanted {
            let Some(image) = tiles.image(key) else {
                continue;
            };
            let (sx, sy, sw, sh) = key.screen_rect(&vp);
            ctx.draw_image_with_html_image_element_and_dw_and_dh(&image, sx, sy, sw, sh)
                .ok();
        }

        let hov = hovered.get_untracked();
        surface.with_value(|s| {
            let layer = s.layer();
            for (idx, (rendered, shape)) in layer.features().iter().zip(s.shapes()).enumerate() {
                if Some(idx) == hov || !on_screen(rendered.bounds, &vp, w, h) {
                    continue;
                }
                draw_shape(&ctx, &vp, shape, &FeatureStyle::BASE);
            }
            // Emphasized feature goes last so its outline sits on top
            if let Some(idx) = hov
                && let Some(shape) = s.shapes().get(idx)
            {
                draw_shape(&ctx, &vp, shape, &FeatureStyle::HOVER);
            }
        });
    });

    let scheduler = Rc::new(scheduler);

    // Layer/hover effect
    let sched_layer = scheduler.clone();
    Effect::new(move || {
        layer_generation.track();
        hovered.track();
        sched_layer.mark_dirty();
    });

    // Viewport effect: pan/zoom, tile arrivals and container resizes
    let sched_vp = scheduler.clone();
    Effect::new(move || {
        viewport.track();
        tiles_ready.track();
        resize_nonce.track();
        sched_vp.mark_dirty();
    });

    // --- Input handlers ---

    let local_point = move |client_x: f64, client_y: f64| {
        canvas_ref
            .get_untracked()
            .map(|el| {
                let rect = el.get_bounding_client_rect();
                (client_x - rect.left(), client_y - rect.top())
            })
            .unwrap_or((client_x, client_y))
    };

    let on_wheel = move |e: WheelEvent| {
        e.prevent_default();
        let (x, y) = local_point(f64::from(e.client_x()), f64::from(e.client_y()));
        let delta = e.delta_y();
        viewport.update(|vp| vp.zoom_at(delta, x, y));
    };

    let on_pointer_down = {
        let is_dragging = is_dragging.clone();
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            is_dragging.set(true);
            drag_start_x.set(f64::from(e.client_x()));
            drag_start_y.set(f64::from(e.client_y()));
            last_x.set(f64::from(e.client_x()));
            last_y.set(f64::from(e.client_y()));

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.set_pointer_capture(e.pointer_id()).ok();
                el.style().set_property("cursor", "grabbing").ok();
            }
        }
    };

    let on_pointer_move = {
        let is_dragging = is_dragging.clone();
        let last_x = last_x.clone();
        let last_y = last_y.clone();
        move |e: PointerEvent| {
            if is_dragging.get() {
                let dx = f64::from(e.client_x()) - last_x.get();
                let dy = f64::from(e.client_y()) - last_y.get();
                last_x.set(f64::from(e.client_x()));
                last_y.set(f64::from(e.client_y()));
                viewport.update(|vp| vp.pan(dx, dy));
                return;
            }

            let (x, y) = local_point(f64::from(e.client_x()), f64::from(e.client_y()));
            let point = viewport.with_untracked(|vp| vp.screen_to_latlng(x, y));
            let hit = surface.with_value(|s| s.hit_test(point));
            if hit != hovered.get_untracked() {
                hovered.set(hit);
            }
            if let Some(el) = canvas_ref.get_untracked() {
                let el: &HtmlCanvasElement = &el;
                let cursor = if hit.is_some() { "pointer" } else { "grab" };
                web_sys::HtmlElement::style(el).set_property("cursor", cursor).ok();
            }
        }
    };

    let on_pointer_up = {
        let is_dragging = is_dragging.clone();
        move |e: PointerEvent| {
            is_dragging.set(false);

            if let Some(target) = e.target()
                && let Ok(el) = target.dyn_into::<web_sys::HtmlElement>()
            {
                el.style().set_property("cursor", "grab").ok();
            }
        }
    };

    let on_click = {
        let drag_start_x = drag_start_x.clone();
        let drag_start_y = drag_start_y.clone();
        move |e: MouseEvent| {
            let dx = (f64::from(e.client_x()) - drag_start_x.get()).abs();
            let dy = (f64::from(e.client_y()) - drag_start_y.get()).abs();
            if dx >= CLICK_SLOP_PX || dy >= CLICK_SLOP_PX {
                return;
            }
            let (x, y) = local_point(f64::from(e.client_x()), f64::from(e.client_y()));
            let point = viewport.with_untracked(|vp| vp.screen_to_latlng(x, y));
            let opened = surface.with_value(|s| s.hit_test(point).and_then(|idx| s.popup_for(idx, point)));
            popup.set(opened);
        }
    };

    let on_pointer_leave = move |_: PointerEvent| {
        if hovered.get_untracked().is_some() {
            hovered.set(None);
        }
    };

    let on_touch_start = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = f64::from(t1.client_x() - t0.client_x());
                let dy = f64::from(t1.client_y() - t0.client_y());
                pinch_dist.set((dx * dx + dy * dy).sqrt());
            }
        }
    };

    let on_touch_move = {
        let pinch_dist = pinch_dist.clone();
        move |e: web_sys::TouchEvent| {
            let touches = e.touches();
            if touches.length() == 2 {
                e.prevent_default();
                let (Some(t0), Some(t1)) = (touches.get(0), touches.get(1)) else {
                    return;
                };
                let dx = f64::from(t1.client_x() - t0.client_x());
                let dy = f64::from(t1.client_y() - t0.client_y());
                let new_dist = (dx * dx + dy * dy).sqrt();
                let old_dist = pinch_dist.get();

                if old_dist > 0.0 {
                    let (mid_x, mid_y) = local_point(
                        f64::from(t0.client_x() + t1.client_x()) / 2.0,
                        f64::from(t0.client_y() + t1.client_y()) / 2.0,
                    );
                    let delta = -(new_dist - old_dist) * 2.0;
                    viewport.update(|vp| vp.zoom_at(delta, mid_x, mid_y));
                }

                pinch_dist.set(new_dist);
            }
        }
    };

    view! {
        <div
            style="position: absolute; inset: 0; overflow: hidden;"
            on:wheel=on_wheel
            on:pointerdown=on_pointer_down
            on:pointermove=on_pointer_move
            on:pointerup=on_pointer_up
            on:pointerleave=on_pointer_leave
            on:click=on_click
            on:touchstart=on_touch_start
            on:touchmove=on_touch_move
        >
            <canvas
                node_ref=canvas_ref
                style="position: absolute; inset: 0; width: 100%; height: 100%; touch-action: none; cursor: grab;"
            />
        </div>
    }
}

/// Screen-space cull against the feature's geographic bounds.
fn on_screen(bounds: Option<GeoBounds>, vp: &Viewport, w: f64, h: f64) -> bool {
    let Some(b) = bounds else {
        return false;
    };
    let (x1, y1) = project(b.north, b.west);
    let (x2, y2) = project(b.south, b.east);
    let (sx1, sy1) = vp.world_to_screen(x1, y1);
    let (sx2, sy2) = vp.world_to_screen(x2, y2);
    sx2 >= 0.0 && sy2 >= 0.0 && sx1 <= w && sy1 <= h
}

fn draw_shape(
    ctx: &CanvasRenderingContext2d,
    vp: &Viewport,
    shape: &ProjectedShape,
    style: &FeatureStyle,
) {
    if shape.is_empty() {
        return;
    }
    ctx.begin_path();
    for ring in shape.iter().flatten() {
        let mut points = ring.iter().map(|&(wx, wy)| vp.world_to_screen(wx, wy));
        let Some((x, y)) = points.next() else {
            continue;
        };
        ctx.move_to(x, y);
        for (x, y) in points {
            ctx.line_to(x, y);
        }
        ctx.close_path();
    }

    ctx.set_fill_style_str(&style.fill_css());
    ctx.fill_with_canvas_winding_rule(CanvasWindingRule::Evenodd);
    ctx.set_stroke_style_str(&style.stroke_css());
    ctx.set_line_width(style.stroke_width);
    ctx.set_line_join("round");
    ctx.stroke();
}

#[cfg(test)]
mod tests {
    use super::*;
    use productividad_shared::LatLng;

    #[test]
    fn culls_features_outside_the_canvas() {
        let vp = Viewport::centered(LatLng::new(4.5, -74.1), 6.0, 800.0, 600.0);
        let near = GeoBounds {
            south: 4.0,
            west: -74.5,
            north: 5.0,
            east: -73.5,
        };
        let far = GeoBounds {
            south: 40.0,
            west: 10.0,
            north: 41.0,
            east: 11.0,
        };
        assert!(on_screen(Some(near), &vp, 800.0, 600.0));
        assert!(!on_screen(Some(far), &vp, 800.0, 600.0));
        assert!(!on_screen(None, &vp, 800.0, 600.0));
    }
}
