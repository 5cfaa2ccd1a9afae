use productividad_shared::{GeoBounds, RenderedLayer};

const GRID_COLS: usize = 64;
const GRID_ROWS: usize = 64;

/// A flat 2D grid over the layer's geographic extent for fast polygon hit-testing.
/// Rebuilt only when a new layer is rendered.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    cells: Vec<Vec<usize>>,
    extent: Option<GeoBounds>,
    cell_w: f64,
    cell_h: f64,
}

impl Default for SpatialGrid {
    fn default() -> Self {
        Self {
            cells: Vec::new(),
            extent: None,
            cell_w: 1.0,
            cell_h: 1.0,
        }
    }
}

impl SpatialGrid {
    pub fn build(layer: &RenderedLayer) -> Self {
        let Some(extent) = productividad_shared::bounds::union_all(
            layer.features().iter().filter_map(|rendered| rendered.bounds),
        ) else {
            return Self::default();
        };

        // Degenerate extents still get a usable cell size
        let cell_w = (extent.width() / GRID_COLS as f64).max(1e-9);
        let cell_h = (extent.height() / GRID_ROWS as f64).max(1e-9);

        let mut cells = vec![Vec::new(); GRID_COLS * GRID_ROWS];
        for (idx, rendered) in layer.features().iter().enumerate() {
            let Some(b) = rendered.bounds else {
                continue;
            };
            let (col_start, col_end) = span(b.west - extent.west, b.east - extent.west, cell_w, GRID_COLS);
            let (row_start, row_end) =
                span(b.south - extent.south, b.north - extent.south, cell_h, GRID_ROWS);
            for row in row_start..=row_end {
                for col in col_start..=col_end {
                    cells[row * GRID_COLS + col].push(idx);
                }
            }
        }

        Self {
            cells,
            extent: Some(extent),
            cell_w,
            cell_h,
        }
    }

    pub fn extent(&self) -> Option<GeoBounds> {
        self.extent
    }

    /// Index of the feature under `(lng, lat)`. The most recently drawn
    /// feature wins where shapes overlap.
    pub fn find_at(&self, layer: &RenderedLayer, lng: f64, lat: f64) -> Option<usize> {
        let extent = self.extent?;
        if !extent.contains(lng, lat) {
            return None;
        }
        let col = cell_index(lng - extent.west, self.cell_w, GRID_COLS);
        let row = cell_index(lat - extent.south, self.cell_h, GRID_ROWS);

        self.cells[row * GRID_COLS + col]
            .iter()
            .rev()
            .copied()
            .find(|&idx| {
                layer.get(idx).is_some_and(|rendered| {
                    rendered.bounds.is_some_and(|b| b.contains(lng, lat))
                        && rendered
                            .feature
                            .geometry
                            .as_ref()
                            .is_some_and(|geometry| geometry.contains(lng, lat))
                })
            })
    }
}

fn cell_index(offset: f64, cell: f64, count: usize) -> usize {
    ((offset / cell).floor().max(0.0) as usize).min(count - 1)
}

fn span(start: f64, end: f64, cell: f64, count: usize) -> (usize, usize) {
    (cell_index(start, cell, count), cell_index(end, cell, count))
}
