use serde::{Deserialize, Serialize};

/// Geographic point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Axis-aligned box in longitude/latitude degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl GeoBounds {
    pub const fn from_point(lng: f64, lat: f64) -> Self {
        Self {
            south: lat,
            west: lng,
            north: lat,
            east: lng,
        }
    }

    /// Bounds of `(lng, lat)` pairs, or `None` for an empty or non-finite input.
    pub fn from_positions<I>(positions: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f64; 2]>,
    {
        let mut bounds: Option<Self> = None;
        for [lng, lat] in positions {
            if !lng.is_finite() || !lat.is_finite() {
                continue;
            }
            match bounds.as_mut() {
                Some(b) => b.extend(lng, lat),
                None => bounds = Some(Self::from_point(lng, lat)),
            }
        }
        bounds
    }

    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.south = self.south.min(lat);
        self.north = self.north.max(lat);
        self.west = self.west.min(lng);
        self.east = self.east.max(lng);
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            south: self.south.min(other.south),
            west: self.west.min(other.west),
            north: self.north.max(other.north),
            east: self.east.max(other.east),
        }
    }

    pub fn contains(&self, lng: f64, lat: f64) -> bool {
        lng >= self.west && lng <= self.east && lat >= self.south && lat <= self.north
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }
}

/// Union of every bounds in `items`, `None` when nothing is given.
pub fn union_all<I>(items: I) -> Option<GeoBounds>
where
    I: IntoIterator<Item = GeoBounds>,
{
    items.into_iter().reduce(GeoBounds::union)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_positions_skips_non_finite_coordinates() {
        let bounds = GeoBounds::from_positions([
            [-75.6, 6.2],
            [f64::NAN, 1.0],
            [-75.4, 6.4],
        ])
        .expect("finite positions produce bounds");
        assert_eq!(bounds.west, -75.6);
        assert_eq!(bounds.east, -75.4);
        assert_eq!(bounds.south, 6.2);
        assert_eq!(bounds.north, 6.4);
    }

    #[test]
    fn from_positions_empty_is_none() {
        assert!(GeoBounds::from_positions(std::iter::empty()).is_none());
    }

    #[test]
    fn union_all_covers_every_box() {
        let a = GeoBounds::from_point(-76.0, 5.0);
        let b = GeoBounds::from_point(-74.0, 7.0);
        let union = union_all([a, b]).expect("two boxes");
        assert_eq!(union.west, -76.0);
        assert_eq!(union.east, -74.0);
        assert_eq!(union.north, 7.0);
        assert!(union.contains(-75.0, 6.0));
        assert!(!union.contains(-73.9, 6.0));
    }
}
