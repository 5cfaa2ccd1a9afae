use serde::{Deserialize, Serialize};

/// Packed `(r, g, b)` color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// CSS `rgba(...)` string for canvas fill/stroke styles.
    pub fn css(self, alpha: f64) -> String {
        format!(
            "rgba({},{},{},{})",
            self.0,
            self.1,
            self.2,
            alpha.clamp(0.0, 1.0)
        )
    }
}

/// Stroke and fill parameters for one municipality polygon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureStyle {
    pub stroke: Rgb,
    pub stroke_width: f64,
    pub fill: Rgb,
    pub fill_opacity: f64,
}

impl FeatureStyle {
    pub const BASE: Self = Self {
        stroke: Rgb(0x00, 0x4c, 0x3f),
        stroke_width: 1.0,
        fill: Rgb(0x8f, 0xd1, 0x9e),
        fill_opacity: 0.6,
    };

    /// Pointer-over emphasis; fill color stays the base one.
    pub const HOVER: Self = Self {
        stroke: Rgb(0x00, 0x00, 0x00),
        stroke_width: 3.0,
        fill: Self::BASE.fill,
        fill_opacity: 0.85,
    };

    pub const fn for_hover(hovered: bool) -> Self {
        if hovered { Self::HOVER } else { Self::BASE }
    }

    pub fn stroke_css(&self) -> String {
        self.stroke.css(1.0)
    }

    pub fn fill_css(&self) -> String {
        self.fill.css(self.fill_opacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hover_only_emphasises_stroke_and_opacity() {
        let base = FeatureStyle::for_hover(false);
        let hover = FeatureStyle::for_hover(true);
        assert_eq!(base, FeatureStyle::BASE);
        assert_eq!(hover.fill, base.fill);
        assert!(hover.stroke_width > base.stroke_width);
        assert!(hover.fill_opacity > base.fill_opacity);
        assert_eq!(hover.fill_css(), "rgba(143,209,158,0.85)");
        assert_eq!(base.stroke_css(), "rgba(0,76,63,1)");
    }
}
