use serde::{Deserialize, Serialize};

use crate::feature::Feature;

pub const NO_DATA: &str = "Sin datos";
pub const NO_CROPS: &str = "Sin cultivos";
/// Shown in place of a missing municipality or department name.
pub const UNNAMED: &str = "Sin nombre";

const MAX_FRACTION_DIGITS: usize = 3;

/// Text shown in a feature's popup. Every field is display-ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupContent {
    pub municipality: String,
    pub department: String,
    pub planted_area: String,
    pub crops: String,
}

impl PopupContent {
    pub fn for_feature(feature: &Feature) -> Self {
        Self {
            municipality: feature.municipality().unwrap_or(UNNAMED).to_owned(),
            department: feature.department().unwrap_or(UNNAMED).to_owned(),
            planted_area: feature
                .planted_area()
                .map_or_else(|| NO_DATA.to_owned(), format_grouped),
            crops: feature.crops().unwrap_or(NO_CROPS).to_owned(),
        }
    }
}

/// `12345.5` -> `"12,345.5"`. At most three fraction digits, trailing zeros
/// dropped.
pub fn format_grouped(value: f64) -> String {
    if !value.is_finite() {
        return NO_DATA.to_owned();
    }

    let fixed = format!("{:.*}", MAX_FRACTION_DIGITS, value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(fixed.len() + fixed.len() / 3 + 1);
    let rounded_to_zero = int_part == "0" && frac_part.is_empty();
    if value.is_sign_negative() && !rounded_to_zero {
        out.push('-');
    }
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
