use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::feature::{Feature, FeatureCollection};

/// One filter control's value: unconstrained, or a concrete name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    #[default]
    Any,
    Only(String),
}

impl Choice {
    /// Map a `<select>` option value; the empty string is the "Todos" entry.
    pub fn from_option_value(value: &str) -> Self {
        if value.is_empty() {
            Self::Any
        } else {
            Self::Only(value.to_owned())
        }
    }

    pub fn option_value(&self) -> &str {
        match self {
            Self::Any => "",
            Self::Only(value) => value.as_str(),
        }
    }

    pub fn value(&self) -> Option<&str> {
        match self {
            Self::Any => None,
            Self::Only(value) => Some(value.as_str()),
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// `Any` accepts everything, including features missing the attribute.
    pub fn accepts(&self, candidate: Option<&str>) -> bool {
        match self {
            Self::Any => true,
            Self::Only(value) => candidate == Some(value.as_str()),
        }
    }
}

/// How a crop filter value is compared against a feature's crop list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CropMatch {
    /// Containment inside the raw list: "Cof" matches "Maíz, Coffee".
    #[default]
    Substring,
    /// Equality with one of the `", "`-separated names.
    Token,
}

impl CropMatch {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Substring => "substring",
            Self::Token => "token",
        }
    }

    fn matches(self, feature: &Feature, crop: &str) -> bool {
        match self {
            Self::Substring => feature.crops().is_some_and(|crops| crops.contains(crop)),
            Self::Token => feature.crop_tokens().any(|token| token == crop),
        }
    }
}

impl FromStr for CropMatch {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "substring" => Ok(Self::Substring),
            "token" => Ok(Self::Token),
            other => Err(format!("unknown crop match mode: {other}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterSelection {
    pub department: Choice,
    pub municipality: Choice,
    pub crop: Choice,
}

impl FilterSelection {
    pub fn matches(&self, feature: &Feature, crop_match: CropMatch) -> bool {
        self.department.accepts(feature.department())
            && self.municipality.accepts(feature.municipality())
            && match &self.crop {
                Choice::Any => true,
                Choice::Only(crop) => crop_match.matches(feature, crop),
            }
    }
}

/// Features of `collection` matching `selection`, in input order.
pub fn apply(collection: &FeatureCollection, selection: &FilterSelection) -> FeatureCollection {
    apply_with(collection, selection, CropMatch::default())
}

pub fn apply_with(
    collection: &FeatureCollection,
    selection: &FilterSelection,
    crop_match: CropMatch,
) -> FeatureCollection {
    let features = collection
        .iter()
        .filter(|feature| selection.matches(feature, crop_match))
        .map(Arc::clone)
        .collect();
    collection.with_features(features)
}
