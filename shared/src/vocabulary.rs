use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::feature::FeatureCollection;
use crate::filter::Choice;

/// Distinct, sorted filter values derived from a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    pub departments: Vec<String>,
    pub municipalities: Vec<String>,
    pub crops: Vec<String>,
}

/// Build all three vocabularies in a single pass.
///
/// Features missing a department or municipality contribute nothing to that
/// list. Crop tokens are trimmed and blank tokens dropped.
pub fn extract(collection: &FeatureCollection) -> Vocabulary {
    let mut departments = BTreeSet::new();
    let mut municipalities = BTreeSet::new();
    let mut crops = BTreeSet::new();

    for feature in collection.iter() {
        if let Some(department) = feature.department() {
            departments.insert(department);
        }
        if let Some(municipality) = feature.municipality() {
            municipalities.insert(municipality);
        }
        crops.extend(feature.crop_tokens());
    }

    Vocabulary {
        departments: into_sorted(departments),
        municipalities: into_sorted(municipalities),
        crops: into_sorted(crops),
    }
}

/// Municipality options for a department selection; `Any` lists every municipality.
pub fn municipalities_for_department(
    collection: &FeatureCollection,
    department: &Choice,
) -> Vec<String> {
    let names: BTreeSet<&str> = collection
        .iter()
        .filter(|feature| department.accepts(feature.department()))
        .filter_map(|feature| feature.municipality())
        .collect();
    into_sorted(names)
}

fn into_sorted(set: BTreeSet<&str>) -> Vec<String> {
    set.into_iter().map(str::to_owned).collect()
}
