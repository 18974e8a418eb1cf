//! Search facet normalization.
//!
//! The `hydra:range` block of a search response carries facet counts:
//!
//! ```text
//! { "year":    { "2024": 10, ... },
//!   "type":    { "article": 3, ... },
//!   "author":  { "Doe, Jane": 2, ... },
//!   "volume":  { "en": { "12": { "Special issue": 4 } }, "fr": { ... } },
//!   "section": { "en": { "3": { "Algorithms": 1 } } } }
//! ```

use crate::shape::value_to_u64;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Reverse;
use std::collections::BTreeMap;

/// Languages always present in the volume and section facets
pub const FACET_LANGUAGES: [&str; 2] = ["en", "fr"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearFacet {
    pub value: u64,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueFacet {
    pub value: String,
    pub count: u64,
}

/// A volume or section facet entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledFacet {
    pub id: u64,
    pub label: String,
    pub count: u64,
}

/// Facets keyed by language
pub type LabeledFacets = BTreeMap<String, Vec<LabeledFacet>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedSearchRange {
    pub years: Vec<YearFacet>,
    pub types: Vec<ValueFacet>,
    pub volumes: LabeledFacets,
    pub sections: LabeledFacets,
    pub authors: Vec<ValueFacet>,
}

impl Default for FormattedSearchRange {
    fn default() -> Self {
        Self {
            years: Vec::new(),
            types: Vec::new(),
            volumes: empty_labeled(),
            sections: empty_labeled(),
            authors: Vec::new(),
        }
    }
}

fn empty_labeled() -> LabeledFacets {
    FACET_LANGUAGES
        .iter()
        .map(|lang| (lang.to_string(), Vec::new()))
        .collect()
}

fn object<'a>(raw: &'a Value, key: &str) -> Option<&'a Map<String, Value>> {
    raw.get(key).and_then(Value::as_object)
}

/// `{key: count}` pairs; entries with a non-numeric count are skipped
fn counts(map: Option<&Map<String, Value>>) -> impl Iterator<Item = (&String, u64)> {
    map.into_iter()
        .flat_map(|m| m.iter())
        .filter_map(|(key, count)| value_to_u64(count).map(|c| (key, c)))
}

fn value_facets(map: Option<&Map<String, Value>>) -> Vec<ValueFacet> {
    let mut facets: Vec<ValueFacet> = counts(map)
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, count)| ValueFacet {
            value: key.clone(),
            count,
        })
        .collect();
    facets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    facets
}

fn labeled_facets(map: Option<&Map<String, Value>>) -> LabeledFacets {
    let mut facets = empty_labeled();

    for (lang, entries) in map.into_iter().flat_map(|m| m.iter()) {
        let Some(entries) = entries.as_object() else {
            continue;
        };
        let list: Vec<LabeledFacet> = entries
            .iter()
            .filter_map(|(id, labels)| Some((id.trim().parse::<u64>().ok()?, labels.as_object()?)))
            .flat_map(|(id, labels)| {
                counts(Some(labels)).map(move |(label, count)| LabeledFacet {
                    id,
                    label: label.clone(),
                    count,
                })
            })
            .collect();
        facets.insert(lang.clone(), list);
    }

    facets
}

/// Normalize the `hydra:range` payload of a search response. Never fails.
pub fn format_search_range(raw: &Value) -> FormattedSearchRange {
    let mut years: Vec<YearFacet> = counts(object(raw, "year"))
        .filter_map(|(year, count)| {
            Some(YearFacet {
                value: year.trim().parse().ok()?,
                count,
            })
        })
        .collect();
    years.sort_by_key(|y| Reverse(y.value));

    FormattedSearchRange {
        years,
        types: value_facets(object(raw, "type")),
        volumes: labeled_facets(object(raw, "volume")),
        sections: labeled_facets(object(raw, "section")),
        authors: value_facets(object(raw, "author")),
    }
}
