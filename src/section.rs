//! Section normalization.

use crate::shape::value_to_u64;
use crate::volume::{lang_map, paper_refs, LangMap, PaperRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: u64,
    pub title: LangMap,
    pub description: LangMap,
    pub articles: Vec<PaperRef>,
}

impl Section {
    pub fn article_ids(&self) -> Vec<u64> {
        self.articles.iter().map(|p| p.paperid).collect()
    }
}

/// Normalize a raw `/sections/{id}` record. Never fails.
pub fn format_section(raw: &Value) -> Section {
    Section {
        id: raw.get("sid").and_then(value_to_u64).unwrap_or(0),
        title: lang_map(raw.get("titles")),
        description: lang_map(raw.get("descriptions")),
        articles: paper_refs(raw.get("papers")),
    }
}
