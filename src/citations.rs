//! Bibliographic references and "cited by" records attached to an article.
//!
//! Both live under `document.database.current` and both carry JSON encoded
//! as strings inside the JSON record, so they are parsed twice.

use crate::shape::{string_or_number, text_of};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

static ORCID_RE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{4}-\d{4}-\d{3}[\dXx])").ok());

/// One entry of the bibliography
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub citation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

/// Citing works reported by one source (OpenCitations, OpenAlex, ...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitedBy {
    pub source: String,
    pub citations: Vec<CitedByCitation>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitedByCitation {
    pub title: String,
    pub source_title: String,
    pub authors: Vec<CitedByAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub citation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oa_link: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CitedByAuthor {
    pub fullname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCitedByDetail {
    #[serde(default, deserialize_with = "string_or_number")]
    title: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    source_title: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    author: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    volume: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    issue: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    page: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    year: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    doi: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "string_or_number")]
    citation_type: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    oa_link: Option<String>,
}

/// Values of a JSON object keyed by index, or the items of an array
fn entries(value: &Value) -> Vec<&Value> {
    match value {
        Value::Object(map) => map.values().collect(),
        Value::Array(items) => items.iter().collect(),
        _ => Vec::new(),
    }
}

/// Parse `database.current.references`
pub fn parse_references(raw: Option<&Value>) -> Vec<Reference> {
    raw.map(entries)
        .unwrap_or_default()
        .into_iter()
        .filter_map(reference_from)
        .collect()
}

fn reference_from(value: &Value) -> Option<Reference> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(parsed @ Value::Object(_)) => reference_from(&parsed),
                _ => Some(Reference {
                    citation: trimmed.to_string(),
                    doi: None,
                }),
            }
        }
        Value::Object(map) => {
            let doi = map
                .get("doi")
                .and_then(text_of)
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty());

            if let Some(inner) = map.get("reference") {
                let mut reference = reference_from(inner)?;
                if reference.doi.is_none() {
                    reference.doi = doi;
                }
                return Some(reference);
            }

            let citation = map
                .get("raw_reference")
                .or_else(|| map.get("citation"))
                .and_then(text_of)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())?;

            Some(Reference { citation, doi })
        }
        _ => None,
    }
}

/// Parse `database.current.cited_by`
///
/// Each entry holds its citations as a JSON string; entries whose string does
/// not parse are skipped.
pub fn parse_cited_by(raw: Option<&Value>) -> Vec<CitedBy> {
    raw.map(entries)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|entry| {
            let source = entry
                .get("source_id_name")
                .and_then(text_of)
                .unwrap_or_default();

            let citations = match entry.get("citation")? {
                Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        debug!(source = %source, error = %e, "Skipping unparsable cited_by entry");
                        return None;
                    }
                },
                // Tolerate records already decoded upstream
                other => other.clone(),
            };

            let citations: Vec<CitedByCitation> = entries(&citations)
                .into_iter()
                .filter_map(|detail| serde_json::from_value::<RawCitedByDetail>(detail.clone()).ok())
                .map(citation_from_detail)
                .collect();

            Some(CitedBy { source, citations })
        })
        .collect()
}

fn citation_from_detail(detail: RawCitedByDetail) -> CitedByCitation {
    CitedByCitation {
        title: detail.title.unwrap_or_default(),
        source_title: detail.source_title.unwrap_or_default(),
        authors: parse_cited_by_authors(detail.author.as_deref().unwrap_or_default()),
        volume: detail.volume,
        issue: detail.issue,
        page: detail.page,
        year: detail.year,
        doi: detail.doi,
        citation_type: detail.citation_type,
        oa_link: detail.oa_link,
    }
}

/// `"Doe, John, 0000-0002-1825-0097; Smith Jane"` -> two authors
///
/// Authors are separated by `;`. Within an author the ORCID, when present,
/// follows the last `,`.
pub fn parse_cited_by_authors(raw: &str) -> Vec<CitedByAuthor> {
    raw.split(';')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(|author| {
            if let Some((name, tail)) = author.rsplit_once(',') {
                if let Some(orcid) = find_orcid(tail) {
                    return CitedByAuthor {
                        fullname: name.trim().trim_end_matches(',').trim().to_string(),
                        orcid: Some(orcid),
                    };
                }
            }
            CitedByAuthor {
                fullname: author.to_string(),
                orcid: None,
            }
        })
        .filter(|a| !a.fullname.is_empty())
        .collect()
}

/// Bare ORCID iD found in `text`, with a lowercase checksum normalized to `X`
pub fn find_orcid(text: &str) -> Option<String> {
    ORCID_RE
        .as_ref()?
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_uppercase())
}
