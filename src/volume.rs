//! Volume normalization.
//!
//! [`format_volume`] never fails: the raw record is read field by field and
//! anything missing or malformed falls back to an empty value.

use crate::config::journal_url;
use crate::shape::{as_array, flexible_u64, string_or_number, value_to_string, value_to_u64, OneOrMany};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Metadata entry title marking the volume tile image
pub const TILE_METADATA_TITLE: &str = "tile";

/// Text keyed by language code
pub type LangMap = BTreeMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: u64,
    pub num: String,
    pub title: LangMap,
    pub description: LangMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<u64>,
    pub types: Vec<String>,
    pub articles: Vec<PaperRef>,
    pub download_link: String,
    pub metadatas: Vec<VolumeMetadata>,
    #[serde(rename = "tileImageURL", skip_serializing_if = "Option::is_none")]
    pub tile_image_url: Option<String>,
    pub settings_proceeding: Vec<ProceedingSetting>,
}

impl Volume {
    /// Title in `language`, falling back to any available one
    pub fn title_in(&self, language: &str) -> Option<&str> {
        localized(&self.title, language)
    }

    pub fn description_in(&self, language: &str) -> Option<&str> {
        localized(&self.description, language)
    }

    pub fn article_ids(&self) -> Vec<u64> {
        self.articles.iter().map(|p| p.paperid).collect()
    }
}

/// A paper listed inside a volume or section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaperRef {
    pub paperid: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docid: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeMetadata {
    pub title: LangMap,
    pub content: LangMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProceedingSetting {
    pub setting: String,
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawPaperRef {
    #[serde(default, deserialize_with = "flexible_u64")]
    paperid: Option<u64>,
    #[serde(default, deserialize_with = "flexible_u64")]
    docid: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    titles: Option<Value>,
    #[serde(default)]
    content: Option<Value>,
    #[serde(default, deserialize_with = "string_or_number")]
    file: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    date_creation: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    date_updated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSetting {
    #[serde(default, deserialize_with = "string_or_number")]
    setting: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    value: Option<String>,
}

/// Read a `{lang: text}` object; other shapes give an empty map
pub fn lang_map(value: Option<&Value>) -> LangMap {
    match value {
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(lang, text)| value_to_string(text).map(|t| (lang.clone(), t)))
            .filter(|(_, t)| !t.trim().is_empty())
            .collect(),
        _ => LangMap::new(),
    }
}

fn localized<'a>(map: &'a LangMap, language: &str) -> Option<&'a str> {
    map.get(language)
        .or_else(|| map.values().next())
        .map(String::as_str)
}

/// Paper references listed under `papers`, skipping entries without an ID
pub fn paper_refs(value: Option<&Value>) -> Vec<PaperRef> {
    let raw: Vec<RawPaperRef> = value
        .cloned()
        .map(|v| OneOrMany::from_value(v).into_vec())
        .unwrap_or_default();

    raw.into_iter()
        .filter_map(|p| {
            Some(PaperRef {
                paperid: p.paperid?,
                docid: p.docid,
            })
        })
        .collect()
}

/// PDF bundle of the whole volume
pub fn volume_download_link(rvcode: &str, id: u64) -> String {
    format!("{}/volumes-full/{}/{}.pdf", journal_url(rvcode), id, id)
}

fn tile_image_url(rvcode: &str, id: u64, language: &str, metadatas: &[VolumeMetadata]) -> Option<String> {
    metadatas
        .iter()
        .find(|m| m.title.get(language).map(String::as_str) == Some(TILE_METADATA_TITLE))
        .and_then(|m| m.file.as_deref())
        .map(|file| format!("{}/public/volumes/{}/{}", journal_url(rvcode), id, file))
}

/// Normalize a raw `/volumes/{id}` record for one UI language.
///
/// # Arguments
///
/// * `rvcode` - Journal code, used to build the download and tile URLs
/// * `language` - Active UI language; only `metadata.titles[language]` is
///   checked when looking for the tile image
/// * `raw` - The record as returned by the API
pub fn format_volume(rvcode: &str, language: &str, raw: &Value) -> Volume {
    let field = |name: &str| raw.get(name);

    let id = field("vid").and_then(value_to_u64).unwrap_or(0);

    let metadatas: Vec<VolumeMetadata> = field("metadata")
        .cloned()
        .map(|v| OneOrMany::<RawMetadata>::from_value(v).into_vec())
        .unwrap_or_default()
        .into_iter()
        .map(|m| VolumeMetadata {
            title: lang_map(m.titles.as_ref()),
            content: lang_map(m.content.as_ref()),
            file: m.file,
            created_at: m.date_creation,
            updated_at: m.date_updated,
        })
        .collect();

    let settings_proceeding = field("settings_proceeding")
        .cloned()
        .map(|v| OneOrMany::<RawSetting>::from_value(v).into_vec())
        .unwrap_or_default()
        .into_iter()
        .filter_map(|s| {
            Some(ProceedingSetting {
                setting: s.setting?,
                value: s.value.unwrap_or_default(),
            })
        })
        .collect();

    let types = as_array(field("vol_type").cloned().map(OneOrMany::<String>::from_value))
        .into_iter()
        .filter(|t| !t.trim().is_empty())
        .collect();

    Volume {
        id,
        num: field("vol_num").and_then(value_to_string).unwrap_or_default(),
        title: lang_map(field("titles")),
        description: lang_map(field("descriptions")),
        year: field("vol_year").and_then(value_to_u64),
        types,
        articles: paper_refs(field("papers")),
        download_link: volume_download_link(rvcode, id),
        tile_image_url: tile_image_url(rvcode, id, language, &metadatas),
        metadatas,
        settings_proceeding,
    }
}
