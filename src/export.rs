//! Metadata export formats and citation entities.
//!
//! Exports are fetched from `/papers/export/{id}/{format}` and passed through
//! untouched, except CSL-JSON, which is read to render APA and MLA citations.

use crate::shape::{string_or_number, text_of, OneOrMany};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"<[^>]+>").ok());

/// Metadata formats offered by the export endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataType {
    Bibtex,
    Ris,
    DublinCore,
    JsonLd,
    Tei,
    Dc,
    Crossref,
    Zbjats,
    Doaj,
    Csl,
    Openaire,
    Json,
}

impl MetadataType {
    pub const ALL: [MetadataType; 12] = [
        MetadataType::Bibtex,
        MetadataType::Ris,
        MetadataType::DublinCore,
        MetadataType::JsonLd,
        MetadataType::Tei,
        MetadataType::Dc,
        MetadataType::Crossref,
        MetadataType::Zbjats,
        MetadataType::Doaj,
        MetadataType::Csl,
        MetadataType::Openaire,
        MetadataType::Json,
    ];

    /// Path segment used by the API
    pub fn slug(&self) -> &'static str {
        match self {
            MetadataType::Bibtex => "bibtex",
            MetadataType::Ris => "ris",
            MetadataType::DublinCore => "dublin-core",
            MetadataType::JsonLd => "json-ld",
            MetadataType::Tei => "tei",
            MetadataType::Dc => "dc",
            MetadataType::Crossref => "crossref",
            MetadataType::Zbjats => "zbjats",
            MetadataType::Doaj => "doaj",
            MetadataType::Csl => "csl",
            MetadataType::Openaire => "openaire",
            MetadataType::Json => "json",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetadataType::Bibtex => "BibTeX",
            MetadataType::Ris => "RIS",
            MetadataType::DublinCore => "Dublin Core",
            MetadataType::JsonLd => "JSON-LD",
            MetadataType::Tei => "TEI",
            MetadataType::Dc => "DC",
            MetadataType::Crossref => "Crossref",
            MetadataType::Zbjats => "ZbJATS",
            MetadataType::Doaj => "DOAJ",
            MetadataType::Csl => "CSL",
            MetadataType::Openaire => "OpenAIRE",
            MetadataType::Json => "JSON",
        }
    }

    /// Extension of the downloaded file
    pub fn file_extension(&self) -> &'static str {
        match self {
            MetadataType::Bibtex => "bib",
            MetadataType::Ris => "ris",
            MetadataType::Json | MetadataType::JsonLd | MetadataType::Csl => "json",
            _ => "xml",
        }
    }

    pub fn file_name(&self, paper_id: &str) -> String {
        format!("{}.{}", paper_id, self.file_extension())
    }
}

impl fmt::Display for MetadataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for MetadataType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        MetadataType::ALL
            .into_iter()
            .find(|t| t.slug() == wanted)
            .ok_or_else(|| format!("unknown metadata format: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CitationKey {
    #[serde(rename = "APA")]
    Apa,
    #[serde(rename = "MLA")]
    Mla,
    #[serde(rename = "BibTeX")]
    BibTex,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub key: CitationKey,
    pub citation: String,
}

/// Subset of a CSL-JSON item used for rendering.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CslItem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Vec<CslName>,
    #[serde(default)]
    pub issued: Option<CslDate>,
    #[serde(default)]
    pub container_title: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub volume: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub issue: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub page: Option<String>,
    #[serde(rename = "DOI", default)]
    pub doi: Option<String>,
    #[serde(rename = "URL", default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CslName {
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub given: Option<String>,
    #[serde(default)]
    pub literal: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CslDate {
    #[serde(rename = "date-parts", default)]
    pub date_parts: Vec<Vec<Value>>,
}

impl CslItem {
    /// Parse the CSL export body: a single item or a list (first item wins)
    pub fn parse(body: &str) -> Option<CslItem> {
        let value: Value = serde_json::from_str(body).ok()?;
        OneOrMany::<CslItem>::from_value(value).into_vec().into_iter().next()
    }

    pub fn year(&self) -> Option<String> {
        self.issued
            .as_ref()
            .and_then(|d| d.date_parts.first())
            .and_then(|parts| parts.first())
            .and_then(text_of)
    }

    fn clean_title(&self) -> Option<String> {
        self.title
            .as_deref()
            .map(strip_html_tags)
            .map(|t| t.trim().trim_end_matches('.').to_string())
            .filter(|t| !t.is_empty())
    }

    fn doi_url(&self) -> Option<String> {
        match (&self.doi, &self.url) {
            (Some(doi), _) if !doi.is_empty() => Some(format!("https://doi.org/{}", doi)),
            (_, Some(url)) if !url.is_empty() => Some(url.clone()),
            _ => None,
        }
    }
}

impl CslName {
    fn family_or_literal(&self) -> String {
        self.family
            .clone()
            .or_else(|| self.literal.clone())
            .unwrap_or_default()
            .trim()
            .to_string()
    }

    /// "Jean-Paul Marie" -> "J.-P. M."
    fn initials(&self) -> String {
        self.given
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(|word| {
                word.split('-')
                    .filter_map(|part| part.chars().next())
                    .map(|c| format!("{}.", c))
                    .collect::<Vec<_>>()
                    .join("-")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn inverted(&self) -> String {
        match self.given.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            Some(given) => format!("{}, {}", self.family_or_literal(), given),
            None => self.family_or_literal(),
        }
    }

    fn natural(&self) -> String {
        match self.given.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
            Some(given) => format!("{} {}", given, self.family_or_literal()),
            None => self.family_or_literal(),
        }
    }
}

/// Strip HTML tags from text
fn strip_html_tags(text: &str) -> String {
    match TAG_RE.as_ref() {
        Some(re) => re.replace_all(text, "").to_string(),
        None => text.to_string(),
    }
}

fn apa_authors(names: &[CslName]) -> String {
    let formatted: Vec<String> = names
        .iter()
        .map(|n| {
            let initials = n.initials();
            if initials.is_empty() {
                n.family_or_literal()
            } else {
                format!("{}, {}", n.family_or_literal(), initials)
            }
        })
        .filter(|n| !n.is_empty())
        .collect();

    match formatted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{}, & {}", first, second),
        [rest @ .., last] => format!("{}, & {}", rest.join(", "), last),
    }
}

fn mla_authors(names: &[CslName]) -> String {
    match names {
        [] => String::new(),
        [one] => one.inverted(),
        [first, second] => format!("{}, and {}", first.inverted(), second.natural()),
        [first, ..] => format!("{}, et al", first.inverted()),
    }
}

/// `Doe, J., & Smith, J. (2024). Title. Journal, 12(3), 1–10. https://doi.org/...`
pub fn format_apa(item: &CslItem) -> String {
    let mut parts: Vec<String> = Vec::new();

    let authors = apa_authors(&item.author);
    if !authors.is_empty() {
        parts.push(authors);
    }
    parts.push(format!("({}).", item.year().unwrap_or_else(|| "n.d.".to_string())));

    match item.clean_title() {
        Some(title) => parts.push(format!("{}.", title)),
        None if item.author.is_empty() => return String::new(),
        None => {}
    }

    if let Some(container) = item.container_title.as_deref().filter(|c| !c.is_empty()) {
        let mut source = container.to_string();
        if let Some(volume) = &item.volume {
            source.push_str(&format!(", {}", volume));
            if let Some(issue) = &item.issue {
                source.push_str(&format!("({})", issue));
            }
        }
        if let Some(page) = &item.page {
            source.push_str(&format!(", {}", page.replace('-', "–")));
        }
        parts.push(format!("{}.", source));
    }

    if let Some(link) = item.doi_url() {
        parts.push(link);
    }

    parts.join(" ")
}

/// `Doe, John, and Jane Smith. “Title.” Journal, vol. 12, no. 3, 2024, pp. 1-10. https://doi.org/...`
pub fn format_mla(item: &CslItem) -> String {
    let Some(title) = item.clean_title() else {
        return String::new();
    };

    let mut out = String::new();
    let authors = mla_authors(&item.author);
    if !authors.is_empty() {
        out.push_str(authors.trim_end_matches('.'));
        out.push_str(". ");
    }
    out.push_str(&format!("“{}.”", title));

    let mut source: Vec<String> = Vec::new();
    if let Some(container) = item.container_title.as_deref().filter(|c| !c.is_empty()) {
        source.push(container.to_string());
    }
    if let Some(volume) = &item.volume {
        source.push(format!("vol. {}", volume));
    }
    if let Some(issue) = &item.issue {
        source.push(format!("no. {}", issue));
    }
    if let Some(year) = item.year() {
        source.push(year);
    }
    if let Some(page) = &item.page {
        source.push(format!("pp. {}", page));
    }
    if !source.is_empty() {
        out.push(' ');
        out.push_str(&source.join(", "));
        out.push('.');
    }

    if let Some(link) = item.doi_url() {
        out.push(' ');
        out.push_str(&link);
    }

    out
}

/// Build `[APA, MLA, BibTeX]` in that order and drop empty bodies
pub fn build_citations(csl: Option<&CslItem>, bibtex: Option<&str>) -> Vec<Citation> {
    let entries = [
        (CitationKey::Apa, csl.map(format_apa).unwrap_or_default()),
        (CitationKey::Mla, csl.map(format_mla).unwrap_or_default()),
        (
            CitationKey::BibTex,
            bibtex.map(|b| b.trim().to_string()).unwrap_or_default(),
        ),
    ];

    entries
        .into_iter()
        .filter(|(_, citation)| !citation.trim().is_empty())
        .map(|(key, citation)| Citation { key, citation })
        .collect()
}
