//! Article normalization.
//!
//! Turns a raw `/papers/{id}` record into the flat [`Article`] display model.
//! The raw record nests the Crossref-style content under either
//! `document.journal.journal_article` or `document.conference.conference_paper`,
//! and Episciences bookkeeping under `document.database.current`.

use crate::citations::{parse_cited_by, parse_references, CitedBy, Reference};
use crate::config::journal_url;
use crate::error::NormalizeError;
use crate::shape::{
    as_slice, flexible_bool, flexible_u64, lenient, string_or_number, text_of, OneOrMany,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Title used when the record carries none
pub const UNTITLED: &str = "untitled";

/// Outcome of a successful normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Normalized<T> {
    /// Every field the record carries was read
    Complete(T),
    /// The record was too thin; only a minimal model could be built
    Fallback(T),
}

impl<T> Normalized<T> {
    pub fn into_inner(self) -> T {
        match self {
            Normalized::Complete(value) | Normalized::Fallback(value) => value,
        }
    }

    pub fn get(&self) -> &T {
        match self {
            Normalized::Complete(value) | Normalized::Fallback(value) => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Normalized::Fallback(_))
    }
}

// === Display model ===

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: u64,
    pub title: String,
    #[serde(rename = "abstract", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    /// File name under the journal's public documents folder
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphical_abstract: Option<String>,
    pub authors: Vec<Author>,
    pub publication_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acceptance_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submission_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modification_date: Option<String>,
    pub is_imported: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    pub repository_name: String,
    pub repository_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<Keyword>>,
    pub doi: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<u64>,
    pub references: Vec<Reference>,
    pub cited_by: Vec<CitedBy>,
    pub related_items: Vec<RelatedItem>,
    pub fundings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
    pub metrics: Metrics,
}

impl Article {
    /// Public URL of the graphical abstract image
    pub fn graphical_abstract_url(&self, rvcode: &str) -> Option<String> {
        self.graphical_abstract
            .as_ref()
            .map(|file| format!("{}/public/documents/{}/{}", journal_url(rvcode), self.id, file))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub fullname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orcid: Option<String>,
    pub institutions: Vec<Institution>,
}

impl Author {
    /// Institution names only, as older consumers expect
    pub fn institution_names(&self) -> Vec<String> {
        self.institutions.iter().map(|i| i.name.clone()).collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ror_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelatedItem {
    pub value: String,
    pub identifier_type: String,
    pub relationship_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub views: u64,
    pub downloads: u64,
}

// === Raw API shapes ===

#[derive(Debug, Default, Deserialize)]
struct RawArticle {
    #[serde(default, deserialize_with = "flexible_u64")]
    paperid: Option<u64>,
    #[serde(default, deserialize_with = "string_or_number")]
    doi: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    document: Option<RawDocument>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDocument {
    #[serde(default, deserialize_with = "lenient")]
    journal: Option<RawJournal>,
    #[serde(default, deserialize_with = "lenient")]
    conference: Option<RawConference>,
    #[serde(default, deserialize_with = "lenient")]
    database: Option<RawDatabase>,
}

#[derive(Debug, Default, Deserialize)]
struct RawJournal {
    #[serde(default, deserialize_with = "lenient")]
    journal_article: Option<RawContent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawConference {
    #[serde(default, deserialize_with = "lenient")]
    conference_paper: Option<RawContent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDatabase {
    #[serde(default, deserialize_with = "lenient")]
    current: Option<RawCurrent>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCurrent {
    #[serde(rename = "mainPdfUrl", default, deserialize_with = "string_or_number")]
    main_pdf_url: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    url: Option<String>,
    #[serde(rename = "isImported", default, deserialize_with = "flexible_bool")]
    is_imported: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    graphical_abstract: Option<String>,
    #[serde(rename = "type", default)]
    article_type: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    identifiers: Option<RawIdentifiers>,
    #[serde(default, deserialize_with = "lenient")]
    repository: Option<RawRepository>,
    #[serde(default, deserialize_with = "lenient")]
    volume: Option<RawVolumeRef>,
    #[serde(default, deserialize_with = "lenient")]
    dates: Option<RawDates>,
    #[serde(default)]
    keywords: Option<Value>,
    #[serde(default)]
    references: Option<Value>,
    #[serde(default)]
    cited_by: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    metrics: Option<RawMetrics>,
}

#[derive(Debug, Default, Deserialize)]
struct RawIdentifiers {
    #[serde(default, deserialize_with = "string_or_number")]
    repository_identifier: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRepository {
    #[serde(default, deserialize_with = "string_or_number")]
    name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    doc_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawVolumeRef {
    #[serde(default, deserialize_with = "flexible_u64")]
    id: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDates {
    #[serde(default, deserialize_with = "string_or_number")]
    publication_date: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    first_submission_date: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    modification_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMetrics {
    #[serde(default, deserialize_with = "flexible_u64")]
    views: Option<u64>,
    #[serde(default, deserialize_with = "flexible_u64")]
    downloads: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContent {
    #[serde(default, deserialize_with = "lenient")]
    titles: Option<RawTitles>,
    #[serde(rename = "abstract", default)]
    abstract_block: Option<Value>,
    #[serde(default, deserialize_with = "lenient")]
    contributors: Option<RawContributors>,
    #[serde(default, deserialize_with = "lenient")]
    doi_data: Option<RawDoiData>,
    #[serde(default, deserialize_with = "lenient")]
    acceptance_date: Option<RawDateParts>,
    #[serde(default)]
    program: Option<OneOrMany<RawProgram>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTitles {
    #[serde(default)]
    title: Option<OneOrMany<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContributors {
    #[serde(default)]
    person_name: Option<OneOrMany<RawPerson>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawPerson {
    #[serde(default, deserialize_with = "string_or_number")]
    given_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    surname: Option<String>,
    #[serde(rename = "@sequence", default, deserialize_with = "string_or_number")]
    sequence: Option<String>,
    #[serde(rename = "ORCID", default, deserialize_with = "string_or_number")]
    orcid: Option<String>,
    #[serde(default)]
    affiliations: Option<OneOrMany<RawAffiliations>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawAffiliations {
    #[serde(default)]
    institution: Option<OneOrMany<RawInstitution>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawInstitution {
    #[serde(default, deserialize_with = "string_or_number")]
    institution_name: Option<String>,
    #[serde(default)]
    institution_id: Option<OneOrMany<RawInstitutionId>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawInstitutionId {
    #[serde(default, deserialize_with = "string_or_number")]
    value: Option<String>,
    #[serde(rename = "@type", default, deserialize_with = "string_or_number")]
    id_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDoiData {
    #[serde(default, deserialize_with = "string_or_number")]
    doi: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawDateParts {
    #[serde(default, deserialize_with = "string_or_number")]
    year: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    month: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    day: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawProgram {
    #[serde(rename = "@name", default, deserialize_with = "string_or_number")]
    name: Option<String>,
    #[serde(default)]
    related_item: Option<OneOrMany<RawRelatedItem>>,
    #[serde(default)]
    assertion: Option<OneOrMany<RawFundGroup>>,
    #[serde(default)]
    license_ref: Option<OneOrMany<Value>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRelatedItem {
    #[serde(default)]
    description: Option<Value>,
    #[serde(default)]
    inter_work_relation: Option<OneOrMany<RawRelation>>,
    #[serde(default)]
    intra_work_relation: Option<OneOrMany<RawRelation>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRelation {
    #[serde(default, deserialize_with = "string_or_number")]
    value: Option<String>,
    #[serde(rename = "@identifier-type", default, deserialize_with = "string_or_number")]
    identifier_type: Option<String>,
    #[serde(rename = "@relationship-type", default, deserialize_with = "string_or_number")]
    relationship_type: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFundGroup {
    #[serde(default)]
    assertion: Option<OneOrMany<RawFundAssertion>>,
}

#[derive(Debug, Default, Deserialize)]
struct RawFundAssertion {
    #[serde(default, deserialize_with = "string_or_number")]
    value: Option<String>,
}

// === Normalization ===

/// Normalize a raw `/papers/{id}` record.
///
/// Returns [`Normalized::Fallback`] with a minimal article when the record has
/// no title, and an error when it is empty, malformed, or has no content block.
pub fn format_article(raw: &Value) -> std::result::Result<Normalized<Article>, NormalizeError> {
    if is_falsy(raw) {
        return Err(NormalizeError::Empty);
    }

    let record: RawArticle = serde_json::from_value(raw.clone())
        .map_err(|e| NormalizeError::Malformed(e.to_string()))?;

    let RawArticle {
        paperid,
        doi: top_level_doi,
        document,
    } = record;
    let document = document.unwrap_or_default();

    let content = document
        .journal
        .and_then(|j| j.journal_article)
        .or_else(|| document.conference.and_then(|c| c.conference_paper))
        .ok_or(NormalizeError::MissingContent(paperid))?;

    let id = paperid.ok_or_else(|| NormalizeError::Malformed("missing paperid".to_string()))?;
    let current = document.database.and_then(|d| d.current).unwrap_or_default();
    let dates = current.dates.as_ref();

    let doi = content
        .doi_data
        .as_ref()
        .and_then(|d| d.doi.clone())
        .or(top_level_doi)
        .unwrap_or_default();
    let publication_date = dates
        .and_then(|d| d.publication_date.clone())
        .unwrap_or_default();

    let Some(title) = extract_title(content.titles.as_ref()) else {
        return Ok(Normalized::Fallback(Article {
            id,
            title: UNTITLED.to_string(),
            doi,
            publication_date,
            is_imported: current.is_imported,
            ..Default::default()
        }));
    };

    let programs = as_slice(&content.program);

    let article = Article {
        id,
        title,
        abstract_text: extract_abstract(content.abstract_block.as_ref()),
        graphical_abstract: current.graphical_abstract.clone(),
        authors: extract_authors(content.contributors.as_ref()),
        publication_date,
        acceptance_date: content.acceptance_date.as_ref().and_then(compose_date),
        submission_date: dates.and_then(|d| d.first_submission_date.clone()),
        modification_date: dates.and_then(|d| d.modification_date.clone()),
        is_imported: current.is_imported,
        tag: current.article_type.as_ref().and_then(extract_tag),
        repository_name: current
            .repository
            .as_ref()
            .and_then(|r| r.name.clone())
            .unwrap_or_default(),
        repository_identifier: current
            .identifiers
            .as_ref()
            .and_then(|i| i.repository_identifier.clone())
            .unwrap_or_default(),
        pdf_link: current.main_pdf_url.clone(),
        doc_link: current
            .repository
            .as_ref()
            .and_then(|r| r.doc_url.clone())
            .or_else(|| current.url.clone()),
        keywords: current.keywords.as_ref().map(extract_keywords),
        doi,
        volume_id: current.volume.as_ref().and_then(|v| v.id).filter(|id| *id > 0),
        references: parse_references(current.references.as_ref()),
        cited_by: parse_cited_by(current.cited_by.as_ref()),
        related_items: extract_related_items(programs),
        fundings: extract_fundings(programs),
        license: extract_license(programs),
        metrics: current
            .metrics
            .as_ref()
            .map(|m| Metrics {
                views: m.views.unwrap_or(0),
                downloads: m.downloads.unwrap_or(0),
            })
            .unwrap_or_default(),
    };

    Ok(Normalized::Complete(article))
}

/// [`format_article`] for list and page contexts: logs and drops failures.
pub fn format_article_opt(raw: &Value) -> Option<Article> {
    match format_article(raw) {
        Ok(normalized) => Some(normalized.into_inner()),
        Err(e) => {
            warn!(error = %e, "Could not normalize article");
            None
        }
    }
}

fn is_falsy(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

fn extract_title(titles: Option<&RawTitles>) -> Option<String> {
    as_slice(&titles?.title)
        .iter()
        .filter_map(text_of)
        .map(|t| t.trim().to_string())
        .find(|t| !t.is_empty())
}

/// Read the abstract block.
///
/// `value` is a string, a list of strings and `{value}` objects joined by a
/// space, or one more `{value}` wrapper. A bare string block is its own value
/// and a list of blocks uses the first one. Any other shape yields an empty
/// string; only a missing block yields `None`.
fn extract_abstract(block: Option<&Value>) -> Option<String> {
    let text = match block? {
        Value::Array(items) => items.first().map(abstract_text).unwrap_or_default(),
        other => abstract_text(other),
    };
    Some(text.trim().to_string())
}

fn abstract_text(block: &Value) -> String {
    let value = match block {
        Value::String(s) => return s.clone(),
        Value::Object(map) => map.get("value"),
        _ => None,
    };

    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.as_str()),
                Value::Object(o) => o.get("value").and_then(Value::as_str),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(" "),
        Some(Value::Object(o)) => match o.get("value") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(inner)) => inner
                .get("value")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_default(),
            _ => String::new(),
        },
        _ => String::new(),
    }
}

fn sequence_rank(sequence: Option<&str>) -> u8 {
    match sequence {
        Some("first") => 0,
        _ => 1,
    }
}

fn extract_authors(contributors: Option<&RawContributors>) -> Vec<Author> {
    let Some(contributors) = contributors else {
        return Vec::new();
    };

    let mut people: Vec<&RawPerson> = as_slice(&contributors.person_name).iter().collect();
    // sort_by_key is stable, so order within each sequence group is kept
    people.sort_by_key(|p| sequence_rank(p.sequence.as_deref()));

    people
        .into_iter()
        .filter_map(|person| {
            let surname = person.surname.as_deref().unwrap_or_default().trim();
            let fullname = match person.given_name.as_deref().map(str::trim) {
                Some(given) if !given.is_empty() => format!("{} {}", given, surname).trim().to_string(),
                _ => surname.to_string(),
            };
            if fullname.is_empty() {
                return None;
            }

            Some(Author {
                fullname,
                orcid: person.orcid.as_deref().and_then(normalize_orcid),
                institutions: extract_institutions(person),
            })
        })
        .collect()
}

fn normalize_orcid(raw: &str) -> Option<String> {
    let bare = raw
        .trim()
        .trim_start_matches("https://orcid.org/")
        .trim_start_matches("http://orcid.org/")
        .trim();
    if bare.is_empty() {
        None
    } else {
        Some(bare.to_string())
    }
}

fn extract_institutions(person: &RawPerson) -> Vec<Institution> {
    as_slice(&person.affiliations)
        .iter()
        .flat_map(|affiliation| as_slice(&affiliation.institution).iter())
        .filter_map(|institution| {
            let name = institution.institution_name.as_deref()?.trim();
            if name.is_empty() {
                return None;
            }
            let ror_id = as_slice(&institution.institution_id)
                .iter()
                .find(|id| {
                    id.id_type.as_deref().is_some_and(|t| t.eq_ignore_ascii_case("ror"))
                        || id.value.as_deref().is_some_and(|v| v.contains("ror.org"))
                })
                .and_then(|id| id.value.clone());

            Some(Institution {
                name: name.to_string(),
                ror_id,
            })
        })
        .collect()
}

/// `{year, month, day}` joined with `-`, verbatim (no zero padding)
fn compose_date(parts: &RawDateParts) -> Option<String> {
    let year = parts.year.as_deref()?;
    let mut date = year.to_string();
    if let Some(month) = parts.month.as_deref() {
        date.push('-');
        date.push_str(month);
        if let Some(day) = parts.day.as_deref() {
            date.push('-');
            date.push_str(day);
        }
    }
    Some(date)
}

fn extract_tag(article_type: &Value) -> Option<String> {
    article_type
        .get("title")
        .and_then(text_of)
        .or_else(|| text_of(article_type))
        .filter(|t| !t.is_empty())
}

fn extract_keywords(raw: &Value) -> Vec<Keyword> {
    fn push_all(out: &mut Vec<Keyword>, value: &Value, language: Option<&str>) {
        match value {
            Value::Array(items) => items.iter().for_each(|item| push_all(out, item, language)),
            other => {
                let item_language = other.get("@xml:lang").and_then(Value::as_str).or(language);
                if let Some(text) = text_of(other).map(|t| t.trim().to_string()) {
                    if !text.is_empty() {
                        out.push(Keyword {
                            value: text,
                            language: item_language.map(str::to_string),
                        });
                    }
                }
            }
        }
    }

    let mut keywords = Vec::new();
    match raw {
        Value::Object(map) if !map.contains_key("value") => {
            for (language, value) in map {
                push_all(&mut keywords, value, Some(language));
            }
        }
        other => push_all(&mut keywords, other, None),
    }
    keywords
}

/// Flatten every program -> related_item -> inter/intra relation
fn extract_related_items(programs: &[RawProgram]) -> Vec<RelatedItem> {
    let mut items = Vec::new();

    for program in programs {
        for related in as_slice(&program.related_item) {
            let citation = related
                .description
                .as_ref()
                .and_then(text_of)
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty());

            let relations = as_slice(&related.inter_work_relation)
                .iter()
                .chain(as_slice(&related.intra_work_relation).iter());

            for relation in relations {
                let Some(value) = relation.value.as_deref().map(str::trim).filter(|v| !v.is_empty()) else {
                    continue;
                };
                items.push(RelatedItem {
                    value: value.to_string(),
                    identifier_type: relation.identifier_type.clone().unwrap_or_default(),
                    relationship_type: relation.relationship_type.clone().unwrap_or_default(),
                    citation: citation.clone(),
                });
            }
        }
    }

    items
}

fn extract_fundings(programs: &[RawProgram]) -> Vec<String> {
    programs
        .iter()
        .filter(|p| p.name.as_deref() == Some("fundref"))
        .flat_map(|p| as_slice(&p.assertion).iter())
        .flat_map(|group| as_slice(&group.assertion).iter())
        .filter_map(|a| a.value.as_deref().map(str::trim))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn extract_license(programs: &[RawProgram]) -> Option<String> {
    programs.iter().find_map(|program| {
        as_slice(&program.license_ref)
            .iter()
            .filter_map(text_of)
            .map(|l| l.trim().to_string())
            .find(|l| !l.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn journal_article(content: Value) -> Value {
        json!({
            "paperid": 7,
            "document": {
                "journal": { "journal_article": content },
                "database": { "current": {
                    "dates": { "publication_date": "2024-03-01" },
                    "repository": { "name": "arXiv", "doc_url": "https://arxiv.org/abs/2401.00001" },
                    "identifiers": { "repository_identifier": "2401.00001" }
                } }
            }
        })
    }

    fn complete(raw: &Value) -> Article {
        match format_article(raw) {
            Ok(Normalized::Complete(article)) => article,
            other => panic!("expected complete article, got {:?}", other),
        }
    }

    #[test]
    fn test_end_to_end_minimal_journal_article() {
        let raw = json!({
            "paperid": 42,
            "document": { "journal": { "journal_article": {
                "titles": { "title": "X" },
                "contributors": { "person_name": { "surname": "Doe", "@sequence": "first" } },
                "doi_data": { "doi": "10.1/x" }
            } } },
            "doi": "10.1/x"
        });

        let article = complete(&raw);
        assert_eq!(article.id, 42);
        assert_eq!(article.title, "X");
        assert_eq!(
            article.authors,
            vec![Author {
                fullname: "Doe".to_string(),
                orcid: None,
                institutions: vec![],
            }]
        );
        assert_eq!(article.doi, "10.1/x");
        assert_eq!(article.metrics, Metrics::default());
    }

    #[test]
    fn test_empty_and_contentless_records() {
        assert_eq!(format_article(&Value::Null), Err(NormalizeError::Empty));
        assert_eq!(format_article(&json!(false)), Err(NormalizeError::Empty));
        assert_eq!(
            format_article(&json!({"paperid": 3, "document": {}})),
            Err(NormalizeError::MissingContent(Some(3)))
        );
        assert!(matches!(
            format_article(&json!("not a record")),
            Err(NormalizeError::Malformed(_))
        ));
        assert!(format_article_opt(&json!({"paperid": 3})).is_none());
    }

    #[test]
    fn test_missing_title_falls_back() {
        let raw = journal_article(json!({
            "contributors": { "person_name": [{ "surname": "Doe" }] },
            "doi_data": { "doi": "10.1/y" }
        }));

        let normalized = format_article(&raw).unwrap();
        assert!(normalized.is_fallback());
        let article = normalized.into_inner();
        assert_eq!(article.title, UNTITLED);
        assert!(article.authors.is_empty());
        assert_eq!(article.doi, "10.1/y");
        assert_eq!(article.metrics, Metrics::default());
    }

    #[test]
    fn test_conference_paper_is_accepted() {
        let raw = json!({
            "paperid": 9,
            "document": { "conference": { "conference_paper": {
                "titles": { "title": [{ "value": "Proceedings paper", "@xml:lang": "en" }] }
            } } }
        });
        assert_eq!(complete(&raw).title, "Proceedings paper");
    }

    #[test]
    fn test_single_person_and_array_of_one_match() {
        let person = json!({
            "given_name": "Jane",
            "surname": "Roe",
            "@sequence": "first",
            "ORCID": "https://orcid.org/0000-0002-1825-0097",
            "affiliations": { "institution": {
                "institution_name": "Inria",
                "institution_id": { "value": "https://ror.org/02kvxyf05", "@type": "ror" }
            } }
        });
        let single = journal_article(json!({
            "titles": { "title": "T" },
            "contributors": { "person_name": person.clone() }
        }));
        let array = journal_article(json!({
            "titles": { "title": "T" },
            "contributors": { "person_name": [person] }
        }));

        let single = complete(&single).authors;
        assert_eq!(single, complete(&array).authors);
        assert_eq!(single[0].fullname, "Jane Roe");
        assert_eq!(single[0].orcid.as_deref(), Some("0000-0002-1825-0097"));
        assert_eq!(single[0].institutions[0].ror_id.as_deref(), Some("https://ror.org/02kvxyf05"));
        assert_eq!(single[0].institution_names(), vec!["Inria"]);
    }

    #[test]
    fn test_first_author_sorted_before_additional() {
        let raw = journal_article(json!({
            "titles": { "title": "T" },
            "contributors": { "person_name": [
                { "surname": "A", "@sequence": "additional" },
                { "surname": "B", "@sequence": "first" },
                { "surname": "C", "@sequence": "additional" }
            ] }
        }));
        let names: Vec<String> = complete(&raw).authors.into_iter().map(|a| a.fullname).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_wrong_shaped_title_falls_back() {
        let raw = journal_article(json!({
            "titles": "T",
            "doi_data": { "doi": "10.1/t" }
        }));

        let normalized = format_article(&raw).unwrap();
        assert!(normalized.is_fallback());
        assert_eq!(normalized.get().title, UNTITLED);
        assert_eq!(normalized.get().doi, "10.1/t");
    }

    #[test]
    fn test_wrong_shaped_fields_degrade() {
        let raw = json!({
            "paperid": 5,
            "document": {
                "journal": { "journal_article": {
                    "titles": { "title": "Kept" },
                    "acceptance_date": "2024-03-09",
                    "contributors": "Doe",
                    "doi_data": "10.1/z"
                } },
                "database": { "current": {
                    "dates": "2024-01-01",
                    "repository": 3,
                    "metrics": "many",
                    "volume": "none"
                } }
            }
        });

        let article = complete(&raw);
        assert_eq!(article.title, "Kept");
        assert_eq!(article.acceptance_date, None);
        assert!(article.authors.is_empty());
        assert_eq!(article.doi, "");
        assert_eq!(article.publication_date, "");
        assert_eq!(article.repository_name, "");
        assert_eq!(article.metrics, Metrics::default());
        assert_eq!(article.volume_id, None);
    }

    #[test]
    fn test_wrong_shaped_content_block_is_missing_content() {
        let raw = json!({ "paperid": 8, "document": { "journal": { "journal_article": "oops" } } });
        assert_eq!(format_article(&raw), Err(NormalizeError::MissingContent(Some(8))));
    }

    #[test]
    fn test_nameless_person_is_skipped() {
        let raw = journal_article(json!({
            "titles": { "title": "T" },
            "contributors": { "person_name": [
                { "ORCID": "0000-0002-1825-0097", "@sequence": "first" },
                { "given_name": "Ann", "surname": "Roe" }
            ] }
        }));
        let authors = complete(&raw).authors;
        assert_eq!(authors.len(), 1);
        assert_eq!(authors[0].fullname, "Ann Roe");
    }

    #[test]
    fn test_abstract_shapes() {
        let cases = [
            (json!({ "value": "Plain" }), "Plain"),
            (json!({ "value": ["One", { "value": "two" }] }), "One two"),
            (json!({ "value": { "value": "Nested" } }), "Nested"),
            (json!({ "value": { "value": { "value": "Deep" } } }), "Deep"),
            (json!([{ "value": "First of many" }]), "First of many"),
            (json!({ "value": 12 }), ""),
            (json!("Bare block"), "Bare block"),
            (json!({ "@xml:lang": "en" }), ""),
            (json!([]), ""),
        ];

        for (block, expected) in cases {
            assert_eq!(extract_abstract(Some(&block)).as_deref(), Some(expected), "{}", block);
        }
        assert_eq!(extract_abstract(None), None);
    }

    #[test]
    fn test_related_items_shape_matrix() {
        let relation = |v: &str| json!({ "value": v, "@identifier-type": "doi", "@relationship-type": "isSupplementedBy" });

        // program singular, related_item singular, inter relation
        let a = journal_article(json!({
            "titles": { "title": "T" },
            "program": { "related_item": { "inter_work_relation": relation("10.1/a"), "description": "Dataset" } }
        }));
        // program array, related_item array, intra + inter relations
        let b = journal_article(json!({
            "titles": { "title": "T" },
            "program": [
                { "@name": "relations", "related_item": [
                    { "intra_work_relation": relation("10.1/b") },
                    { "inter_work_relation": [relation("10.1/c")], "intra_work_relation": relation("10.1/d") }
                ] },
                { "@name": "other" }
            ]
        }));

        let a = complete(&a).related_items;
        assert_eq!(a.len(), 1);
        assert_eq!(a[0].value, "10.1/a");
        assert_eq!(a[0].identifier_type, "doi");
        assert_eq!(a[0].relationship_type, "isSupplementedBy");
        assert_eq!(a[0].citation.as_deref(), Some("Dataset"));

        let values: Vec<String> = complete(&b).related_items.into_iter().map(|r| r.value).collect();
        assert_eq!(values, vec!["10.1/b", "10.1/c", "10.1/d"]);
    }

    #[test]
    fn test_funding_and_license() {
        let raw = journal_article(json!({
            "titles": { "title": "T" },
            "program": [
                { "@name": "AccessIndicators", "license_ref": [{ "value": "" }, { "value": "https://creativecommons.org/licenses/by/4.0" }] },
                { "@name": "fundref", "assertion": { "@name": "fundgroup", "assertion": [
                    { "@name": "funder_name", "value": "ANR" },
                    { "@name": "award_number", "value": "ANR-20-CE40" }
                ] } },
                { "@name": "fundref", "assertion": [{ "assertion": { "value": "ERC" } }] }
            ]
        }));

        let article = complete(&raw);
        assert_eq!(article.fundings, vec!["ANR", "ANR-20-CE40", "ERC"]);
        assert_eq!(
            article.license.as_deref(),
            Some("https://creativecommons.org/licenses/by/4.0")
        );
    }

    #[test]
    fn test_database_fields() {
        let raw = json!({
            "paperid": "11",
            "document": {
                "journal": { "journal_article": {
                    "titles": { "title": "T" },
                    "acceptance_date": { "year": 2024, "month": "3", "day": "9" },
                    "abstract": { "value": "Abs" }
                } },
                "database": { "current": {
                    "mainPdfUrl": "https://j.episciences.org/11/pdf",
                    "isImported": "1",
                    "graphical_abstract": "ga.png",
                    "type": { "title": "research-article" },
                    "volume": { "id": 5 },
                    "dates": { "publication_date": "2024-04-01", "first_submission_date": "2023-01-01", "modification_date": "2024-05-01" },
                    "keywords": { "en": ["graphs", "colouring"], "fr": "graphes" },
                    "metrics": { "views": "120", "downloads": 30 }
                } }
            }
        });

        let article = complete(&raw);
        assert_eq!(article.id, 11);
        assert_eq!(article.acceptance_date.as_deref(), Some("2024-3-9"));
        assert_eq!(article.abstract_text.as_deref(), Some("Abs"));
        assert!(article.is_imported);
        assert_eq!(article.tag.as_deref(), Some("research-article"));
        assert_eq!(article.volume_id, Some(5));
        assert_eq!(article.submission_date.as_deref(), Some("2023-01-01"));
        assert_eq!(article.metrics, Metrics { views: 120, downloads: 30 });
        assert_eq!(
            article.graphical_abstract_url("acme").as_deref(),
            Some("https://acme.episciences.org/public/documents/11/ga.png")
        );

        let keywords = article.keywords.unwrap();
        assert_eq!(keywords.len(), 3);
        assert_eq!(keywords[2], Keyword { value: "graphes".into(), language: Some("fr".into()) });
    }

    #[test]
    fn test_repository_fields_and_serialization() {
        let article = complete(&journal_article(json!({ "titles": { "title": "T" } })));
        assert_eq!(article.repository_name, "arXiv");
        assert_eq!(article.repository_identifier, "2401.00001");
        assert_eq!(article.doc_link.as_deref(), Some("https://arxiv.org/abs/2401.00001"));

        let json = serde_json::to_value(&article).unwrap();
        assert_eq!(json["publicationDate"], "2024-03-01");
        assert_eq!(json["authors"], json!([]));
        assert!(json.get("abstract").is_none());
    }
}
