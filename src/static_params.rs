//! Static-generation parameters.
//!
//! Enumerates the `{id, lang}` tuples a static site build needs to emit one
//! page per content item and locale. The fan-out itself is left to the build
//! tool; this module only lists the work items.

use crate::config::{Languages, RebuildScope};
use crate::error::Result;
use crate::fetcher::ApiClient;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// One set of route parameters, in caller key order
pub type Params = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageParam {
    pub lang: String,
}

/// Which locales to build.
///
/// A static page rebuild needs every accepted language. A targeted rebuild of
/// one article, volume or section only needs the default one. Otherwise every
/// accepted language is built.
pub fn generate_language_params(scope: &RebuildScope, languages: &Languages) -> Vec<LanguageParam> {
    if !scope.is_static_page() && scope.is_targeted() {
        return vec![LanguageParam {
            lang: languages.default.clone(),
        }];
    }

    languages
        .accepted
        .iter()
        .map(|lang| LanguageParam { lang: lang.clone() })
        .collect()
}

/// Cartesian product of `params` and `lang_params`.
///
/// Each output keeps the caller's key order; an existing `lang` key is
/// overwritten in place.
pub fn combine_with_language_params(params: &[Params], lang_params: &[LanguageParam]) -> Vec<Params> {
    params
        .iter()
        .flat_map(|param| {
            lang_params.iter().map(move |lang| {
                let mut combined = param.clone();
                combined.insert("lang".to_string(), Value::String(lang.lang.clone()));
                combined
            })
        })
        .collect()
}

/// `[{"id": ...}]` for a list of IDs
pub fn id_params(ids: &[String]) -> Vec<Params> {
    ids.iter()
        .map(|id| {
            let mut params = Params::new();
            params.insert("id".to_string(), Value::String(id.clone()));
            params
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Articles,
    Volumes,
    Sections,
    Pages,
    Languages,
}

impl ParamKind {
    pub const ALL: [ParamKind; 5] = [
        ParamKind::Articles,
        ParamKind::Volumes,
        ParamKind::Sections,
        ParamKind::Pages,
        ParamKind::Languages,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Articles => "articles",
            ParamKind::Volumes => "volumes",
            ParamKind::Sections => "sections",
            ParamKind::Pages => "pages",
            ParamKind::Languages => "languages",
        }
    }
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == wanted)
            .ok_or_else(|| format!("unknown parameter kind '{}'", s))
    }
}

/// Lists static parameters for one journal, fetching IDs from the API.
pub struct StaticParamsGenerator<'a> {
    client: &'a ApiClient,
    scope: &'a RebuildScope,
    languages: &'a Languages,
}

impl<'a> StaticParamsGenerator<'a> {
    pub fn new(client: &'a ApiClient, scope: &'a RebuildScope, languages: &'a Languages) -> Self {
        Self {
            client,
            scope,
            languages,
        }
    }

    pub async fn generate(&self, kind: ParamKind) -> Result<Vec<Params>> {
        let ids = match kind {
            ParamKind::Languages => {
                let langs = generate_language_params(self.scope, self.languages);
                return Ok(langs
                    .into_iter()
                    .map(|l| {
                        let mut params = Params::new();
                        params.insert("lang".to_string(), Value::String(l.lang));
                        params
                    })
                    .collect());
            }
            ParamKind::Articles => self.ids_or_target(&self.scope.article_id, self.client.paper_ids()).await?,
            ParamKind::Volumes => self.ids_or_target(&self.scope.volume_id, self.client.volume_ids()).await?,
            ParamKind::Sections => self.ids_or_target(&self.scope.section_id, self.client.section_ids()).await?,
            ParamKind::Pages => self.ids_or_target(&self.scope.static_page, self.client.page_codes()).await?,
        };

        let params = combine_with_language_params(
            &id_params(&ids),
            &generate_language_params(self.scope, self.languages),
        );
        info!(kind = %kind, ids = ids.len(), params = params.len(), "Generated static params");
        Ok(params)
    }

    /// A targeted rebuild lists only its own ID and skips the API
    async fn ids_or_target<F>(&self, target: &Option<String>, fetch: F) -> Result<Vec<String>>
    where
        F: std::future::Future<Output = Result<Vec<String>>>,
    {
        match target {
            Some(id) => Ok(vec![id.clone()]),
            None => fetch.await,
        }
    }
}

/// Column order: keys in first-seen order across all rows
fn csv_headers(params: &[Params]) -> Vec<String> {
    let mut headers: Vec<String> = Vec::new();
    for key in params.iter().flat_map(|p| p.keys()) {
        if !headers.contains(key) {
            headers.push(key.clone());
        }
    }
    headers
}

/// Write params as CSV, one row per tuple
pub fn write_params_csv<W: std::io::Write>(writer: W, params: &[Params]) -> Result<()> {
    let headers = csv_headers(params);
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    if !headers.is_empty() {
        wtr.write_record(&headers)?;
    }
    for row in params {
        let record: Vec<String> = headers
            .iter()
            .map(|h| match row.get(h) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Save params to `path` as CSV or pretty JSON depending on the extension
pub fn save_params(path: &Path, params: &[Params]) -> Result<()> {
    let file = std::fs::File::create(path)?;
    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));

    if is_csv {
        write_params_csv(file, params)?;
    } else {
        serde_json::to_writer_pretty(file, params)?;
    }

    info!(path = %path.display(), rows = params.len(), "Saved static params");
    Ok(())
}
