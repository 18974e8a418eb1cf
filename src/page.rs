//! Page assembly.
//!
//! Combines the fetcher and the normalizers into the data one page needs.
//! Failures stop here: they are logged and turned into an unavailable page or
//! a shorter list, never returned to the renderer as errors.

use crate::article::{format_article, Article, Normalized};
use crate::error::Result;
use crate::export::{build_citations, Citation, CslItem, MetadataType};
use crate::fetcher::ApiClient;
use crate::search::{format_search_range, FormattedSearchRange};
use crate::section::{format_section, Section};
use crate::shape::value_to_string;
use crate::volume::{format_volume, Volume};
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

/// Data behind an article page
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticlePageData {
    pub article: Article,
    /// Only a minimal record could be built
    pub partial: bool,
    pub citations: Vec<Citation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<Volume>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graphical_abstract_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ArticlePage {
    Ready(Box<ArticlePageData>),
    Unavailable { id: String, reason: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct VolumePage {
    pub volume: Volume,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionPage {
    pub section: Section,
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub terms: String,
    pub total_items: u64,
    pub articles: Vec<Article>,
    pub range: FormattedSearchRange,
}

fn unavailable(id: &str, reason: impl ToString) -> ArticlePage {
    ArticlePage::Unavailable {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

/// Export body, or `None` when the export could not be fetched
fn export_or_none(id: &str, format: MetadataType, result: Result<String>) -> Option<String> {
    match result {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(id, format = %format, error = %e, "Export unavailable");
            None
        }
    }
}

/// Fetch and normalize everything an article page shows.
///
/// The article and its CSL and BibTeX exports are fetched concurrently; the
/// related volume is fetched once the article names it.
pub async fn assemble_article_page(client: &ApiClient, language: &str, id: &str) -> ArticlePage {
    let (raw, csl, bibtex) = tokio::join!(
        client.paper(id),
        client.paper_export(id, MetadataType::Csl),
        client.paper_export(id, MetadataType::Bibtex),
    );

    let raw = match raw {
        Ok(raw) => raw,
        Err(e) => {
            warn!(id, error = %e, "Could not fetch article");
            return unavailable(id, e);
        }
    };

    let (article, partial) = match format_article(&raw) {
        Ok(Normalized::Complete(article)) => (article, false),
        Ok(Normalized::Fallback(article)) => (article, true),
        Err(e) => {
            warn!(id, error = %e, "Could not normalize article");
            return unavailable(id, e);
        }
    };

    let csl = export_or_none(id, MetadataType::Csl, csl).and_then(|body| CslItem::parse(&body));
    let bibtex = export_or_none(id, MetadataType::Bibtex, bibtex);
    let citations = build_citations(csl.as_ref(), bibtex.as_deref());

    let volume = match article.volume_id {
        Some(vid) => match client.volume(&vid.to_string()).await {
            Ok(raw) => Some(format_volume(client.rvcode(), language, &raw)),
            Err(e) => {
                warn!(id, volume = vid, error = %e, "Could not fetch article volume");
                None
            }
        },
        None => None,
    };

    info!(id, citations = citations.len(), partial, "Assembled article page");
    ArticlePage::Ready(Box::new(ArticlePageData {
        graphical_abstract_url: article.graphical_abstract_url(client.rvcode()),
        article,
        partial,
        citations,
        volume,
    }))
}

/// Fetch and normalize several articles concurrently.
///
/// Items that fail to fetch or normalize are dropped; items that only
/// normalize to a minimal record are kept.
pub async fn fetch_articles(client: &ApiClient, ids: &[String]) -> Vec<Article> {
    let futures = ids.iter().map(|id| async move {
        let raw = match client.paper(id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping article");
                return None;
            }
        };
        match format_article(&raw) {
            Ok(normalized) => Some(normalized.into_inner()),
            Err(e) => {
                warn!(id = %id, error = %e, "Skipping article");
                None
            }
        }
    });

    let articles: Vec<Article> = join_all(futures).await.into_iter().flatten().collect();
    info!(requested = ids.len(), fetched = articles.len(), "Fetched articles");
    articles
}

/// `paperid` of each collection member, in order
pub fn member_paper_ids(members: &[Value]) -> Vec<String> {
    members
        .iter()
        .filter_map(|m| m.get("paperid").or_else(|| m.get("docid")))
        .filter_map(value_to_string)
        .collect()
}

/// A volume with its articles, or `None` when the volume cannot be fetched
pub async fn assemble_volume_page(client: &ApiClient, language: &str, id: &str) -> Option<VolumePage> {
    let raw = match client.volume(id).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(id, error = %e, "Could not fetch volume");
            return None;
        }
    };

    let volume = format_volume(client.rvcode(), language, &raw);
    let ids: Vec<String> = volume.article_ids().iter().map(u64::to_string).collect();
    let articles = fetch_articles(client, &ids).await;

    Some(VolumePage { volume, articles })
}

/// A section with its articles, or `None` when the section cannot be fetched
pub async fn assemble_section_page(client: &ApiClient, id: &str) -> Option<SectionPage> {
    let raw = match client.section(id).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!(id, error = %e, "Could not fetch section");
            return None;
        }
    };

    let section = format_section(&raw);
    let ids: Vec<String> = section.article_ids().iter().map(u64::to_string).collect();
    let articles = fetch_articles(client, &ids).await;

    Some(SectionPage { section, articles })
}

/// One page of search results with its facets
pub async fn search_page(client: &ApiClient, terms: &str, page: u32, per_page: u32) -> Result<SearchPage> {
    let collection = client.search(terms, page, per_page).await?;
    let ids = member_paper_ids(&collection.members);
    let articles = fetch_articles(client, &ids).await;

    Ok(SearchPage {
        terms: terms.to_string(),
        total_items: collection.total_items,
        articles,
        range: collection
            .range
            .as_ref()
            .map(format_search_range)
            .unwrap_or_default(),
    })
}
