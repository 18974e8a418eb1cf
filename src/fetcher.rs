//! Episciences API client.
//!
//! Every request goes through [`retry_with_fixed_delay`]: any failure (network
//! error or non-2xx status) waits a fixed delay and tries again, up to the
//! configured number of attempts. There is no backoff and no distinction
//! between transient and permanent failures.

use crate::config::Config;
use crate::error::{EpisciencesError, Result};
use crate::export::MetadataType;
use crate::shape::value_to_string;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Attempts made by default before giving up
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Fixed delay between two attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);

/// Page size used when enumerating every ID of a resource
const ID_PAGE_SIZE: u32 = 100;

/// Upper bound on pages walked while enumerating IDs
const MAX_ID_PAGES: u32 = 1000;

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

/// Run `op` until it succeeds or the policy runs out of attempts.
///
/// Sleeps exactly `policy.delay` after each failed attempt except the last,
/// then returns the last error.
pub async fn retry_with_fixed_delay<T, F, Fut>(policy: &RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!(target_url = label, attempt, "Sending request");
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                warn!(
                    target_url = label,
                    attempt,
                    remaining = attempts - attempt,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Request failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => {
                warn!(target_url = label, attempts, error = %e, "Request failed, giving up");
                return Err(e);
            }
        }
    }
}

/// Hydra collection envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HydraCollection<T> {
    #[serde(rename = "hydra:member", default = "Vec::new")]
    pub members: Vec<T>,
    #[serde(rename = "hydra:totalItems", default)]
    pub total_items: u64,
    #[serde(rename = "hydra:range", default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Value>,
}

impl<T> Default for HydraCollection<T> {
    fn default() -> Self {
        Self {
            members: Vec::new(),
            total_items: 0,
            range: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Method {
    Get,
    Post,
}

/// Client for the Episciences REST API of one journal.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    rvcode: String,
    retry: RetryPolicy,
}

impl ApiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(APP_USER_AGENT)
            .build()
            .map_err(|e| EpisciencesError::Config(format!("Failed to build HTTP client: {}", e)))?;

        // Reject a broken base URL up front rather than on the first request
        Url::parse(&config.api_base_url)?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            rvcode: config.rvcode.clone(),
            retry: config.retry,
        })
    }

    pub fn rvcode(&self) -> &str {
        &self.rvcode
    }

    /// Build an endpoint URL under the API root
    pub fn endpoint(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}/{}", self.base_url, path.trim_start_matches('/')))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// Issue one request with the retry policy and return the body text
    pub async fn fetch_with_retry(&self, method: Method, url: &Url, body: Option<&Value>) -> Result<String> {
        retry_with_fixed_delay(&self.retry, url.as_str(), || self.send_once(method, url, body)).await
    }

    async fn send_once(&self, method: Method, url: &Url, body: Option<&Value>) -> Result<String> {
        let mut request = match method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EpisciencesError::Api {
                code: status.as_u16(),
                message: format!("{} {}", status, error_text).trim().to_string(),
            });
        }

        Ok(response.text().await?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T> {
        let body = self.fetch_with_retry(Method::Get, url, None).await?;
        Ok(serde_json::from_str(&body)?)
    }

    async fn collection(
        &self,
        path: &str,
        page: u32,
        per_page: u32,
        extra: &[(&str, String)],
    ) -> Result<HydraCollection<Value>> {
        let mut query = vec![
            ("page", page.to_string()),
            ("itemsPerPage", per_page.to_string()),
            ("rvcode", self.rvcode.clone()),
        ];
        query.extend(extra.iter().cloned());
        let url = self.endpoint(path, &query)?;
        self.get_json(&url).await
    }

    /// Walk a paginated collection and collect one field of every member
    async fn collect_ids(&self, path: &str, id_field: &str) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let mut seen: u64 = 0;

        for page in 1..=MAX_ID_PAGES {
            let collection = self.collection(path, page, ID_PAGE_SIZE, &[]).await?;
            let fetched = collection.members.len() as u64;
            seen += fetched;

            ids.extend(
                collection
                    .members
                    .iter()
                    .filter_map(|member| member.get(id_field))
                    .filter_map(value_to_string),
            );

            if fetched == 0 || seen >= collection.total_items {
                break;
            }
        }

        info!(path, count = ids.len(), "Collected IDs");
        Ok(ids)
    }

    /// `GET /papers/{id}` as raw JSON
    pub async fn paper(&self, id: &str) -> Result<Value> {
        let url = self.endpoint(&format!("papers/{}", urlencoding::encode(id)), &[])?;
        self.get_json(&url).await
    }

    pub async fn papers(&self, page: u32, per_page: u32) -> Result<HydraCollection<Value>> {
        self.collection("papers/", page, per_page, &[]).await
    }

    pub async fn paper_ids(&self) -> Result<Vec<String>> {
        self.collect_ids("papers/", "paperid").await
    }

    /// `GET /papers/export/{id}/{format}`, returned verbatim
    pub async fn paper_export(&self, id: &str, format: MetadataType) -> Result<String> {
        let url = self.endpoint(
            &format!("papers/export/{}/{}", urlencoding::encode(id), format.slug()),
            &[("code", self.rvcode.clone())],
        )?;
        self.fetch_with_retry(Method::Get, &url, None).await
    }

    pub async fn volume(&self, id: &str) -> Result<Value> {
        let url = self.endpoint(&format!("volumes/{}", urlencoding::encode(id)), &[])?;
        self.get_json(&url).await
    }

    pub async fn volumes(&self, page: u32, per_page: u32) -> Result<HydraCollection<Value>> {
        self.collection("volumes", page, per_page, &[]).await
    }

    pub async fn volume_ids(&self) -> Result<Vec<String>> {
        self.collect_ids("volumes", "vid").await
    }

    pub async fn section(&self, id: &str) -> Result<Value> {
        let url = self.endpoint(&format!("sections/{}", urlencoding::encode(id)), &[])?;
        self.get_json(&url).await
    }

    pub async fn section_ids(&self) -> Result<Vec<String>> {
        self.collect_ids("sections", "sid").await
    }

    /// `GET /search/?terms=...`; the facet payload lands in `range`
    pub async fn search(&self, terms: &str, page: u32, per_page: u32) -> Result<HydraCollection<Value>> {
        self.collection("search/", page, per_page, &[("terms", terms.to_string())])
            .await
    }

    pub async fn news(&self, page: u32, per_page: u32) -> Result<HydraCollection<Value>> {
        self.collection("news/", page, per_page, &[]).await
    }

    pub async fn statistics(&self, page: u32, per_page: u32) -> Result<HydraCollection<Value>> {
        self.collection("statistics/", page, per_page, &[]).await
    }

    /// Editorial boards are returned bare, not as a collection
    pub async fn boards(&self) -> Result<Value> {
        let url = self.endpoint(&format!("journals/boards/{}", urlencoding::encode(&self.rvcode)), &[])?;
        self.get_json(&url).await
    }

    /// One static page by code, if the journal defines it
    pub async fn page_content(&self, code: &str) -> Result<Option<Value>> {
        let url = self.endpoint(
            "pages",
            &[("page_code", code.to_string()), ("rvcode", self.rvcode.clone())],
        )?;
        let collection: HydraCollection<Value> = self.get_json(&url).await?;
        Ok(collection.members.into_iter().next())
    }

    pub async fn page_codes(&self) -> Result<Vec<String>> {
        self.collect_ids("pages", "page_code").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use crate::testing::serve;
    use axum::extract::Query;
    use axum::http::{StatusCode, Uri};
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn failure() -> EpisciencesError {
        EpisciencesError::Api {
            code: 503,
            message: "503 Service Unavailable".to_string(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_fails_twice_then_succeeds() {
        let calls = AtomicU32::new(0);
        let stamps = Mutex::new(Vec::new());

        let result = retry_with_fixed_delay(&RetryPolicy::default(), "test", || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Ok(mut stamps) = stamps.lock() {
                stamps.push(Instant::now());
            }
            async move {
                if call < 3 {
                    Err(failure())
                } else {
                    Ok("ok")
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.len(), 3);
        for pair in stamps.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_millis(1000));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_exhaustion_propagates_last_error() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let result: Result<()> = retry_with_fixed_delay(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(failure()) }
        })
        .await;

        assert!(matches!(result, Err(EpisciencesError::Api { code: 503, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two sleeps between three attempts, none after the last
        assert_eq!(start.elapsed(), Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_retried_too() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = retry_with_fixed_delay(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(EpisciencesError::Api {
                    code: 404,
                    message: "404 Not Found".to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_zero_attempts_still_runs_once() {
        let policy = RetryPolicy {
            attempts: 0,
            delay: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);
        let result = retry_with_fixed_delay(&policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(1) }
        })
        .await;
        assert_eq!(result.unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_endpoint_building() {
        let mut config = Config::new("acme");
        config.api_base_url = "https://api.example.org/api/".to_string();
        let client = ApiClient::new(&config).unwrap();

        let url = client
            .endpoint("search/", &[("terms", "graph theory".to_string()), ("page", "2".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.example.org/api/search/?terms=graph+theory&page=2"
        );

        let url = client.endpoint("/papers/42", &[]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.org/api/papers/42");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let mut config = Config::new("acme");
        config.api_base_url = "not a url".to_string();
        assert!(matches!(ApiClient::new(&config), Err(EpisciencesError::Url(_))));
    }

    #[test]
    fn test_hydra_collection_deserialize() {
        let raw = json!({
            "hydra:member": [{"paperid": 1}, {"paperid": 2}],
            "hydra:totalItems": 2,
            "hydra:range": {"year": {"2024": 2}}
        });
        let collection: HydraCollection<Value> = serde_json::from_value(raw).unwrap();
        assert_eq!(collection.members.len(), 2);
        assert_eq!(collection.total_items, 2);
        assert!(collection.range.is_some());

        let empty: HydraCollection<Value> = serde_json::from_value(json!({})).unwrap();
        assert!(empty.members.is_empty());
        assert_eq!(empty.total_items, 0);
    }

    fn flaky_router(hits: Arc<AtomicU32>, failures: u32, status: StatusCode) -> Router {
        Router::new().route(
            "/api/papers/{id}",
            get(move || {
                let hits = hits.clone();
                async move {
                    let hit = hits.fetch_add(1, Ordering::SeqCst) + 1;
                    if hit <= failures {
                        (status, "upstream failure").into_response()
                    } else {
                        Json(json!({ "paperid": 1 })).into_response()
                    }
                }
            }),
        )
    }

    #[tokio::test]
    async fn test_http_server_errors_are_retried() {
        let hits = Arc::new(AtomicU32::new(0));
        let client = serve(flaky_router(hits.clone(), 2, StatusCode::INTERNAL_SERVER_ERROR)).await;

        let paper = client.paper("1").await.unwrap();
        assert_eq!(paper, json!({ "paperid": 1 }));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_not_found_exhausts_attempts() {
        let hits = Arc::new(AtomicU32::new(0));
        let client = serve(flaky_router(hits.clone(), u32::MAX, StatusCode::NOT_FOUND)).await;

        let result = client.paper("1").await;
        assert!(matches!(result, Err(EpisciencesError::Api { code: 404, .. })));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    /// Answers every request with its own path and query
    async fn echo(uri: Uri) -> Json<Value> {
        let request = json!({
            "path": uri.path(),
            "query": uri.query().unwrap_or_default(),
        });
        Json(json!({
            "hydra:member": [request.clone()],
            "hydra:totalItems": 1,
            "request": request,
        }))
    }

    fn first_request(collection: &HydraCollection<Value>) -> (String, String) {
        let member = &collection.members[0];
        (
            member["path"].as_str().unwrap().to_string(),
            member["query"].as_str().unwrap().to_string(),
        )
    }

    #[tokio::test]
    async fn test_endpoint_helpers_request_shape() {
        let client = serve(Router::new().fallback(echo)).await;

        let cases = [
            (client.papers(1, 3).await.unwrap(), "/api/papers/", "page=1&itemsPerPage=3&rvcode=acme"),
            (client.volumes(2, 20).await.unwrap(), "/api/volumes", "page=2&itemsPerPage=20&rvcode=acme"),
            (client.news(2, 5).await.unwrap(), "/api/news/", "page=2&itemsPerPage=5&rvcode=acme"),
            (client.statistics(1, 10).await.unwrap(), "/api/statistics/", "page=1&itemsPerPage=10&rvcode=acme"),
            (
                client.search("graph theory", 1, 10).await.unwrap(),
                "/api/search/",
                "page=1&itemsPerPage=10&rvcode=acme&terms=graph+theory",
            ),
        ];
        for (collection, path, query) in cases {
            assert_eq!(first_request(&collection), (path.to_string(), query.to_string()));
        }

        let boards = client.boards().await.unwrap();
        assert_eq!(boards["request"]["path"], "/api/journals/boards/acme");

        let section = client.section("7").await.unwrap();
        assert_eq!(section["request"]["path"], "/api/sections/7");

        let volume = client.volume("3").await.unwrap();
        assert_eq!(volume["request"]["path"], "/api/volumes/3");

        let page = client.page_content("about").await.unwrap().unwrap();
        assert_eq!(page["path"], "/api/pages");
        assert_eq!(page["query"], "page_code=about&rvcode=acme");

        let export = client.paper_export("12", MetadataType::Bibtex).await.unwrap();
        let export: Value = serde_json::from_str(&export).unwrap();
        assert_eq!(export["request"]["path"], "/api/papers/export/12/bibtex");
        assert_eq!(export["request"]["query"], "code=acme");
    }

    async fn paged_codes(Query(query): Query<HashMap<String, String>>) -> Response {
        let members = match query.get("page").map(String::as_str) {
            Some("1") => json!([{ "page_code": "about" }, { "page_code": "credits" }]),
            Some("2") => json!([{ "page_code": "ethics" }]),
            _ => json!([]),
        };
        Json(json!({ "hydra:member": members, "hydra:totalItems": 3 })).into_response()
    }

    #[tokio::test]
    async fn test_collect_ids_walks_pages() {
        let client = serve(Router::new().route("/api/pages", get(paged_codes))).await;
        assert_eq!(client.page_codes().await.unwrap(), vec!["about", "credits", "ethics"]);
    }
}
