//! Journal configuration.
//!
//! Built once at the boundary (CLI entry point or server startup) and passed
//! down explicitly. Nothing below this module reads the process environment.

use crate::error::{OptionExt, Result};
use crate::fetcher::RetryPolicy;
use tracing::debug;

/// Default upstream API root
pub const DEFAULT_API_ROOT: &str = "https://api.episciences.org/api";

/// Fallback when no default language is configured
pub const FALLBACK_LANGUAGE: &str = "en";

pub const ENV_RVCODE: &str = "NEXT_PUBLIC_JOURNAL_RVCODE";
pub const ENV_API_ROOT: &str = "NEXT_PUBLIC_API_ROOT_ENDPOINT";
pub const ENV_DEFAULT_LANGUAGE: &str = "NEXT_PUBLIC_JOURNAL_DEFAULT_LANGUAGE";
pub const ENV_ACCEPTED_LANGUAGES: &str = "NEXT_PUBLIC_JOURNAL_ACCEPTED_LANGUAGES";
pub const ENV_ONLY_ARTICLE: &str = "ONLY_BUILD_ARTICLE_ID";
pub const ENV_ONLY_VOLUME: &str = "ONLY_BUILD_VOLUME_ID";
pub const ENV_ONLY_SECTION: &str = "ONLY_BUILD_SECTION_ID";
pub const ENV_ONLY_STATIC_PAGE: &str = "ONLY_BUILD_STATIC_PAGE";

/// Default and accepted UI languages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Languages {
    pub default: String,
    /// Always contains `default`
    pub accepted: Vec<String>,
}

impl Languages {
    pub fn new(default: &str, accepted: &[&str]) -> Self {
        let default = default.trim();
        let default = if default.is_empty() {
            FALLBACK_LANGUAGE.to_string()
        } else {
            default.to_string()
        };

        let mut langs: Vec<String> = Vec::with_capacity(accepted.len() + 1);
        for lang in accepted.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            if !langs.iter().any(|l| l == lang) {
                langs.push(lang.to_string());
            }
        }
        if !langs.contains(&default) {
            langs.insert(0, default.clone());
        }

        Self {
            default,
            accepted: langs,
        }
    }

    pub fn is_accepted(&self, lang: &str) -> bool {
        self.accepted.iter().any(|l| l == lang)
    }
}

impl Default for Languages {
    fn default() -> Self {
        Self::new(FALLBACK_LANGUAGE, &[])
    }
}

/// Single-resource rebuild triggers for static export.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RebuildScope {
    pub article_id: Option<String>,
    pub volume_id: Option<String>,
    pub section_id: Option<String>,
    pub static_page: Option<String>,
}

impl RebuildScope {
    /// Only one article, volume or section is being rebuilt
    pub fn is_targeted(&self) -> bool {
        self.article_id.is_some() || self.volume_id.is_some() || self.section_id.is_some()
    }

    /// One static page is being rebuilt; it needs every locale
    pub fn is_static_page(&self) -> bool {
        self.static_page.is_some()
    }
}

/// Everything the data layer needs to know about the journal.
#[derive(Debug, Clone)]
pub struct Config {
    /// Journal code, e.g. `dmtcs`
    pub rvcode: String,
    pub api_base_url: String,
    pub languages: Languages,
    pub rebuild: RebuildScope,
    pub retry: RetryPolicy,
}

impl Config {
    pub fn new(rvcode: &str) -> Self {
        Self {
            rvcode: rvcode.to_string(),
            api_base_url: DEFAULT_API_ROOT.to_string(),
            languages: Languages::default(),
            rebuild: RebuildScope::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// Build from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source; empty values count as unset
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let rvcode = get(ENV_RVCODE).ok_or_config(&format!("{} is not set", ENV_RVCODE))?;
        let api_base_url = get(ENV_API_ROOT)
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_API_ROOT.to_string());

        let default_language = get(ENV_DEFAULT_LANGUAGE).unwrap_or_default();
        let accepted = get(ENV_ACCEPTED_LANGUAGES).unwrap_or_default();
        let accepted: Vec<&str> = accepted.split(',').collect();
        let languages = Languages::new(&default_language, &accepted);

        let rebuild = RebuildScope {
            article_id: get(ENV_ONLY_ARTICLE),
            volume_id: get(ENV_ONLY_VOLUME),
            section_id: get(ENV_ONLY_SECTION),
            static_page: get(ENV_ONLY_STATIC_PAGE),
        };

        debug!(
            rvcode = %rvcode,
            api = %api_base_url,
            languages = ?languages.accepted,
            rebuild = ?rebuild,
            "Loaded configuration"
        );

        Ok(Self {
            rvcode,
            api_base_url,
            languages,
            rebuild,
            retry: RetryPolicy::default(),
        })
    }

    /// Public journal site, e.g. `https://dmtcs.episciences.org`
    pub fn journal_url(&self) -> String {
        journal_url(&self.rvcode)
    }
}

/// Public journal site for an rvcode
pub fn journal_url(rvcode: &str) -> String {
    format!("https://{}.episciences.org", rvcode)
}
