//! # episciences_front
//!
//! Data layer of the Episciences journal front end
//!
//! ## Modules
//!
//! - [`fetcher`] - API client with fixed-delay retry
//! - [`shape`] - Lenient readers for one-or-many fields and loose scalars
//! - [`article`] - Raw paper record to [`article::Article`]
//! - [`citations`] - References and cited-by parsing
//! - [`volume`] / [`section`] - Volume and section normalization
//! - [`search`] - Search facet normalization
//! - [`export`] - Metadata export formats and APA/MLA/BibTeX citations
//! - [`static_params`] - Locale and ID enumeration for static builds
//! - [`page`] - Concurrent page assembly
//! - [`config`] - Journal configuration
//! - [`error`] - Custom error types
//!
//! ## Usage
//!
//! ```rust,no_run
//! use episciences_front::{config::Config, fetcher::ApiClient, page};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let client = ApiClient::new(&config)?;
//!     let articles = page::fetch_articles(&client, &["42".to_string()]).await;
//!     println!("Fetched {} articles", articles.len());
//!     Ok(())
//! }
//! ```

pub mod article;
pub mod citations;
pub mod config;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod page;
pub mod search;
pub mod section;
pub mod shape;
pub mod static_params;
pub mod volume;

#[cfg(test)]
mod testing;

pub use error::{EpisciencesError, NormalizeError, Result};
