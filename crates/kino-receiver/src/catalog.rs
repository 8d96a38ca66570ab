//! Content catalog lookup
//!
//! Maps opaque content ids to manifest URIs and display metadata. The
//! catalog is fetched on first use and reused for every later lookup.

use crate::{error::Error, types::CatalogEntry, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument};
use url::Url;

/// Fetched catalog, keyed by content id
pub type Catalog = HashMap<String, CatalogEntry>;

/// Source of catalog documents
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<Catalog>;
}

/// Catalog fetched over HTTP as a JSON object of entries
pub struct HttpCatalog {
    client: Client,
}

impl HttpCatalog {
    pub fn new() -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &Url) -> Result<Catalog> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::CatalogFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::CatalogFetch(format!("{} returned {}", url, response.status())));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::CatalogFetch(e.to_string()))?;

        let catalog: Catalog =
            serde_json::from_str(&body).map_err(|e| Error::CatalogParse(e.to_string()))?;

        info!(url = %url, entries = catalog.len(), "Catalog fetched");
        Ok(catalog)
    }
}

/// Fetch-once wrapper; a failed fetch is retried on the next lookup
pub struct CachedCatalog {
    source: Arc<dyn CatalogSource>,
    url: Url,
    catalog: OnceCell<Arc<Catalog>>,
}

impl CachedCatalog {
    pub fn new(source: Arc<dyn CatalogSource>, url: Url) -> Self {
        Self {
            source,
            url,
            catalog: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The catalog, fetching it if no fetch has succeeded yet
    pub async fn get(&self) -> Result<Arc<Catalog>> {
        let catalog = self
            .catalog
            .get_or_try_init(|| async {
                debug!(url = %self.url, "Fetching catalog");
                self.source.fetch(&self.url).await.map(Arc::new)
            })
            .await?;
        Ok(Arc::clone(catalog))
    }

    /// Look up one entry
    pub async fn lookup(&self, id: &str) -> Result<CatalogEntry> {
        let catalog = self.get().await?;
        catalog
            .get(id)
            .cloned()
            .ok_or_else(|| Error::CatalogMiss { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSource {
        fetches: AtomicUsize,
        fail_first: bool,
    }

    #[async_trait]
    impl CatalogSource for CountingSource {
        async fn fetch(&self, _url: &Url) -> Result<Catalog> {
            let n = self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail_first && n == 0 {
                return Err(Error::CatalogFetch("unreachable".into()));
            }
            let mut catalog = Catalog::new();
            catalog.insert(
                "bbb".into(),
                CatalogEntry {
                    title: "Big Buck Bunny".into(),
                    ..Default::default()
                },
            );
            Ok(catalog)
        }
    }

    fn cached(fail_first: bool) -> (Arc<CountingSource>, CachedCatalog) {
        let source = Arc::new(CountingSource {
            fetches: AtomicUsize::new(0),
            fail_first,
        });
        let url = Url::parse("https://catalog.example.com/content.json").unwrap();
        (Arc::clone(&source), CachedCatalog::new(source, url))
    }

    #[tokio::test]
    async fn test_catalog_fetched_once() {
        let (source, catalog) = cached(false);

        assert_eq!(catalog.lookup("bbb").await.unwrap().title, "Big Buck Bunny");
        assert!(matches!(catalog.lookup("abc123").await, Err(Error::CatalogMiss { .. })));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_is_retried() {
        let (source, catalog) = cached(true);

        assert!(matches!(catalog.lookup("bbb").await, Err(Error::CatalogFetch(_))));
        assert!(catalog.lookup("bbb").await.is_ok());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }
}
