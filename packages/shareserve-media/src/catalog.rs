//! Keyword catalog configuration.
//!
//! The catalog is external, author-maintained data: a mapping from lowercase
//! keywords to ordered URL lists, plus a general pool used as the final
//! fallback tier. It is supplied to the resolver as configuration, never
//! computed.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MediaError, Result};

/// Keyword → candidate URLs, plus a general default pool.
///
/// Category keys are authored lowercase; the resolver lowercases input
/// before lookup but does not touch the keys themselves. A `BTreeMap`
/// keeps substring scans in a stable order so resolution stays
/// deterministic for a given catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaCatalog {
    /// Curated keyword categories, each an ordered list of URLs.
    #[serde(default)]
    pub categories: BTreeMap<String, Vec<String>>,

    /// Diverse final-resort pool, appended to every candidate list.
    #[serde(default)]
    pub general_pool: Vec<String>,
}

impl MediaCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from its JSON configuration form.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| MediaError::InvalidCatalog(e.to_string()))
    }

    /// Add a keyword category with its ordered URL list.
    pub fn with_category<I, S>(mut self, keyword: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories
            .insert(keyword.into(), urls.into_iter().map(Into::into).collect());
        self
    }

    /// Set the general fallback pool.
    pub fn with_general_pool<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.general_pool = urls.into_iter().map(Into::into).collect();
        self
    }

    /// True when the catalog has neither categories nor a pool.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.general_pool.is_empty()
    }
}
