//! Immutable catalog index.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use fitforge_core::{CatalogItem, Error, ItemKind, Result};

/// In-memory index over the fixed catalog.
///
/// Built once at startup and read-only afterwards, so it can be shared
/// behind an `Arc` without locking. Every item is guaranteed to carry a
/// parseable media reference; loading fails otherwise.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    /// Items in insertion order.
    items: Vec<CatalogItem>,
    /// Id to position in `items`.
    by_id: HashMap<String, usize>,
}

impl CatalogIndex {
    /// Build an index, rejecting the whole dataset on the first bad record.
    pub fn load(items: Vec<CatalogItem>) -> Result<Self> {
        if items.is_empty() {
            return Err(Error::catalog_load("dataset is empty"));
        }

        let mut by_id = HashMap::with_capacity(items.len());
        let mut normalized = Vec::with_capacity(items.len());

        for (pos, mut item) in items.into_iter().enumerate() {
            item.normalize();

            if item.id.is_empty() {
                return Err(Error::catalog_load(format!("record #{} has no id", pos)));
            }
            validate_media_ref(&item)?;

            if by_id.insert(item.id.clone(), pos).is_some() {
                return Err(Error::catalog_load(format!("duplicate id '{}'", item.id)));
            }
            normalized.push(item);
        }

        tracing::info!(
            items = normalized.len(),
            exercises = normalized.iter().filter(|i| i.kind == ItemKind::Exercise).count(),
            foods = normalized.iter().filter(|i| i.kind == ItemKind::Food).count(),
            "Catalog index loaded"
        );

        Ok(Self {
            items: normalized,
            by_id,
        })
    }

    /// Parse a JSON array of items.
    pub fn from_json(text: &str) -> Result<Self> {
        let items: Vec<CatalogItem> = serde_json::from_str(text)
            .map_err(|e| Error::catalog_load(format!("invalid JSON dataset: {}", e)))?;
        Self::load(items)
    }

    /// Parse a YAML sequence of items.
    pub fn from_yaml(text: &str) -> Result<Self> {
        let items: Vec<CatalogItem> = serde_yaml::from_str(text)
            .map_err(|e| Error::catalog_load(format!("invalid YAML dataset: {}", e)))?;
        Self::load(items)
    }

    /// Load a dataset file; `.yaml`/`.yml` is read as YAML, anything else as JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::catalog_load(format!("{}: {}", path.display(), e)))?;

        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }

    /// Look up an item by id.
    pub fn lookup(&self, id: &str) -> Option<&CatalogItem> {
        self.by_id.get(id.trim()).map(|&pos| &self.items[pos])
    }

    /// Insertion position of an item.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.by_id.get(id.trim()).copied()
    }

    /// Items carrying every tag in `tags`.
    ///
    /// The returned sequence is lazy and can be restarted by cloning it.
    pub fn query<'a>(&'a self, tags: &'a BTreeSet<String>) -> CatalogQuery<'a> {
        CatalogQuery {
            inner: self.items.iter(),
            tags,
        }
    }

    /// All items in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Lazy tag query over a [`CatalogIndex`].
#[derive(Debug, Clone)]
pub struct CatalogQuery<'a> {
    inner: std::slice::Iter<'a, CatalogItem>,
    tags: &'a BTreeSet<String>,
}

impl<'a> Iterator for CatalogQuery<'a> {
    type Item = &'a CatalogItem;

    fn next(&mut self) -> Option<Self::Item> {
        let tags = self.tags;
        self.inner
            .by_ref()
            .find(|item| tags.iter().all(|t| item.all_tags().any(|own| own == t)))
    }
}

fn validate_media_ref(item: &CatalogItem) -> Result<()> {
    if item.media_ref.is_empty() {
        return Err(Error::catalog_load(format!(
            "item '{}' has no media reference",
            item.id
        )));
    }
    url::Url::parse(&item.media_ref).map_err(|e| {
        Error::catalog_load(format!(
            "item '{}' has invalid media reference '{}': {}",
            item.id, item.media_ref, e
        ))
    })?;
    Ok(())
}
