//! Immutable tweak and category definitions.
//!
//! The catalog is build-time data shipped with the backend, so anything
//! wrong with it is an integrity failure and is propagated, never swallowed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info};
use tweak_common::{CategoryDefinition, TweakDefinition};

use crate::backend::TweakBackend;
use crate::error::EngineError;

/// Loaded catalog. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: Vec<CategoryDefinition>,
    tweaks: Vec<Arc<TweakDefinition>>,
    index: HashMap<String, usize>,
}

impl Catalog {
    /// Fetch categories and definitions from the backend
    pub async fn load(backend: &dyn TweakBackend) -> Result<Self, EngineError> {
        let (categories, tweaks) =
            tokio::try_join!(backend.get_categories(), backend.get_available_tweaks())
                .map_err(EngineError::CatalogLoad)?;

        let catalog = Self::from_parts(categories, tweaks)?;
        info!(
            categories = catalog.categories.len(),
            tweaks = catalog.tweaks.len(),
            "Tweak catalog loaded"
        );
        Ok(catalog)
    }

    /// Build a catalog, rejecting duplicate ids, dangling categories and
    /// tweaks without options.
    pub fn from_parts(
        mut categories: Vec<CategoryDefinition>,
        tweaks: Vec<TweakDefinition>,
    ) -> Result<Self, EngineError> {
        let mut category_ids = HashSet::new();
        for category in &categories {
            if !category_ids.insert(category.id.as_str()) {
                return Err(EngineError::CatalogIntegrity(format!(
                    "duplicate category id '{}'",
                    category.id
                )));
            }
        }

        let mut index = HashMap::with_capacity(tweaks.len());
        let mut defs = Vec::with_capacity(tweaks.len());
        for tweak in tweaks {
            if !category_ids.contains(tweak.category_id.as_str()) {
                return Err(EngineError::CatalogIntegrity(format!(
                    "tweak '{}' references unknown category '{}'",
                    tweak.id, tweak.category_id
                )));
            }
            if tweak.options.is_empty() {
                return Err(EngineError::CatalogIntegrity(format!(
                    "tweak '{}' has no options",
                    tweak.id
                )));
            }
            if index.insert(tweak.id.clone(), defs.len()).is_some() {
                return Err(EngineError::CatalogIntegrity(format!(
                    "duplicate tweak id '{}'",
                    tweak.id
                )));
            }
            debug!(tweak_id = %tweak.id, options = tweak.options.len(), "catalog entry");
            defs.push(Arc::new(tweak));
        }

        categories.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.name.cmp(&b.name)));

        Ok(Self {
            categories,
            tweaks: defs,
            index,
        })
    }

    /// Categories in display order
    pub fn categories(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn category(&self, id: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.id == id)
    }

    /// Definitions in backend order
    pub fn tweaks(&self) -> &[Arc<TweakDefinition>] {
        &self.tweaks
    }

    pub fn get(&self, id: &str) -> Option<&Arc<TweakDefinition>> {
        self.index.get(id).map(|&i| &self.tweaks[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn in_category<'a>(
        &'a self,
        category_id: &'a str,
    ) -> impl Iterator<Item = &'a Arc<TweakDefinition>> + 'a {
        self.tweaks
            .iter()
            .filter(move |t| t.category_id == category_id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tweaks.iter().map(|t| t.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.tweaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweaks.is_empty()
    }
}
