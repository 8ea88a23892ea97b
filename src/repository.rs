//! Canonical recipe storage
//!
//! Recipes are persisted as
//! `{ "recipes": [ { "product_id", "output_amount", "ingredients": [ { "product_id", "amount" } ] } ] }`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::extract::{self, ExtractStats};
use crate::models::Recipe;
use crate::prices::PriceSnapshot;
use crate::raw::{NodeId, RawDocument, RawNode};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CanonicalFile {
    #[serde(default)]
    recipes: Vec<Recipe>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeRepository {
    recipes: Vec<Recipe>,
}

impl RecipeRepository {
    pub fn new(recipes: Vec<Recipe>) -> Self {
        Self { recipes }
    }

    /// Normalise each raw entry, keeping the ones that yield a recipe
    pub fn from_raw_entries(
        doc: &RawDocument,
        entries: impl IntoIterator<Item = NodeId>,
    ) -> (Self, ExtractStats) {
        let (recipes, stats) = extract::normalize_entries(doc, entries);
        (Self::new(recipes), stats)
    }

    /// Build a repository from a recipes API response, whatever its envelope
    pub fn from_upstream_payload(doc: &RawDocument, root: NodeId) -> (Self, ExtractStats) {
        let entries = locate_raw_entries(doc, root);
        let (repository, stats) = Self::from_raw_entries(doc, entries);
        info!("{}", stats);
        (repository, stats)
    }

    /// Parse the canonical schema. Recipes without an output id or without
    /// ingredients are dropped, as are ingredients without an id.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let file: CanonicalFile = serde_json::from_str(json).context("Malformed recipes JSON")?;
        let recipes = file
            .recipes
            .into_iter()
            .filter_map(|mut recipe| {
                recipe.ingredients.retain(|ingredient| !ingredient.item_id.is_empty());
                let usable = !recipe.output_item_id.is_empty() && !recipe.ingredients.is_empty();
                usable.then_some(recipe)
            })
            .collect();
        Ok(Self::new(recipes))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json_str(&json).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn to_json_string(&self) -> Result<String> {
        let file = CanonicalFile {
            recipes: self.recipes.clone(),
        };
        Ok(serde_json::to_string_pretty(&file)?)
    }

    /// Write the canonical schema, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, self.to_json_string()?)
            .with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Keep only recipes whose output item trades on the bazaar
    pub fn retain_priced(&mut self, prices: &PriceSnapshot) {
        self.recipes.retain(|recipe| prices.contains(&recipe.output_item_id));
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Recipe> {
        self.recipes.iter()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl<'a> IntoIterator for &'a RecipeRepository {
    type Item = &'a Recipe;
    type IntoIter = std::slice::Iter<'a, Recipe>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Find the raw recipe entries inside an upstream payload.
///
/// Tried in order: `collections -> category -> entry -> recipes[]`, a
/// `recipes` list or mapping, an `items` list whose elements embed their
/// recipe, a bare list, and finally the record-valued values of the root.
pub fn locate_raw_entries(doc: &RawDocument, root: NodeId) -> Vec<NodeId> {
    // Pattern 1: collections grouped by category
    let from_collections = collection_recipes(doc, root);
    if !from_collections.is_empty() {
        return from_collections;
    }

    // Pattern 2: flat recipes list or mapping
    if let Some(recipes) = doc.get(root, "recipes") {
        let entries = records_in(doc, recipes);
        if !entries.is_empty() {
            return entries;
        }
    }

    // Pattern 3: items carrying an embedded recipe field
    if let Some(items) = doc.get(root, "items").filter(|items| doc.as_list(*items).is_some()) {
        let entries = records_in(doc, items);
        if !entries.is_empty() {
            return entries;
        }
    }

    records_in(doc, root)
}

fn collection_recipes(doc: &RawDocument, root: NodeId) -> Vec<NodeId> {
    let Some(categories) = doc.get(root, "collections").and_then(|c| doc.as_map(c)) else {
        return Vec::new();
    };

    let mut entries = Vec::new();
    for (_, category) in categories {
        let Some(collection) = doc.as_map(*category) else {
            continue;
        };
        for (_, entry) in collection {
            let Some(recipes) = doc.get(*entry, "recipes").and_then(|r| doc.as_list(r)) else {
                continue;
            };
            entries.extend(recipes.iter().copied().filter(|recipe| doc.is_map(*recipe)));
        }
    }
    entries
}

/// Record-like children of a list or mapping
fn records_in(doc: &RawDocument, container: NodeId) -> Vec<NodeId> {
    let children: Vec<NodeId> = match doc.node(container) {
        RawNode::List(items) => items.clone(),
        RawNode::Map(entries) => entries.iter().map(|(_, child)| *child).collect(),
        _ => Vec::new(),
    };
    children.into_iter().filter(|child| doc.is_map(*child)).collect()
}
