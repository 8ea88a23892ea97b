//! Recipe normalisation for upstream recipe payloads
//!
//! The recipes API mixes several schemas: flat ingredient lists, nested
//! input/items/materials containers and shaped key + pattern grids. Every
//! entry is reduced to a canonical [`Recipe`] or skipped. Malformed data is
//! treated as absent, never as an error.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::debug;

use crate::models::{Ingredient, Recipe};
use crate::raw::{NodeId, RawDocument, RawNode};

/// Identifier keys on an output or ingredient mapping, by preference
pub const ID_KEYS: &[&str] = &["product_id", "item_id", "itemId", "id", "item", "name"];

/// Amount keys on an output mapping
pub const OUTPUT_AMOUNT_KEYS: &[&str] = &["output_amount", "amount", "count", "qty"];

/// Identifier keys read from the entry itself when no output container matched
pub const ENTRY_ID_KEYS: &[&str] = &["output_item_id", "outputItemId", "name", "id"];

/// Amount keys read from the entry itself alongside [`ENTRY_ID_KEYS`]
pub const ENTRY_AMOUNT_KEYS: &[&str] = &["output_amount", "amount", "count", "quantity"];

/// Amount keys on an ingredient mapping
pub const INGREDIENT_AMOUNT_KEYS: &[&str] = &["amount", "count", "qty", "quantity", "value"];

/// Entry fields that may hold ingredient data, scanned in order
pub const INGREDIENT_FIELDS: &[&str] = &[
    "ingredients",
    "input",
    "inputs",
    "items",
    "materials",
    "slots",
    "recipe",
    "components",
];

/// One way of locating the output of an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputRule {
    /// A field holding either a bare identifier or an id/amount mapping
    Field(&'static str),
    /// Id-like and amount-like keys on the entry itself
    EntryKeys,
}

/// Output rules in precedence order; the first one yielding an identifier wins
pub const OUTPUT_RULES: &[OutputRule] = &[
    OutputRule::Field("output"),
    OutputRule::Field("result"),
    OutputRule::Field("output_item"),
    OutputRule::Field("outputItem"),
    OutputRule::EntryKeys,
];

impl OutputRule {
    fn apply(self, doc: &RawDocument, entry: NodeId) -> Option<(String, u64)> {
        match self {
            OutputRule::Field(field) => decode_output(doc, doc.get(entry, field)?),
            OutputRule::EntryKeys => {
                let id = coerce_id(doc, doc.first_truthy(entry, ENTRY_ID_KEYS));
                if id.is_empty() {
                    return None;
                }
                let amount = coerce_int(doc, doc.first_truthy(entry, ENTRY_AMOUNT_KEYS), 1);
                Some((id, output_amount(amount)))
            }
        }
    }
}

/// Why an entry did not become a recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Skip {
    NotRecord,
    NoOutput,
    NoIngredients,
}

/// Counters for a batch of normalised entries
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExtractStats {
    pub recipes: usize,
    pub not_records: usize,
    pub missing_output: usize,
    pub missing_ingredients: usize,
}

impl ExtractStats {
    pub fn skipped(&self) -> usize {
        self.not_records + self.missing_output + self.missing_ingredients
    }

    fn record(&mut self, skip: Skip) {
        match skip {
            Skip::NotRecord => self.not_records += 1,
            Skip::NoOutput => self.missing_output += 1,
            Skip::NoIngredients => self.missing_ingredients += 1,
        }
    }
}

impl fmt::Display for ExtractStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Normalised {} recipes. Skipped: {} (not a record: {}, no output: {}, no ingredients: {})",
            self.recipes,
            self.skipped(),
            self.not_records,
            self.missing_output,
            self.missing_ingredients
        )
    }
}

/// Normalise a single raw entry. Returns `None` when the entry is skipped.
pub fn normalize_entry(doc: &RawDocument, entry: NodeId) -> Option<Recipe> {
    classify_entry(doc, entry).ok()
}

/// Normalise a batch payload: the values of a mapping or the elements of a list.
pub fn parse_payload(doc: &RawDocument, payload: NodeId) -> (Vec<Recipe>, ExtractStats) {
    match doc.node(payload) {
        RawNode::Map(entries) => normalize_entries(doc, entries.iter().map(|(_, child)| *child)),
        RawNode::List(items) => normalize_entries(doc, items.iter().copied()),
        _ => (Vec::new(), ExtractStats::default()),
    }
}

/// Normalise entries in order, keeping the ones that produce a recipe.
pub fn normalize_entries(
    doc: &RawDocument,
    entries: impl IntoIterator<Item = NodeId>,
) -> (Vec<Recipe>, ExtractStats) {
    let mut recipes = Vec::new();
    let mut stats = ExtractStats::default();

    for entry in entries {
        match classify_entry(doc, entry) {
            Ok(recipe) => {
                stats.recipes += 1;
                recipes.push(recipe);
            }
            Err(skip) => {
                debug!(entry = entry_label(doc, entry), ?skip, "skipping raw recipe entry");
                stats.record(skip);
            }
        }
    }

    (recipes, stats)
}

/// Best-effort name for an entry in diagnostics
fn entry_label(doc: &RawDocument, entry: NodeId) -> &str {
    ["output", "id", "name"]
        .iter()
        .filter_map(|key| doc.get(entry, key))
        .find_map(|child| doc.as_text(child))
        .unwrap_or("<unnamed>")
}

fn classify_entry(doc: &RawDocument, entry: NodeId) -> Result<Recipe, Skip> {
    if !doc.is_map(entry) {
        return Err(Skip::NotRecord);
    }

    let (output_item_id, output_amount) = extract_output(doc, entry).ok_or(Skip::NoOutput)?;

    let ingredients = extract_ingredients(doc, entry);
    if ingredients.is_empty() {
        return Err(Skip::NoIngredients);
    }

    Ok(Recipe {
        output_item_id,
        output_amount,
        ingredients,
    })
}

/// Output item and amount of an entry, per [`OUTPUT_RULES`]
pub fn extract_output(doc: &RawDocument, entry: NodeId) -> Option<(String, u64)> {
    OUTPUT_RULES.iter().find_map(|rule| rule.apply(doc, entry))
}

fn decode_output(doc: &RawDocument, candidate: NodeId) -> Option<(String, u64)> {
    match doc.node(candidate) {
        RawNode::Text(id) => {
            let id = id.trim();
            (!id.is_empty()).then(|| (id.to_string(), 1))
        }
        RawNode::Map(_) => {
            let id = coerce_id(doc, doc.first_truthy(candidate, ID_KEYS));
            if id.is_empty() {
                return None;
            }
            let amount = coerce_int(doc, doc.first_truthy(candidate, OUTPUT_AMOUNT_KEYS), 1);
            Some((id, output_amount(amount)))
        }
        _ => None,
    }
}

fn output_amount(amount: i64) -> u64 {
    u64::try_from(amount).ok().filter(|a| *a > 0).unwrap_or(1)
}

/// Merged ingredients of an entry, in first-seen order
pub fn extract_ingredients(doc: &RawDocument, entry: NodeId) -> Vec<Ingredient> {
    let mut tally = IngredientTally::default();

    for field in INGREDIENT_FIELDS {
        let Some(container) = doc.get(entry, field) else {
            continue;
        };
        for (item_id, amount) in collect_container(doc, container) {
            tally.add(item_id, amount);
        }
    }

    add_shaped_ingredients(doc, entry, &mut tally);

    tally.into_ingredients()
}

/// A mapping that resolves to an id and a positive amount is an ingredient.
pub fn ingredient_pair(doc: &RawDocument, node: NodeId) -> Option<(String, u64)> {
    let id = coerce_id(doc, doc.first_truthy(node, ID_KEYS));
    if id.is_empty() {
        return None;
    }
    let amount = coerce_int(doc, doc.first_truthy(node, INGREDIENT_AMOUNT_KEYS), 0);
    let amount = u64::try_from(amount).ok().filter(|a| *a > 0)?;
    Some((id, amount))
}

/// Walk a container depth-first and collect every ingredient pair in it.
///
/// A mapping that is itself an ingredient is not descended into. Each
/// container is entered at most once, so self-referencing data terminates.
fn collect_container(doc: &RawDocument, container: NodeId) -> Vec<(String, u64)> {
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    let mut stack = vec![container];

    while let Some(node) = stack.pop() {
        match doc.node(node) {
            RawNode::Map(entries) => {
                if !visited.insert(node) {
                    continue;
                }
                if let Some(pair) = ingredient_pair(doc, node) {
                    found.push(pair);
                    continue;
                }
                stack.extend(entries.iter().rev().map(|(_, child)| *child));
            }
            RawNode::List(items) => {
                if !visited.insert(node) {
                    continue;
                }
                stack.extend(items.iter().rev().copied());
            }
            _ => {}
        }
    }

    found
}

/// Shaped recipes: each `key` symbol contributes its per-cell amount times
/// the number of cells it occupies in `pattern`.
fn add_shaped_ingredients(doc: &RawDocument, entry: NodeId, tally: &mut IngredientTally) {
    let key = doc.get(entry, "key").and_then(|key| doc.as_map(key));
    let pattern = doc.get(entry, "pattern").and_then(|rows| doc.as_list(rows));
    let (Some(key), Some(pattern)) = (key, pattern) else {
        return;
    };

    let counts = symbol_counts(doc, pattern);

    for (symbol, descriptor) in key {
        let mut chars = symbol.chars();
        let (Some(symbol), None) = (chars.next(), chars.next()) else {
            continue;
        };
        let Some(&cells) = counts.get(&symbol) else {
            continue;
        };
        if let Some((item_id, per_cell)) = ingredient_pair(doc, *descriptor) {
            tally.add(item_id, per_cell.saturating_mul(cells));
        }
    }
}

fn symbol_counts(doc: &RawDocument, rows: &[NodeId]) -> HashMap<char, u64> {
    let mut counts = HashMap::new();
    for row in rows.iter().filter_map(|row| doc.as_text(*row)) {
        for ch in row.chars().filter(|ch| !ch.is_whitespace()) {
            *counts.entry(ch).or_default() += 1;
        }
    }
    counts
}

fn coerce_id(doc: &RawDocument, node: Option<NodeId>) -> String {
    node.and_then(|node| doc.as_text(node))
        .map(|id| id.trim().to_string())
        .unwrap_or_default()
}

/// Integers, truncated floats, booleans and numeric text; anything else is `default`.
fn coerce_int(doc: &RawDocument, node: Option<NodeId>, default: i64) -> i64 {
    let Some(node) = node else {
        return default;
    };
    match doc.node(node) {
        RawNode::Bool(b) => i64::from(*b),
        RawNode::Number(n) => n
            .as_i64()
            .or_else(|| n.as_u64().map(|_| i64::MAX))
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(default),
        RawNode::Text(text) => text.trim().parse().unwrap_or(default),
        _ => default,
    }
}

/// Per-recipe ingredient totals keyed by item id, in first-seen order
#[derive(Debug, Default)]
struct IngredientTally {
    ingredients: Vec<Ingredient>,
    index: HashMap<String, usize>,
}

impl IngredientTally {
    fn add(&mut self, item_id: String, amount: u64) {
        if item_id.is_empty() || amount == 0 {
            return;
        }
        match self.index.get(&item_id) {
            Some(&slot) => {
                let existing = &mut self.ingredients[slot];
                existing.amount = existing.amount.saturating_add(amount);
            }
            None => {
                self.index.insert(item_id.clone(), self.ingredients.len());
                self.ingredients.push(Ingredient::new(item_id, amount));
            }
        }
    }

    fn into_ingredients(self) -> Vec<Ingredient> {
        self.ingredients
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn normalize(value: Value) -> Option<Recipe> {
        let (doc, root) = RawDocument::from_json(&value);
        normalize_entry(&doc, root)
    }

    fn parse(value: Value) -> Vec<Recipe> {
        let (doc, root) = RawDocument::from_json(&value);
        parse_payload(&doc, root).0
    }

    #[test]
    fn parses_basic_recipes() {
        let recipes = parse(json!([
            {
                "output": {"itemId": "ENCHANTED_CARROT", "amount": 1},
                "input": [{"itemId": "CARROT_ITEM", "amount": 160}],
            },
            {
                "output": {"item": "ENCHANTED_PORK", "count": 1},
                "ingredients": [{"item": "PORK", "count": 160}],
            },
        ]));

        assert_eq!(
            recipes,
            vec![
                Recipe::new("ENCHANTED_CARROT", 1, vec![Ingredient::new("CARROT_ITEM", 160)]),
                Recipe::new("ENCHANTED_PORK", 1, vec![Ingredient::new("PORK", 160)]),
            ]
        );
    }

    #[test]
    fn empty_or_missing_containers_yield_nothing() {
        assert_eq!(normalize(json!({"output": "ENCHANTED_CARROT"})), None);
        assert_eq!(
            normalize(json!({"output": "ENCHANTED_CARROT", "input": [], "items": {}, "recipe": null})),
            None
        );
    }

    #[test]
    fn skipped_entries_are_labelled_by_their_name() {
        let (doc, root) = RawDocument::from_json(&json!([
            {"output": {"itemId": "ENCHANTED_CARROT"}, "id": "carrot_recipe"},
            {"name": "Pork Bundle"},
            {"output": 7},
            "not a record",
        ]));
        let entries = doc.as_list(root).unwrap();

        assert_eq!(entry_label(&doc, entries[0]), "carrot_recipe");
        assert_eq!(entry_label(&doc, entries[1]), "Pork Bundle");
        assert_eq!(entry_label(&doc, entries[2]), "<unnamed>");
        assert_eq!(entry_label(&doc, entries[3]), "<unnamed>");
    }

    #[test]
    fn entries_without_output_are_skipped() {
        let (doc, root) = RawDocument::from_json(&json!([
            {"input": [{"itemId": "CARROT_ITEM", "amount": 160}]},
            "not a record",
            {"output": "ENCHANTED_CARROT"},
            {"output": "ENCHANTED_CARROT", "input": [{"itemId": "CARROT_ITEM", "amount": 160}]},
        ]));
        let (recipes, stats) = parse_payload(&doc, root);

        assert_eq!(recipes.len(), 1);
        assert_eq!(
            stats,
            ExtractStats {
                recipes: 1,
                not_records: 1,
                missing_output: 1,
                missing_ingredients: 1,
            }
        );
    }

    #[test]
    fn mapping_payload_iterates_values() {
        let recipes = parse(json!({
            "first": {"output": "A", "input": [{"id": "X", "amount": 1}]},
            "second": {"output": "B", "input": [{"id": "Y", "amount": 2}]},
        }));
        let outputs: Vec<_> = recipes.iter().map(|r| r.output_item_id.as_str()).collect();
        assert_eq!(outputs, vec!["A", "B"]);
    }

    #[test]
    fn scalar_payload_yields_nothing() {
        assert!(parse(json!("recipes")).is_empty());
    }

    #[test]
    fn sums_amounts_across_containers() {
        let recipe = normalize(json!({
            "output": "ENCHANTED_SUGAR",
            "input": [{"itemId": "SUGAR_CANE", "amount": 5}],
            "materials": {"cane": {"item": "SUGAR_CANE", "qty": 3}},
        }))
        .unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("SUGAR_CANE", 8)]);
    }

    #[test]
    fn repeated_ingredients_merge_in_first_seen_order() {
        let recipe = normalize(json!({
            "output": "X",
            "ingredients": [
                {"id": "B", "amount": 1},
                {"id": "A", "amount": 2},
                {"id": "B", "amount": 4},
            ],
        }))
        .unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("B", 5), Ingredient::new("A", 2)]);
    }

    #[test]
    fn shaped_recipe_counts_pattern_cells() {
        let recipe = normalize(json!({
            "output": {"itemId": "ENCHANTED_STRING", "amount": 1},
            "pattern": ["XX", " X"],
            "key": {"X": {"itemId": "STRING", "amount": 5}},
        }))
        .unwrap();
        assert_eq!(recipe, Recipe::new("ENCHANTED_STRING", 1, vec![Ingredient::new("STRING", 15)]));
    }

    #[test]
    fn shaped_totals_add_to_container_totals() {
        let recipe = normalize(json!({
            "output": "ENCHANTED_STRING",
            "ingredients": [{"item": "STRING", "amount": 2}],
            "pattern": ["X X"],
            "key": {"X": {"item": "STRING", "amount": 5}, "Y": {"item": "SLIME_BALL", "amount": 1}},
        }))
        .unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("STRING", 12)]);
    }

    #[test]
    fn shaped_recipe_ignores_unusable_symbols() {
        let recipe = normalize(json!({
            "output": "BLOCK",
            "pattern": ["AB", "CD", 7],
            "key": {
                "A": {"item": "IRON", "amount": 1},
                "B": "GOLD",
                "C": {"item": "COAL"},
                "CD": {"item": "DIAMOND", "amount": 1},
            },
        }))
        .unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("IRON", 1)]);
    }

    #[test]
    fn output_rules_follow_precedence() {
        let recipe = normalize(json!({
            "result": {"id": "SECOND"},
            "output": {"name": "FIRST", "qty": 4},
            "id": "ENTRY",
            "input": [{"id": "X", "amount": 1}],
        }))
        .unwrap();
        assert_eq!(recipe.output_item_id, "FIRST");
        assert_eq!(recipe.output_amount, 4);
    }

    #[test]
    fn unusable_output_candidates_fall_through() {
        let recipe = normalize(json!({
            "output": {"amount": 3},
            "result": "   ",
            "output_item": 12,
            "outputItem": "  ENCHANTED_BREAD ",
            "input": [{"id": "WHEAT", "amount": 60}],
        }))
        .unwrap();
        assert_eq!(recipe.output_item_id, "ENCHANTED_BREAD");
        assert_eq!(recipe.output_amount, 1);
    }

    #[test]
    fn entry_keys_are_the_last_resort() {
        let recipe = normalize(json!({
            "id": "ENCHANTED_CARROT",
            "count": "2",
            "recipe": {"inputs": [{"itemId": "CARROT_ITEM", "amount": 160}]},
        }))
        .unwrap();
        assert_eq!(
            recipe,
            Recipe::new("ENCHANTED_CARROT", 2, vec![Ingredient::new("CARROT_ITEM", 160)])
        );
    }

    #[test]
    fn amounts_are_coerced_leniently() {
        let recipe = normalize(json!({
            "output": {"id": "OUT", "amount": "many"},
            "ingredients": [
                {"id": "TEXT", "amount": " 7 "},
                {"id": "FLOAT", "amount": 2.9},
                {"id": "ZERO_THEN_COUNT", "amount": 0, "count": 3},
                {"id": "NEGATIVE", "amount": -4},
                {"id": "GARBAGE", "amount": "lots"},
                {"id": 42, "amount": 1},
            ],
        }))
        .unwrap();
        assert_eq!(recipe.output_amount, 1);
        assert_eq!(
            recipe.ingredients,
            vec![
                Ingredient::new("TEXT", 7),
                Ingredient::new("FLOAT", 2),
                Ingredient::new("ZERO_THEN_COUNT", 3),
            ]
        );
    }

    #[test]
    fn non_positive_output_amount_defaults_to_one() {
        let recipe = normalize(json!({
            "output": {"id": "OUT", "amount": -2},
            "input": [{"id": "IN", "amount": 1}],
        }))
        .unwrap();
        assert_eq!(recipe.output_amount, 1);
    }

    #[test]
    fn ingredient_like_mapping_is_not_descended() {
        // The wrapper resolves as an ingredient itself, hiding the nested list.
        let recipe = normalize(json!({
            "output": "OUT",
            "input": {
                "name": "WRAPPER",
                "count": 1,
                "parts": [{"id": "HIDDEN", "amount": 9}],
            },
        }))
        .unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("WRAPPER", 1)]);
    }

    #[test]
    fn nested_containers_are_searched() {
        let recipe = normalize(json!({
            "output": "OUT",
            "slots": {"A1": {"item": "LOG", "count": 2}, "B1": [[{"item": "PLANK", "count": 1}]], "C1": "LOG:4"},
        }))
        .unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("LOG", 2), Ingredient::new("PLANK", 1)]);
    }

    #[test]
    fn cyclic_containers_terminate() {
        let mut doc = RawDocument::new();
        let entry = doc.push(RawNode::Map(Vec::new()));
        let output = doc.push(RawNode::Text("OUT".to_string()));
        doc.insert_entry(entry, "output", output);

        let input = doc.push(RawNode::List(Vec::new()));
        let ingredient = doc.insert_json(&json!({"itemId": "A", "amount": 2}));
        let nested = doc.push(RawNode::Map(Vec::new()));
        let nested_ingredient = doc.insert_json(&json!({"itemId": "B", "amount": 3}));
        doc.push_item(input, ingredient);
        doc.push_item(input, nested);
        doc.insert_entry(nested, "back", input);
        doc.insert_entry(nested, "self", nested);
        doc.insert_entry(nested, "leaf", nested_ingredient);
        doc.insert_entry(entry, "input", input);

        let recipe = normalize_entry(&doc, entry).unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("A", 2), Ingredient::new("B", 3)]);
    }

    #[test]
    fn same_container_under_two_fields_counts_twice() {
        let mut doc = RawDocument::new();
        let entry = doc.insert_json(&json!({"output": "OUT"}));
        let shared = doc.insert_json(&json!([{"id": "IN", "amount": 4}]));
        doc.insert_entry(entry, "input", shared);
        doc.insert_entry(entry, "inputs", shared);

        let recipe = normalize_entry(&doc, entry).unwrap();
        assert_eq!(recipe.ingredients, vec![Ingredient::new("IN", 8)]);
    }
}
