//! Data models for recipes, bazaar prices and evaluation results

use serde::{Deserialize, Serialize};

/// One required input of a recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    #[serde(rename = "product_id")]
    pub item_id: String,
    pub amount: u64,
}

impl Ingredient {
    pub fn new(item_id: impl Into<String>, amount: u64) -> Self {
        Self {
            item_id: item_id.into(),
            amount,
        }
    }
}

/// A craft: the output item, how many a single craft yields, and its inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    #[serde(rename = "product_id")]
    pub output_item_id: String,
    #[serde(default = "default_output_amount")]
    pub output_amount: u64,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
}

fn default_output_amount() -> u64 {
    1
}

impl Recipe {
    pub fn new(output_item_id: impl Into<String>, output_amount: u64, ingredients: Vec<Ingredient>) -> Self {
        Self {
            output_item_id: output_item_id.into(),
            output_amount,
            ingredients,
        }
    }
}

/// Bazaar quick-status figures for a single item
#[derive(Debug, Clone, PartialEq)]
pub struct PriceEntry {
    pub item_id: String,
    pub sell_price: f64,
    pub buy_price: f64,
    pub sell_volume: u64,
    pub buy_volume: u64,
}

impl PriceEntry {
    /// Total traded volume, used as a liquidity proxy
    pub fn popularity(&self) -> u64 {
        self.sell_volume.saturating_add(self.buy_volume)
    }
}

/// Result of evaluating one recipe against a price snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationResult {
    #[serde(rename = "product_id")]
    pub output_item_id: String,
    pub output_amount: u64,
    #[serde(rename = "total_sell_price")]
    pub total_sell_value: f64,
    #[serde(rename = "total_buy_cost")]
    pub total_ingredient_cost: f64,
    pub profit: f64,
    pub roi: f64,
    pub popularity: u64,
}

/// Ranking criterion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortKey {
    #[default]
    Profit,
    Roi,
    Popularity,
}

impl SortKey {
    pub fn value(self, result: &EvaluationResult) -> f64 {
        match self {
            SortKey::Profit => result.profit,
            SortKey::Roi => result.roi,
            SortKey::Popularity => result.popularity as f64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popularity_sums_both_volumes() {
        let entry = PriceEntry {
            item_id: "WHEAT".to_string(),
            sell_price: 1.0,
            buy_price: 2.0,
            sell_volume: 700,
            buy_volume: 300,
        };
        assert_eq!(entry.popularity(), 1000);
    }

    #[test]
    fn recipe_uses_canonical_field_names() {
        let recipe = Recipe::new("ENCHANTED_CARROT", 1, vec![Ingredient::new("CARROT_ITEM", 160)]);
        let json = serde_json::to_value(&recipe).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "product_id": "ENCHANTED_CARROT",
                "output_amount": 1,
                "ingredients": [{"product_id": "CARROT_ITEM", "amount": 160}],
            })
        );
    }
}
