//! Crafting profitability: evaluate recipes against bazaar prices and rank them

use regex::Regex;
use thousands::Separable;

use crate::models::{EvaluationResult, Recipe, SortKey};
use crate::prices::PriceSnapshot;

/// Filters and ordering applied by [`Evaluator::rank`]
#[derive(Debug, Clone, Default)]
pub struct RankOptions {
    pub min_profit: f64,
    pub min_popularity: u64,
    /// `None` keeps every qualifying result
    pub limit: Option<usize>,
    pub sort_by: SortKey,
    /// Only rank recipes whose output id matches
    pub product_filter: Option<Regex>,
}

pub struct Evaluator<'a> {
    prices: &'a PriceSnapshot,
}

impl<'a> Evaluator<'a> {
    pub fn new(prices: &'a PriceSnapshot) -> Self {
        Self { prices }
    }

    /// Price a single craft. Returns `None` when the output or any ingredient
    /// has no bazaar entry.
    pub fn evaluate(&self, recipe: &Recipe) -> Option<EvaluationResult> {
        let output = self.prices.get(&recipe.output_item_id)?;

        let mut total_cost = 0.0;
        let mut popularity = output.popularity();
        for ingredient in &recipe.ingredients {
            let price = self.prices.get(&ingredient.item_id)?;
            total_cost += price.buy_price * ingredient.amount as f64;
            popularity = popularity.min(price.popularity());
        }

        let total_sell_value = output.sell_price * recipe.output_amount as f64;
        let profit = total_sell_value - total_cost;
        let roi = if total_cost <= 0.0 { 0.0 } else { profit / total_cost };

        Some(EvaluationResult {
            output_item_id: recipe.output_item_id.clone(),
            output_amount: recipe.output_amount,
            total_sell_value,
            total_ingredient_cost: total_cost,
            profit,
            roi,
            popularity,
        })
    }

    /// Evaluate, filter and sort recipes, best first
    pub fn rank<'r>(
        &self,
        recipes: impl IntoIterator<Item = &'r Recipe>,
        options: &RankOptions,
    ) -> Vec<EvaluationResult> {
        let mut ranked: Vec<EvaluationResult> = recipes
            .into_iter()
            .filter(|recipe| {
                options
                    .product_filter
                    .as_ref()
                    .is_none_or(|filter| filter.is_match(&recipe.output_item_id))
            })
            .filter_map(|recipe| self.evaluate(recipe))
            .filter(|result| result.profit >= options.min_profit)
            .filter(|result| result.popularity >= options.min_popularity)
            .collect();

        let key = options.sort_by;
        ranked.sort_by(|a, b| key.value(b).total_cmp(&key.value(a)));

        if let Some(limit) = options.limit {
            ranked.truncate(limit);
        }
        ranked
    }
}

/// Format ranked results, one numbered line per craft
pub fn format_ranking(results: &[EvaluationResult]) -> String {
    let mut output = String::new();
    for (index, result) in results.iter().enumerate() {
        output.push_str(&format!(
            "{:>2}. {:<20} profit={} roi={:.2}% popularity={}\n",
            index + 1,
            result.output_item_id,
            format!("{:.1}", result.profit).separate_with_commas(),
            result.roi * 100.0,
            result.popularity.separate_with_commas(),
        ));
    }
    output
}
