//! Bazaar price snapshots
//!
//! Snapshots come either from the live bazaar endpoint
//! (`products -> id -> quick_status`) or from a cache file mapping each item
//! id to `sell_price`, `buy_price`, `sell_volume` and `buy_volume`. A cache
//! path may also be a directory of snapshots, which are averaged.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::models::PriceEntry;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSnapshot {
    entries: HashMap<String, PriceEntry>,
}

/// Cache file record. Missing fields count as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CachedPrice {
    sell_price: f64,
    buy_price: f64,
    sell_volume: f64,
    buy_volume: f64,
}

/// `quick_status` block of the bazaar endpoint. Nulls count as zero.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct QuickStatus {
    sell_price: Option<f64>,
    buy_price: Option<f64>,
    sell_volume: Option<f64>,
    buy_volume: Option<f64>,
}

impl PriceSnapshot {
    pub fn from_entries(entries: impl IntoIterator<Item = PriceEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (entry.item_id.clone(), entry))
                .collect(),
        }
    }

    /// Parse the live bazaar response, skipping malformed products
    pub fn from_bazaar_payload(payload: &Value) -> Self {
        let Some(products) = payload.get("products").and_then(Value::as_object) else {
            return Self::default();
        };

        let mut entries = HashMap::new();
        for (item_id, product) in products {
            let quick_status = product.get("quick_status").cloned().unwrap_or(Value::Null);
            let status = if quick_status.is_null() {
                QuickStatus::default()
            } else {
                match serde_json::from_value::<QuickStatus>(quick_status) {
                    Ok(status) => status,
                    Err(e) => {
                        debug!(%item_id, error = %e, "skipping malformed bazaar product");
                        continue;
                    }
                }
            };

            entries.insert(
                item_id.clone(),
                PriceEntry {
                    item_id: item_id.clone(),
                    sell_price: status.sell_price.unwrap_or(0.0),
                    buy_price: status.buy_price.unwrap_or(0.0),
                    sell_volume: volume(status.sell_volume.unwrap_or(0.0)),
                    buy_volume: volume(status.buy_volume.unwrap_or(0.0)),
                },
            );
        }
        Self { entries }
    }

    /// Parse a cache file. A file holding a raw bazaar response is accepted too.
    pub fn from_cache_value(value: &Value) -> Result<Self> {
        if value.get("products").is_some() {
            return Ok(Self::from_bazaar_payload(value));
        }

        let cached: HashMap<String, CachedPrice> =
            serde_json::from_value(value.clone()).context("Malformed bazaar cache")?;
        Ok(Self::from_entries(cached.into_iter().map(|(item_id, price)| PriceEntry {
            item_id,
            sell_price: price.sell_price,
            buy_price: price.buy_price,
            sell_volume: volume(price.sell_volume),
            buy_volume: volume(price.buy_volume),
        })))
    }

    /// Load a cache file, or every `*.json` snapshot below a directory merged together
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_dir() {
            return Self::load_file(path);
        }

        let files = find_snapshot_files(path);
        info!("Merging {} bazaar snapshots from {}", files.len(), path.display());
        let snapshots = files
            .iter()
            .map(|file| Self::load_file(file))
            .collect::<Result<Vec<_>>>()?;
        Ok(merge_snapshots(snapshots))
    }

    fn load_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let value: Value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        Self::from_cache_value(&value).with_context(|| format!("Failed to load {}", path.display()))
    }

    pub fn get(&self, item_id: &str) -> Option<&PriceEntry> {
        self.entries.get(item_id)
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.contains_key(item_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn volume(raw: f64) -> u64 {
    if raw.is_finite() && raw > 0.0 { raw.trunc() as u64 } else { 0 }
}

/// Snapshot files below `dir`, in path order
pub fn find_snapshot_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

/// Average several snapshots. Prices use the float mean; volumes the
/// floored running mean. The first snapshot an item appears in is the baseline.
pub fn merge_snapshots(snapshots: impl IntoIterator<Item = PriceSnapshot>) -> PriceSnapshot {
    let mut aggregate: HashMap<String, (PriceEntry, u64)> = HashMap::new();

    for snapshot in snapshots {
        for (item_id, entry) in snapshot.entries {
            let (baseline, seen) = match aggregate.entry(item_id) {
                Entry::Vacant(slot) => {
                    slot.insert((entry, 1));
                    continue;
                }
                Entry::Occupied(slot) => slot.into_mut(),
            };

            let count = *seen + 1;
            baseline.sell_price = (baseline.sell_price * *seen as f64 + entry.sell_price) / count as f64;
            baseline.buy_price = (baseline.buy_price * *seen as f64 + entry.buy_price) / count as f64;
            baseline.sell_volume = running_mean(baseline.sell_volume, *seen, entry.sell_volume);
            baseline.buy_volume = running_mean(baseline.buy_volume, *seen, entry.buy_volume);
            *seen = count;
        }
    }

    PriceSnapshot {
        entries: aggregate
            .into_iter()
            .map(|(item_id, (entry, _))| (item_id, entry))
            .collect(),
    }
}

/// Floored mean of `seen` samples averaging `mean` plus one more sample
fn running_mean(mean: u64, seen: u64, next: u64) -> u64 {
    let total = u128::from(mean) * u128::from(seen) + u128::from(next);
    // A mean of u64 samples always fits back into u64.
    (total / (u128::from(seen) + 1)) as u64
}
