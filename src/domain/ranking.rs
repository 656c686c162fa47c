//! Supplier product ranking.
//!
//! Orders a supplier's active products so the ones it offers most often come
//! first when it fills in a new offer. Best-effort: with no usable history the
//! result is simply every active product in name order.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CycleId, ProductId};
use super::offer::Product;

/// Default number of past cycles considered.
pub const DEFAULT_RANKING_WINDOW: usize = 5;

/// One historical offer line of a supplier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferHistoryEntry {
    pub cycle_id: CycleId,
    /// Used to order cycles by recency.
    pub cycle_created_at: DateTime<Utc>,
    pub product_id: ProductId,
    pub quantity: u32,
}

struct Score {
    total: u64,
    last_seen: DateTime<Utc>,
}

/// Rank `products` by how much was offered in the last `window` cycles.
///
/// Deleted products are dropped. Ranked products come first (aggregate
/// quantity descending, then most recent cycle, then name); the rest follow
/// in name order.
pub fn rank_products(
    products: &[Product],
    history: &[OfferHistoryEntry],
    window: usize,
) -> Vec<Product> {
    let mut cycles: Vec<(DateTime<Utc>, CycleId)> = history
        .iter()
        .map(|h| (h.cycle_created_at, h.cycle_id))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    cycles.sort_by(|a, b| b.cmp(a));
    let recent: HashSet<CycleId> = cycles.into_iter().take(window).map(|(_, id)| id).collect();

    let mut scores: HashMap<ProductId, Score> = HashMap::new();
    for entry in history
        .iter()
        .filter(|h| h.quantity > 0 && recent.contains(&h.cycle_id))
    {
        let score = scores.entry(entry.product_id).or_insert(Score {
            total: 0,
            last_seen: entry.cycle_created_at,
        });
        score.total += u64::from(entry.quantity);
        score.last_seen = score.last_seen.max(entry.cycle_created_at);
    }

    let (mut ranked, mut rest): (Vec<&Product>, Vec<&Product>) = products
        .iter()
        .filter(|p| !p.deleted)
        .partition(|p| scores.contains_key(&p.id));

    ranked.sort_by(|a, b| {
        let (sa, sb) = (&scores[&a.id], &scores[&b.id]);
        sb.total
            .cmp(&sa.total)
            .then(sb.last_seen.cmp(&sa.last_seen))
            .then_with(|| a.name.cmp(&b.name))
    });
    rest.sort_by(|a, b| a.name.cmp(&b.name));

    ranked.into_iter().chain(rest).cloned().collect()
}
