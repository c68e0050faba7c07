//! 奖品表的加权抽取
//!
//! 按表内顺序把 `[0, total)` 切成连续的左闭右开区间，每个奖品一段
//! 用一个均匀随机数选区间；落在边界上的值属于后一个区间

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::models::ItemEntry;

/// `[0, 1)` 内均匀随机数的来源
pub trait RandomSource: Send + Sync {
    fn next_f64(&self) -> f64;
}

/// 线程本地随机数，生产环境使用
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::rng().random::<f64>()
    }
}

/// 固定种子，可复现
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RandomSource for SeededRandom {
    fn next_f64(&self) -> f64 {
        match self.rng.lock() {
            Ok(mut rng) => rng.random::<f64>(),
            Err(poisoned) => poisoned.into_inner().random::<f64>(),
        }
    }
}

/// 循环回放固定的数值序列
pub struct SequenceRandom {
    values: Vec<f64>,
    cursor: AtomicUsize,
}

impl SequenceRandom {
    pub fn new(values: Vec<f64>) -> Self {
        Self {
            values,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl RandomSource for SequenceRandom {
    fn next_f64(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let i = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.values[i % self.values.len()]
    }
}

/// 权重无法参与抽取的奖品
#[derive(Debug, Clone, PartialEq)]
pub struct ItemIssue {
    pub item_name: String,
    pub weight: f64,
}

impl std::fmt::Display for ItemIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "item '{}' has invalid weight {}", self.item_name, self.weight)
    }
}

fn is_valid_weight(weight: f64) -> bool {
    weight.is_finite() && weight >= 0.0
}

/// 拆出权重为负数或非有限值的条目，保持原有顺序
pub fn sanitize_items(items: Vec<ItemEntry>) -> (Vec<ItemEntry>, Vec<ItemIssue>) {
    let mut issues = Vec::new();
    let kept = items
        .into_iter()
        .filter(|item| {
            if is_valid_weight(item.weight) {
                true
            } else {
                issues.push(ItemIssue {
                    item_name: item.item_name.clone(),
                    weight: item.weight,
                });
                false
            }
        })
        .collect();
    (kept, issues)
}

fn effective_weight(item: &ItemEntry) -> f64 {
    if is_valid_weight(item.weight) {
        item.weight
    } else {
        0.0
    }
}

pub fn total_weight(items: &[ItemEntry]) -> f64 {
    items.iter().map(effective_weight).sum()
}

fn max_weight(items: &[ItemEntry]) -> f64 {
    items.iter().map(effective_weight).fold(0.0, f64::max)
}

/// 以最大权重为单位缩放后的权重与总和，缩放后总和不会溢出为 inf
fn scaled(items: &[ItemEntry]) -> Option<(Vec<f64>, f64)> {
    let max = max_weight(items);
    if !(max > 0.0) {
        return None;
    }
    let weights: Vec<f64> = items.iter().map(|i| effective_weight(i) / max).collect();
    let total = weights.iter().sum();
    Some((weights, total))
}

/// 每个物品的占比 `weight / total`；总和不为正时全部为 0
pub fn shares(items: &[ItemEntry]) -> Vec<f64> {
    match scaled(items) {
        Some((weights, total)) => weights.iter().map(|w| w / total).collect(),
        None => vec![0.0; items.len()],
    }
}

/// 抽取一个物品。空表或总权重不为正时返回 `None`
pub fn draw<'a>(items: &'a [ItemEntry], rng: &dyn RandomSource) -> Option<&'a ItemEntry> {
    let (weights, total) = scaled(items)?;

    let r = rng.next_f64().clamp(0.0, 1.0) * total;
    let mut cumulative = 0.0;
    for (item, weight) in items.iter().zip(&weights) {
        cumulative += weight;
        if r < cumulative {
            return Some(item);
        }
    }

    // 仅在浮点舍入时到达这里，归入最后一个有效区间
    items
        .iter()
        .zip(&weights)
        .rev()
        .find(|(_, w)| **w > 0.0)
        .map(|(item, _)| item)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(name: &str, weight: f64) -> ItemEntry {
        ItemEntry {
            id: 0,
            guild_id: "g1".into(),
            gacha_name: "daily".into(),
            item_name: name.into(),
            rarity: String::new(),
            weight,
        }
    }

    fn drawn_name(items: &[ItemEntry], r: f64) -> Option<String> {
        draw(items, &SequenceRandom::new(vec![r])).map(|i| i.item_name.clone())
    }

    #[test]
    fn test_empty_and_zero_tables_draw_nothing() {
        let rng = SequenceRandom::new(vec![0.5]);
        assert!(draw(&[], &rng).is_none());
        assert!(draw(&[item("a", 0.0), item("b", 0.0)], &rng).is_none());
    }

    #[test]
    fn test_intervals_follow_table_order() {
        let items = vec![item("Common", 80.0), item("Rare", 20.0)];
        assert_eq!(drawn_name(&items, 0.0).as_deref(), Some("Common"));
        assert_eq!(drawn_name(&items, 0.79).as_deref(), Some("Common"));
        assert_eq!(drawn_name(&items, 0.81).as_deref(), Some("Rare"));
        assert_eq!(drawn_name(&items, 0.999_999).as_deref(), Some("Rare"));
    }

    #[test]
    fn test_boundary_goes_to_later_item() {
        // r = 0.5 * 2 = 1.0 正好落在第一个边界上
        let items = vec![item("a", 1.0), item("b", 1.0)];
        assert_eq!(drawn_name(&items, 0.5).as_deref(), Some("b"));
    }

    #[test]
    fn test_zero_weight_item_is_never_drawn() {
        let items = vec![item("a", 1.0), item("ghost", 0.0), item("b", 1.0)];
        for r in [0.0, 0.25, 0.49, 0.5, 0.75, 0.99] {
            assert_ne!(drawn_name(&items, r).as_deref(), Some("ghost"));
        }
    }

    #[test]
    fn test_weights_need_not_sum_to_100() {
        let items = vec![item("a", 3.0), item("b", 1.0)];
        assert_eq!(drawn_name(&items, 0.74).as_deref(), Some("a"));
        assert_eq!(drawn_name(&items, 0.76).as_deref(), Some("b"));

        let over = vec![item("a", 150.0), item("b", 150.0)];
        assert_eq!(drawn_name(&over, 0.6).as_deref(), Some("b"));
    }

    #[test]
    fn test_out_of_range_random_is_clamped() {
        let items = vec![item("a", 1.0), item("b", 1.0), item("zero", 0.0)];
        assert_eq!(drawn_name(&items, 1.0).as_deref(), Some("b"));
        assert_eq!(drawn_name(&items, -3.0).as_deref(), Some("a"));
    }

    #[test]
    fn test_invalid_weights_are_ignored_and_reported() {
        let items = vec![item("neg", -5.0), item("nan", f64::NAN), item("ok", 2.0)];
        assert_eq!(drawn_name(&items, 0.0).as_deref(), Some("ok"));

        let (kept, issues) = sanitize_items(items);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].item_name, "ok");
        let names: Vec<&str> = issues.iter().map(|i| i.item_name.as_str()).collect();
        assert_eq!(names, vec!["neg", "nan"]);
    }

    #[test]
    fn test_shares() {
        let items = vec![item("a", 1.0), item("b", 3.0)];
        let got = shares(&items);
        assert!((got[0] - 0.25).abs() < 1e-12);
        assert!((got[1] - 0.75).abs() < 1e-12);
        assert_eq!(shares(&[item("z", 0.0)]), vec![0.0]);
    }

    #[test]
    fn test_huge_weights_do_not_overflow_the_total() {
        let items = vec![item("first", 1e308), item("second", 1e308)];
        assert_eq!(drawn_name(&items, 0.0).as_deref(), Some("first"));
        assert_eq!(drawn_name(&items, 0.25).as_deref(), Some("first"));
        assert_eq!(drawn_name(&items, 0.49).as_deref(), Some("first"));
        assert_eq!(drawn_name(&items, 0.75).as_deref(), Some("second"));
        assert_eq!(shares(&items), vec![0.5, 0.5]);
    }

    #[test]
    fn test_seeded_draws_are_reproducible() {
        let items = vec![item("a", 1.0), item("b", 1.0), item("c", 1.0)];
        let first = SeededRandom::new(7);
        let second = SeededRandom::new(7);
        for _ in 0..50 {
            assert_eq!(
                draw(&items, &first).map(|i| i.item_name.clone()),
                draw(&items, &second).map(|i| i.item_name.clone())
            );
        }
    }

    #[test]
    fn test_frequencies_converge_to_shares() {
        let items = vec![
            item("Common", 60.0),
            item("Uncommon", 25.0),
            item("Rare", 10.0),
            item("Legend", 5.0),
        ];
        let rng = SeededRandom::new(20251016);
        let n = 200_000;
        let mut counts = [0usize; 4];
        for _ in 0..n {
            let picked = draw(&items, &rng).unwrap();
            let idx = items
                .iter()
                .position(|i| i.item_name == picked.item_name)
                .unwrap();
            counts[idx] += 1;
        }
        for (count, share) in counts.iter().zip(shares(&items)) {
            let observed = *count as f64 / n as f64;
            assert!(
                (observed - share).abs() < 0.01,
                "observed {observed} vs expected {share}"
            );
        }
    }
}
