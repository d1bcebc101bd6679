//! Weighted, tiered size generation.
//!
//! A [`SizeTable`] holds an ordered list of [`GenerationTier`]s. Each call to
//! [`SizeGenerator::generate`]:
//!
//! 1. rolls an integer in `1..=100`,
//! 2. walks the tiers accumulating `selection_weight` and picks the first tier
//!    whose running sum reaches the roll (an edge roll belongs to the lower
//!    tier),
//! 3. draws uniformly from the tier's range `default * [min_mult, max_mult]`,
//!    or, if the tier has [`SubTier`]s, picks a sub-tier by the same
//!    cumulative rule and draws from its slice of the tier's range,
//! 4. rounds to 3 decimals and clamps into the global `[min_size, max_size]`.
//!
//! Misconfigured tables degrade to the default size with a warning; nothing
//! here panics on bad weights.
//!
//! # Example
//!
//! ```
//! use poop_core::size::{GenerationTier, SizeGenerator, SizeTable};
//!
//! let table = SizeTable {
//!     default_size: 1.0,
//!     min_size: 0.3,
//!     max_size: 2.6,
//!     tiers: vec![
//!         GenerationTier::new(40, "normal", 0.9, 1.1),
//!         GenerationTier::new(60, "big", 1.1, 2.0),
//!     ],
//!     categories: Vec::new(),
//! };
//! let mut sizes = SizeGenerator::seeded(table, 42);
//!
//! assert_eq!(sizes.select_tier(35), Some(0));
//! assert_eq!(sizes.select_tier(85), Some(1));
//!
//! let value = sizes.generate();
//! assert!((0.3..=2.6).contains(&value));
//! ```

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg64;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Upper bound (inclusive) of the tier roll.
pub const ROLL_MAX: u32 = 100;

// ---------------------------------------------------------------------------
// Table types
// ---------------------------------------------------------------------------

/// A nested band inside a [`GenerationTier`], expressed as a fraction of the
/// parent tier's range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTier {
    pub weight: u32,
    pub label: String,
    /// Start of the band as a fraction of the parent span, in `[0, 1]`.
    pub min_range_percent: f64,
    /// End of the band as a fraction of the parent span, in `[0, 1]`.
    pub max_range_percent: f64,
}

impl SubTier {
    pub fn new(weight: u32, label: &str, min_range_percent: f64, max_range_percent: f64) -> Self {
        Self {
            weight,
            label: label.to_owned(),
            min_range_percent,
            max_range_percent,
        }
    }
}

/// One weighted rarity bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTier {
    /// Chance out of 100 that this tier is picked.
    pub selection_weight: u32,
    pub label: String,
    /// Lower bound as a multiple of the default size.
    pub min_multiplier: f64,
    /// Upper bound as a multiple of the default size.
    pub max_multiplier: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_tiers: Vec<SubTier>,
}

impl GenerationTier {
    pub fn new(selection_weight: u32, label: &str, min_multiplier: f64, max_multiplier: f64) -> Self {
        Self {
            selection_weight,
            label: label.to_owned(),
            min_multiplier,
            max_multiplier,
            sub_tiers: Vec::new(),
        }
    }

    /// Builder-style helper to attach sub-tiers.
    pub fn with_sub_tiers(mut self, sub_tiers: Vec<SubTier>) -> Self {
        self.sub_tiers = sub_tiers;
        self
    }

    /// Absolute range of this tier for a given default size.
    pub fn range(&self, default_size: f64) -> (f64, f64) {
        (
            default_size * self.min_multiplier,
            default_size * self.max_multiplier,
        )
    }

    /// Sum of sub-tier weights.
    pub fn sub_tier_weight(&self) -> u32 {
        self.sub_tiers.iter().map(|s| s.weight).sum()
    }
}

/// A label for generated values at or above `threshold`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SizeCategory {
    pub threshold: f64,
    /// Localisation key of the label, resolved by the chat layer.
    pub label_key: String,
}

impl SizeCategory {
    pub fn new(threshold: f64, label_key: &str) -> Self {
        Self {
            threshold,
            label_key: label_key.to_owned(),
        }
    }
}

/// The full generation table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeTable {
    pub default_size: f64,
    pub min_size: f64,
    pub max_size: f64,
    pub tiers: Vec<GenerationTier>,
    /// Sorted descending by threshold.
    pub categories: Vec<SizeCategory>,
}

impl SizeTable {
    /// Sum of tier selection weights.
    pub fn total_weight(&self) -> u32 {
        self.tiers.iter().map(|t| t.selection_weight).sum()
    }
}

impl Default for SizeTable {
    fn default() -> Self {
        Self {
            default_size: 1.0,
            min_size: 0.3,
            max_size: 3.0,
            tiers: vec![
                GenerationTier::new(10, "tiny", 0.3, 0.8),
                GenerationTier::new(45, "normal", 0.8, 1.2),
                GenerationTier::new(27, "big", 1.2, 1.6),
                GenerationTier::new(13, "huge", 1.6, 2.2),
                GenerationTier::new(5, "legendary", 2.2, 3.0).with_sub_tiers(vec![
                    SubTier::new(90, "legendary", 0.0, 0.8),
                    SubTier::new(10, "mythic", 0.8, 1.0),
                ]),
            ],
            categories: vec![
                SizeCategory::new(2.5, "size.mythic"),
                SizeCategory::new(2.2, "size.legendary"),
                SizeCategory::new(1.6, "size.huge"),
                SizeCategory::new(1.2, "size.big"),
                SizeCategory::new(0.8, "size.normal"),
                SizeCategory::new(0.0, "size.tiny"),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Cumulative-weight selection: index of the first weight whose running sum
/// is `>= roll`, or `None` if the roll lies past the total.
pub fn select_weighted<I>(weights: I, roll: u32) -> Option<usize>
where
    I: IntoIterator<Item = u32>,
{
    let mut cumulative = 0u32;
    for (index, weight) in weights.into_iter().enumerate() {
        cumulative = cumulative.saturating_add(weight);
        if roll <= cumulative {
            return Some(index);
        }
    }
    None
}

/// Absolute range of a sub-tier inside its parent's `(min, max)` range.
pub fn sub_tier_range(parent: (f64, f64), sub: &SubTier) -> (f64, f64) {
    let span = parent.1 - parent.0;
    (
        parent.0 + span * sub.min_range_percent,
        parent.0 + span * sub.max_range_percent,
    )
}

/// Round to 3 decimal places.
#[inline]
pub fn round_to_millis(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

// ---------------------------------------------------------------------------
// SizeGenerator
// ---------------------------------------------------------------------------

/// Draws sizes from a [`SizeTable`] using an injected random source.
#[derive(Debug, Clone)]
pub struct SizeGenerator<R = Pcg64> {
    table: SizeTable,
    rng: R,
}

impl SizeGenerator<Pcg64> {
    /// Reproducible generator seeded from `seed`.
    pub fn seeded(table: SizeTable, seed: u64) -> Self {
        Self::new(table, Pcg64::seed_from_u64(seed))
    }

    /// Generator seeded from OS entropy.
    pub fn from_entropy(table: SizeTable) -> Self {
        Self::new(table, Pcg64::from_entropy())
    }
}

impl<R: Rng> SizeGenerator<R> {
    pub fn new(table: SizeTable, rng: R) -> Self {
        Self { table, rng }
    }

    pub fn table(&self) -> &SizeTable {
        &self.table
    }

    /// Draw one size. Always inside `[min_size, max_size]`, rounded to 3
    /// decimals.
    pub fn generate(&mut self) -> f64 {
        if self.table.tiers.is_empty() {
            warn!("no size tiers configured, using default size");
            return self.finish(self.table.default_size);
        }
        let total = self.table.total_weight();
        if total == 0 {
            warn!("size tiers have zero total weight, using default size");
            return self.finish(self.table.default_size);
        }

        let roll = self.rng.gen_range(1..=ROLL_MAX);
        match self.select_tier(roll) {
            Some(index) => self.sample_tier(index),
            None => {
                warn!(roll, total, "roll fell past the last size tier, using default size");
                self.finish(self.table.default_size)
            }
        }
    }

    /// Tier selected by `roll` (1..=100).
    pub fn select_tier(&self, roll: u32) -> Option<usize> {
        select_weighted(self.table.tiers.iter().map(|t| t.selection_weight), roll)
    }

    /// Sub-tier of tier `tier` selected by `roll` (1..=sum of sub-tier weights).
    pub fn select_sub_tier(&self, tier: usize, roll: u32) -> Option<usize> {
        let tier = self.table.tiers.get(tier)?;
        select_weighted(tier.sub_tiers.iter().map(|s| s.weight), roll)
    }

    /// Draw a finished value from tier `index`, honouring its sub-tiers.
    ///
    /// An out-of-range index yields the default size.
    pub fn sample_tier(&mut self, index: usize) -> f64 {
        let Some(tier) = self.table.tiers.get(index) else {
            warn!(index, "unknown size tier, using default size");
            return self.finish(self.table.default_size);
        };
        let parent = tier.range(self.table.default_size);

        let range = if tier.sub_tiers.is_empty() {
            parent
        } else {
            let sub_total = tier.sub_tier_weight();
            if sub_total == 0 {
                warn!(tier = %tier.label, "sub-tiers have zero total weight, using tier range");
                parent
            } else {
                let roll = self.rng.gen_range(1..=sub_total);
                // The roll never exceeds the total, so selection always succeeds.
                match select_weighted(tier.sub_tiers.iter().map(|s| s.weight), roll) {
                    Some(sub) => sub_tier_range(parent, &tier.sub_tiers[sub]),
                    None => parent,
                }
            }
        };

        let value = self.uniform(range);
        self.finish(value)
    }

    /// Category label for `value`: the first category whose threshold is
    /// `<= value`.
    pub fn classify(&self, value: f64) -> Option<&SizeCategory> {
        self.table
            .categories
            .iter()
            .find(|category| category.threshold <= value)
    }

    fn uniform(&mut self, (lo, hi): (f64, f64)) -> f64 {
        if !(hi > lo) {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    fn finish(&self, value: f64) -> f64 {
        round_to_millis(value)
            .max(self.table.min_size)
            .min(self.table.max_size)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
