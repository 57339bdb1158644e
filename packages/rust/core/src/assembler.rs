//! Exact-total paper assembly over fixed score tiers.
//!
//! The assembler only sees scores. Which label earns which score is decided
//! earlier, by the [`ScoreTable`] used when questions were promoted; the
//! assembler just buckets the pool into three tiers (light, medium, heavy)
//! and searches for tier counts that hit the target exactly.

use std::collections::BTreeMap;

use tracing::{debug, info, instrument};

use exampaper_shared::{
    AssemblyError, CognitiveLabel, LabeledQuestion, Paper, PaperItem, ScoreTable, TierCounts,
    TierScores,
};

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// What the caller wants from one assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyRequest {
    /// Exact total score. Must be positive.
    pub target: i64,
    /// Label → fraction, echoed on the paper. Need not sum to 1.
    pub requested_distribution: BTreeMap<CognitiveLabel, f64>,
    /// Per-tier counts the search tries to stay close to.
    pub desired: TierCounts,
}

impl AssemblyRequest {
    /// Derive desired tier counts from a label distribution.
    ///
    /// A tier's share is the summed fraction of every label whose score is
    /// that tier's score; its desired count is `round(share * target / score)`,
    /// rounding halves up. Fractions are fixed to millionths first so the
    /// count does not depend on how the shares happen to add up in floating
    /// point.
    pub fn from_distribution(
        target: i64,
        distribution: BTreeMap<CognitiveLabel, f64>,
        scores: &ScoreTable,
        tiers: TierScores,
    ) -> Self {
        let desired_for = |tier_score: u32| -> u32 {
            if target <= 0 || tier_score == 0 {
                return 0;
            }
            let share_ppm: i128 = scores
                .labels_with_score(tier_score)
                .filter_map(|label| distribution.get(&label))
                .map(|fraction| fraction_to_ppm(*fraction))
                .sum();
            let numerator = share_ppm * i128::from(target);
            let denominator = PPM * i128::from(tier_score);
            let count = (2 * numerator + denominator) / (2 * denominator);
            u32::try_from(count).unwrap_or(u32::MAX)
        };

        let desired = TierCounts::new(
            desired_for(tiers.light),
            desired_for(tiers.medium),
            desired_for(tiers.heavy),
        );

        Self {
            target,
            requested_distribution: distribution,
            desired,
        }
    }
}

/// Parts per million in a whole fraction.
const PPM: i128 = 1_000_000;

/// A fraction in millionths. Negative, non-finite and absurdly large
/// fractions contribute nothing or are capped.
fn fraction_to_ppm(fraction: f64) -> i128 {
    if !fraction.is_finite() || fraction <= 0.0 {
        return 0;
    }
    (fraction.min(1.0e12) * PPM as f64).round() as i128
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

/// Which tier a score falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    Light,
    Medium,
    Heavy,
}

/// Exact bucketed search over three score tiers.
#[derive(Debug, Clone, Copy)]
pub struct PaperAssembler {
    tiers: TierScores,
}

impl PaperAssembler {
    /// Tier scores must be positive and pairwise distinct.
    pub fn new(tiers: TierScores) -> Result<Self, AssemblyError> {
        let TierScores {
            light,
            medium,
            heavy,
        } = tiers;
        if light == 0 || medium == 0 || heavy == 0 {
            return Err(AssemblyError::InvalidTiers(format!(
                "tier scores must be positive (got {light}/{medium}/{heavy})"
            )));
        }
        if light == medium || medium == heavy || light == heavy {
            return Err(AssemblyError::InvalidTiers(format!(
                "tier scores must be distinct (got {light}/{medium}/{heavy})"
            )));
        }
        Ok(Self { tiers })
    }

    pub fn tiers(&self) -> TierScores {
        self.tiers
    }

    fn tier_of(&self, score: u32) -> Option<Tier> {
        if score == self.tiers.light {
            Some(Tier::Light)
        } else if score == self.tiers.medium {
            Some(Tier::Medium)
        } else if score == self.tiers.heavy {
            Some(Tier::Heavy)
        } else {
            None
        }
    }

    /// Select questions whose scores sum exactly to `request.target`.
    ///
    /// Items keep their pool order on the paper, and within a tier the
    /// earliest items are taken first, so the same pool always yields the
    /// same paper.
    #[instrument(skip_all, fields(pool = pool.len(), target = request.target))]
    pub fn assemble(
        &self,
        pool: &[LabeledQuestion],
        request: &AssemblyRequest,
    ) -> Result<Paper, AssemblyError> {
        if request.target <= 0 {
            return Err(AssemblyError::NonPositiveTarget(request.target));
        }
        let infeasible = AssemblyError::Infeasible {
            target: request.target,
        };
        // Paper totals are u32, so a larger target is never reachable.
        let target = u32::try_from(request.target).map_err(|_| infeasible.clone())?;

        let eligible: Vec<(&LabeledQuestion, Tier)> = pool
            .iter()
            .filter_map(|q| self.tier_of(q.score()).map(|tier| (q, tier)))
            .collect();
        if eligible.is_empty() {
            return Err(AssemblyError::EmptyPool);
        }

        let available = TierCounts::new(
            count_tier(&eligible, Tier::Light),
            count_tier(&eligible, Tier::Medium),
            count_tier(&eligible, Tier::Heavy),
        );
        debug!(?available, desired = ?request.desired, "tier availability");

        let chosen = self
            .search(target, available, request.desired)
            .ok_or(infeasible)?;

        let deviation = chosen.deviation(&request.desired);
        info!(?chosen, deviation, "tier counts selected");

        let mut taken = TierCounts::default();
        let mut items = Vec::with_capacity(chosen.total() as usize);
        for (question, tier) in eligible {
            let (slot, limit) = match tier {
                Tier::Light => (&mut taken.light, chosen.light),
                Tier::Medium => (&mut taken.medium, chosen.medium),
                Tier::Heavy => (&mut taken.heavy, chosen.heavy),
            };
            if *slot < limit {
                *slot += 1;
                items.push(PaperItem::from(question));
            }
        }

        let total_score: u32 = items.iter().map(|item| item.score).sum();
        debug_assert_eq!(total_score, target);

        Ok(Paper {
            total_score,
            realized_distribution: realized_distribution(&items, total_score),
            requested_distribution: request.requested_distribution.clone(),
            items,
            tier_counts: chosen,
        })
    }

    /// Enumerate heavy (outer) then medium (inner) counts, deriving light.
    /// The first combination with the smallest deviation wins.
    fn search(
        &self,
        target: u32,
        available: TierCounts,
        desired: TierCounts,
    ) -> Option<TierCounts> {
        let TierScores {
            light,
            medium,
            heavy,
        } = self.tiers;

        let mut best: Option<(TierCounts, u32)> = None;

        let max_heavy = available.heavy.min(target / heavy);
        for c_heavy in 0..=max_heavy {
            let after_heavy = target - c_heavy * heavy;
            let max_medium = available.medium.min(after_heavy / medium);
            for c_medium in 0..=max_medium {
                let rest = after_heavy - c_medium * medium;
                if rest % light != 0 {
                    continue;
                }
                let c_light = rest / light;
                if c_light > available.light {
                    continue;
                }

                let candidate = TierCounts::new(c_light, c_medium, c_heavy);
                let deviation = candidate.deviation(&desired);
                if best.is_none_or(|(_, d)| deviation < d) {
                    best = Some((candidate, deviation));
                }
            }
        }

        best.map(|(counts, _)| counts)
    }
}

fn count_tier(eligible: &[(&LabeledQuestion, Tier)], tier: Tier) -> u32 {
    eligible.iter().filter(|(_, t)| *t == tier).count() as u32
}

/// Fraction of the paper's score carried by each label.
fn realized_distribution(items: &[PaperItem], total: u32) -> BTreeMap<CognitiveLabel, f64> {
    let mut by_label: BTreeMap<CognitiveLabel, u32> =
        CognitiveLabel::ALL.into_iter().map(|label| (label, 0)).collect();
    for item in items {
        *by_label.entry(item.label).or_default() += item.score;
    }

    by_label
        .into_iter()
        .map(|(label, score)| {
            let fraction = if total == 0 {
                0.0
            } else {
                f64::from(score) / f64::from(total)
            };
            (label, fraction)
        })
        .collect()
}
