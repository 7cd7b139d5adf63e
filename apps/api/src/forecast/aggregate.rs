//! Aggregation & Scoring Engine.
//!
//! Reduces the (keyword × month) matrix into monthly, category and intent
//! totals, scalar totals, and a per-keyword opportunity score and quick-win flag.
//! All reductions are sums and group-bys keyed in `BTreeMap`s, so output order
//! does not depend on input order.

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::forecast::models::{
    Difficulty, GroupAggregate, KeywordMonthProjection, KeywordRow, KeywordSummary,
    MonthlyAggregate, MonthlyVolumeSeries, ProjectionResults, ScoringParams, VolumeDebugRow,
};

/// Everything the aggregator needs to know about one keyword.
#[derive(Debug, Clone)]
pub struct KeywordProjection {
    pub row: KeywordRow,
    pub series: MonthlyVolumeSeries,
    pub months: Vec<KeywordMonthProjection>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    baseline: f64,
    projected: f64,
    uplift: f64,
}

impl Totals {
    fn add(&mut self, row: &KeywordMonthProjection) {
        self.baseline += row.baseline_visits;
        self.projected += row.expected_visits;
        self.uplift += row.uplift;
    }
}

pub fn aggregate(projections: Vec<KeywordProjection>, scoring: &ScoringParams) -> ProjectionResults {
    let keywords = score_keywords(&projections, scoring);
    let seasonal_volume_debug = projections.iter().map(volume_debug_row).collect();

    let detailed: Vec<KeywordMonthProjection> = projections
        .into_iter()
        .flat_map(|p| p.months)
        .collect();

    let monthly = monthly_totals(&detailed);
    let by_category = group_totals(&detailed, |r| r.category.as_str());
    let by_intent = group_totals(&detailed, |r| r.intent.as_str());

    let total_baseline_sum: f64 = monthly.iter().map(|m| m.baseline_visits).sum();
    let total_projected_sum: f64 = monthly.iter().map(|m| m.projected_visits).sum();
    let total_uplift_sum: f64 = monthly.iter().map(|m| m.uplift).sum();

    ProjectionResults {
        detailed,
        monthly,
        by_category,
        by_intent,
        keywords,
        total_baseline_sum,
        total_projected_sum,
        total_uplift_sum,
        uplift_percentage: uplift_percentage(total_uplift_sum, total_baseline_sum),
        seasonal_volume_debug,
    }
}

/// `uplift / baseline`, or 0 when there is no positive baseline.
pub fn uplift_percentage(total_uplift: f64, total_baseline: f64) -> f64 {
    if total_baseline > 0.0 {
        total_uplift / total_baseline
    } else {
        0.0
    }
}

pub fn monthly_totals(detailed: &[KeywordMonthProjection]) -> Vec<MonthlyAggregate> {
    let mut months: BTreeMap<u32, (NaiveDate, Totals)> = BTreeMap::new();
    for row in detailed {
        months
            .entry(row.month_index)
            .or_insert((row.month_start, Totals::default()))
            .1
            .add(row);
    }

    months
        .into_iter()
        .map(|(month_index, (month_start, t))| MonthlyAggregate {
            month_index,
            month_start,
            baseline_visits: t.baseline,
            projected_visits: t.projected,
            uplift: t.uplift,
        })
        .collect()
}

pub fn group_totals<F>(detailed: &[KeywordMonthProjection], key: F) -> Vec<GroupAggregate>
where
    F: Fn(&KeywordMonthProjection) -> &str,
{
    let mut groups: BTreeMap<(String, u32), (NaiveDate, Totals)> = BTreeMap::new();
    for row in detailed {
        groups
            .entry((key(row).to_string(), row.month_index))
            .or_insert((row.month_start, Totals::default()))
            .1
            .add(row);
    }

    groups
        .into_iter()
        .map(|((group, month_index), (month_start, t))| GroupAggregate {
            group,
            month_index,
            month_start,
            baseline_visits: t.baseline,
            projected_visits: t.projected,
            uplift: t.uplift,
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Scoring
// ────────────────────────────────────────────────────────────────────────────

/// Score multiplier per tier. Harder keywords score lower for the same uplift.
pub fn difficulty_penalty(difficulty: Difficulty) -> f64 {
    match difficulty {
        Difficulty::Easy => 1.0,
        Difficulty::Medium => 0.85,
        Difficulty::NotApplicable => 0.8,
        Difficulty::Hard => 0.65,
        Difficulty::Top10 => 0.5,
    }
}

pub fn is_quick_win_tier(difficulty: Difficulty) -> bool {
    matches!(difficulty, Difficulty::Easy | Difficulty::Medium)
}

/// Linear-interpolated percentile (`p` in [0, 1]) of `values`. 0 for an empty slice.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if sorted.is_empty() {
        return 0.0;
    }
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let pos = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Opportunity score 0–10.
///
/// Short-horizon uplift is log-normalized against the dataset's largest
/// short-horizon uplift, then scaled by the difficulty penalty.
pub fn opportunity_score(short_uplift: f64, max_short_uplift: f64, difficulty: Difficulty) -> u8 {
    if short_uplift <= 0.0 || max_short_uplift <= 0.0 {
        return 0;
    }
    let normalized = (1.0 + short_uplift).ln() / (1.0 + max_short_uplift).ln();
    (10.0 * normalized.clamp(0.0, 1.0) * difficulty_penalty(difficulty))
        .round()
        .clamp(0.0, 10.0) as u8
}

fn short_horizon_uplift(months: &[KeywordMonthProjection], horizon: u32) -> f64 {
    months
        .iter()
        .filter(|m| m.month_index <= horizon)
        .map(|m| m.uplift)
        .sum()
}

pub fn score_keywords(
    projections: &[KeywordProjection],
    scoring: &ScoringParams,
) -> Vec<KeywordSummary> {
    let short: Vec<f64> = projections
        .iter()
        .map(|p| short_horizon_uplift(&p.months, scoring.short_horizon_months))
        .collect();

    let max_short = short.iter().copied().fold(0.0_f64, f64::max);
    let positive: Vec<f64> = short.iter().copied().filter(|v| *v > 0.0).collect();
    let quick_win_threshold = percentile(&positive, scoring.quick_win_percentile);

    projections
        .iter()
        .zip(short.iter())
        .map(|(p, &short_uplift)| {
            let mut totals = Totals::default();
            for m in &p.months {
                totals.add(m);
            }
            let final_rank = p
                .months
                .last()
                .map(|m| m.predicted_rank)
                .unwrap_or(p.row.start_rank);

            KeywordSummary {
                keyword: p.row.keyword.clone(),
                difficulty: p.row.difficulty,
                start_rank: p.row.start_rank,
                final_rank,
                baseline_visits: totals.baseline,
                projected_visits: totals.projected,
                uplift: totals.uplift,
                short_horizon_uplift: short_uplift,
                opportunity_score: opportunity_score(short_uplift, max_short, p.row.difficulty),
                quick_win: is_quick_win_tier(p.row.difficulty)
                    && short_uplift > 0.0
                    && short_uplift >= quick_win_threshold,
                volume_source: p.series.source(),
            }
        })
        .collect()
}

fn volume_debug_row(p: &KeywordProjection) -> VolumeDebugRow {
    VolumeDebugRow {
        keyword: p.row.keyword.clone(),
        normalized_keyword: p.row.normalized_key(),
        monthly_volumes: p.series.twelve_months().to_vec(),
        source: p.series.source(),
    }
}
