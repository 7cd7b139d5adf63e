//! Typed data model shared by every stage of the forecast pipeline.
//!
//! Rows and parameters are built once per request and never mutated afterwards;
//! projections and aggregates are derived values.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const DEFAULT_START_RANK: f64 = 100.0;
pub const DEFAULT_INTENT: &str = "Unknown";
pub const DEFAULT_CATEGORY: &str = "Uncategorized";

/// Case-folded, trimmed keyword text. Used for deduplication and as the
/// lookup key into the seasonal volume store.
pub fn normalize_keyword(keyword: &str) -> String {
    keyword.trim().to_lowercase()
}

// ────────────────────────────────────────────────────────────────────────────
// Keyword rows
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
    Top10,
    #[serde(rename = "N/A")]
    NotApplicable,
}

impl Difficulty {
    /// Lenient parse of an uploaded difficulty cell. Anything unrecognised is `N/A`.
    pub fn parse(raw: &str) -> Self {
        Self::parse_strict(raw).unwrap_or(Difficulty::NotApplicable)
    }

    /// Parse that rejects unknown labels. Used for configuration keys.
    pub fn parse_strict(raw: &str) -> Option<Self> {
        let folded: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect();

        match folded.as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            "top10" => Some(Difficulty::Top10),
            "n/a" | "na" | "notapplicable" | "" | "unknown" => Some(Difficulty::NotApplicable),
            _ => None,
        }
    }
}

/// A validated keyword row. Immutable once produced by the validator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRow {
    pub keyword: String,
    pub volume: f64,
    pub difficulty: Difficulty,
    pub start_rank: f64,
    pub intent: String,
    pub category: String,
}

impl KeywordRow {
    pub fn normalized_key(&self) -> String {
        normalize_keyword(&self.keyword)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Projection parameters
// ────────────────────────────────────────────────────────────────────────────

/// One value per difficulty tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerDifficulty<T> {
    pub easy: T,
    pub medium: T,
    pub hard: T,
    pub top10: T,
    pub not_applicable: T,
}

impl<T> PerDifficulty<T> {
    pub fn get(&self, difficulty: Difficulty) -> &T {
        match difficulty {
            Difficulty::Easy => &self.easy,
            Difficulty::Medium => &self.medium,
            Difficulty::Hard => &self.hard,
            Difficulty::Top10 => &self.top10,
            Difficulty::NotApplicable => &self.not_applicable,
        }
    }

    pub fn get_mut(&mut self, difficulty: Difficulty) -> &mut T {
        match difficulty {
            Difficulty::Easy => &mut self.easy,
            Difficulty::Medium => &mut self.medium,
            Difficulty::Hard => &mut self.hard,
            Difficulty::Top10 => &mut self.top10,
            Difficulty::NotApplicable => &mut self.not_applicable,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeMode {
    Average,
    Seasonal,
}

/// Base months to cross each of the four phases, plus the shared curve steepness.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseDurations {
    pub t1: f64,
    pub t2: f64,
    pub t3: f64,
    pub t4: f64,
    pub k: f64,
}

impl PhaseDurations {
    pub fn base(&self) -> [f64; 4] {
        [self.t1, self.t2, self.t3, self.t4]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", content = "value", rename_all = "snake_case")]
pub enum VolMaxSource {
    /// Maximum uploaded volume in the dataset.
    Auto,
    Manual(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeMultiplierParams {
    pub v_min: f64,
    pub v_span: f64,
    pub m_min: f64,
    pub m_max: f64,
    pub vol_max_source: VolMaxSource,
    /// Resolved denominator volume. Always ≥ 1.
    pub vol_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringParams {
    /// Months counted as the short horizon for scoring (months 1..=n).
    pub short_horizon_months: u32,
    /// Percentile (0–1) of short-horizon uplift a keyword must reach to be a quick win.
    pub quick_win_percentile: f64,
}

/// Canonical, fully-defaulted parameters for one calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionParameters {
    pub months_ahead: u32,
    pub start_date: NaiveDate,
    pub mode: VolumeMode,
    /// Best reachable rank per tier. `None` means no cap.
    pub rank_caps: PerDifficulty<Option<f64>>,
    pub phase_durations: PhaseDurations,
    pub difficulty_multipliers: PerDifficulty<f64>,
    pub volume_multiplier: VolumeMultiplierParams,
    pub ctr_values: [f64; 20],
    pub scoring: ScoringParams,
}

// ────────────────────────────────────────────────────────────────────────────
// Volume series
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeSourceTag {
    /// Matched external seasonal data.
    Cache,
    /// Seasonal mode, but the uploaded average was repeated for all months.
    Fallback,
    /// Average mode; seasonal lookup bypassed.
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonthlyVolumeSeries {
    /// Indexed by calendar month 0–11.
    Seasonal {
        monthly_volumes: [f64; 12],
        source: VolumeSourceTag,
    },
    Flat(f64),
}

impl MonthlyVolumeSeries {
    pub fn fallback(volume: f64) -> Self {
        MonthlyVolumeSeries::Seasonal {
            monthly_volumes: [volume; 12],
            source: VolumeSourceTag::Fallback,
        }
    }

    pub fn volume_for(&self, calendar_month0: u32) -> f64 {
        match self {
            MonthlyVolumeSeries::Seasonal {
                monthly_volumes, ..
            } => monthly_volumes[(calendar_month0 % 12) as usize],
            MonthlyVolumeSeries::Flat(volume) => *volume,
        }
    }

    pub fn source(&self) -> VolumeSourceTag {
        match self {
            MonthlyVolumeSeries::Seasonal { source, .. } => *source,
            MonthlyVolumeSeries::Flat(_) => VolumeSourceTag::Flat,
        }
    }

    pub fn twelve_months(&self) -> [f64; 12] {
        match self {
            MonthlyVolumeSeries::Seasonal {
                monthly_volumes, ..
            } => *monthly_volumes,
            MonthlyVolumeSeries::Flat(volume) => [*volume; 12],
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Results
// ────────────────────────────────────────────────────────────────────────────

/// One row per (keyword, projection month). The unit the aggregator consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMonthProjection {
    pub keyword: String,
    pub category: String,
    pub intent: String,
    pub difficulty: Difficulty,
    /// 1-based month in the horizon.
    pub month_index: u32,
    pub month_start: NaiveDate,
    pub predicted_rank: f64,
    pub expected_ctr: f64,
    pub monthly_volume: f64,
    pub expected_visits: f64,
    pub baseline_visits: f64,
    pub uplift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub month_index: u32,
    pub month_start: NaiveDate,
    pub baseline_visits: f64,
    pub projected_visits: f64,
    pub uplift: f64,
}

/// Month totals for one category or intent bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAggregate {
    pub group: String,
    pub month_index: u32,
    pub month_start: NaiveDate,
    pub baseline_visits: f64,
    pub projected_visits: f64,
    pub uplift: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordSummary {
    pub keyword: String,
    pub difficulty: Difficulty,
    pub start_rank: f64,
    pub final_rank: f64,
    pub baseline_visits: f64,
    pub projected_visits: f64,
    pub uplift: f64,
    pub short_horizon_uplift: f64,
    /// 0–10.
    pub opportunity_score: u8,
    pub quick_win: bool,
    pub volume_source: VolumeSourceTag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeDebugRow {
    pub keyword: String,
    pub normalized_keyword: String,
    pub monthly_volumes: Vec<f64>,
    pub source: VolumeSourceTag,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionResults {
    pub detailed: Vec<KeywordMonthProjection>,
    pub monthly: Vec<MonthlyAggregate>,
    pub by_category: Vec<GroupAggregate>,
    pub by_intent: Vec<GroupAggregate>,
    pub keywords: Vec<KeywordSummary>,
    pub total_baseline_sum: f64,
    pub total_projected_sum: f64,
    pub total_uplift_sum: f64,
    /// `total_uplift_sum / total_baseline_sum`, or 0 when there is no baseline.
    pub uplift_percentage: f64,
    pub seasonal_volume_debug: Vec<VolumeDebugRow>,
}
