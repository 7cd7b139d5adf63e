//! Configuration Resolver: user-selected options in, canonical `ProjectionParameters` out.
//!
//! Every field is optional on the way in. Structural problems (non-positive
//! durations or steepness, unknown difficulty keys, caps below rank 1) are
//! rejected here so the engine never starts on a bad configuration.

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

use crate::forecast::ctr::{validate_curve, DEFAULT_CTR_CURVE};
use crate::forecast::models::{
    Difficulty, KeywordRow, PerDifficulty, PhaseDurations, ProjectionParameters, ScoringParams,
    VolMaxSource, VolumeMode, VolumeMultiplierParams,
};
use crate::forecast::ForecastError;

pub const DEFAULT_MONTHS_AHEAD: i64 = 12;
pub const MAX_MONTHS_AHEAD: i64 = 36;

pub const DEFAULT_PHASE_DURATIONS: PhaseDurations = PhaseDurations {
    t1: 2.0,
    t2: 3.0,
    t3: 4.0,
    t4: 6.0,
    k: 3.5,
};

pub const DEFAULT_DIFFICULTY_MULTIPLIERS: PerDifficulty<f64> = PerDifficulty {
    easy: 0.8,
    medium: 1.0,
    hard: 1.3,
    top10: 1.6,
    not_applicable: 1.0,
};

pub const DEFAULT_RANK_CAPS: PerDifficulty<Option<f64>> = PerDifficulty {
    easy: None,
    medium: None,
    hard: None,
    top10: None,
    not_applicable: None,
};

pub const DEFAULT_V_MIN: f64 = 0.8;
pub const DEFAULT_V_SPAN: f64 = 0.6;
pub const DEFAULT_M_MIN: f64 = 0.8;
pub const DEFAULT_M_MAX: f64 = 1.4;

pub const DEFAULT_SCORING: ScoringParams = ScoringParams {
    short_horizon_months: 3,
    quick_win_percentile: 0.75,
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PhaseDurationOptions {
    pub t1: Option<f64>,
    pub t2: Option<f64>,
    pub t3: Option<f64>,
    pub t4: Option<f64>,
    pub k: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeMultiplierOptions {
    pub v_min: Option<f64>,
    pub v_span: Option<f64>,
    pub m_min: Option<f64>,
    pub m_max: Option<f64>,
    pub vol_max: Option<VolMaxSource>,
}

/// Options as chosen by the user. Absent values take the documented defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ForecastOptions {
    pub months_ahead: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub mode: Option<VolumeMode>,
    /// Difficulty label → best reachable rank (`null` = no cap). Missing tiers are uncapped.
    pub rank_caps: Option<HashMap<String, Option<f64>>>,
    pub phase_durations: Option<PhaseDurationOptions>,
    /// Difficulty label → duration multiplier. Missing tiers keep their default.
    pub difficulty_multipliers: Option<HashMap<String, f64>>,
    pub volume_multiplier: Option<VolumeMultiplierOptions>,
    pub short_horizon_months: Option<u32>,
    pub quick_win_percentile: Option<f64>,
}

/// Resolves options against the validated rows.
///
/// `today` anchors the default start month; `ctr_values` is the opaque curve
/// handed in by the caller (built-in defaults when `None`).
pub fn resolve_parameters(
    options: &ForecastOptions,
    rows: &[KeywordRow],
    ctr_values: Option<&[f64]>,
    today: NaiveDate,
) -> Result<ProjectionParameters, ForecastError> {
    let months_ahead = options
        .months_ahead
        .unwrap_or(DEFAULT_MONTHS_AHEAD)
        .clamp(1, MAX_MONTHS_AHEAD) as u32;

    let start_date = first_of_month(options.start_date.unwrap_or(today));

    let ctr_values = match ctr_values {
        Some(values) => validate_curve(values)?,
        None => DEFAULT_CTR_CURVE,
    };

    let scoring = ScoringParams {
        short_horizon_months: options
            .short_horizon_months
            .unwrap_or(DEFAULT_SCORING.short_horizon_months)
            .max(1),
        quick_win_percentile: match options.quick_win_percentile {
            Some(p) if p.is_finite() && (0.0..=1.0).contains(&p) => p,
            Some(p) => {
                return Err(ForecastError::invalid(
                    "quick_win_percentile",
                    format!("must be within [0, 1], got {p}"),
                ))
            }
            None => DEFAULT_SCORING.quick_win_percentile,
        },
    };

    Ok(ProjectionParameters {
        months_ahead,
        start_date,
        mode: options.mode.unwrap_or(VolumeMode::Average),
        rank_caps: resolve_rank_caps(options.rank_caps.as_ref())?,
        phase_durations: resolve_phase_durations(options.phase_durations.as_ref())?,
        difficulty_multipliers: resolve_difficulty_multipliers(
            options.difficulty_multipliers.as_ref(),
        )?,
        volume_multiplier: resolve_volume_multiplier(options.volume_multiplier.as_ref(), rows)?,
        ctr_values,
        scoring,
    })
}

/// Maximum uploaded volume, or 1 when the dataset is empty or all-zero.
pub fn dataset_vol_max(rows: &[KeywordRow]) -> f64 {
    let max = rows
        .iter()
        .map(|r| r.volume)
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max);
    if max > 0.0 {
        max
    } else {
        1.0
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn require_positive(field: &str, value: f64) -> Result<f64, ForecastError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ForecastError::invalid(
            field,
            format!("must be a positive number, got {value}"),
        ))
    }
}

fn parse_tier(field: &str, label: &str) -> Result<Difficulty, ForecastError> {
    Difficulty::parse_strict(label).ok_or_else(|| {
        ForecastError::invalid(
            format!("{field}.{label}"),
            "unknown difficulty tier (expected Easy, Medium, Hard, Top10 or N/A)",
        )
    })
}

fn resolve_rank_caps(
    caps: Option<&HashMap<String, Option<f64>>>,
) -> Result<PerDifficulty<Option<f64>>, ForecastError> {
    let mut resolved = DEFAULT_RANK_CAPS;
    let Some(caps) = caps else {
        return Ok(resolved);
    };

    for (label, cap) in caps {
        let tier = parse_tier("rank_caps", label)?;
        let cap = match cap {
            Some(c) if c.is_finite() && *c >= 1.0 => Some(*c),
            Some(c) => {
                return Err(ForecastError::invalid(
                    format!("rank_caps.{label}"),
                    format!("cap must be a rank ≥ 1, got {c}"),
                ))
            }
            None => None,
        };
        *resolved.get_mut(tier) = cap;
    }
    Ok(resolved)
}

fn resolve_phase_durations(
    opts: Option<&PhaseDurationOptions>,
) -> Result<PhaseDurations, ForecastError> {
    let d = DEFAULT_PHASE_DURATIONS;
    let Some(o) = opts else {
        return Ok(d);
    };

    Ok(PhaseDurations {
        t1: require_positive("phase_durations.t1", o.t1.unwrap_or(d.t1))?,
        t2: require_positive("phase_durations.t2", o.t2.unwrap_or(d.t2))?,
        t3: require_positive("phase_durations.t3", o.t3.unwrap_or(d.t3))?,
        t4: require_positive("phase_durations.t4", o.t4.unwrap_or(d.t4))?,
        k: require_positive("phase_durations.k", o.k.unwrap_or(d.k))?,
    })
}

fn resolve_difficulty_multipliers(
    multipliers: Option<&HashMap<String, f64>>,
) -> Result<PerDifficulty<f64>, ForecastError> {
    let mut resolved = DEFAULT_DIFFICULTY_MULTIPLIERS;
    let Some(multipliers) = multipliers else {
        return Ok(resolved);
    };

    for (label, value) in multipliers {
        let tier = parse_tier("difficulty_multipliers", label)?;
        *resolved.get_mut(tier) =
            require_positive(&format!("difficulty_multipliers.{label}"), *value)?;
    }
    Ok(resolved)
}

fn resolve_volume_multiplier(
    opts: Option<&VolumeMultiplierOptions>,
    rows: &[KeywordRow],
) -> Result<VolumeMultiplierParams, ForecastError> {
    let default_opts = VolumeMultiplierOptions::default();
    let o = opts.unwrap_or(&default_opts);

    let v_min = o.v_min.unwrap_or(DEFAULT_V_MIN);
    let v_span = o.v_span.unwrap_or(DEFAULT_V_SPAN);
    if !v_min.is_finite() || !v_span.is_finite() {
        return Err(ForecastError::invalid(
            "volume_multiplier",
            "v_min and v_span must be finite",
        ));
    }
    let m_min = require_positive("volume_multiplier.m_min", o.m_min.unwrap_or(DEFAULT_M_MIN))?;
    let m_max = require_positive("volume_multiplier.m_max", o.m_max.unwrap_or(DEFAULT_M_MAX))?;
    if m_min > m_max {
        return Err(ForecastError::invalid(
            "volume_multiplier.m_min",
            format!("m_min ({m_min}) must not exceed m_max ({m_max})"),
        ));
    }

    let vol_max_source = o.vol_max.unwrap_or(VolMaxSource::Auto);
    let vol_max = match vol_max_source {
        VolMaxSource::Auto => dataset_vol_max(rows),
        VolMaxSource::Manual(v) => require_positive("volume_multiplier.vol_max", v)?,
    };

    Ok(VolumeMultiplierParams {
        v_min,
        v_span,
        m_min,
        m_max,
        vol_max_source,
        vol_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::models::{DEFAULT_CATEGORY, DEFAULT_INTENT};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 19).unwrap()
    }

    fn row(keyword: &str, volume: f64) -> KeywordRow {
        KeywordRow {
            keyword: keyword.to_string(),
            volume,
            difficulty: Difficulty::Medium,
            start_rank: 30.0,
            intent: DEFAULT_INTENT.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    #[test]
    fn test_defaults_are_applied() {
        let params =
            resolve_parameters(&ForecastOptions::default(), &[row("a", 500.0)], None, today())
                .unwrap();
        assert_eq!(params.months_ahead, 12);
        assert_eq!(params.start_date, NaiveDate::from_ymd_opt(2026, 10, 1).unwrap());
        assert_eq!(params.mode, VolumeMode::Average);
        assert_eq!(params.phase_durations, DEFAULT_PHASE_DURATIONS);
        assert_eq!(params.ctr_values, DEFAULT_CTR_CURVE);
        assert_eq!(params.volume_multiplier.vol_max, 500.0);
        assert_eq!(params.rank_caps, DEFAULT_RANK_CAPS);
    }

    #[test]
    fn test_months_ahead_is_clamped() {
        let mut opts = ForecastOptions {
            months_ahead: Some(99),
            ..Default::default()
        };
        let p = resolve_parameters(&opts, &[], None, today()).unwrap();
        assert_eq!(p.months_ahead, 36);

        opts.months_ahead = Some(0);
        let p = resolve_parameters(&opts, &[], None, today()).unwrap();
        assert_eq!(p.months_ahead, 1);
    }

    #[test]
    fn test_start_date_snaps_to_first_of_month() {
        let opts = ForecastOptions {
            start_date: NaiveDate::from_ymd_opt(2027, 3, 17),
            ..Default::default()
        };
        let p = resolve_parameters(&opts, &[], None, today()).unwrap();
        assert_eq!(p.start_date, NaiveDate::from_ymd_opt(2027, 3, 1).unwrap());
    }

    #[test]
    fn test_auto_vol_max_falls_back_to_one() {
        assert_eq!(dataset_vol_max(&[]), 1.0);
        assert_eq!(dataset_vol_max(&[row("a", 0.0), row("b", 0.0)]), 1.0);
        assert_eq!(dataset_vol_max(&[row("a", 10.0), row("b", 80.0)]), 80.0);
    }

    #[test]
    fn test_manual_vol_max_is_used() {
        let opts = ForecastOptions {
            volume_multiplier: Some(VolumeMultiplierOptions {
                vol_max: Some(VolMaxSource::Manual(10_000.0)),
                ..Default::default()
            }),
            ..Default::default()
        };
        let p = resolve_parameters(&opts, &[row("a", 50.0)], None, today()).unwrap();
        assert_eq!(p.volume_multiplier.vol_max, 10_000.0);
    }

    #[test]
    fn test_non_positive_steepness_is_rejected() {
        let opts = ForecastOptions {
            phase_durations: Some(PhaseDurationOptions {
                k: Some(0.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = resolve_parameters(&opts, &[], None, today()).unwrap_err();
        assert_eq!(err.field(), Some("phase_durations.k"));
    }

    #[test]
    fn test_non_positive_duration_is_rejected() {
        let opts = ForecastOptions {
            phase_durations: Some(PhaseDurationOptions {
                t3: Some(-1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = resolve_parameters(&opts, &[], None, today()).unwrap_err();
        assert_eq!(err.field(), Some("phase_durations.t3"));
    }

    #[test]
    fn test_rank_caps_resolve_by_label() {
        let mut caps = HashMap::new();
        caps.insert("medium".to_string(), Some(2.0));
        caps.insert("Top 10".to_string(), None);
        let opts = ForecastOptions {
            rank_caps: Some(caps),
            ..Default::default()
        };
        let p = resolve_parameters(&opts, &[], None, today()).unwrap();
        assert_eq!(p.rank_caps.medium, Some(2.0));
        assert_eq!(p.rank_caps.top10, None);
    }

    #[test]
    fn test_malformed_rank_caps_are_rejected() {
        let mut caps = HashMap::new();
        caps.insert("Impossible".to_string(), Some(2.0));
        let opts = ForecastOptions {
            rank_caps: Some(caps),
            ..Default::default()
        };
        assert!(resolve_parameters(&opts, &[], None, today()).is_err());

        let mut caps = HashMap::new();
        caps.insert("Hard".to_string(), Some(0.5));
        let opts = ForecastOptions {
            rank_caps: Some(caps),
            ..Default::default()
        };
        let err = resolve_parameters(&opts, &[], None, today()).unwrap_err();
        assert_eq!(err.field(), Some("rank_caps.Hard"));
    }

    #[test]
    fn test_difficulty_multiplier_overrides() {
        let mut mults = HashMap::new();
        mults.insert("Hard".to_string(), 2.0);
        let opts = ForecastOptions {
            difficulty_multipliers: Some(mults),
            ..Default::default()
        };
        let p = resolve_parameters(&opts, &[], None, today()).unwrap();
        assert_eq!(p.difficulty_multipliers.hard, 2.0);
        assert_eq!(p.difficulty_multipliers.easy, DEFAULT_DIFFICULTY_MULTIPLIERS.easy);
    }

    #[test]
    fn test_inverted_multiplier_bounds_are_rejected() {
        let opts = ForecastOptions {
            volume_multiplier: Some(VolumeMultiplierOptions {
                m_min: Some(2.0),
                m_max: Some(1.0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(resolve_parameters(&opts, &[], None, today()).is_err());
    }

    #[test]
    fn test_custom_ctr_curve_is_validated() {
        let bad = vec![0.5; 19];
        assert!(resolve_parameters(&ForecastOptions::default(), &[], Some(&bad), today()).is_err());

        let good = vec![0.05; 20];
        let p = resolve_parameters(&ForecastOptions::default(), &[], Some(&good), today()).unwrap();
        assert_eq!(p.ctr_values, [0.05; 20]);
    }

    #[test]
    fn test_quick_win_percentile_bounds() {
        let opts = ForecastOptions {
            quick_win_percentile: Some(1.5),
            ..Default::default()
        };
        assert!(resolve_parameters(&opts, &[], None, today()).is_err());
    }
}
