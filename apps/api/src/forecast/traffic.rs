//! Traffic & Uplift Calculator.
//!
//! `expected = volume(month) × CTR(predicted rank)`, `baseline = volume(month) × CTR(start rank)`.
//! The baseline rank is frozen for every month so uplift isolates rank movement
//! from volume seasonality.

use chrono::{Datelike, Months, NaiveDate};

use crate::forecast::ctr::interpolate_ctr;
use crate::forecast::models::{
    KeywordMonthProjection, KeywordRow, MonthlyVolumeSeries, ProjectionParameters,
};
use crate::forecast::progression::RankTrajectory;

/// Visits for one month at a given CTR. Never negative.
pub fn visits(volume: f64, ctr: f64) -> f64 {
    (volume * ctr).max(0.0)
}

/// First day of the `month_index`-th projection month (1-based).
pub fn month_start(start_date: NaiveDate, month_index: u32) -> NaiveDate {
    start_date
        .checked_add_months(Months::new(month_index.saturating_sub(1)))
        .unwrap_or(start_date)
}

/// Full month-by-month projection for one keyword.
///
/// Pure: depends only on the row, the resolved parameters and the keyword's
/// volume series, so keywords can be projected independently.
pub fn project_keyword(
    row: &KeywordRow,
    params: &ProjectionParameters,
    series: &MonthlyVolumeSeries,
) -> Vec<KeywordMonthProjection> {
    let trajectory = RankTrajectory::new(row, params);
    let baseline_ctr = interpolate_ctr(row.start_rank, &params.ctr_values);

    (1..=params.months_ahead)
        .map(|month_index| {
            let month_start = month_start(params.start_date, month_index);
            let monthly_volume = series.volume_for(month_start.month0());
            let predicted_rank = trajectory.rank_at(month_index as f64);
            let expected_ctr = interpolate_ctr(predicted_rank, &params.ctr_values);
            let expected_visits = visits(monthly_volume, expected_ctr);
            let baseline_visits = visits(monthly_volume, baseline_ctr);

            KeywordMonthProjection {
                keyword: row.keyword.clone(),
                category: row.category.clone(),
                intent: row.intent.clone(),
                difficulty: row.difficulty,
                month_index,
                month_start,
                predicted_rank,
                expected_ctr,
                monthly_volume,
                expected_visits,
                baseline_visits,
                uplift: expected_visits - baseline_visits,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::models::{Difficulty, VolumeSourceTag, DEFAULT_CATEGORY, DEFAULT_INTENT};
    use crate::forecast::params::{resolve_parameters, ForecastOptions};

    fn row(start_rank: f64) -> KeywordRow {
        KeywordRow {
            keyword: "hiking boots".to_string(),
            volume: 1200.0,
            difficulty: Difficulty::Medium,
            start_rank,
            intent: DEFAULT_INTENT.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    fn params(months: i64, start: NaiveDate) -> ProjectionParameters {
        let opts = ForecastOptions {
            months_ahead: Some(months),
            start_date: Some(start),
            ..Default::default()
        };
        resolve_parameters(&opts, &[row(30.0)], None, start).unwrap()
    }

    #[test]
    fn test_month_start_rolls_over_year() {
        let start = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        assert_eq!(month_start(start, 1), start);
        assert_eq!(month_start(start, 3), NaiveDate::from_ymd_opt(2027, 1, 1).unwrap());
    }

    #[test]
    fn test_uplift_is_expected_minus_baseline() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let p = params(6, start);
        let rows = project_keyword(&row(30.0), &p, &MonthlyVolumeSeries::Flat(1200.0));
        assert_eq!(rows.len(), 6);
        for r in &rows {
            assert!((r.uplift - (r.expected_visits - r.baseline_visits)).abs() < 1e-9);
            assert!(r.expected_visits >= 0.0);
            assert_eq!(r.monthly_volume, 1200.0);
        }
    }

    #[test]
    fn test_baseline_uses_frozen_start_rank() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let p = params(4, start);
        let rows = project_keyword(&row(12.0), &p, &MonthlyVolumeSeries::Flat(1000.0));
        let expected = 1000.0 * interpolate_ctr(12.0, &p.ctr_values);
        assert!(rows.iter().all(|r| (r.baseline_visits - expected).abs() < 1e-9));
    }

    #[test]
    fn test_seasonal_volumes_follow_calendar_month() {
        let start = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        let p = params(3, start);
        let mut monthly = [100.0; 12];
        monthly[10] = 500.0; // November
        monthly[0] = 50.0; // January
        let series = MonthlyVolumeSeries::Seasonal {
            monthly_volumes: monthly,
            source: VolumeSourceTag::Cache,
        };
        let rows = project_keyword(&row(30.0), &p, &series);
        let volumes: Vec<f64> = rows.iter().map(|r| r.monthly_volume).collect();
        assert_eq!(volumes, vec![500.0, 100.0, 50.0]);
    }

    #[test]
    fn test_zero_volume_gives_zero_visits() {
        let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let p = params(2, start);
        let rows = project_keyword(&row(30.0), &p, &MonthlyVolumeSeries::Flat(0.0));
        assert!(rows.iter().all(|r| r.expected_visits == 0.0 && r.uplift == 0.0));
    }
}
