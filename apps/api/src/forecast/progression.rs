//! Rank Progression Model: predicted rank for every elapsed month.
//!
//! # Model
//! A trajectory crosses four phases bounded by the milestones `100 → 50 → 20 → 10 → 1`.
//! Inside a phase, normalized time `t ∈ [0, 1]` maps to rank through an ease-out
//! power curve on the log-rank distance between the phase bounds:
//!
//! ```text
//! rank(t) = r_start · (r_end / r_start) ^ g(t),   g(t) = 1 − (1 − t)^k
//! ```
//!
//! Effective phase durations are the base durations scaled by a difficulty
//! multiplier and a volume multiplier. Time left over after finishing a phase
//! carries into the next one. Rank caps clamp the result from below.

use crate::forecast::models::{KeywordRow, ProjectionParameters, VolumeMultiplierParams};

pub const RANK_MILESTONES: [f64; 5] = [100.0, 50.0, 20.0, 10.0, 1.0];
pub const PHASE_COUNT: usize = 4;

/// g(t) = 1 − (1 − t)^k, with t clamped to [0, 1].
pub fn ease_out(t: f64, k: f64) -> f64 {
    1.0 - (1.0 - t.clamp(0.0, 1.0)).powf(k)
}

/// Inverse of [`ease_out`]: t = 1 − (1 − g)^(1/k).
pub fn ease_out_inverse(g: f64, k: f64) -> f64 {
    1.0 - (1.0 - g.clamp(0.0, 1.0)).powf(1.0 / k)
}

/// Rank at normalized time `t` inside the phase `(r_start, r_end)`.
pub fn phase_rank(r_start: f64, r_end: f64, t: f64, k: f64) -> f64 {
    r_start * (r_end / r_start).powf(ease_out(t, k))
}

/// `m_v = clamp(vMin + vSpan · log10(1 + volume) / log10(1 + volMax), mMin, mMax)`.
pub fn volume_multiplier(volume: f64, params: &VolumeMultiplierParams) -> f64 {
    let volume = if volume.is_finite() { volume.max(0.0) } else { 0.0 };
    let vol_max = params.vol_max.max(1.0);
    let ratio = (1.0 + volume).log10() / (1.0 + vol_max).log10();
    (params.v_min + params.v_span * ratio).clamp(params.m_min, params.m_max)
}

/// Phase index and normalized time for a rank, or `None` once rank 1 is reached.
/// Ranks worse than 100 enter phase 1 at its start.
pub fn locate(rank: f64, k: f64) -> Option<(usize, f64)> {
    if rank <= RANK_MILESTONES[PHASE_COUNT] {
        return None;
    }
    if rank >= RANK_MILESTONES[0] {
        return Some((0, 0.0));
    }

    let phase = (0..PHASE_COUNT)
        .find(|&i| rank <= RANK_MILESTONES[i] && rank > RANK_MILESTONES[i + 1])
        .unwrap_or(PHASE_COUNT - 1);

    let (r_start, r_end) = (RANK_MILESTONES[phase], RANK_MILESTONES[phase + 1]);
    let g0 = (rank / r_start).ln() / (r_end / r_start).ln();
    Some((phase, ease_out_inverse(g0, k)))
}

/// Precomputed trajectory for a single keyword.
#[derive(Debug, Clone)]
pub struct RankTrajectory {
    origin: Option<(usize, f64)>,
    durations: [f64; PHASE_COUNT],
    k: f64,
    floor: f64,
}

impl RankTrajectory {
    pub fn new(row: &KeywordRow, params: &ProjectionParameters) -> Self {
        let k = params.phase_durations.k;
        let scale = params.difficulty_multipliers.get(row.difficulty)
            * volume_multiplier(row.volume, &params.volume_multiplier);
        let durations = params.phase_durations.base().map(|t| t * scale);

        let start = row.start_rank.clamp(RANK_MILESTONES[PHASE_COUNT], RANK_MILESTONES[0]);
        // A cap never pushes a keyword behind where it already ranks.
        let floor = params
            .rank_caps
            .get(row.difficulty)
            .unwrap_or(RANK_MILESTONES[PHASE_COUNT])
            .min(start);

        Self {
            origin: locate(start, k),
            durations,
            k,
            floor,
        }
    }

    /// Uncapped rank after `elapsed` months.
    pub fn raw_rank_at(&self, elapsed: f64) -> f64 {
        let Some((mut phase, mut t)) = self.origin else {
            return RANK_MILESTONES[PHASE_COUNT];
        };
        let mut remaining = elapsed.max(0.0);

        loop {
            let duration = self.durations[phase];
            let to_finish = (1.0 - t) * duration;
            if remaining < to_finish {
                t += remaining / duration;
                return phase_rank(
                    RANK_MILESTONES[phase],
                    RANK_MILESTONES[phase + 1],
                    t,
                    self.k,
                );
            }
            remaining -= to_finish;
            phase += 1;
            t = 0.0;
            if phase == PHASE_COUNT {
                return RANK_MILESTONES[PHASE_COUNT];
            }
        }
    }

    /// Capped rank after `elapsed` months.
    pub fn rank_at(&self, elapsed: f64) -> f64 {
        self.raw_rank_at(elapsed).max(self.floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::models::{Difficulty, DEFAULT_CATEGORY, DEFAULT_INTENT};
    use crate::forecast::params::{resolve_parameters, ForecastOptions, PhaseDurationOptions};
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn project_ranks(row: &KeywordRow, params: &ProjectionParameters) -> Vec<f64> {
        let trajectory = RankTrajectory::new(row, params);
        (1..=params.months_ahead)
            .map(|m| trajectory.rank_at(m as f64))
            .collect()
    }

    fn row(volume: f64, difficulty: Difficulty, start_rank: f64) -> KeywordRow {
        KeywordRow {
            keyword: "shoes".to_string(),
            volume,
            difficulty,
            start_rank,
            intent: DEFAULT_INTENT.to_string(),
            category: DEFAULT_CATEGORY.to_string(),
        }
    }

    fn params_for(rows: &[KeywordRow], options: ForecastOptions) -> ProjectionParameters {
        let today = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        resolve_parameters(&options, rows, None, today).unwrap()
    }

    #[test]
    fn test_ease_out_endpoints_and_inverse() {
        assert_eq!(ease_out(0.0, 3.5), 0.0);
        assert_eq!(ease_out(1.0, 3.5), 1.0);
        for &t in &[0.1, 0.35, 0.6, 0.9] {
            let g = ease_out(t, 2.7);
            assert!((ease_out_inverse(g, 2.7) - t).abs() < 1e-9);
        }
    }

    #[test]
    fn test_steeper_curve_moves_faster_early() {
        assert!(ease_out(0.1, 5.0) > ease_out(0.1, 1.5));
    }

    #[test]
    fn test_locate_inverts_phase_rank() {
        for &rank in &[80.0, 50.0, 33.0, 12.5, 4.0] {
            let (phase, t0) = locate(rank, 3.5).unwrap();
            let back = phase_rank(RANK_MILESTONES[phase], RANK_MILESTONES[phase + 1], t0, 3.5);
            assert!((back - rank).abs() < 1e-9, "rank {rank} came back as {back}");
        }
        assert_eq!(locate(1.0, 3.5), None);
        assert_eq!(locate(250.0, 3.5), Some((0, 0.0)));
        assert_eq!(locate(50.0, 3.5).map(|(p, _)| p), Some(1));
    }

    #[test]
    fn test_volume_multiplier_stays_in_bounds() {
        let rows = [row(1000.0, Difficulty::Easy, 50.0)];
        let p = params_for(&rows, ForecastOptions::default()).volume_multiplier;
        for &v in &[0.0, 1.0, 10.0, 999.0, 1000.0, 1e12, -5.0, f64::INFINITY] {
            let m = volume_multiplier(v, &p);
            assert!(m >= p.m_min && m <= p.m_max, "volume {v} gave {m}");
        }
    }

    #[test]
    fn test_higher_volume_progresses_slower() {
        let rows = [row(10.0, Difficulty::Medium, 60.0), row(50_000.0, Difficulty::Medium, 60.0)];
        let params = params_for(&rows, ForecastOptions::default());
        let low = project_ranks(&rows[0], &params);
        let high = project_ranks(&rows[1], &params);
        assert!(low[2] < high[2]);
    }

    #[test]
    fn test_harder_keywords_progress_slower() {
        let rows = [row(100.0, Difficulty::Easy, 60.0), row(100.0, Difficulty::Top10, 60.0)];
        let params = params_for(&rows, ForecastOptions::default());
        assert!(project_ranks(&rows[0], &params)[3] < project_ranks(&rows[1], &params)[3]);
    }

    #[test]
    fn test_rank_never_regresses() {
        let rows = [
            row(500.0, Difficulty::Hard, 100.0),
            row(20.0, Difficulty::Easy, 7.3),
            row(9_000.0, Difficulty::NotApplicable, 180.0),
            row(0.0, Difficulty::Medium, 19.9),
        ];
        let params = params_for(
            &rows,
            ForecastOptions {
                months_ahead: Some(36),
                ..Default::default()
            },
        );
        for r in &rows {
            let ranks = project_ranks(r, &params);
            assert!(ranks.windows(2).all(|w| w[1] <= w[0] + 1e-12));
            assert!(ranks.iter().all(|&x| x >= 1.0));
        }
    }

    #[test]
    fn test_rank_one_never_moves() {
        let rows = [row(800.0, Difficulty::Easy, 1.0)];
        let params = params_for(&rows, ForecastOptions::default());
        assert!(project_ranks(&rows[0], &params).iter().all(|&r| r == 1.0));
    }

    #[test]
    fn test_shoes_scenario_progresses_through_phase_one() {
        let rows = [row(1000.0, Difficulty::Easy, 80.0)];
        let params = params_for(
            &rows,
            ForecastOptions {
                months_ahead: Some(3),
                phase_durations: Some(PhaseDurationOptions {
                    t1: Some(1.0),
                    k: Some(3.5),
                    ..Default::default()
                }),
                ..Default::default()
            },
        );
        let ranks = project_ranks(&rows[0], &params);
        assert_eq!(ranks.len(), 3);
        assert!(ranks[0] < 80.0);
        assert!(ranks[0] > ranks[1] && ranks[1] > ranks[2]);
        assert!((ranks[2] - 50.0).abs() < (ranks[2] - 80.0).abs());
    }

    #[test]
    fn test_rank_cap_is_respected() {
        let rows = [row(100.0, Difficulty::Medium, 40.0)];
        let mut caps = HashMap::new();
        caps.insert("Medium".to_string(), Some(2.0));
        let params = params_for(
            &rows,
            ForecastOptions {
                months_ahead: Some(36),
                rank_caps: Some(caps),
                phase_durations: Some(PhaseDurationOptions {
                    t1: Some(0.5),
                    t2: Some(0.5),
                    t3: Some(0.5),
                    t4: Some(0.5),
                    k: None,
                }),
                ..Default::default()
            },
        );
        let ranks = project_ranks(&rows[0], &params);
        assert!(ranks.iter().all(|&r| r >= 2.0));
        assert_eq!(*ranks.last().unwrap(), 2.0);
    }

    #[test]
    fn test_cap_above_start_rank_does_not_regress() {
        let rows = [row(100.0, Difficulty::Hard, 3.0)];
        let mut caps = HashMap::new();
        caps.insert("Hard".to_string(), Some(5.0));
        let params = params_for(
            &rows,
            ForecastOptions {
                rank_caps: Some(caps),
                ..Default::default()
            },
        );
        assert!(project_ranks(&rows[0], &params).iter().all(|&r| r == 3.0));
    }

    #[test]
    fn test_uncapped_keyword_converges_to_one() {
        let rows = [row(10.0, Difficulty::Easy, 90.0)];
        let params = params_for(
            &rows,
            ForecastOptions {
                months_ahead: Some(36),
                ..Default::default()
            },
        );
        assert_eq!(*project_ranks(&rows[0], &params).last().unwrap(), 1.0);
    }

    #[test]
    fn test_effective_durations_scale_with_multipliers() {
        let rows = [row(1000.0, Difficulty::Hard, 50.0)];
        let params = params_for(&rows, ForecastOptions::default());
        let traj = RankTrajectory::new(&rows[0], &params);
        let scale = params.difficulty_multipliers.hard
            * volume_multiplier(1000.0, &params.volume_multiplier);
        let base = params.phase_durations.base();
        for (eff, b) in traj.durations.iter().zip(base.iter()) {
            assert!((eff - b * scale).abs() < 1e-12);
        }
    }
}
