//! CTR Interpolator: maps a continuous rank to an expected click-through rate.
//!
//! The curve holds one CTR fraction per position 1..=20. Between positions the
//! value is linearly interpolated; outside the curve it holds the nearest end value.

use serde::{Deserialize, Serialize};

use crate::forecast::ForecastError;

pub const CTR_POSITIONS: usize = 20;

/// Built-in organic CTR by position, used when the caller supplies no curve.
pub const DEFAULT_CTR_CURVE: [f64; CTR_POSITIONS] = [
    0.3168, 0.2466, 0.1866, 0.1338, 0.0951, 0.0622, 0.0443, 0.0313, 0.0255, 0.0240, // 1-10
    0.0102, 0.0093, 0.0084, 0.0076, 0.0068, 0.0060, 0.0052, 0.0045, 0.0039, 0.0033, // 11-20
];

/// Expected CTR for a (possibly fractional) rank.
///
/// - rank ≤ 1 → position-1 value
/// - rank ≥ 20 → position-20 value (the tail is held, never extrapolated to zero)
/// - otherwise linear between `floor(rank)` and `ceil(rank)`
pub fn interpolate_ctr(rank: f64, curve: &[f64; CTR_POSITIONS]) -> f64 {
    if rank.is_nan() {
        return curve[CTR_POSITIONS - 1];
    }
    if rank <= 1.0 {
        return curve[0];
    }
    if rank >= CTR_POSITIONS as f64 {
        return curve[CTR_POSITIONS - 1];
    }

    let lower = rank.floor();
    let frac = rank - lower;
    let lo_idx = lower as usize - 1;
    if frac == 0.0 {
        return curve[lo_idx];
    }
    let lo = curve[lo_idx];
    let hi = curve[lo_idx + 1];
    lo + (hi - lo) * frac
}

/// Validates a caller-supplied curve: exactly 20 fractions in [0, 1].
/// Monotonicity is conventional and not enforced.
pub fn validate_curve(values: &[f64]) -> Result<[f64; CTR_POSITIONS], ForecastError> {
    if values.len() != CTR_POSITIONS {
        return Err(ForecastError::invalid(
            "ctr_values",
            format!("expected {CTR_POSITIONS} values, got {}", values.len()),
        ));
    }

    let mut curve = [0.0; CTR_POSITIONS];
    for (i, &v) in values.iter().enumerate() {
        if !v.is_finite() || !(0.0..=1.0).contains(&v) {
            return Err(ForecastError::invalid(
                format!("ctr_values[{i}]"),
                format!("CTR must be a fraction in [0, 1], got {v}"),
            ));
        }
        curve[i] = v;
    }
    Ok(curve)
}

// ────────────────────────────────────────────────────────────────────────────
// Curve from measured search-console data
// ────────────────────────────────────────────────────────────────────────────

/// One measured row of position-level search performance.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionMeasurement {
    pub position: f64,
    pub clicks: f64,
    pub impressions: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MeasuredCurve {
    pub ctr_values: [f64; CTR_POSITIONS],
    /// Positions (1-based) backed by at least one impression.
    pub positions_measured: Vec<u32>,
    /// Positions that inherited the built-in default.
    pub positions_defaulted: Vec<u32>,
}

/// Builds a curve from measured click/impression rows.
///
/// Rows are bucketed by rounded position; rows outside 1..=20 or with no
/// impressions are ignored. Unmeasured positions keep the default value.
/// With `enforce_monotonic`, each value is capped by the one before it.
pub fn curve_from_measurements(
    measurements: &[PositionMeasurement],
    enforce_monotonic: bool,
) -> MeasuredCurve {
    let mut clicks = [0.0_f64; CTR_POSITIONS];
    let mut impressions = [0.0_f64; CTR_POSITIONS];

    for m in measurements {
        if !m.position.is_finite() || m.impressions <= 0.0 || m.clicks < 0.0 {
            continue;
        }
        let position = m.position.round();
        if position < 1.0 || position > CTR_POSITIONS as f64 {
            continue;
        }
        let idx = position as usize - 1;
        clicks[idx] += m.clicks;
        impressions[idx] += m.impressions;
    }

    let mut ctr_values = DEFAULT_CTR_CURVE;
    let mut positions_measured = Vec::new();
    let mut positions_defaulted = Vec::new();

    for idx in 0..CTR_POSITIONS {
        if impressions[idx] > 0.0 {
            ctr_values[idx] = (clicks[idx] / impressions[idx]).clamp(0.0, 1.0);
            positions_measured.push(idx as u32 + 1);
        } else {
            positions_defaulted.push(idx as u32 + 1);
        }
    }

    if enforce_monotonic {
        for idx in 1..CTR_POSITIONS {
            ctr_values[idx] = ctr_values[idx].min(ctr_values[idx - 1]);
        }
    }

    MeasuredCurve {
        ctr_values,
        positions_measured,
        positions_defaulted,
    }
}
