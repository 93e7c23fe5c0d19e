use num_complex::Complex64;
use std::f64::consts::PI;

use crate::bench_interface::{
    ElementCondition, ImpedancePoint, ImpedanceSweep, ReflectionPoint, SParameterSweep,
};
use crate::config::Limits;
use crate::prelude::{MeasureError, MeasureResult};

pub const DEFAULT_REFERENCE_OHMS: f64 = 50.0;

/// |1 - Γ| below this is treated as a perfect open-circuit reflection.
const SINGULAR_TOLERANCE: f64 = 1e-12;

/// Sweep points dropped while converting, with the reason for each.
#[derive(Debug, Clone, PartialEq)]
pub struct ExcludedPoint {
    pub frequency_hz: f64,
    pub reason: MeasureError,
}

pub struct ImpedanceConverter;

impl ImpedanceConverter {
    /// `Z = Z0·(1 + Γ) / (1 − Γ)` for a single point.
    pub fn point_impedance(point: &ReflectionPoint, reference_ohms: f64) -> MeasureResult<Complex64> {
        let one = Complex64::new(1.0, 0.0);
        let denominator = one - point.gamma;
        if denominator.norm() < SINGULAR_TOLERANCE {
            return Err(MeasureError::SingularReflection {
                frequency_hz: point.frequency_hz,
            });
        }
        Ok(reference_ohms * (one + point.gamma) / denominator)
    }

    /// Converts every point, failing on the first singular reflection.
    pub fn to_impedance(sweep: &SParameterSweep, reference_ohms: f64) -> MeasureResult<ImpedanceSweep> {
        let points = sweep
            .points()
            .iter()
            .map(|point| {
                Ok(ImpedancePoint {
                    frequency_hz: point.frequency_hz,
                    impedance: Self::point_impedance(point, reference_ohms)?,
                })
            })
            .collect::<MeasureResult<Vec<_>>>()?;
        ImpedanceSweep::new(points)
    }

    /// Converts every point it can and reports the singular ones separately.
    pub fn to_impedance_excluding(
        sweep: &SParameterSweep,
        reference_ohms: f64,
    ) -> MeasureResult<(ImpedanceSweep, Vec<ExcludedPoint>)> {
        let mut points = Vec::with_capacity(sweep.len());
        let mut excluded = Vec::new();
        for point in sweep.points() {
            match Self::point_impedance(point, reference_ohms) {
                Ok(impedance) => points.push(ImpedancePoint {
                    frequency_hz: point.frequency_hz,
                    impedance,
                }),
                Err(reason) => excluded.push(ExcludedPoint {
                    frequency_hz: point.frequency_hz,
                    reason,
                }),
            }
        }
        Ok((ImpedanceSweep::new(points)?, excluded))
    }

    /// Point closest to `target_hz`, provided it lies within one local bin width.
    pub fn nearest_point(sweep: &ImpedanceSweep, target_hz: f64) -> MeasureResult<&ImpedancePoint> {
        let points = sweep.points();
        let not_swept = MeasureError::FrequencyNotSwept { target_hz };

        let (idx, nearest) = points
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a.frequency_hz - target_hz)
                    .abs()
                    .total_cmp(&(b.frequency_hz - target_hz).abs())
            })
            .ok_or_else(|| not_swept.clone())?;

        let below = idx
            .checked_sub(1)
            .map(|prev| nearest.frequency_hz - points[prev].frequency_hz);
        let above = points
            .get(idx + 1)
            .map(|next| next.frequency_hz - nearest.frequency_hz);
        let bin = match (below, above) {
            (Some(a), Some(b)) => a.max(b),
            (Some(gap), None) | (None, Some(gap)) => gap,
            (None, None) => target_hz.abs() * 1e-9,
        };

        if (nearest.frequency_hz - target_hz).abs() > bin {
            return Err(not_swept);
        }
        Ok(nearest)
    }

    /// Equivalent series capacitance `C = −1 / (2π·f·Im Z)` at the point nearest `target_hz`.
    ///
    /// Capacitive loads come out positive, inductive loads negative.
    pub fn capacitance_at(sweep: &ImpedanceSweep, target_hz: f64) -> MeasureResult<f64> {
        let point = Self::nearest_point(sweep, target_hz)?;
        let reactance = point.impedance.im;
        if reactance == 0.0 || point.frequency_hz == 0.0 {
            return Err(MeasureError::ZeroReactance {
                frequency_hz: point.frequency_hz,
            });
        }
        Ok(-1.0 / (2.0 * PI * point.frequency_hz * reactance))
    }
}

/// Flags readings that look like a broken or shorted element.
pub fn classify_capacitance(capacitance_f: f64, open_band: &Limits) -> ElementCondition {
    if capacitance_f < 0.0 {
        ElementCondition::Short
    } else if open_band.contains(capacitance_f) {
        ElementCondition::Open
    } else {
        ElementCondition::Nominal
    }
}
