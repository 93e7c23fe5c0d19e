pub struct StatsHelper;

impl StatsHelper {
    /// Largest minus smallest sample; `None` for an empty trace.
    pub fn peak_to_peak(samples: &[f64]) -> Option<f64> {
        let first = *samples.first()?;
        let (min, max) = samples
            .iter()
            .fold((first, first), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        Some(max - min)
    }

    /// Index of the first occurrence of the maximum value. NaN samples are skipped.
    pub fn argmax(samples: &[f64]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, &value) in samples.iter().enumerate() {
            if value.is_nan() {
                continue;
            }
            match best {
                Some((_, current)) if value <= current => {}
                _ => best = Some((idx, value)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    pub fn max(samples: &[f64]) -> Option<f64> {
        samples.iter().copied().reduce(f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn peak_to_peak_of_empty_is_none() {
        assert_eq!(StatsHelper::peak_to_peak(&[]), None);
    }

    #[test]
    fn peak_to_peak_spans_extremes() {
        let vpp = StatsHelper::peak_to_peak(&[0.1, -0.05, 0.02]).unwrap();
        assert!((vpp - 0.15).abs() < 1e-12);
        assert_eq!(StatsHelper::peak_to_peak(&[4.0]), Some(0.0));
    }

    #[test]
    fn argmax_prefers_first_maximum() {
        assert_eq!(StatsHelper::argmax(&[1.0, 3.0, 3.0, 2.0]), Some(1));
        assert_eq!(StatsHelper::argmax(&[]), None);
    }

    #[test]
    fn argmax_ignores_nan() {
        assert_eq!(StatsHelper::argmax(&[1.0, f64::NAN, 3.0, 2.0]), Some(2));
        assert_eq!(StatsHelper::argmax(&[f64::NAN, 0.5]), Some(1));
        assert_eq!(StatsHelper::argmax(&[f64::NAN]), None);
    }
}
