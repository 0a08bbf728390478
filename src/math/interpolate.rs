//! Gap filling for evenly spaced series.

/// Fill interior gaps by straight lines between the neighbouring observations.
///
/// Returns the completed series and the number of filled positions, or `None`
/// when the first or last position is itself a gap (nothing to anchor on).
pub fn interpolate_linear(values: &[Option<f64>]) -> Option<(Vec<f64>, usize)> {
    let first = (*values.first()?)?;
    values.last().copied().flatten()?;

    let mut out = Vec::with_capacity(values.len());
    let mut filled = 0usize;
    let mut prev = (0usize, first);

    let mut i = 0usize;
    while i < values.len() {
        match values[i] {
            Some(v) => {
                out.push(v);
                prev = (i, v);
                i += 1;
            }
            None => {
                // `values` ends with an observation, so the scan always finds one.
                let next_idx = (i..values.len()).find(|&j| values[j].is_some())?;
                let next = values[next_idx]?;
                let span = (next_idx - prev.0) as f64;
                for j in i..next_idx {
                    let u = (j - prev.0) as f64 / span;
                    out.push(prev.1 + u * (next - prev.1));
                    filled += 1;
                }
                i = next_idx;
            }
        }
    }

    Some((out, filled))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_interior_gap_linearly() {
        let (y, filled) = interpolate_linear(&[Some(1.0), None, None, Some(4.0), Some(5.0)]).unwrap();
        assert_eq!(filled, 2);
        let expected = [1.0, 2.0, 3.0, 4.0, 5.0];
        for (a, b) in y.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn boundary_gaps_are_rejected() {
        assert!(interpolate_linear(&[None, Some(1.0)]).is_none());
        assert!(interpolate_linear(&[Some(1.0), None]).is_none());
        assert!(interpolate_linear(&[]).is_none());
    }

    #[test]
    fn complete_series_is_untouched() {
        let (y, filled) = interpolate_linear(&[Some(3.0), Some(1.0)]).unwrap();
        assert_eq!(filled, 0);
        assert_eq!(y, vec![3.0, 1.0]);
    }
}
