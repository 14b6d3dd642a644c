//! Element-wise outlier flags. Every function returns one flag per input
//! value; `true` marks a value to discard. Missing values are never flagged.

/// Values strictly below `below` or strictly above `above`.
pub fn range_flag(values: &[f64], below: f64, above: f64) -> Vec<bool> {
    values
        .iter()
        .map(|&v| !v.is_nan() && (v < below || v > above))
        .collect()
}

/// Runs of at least `threshold` consecutive identical values (a stuck sensor).
///
/// Every element of a qualifying run is flagged.
pub fn unresponsive_flag(values: &[f64], threshold: usize) -> Vec<bool> {
    let mut flags = vec![false; values.len()];
    if threshold == 0 {
        return flags;
    }

    let mut start = 0;
    while start < values.len() {
        let mut end = start + 1;
        while end < values.len() && values[end] == values[start] {
            end += 1;
        }
        if end - start >= threshold && !values[start].is_nan() {
            flags[start..end].iter_mut().for_each(|f| *f = true);
        }
        start = end;
    }
    flags
}

/// Values outside `[value_min, value_max]` while the window value lies in
/// `[window_start, window_end]`.
pub fn window_range_flag(
    window: &[f64],
    window_start: f64,
    window_end: f64,
    values: &[f64],
    value_min: &[f64],
    value_max: &[f64],
) -> Vec<bool> {
    window
        .iter()
        .zip(values)
        .zip(value_min.iter().zip(value_max))
        .map(|((&w, &v), (&lo, &hi))| {
            (window_start..=window_end).contains(&w) && !v.is_nan() && (v < lo || v > hi)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_flags_outside_bounds() {
        let flags = range_flag(&[-1.0, 0.0, 20.0, 41.0, f64::NAN], 0.0, 40.0);
        assert_eq!(flags, vec![true, false, false, true, false]);
    }

    #[test]
    fn frozen_runs_are_flagged_whole() {
        let values = [5.0, 6.0, 6.0, 6.0, 7.0, 7.0, 8.0];
        assert_eq!(
            unresponsive_flag(&values, 3),
            vec![false, true, true, true, false, false, false]
        );
        assert!(unresponsive_flag(&values, 4).iter().all(|f| !f));
    }

    #[test]
    fn window_only_applies_inside_window() {
        let ws = [3.0, 6.0, 6.0, 45.0];
        let energy = [0.0, 0.0, 5.0, 0.0];
        let flags = window_range_flag(&ws, 5.0, 40.0, &energy, &[1.0; 4], &[10.0; 4]);
        assert_eq!(flags, vec![false, true, false, false]);
    }
}
