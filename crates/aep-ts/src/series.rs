use std::collections::HashMap;

use aep_core::{AepError, AepResult};
use chrono::{Datelike, NaiveDateTime, Timelike};

/// Seconds in one day
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// A timestamped series with optional (missing) samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeSeries {
    pub timestamps: Vec<NaiveDateTime>,
    pub values: Vec<Option<f64>>,
}

impl TimeSeries {
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<Option<f64>>) -> AepResult<Self> {
        if timestamps.len() != values.len() {
            return Err(AepError::Data(format!(
                "series has {} timestamps but {} values",
                timestamps.len(),
                values.len()
            )));
        }
        Ok(Self { timestamps, values })
    }

    /// Build a fully-populated series.
    pub fn from_values(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> AepResult<Self> {
        Self::new(timestamps, values.into_iter().map(Some).collect())
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDateTime, Option<f64>)> + '_ {
        self.timestamps
            .iter()
            .copied()
            .zip(self.values.iter().map(|v| v.filter(|x| x.is_finite())))
    }

    /// Native sampling cadence of the series.
    pub fn cadence(&self) -> Cadence {
        Cadence::infer(&self.timestamps)
    }
}

/// Sampling cadence inferred from consecutive timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// One sample per calendar month, stamped at the month start
    MonthStart,
    /// Fixed spacing in seconds (the most frequent gap)
    Fixed(i64),
    /// Fewer than two samples
    Unknown,
}

impl Cadence {
    pub fn infer(timestamps: &[NaiveDateTime]) -> Cadence {
        if timestamps.len() < 2 {
            return Cadence::Unknown;
        }

        let month_starts = timestamps
            .iter()
            .all(|ts| ts.day() == 1 && ts.num_seconds_from_midnight() == 0);
        let gaps: Vec<i64> = timestamps
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_seconds())
            .filter(|gap| *gap > 0)
            .collect();
        if gaps.is_empty() {
            return Cadence::Unknown;
        }

        let monthly_gaps = gaps
            .iter()
            .all(|gap| (28 * 86_400..=31 * 86_400).contains(gap));
        if month_starts && monthly_gaps {
            return Cadence::MonthStart;
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for gap in gaps {
            *counts.entry(gap).or_default() += 1;
        }
        let (gap, _) = counts
            .into_iter()
            .max_by(|(gap_a, count_a), (gap_b, count_b)| {
                count_a.cmp(count_b).then_with(|| gap_b.cmp(gap_a))
            })
            .unwrap_or((0, 0));
        Cadence::Fixed(gap)
    }

    /// Days covered by `samples` samples at this cadence, if the cadence is sub-monthly.
    pub fn days_covered(self, samples: usize) -> Option<f64> {
        match self {
            Cadence::Fixed(seconds) => Some(samples as f64 * seconds as f64 / SECONDS_PER_DAY),
            Cadence::MonthStart | Cadence::Unknown => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2019, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn ten_minute_cadence() {
        let ts: Vec<_> = (0..20).map(|i| start() + Duration::minutes(10 * i)).collect();
        assert_eq!(Cadence::infer(&ts), Cadence::Fixed(600));
        assert_eq!(Cadence::Fixed(600).days_covered(144), Some(1.0));
    }

    #[test]
    fn gaps_do_not_change_cadence() {
        let mut ts: Vec<_> = (0..10).map(|i| start() + Duration::hours(i)).collect();
        ts.push(start() + Duration::hours(30));
        assert_eq!(Cadence::infer(&ts), Cadence::Fixed(3600));
    }

    #[test]
    fn month_start_cadence() {
        let ts: Vec<_> = (1..=6)
            .map(|m| {
                NaiveDate::from_ymd_opt(2019, m, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap()
            })
            .collect();
        assert_eq!(Cadence::infer(&ts), Cadence::MonthStart);
        assert_eq!(Cadence::MonthStart.days_covered(3), None);
    }

    #[test]
    fn mismatched_lengths_rejected() {
        let err = TimeSeries::new(vec![start()], vec![]).unwrap_err();
        assert!(matches!(err, AepError::Data(_)));
    }
}
