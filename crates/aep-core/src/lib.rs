//! # aep-core: shared vocabulary for operational AEP analysis
//!
//! Provides the enums and calendar arithmetic every stage of the Monte Carlo
//! AEP pipeline agrees on:
//!
//! - [`TimeResolution`]: monthly or daily analysis periods, with the calendar
//!   helpers used to bucket raw timestamps and to build long-term averages
//! - [`RegressionModel`]: which energy-vs-wind model is fitted
//! - [`RegressionChannel`]: the ordered regression inputs (wind speed first)
//! - [`AepError`]: configuration, coverage and regression failures
//! - [`units`]: kWh/GWh wrappers, density correction, wind direction

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use std::fmt;
use std::str::FromStr;

pub mod error;
pub mod units;

pub use error::{AepError, AepResult};

/// Days in a long-term year (one leap day every four years).
pub const DAYS_PER_LONG_TERM_YEAR: f64 = 365.25;

/// Long-term days per calendar month; February averages leap years.
pub const LONG_TERM_DAYS_PER_MONTH: [f64; 12] = [
    31.0, 28.25, 31.0, 30.0, 31.0, 30.0, 31.0, 31.0, 30.0, 31.0, 30.0, 31.0,
];

/// Days per calendar month in a leap year; the daily calendar cycle has 366 keys.
pub const LEAP_YEAR_DAYS_PER_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

/// Regression targets in monthly mode are normalised to a month of this length.
pub const NORMALIZED_MONTH_DAYS: f64 = 30.0;

/// Length of the analysis period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeResolution {
    Monthly,
    Daily,
}

impl TimeResolution {
    /// Start of the period containing `timestamp`.
    pub fn period_start(self, timestamp: NaiveDateTime) -> NaiveDate {
        let date = timestamp.date();
        match self {
            TimeResolution::Monthly => month_start(date),
            TimeResolution::Daily => date,
        }
    }

    /// Start of the period following the one starting at `start`.
    pub fn next_period(self, start: NaiveDate) -> NaiveDate {
        match self {
            TimeResolution::Monthly => month_start(month_start(start) + Duration::days(32)),
            TimeResolution::Daily => start + Duration::days(1),
        }
    }

    /// Number of calendar days in the period starting at `start`.
    pub fn days_in_period(self, start: NaiveDate) -> f64 {
        (self.next_period(start) - start).num_days() as f64
    }

    /// Calendar bucket used for long-term averaging.
    pub fn calendar_key(self, period: NaiveDate) -> CalendarKey {
        match self {
            TimeResolution::Monthly => CalendarKey {
                month: period.month(),
                day: None,
            },
            TimeResolution::Daily => CalendarKey {
                month: period.month(),
                day: Some(period.day()),
            },
        }
    }

    /// Every calendar bucket of one year, in calendar order.
    pub fn calendar_keys(self) -> Vec<CalendarKey> {
        match self {
            TimeResolution::Monthly => (1..=12).map(|month| CalendarKey { month, day: None }).collect(),
            TimeResolution::Daily => LEAP_YEAR_DAYS_PER_MONTH
                .iter()
                .zip(1u32..)
                .flat_map(|(&days, month)| {
                    (1..=days).map(move |day| CalendarKey {
                        month,
                        day: Some(day),
                    })
                })
                .collect(),
        }
    }

    /// Number of calendar buckets in one year (12 or 366).
    pub fn periods_per_year(self) -> usize {
        match self {
            TimeResolution::Monthly => 12,
            TimeResolution::Daily => 366,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            TimeResolution::Monthly => "M",
            TimeResolution::Daily => "D",
        }
    }
}

impl fmt::Display for TimeResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for TimeResolution {
    type Err = AepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "M" | "MS" | "monthly" => Ok(TimeResolution::Monthly),
            "D" | "daily" => Ok(TimeResolution::Daily),
            other => Err(AepError::Config(format!(
                "time_resolution has to be either M (monthly) or D (daily), got '{other}'"
            ))),
        }
    }
}

/// Calendar month, plus the day of month in daily mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CalendarKey {
    pub month: u32,
    pub day: Option<u32>,
}

impl CalendarKey {
    /// Long-term days represented by this bucket (daily buckets count one day).
    pub fn long_term_days(self) -> f64 {
        match self.day {
            Some(_) => 1.0,
            None => LONG_TERM_DAYS_PER_MONTH[(self.month as usize).saturating_sub(1) % 12],
        }
    }
}

/// Energy-vs-wind model fitted in each simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegressionModel {
    /// Ordinary least squares
    Linear,
    /// Gradient-boosted regression trees
    GradientBoosting,
    /// Extremely randomised trees
    ExtraTrees,
    /// Additive cubic-spline model
    Gam,
}

impl RegressionModel {
    pub fn is_machine_learning(self) -> bool {
        !matches!(self, RegressionModel::Linear)
    }

    pub fn as_code(self) -> &'static str {
        match self {
            RegressionModel::Linear => "lin",
            RegressionModel::GradientBoosting => "gbm",
            RegressionModel::ExtraTrees => "etr",
            RegressionModel::Gam => "gam",
        }
    }
}

impl fmt::Display for RegressionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

impl FromStr for RegressionModel {
    type Err = AepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "lin" => Ok(RegressionModel::Linear),
            "gbm" => Ok(RegressionModel::GradientBoosting),
            "etr" => Ok(RegressionModel::ExtraTrees),
            "gam" => Ok(RegressionModel::Gam),
            other => Err(AepError::Config(format!(
                "reg_model has to be lin (linear regression), gbm (gradient boosting), \
                 etr (extra trees) or gam (generalized additive model), got '{other}'"
            ))),
        }
    }
}

/// One regression input. Wind speed is always the first channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegressionChannel {
    WindSpeed,
    Temperature,
    WindDirectionSin,
    WindDirectionCos,
}

impl RegressionChannel {
    /// Ordered channel list for the enabled optional inputs.
    pub fn active(temperature: bool, wind_direction: bool) -> Vec<RegressionChannel> {
        let mut channels = vec![RegressionChannel::WindSpeed];
        if temperature {
            channels.push(RegressionChannel::Temperature);
        }
        if wind_direction {
            channels.push(RegressionChannel::WindDirectionSin);
            channels.push(RegressionChannel::WindDirectionCos);
        }
        channels
    }

    pub fn name(self) -> &'static str {
        match self {
            RegressionChannel::WindSpeed => "windspeed",
            RegressionChannel::Temperature => "temperature",
            RegressionChannel::WindDirectionSin => "wd_sin",
            RegressionChannel::WindDirectionCos => "wd_cos",
        }
    }
}

/// Parse a boolean-like regression flag (`Y`/`N` or `true`/`false`).
pub fn parse_flag(name: &str, value: &str) -> AepResult<bool> {
    match value.trim() {
        "Y" | "y" | "true" => Ok(true),
        "N" | "n" | "false" => Ok(false),
        other => Err(AepError::Config(format!(
            "{name} has to be either Y (input used in the regression) or N (input omitted), got '{other}'"
        ))),
    }
}

fn month_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}
