//! Synthetic plants for unit and integration tests.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use aep_core::TimeResolution;

use crate::plant::{CurtailmentData, MeterData, PlantData, ReanalysisData};
use crate::series::TimeSeries;

/// Product name used by every builder in this module.
pub const PRODUCT: &str = "merra2";

/// First month of the synthetic period of record.
pub fn por_start() -> NaiveDate {
    date(2018, 1, 1)
}

/// First month of the long-term reanalysis record.
pub fn reanalysis_start() -> NaiveDate {
    date(1998, 1, 1)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn midnight(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(0, 0, 0).unwrap()
}

/// `n` consecutive period starts from `start`.
pub fn period_starts(start: NaiveDate, n: usize, resolution: TimeResolution) -> Vec<NaiveDateTime> {
    let mut period = start;
    let mut out = Vec::with_capacity(n);
    for _ in 0..n {
        out.push(midnight(period));
        period = resolution.next_period(period);
    }
    out
}

/// Wind speed ramping linearly from 5 to 15 m/s over the period of record.
pub fn ramp_speed(index: usize, periods: usize) -> f64 {
    if periods <= 1 {
        5.0
    } else {
        5.0 + 10.0 * index as f64 / (periods - 1) as f64
    }
}

/// Seasonal long-term wind with a small year-to-year wobble.
pub fn seasonal_speed(day: NaiveDate) -> f64 {
    let phase = 2.0 * PI * f64::from(day.ordinal0()) / 366.0;
    8.0 + 2.0 * phase.cos() + 0.2 * f64::from(day.year().rem_euclid(3) as u32)
}

/// Reanalysis product covering `[reanalysis_start, por_end)` whose
/// period-of-record samples follow `por_speed`.
fn reanalysis_product(
    resolution: TimeResolution,
    history_start: NaiveDate,
    por: &[NaiveDateTime],
    por_speed: impl Fn(usize) -> f64,
) -> ReanalysisData {
    let first_por = por.first().map(|ts| ts.date()).unwrap_or(history_start);
    let mut timestamps = Vec::new();
    let mut speeds = Vec::new();
    let mut period = history_start;
    while period < first_por {
        timestamps.push(midnight(period));
        speeds.push(seasonal_speed(period));
        period = resolution.next_period(period);
    }
    for (i, ts) in por.iter().enumerate() {
        timestamps.push(*ts);
        speeds.push(por_speed(i));
    }

    let n = timestamps.len();
    let angle = |i: usize| 2.0 * PI * i as f64 / 12.0;
    ReanalysisData {
        windspeed_ms: TimeSeries::from_values(timestamps.clone(), speeds).unwrap(),
        density_kgm3: TimeSeries::from_values(timestamps.clone(), vec![1.225; n]).unwrap(),
        temperature_k: Some(
            TimeSeries::from_values(
                timestamps.clone(),
                (0..n).map(|i| 283.0 + 8.0 * angle(i).sin()).collect(),
            )
            .unwrap(),
        ),
        u_ms: Some(
            TimeSeries::from_values(timestamps.clone(), (0..n).map(|i| angle(i).sin()).collect())
                .unwrap(),
        ),
        v_ms: Some(
            TimeSeries::from_values(timestamps, (0..n).map(|i| angle(i).cos()).collect()).unwrap(),
        ),
    }
}

fn plant_from(
    meter_ts: Vec<NaiveDateTime>,
    energy_kwh: Vec<f64>,
    availability_kwh: Vec<f64>,
    curtailment_kwh: Vec<f64>,
    product: ReanalysisData,
) -> PlantData {
    let mut reanalysis = BTreeMap::new();
    reanalysis.insert(PRODUCT.to_string(), product);
    PlantData {
        capacity_mw: Some(50.0),
        meter: MeterData {
            energy_kwh: TimeSeries::from_values(meter_ts.clone(), energy_kwh).unwrap(),
        },
        curtailment: CurtailmentData {
            availability_kwh: TimeSeries::from_values(meter_ts.clone(), availability_kwh).unwrap(),
            curtailment_kwh: TimeSeries::from_values(meter_ts, curtailment_kwh).unwrap(),
        },
        reanalysis,
    }
}

/// Monthly meter data with constant energy and losses (GWh per month) and a
/// 5→15 m/s wind ramp over the period of record.
pub fn monthly_plant(
    months: usize,
    energy_gwh: f64,
    availability_gwh: f64,
    curtailment_gwh: f64,
) -> PlantData {
    monthly_plant_with(months, |_| (energy_gwh, availability_gwh, curtailment_gwh))
}

/// Monthly meter data whose `(energy, availability, curtailment)` in GWh is a
/// function of the period-of-record wind speed.
pub fn monthly_plant_with(months: usize, energy: impl Fn(f64) -> (f64, f64, f64)) -> PlantData {
    periodic_plant(TimeResolution::Monthly, por_start(), months, energy)
}

/// Daily meter data (one sample per day) starting on `start`.
pub fn daily_plant_with(
    start: NaiveDate,
    days: usize,
    energy: impl Fn(f64) -> (f64, f64, f64),
) -> PlantData {
    periodic_plant(TimeResolution::Daily, start, days, energy)
}

fn periodic_plant(
    resolution: TimeResolution,
    start: NaiveDate,
    periods: usize,
    energy: impl Fn(f64) -> (f64, f64, f64),
) -> PlantData {
    let meter_ts = period_starts(start, periods, resolution);
    let speeds: Vec<f64> = (0..periods).map(|i| ramp_speed(i, periods)).collect();
    let (mut e, mut a, mut c) = (Vec::new(), Vec::new(), Vec::new());
    for ws in &speeds {
        let (energy_gwh, avail_gwh, curt_gwh) = energy(*ws);
        e.push(energy_gwh * 1.0e6);
        a.push(avail_gwh * 1.0e6);
        c.push(curt_gwh * 1.0e6);
    }
    let product = reanalysis_product(resolution, reanalysis_start(), &meter_ts, |i| speeds[i]);
    plant_from(meter_ts, e, a, c, product)
}

/// Ten-minute meter data over `days` days starting at `start` (`%Y-%m-%d`),
/// with hourly reanalysis over the same span.
pub fn ten_minute_plant(start: &str, days: i64) -> PlantData {
    let start = midnight(NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap());
    let meter_ts: Vec<NaiveDateTime> = (0..days * 144)
        .map(|i| start + Duration::minutes(10 * i))
        .collect();
    let n = meter_ts.len();

    let hourly: Vec<NaiveDateTime> = (0..days * 24).map(|h| start + Duration::hours(h)).collect();
    let m = hourly.len();
    let product = ReanalysisData {
        windspeed_ms: TimeSeries::from_values(hourly.clone(), vec![7.0; m]).unwrap(),
        density_kgm3: TimeSeries::from_values(hourly.clone(), vec![1.2; m]).unwrap(),
        temperature_k: None,
        u_ms: None,
        v_ms: None,
    };
    plant_from(meter_ts, vec![500.0; n], vec![0.0; n], vec![0.0; n], product)
}
