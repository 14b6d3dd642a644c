//! Windiness-corrected long-term regression inputs.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tracing::warn;

use aep_core::{AepError, AepResult, CalendarKey, RegressionChannel, TimeResolution};
use aep_ts::{OperatingTable, ReanalysisInputs};

/// One calendar year of long-term inputs, in calendar order.
#[derive(Debug, Clone, PartialEq)]
pub struct LongTermSample {
    pub keys: Vec<CalendarKey>,
    /// IAV-adjusted inputs per calendar period
    pub inputs: Vec<ReanalysisInputs>,
    /// Regression features per calendar period, in channel order
    pub features: Vec<Vec<f64>>,
    /// Reanalysis periods the averages were taken over
    pub periods_used: usize,
}

#[derive(Default)]
struct Group {
    windspeed: Vec<f64>,
    temperature: Vec<f64>,
    u: Vec<f64>,
    v: Vec<f64>,
}

/// Calendar averages over the last `years` of a product's record.
///
/// Each calendar period's mean wind speed is scaled by a draw from
/// `Normal(1, sd / mean)` to represent inter-annual variability. A window
/// longer than the record is clamped to the whole record.
pub fn sample_long_term(
    table: &OperatingTable,
    product: &str,
    years: u32,
    channels: &[RegressionChannel],
    rng: &mut StdRng,
) -> AepResult<LongTermSample> {
    let resolution = table.resolution();
    let history = table.reanalysis(product).ok_or_else(|| {
        AepError::Config(format!("reanalysis product '{product}' is not in the operating table"))
    })?;

    let requested = years as usize * resolution.periods_per_year();
    if requested > history.len() {
        warn!(
            product,
            requested_years = years,
            available_periods = history.len(),
            "windiness window longer than reanalysis record, using all of it"
        );
    }
    let take = requested.min(history.len());
    let window: Vec<(&chrono::NaiveDate, &ReanalysisInputs)> =
        history.iter().skip(history.len() - take).collect();

    let mut groups: BTreeMap<CalendarKey, Group> = BTreeMap::new();
    let mut monthly_ws: BTreeMap<u32, Vec<f64>> = BTreeMap::new();
    for (period, inputs) in &window {
        let key = resolution.calendar_key(**period);
        let group = groups.entry(key).or_default();
        group.windspeed.push(inputs.windspeed);
        group.temperature.extend(inputs.temperature);
        group.u.extend(inputs.u);
        group.v.extend(inputs.v);
        monthly_ws.entry(key.month).or_default().push(inputs.windspeed);
    }

    if groups.len() != resolution.periods_per_year() {
        return Err(AepError::Coverage(format!(
            "reanalysis product '{product}' covers only {} of {} calendar periods over the last {} periods",
            groups.len(),
            resolution.periods_per_year(),
            take
        )));
    }

    let mut sample = LongTermSample {
        keys: Vec::with_capacity(groups.len()),
        inputs: Vec::with_capacity(groups.len()),
        features: Vec::with_capacity(groups.len()),
        periods_used: take,
    };
    for (key, group) in &groups {
        let mean_ws = mean(&group.windspeed);
        let spread = match resolution {
            TimeResolution::Monthly => std_dev(&group.windspeed),
            TimeResolution::Daily => monthly_ws.get(&key.month).map_or(f64::NAN, |v| std_dev(v)),
        };
        let windspeed = mean_ws * iav_factor(spread / mean_ws, rng);

        let inputs = ReanalysisInputs::from_components(
            windspeed,
            optional_mean(&group.temperature),
            optional_mean(&group.u),
            optional_mean(&group.v),
        );
        let features = inputs.features(channels).ok_or_else(|| {
            AepError::Data(format!(
                "reanalysis product '{product}' lacks an enabled regression input for calendar period {}{}",
                key.month,
                key.day.map(|d| format!("-{d}")).unwrap_or_default()
            ))
        })?;
        sample.keys.push(*key);
        sample.inputs.push(inputs);
        sample.features.push(features);
    }
    Ok(sample)
}

/// Multiplicative IAV noise; no noise when the relative spread is undefined.
fn iav_factor(relative_sd: f64, rng: &mut StdRng) -> f64 {
    match Normal::new(1.0, relative_sd) {
        Ok(dist) if relative_sd.is_finite() => dist.sample(rng),
        _ => 1.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn optional_mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| mean(values))
}

/// Sample standard deviation; NaN with fewer than two values.
fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64).sqrt()
}
