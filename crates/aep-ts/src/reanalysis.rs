//! Period averages of reanalysis products.

use aep_core::units::{air_density_adjusted_wind_speed, wind_direction};
use aep_core::{RegressionChannel, TimeResolution};

use crate::backend::TableBackend;
use crate::plant::ReanalysisData;
use crate::resample::{PeriodMap, PeriodStats};
use crate::series::TimeSeries;
use chrono::NaiveDate;

/// Period-average reanalysis inputs of one product.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReanalysisInputs {
    /// Density-corrected wind speed, m/s
    pub windspeed: f64,
    /// Air temperature, K
    pub temperature: Option<f64>,
    pub u: Option<f64>,
    pub v: Option<f64>,
    /// Direction the wind comes from, degrees
    pub direction: Option<f64>,
}

impl ReanalysisInputs {
    /// Value of one regression channel, if available and finite.
    pub fn channel(&self, channel: RegressionChannel) -> Option<f64> {
        let value = match channel {
            RegressionChannel::WindSpeed => Some(self.windspeed),
            RegressionChannel::Temperature => self.temperature,
            RegressionChannel::WindDirectionSin => self.direction.map(|wd| wd.to_radians().sin()),
            RegressionChannel::WindDirectionCos => self.direction.map(|wd| wd.to_radians().cos()),
        };
        value.filter(|v| v.is_finite())
    }

    /// Feature vector in channel order; `None` if any channel is missing.
    pub fn features(&self, channels: &[RegressionChannel]) -> Option<Vec<f64>> {
        channels.iter().map(|&c| self.channel(c)).collect()
    }

    /// Build inputs from averaged components, deriving direction from `(u, v)`.
    pub fn from_components(
        windspeed: f64,
        temperature: Option<f64>,
        u: Option<f64>,
        v: Option<f64>,
    ) -> Self {
        let direction = match (u, v) {
            (Some(u), Some(v)) => Some(wind_direction(u, v).value()),
            _ => None,
        };
        Self {
            windspeed,
            temperature,
            u,
            v,
            direction,
        }
    }
}

/// Density-correct a product and average it to the analysis period.
///
/// Temperature and wind components are only aggregated when requested; a
/// period exists in the output only if its mean wind speed is defined.
pub fn aggregate_product<B: TableBackend + ?Sized>(
    backend: &B,
    product: &ReanalysisData,
    resolution: TimeResolution,
    temperature: bool,
    wind_direction: bool,
) -> PeriodMap<ReanalysisInputs> {
    let corrected = TimeSeries {
        timestamps: product.windspeed_ms.timestamps.clone(),
        values: air_density_adjusted_wind_speed(
            &product.windspeed_ms.values,
            &product.density_kgm3.values,
        ),
    };
    let ws = backend.resample(&corrected, resolution);

    let optional = |enabled: bool, series: Option<&TimeSeries>| {
        if enabled {
            series.map(|s| backend.resample(s, resolution))
        } else {
            None
        }
    };
    let temp = optional(temperature, product.temperature_k.as_ref());
    let u = optional(wind_direction, product.u_ms.as_ref());
    let v = optional(wind_direction, product.v_ms.as_ref());

    let mean_at = |map: &Option<PeriodMap<PeriodStats>>, period: &NaiveDate| {
        map.as_ref()
            .and_then(|m| m.get(period))
            .and_then(|stats| stats.mean())
    };

    ws.iter()
        .filter_map(|(period, stats)| {
            let windspeed = stats.mean()?;
            Some((
                *period,
                ReanalysisInputs::from_components(
                    windspeed,
                    mean_at(&temp, period),
                    mean_at(&u, period),
                    mean_at(&v, period),
                ),
            ))
        })
        .collect()
}
