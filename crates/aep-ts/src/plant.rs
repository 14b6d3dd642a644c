//! Raw plant inputs at their native (sub-period) resolution.

use std::collections::BTreeMap;

use aep_core::{AepError, AepResult};

use crate::series::TimeSeries;

/// Revenue meter energy, kWh per sample.
#[derive(Debug, Clone, Default)]
pub struct MeterData {
    pub energy_kwh: TimeSeries,
}

/// Reported availability and curtailment losses, kWh per sample.
///
/// Both series share the same timestamps.
#[derive(Debug, Clone, Default)]
pub struct CurtailmentData {
    pub availability_kwh: TimeSeries,
    pub curtailment_kwh: TimeSeries,
}

/// One reanalysis product at the plant location.
#[derive(Debug, Clone, Default)]
pub struct ReanalysisData {
    pub windspeed_ms: TimeSeries,
    pub density_kgm3: TimeSeries,
    pub temperature_k: Option<TimeSeries>,
    pub u_ms: Option<TimeSeries>,
    pub v_ms: Option<TimeSeries>,
}

impl ReanalysisData {
    pub fn has_temperature(&self) -> bool {
        self.temperature_k.is_some()
    }

    pub fn has_wind_components(&self) -> bool {
        self.u_ms.is_some() && self.v_ms.is_some()
    }
}

/// Everything the analysis reads from a plant.
#[derive(Debug, Clone, Default)]
pub struct PlantData {
    /// Nameplate capacity, only needed by the power-curve window filter
    pub capacity_mw: Option<f64>,
    pub meter: MeterData,
    pub curtailment: CurtailmentData,
    pub reanalysis: BTreeMap<String, ReanalysisData>,
}

impl PlantData {
    pub fn product_names(&self) -> Vec<String> {
        self.reanalysis.keys().cloned().collect()
    }

    /// Check the collaborator contract for the enabled regression inputs.
    pub fn validate(&self, temperature: bool, wind_direction: bool) -> AepResult<()> {
        if self.meter.energy_kwh.is_empty() {
            return Err(AepError::Data("meter energy series is empty".into()));
        }
        if self.curtailment.availability_kwh.timestamps != self.curtailment.curtailment_kwh.timestamps
        {
            return Err(AepError::Data(
                "availability and curtailment series must share timestamps".into(),
            ));
        }
        if self.reanalysis.is_empty() {
            return Err(AepError::Data("no reanalysis products provided".into()));
        }
        for (name, product) in &self.reanalysis {
            if product.windspeed_ms.timestamps != product.density_kgm3.timestamps {
                return Err(AepError::Data(format!(
                    "reanalysis product '{name}': wind speed and density must share timestamps"
                )));
            }
            if temperature && !product.has_temperature() {
                return Err(AepError::Data(format!(
                    "reanalysis product '{name}' has no temperature but temperature is a regression input"
                )));
            }
            if wind_direction && !product.has_wind_components() {
                return Err(AepError::Data(format!(
                    "reanalysis product '{name}' has no u/v components but wind direction is a regression input"
                )));
            }
        }
        Ok(())
    }
}
