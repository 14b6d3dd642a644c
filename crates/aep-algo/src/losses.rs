use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use aep_core::{AepError, AepResult, CalendarKey, TimeResolution, DAYS_PER_LONG_TERM_YEAR};
use aep_ts::{OperatingRecord, OperatingTable};

/// Annualised long-term loss fractions.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct LongTermLosses {
    pub availability: f64,
    pub curtailment: f64,
}

impl LongTermLosses {
    /// Calendar-period average of the typical reported losses, weighted to a
    /// long-term year.
    ///
    /// Every calendar month (or every calendar day, Feb 29 included) must be
    /// represented for each loss independently.
    pub fn estimate(table: &OperatingTable) -> AepResult<Self> {
        let resolution = table.resolution();
        let availability = annualised(
            table.records(),
            resolution,
            "availability",
            |r| r.availability_typical,
            |r| r.availability_pct,
        )?;
        let curtailment = annualised(
            table.records(),
            resolution,
            "curtailment",
            |r| r.curtailment_typical,
            |r| r.curtailment_pct,
        )?;
        debug!(availability, curtailment, "long-term losses");
        Ok(Self {
            availability,
            curtailment,
        })
    }

    /// Scale both losses by one simulation's loss bias.
    pub fn sampled(&self, loss_bias: f64) -> Self {
        Self {
            availability: self.availability * loss_bias,
            curtailment: self.curtailment * loss_bias,
        }
    }
}

fn annualised(
    records: &[OperatingRecord],
    resolution: TimeResolution,
    label: &str,
    typical: impl Fn(&OperatingRecord) -> bool,
    loss: impl Fn(&OperatingRecord) -> f64,
) -> AepResult<f64> {
    let mut groups: BTreeMap<CalendarKey, (f64, usize)> = BTreeMap::new();
    for record in records.iter().filter(|r| typical(r)) {
        let value = loss(record);
        if value.is_finite() {
            let entry = groups
                .entry(resolution.calendar_key(record.period))
                .or_default();
            entry.0 += value;
            entry.1 += 1;
        }
    }

    let expected = resolution.periods_per_year();
    if groups.len() != expected {
        let unit = match resolution {
            TimeResolution::Monthly => "calendar months",
            TimeResolution::Daily => "calendar days",
        };
        return Err(AepError::Coverage(format!(
            "only {} of {expected} {unit} represented in long-term {label} calculation",
            groups.len()
        )));
    }

    let weighted: f64 = groups
        .iter()
        .map(|(key, (sum, count))| sum / *count as f64 * key.long_term_days())
        .sum();
    Ok(weighted / DAYS_PER_LONG_TERM_YEAR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aep_ts::test_utils::{daily_plant_with, date, monthly_plant, monthly_plant_with};
    use aep_ts::{InMemoryBackend, LossKind, TableSettings};

    fn table(plant: &aep_ts::PlantData, resolution: TimeResolution) -> OperatingTable {
        let settings = TableSettings {
            resolution,
            ..TableSettings::default()
        };
        OperatingTable::build(plant, &settings, &InMemoryBackend).unwrap()
    }

    #[test]
    fn constant_losses_annualise_to_themselves() {
        let plant = monthly_plant(24, 8.0, 1.0, 1.0);
        let losses = LongTermLosses::estimate(&table(&plant, TimeResolution::Monthly)).unwrap();
        assert!((losses.availability - 0.1).abs() < 1e-12);
        assert!((losses.curtailment - 0.1).abs() < 1e-12);
        let sampled = losses.sampled(1.1);
        assert!((sampled.availability - 0.11).abs() < 1e-12);
    }

    #[test]
    fn eleven_months_is_a_coverage_error() {
        let plant = monthly_plant(11, 10.0, 0.0, 0.0);
        let err = LongTermLosses::estimate(&table(&plant, TimeResolution::Monthly)).unwrap_err();
        assert!(err.is_coverage());
    }

    #[test]
    fn atypical_months_drop_out_of_coverage() {
        let plant = monthly_plant(12, 10.0, 0.1, 0.0);
        let mut table = table(&plant, TimeResolution::Monthly);
        let first = table.records()[0].period;
        table.mark_atypical(&[first], LossKind::Curtailment);
        let err = LongTermLosses::estimate(&table).unwrap_err();
        assert!(err.to_string().contains("curtailment"));
    }

    #[test]
    fn monthly_weights_follow_long_term_days() {
        // January loses 31% and every other month nothing
        let plant = monthly_plant_with(12, |ws| {
            if ws == 5.0 {
                (6.9, 3.1, 0.0)
            } else {
                (10.0, 0.0, 0.0)
            }
        });
        let losses = LongTermLosses::estimate(&table(&plant, TimeResolution::Monthly)).unwrap();
        assert!((losses.availability - 0.31 * 31.0 / 365.25).abs() < 1e-12);
    }

    #[test]
    fn daily_needs_leap_day() {
        let no_leap = daily_plant_with(date(2018, 1, 1), 365, |_| (0.2, 0.01, 0.0));
        let err = LongTermLosses::estimate(&table(&no_leap, TimeResolution::Daily)).unwrap_err();
        assert!(err.is_coverage());

        let with_leap = daily_plant_with(date(2019, 3, 1), 366, |_| (0.2, 0.0, 0.0));
        let losses =
            LongTermLosses::estimate(&table(&with_leap, TimeResolution::Daily)).unwrap();
        assert_eq!(losses.availability, 0.0);
    }
}
