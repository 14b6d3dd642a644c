//! Unit wrappers and conversion helpers for plant energy and meteorology.
//!
//! Meter and loss data arrive in kWh while every analysis table works in GWh;
//! wind direction is computed in radians but reported in degrees. The
//! newtypes below keep those scales from being mixed by accident.
//!
//! ```
//! use aep_core::units::{GigawattHours, KilowattHours};
//!
//! let monthly = KilowattHours(10.0e6);
//! assert_eq!(GigawattHours::from(monthly), GigawattHours(10.0));
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Mul, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            /// Check if value is finite
            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Energy in kilowatt-hours, the native unit of meter and loss records.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct KilowattHours(pub f64);

impl_unit_ops!(KilowattHours, "kWh");

/// Energy in gigawatt-hours, the unit of every period table.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct GigawattHours(pub f64);

impl_unit_ops!(GigawattHours, "GWh");

impl From<KilowattHours> for GigawattHours {
    fn from(value: KilowattHours) -> Self {
        GigawattHours(value.0 / 1.0e6)
    }
}

/// Angle in degrees
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Degrees(pub f64);

impl_unit_ops!(Degrees, "deg");

impl Degrees {
    /// Convert to radians
    #[inline]
    pub fn to_radians(self) -> f64 {
        self.0.to_radians()
    }
}

/// Meteorological wind direction (the heading the wind blows *from*) of the
/// horizontal wind vector `(u, v)`.
///
/// `180 - atan2(-u, v)` in degrees; `u = 0, v = 1` gives 180°, `u = 1, v = 0`
/// (air moving east, arriving from the west) gives 270°.
pub fn wind_direction(u: f64, v: f64) -> Degrees {
    Degrees(180.0 - (-u).atan2(v).to_degrees())
}

/// Normalise wind speed to the mean air density of the record.
///
/// `ws · (ρ / mean(ρ))^(1/3)`. Samples with a missing speed or density stay
/// missing; the reference density is the mean over samples where it is known.
pub fn air_density_adjusted_wind_speed(
    windspeed: &[Option<f64>],
    density: &[Option<f64>],
) -> Vec<Option<f64>> {
    let known: Vec<f64> = density
        .iter()
        .filter_map(|rho| rho.filter(|r| r.is_finite()))
        .collect();
    if known.is_empty() {
        return vec![None; windspeed.len()];
    }
    let rho_mean = known.iter().sum::<f64>() / known.len() as f64;

    windspeed
        .iter()
        .zip(density.iter())
        .map(|(ws, rho)| match (ws, rho) {
            (Some(ws), Some(rho)) if ws.is_finite() && rho.is_finite() => {
                Some(ws * (rho / rho_mean).powf(1.0 / 3.0))
            }
            _ => None,
        })
        .collect()
}

/// Gross energy is what the plant would have produced without availability
/// and curtailment losses.
#[inline]
pub fn gross_energy(
    net: GigawattHours,
    availability: GigawattHours,
    curtailment: GigawattHours,
) -> GigawattHours {
    net + availability + curtailment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kwh_to_gwh() {
        let gwh: GigawattHours = KilowattHours(2.5e6).into();
        assert!((gwh.value() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn northward_vector_is_180() {
        assert!((wind_direction(0.0, 1.0).value() - 180.0).abs() < 1e-12);
    }

    #[test]
    fn eastward_vector_is_270() {
        assert!((wind_direction(1.0, 0.0).value() - 270.0).abs() < 1e-12);
        assert!((wind_direction(-1.0, 0.0).value() - 90.0).abs() < 1e-12);
    }

    #[test]
    fn density_correction_is_identity_for_constant_density() {
        let ws = vec![Some(5.0), Some(7.5), None];
        let rho = vec![Some(1.2), Some(1.2), Some(1.2)];
        let corrected = air_density_adjusted_wind_speed(&ws, &rho);
        assert!((corrected[0].unwrap() - 5.0).abs() < 1e-12);
        assert!((corrected[1].unwrap() - 7.5).abs() < 1e-12);
        assert_eq!(corrected[2], None);
    }

    #[test]
    fn denser_air_raises_adjusted_speed() {
        let ws = vec![Some(8.0), Some(8.0)];
        let rho = vec![Some(1.3), Some(1.1)];
        let corrected = air_density_adjusted_wind_speed(&ws, &rho);
        assert!(corrected[0].unwrap() > 8.0);
        assert!(corrected[1].unwrap() < 8.0);
    }

    #[test]
    fn gross_adds_losses() {
        let gross = gross_energy(GigawattHours(10.0), GigawattHours(0.5), GigawattHours(0.25));
        assert_eq!(gross, GigawattHours(10.75));
    }
}
