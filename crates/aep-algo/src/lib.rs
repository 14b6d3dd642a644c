//! # aep-algo: Monte Carlo AEP engine
//!
//! Estimates a wind plant's annual energy production and its uncertainty by
//! repeating an energy-vs-wind regression over randomly perturbed inputs.
//!
//! ## Pipeline
//!
//! | Stage | Module | Runs |
//! |-------|--------|------|
//! | Long-term loss baseline | [`losses`] | once per run |
//! | Parameter draws | [`sampler`] | once per run |
//! | Quality filtering | [`outliers`] (memoised by [`cache`]) | once per distinct key |
//! | Regression | [`regression`] | per simulation |
//! | Long-term projection | [`long_term`] | per simulation |
//!
//! [`MonteCarloAep`] ties the stages together and returns
//! [`SimulationResults`].
//!
//! ### Regression models
//!
//! Every model implements [`regression::Regressor`]. `lin` is ordinary least
//! squares; `etr`, `gbm` and `gam` are tree ensembles and a spline model,
//! each tuned by a small random hyperparameter search. The machine-learning
//! models need daily resolution.
//!
//! ## Example
//!
//! ```no_run
//! use aep_algo::{AepConfig, MonteCarloAep};
//! use aep_ts::test_utils::{monthly_plant, PRODUCT};
//!
//! # fn main() -> Result<(), aep_core::AepError> {
//! let plant = monthly_plant(24, 10.0, 0.2, 0.1);
//! let config = AepConfig {
//!     seed: Some(7),
//!     ..AepConfig::default()
//! };
//! let engine = MonteCarloAep::new(&plant, config)?;
//! let results = engine.run(100, &[PRODUCT.to_string()])?;
//! println!("{:.1} GWh/yr", results.summary().aep_mean_gwh);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod filters;
pub mod io;
pub mod long_term;
pub mod losses;
pub mod monte_carlo;
pub mod outliers;
pub mod regression;
pub mod results;
pub mod sampler;

pub use cache::FilterCache;
pub use config::{AepConfig, AepSettings, Flag};
pub use io::persist_results;
pub use long_term::{sample_long_term, LongTermSample};
pub use losses::LongTermLosses;
pub use monte_carlo::MonteCarloAep;
pub use outliers::{FilterKey, FilteredSample, OutlierFilterCache};
pub use regression::{FitReport, Predictor, Regressor};
pub use results::{AepSummary, SimulationOutcome, SimulationResults};
pub use sampler::{SimulationDraw, SimulationParameters};
