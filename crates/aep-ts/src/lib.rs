//! # aep-ts: plant time series and the operating table
//!
//! Loads raw meter, loss and reanalysis series, buckets them into monthly or
//! daily periods, and assembles the [`OperatingTable`] the Monte Carlo engine
//! fits against.
//!
//! ```no_run
//! use std::path::PathBuf;
//! use aep_ts::{InMemoryBackend, OperatingTable, PlantFiles, TableBackend, TableSettings};
//!
//! # fn main() -> anyhow::Result<()> {
//! let files = PlantFiles {
//!     meter: "meter.csv".into(),
//!     curtailment: "curtail.csv".into(),
//!     reanalysis: [("merra2".to_string(), PathBuf::from("merra2.csv"))].into(),
//!     capacity_mw: None,
//! };
//! let backend = InMemoryBackend;
//! let plant = backend.load(&files)?;
//! let table = OperatingTable::build(&plant, &TableSettings::default(), &backend)?;
//! println!("{} periods", table.len());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod io;
pub mod plant;
pub mod reanalysis;
pub mod resample;
pub mod series;
pub mod table;
pub mod test_utils;

pub use backend::{InMemoryBackend, TableBackend};
pub use io::{load_plant, read_frame, write_frame, PlantFiles};
pub use plant::{CurtailmentData, MeterData, PlantData, ReanalysisData};
pub use reanalysis::ReanalysisInputs;
pub use resample::{PeriodMap, PeriodStats};
pub use series::{Cadence, TimeSeries};
pub use table::{LossKind, OperatingRecord, OperatingTable, TableSettings};
