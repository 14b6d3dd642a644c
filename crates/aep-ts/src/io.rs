use std::{
    collections::BTreeMap,
    fs::{self, File},
    path::{Path, PathBuf},
};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
#[cfg(feature = "parquet")]
use polars::prelude::{ParquetReader, ParquetWriter};
use tracing::debug;

use crate::plant::{CurtailmentData, MeterData, PlantData, ReanalysisData};
use crate::series::TimeSeries;

pub const TIME_COLUMN: &str = "time";
pub const ENERGY_COLUMN: &str = "energy_kwh";
pub const AVAILABILITY_COLUMN: &str = "availability_kwh";
pub const CURTAILMENT_COLUMN: &str = "curtailment_kwh";
pub const WINDSPEED_COLUMN: &str = "windspeed_ms";
pub const DENSITY_COLUMN: &str = "rho_kgm-3";
pub const TEMPERATURE_COLUMN: &str = "temperature_K";
pub const U_COLUMN: &str = "u_ms";
pub const V_COLUMN: &str = "v_ms";

const TEXT_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

/// Paths to the raw plant inputs.
#[derive(Debug, Clone, Default)]
pub struct PlantFiles {
    pub meter: PathBuf,
    pub curtailment: PathBuf,
    /// Reanalysis files keyed by product name
    pub reanalysis: BTreeMap<String, PathBuf>,
    pub capacity_mw: Option<f64>,
}

pub fn load_plant(files: &PlantFiles) -> Result<PlantData> {
    let meter = load_meter(&files.meter)?;
    let curtailment = load_curtailment(&files.curtailment)?;
    let mut reanalysis = BTreeMap::new();
    for (name, path) in &files.reanalysis {
        let product = load_reanalysis(path)
            .with_context(|| format!("loading reanalysis product '{name}'"))?;
        reanalysis.insert(name.clone(), product);
    }
    Ok(PlantData {
        capacity_mw: files.capacity_mw,
        meter,
        curtailment,
        reanalysis,
    })
}

pub fn load_meter(path: &Path) -> Result<MeterData> {
    let (timestamps, mut columns) = read_columns(path, &[ENERGY_COLUMN], &[])?;
    Ok(MeterData {
        energy_kwh: take_series(&timestamps, &mut columns, ENERGY_COLUMN)?,
    })
}

pub fn load_curtailment(path: &Path) -> Result<CurtailmentData> {
    let (timestamps, mut columns) =
        read_columns(path, &[AVAILABILITY_COLUMN, CURTAILMENT_COLUMN], &[])?;
    Ok(CurtailmentData {
        availability_kwh: take_series(&timestamps, &mut columns, AVAILABILITY_COLUMN)?,
        curtailment_kwh: take_series(&timestamps, &mut columns, CURTAILMENT_COLUMN)?,
    })
}

pub fn load_reanalysis(path: &Path) -> Result<ReanalysisData> {
    let (timestamps, mut columns) = read_columns(
        path,
        &[WINDSPEED_COLUMN, DENSITY_COLUMN],
        &[TEMPERATURE_COLUMN, U_COLUMN, V_COLUMN],
    )?;
    let optional = |columns: &mut BTreeMap<String, Vec<Option<f64>>>, name: &str| {
        if columns.contains_key(name) {
            take_series(&timestamps, columns, name).map(Some)
        } else {
            Ok(None)
        }
    };
    let temperature_k = optional(&mut columns, TEMPERATURE_COLUMN)?;
    let u_ms = optional(&mut columns, U_COLUMN)?;
    let v_ms = optional(&mut columns, V_COLUMN)?;
    Ok(ReanalysisData {
        windspeed_ms: take_series(&timestamps, &mut columns, WINDSPEED_COLUMN)?,
        density_kgm3: take_series(&timestamps, &mut columns, DENSITY_COLUMN)?,
        temperature_k,
        u_ms,
        v_ms,
    })
}

pub fn read_frame(path: &Path) -> Result<DataFrame> {
    let extension = extension_of(path);
    let mut file = File::open(path).with_context(|| format!("opening {}", path.display()))?;

    match extension.as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetReader::new(&mut file)
            .finish()
            .with_context(|| format!("reading Parquet file {}", path.display())),
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => CsvReader::new(&mut file)
            .has_header(true)
            .finish()
            .with_context(|| format!("reading CSV file {}", path.display())),
        _ => Err(anyhow!(
            "unsupported file extension '{}'; use .csv or .parquet",
            extension
        )),
    }
}

/// Write a frame as CSV or Parquet depending on the path extension.
pub fn write_frame(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let mut file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    match extension_of(path).as_str() {
        #[cfg(feature = "parquet")]
        "parquet" => ParquetWriter::new(&mut file)
            .finish(df)
            .map(|_| ())
            .context("writing Parquet file"),
        #[cfg(not(feature = "parquet"))]
        "parquet" => Err(anyhow!(
            "parquet support is disabled; rebuild with the 'parquet' feature"
        )),
        "csv" => CsvWriter::new(&mut file)
            .finish(df)
            .context("writing CSV file"),
        other => Err(anyhow!(
            "unsupported output extension '{}' for {}; use .csv or .parquet",
            other,
            path.display()
        )),
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default()
}

type Columns = BTreeMap<String, Vec<Option<f64>>>;

/// Read the time column and the named value columns, sorted by time.
fn read_columns(
    path: &Path,
    required: &[&str],
    optional: &[&str],
) -> Result<(Vec<NaiveDateTime>, Columns)> {
    let df = read_frame(path)?;
    let timestamps = parse_timestamps(
        df.column(TIME_COLUMN)
            .with_context(|| format!("{} has no '{TIME_COLUMN}' column", path.display()))?,
    )?;

    let mut columns = Columns::new();
    for &name in required.iter().chain(optional) {
        let series = match df.column(name) {
            Ok(series) => series,
            Err(_) if optional.contains(&name) => continue,
            Err(err) => {
                return Err(anyhow::Error::new(err)
                    .context(format!("{} has no '{name}' column", path.display())))
            }
        };
        let values = series
            .cast(&DataType::Float64)
            .with_context(|| format!("casting '{name}' to Float64"))?;
        columns.insert(name.to_string(), values.f64()?.into_iter().collect());
    }

    let mut order: Vec<usize> = (0..timestamps.len()).collect();
    order.sort_by_key(|&i| timestamps[i]);
    let sorted_timestamps = order.iter().map(|&i| timestamps[i]).collect();
    for values in columns.values_mut() {
        let reordered: Vec<Option<f64>> = order.iter().map(|&i| values[i]).collect();
        *values = reordered;
    }

    debug!(path = %path.display(), rows = order.len(), "loaded plant table");
    Ok((sorted_timestamps, columns))
}

fn take_series(
    timestamps: &[NaiveDateTime],
    columns: &mut Columns,
    name: &str,
) -> Result<TimeSeries> {
    let values = columns
        .remove(name)
        .ok_or_else(|| anyhow!("missing column '{name}'"))?;
    Ok(TimeSeries::new(timestamps.to_vec(), values)?)
}

/// Parse a time column stored as text, epoch seconds or a datetime.
pub fn parse_timestamps(series: &Series) -> Result<Vec<NaiveDateTime>> {
    match series.dtype() {
        DataType::Utf8 => series
            .utf8()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                let text = value.ok_or_else(|| anyhow!("row {row}: missing timestamp"))?;
                parse_text_timestamp(text).with_context(|| format!("row {row}"))
            })
            .collect(),
        #[cfg(feature = "temporal")]
        DataType::Datetime(unit, _) => {
            let per_second = match unit {
                TimeUnit::Nanoseconds => 1_000_000_000,
                TimeUnit::Microseconds => 1_000_000,
                TimeUnit::Milliseconds => 1_000,
            };
            let raw = series.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    let ticks = value.ok_or_else(|| anyhow!("row {row}: missing timestamp"))?;
                    from_epoch(ticks.div_euclid(per_second))
                })
                .collect()
        }
        dtype if dtype.is_integer() => {
            let raw = series.cast(&DataType::Int64)?;
            raw.i64()?
                .into_iter()
                .enumerate()
                .map(|(row, value)| {
                    from_epoch(value.ok_or_else(|| anyhow!("row {row}: missing timestamp"))?)
                })
                .collect()
        }
        other => bail!("unsupported time column type {other:?}"),
    }
}

fn parse_text_timestamp(text: &str) -> Result<NaiveDateTime> {
    let text = text.trim();
    for format in TEXT_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(ts);
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .ok_or_else(|| anyhow!("unrecognised timestamp '{text}'"))
}

fn from_epoch(seconds: i64) -> Result<NaiveDateTime> {
    DateTime::from_timestamp(seconds, 0)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| anyhow!("epoch seconds {seconds} out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn meter_csv_is_sorted_and_keeps_missing_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meter.csv");
        fs::write(
            &path,
            "time,energy_kwh\n2019-01-01 00:10:00,5.0\n2019-01-01 00:00:00,4.0\n2019-01-01 00:20:00,\n",
        )
        .unwrap();
        let meter = load_meter(&path).unwrap();
        assert_eq!(meter.energy_kwh.values, vec![Some(4.0), Some(5.0), None]);
        assert!(meter.energy_kwh.timestamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn reanalysis_optional_columns() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("merra2.csv");
        fs::write(
            &path,
            "time,windspeed_ms,rho_kgm-3,temperature_K\n2019-01-01,7.0,1.2,280.0\n2019-01-02,8.0,1.2,281.0\n",
        )
        .unwrap();
        let product = load_reanalysis(&path).unwrap();
        assert!(product.has_temperature());
        assert!(!product.has_wind_components());
        assert_eq!(product.windspeed_ms.len(), 2);
    }

    #[test]
    fn missing_required_column_names_the_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("curtail.csv");
        fs::write(&path, "time,availability_kwh\n2019-01-01,1.0\n").unwrap();
        let err = load_curtailment(&path).unwrap_err();
        assert!(format!("{err:#}").contains("curtailment_kwh"));
    }

    #[test]
    fn epoch_seconds_are_accepted() {
        let series = Series::new(TIME_COLUMN, &[0i64, 600]);
        let ts = parse_timestamps(&series).unwrap();
        assert_eq!(ts[1] - ts[0], chrono::Duration::minutes(10));
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meter.json");
        fs::write(&path, "{}").unwrap();
        assert!(read_frame(&path).is_err());
    }

    #[test]
    fn csv_frame_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out/frame.csv");
        let mut df = df!["a" => &[1.0f64, 2.0]].unwrap();
        write_frame(&mut df, &path).unwrap();
        let back = read_frame(&path).unwrap();
        assert_eq!(back.height(), 2);
    }
}
