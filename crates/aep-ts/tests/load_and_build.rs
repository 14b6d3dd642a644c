use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use aep_core::{RegressionChannel, TimeResolution};
use aep_ts::{InMemoryBackend, OperatingTable, PlantFiles, TableBackend, TableSettings};
use tempfile::tempdir;

fn write_month_csvs(dir: &Path, months: u32) -> PlantFiles {
    let mut meter = String::from("time,energy_kwh\n");
    let mut curtail = String::from("time,availability_kwh,curtailment_kwh\n");
    let mut rean = String::from("time,windspeed_ms,rho_kgm-3,temperature_K,u_ms,v_ms\n");
    for k in 0..months {
        let (year, month) = (2018 + k / 12, k % 12 + 1);
        let stamp = format!("{year}-{month:02}-01 00:00:00");
        writeln!(meter, "{stamp},{}", 9.0e6).unwrap();
        writeln!(curtail, "{stamp},{},{}", 0.5e6, 0.5e6).unwrap();
        writeln!(rean, "{stamp},{},1.225,285.0,0.0,1.0", 6.0 + f64::from(k) * 0.1).unwrap();
    }
    let meter_path = dir.join("meter.csv");
    let curtail_path = dir.join("curtail.csv");
    let rean_path = dir.join("merra2.csv");
    fs::write(&meter_path, meter).unwrap();
    fs::write(&curtail_path, curtail).unwrap();
    fs::write(&rean_path, rean).unwrap();

    let mut reanalysis = BTreeMap::new();
    reanalysis.insert("merra2".to_string(), rean_path);
    PlantFiles {
        meter: meter_path,
        curtailment: curtail_path,
        reanalysis,
        capacity_mw: Some(40.0),
    }
}

#[test]
fn csv_inputs_build_a_monthly_table() {
    let dir = tempdir().unwrap();
    let files = write_month_csvs(dir.path(), 18);
    let backend = InMemoryBackend;
    let plant = backend.load(&files).unwrap();
    let settings = TableSettings {
        resolution: TimeResolution::Monthly,
        nan_threshold: 0.01,
        temperature: true,
        wind_direction: true,
    };
    let table = OperatingTable::build(&plant, &settings, &backend).unwrap();

    assert_eq!(table.len(), 18);
    assert_eq!(table.channels().len(), 4);
    let first = &table.records()[0];
    assert!((first.gross_energy_gwh - 10.0).abs() < 1e-9);
    assert!((first.curtailment_pct - 0.05).abs() < 1e-9);
    let inputs = first.inputs("merra2").unwrap();
    assert!((inputs.direction.unwrap() - 180.0).abs() < 1e-9);
    assert!(inputs.features(table.channels()).is_some());
    assert_eq!(
        inputs.channel(RegressionChannel::Temperature),
        Some(285.0)
    );

    let mut df = table.to_dataframe().unwrap();
    assert!(df.column("merra2_wd").is_ok());
    let out = dir.path().join("table.csv");
    aep_ts::write_frame(&mut df, &out).unwrap();
    assert!(out.exists());
}

#[test]
fn missing_temperature_is_a_data_error() {
    let dir = tempdir().unwrap();
    let files = write_month_csvs(dir.path(), 12);
    let mut plant = aep_ts::load_plant(&files).unwrap();
    if let Some(product) = plant.reanalysis.get_mut("merra2") {
        product.temperature_k = None;
    }
    let settings = TableSettings {
        temperature: true,
        ..TableSettings::default()
    };
    let err = OperatingTable::build(&plant, &settings, &InMemoryBackend).unwrap_err();
    assert!(err.to_string().contains("temperature"));
}
