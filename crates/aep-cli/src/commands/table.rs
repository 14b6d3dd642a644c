use std::path::Path;

use aep_algo::MonteCarloAep;
use aep_cli::cli::{PlantArgs, SettingsArgs};
use aep_cli::config::{plant_files, resolve_config};
use aep_cli::manifest::record_manifest;
use aep_ts::{load_plant, write_frame};
use anyhow::Result;
use tracing::info;

pub fn handle(plant: &PlantArgs, settings: &SettingsArgs, out: &Path) -> Result<()> {
    let files = plant_files(plant)?;
    let config = resolve_config(settings)?;
    let data = load_plant(&files)?;
    let engine = MonteCarloAep::new(&data, config)?;

    let table = engine.table();
    info!(
        resolution = %table.resolution(),
        periods = table.records().len(),
        "operating table built"
    );
    let mut frame = table.to_dataframe()?;
    write_frame(&mut frame, out)?;
    println!(
        "Wrote {} {} period(s) to {}",
        table.records().len(),
        table.resolution(),
        out.display()
    );
    record_manifest(
        &[out.to_path_buf()],
        "table",
        None,
        &[
            ("meter", plant.meter.display().to_string()),
            ("curtailment", plant.curtailment.display().to_string()),
            ("reanalysis", plant.reanalysis.join(",")),
            ("time_resolution", table.resolution().to_string()),
        ],
    )?;
    Ok(())
}
