use std::path::Path;
use std::time::Instant;

use aep_algo::{persist_results, AepSummary, MonteCarloAep};
use aep_cli::cli::{PlantArgs, SettingsArgs};
use aep_cli::config::{plant_files, resolve_config};
use aep_cli::manifest::record_manifest;
use aep_ts::load_plant;
use anyhow::Result;
use tracing::info;

pub fn handle(
    plant: &PlantArgs,
    settings: &SettingsArgs,
    num_sim: usize,
    products: &[String],
    out: &Path,
    params_out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let start = Instant::now();
    let files = plant_files(plant)?;
    let config = resolve_config(settings)?;

    info!("Loading plant data from {}", files.meter.display());
    let data = load_plant(&files)?;
    let products: Vec<String> = if products.is_empty() {
        data.product_names()
    } else {
        products.to_vec()
    };

    let engine = MonteCarloAep::new(&data, config)?;
    let results = engine.run(num_sim, &products)?;
    let written = persist_results(&results, out, params_out)?;

    let summary = results.summary();
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    let settings = engine.settings();
    let manifest = record_manifest(
        &written,
        "run",
        settings.seed,
        &[
            ("meter", plant.meter.display().to_string()),
            ("curtailment", plant.curtailment.display().to_string()),
            ("reanalysis", plant.reanalysis.join(",")),
            ("num_sim", num_sim.to_string()),
            ("products", products.join(",")),
            ("time_resolution", settings.resolution.to_string()),
            ("reg_model", settings.model.to_string()),
            ("reg_temperature", settings.temperature.to_string()),
            ("reg_winddirection", settings.wind_direction.to_string()),
            ("out", out.display().to_string()),
        ],
    )?;
    if !json {
        for path in &written {
            println!("Wrote {}", path.display());
        }
        println!("Recorded run manifest {}", manifest.display());
    }
    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        outputs = written.len(),
        "run finished"
    );
    Ok(())
}

fn print_summary(summary: &AepSummary) {
    println!("Monte Carlo AEP over {} simulation(s):", summary.simulations);
    println!(
        "  AEP               : {:.2} GWh/yr (std {:.2})",
        summary.aep_mean_gwh, summary.aep_std_gwh
    );
    println!(
        "  Uncertainty       : {:.2} %",
        summary.aep_uncertainty * 100.0
    );
    println!(
        "  Availability loss : {:.2} % (long-term {:.2} %)",
        summary.avail_mean_pct * 100.0,
        summary.long_term_losses.availability * 100.0
    );
    println!(
        "  Curtailment loss  : {:.2} % (long-term {:.2} %)",
        summary.curt_mean_pct * 100.0,
        summary.long_term_losses.curtailment * 100.0
    );
    println!("  LT/POR ratio      : {:.3}", summary.lt_por_ratio_mean);
    println!("  Mean R2           : {:.3}", summary.r2_mean);
    println!("  Filter passes     : {}", summary.filter_computations);
}
