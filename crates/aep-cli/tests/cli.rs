use assert_cmd::Command;
use predicates::prelude::*;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

const POR_MONTHS: usize = 24;

fn month_start(index: usize) -> String {
    // month 0 is 1998-01
    format!("{}-{:02}-01", 1998 + index / 12, index % 12 + 1)
}

/// Monthly meter, curtailment and reanalysis CSVs; the period of record is
/// 2018-01 through 2019-12 and the reanalysis history starts in 1998.
struct PlantFixture {
    meter: PathBuf,
    curtailment: PathBuf,
    reanalysis: PathBuf,
}

impl PlantFixture {
    fn write(dir: &Path) -> Self {
        let history = 22 * 12;
        let por_start = 20 * 12;
        let speed = |i: usize| {
            if i < por_start {
                7.0 + 1.5 * (2.0 * std::f64::consts::PI * (i % 12) as f64 / 12.0).cos()
            } else {
                5.0 + 10.0 * (i - por_start) as f64 / (POR_MONTHS - 1) as f64
            }
        };

        let mut reanalysis = String::from("time,windspeed_ms,rho_kgm-3\n");
        for i in 0..history {
            writeln!(reanalysis, "{},{:.4},1.225", month_start(i), speed(i)).unwrap();
        }
        let mut meter = String::from("time,energy_kwh\n");
        let mut curtailment = String::from("time,availability_kwh,curtailment_kwh\n");
        for i in por_start..history {
            let energy_gwh = 2.0 + speed(i);
            writeln!(meter, "{},{:.1}", month_start(i), energy_gwh * 1.0e6).unwrap();
            writeln!(curtailment, "{},{:.1},{:.1}", month_start(i), 0.1e6, 0.05e6).unwrap();
        }

        let fixture = Self {
            meter: dir.join("meter.csv"),
            curtailment: dir.join("curtailment.csv"),
            reanalysis: dir.join("merra2.csv"),
        };
        fs::write(&fixture.meter, meter).unwrap();
        fs::write(&fixture.curtailment, curtailment).unwrap();
        fs::write(&fixture.reanalysis, reanalysis).unwrap();
        fixture
    }

    fn args(&self) -> Vec<String> {
        vec![
            "--meter".into(),
            self.meter.display().to_string(),
            "--curtailment".into(),
            self.curtailment.display().to_string(),
            "--reanalysis".into(),
            format!("merra2={}", self.reanalysis.display()),
        ]
    }
}

fn manifests(dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("run-") && n.ends_with(".json"))
        })
        .collect()
}

#[test]
fn aep_run_writes_results_and_manifest() {
    let dir = tempdir().unwrap();
    let plant = PlantFixture::write(dir.path());
    let out = dir.path().join("out").join("aep.csv");
    let params = dir.path().join("out").join("params.csv");

    let mut cmd = Command::cargo_bin("aep").unwrap();
    cmd.arg("run")
        .args(plant.args())
        .args(["--num-sim", "20", "--seed", "42", "-o"])
        .arg(&out)
        .arg("--params-out")
        .arg(&params)
        .assert()
        .success()
        .stdout(predicate::str::contains("AEP"))
        .stdout(predicate::str::contains("Recorded run manifest"));

    assert!(out.exists());
    assert!(params.exists());
    assert!(dir.path().join("out").join("aep.diagnostics.csv").exists());

    let results = fs::read_to_string(&out).unwrap();
    let mut lines = results.lines();
    assert_eq!(
        lines.next(),
        Some("aep_GWh,avail_pct,curt_pct,lt_por_ratio")
    );
    assert_eq!(lines.count(), 20);

    let manifests = manifests(&dir.path().join("out"));
    assert_eq!(manifests.len(), 1);
    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&manifests[0]).unwrap()).unwrap();
    assert_eq!(manifest["command"], "run");
    assert_eq!(manifest["seed"], 42);
    assert_eq!(manifest["outputs"].as_array().unwrap().len(), 3);
}

#[test]
fn aep_run_is_reproducible_with_a_seed() {
    let dir = tempdir().unwrap();
    let plant = PlantFixture::write(dir.path());
    let run = |name: &str| {
        let out = dir.path().join(name);
        Command::cargo_bin("aep")
            .unwrap()
            .arg("run")
            .args(plant.args())
            .args(["--num-sim", "10", "--seed", "7", "-o"])
            .arg(&out)
            .assert()
            .success();
        fs::read_to_string(out).unwrap()
    };
    assert_eq!(run("a.csv"), run("b.csv"));
}

#[test]
fn aep_run_json_summary() {
    let dir = tempdir().unwrap();
    let plant = PlantFixture::write(dir.path());
    let out = dir.path().join("aep.csv");
    let assert = Command::cargo_bin("aep")
        .unwrap()
        .arg("run")
        .args(plant.args())
        .args(["--num-sim", "5", "--seed", "3", "--json", "-o"])
        .arg(&out)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["simulations"], 5);
    assert!(summary["aep_mean_gwh"].as_f64().unwrap() > 0.0);
}

#[test]
fn machine_learning_needs_daily_data() {
    let dir = tempdir().unwrap();
    let plant = PlantFixture::write(dir.path());
    Command::cargo_bin("aep")
        .unwrap()
        .arg("run")
        .args(plant.args())
        .args(["--reg-model", "etr", "-o"])
        .arg(dir.path().join("aep.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("monthly time resolution"));
}

#[test]
fn unknown_product_fails() {
    let dir = tempdir().unwrap();
    let plant = PlantFixture::write(dir.path());
    Command::cargo_bin("aep")
        .unwrap()
        .arg("run")
        .args(plant.args())
        .args(["--products", "era5", "-o"])
        .arg(dir.path().join("aep.csv"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("era5"));
}

#[test]
fn aep_table_exports_the_operating_table() {
    let dir = tempdir().unwrap();
    let plant = PlantFixture::write(dir.path());
    let out = dir.path().join("table.csv");
    Command::cargo_bin("aep")
        .unwrap()
        .arg("table")
        .args(plant.args())
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("24"));
    let table = fs::read_to_string(&out).unwrap();
    assert_eq!(table.lines().count(), POR_MONTHS + 1);
}

#[test]
fn config_init_writes_a_loadable_template() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("aep.toml");
    Command::cargo_bin("aep")
        .unwrap()
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .success();
    assert!(fs::read_to_string(&path).unwrap().contains("uncertainty_meter"));

    // refuses to overwrite without --force
    Command::cargo_bin("aep")
        .unwrap()
        .args(["config", "init", "-o"])
        .arg(&path)
        .assert()
        .failure();

    Command::cargo_bin("aep")
        .unwrap()
        .args(["config", "show", "--seed", "5", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("seed = 5"))
        .stdout(predicate::str::contains("reg_model = \"lin\""));
}

#[test]
fn config_show_rejects_bad_flags() {
    Command::cargo_bin("aep")
        .unwrap()
        .args(["config", "show", "--reg-temperature", "maybe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reg_temperature"));
}
