//! Engine configuration files and command-line overrides.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use aep_algo::{AepConfig, Flag};
use aep_ts::PlantFiles;
use anyhow::{bail, Context, Result};
use tracing::warn;

use crate::cli::{PlantArgs, SettingsArgs};

/// Written by `aep config init`; parses to [`AepConfig::default`].
pub const TEMPLATE: &str = r#"# Monte Carlo AEP configuration
#
# Every key is optional. Missing keys take the default shown here.

# Meter revenue data uncertainty (fraction)
uncertainty_meter = 0.005
# Reported availability and curtailment uncertainty (fraction)
uncertainty_losses = 0.05
# Long-term windiness window in whole years [min, max]
uncertainty_windiness = [10, 20]
# Outlier filter wind-bin threshold in m/s [min, max]
uncertainty_wind_bin_thresh = [1.0, 3.0]
# Combined loss threshold for a usable period, percent [min, max]
uncertainty_loss_max = [10, 20]
# Max power filter as a fraction of the largest period energy [min, max]
uncertainty_max_power_filter = [0.8, 0.9]
# Data coverage threshold below which a period is discarded (fraction)
uncertainty_nan_energy = 0.01

# "M" (monthly) or "D" (daily)
time_resolution = "M"
# "lin", "gbm", "etr" or "gam"; the last three need daily resolution
reg_model = "lin"
# Extra regression inputs: true/false or "Y"/"N"
reg_temperature = false
reg_winddirection = false

# Uncomment for reproducible runs
# seed = 42

# Fraction of usable periods each regression is fitted on
subsample_fraction = 0.8
# Hyperparameter candidates and cross-validation folds for gbm/etr/gam
ml_search_iterations = 5
ml_cv_folds = 2
# Drop periods far off the binned power curve (needs plant capacity)
power_curve_filter = false
# Run simulations on the thread pool
parallel = false
"#;

/// Read a TOML configuration; no path or a missing file gives the defaults.
pub fn load_config(path: Option<&Path>) -> Result<AepConfig> {
    let Some(path) = path else {
        return Ok(AepConfig::default());
    };
    if !path.exists() {
        warn!("configuration file {} not found, using defaults", path.display());
        return Ok(AepConfig::default());
    }
    let contents =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let config: AepConfig =
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))?;
    Ok(config)
}

/// Load `--config` and apply the command-line overrides.
pub fn resolve_config(args: &SettingsArgs) -> Result<AepConfig> {
    let mut config = load_config(args.config.as_deref())?;
    apply_overrides(&mut config, args);
    Ok(config)
}

pub fn apply_overrides(config: &mut AepConfig, args: &SettingsArgs) {
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    if let Some(resolution) = &args.time_resolution {
        config.time_resolution = resolution.clone();
    }
    if let Some(model) = &args.reg_model {
        config.reg_model = model.clone();
    }
    if let Some(flag) = &args.reg_temperature {
        config.reg_temperature = Flag::Text(flag.clone());
    }
    if let Some(flag) = &args.reg_winddirection {
        config.reg_winddirection = Flag::Text(flag.clone());
    }
    if args.parallel {
        config.parallel = true;
    }
}

/// Write [`TEMPLATE`] to `out`, refusing to clobber an existing file unless forced.
pub fn write_template(out: &Path, force: bool) -> Result<()> {
    if out.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", out.display());
    }
    if let Some(dir) = out.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(out, TEMPLATE).with_context(|| format!("writing {}", out.display()))
}

/// Split a `NAME=PATH` reanalysis argument.
pub fn parse_product(spec: &str) -> Result<(String, PathBuf)> {
    match spec.split_once('=') {
        Some((name, path)) if !name.trim().is_empty() && !path.trim().is_empty() => {
            Ok((name.trim().to_string(), PathBuf::from(path.trim())))
        }
        _ => bail!("reanalysis must be given as NAME=PATH, got '{spec}'"),
    }
}

pub fn plant_files(args: &PlantArgs) -> Result<PlantFiles> {
    let mut reanalysis = BTreeMap::new();
    for spec in &args.reanalysis {
        let (name, path) = parse_product(spec)?;
        if reanalysis.insert(name.clone(), path).is_some() {
            bail!("reanalysis product '{name}' given more than once");
        }
    }
    Ok(PlantFiles {
        meter: args.meter.clone(),
        curtailment: args.curtailment.clone(),
        reanalysis,
        capacity_mw: args.capacity_mw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_parses_to_defaults() {
        let config: AepConfig = toml::from_str(TEMPLATE).unwrap();
        assert_eq!(config, AepConfig::default());
    }

    #[test]
    fn overrides_win_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aep.toml");
        fs::write(&path, "reg_model = \"lin\"\nseed = 1\n").unwrap();
        let args = SettingsArgs {
            config: Some(path),
            seed: Some(9),
            time_resolution: Some("D".into()),
            reg_model: Some("gbm".into()),
            reg_winddirection: Some("Y".into()),
            ..SettingsArgs::default()
        };
        let config = resolve_config(&args).unwrap();
        assert_eq!(config.seed, Some(9));
        assert_eq!(config.reg_model, "gbm");
        assert_eq!(config.time_resolution, "D");
        assert_eq!(config.reg_winddirection, Flag::Text("Y".into()));
        assert!(config.validate().unwrap().wind_direction);
    }

    #[test]
    fn missing_config_file_gives_defaults() {
        let missing = load_config(Some(Path::new("/nonexistent/aep.toml"))).unwrap();
        assert_eq!(missing, AepConfig::default());
        assert_eq!(load_config(None).unwrap(), AepConfig::default());
    }

    #[test]
    fn malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aep.toml");
        fs::write(&path, "uncertainty_meter = \"lots\"\n").unwrap();
        assert!(load_config(Some(&path)).is_err());
    }

    #[test]
    fn product_specs() {
        let (name, path) = parse_product("era5=data/era5.csv").unwrap();
        assert_eq!(name, "era5");
        assert_eq!(path, PathBuf::from("data/era5.csv"));
        assert!(parse_product("era5").is_err());
        assert!(parse_product("=x.csv").is_err());
    }
}
