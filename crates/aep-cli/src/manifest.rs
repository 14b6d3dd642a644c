use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub run_id: String,
    pub command: String,
    pub version: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub outputs: Vec<String>,
    pub params: Vec<Param>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub value: String,
}

/// Write `run-<uuid>.json` next to the first output and return its path.
pub fn record_manifest(
    outputs: &[PathBuf],
    command: &str,
    seed: Option<u64>,
    params: &[(&str, String)],
) -> Result<PathBuf> {
    let run_id = Uuid::new_v4().to_string();
    let dir = outputs
        .first()
        .and_then(|p| p.parent())
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();
    fs::create_dir_all(&dir)?;
    let manifest = ManifestEntry {
        run_id: run_id.clone(),
        command: command.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
        seed,
        outputs: outputs.iter().map(|p| p.display().to_string()).collect(),
        params: params
            .iter()
            .map(|(k, v)| Param {
                name: k.to_string(),
                value: v.clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    let path = dir.join(format!("run-{}.json", run_id));
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(path)
}

pub fn read_manifest(path: &Path) -> Result<ManifestEntry> {
    let json =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let manifest = serde_json::from_str(&json)?;
    Ok(manifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("aep.parquet");
        let path = record_manifest(
            &[out.clone()],
            "run",
            Some(11),
            &[("num_sim", "50".to_string())],
        )
        .unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        let manifest = read_manifest(&path).unwrap();
        assert_eq!(manifest.command, "run");
        assert_eq!(manifest.seed, Some(11));
        assert_eq!(manifest.outputs, vec![out.display().to_string()]);
        assert_eq!(manifest.params[0].name, "num_sim");
        assert_eq!(manifest.params[0].value, "50");
    }
}
