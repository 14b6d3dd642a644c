use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use aep_ts::write_frame;

use crate::results::SimulationResults;

/// Sibling of `output` with `suffix` inserted before the extension:
/// `out/aep.parquet` → `out/aep.diagnostics.parquet`.
pub fn sibling_output_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .unwrap_or_else(|| OsStr::new("output"))
        .to_string_lossy();
    let name = match output.extension().and_then(OsStr::to_str) {
        Some(ext) => format!("{stem}.{suffix}.{ext}"),
        None => format!("{stem}.{suffix}"),
    };
    output.with_file_name(name)
}

/// Write the result table to `output` and the regression diagnostics next to
/// it; the parameter table goes to `parameters` when given. Returns every
/// path written.
pub fn persist_results(
    results: &SimulationResults,
    output: &Path,
    parameters: Option<&Path>,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    let mut frame = results.to_dataframe()?;
    write_frame(&mut frame, output)
        .with_context(|| format!("writing simulation results to {}", output.display()))?;
    written.push(output.to_path_buf());

    let diagnostics = sibling_output_path(output, "diagnostics");
    let mut frame = results.diagnostics_frame()?;
    write_frame(&mut frame, &diagnostics)
        .with_context(|| format!("writing diagnostics to {}", diagnostics.display()))?;
    written.push(diagnostics);

    if let Some(path) = parameters {
        let mut frame = results.parameters.to_dataframe()?;
        write_frame(&mut frame, path)
            .with_context(|| format!("writing simulation parameters to {}", path.display()))?;
        written.push(path.to_path_buf());
    }
    Ok(written)
}
