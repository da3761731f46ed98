use pyo3::exceptions::{PyFileNotFoundError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::path::Path;

use crate::config::ConverterSettings;
use crate::entry::{convert, run_step, ConvertOptions, OutputTarget};
use crate::error::ConvertError;

fn to_py_err(err: ConvertError) -> PyErr {
    match err {
        ConvertError::MissingInputPath(_) => PyFileNotFoundError::new_err(err.to_string()),
        ConvertError::EmptyIngestionResult(_)
        | ConvertError::RowParse { .. }
        | ConvertError::Config(_) => PyValueError::new_err(err.to_string()),
        _ => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Converts a directory of surface CSV files and returns the written paths.
#[pyfunction]
#[pyo3(name = "convert", signature = (input_csvs, n_frames = 1usize, output_ex = None))]
pub fn convert_py(input_csvs: &str, n_frames: usize, output_ex: Option<&str>) -> PyResult<Vec<String>> {
    let mut options = ConvertOptions::new(input_csvs, n_frames);
    if let Some(path) = output_ex {
        options.output = OutputTarget::File(path.into());
    }
    let report = convert(&options).map_err(to_py_err)?;
    Ok(report
        .written_paths()
        .iter()
        .map(|p| p.display().to_string())
        .collect())
}

/// Runs the converter the way a workflow step does.
///
/// `config` is the step's JSON record. Returns the output directory and the
/// step configuration serialized back to JSON.
#[pyfunction]
#[pyo3(name = "run_step", signature = (config, input_dir, output_dir = None))]
pub fn run_step_py(
    config: &str,
    input_dir: Option<&str>,
    output_dir: Option<&str>,
) -> PyResult<(String, String)> {
    let settings = ConverterSettings::from_step_json(config).map_err(to_py_err)?;
    let outcome = run_step(&settings, input_dir.map(Path::new), output_dir.map(Path::new))
        .map_err(to_py_err)?;
    let config = outcome.report.config.to_json().map_err(to_py_err)?;
    Ok((outcome.output_dir.display().to_string(), config))
}
