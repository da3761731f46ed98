//! Converts per-surface heart point-cloud CSV files into EX node/group files.
//!
//! A directory holds one CSV per anatomical surface (`Epi.csv`,
//! `LVendo.csv`, ...) or, for a beating heart, one per surface and frame
//! (`Epi_1.csv`, `Epi_2.csv`, ...). Each file becomes a named group of
//! `datapoints` nodes carrying a `coordinates` field, and every frame is
//! written to its own EX document.
//!
//! ```no_run
//! use heartdata_converter::entry::{convert, ConvertOptions};
//!
//! let report = convert(&ConvertOptions::new("input/patient_01", 1)).unwrap();
//! println!("{:?}", report.written_paths());
//! ```

pub mod cli;
pub mod config;
pub mod entry;
pub mod error;
pub mod io;
pub mod mesh;
mod utils;

#[cfg(feature = "python")]
mod python_bind;

pub use config::{ConverterSettings, StepConfig};
pub use entry::{convert, run_step, ConversionReport, ConvertOptions, OutputTarget};
pub use error::ConvertError;

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// This is the module importable from Python:
///
/// ```python
/// import heartdata_converter as hdc
/// hdc.convert("input/patient_01", 20)
/// ```
#[cfg(feature = "python")]
#[pymodule]
fn heartdata_converter(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add_function(wrap_pyfunction!(python_bind::convert_py, m)?)?;
    m.add_function(wrap_pyfunction!(python_bind::run_step_py, m)?)?;
    Ok(())
}
