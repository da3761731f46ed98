use log::{info, warn};
use std::path::{Path, PathBuf};

use crate::config::{ConverterSettings, StepConfig};
use crate::error::{ConvertError, Result};
use crate::io::input::{count_frames, ingest_with, ConversionBundle, FrameKey};
use crate::io::output::{write_ex, DocumentSummary};

/// Where converted documents go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Next to the CSV files, named after the output settings.
    #[default]
    Default,
    /// This exact file. With several frames every frame is written here and
    /// the last one wins.
    File(PathBuf),
    /// Inside this directory, named after the output settings.
    Directory(PathBuf),
}

#[derive(Debug, Clone)]
pub struct ConvertOptions {
    pub input_dir: PathBuf,
    pub frame_count: usize,
    pub output: OutputTarget,
    pub settings: ConverterSettings,
}

impl ConvertOptions {
    pub fn new(input_dir: impl Into<PathBuf>, frame_count: usize) -> Self {
        Self {
            input_dir: input_dir.into(),
            frame_count,
            output: OutputTarget::Default,
            settings: ConverterSettings::default(),
        }
    }

    fn output_path(&self, frame: Option<&FrameKey>) -> PathBuf {
        match &self.output {
            OutputTarget::Default => self.input_dir.join(self.settings.output.file_name(frame)),
            OutputTarget::File(path) => path.clone(),
            OutputTarget::Directory(dir) => dir.join(self.settings.output.file_name(frame)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionReport {
    /// Step configuration the conversion ran with, handed back unchanged.
    pub config: StepConfig,
    /// One entry per document written, in writing order.
    pub documents: Vec<DocumentSummary>,
}

impl ConversionReport {
    pub fn written_paths(&self) -> Vec<&Path> {
        self.documents.iter().map(|d| d.path.as_path()).collect()
    }
}

/// Converts the CSV files in `options.input_dir` into EX documents, one per
/// frame.
pub fn convert(options: &ConvertOptions) -> Result<ConversionReport> {
    let input_dir = &options.input_dir;
    if !input_dir.exists() {
        return Err(ConvertError::MissingInputPath(input_dir.clone()));
    }

    let bundle = ingest_with(
        input_dir,
        options.frame_count,
        options.settings.ingest.frame_grouping,
    )?;
    if bundle.is_empty() {
        return Err(ConvertError::EmptyIngestionResult(input_dir.clone()));
    }
    info!(
        "Ingested {} points from {}",
        bundle.point_count(),
        input_dir.display()
    );

    let mut documents = Vec::new();
    match &bundle {
        ConversionBundle::Single(surfaces) => {
            documents.push(write_ex(&options.output_path(None), surfaces)?);
        }
        ConversionBundle::Multi(frames) => {
            if let OutputTarget::File(path) = &options.output {
                if frames.len() > 1 {
                    warn!(
                        "{} frames all target {}; only the last frame is kept",
                        frames.len(),
                        path.display()
                    );
                }
            }
            for (frame, surfaces) in frames {
                documents.push(write_ex(&options.output_path(Some(frame)), surfaces)?);
            }
        }
    }

    Ok(ConversionReport {
        config: options.settings.step.clone(),
        documents,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub report: ConversionReport,
    /// Directory holding the written documents, as offered to the next step.
    pub output_dir: PathBuf,
}

/// Runs the converter as a workflow step: the frame count is taken from the
/// number of aortic root files and documents go to `output_dir` when given.
pub fn run_step(
    settings: &ConverterSettings,
    input_dir: Option<&Path>,
    output_dir: Option<&Path>,
) -> Result<StepOutcome> {
    if !settings.step.is_configured() {
        return Err(ConvertError::Config("step has no identifier".into()));
    }
    let input_dir =
        input_dir.ok_or_else(|| ConvertError::Config("no input directory connected".into()))?;
    if !input_dir.exists() {
        return Err(ConvertError::MissingInputPath(input_dir.to_path_buf()));
    }

    let frame_count = count_frames(input_dir)?;
    info!(
        "Step '{}': {} frame(s) detected in {}",
        settings.step.identifier,
        frame_count,
        input_dir.display()
    );

    let options = ConvertOptions {
        input_dir: input_dir.to_path_buf(),
        frame_count,
        output: output_dir.map_or(OutputTarget::Default, |d| {
            OutputTarget::Directory(d.to_path_buf())
        }),
        settings: settings.clone(),
    };
    let report = convert(&options)?;

    let written_dir = report
        .documents
        .last()
        .and_then(|d| d.path.parent())
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(input_dir);
    let output_dir =
        std::fs::canonicalize(written_dir).map_err(|e| ConvertError::io(written_dir, e))?;

    Ok(StepOutcome { report, output_dir })
}
