//! Configuration for the converter.
//!
//! [`StepConfig`] is the record a workflow host persists for one converter
//! step; [`ConverterSettings`] is the optional TOML file that tunes ingestion
//! and output naming.

use serde::{Deserialize, Serialize};
use serde_json::ser::PrettyFormatter;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::io::input::{FrameGrouping, FrameKey};

/// Host-side configuration of one converter step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Unique name of the step within its workflow.
    #[serde(default)]
    pub identifier: String,
}

impl StepConfig {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
        }
    }

    /// A step can run once it has an identifier.
    pub fn is_configured(&self) -> bool {
        !self.identifier.trim().is_empty()
    }

    /// JSON with sorted keys and four-space indentation.
    pub fn to_json(&self) -> Result<String> {
        // a Value object is a BTreeMap, so keys come out sorted
        let value = serde_json::to_value(self).map_err(|e| ConvertError::Config(e.to_string()))?;
        let mut buf = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        value
            .serialize(&mut ser)
            .map_err(|e| ConvertError::Config(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| ConvertError::Config(e.to_string()))
    }

    /// Applies the keys present in `json` on top of the current values.
    pub fn update_from_json(&mut self, json: &str) -> Result<()> {
        let config_error = |e: serde_json::Error| ConvertError::Config(e.to_string());
        let incoming: serde_json::Value = serde_json::from_str(json).map_err(config_error)?;
        let serde_json::Value::Object(incoming) = incoming else {
            return Err(ConvertError::Config("step configuration must be a JSON object".into()));
        };

        let mut merged = serde_json::to_value(&*self).map_err(config_error)?;
        if let serde_json::Value::Object(current) = &mut merged {
            current.extend(incoming);
        }
        *self = serde_json::from_value(merged).map_err(config_error)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestSettings {
    #[serde(default)]
    pub frame_grouping: FrameGrouping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSettings {
    /// File name stem of written documents, before any frame suffix.
    #[serde(default = "default_file_stem")]
    pub file_stem: String,

    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_file_stem() -> String {
    "combined".to_string()
}

fn default_extension() -> String {
    "ex".to_string()
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            file_stem: default_file_stem(),
            extension: default_extension(),
        }
    }
}

impl OutputSettings {
    /// `combined.ex` for a single frame, `combined_<frame>.ex` otherwise.
    pub fn file_name(&self, frame: Option<&FrameKey>) -> String {
        match frame {
            Some(frame) => format!("{}_{}.{}", self.file_stem, frame, self.extension),
            None => format!("{}.{}", self.file_stem, self.extension),
        }
    }
}

/// Settings file contents; every section and key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConverterSettings {
    #[serde(default)]
    pub step: StepConfig,

    #[serde(default)]
    pub ingest: IngestSettings,

    #[serde(default)]
    pub output: OutputSettings,
}

impl ConverterSettings {
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ConvertError::io(path, e))?;
        let settings: ConverterSettings =
            toml::from_str(&content).map_err(|e| ConvertError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string(self).map_err(|e| ConvertError::Config(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConvertError::io(path, e))
    }

    /// Default settings with the step configuration taken from a host's
    /// JSON record.
    pub fn from_step_json(json: &str) -> Result<Self> {
        let mut settings = ConverterSettings::default();
        settings.step.update_from_json(json)?;
        Ok(settings)
    }

    /// Output names must be plain, non-empty file name parts.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in [
            ("output.file_stem", &self.output.file_stem),
            ("output.extension", &self.output.extension),
        ] {
            if value.is_empty() || value.contains(['/', '\\']) {
                return Err(ConvertError::Config(format!(
                    "{} must be a non-empty name without path separators, got {:?}",
                    key, value
                )));
            }
        }
        Ok(())
    }
}
