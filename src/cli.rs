//! Command-line interface.

use anyhow::Context;
use clap::{ArgAction, Parser};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use crate::config::ConverterSettings;
use crate::entry::{convert, ConversionReport, ConvertOptions, OutputTarget};
use crate::error::ConvertError;
use crate::io::input::count_frames;

/// Frame count given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCount {
    Fixed(usize),
    /// One frame per `AV*.csv` file in the input directory.
    Auto,
}

impl FromStr for FrameCount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("auto") {
            return Ok(FrameCount::Auto);
        }
        match s.parse::<usize>() {
            Ok(0) => Err("number of frames must be at least 1".to_string()),
            Ok(n) => Ok(FrameCount::Fixed(n)),
            Err(_) => Err(format!("expected a number of frames or 'auto', got {:?}", s)),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "heartdata-converter")]
#[command(about = "Transform CMI surface data files to ex format.", version)]
pub struct Cli {
    /// Location of the input csv files
    pub input_csvs: PathBuf,

    /// Number of frames, or 'auto' to count the AV*.csv files
    pub n_frames: FrameCount,

    /// Location of the output ex file [defaults to the input directory]
    #[arg(long, conflicts_with = "output_dir")]
    pub output_ex: Option<PathBuf>,

    /// Directory for the output ex files, named as in the input directory
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Path to a TOML settings file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Step identifier recorded in the conversion report
    #[arg(long)]
    pub identifier: Option<String>,

    /// Increase verbosity
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn load_settings(path: Option<&Path>) -> ConverterSettings {
    match path {
        Some(path) => match ConverterSettings::from_toml(path) {
            Ok(settings) => {
                info!("Loaded settings from: {}", path.display());
                settings
            }
            Err(e) => {
                warn!(
                    "Failed to load settings from {}: {}, using defaults",
                    path.display(),
                    e
                );
                ConverterSettings::default()
            }
        },
        None => ConverterSettings::default(),
    }
}

/// Builds the conversion options for `cli` and runs the conversion.
pub fn execute(cli: &Cli) -> anyhow::Result<ConversionReport> {
    let mut settings = load_settings(cli.config.as_deref());
    if let Some(identifier) = &cli.identifier {
        settings.step.identifier = identifier.clone();
    }

    if !cli.input_csvs.exists() {
        return Err(ConvertError::MissingInputPath(cli.input_csvs.clone()).into());
    }
    let frame_count = match cli.n_frames {
        FrameCount::Fixed(n) => n,
        FrameCount::Auto => {
            let n = count_frames(&cli.input_csvs)?;
            info!("Detected {} frame(s)", n);
            n
        }
    };

    let output = match (&cli.output_ex, &cli.output_dir) {
        (Some(file), _) => OutputTarget::File(file.clone()),
        (None, Some(dir)) => OutputTarget::Directory(dir.clone()),
        (None, None) => OutputTarget::Default,
    };

    let options = ConvertOptions {
        input_dir: cli.input_csvs.clone(),
        frame_count,
        output,
        settings,
    };
    convert(&options).with_context(|| format!("converting {}", cli.input_csvs.display()))
}

/// Exit status for a failed run: -1 missing input, -2 nothing ingested, 1
/// anything else.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ConvertError>()
        .map_or(1, ConvertError::exit_code)
}

fn print_summary(report: &ConversionReport, cli: &Cli, start: Instant) {
    println!();
    println!("Conversion complete");
    println!("  {:<16}: {}", "Input", cli.input_csvs.display());
    if !report.config.identifier.is_empty() {
        println!("  {:<16}: {}", "Identifier", report.config.identifier);
    }
    for doc in &report.documents {
        println!(
            "  {:<16}: {} nodes, {} groups",
            doc.path.display(),
            doc.node_count,
            doc.groups.len()
        );
    }
    println!("  {:<16}: {:.2?}", "Duration", start.elapsed());
}

/// Parses the command line, runs the conversion and returns the process exit
/// status.
pub fn run() -> i32 {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let start = Instant::now();
    match execute(&cli) {
        Ok(report) => {
            print_summary(&report, &cli, start);
            0
        }
        Err(e) => {
            error!("{:#}", e);
            exit_code(&e)
        }
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use crate::io::input::PointRecord;
    use crate::utils::test_utils::write_surface_csv;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("heartdata-converter").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_frame_count_parsing() {
        assert_eq!("3".parse::<FrameCount>(), Ok(FrameCount::Fixed(3)));
        assert_eq!("AUTO".parse::<FrameCount>(), Ok(FrameCount::Auto));
        assert!("0".parse::<FrameCount>().is_err());
        assert!("two".parse::<FrameCount>().is_err());
    }

    #[test]
    fn test_parse_arguments() {
        let cli = parse(&["data", "2", "--output-ex", "out/heart.ex", "-vv"]);
        assert_eq!(cli.input_csvs, PathBuf::from("data"));
        assert_eq!(cli.n_frames, FrameCount::Fixed(2));
        assert_eq!(cli.output_ex, Some(PathBuf::from("out/heart.ex")));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_output_flags_conflict() {
        let result = Cli::try_parse_from([
            "heartdata-converter",
            "data",
            "1",
            "--output-ex",
            "a.ex",
            "--output-dir",
            "out",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_execute_missing_input_exit_code() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent");
        let cli = parse(&[missing.to_str().unwrap(), "1"]);
        let err = execute(&cli).unwrap_err();
        assert_eq!(exit_code(&err), -1);
    }

    #[test]
    fn test_execute_empty_input_exit_code() {
        let dir = TempDir::new().unwrap();
        let cli = parse(&[dir.path().to_str().unwrap(), "1"]);
        let err = execute(&cli).unwrap_err();
        assert_eq!(exit_code(&err), -2);
    }

    #[test]
    fn test_execute_auto_frames_with_identifier() {
        let dir = TempDir::new().unwrap();
        let point = [PointRecord::new(1.0, 2.0, 3.0)];
        for name in ["AV_1.csv", "AV_2.csv", "Epi_1.csv", "Epi_2.csv"] {
            write_surface_csv(dir.path(), name, &point);
        }
        let cli = parse(&[dir.path().to_str().unwrap(), "auto", "--identifier", "step-a"]);
        let report = execute(&cli).unwrap();
        assert_eq!(report.config.identifier, "step-a");
        assert_eq!(report.documents.len(), 2);
        assert!(dir.path().join("combined_1.ex").exists());
        assert!(dir.path().join("combined_2.ex").exists());
    }

    #[test]
    fn test_execute_unreadable_settings_fall_back() {
        let dir = TempDir::new().unwrap();
        write_surface_csv(dir.path(), "Epi.csv", &[PointRecord::new(0.0, 0.0, 0.0)]);
        let settings = dir.path().join("missing.toml");
        let cli = parse(&[
            dir.path().to_str().unwrap(),
            "1",
            "--config",
            settings.to_str().unwrap(),
        ]);
        let report = execute(&cli).unwrap();
        assert_eq!(report.written_paths(), vec![dir.path().join("combined.ex").as_path()]);
    }
}
