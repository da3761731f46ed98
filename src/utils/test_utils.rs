use csv::Writer;
use std::f64::consts::PI;
use std::fs;
use std::path::{Path, PathBuf};

use crate::io::input::PointRecord;

/// Generates points around an ellipse at roughly constant height, like one
/// short-axis slice of a ventricle surface.
pub fn generate_ellipse_points(
    major: f64,
    minor: f64,
    num_points: usize,
    height: f64,
    translation: (f64, f64),
) -> Vec<PointRecord> {
    (0..num_points)
        .map(|i| {
            let theta = 2.0 * PI * (i as f64) / (num_points as f64);
            PointRecord::new(
                major * theta.cos() + translation.0,
                minor * theta.sin() + translation.1,
                height + 0.1 * theta.sin(),
            )
        })
        .collect()
}

/// Writes `points` as an `x,y,z` CSV with a header row.
pub fn write_surface_csv(dir: &Path, file_name: &str, points: &[PointRecord]) -> PathBuf {
    let path = dir.join(file_name);
    let mut wtr = Writer::from_path(&path).expect("create surface csv");
    wtr.write_record(["x", "y", "z"]).expect("write header");
    for p in points {
        wtr.write_record([p.x.to_string(), p.y.to_string(), p.z.to_string()])
            .expect("write row");
    }
    wtr.flush().expect("flush surface csv");
    path
}

/// Writes raw file contents, for rows the csv writer would not produce.
pub fn write_rows(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
    let path = dir.join(file_name);
    fs::write(&path, contents).expect("write test file");
    path
}
