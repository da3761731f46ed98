use csv::{ReaderBuilder, Trim};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use super::surfaces;
use crate::error::{ConvertError, Result};

/// Utility: detect whether the file uses comma or tab as delimiter.
fn detect_delimiter<P: AsRef<Path>>(path: P) -> Result<u8> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ConvertError::io(path, e))?;
    let mut reader = BufReader::new(file);
    let mut first_line = String::new();
    reader
        .read_line(&mut first_line)
        .map_err(|e| ConvertError::io(path, e))?;

    let tabs = first_line.matches('\t').count();
    let commas = first_line.matches(',').count();

    if tabs > commas {
        Ok(b'\t')
    } else {
        Ok(b',')
    }
}

/// One surface point read from a CSV row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointRecord {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl PointRecord {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn coordinates(&self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }

    /// Reads the points of one surface file.
    ///
    /// The first row is a header. Only the first three columns are used and
    /// every one of them must parse as a float.
    pub fn read_surface_file<P: AsRef<Path>>(path: P) -> Result<Vec<PointRecord>> {
        let path = path.as_ref();
        let csv_error = |source| ConvertError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let delim = detect_delimiter(path)?;
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delim)
            .flexible(true)
            .trim(Trim::All)
            .from_path(path)
            .map_err(csv_error)?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(csv_error)?;
            // whitespace-only line
            if record.iter().all(str::is_empty) {
                continue;
            }
            let line = record.position().map_or(0, |p| p.line());

            let mut xyz = [0.0; 3];
            for (column, value) in xyz.iter_mut().enumerate() {
                let cell = record.get(column).unwrap_or("");
                *value = cell.parse().map_err(|_| ConvertError::RowParse {
                    path: path.to_path_buf(),
                    line,
                    column: column + 1,
                    value: cell.to_string(),
                })?;
            }
            points.push(PointRecord::new(xyz[0], xyz[1], xyz[2]));
        }

        Ok(points)
    }
}

/// Points per surface group name.
pub type SurfaceMap = BTreeMap<String, Vec<PointRecord>>;

/// Time frame identifier taken from the last `_` segment of a file name.
///
/// Keys order by the numeric value of their digits, so `"2"` sorts before
/// `"10"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey(String);

impl FrameKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FrameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for FrameKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare_digit_keys(&digit_key(&self.0), &digit_key(&other.0)).then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for FrameKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Surface data for one frame, or for each of several frames.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionBundle {
    Single(SurfaceMap),
    Multi(BTreeMap<FrameKey, SurfaceMap>),
}

impl ConversionBundle {
    /// True when no surface was read in any frame.
    pub fn is_empty(&self) -> bool {
        match self {
            ConversionBundle::Single(surfaces) => surfaces.is_empty(),
            ConversionBundle::Multi(frames) => frames.values().all(|s| s.is_empty()),
        }
    }

    pub fn point_count(&self) -> usize {
        let count = |surfaces: &SurfaceMap| surfaces.values().map(Vec::len).sum::<usize>();
        match self {
            ConversionBundle::Single(surfaces) => count(surfaces),
            ConversionBundle::Multi(frames) => frames.values().map(count).sum(),
        }
    }
}

/// How multi-frame files are collected into frame buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrameGrouping {
    /// One bucket per distinct frame key, whatever the file order.
    #[default]
    ByKey,
    /// Files are walked in digit-key order and the bucket is reset every
    /// time the frame key differs from the previous file's, so a key seen
    /// again later replaces the rows gathered under it before.
    Sequential,
}

/// Reads every surface file in `directory`.
///
/// `frame_count == 1` reads `<code>.csv` files into a single frame; any
/// other count reads `<code>_<frame>.csv` files into one bucket per frame.
pub fn ingest<P: AsRef<Path>>(directory: P, frame_count: usize) -> Result<ConversionBundle> {
    ingest_with(directory, frame_count, FrameGrouping::default())
}

pub fn ingest_with<P: AsRef<Path>>(
    directory: P,
    frame_count: usize,
    grouping: FrameGrouping,
) -> Result<ConversionBundle> {
    let directory = directory.as_ref();
    if frame_count == 1 {
        read_single_frame(directory).map(ConversionBundle::Single)
    } else {
        read_multi_frame(directory, grouping).map(ConversionBundle::Multi)
    }
}

fn read_single_frame(directory: &Path) -> Result<SurfaceMap> {
    let mut groups = SurfaceMap::new();
    for path in list_files(directory)? {
        let name = file_name(&path);
        let code = name.split('.').next().unwrap_or_default();
        let Some(group) = surfaces::resolve(code) else {
            debug!("Skipping {}: '{}' is not a surface code", name, code);
            continue;
        };

        let points = PointRecord::read_surface_file(&path)?;
        info!("Read {} points for '{}' from {}", points.len(), group, name);
        groups.entry(group.to_string()).or_default().extend(points);
    }
    Ok(groups)
}

fn read_multi_frame(
    directory: &Path,
    grouping: FrameGrouping,
) -> Result<BTreeMap<FrameKey, SurfaceMap>> {
    let mut files = list_files(directory)?;
    // stable: names with equal digit content keep their name order
    files.sort_by(|a, b| {
        compare_digit_keys(&digit_key(&file_name(a)), &digit_key(&file_name(b)))
    });

    let mut frames: BTreeMap<FrameKey, SurfaceMap> = BTreeMap::new();
    let mut current_frame: Option<FrameKey> = None;

    for path in files {
        let name = file_name(&path);
        let (code, frame) = split_frame_name(&name);
        let frame = FrameKey::new(frame);
        let group = surfaces::resolve(&code);

        if grouping == FrameGrouping::Sequential && current_frame.as_ref() != Some(&frame) {
            frames.insert(frame.clone(), SurfaceMap::new());
        }
        current_frame = Some(frame.clone());

        let Some(group) = group else {
            debug!("Skipping {}: '{}' is not a surface code", name, code);
            continue;
        };

        let points = PointRecord::read_surface_file(&path)?;
        info!(
            "Read {} points for '{}' (frame {}) from {}",
            points.len(),
            group,
            frame,
            name
        );
        let bucket = frames.entry(frame).or_default();
        match grouping {
            FrameGrouping::ByKey => bucket.entry(group.to_string()).or_default().extend(points),
            FrameGrouping::Sequential => {
                bucket.insert(group.to_string(), points);
            }
        }
    }

    Ok(frames)
}

/// Splits `RV_freewall_12.csv` into surface code `RV_freewall` and frame
/// `12`. A stem without `_` yields an empty code.
pub fn split_frame_name(file_name: &str) -> (String, String) {
    let stem = file_name.split('.').next().unwrap_or_default();
    match stem.rsplit_once('_') {
        Some((code, frame)) => (code.to_string(), frame.to_string()),
        None => (String::new(), stem.to_string()),
    }
}

/// All digits of `name` with leading zeros removed; empty means zero.
fn digit_key(name: &str) -> String {
    let digits: String = name.chars().filter(char::is_ascii_digit).collect();
    digits.trim_start_matches('0').to_string()
}

/// Numeric comparison of two `digit_key` values of any length.
fn compare_digit_keys(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Number of frames in a workflow input directory: one per aortic root
/// file (`AV*.csv`), at least one.
pub fn count_frames<P: AsRef<Path>>(directory: P) -> Result<usize> {
    let count = list_files(directory.as_ref())?
        .iter()
        .map(|p| file_name(p))
        .filter(|name| name.starts_with("AV") && name.ends_with(".csv"))
        .count();
    Ok(count.max(1))
}

/// Regular files directly inside `directory`, sorted by name.
fn list_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory).map_err(|e| ConvertError::io(directory, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ConvertError::io(directory, e))?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod input_tests {
    use super::*;
    use crate::utils::test_utils::{write_rows, write_surface_csv};
    use approx::assert_relative_eq;
    use tempfile::TempDir;

    fn points(n: usize, offset: f64) -> Vec<PointRecord> {
        (0..n)
            .map(|i| PointRecord::new(offset + i as f64, 2.0 * i as f64, -0.5))
            .collect()
    }

    #[test]
    fn test_read_surface_file_uses_first_three_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(
            dir.path(),
            "Epi.csv",
            "x,y,z,label\n1.5, 2.5 ,3.5,a\n-1e-3,0,4,b\n",
        );
        let points = PointRecord::read_surface_file(&path).unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], PointRecord::new(1.5, 2.5, 3.5));
        assert_relative_eq!(points[1].x, -0.001);
    }

    #[test]
    fn test_read_surface_file_detects_tabs() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(dir.path(), "MV.csv", "x\ty\tz\n1\t2\t3\n");
        let points = PointRecord::read_surface_file(&path).unwrap();
        assert_eq!(points, vec![PointRecord::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn test_read_surface_file_skips_whitespace_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(dir.path(), "Epi.csv", "x,y,z\n1,2,3\n   \n4,5,6\n \t \n");
        let points = PointRecord::read_surface_file(&path).unwrap();
        assert_eq!(
            points,
            vec![PointRecord::new(1.0, 2.0, 3.0), PointRecord::new(4.0, 5.0, 6.0)]
        );
    }

    #[test]
    fn test_read_surface_file_header_only() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(dir.path(), "PV.csv", "x,y,z\n");
        assert!(PointRecord::read_surface_file(&path).unwrap().is_empty());
    }

    #[test]
    fn test_read_surface_file_rejects_bad_cell() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(dir.path(), "Epi.csv", "x,y,z\n1,2,3\n4,oops,6\n");
        let err = PointRecord::read_surface_file(&path).unwrap_err();
        match err {
            ConvertError::RowParse {
                line,
                column,
                value,
                ..
            } => {
                assert_eq!(line, 3);
                assert_eq!(column, 2);
                assert_eq!(value, "oops");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_read_surface_file_rejects_short_row() {
        let dir = TempDir::new().unwrap();
        let path = write_rows(dir.path(), "Epi.csv", "x,y,z\n1,2\n");
        let err = PointRecord::read_surface_file(&path).unwrap_err();
        assert!(matches!(err, ConvertError::RowParse { column: 3, .. }));
    }

    #[test]
    fn test_single_frame_groups_by_surface() {
        let dir = TempDir::new().unwrap();
        write_surface_csv(dir.path(), "Epi.csv", &points(3, 0.0));
        write_surface_csv(dir.path(), "LVendo.csv", &points(2, 10.0));
        write_surface_csv(dir.path(), "Foo.csv", &points(4, 20.0));
        write_rows(dir.path(), "notes.txt", "not,a,surface\n");

        let bundle = ingest(dir.path(), 1).unwrap();
        let ConversionBundle::Single(surfaces) = bundle else {
            panic!("expected a single frame");
        };
        let keys: Vec<&str> = surfaces.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["endocardium of left ventricle", "epicardium"]);
        assert_eq!(surfaces["epicardium"], points(3, 0.0));
        assert_eq!(surfaces["endocardium of left ventricle"], points(2, 10.0));
    }

    #[test]
    fn test_single_frame_right_ventricle_files_accumulate() {
        let dir = TempDir::new().unwrap();
        write_surface_csv(dir.path(), "RV_freewall.csv", &points(2, 0.0));
        write_surface_csv(dir.path(), "RV_septum.csv", &points(3, 5.0));

        let ConversionBundle::Single(surfaces) = ingest(dir.path(), 1).unwrap() else {
            panic!("expected a single frame");
        };
        let rv = &surfaces["endocardium of right ventricle"];
        assert_eq!(rv.len(), 5);
        assert_eq!(rv[..2], points(2, 0.0)[..]);
        assert_eq!(rv[2..], points(3, 5.0)[..]);
    }

    #[test]
    fn test_unknown_surface_only_gives_empty_bundle() {
        let dir = TempDir::new().unwrap();
        write_surface_csv(dir.path(), "Foo.csv", &points(3, 0.0));
        let bundle = ingest(dir.path(), 1).unwrap();
        assert!(bundle.is_empty());
        assert_eq!(bundle.point_count(), 0);
    }

    #[test]
    fn test_multi_frame_buckets_by_frame() {
        let dir = TempDir::new().unwrap();
        write_surface_csv(dir.path(), "Epi_1.csv", &points(1, 0.0));
        write_surface_csv(dir.path(), "Epi_2.csv", &points(1, 1.0));
        write_surface_csv(dir.path(), "RV_septum_2.csv", &points(2, 2.0));
        write_surface_csv(dir.path(), "Foo_3.csv", &points(2, 3.0));

        let ConversionBundle::Multi(frames) = ingest(dir.path(), 2).unwrap() else {
            panic!("expected multiple frames");
        };
        let keys: Vec<&str> = frames.keys().map(FrameKey::as_str).collect();
        assert_eq!(keys, vec!["1", "2"]);
        assert_eq!(frames[&FrameKey::new("1")]["epicardium"], points(1, 0.0));
        assert_eq!(frames[&FrameKey::new("2")]["epicardium"], points(1, 1.0));
        assert_eq!(
            frames[&FrameKey::new("2")]["endocardium of right ventricle"].len(),
            2
        );
    }

    #[test]
    fn test_sequential_grouping_replaces_reallocated_bucket() {
        let dir = TempDir::new().unwrap();
        // all three have digit content 1, so name order puts frame "01"
        // between the two frame "1" files
        write_surface_csv(dir.path(), "AV_1.csv", &points(1, 0.0));
        write_surface_csv(dir.path(), "Epi_01.csv", &points(1, 1.0));
        write_surface_csv(dir.path(), "MV_1.csv", &points(1, 2.0));

        let ConversionBundle::Multi(by_key) =
            ingest_with(dir.path(), 2, FrameGrouping::ByKey).unwrap()
        else {
            panic!("expected multiple frames");
        };
        assert_eq!(by_key[&FrameKey::new("1")].len(), 2);

        let ConversionBundle::Multi(sequential) =
            ingest_with(dir.path(), 2, FrameGrouping::Sequential).unwrap()
        else {
            panic!("expected multiple frames");
        };
        let frame_one = &sequential[&FrameKey::new("1")];
        assert_eq!(frame_one.len(), 1);
        assert!(frame_one.contains_key("root of mitral valve"));
        assert!(sequential[&FrameKey::new("01")].contains_key("epicardium"));
    }

    #[test]
    fn test_sequential_grouping_keeps_unresolved_frames() {
        let dir = TempDir::new().unwrap();
        write_surface_csv(dir.path(), "Foo_4.csv", &points(1, 0.0));
        let ConversionBundle::Multi(frames) =
            ingest_with(dir.path(), 3, FrameGrouping::Sequential).unwrap()
        else {
            panic!("expected multiple frames");
        };
        assert!(frames[&FrameKey::new("4")].is_empty());
        assert!(ConversionBundle::Multi(frames).is_empty());
    }

    #[test]
    fn test_split_frame_name() {
        assert_eq!(
            split_frame_name("RV_freewall_12.csv"),
            ("RV_freewall".to_string(), "12".to_string())
        );
        assert_eq!(split_frame_name("Epi_3.csv"), ("Epi".into(), "3".into()));
        assert_eq!(split_frame_name("Epi.csv"), (String::new(), "Epi".into()));
        assert_eq!(split_frame_name("AV_7.v2.csv"), ("AV".into(), "7".into()));
    }

    #[test]
    fn test_frame_keys_order_numerically() {
        let mut keys = vec![FrameKey::new("10"), FrameKey::new("2"), FrameKey::new("1")];
        keys.sort();
        let sorted: Vec<&str> = keys.iter().map(FrameKey::as_str).collect();
        assert_eq!(sorted, vec!["1", "2", "10"]);
        assert_eq!(
            compare_digit_keys(&digit_key("frame_99999999999999999999999"), &digit_key("x_1")),
            Ordering::Greater
        );
        assert_eq!(digit_key("no digits"), "");
    }

    #[test]
    fn test_count_frames() {
        let dir = TempDir::new().unwrap();
        assert_eq!(count_frames(dir.path()).unwrap(), 1);
        for name in ["AV_1.csv", "AV_2.csv", "AV_3.csv", "Epi_1.csv", "AV_notes.txt"] {
            write_surface_csv(dir.path(), name, &points(1, 0.0));
        }
        assert_eq!(count_frames(dir.path()).unwrap(), 3);
    }

    #[test]
    fn test_missing_directory_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = ingest(dir.path().join("absent"), 1).unwrap_err();
        assert!(matches!(err, ConvertError::Io { .. }));
    }
}
