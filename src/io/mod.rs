pub mod input;
pub mod output;
pub mod surfaces;

pub use input::{ingest, ConversionBundle, FrameKey, PointRecord, SurfaceMap};
pub use output::write_ex;
