mod capture;

pub use capture::{CaptureMetadata, load_oriented, read_orientation};
