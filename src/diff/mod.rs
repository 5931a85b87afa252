//! Screenshot diff engine
//!
//! Compares two run directories file by file. Identical bytes are `SAME`
//! without decoding; otherwise images of equal size are `SAME` while the
//! number of differing pixels stays within `tolerance_rate * width * height`.

mod compare;
pub mod visualize;

pub use compare::{CompareResult, ComparedFile, DiffEngine, DEFAULT_TOLERANCE_RATE, IMAGE_EXTENSIONS};
pub use visualize::{difference_image, visualize};
