pub mod detector;
pub mod extrema;

pub use detector::{DetectorOutcome, PatternDetector};
pub use extrema::find_extrema;
