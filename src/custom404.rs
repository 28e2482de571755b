//! The custom-404 ("soft 404") detector: per-directory body fingerprints,
//! probe scheduling, waiter dedup, and LRU-style cache pruning.

mod detector;
mod key;
mod probes;

pub use detector::{CustomFourZeroFourDetector, ProbeLauncher};
pub use key::directory_key;
