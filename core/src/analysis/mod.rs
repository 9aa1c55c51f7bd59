pub mod filter;
pub mod normalize;
pub mod peaks;
pub mod ppg;

pub use filter::{FilterCoefficients, FilterConfig};
pub use normalize::{normalize, NormalizationRange, TargetRange};
pub use peaks::{find_extrema, Extremum, PeakDetector, PeakSet};
pub use ppg::{Analysis, FeatureExtractor, FeatureRecord, Parameters};
