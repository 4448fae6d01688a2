pub mod features;
pub mod filter;
pub mod indicators;
pub mod inference;
pub mod regime;
pub mod risk;
pub mod signals;

pub use features::FeatureSet;
pub use filter::{ClassProbabilities, ConfidenceFilter};
pub use inference::{InferenceEngine, ProbabilityModel};
pub use regime::RegimeClassifier;
pub use risk::RiskProfile;
pub use signals::{RegimeLookup, SignalStrategy};
