pub mod email;
pub mod manager;
pub mod matcher;
pub mod name;
pub mod normalizer;
pub mod phone;
pub mod quality;
pub mod url;

pub use manager::DuplicateScanner;
pub use matcher::ContactMatcher;
pub use normalizer::ContactNormalizer;
pub use quality::QualityScorer;
