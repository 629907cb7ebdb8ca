pub mod core;
pub mod matching;
pub mod merging;
pub mod stats_models;

pub use self::core::*;
pub use self::matching::*;
pub use self::merging::*;
pub use self::stats_models::*;
