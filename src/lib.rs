// src/lib.rs
pub mod db;
pub mod engine;
pub mod error;
pub mod matching;
pub mod merging;
pub mod models;
pub mod utils;

pub use engine::DedupEngine;
pub use error::DedupError;
