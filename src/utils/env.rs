// src/utils/env.rs

use log::{info, warn};

/// Loads a `.env` file from the working directory (or a parent) if one exists.
/// Variables already present in the environment win.
pub fn load_env() {
    match dotenv::dotenv() {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(dotenv::Error::Io(_)) => {
            info!("No .env file found, using system environment variables")
        }
        Err(e) => warn!("Failed to parse .env file: {}. Using system environment variables", e),
    }
}

/// Loads variables from an explicit env file path.
pub fn load_env_from_file(file_path: &str) {
    match dotenv::from_filename(file_path) {
        Ok(_) => info!("Loaded environment from {}", file_path),
        Err(e) => warn!(
            "Could not load env file '{}': {}. Proceeding with system environment variables.",
            file_path, e
        ),
    }
}
