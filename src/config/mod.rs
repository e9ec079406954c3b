// Configuration management module
// TOML settings under the application base directory, plus interactive editing

pub mod interactive;
pub mod settings;

use std::path::PathBuf;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, GenerationConfig, OllamaConfig, RetrievalConfig};

/// Resolve the base directory: an explicit override wins over the environment and home dir
#[inline]
pub fn get_config_dir(explicit: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(dir) => Ok(dir),
        None => Config::default_base_dir(),
    }
}
