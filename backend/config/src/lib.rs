//! `nudge-config`: Nudge runtime configuration management.
//!
//! Provides:
//! - Typed config schema (monitoring, timing, prompts, logging)
//! - YAML loading
//! - Default value application
//! - Deep schema validation
//! - The validated `OutreachSettings` the scheduler consumes

pub mod defaults;
pub mod hours;
pub mod io;
pub mod schema;
pub mod settings;
pub mod validation;

// Re-export most-used types at crate root.
pub use defaults::{apply_all_defaults, DEFAULT_PROMPT};
pub use hours::ActiveHours;
pub use io::{config_dir, config_file_path, load_config, parse_config};
pub use schema::{MonitorMode, NudgeConfig};
pub use settings::{ConfigError, MonitorPolicy, OutreachSettings};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::Result;
use std::path::Path;

/// Load a config file and turn it into validated settings.
///
/// This is the main entry point for loading a config at runtime.
pub async fn load_and_prepare(path: &Path) -> Result<OutreachSettings> {
    let config = load_config(path).await?;
    Ok(OutreachSettings::from_config(config)?)
}
