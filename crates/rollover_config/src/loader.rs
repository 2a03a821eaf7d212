//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::path::{Component, Path};

/// Name of the configuration file within the project root.
pub const CONFIG_FILE: &str = "rollover.toml";

/// Loads and validates a `rollover.toml` configuration from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    load_config_file(&project_dir.join(CONFIG_FILE))
}

/// Loads and validates a configuration file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::IoError {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a `rollover.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that required fields are present and configuration values are consistent.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }

    let keys = [
        ("paths.live_output", config.paths.live_output.as_str()),
        ("paths.manifest", config.paths.manifest.as_str()),
        ("paths.metadata", config.paths.metadata.as_str()),
        ("paths.version_file", config.paths.version_file.as_str()),
    ];
    for (field, value) in keys {
        validate_relative(field, value)?;
    }

    // The three cached keys must not shadow each other.
    let cached = &keys[..3];
    for (i, (field_a, a)) in cached.iter().enumerate() {
        for (field_b, b) in &cached[i + 1..] {
            let (pa, pb) = (Path::new(a), Path::new(b));
            if pa.starts_with(pb) || pb.starts_with(pa) {
                return Err(ConfigError::invalid(
                    *field_b,
                    format!("'{b}' overlaps {field_a} ('{a}')"),
                ));
            }
        }
    }

    if let Some(output) = &config.build.output {
        validate_relative("build.output", output)?;
        if Path::new(output).starts_with(&config.paths.metadata) {
            return Err(ConfigError::invalid(
                "build.output",
                "must not live inside paths.metadata",
            ));
        }
    }

    if let Some(command) = &config.build.command {
        if command.is_empty() || command[0].is_empty() {
            return Err(ConfigError::invalid("build.command", "must name a program"));
        }
    }

    if config.fallback.command.first().is_some_and(|p| p.is_empty()) {
        return Err(ConfigError::invalid("fallback.command", "must name a program"));
    }

    Ok(())
}

/// Checks that a path is non-empty, relative, and stays below the project root.
fn validate_relative(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::MissingField(field.to_string()));
    }
    let path = Path::new(value);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(ConfigError::invalid(
            field,
            format!("must be a relative path below the project root, got '{value}'"),
        ));
    }
    Ok(())
}
