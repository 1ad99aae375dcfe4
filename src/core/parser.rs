//! TR-009: terrace.yaml parsing and validation.
//!
//! Structural constraints checked after deserialization:
//! - Version must be "1.0"
//! - name, binary, and default_role must be non-empty
//! - parallelism must be at least 1
//! - cache_dir must be a non-empty path inside the environment directory
//! - profile_var/role_var/profile_env, when set, must be non-empty

use super::error::{ConfigError, ConfigResult};
use super::types::*;
use std::path::{Component, Path};

/// Parse a terrace.yaml file from disk.
pub fn parse_config_file(path: &Path) -> ConfigResult<TerraceConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&content)
}

/// Parse a terrace.yaml from a string.
pub fn parse_config(yaml: &str) -> ConfigResult<TerraceConfig> {
    serde_yaml_ng::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))
}

/// Validate a parsed config. Returns a list of errors (empty = valid).
pub fn validate_config(config: &TerraceConfig) -> Vec<String> {
    let mut errors = Vec::new();

    if config.version != "1.0" {
        errors.push(format!(
            "version must be \"1.0\", got \"{}\"",
            config.version
        ));
    }
    if config.name.trim().is_empty() {
        errors.push("name must not be empty".to_string());
    }
    if config.binary.trim().is_empty() {
        errors.push("binary must not be empty".to_string());
    }
    if config.default_role.trim().is_empty() {
        errors.push("default_role must not be empty".to_string());
    }
    if config.parallelism == 0 {
        errors.push("parallelism must be at least 1".to_string());
    }

    if config.cache_dir.trim().is_empty() {
        errors.push("cache_dir must not be empty".to_string());
    } else if !is_local_subpath(Path::new(&config.cache_dir)) {
        errors.push(format!(
            "cache_dir must stay inside the environment directory, got '{}'",
            config.cache_dir
        ));
    }

    let optional = [
        ("profile_var", &config.profile_var),
        ("role_var", &config.role_var),
        ("profile_env", &config.profile_env),
    ];
    for (field, value) in optional {
        if value.as_deref().is_some_and(|v| v.trim().is_empty()) {
            errors.push(format!("{} must be null or non-empty", field));
        }
    }

    errors
}

/// True when `path` names something strictly below the directory it is
/// joined onto: no root, prefix, `.` or `..` components.
pub fn is_local_subpath(path: &Path) -> bool {
    let mut components = path.components().peekable();
    components.peek().is_some() && components.all(|c| matches!(c, Component::Normal(_)))
}

/// Parse a file and reject it if validation finds anything.
pub fn parse_and_validate(path: &Path) -> ConfigResult<TerraceConfig> {
    let config = parse_config_file(path)?;
    let errors = validate_config(&config);
    if !errors.is_empty() {
        return Err(ConfigError::Validation(errors));
    }
    Ok(config)
}
