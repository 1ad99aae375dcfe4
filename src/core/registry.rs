//! TR-002: Environment registry of ordered, unique names.
//!
//! Registration order is the execution order for multi-environment runs,
//! so low-risk environments declared first fail first.

use super::error::{ConfigError, ConfigResult};
use super::types::{Environment, TerraceConfig};
use indexmap::IndexMap;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static NAME_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("environment name pattern is valid")
});

/// Known environments in registration order.
#[derive(Debug, Clone)]
pub struct EnvironmentRegistry {
    environments: IndexMap<String, Environment>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self {
            environments: IndexMap::new(),
        }
    }

    /// Build a registry from config: explicit entries first, then discovered
    /// directories. Relative paths are joined onto `base_dir`.
    pub fn from_config(config: &TerraceConfig, base_dir: &Path) -> ConfigResult<Self> {
        let mut registry = Self::new();
        for entry in &config.environments {
            registry.register(entry.name(), base_dir.join(entry.path()))?;
        }
        if let Some(ref pattern) = config.discover {
            for dir in discover_dirs(base_dir, pattern)? {
                let Some(name) = dir.file_name().map(|n| n.to_string_lossy().to_string()) else {
                    continue;
                };
                if registry.environments.contains_key(&name) {
                    tracing::debug!(environment = %name, "discovered directory already registered");
                    continue;
                }
                if !NAME_RULE.is_match(&name) {
                    tracing::debug!(environment = %name, "discovered directory is not a valid environment name");
                    continue;
                }
                registry.register(&name, dir)?;
            }
        }
        Ok(registry)
    }

    /// Register an environment. Fails without modifying the registry if the
    /// name is taken or malformed.
    pub fn register(&mut self, name: &str, path: impl Into<PathBuf>) -> ConfigResult<&Environment> {
        if !NAME_RULE.is_match(name) {
            return Err(ConfigError::InvalidEnvironmentName {
                name: name.to_string(),
            });
        }
        if self.environments.contains_key(name) {
            return Err(ConfigError::DuplicateEnvironment {
                name: name.to_string(),
            });
        }
        let env = Environment {
            name: name.to_string(),
            path: path.into(),
        };
        let (idx, _) = self.environments.insert_full(name.to_string(), env);
        Ok(&self.environments[idx])
    }

    /// Look up an environment by name.
    pub fn resolve(&self, name: &str) -> ConfigResult<&Environment> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                name: name.to_string(),
                known: self.names().collect::<Vec<_>>().join(", "),
            })
    }

    /// All environments in registration order. The iterator is `Clone`, so it
    /// can be restarted without touching the registry.
    pub fn all(&self) -> impl Iterator<Item = &Environment> + Clone {
        self.environments.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + Clone {
        self.environments.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.environments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

impl Default for EnvironmentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand a discovery glob relative to `base_dir`, keeping directories only,
/// sorted by path.
fn discover_dirs(base_dir: &Path, pattern: &str) -> ConfigResult<Vec<PathBuf>> {
    // Metacharacters in the project path are literal; only `pattern` globs.
    let base = glob::Pattern::escape(&base_dir.to_string_lossy());
    let full = Path::new(&base).join(pattern);
    let full = full.to_string_lossy();
    let paths = glob::glob(&full).map_err(|e| ConfigError::Discover {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    let mut dirs = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| ConfigError::Discover {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three() -> EnvironmentRegistry {
        let mut reg = EnvironmentRegistry::new();
        reg.register("dev", "envs/dev").unwrap();
        reg.register("stage", "envs/stage").unwrap();
        reg.register("prod", "envs/prod").unwrap();
        reg
    }

    #[test]
    fn test_tr002_registration_order() {
        let reg = three();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, vec!["dev", "stage", "prod"]);
    }

    #[test]
    fn test_tr002_duplicate_rejected_and_registry_unchanged() {
        let mut reg = three();
        let err = reg.register("stage", "elsewhere").unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEnvironment { ref name } if name == "stage"));
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.resolve("stage").unwrap().path, PathBuf::from("envs/stage"));
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, vec!["dev", "stage", "prod"]);
    }

    #[test]
    fn test_tr002_resolve_unknown() {
        let reg = three();
        let err = reg.resolve("qa").unwrap_err();
        match err {
            ConfigError::UnknownEnvironment { name, known } => {
                assert_eq!(name, "qa");
                assert_eq!(known, "dev, stage, prod");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_tr002_all_is_restartable() {
        let reg = three();
        let iter = reg.all();
        let first: Vec<_> = iter.clone().map(|e| e.name.clone()).collect();
        let second: Vec<_> = iter.map(|e| e.name.clone()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tr002_invalid_names() {
        let mut reg = EnvironmentRegistry::new();
        for bad in ["", "-dev", "dev env", "prod/eu", ".hidden"] {
            assert!(
                matches!(reg.register(bad, "x"), Err(ConfigError::InvalidEnvironmentName { .. })),
                "accepted {bad:?}"
            );
        }
        assert!(reg.is_empty());
        reg.register("eu-west-1.prod_2", "x").unwrap();
    }

    #[test]
    fn test_tr002_from_config_joins_base_dir() {
        let yaml = r#"
version: "1.0"
name: t
default_role: ops
environments:
  - dev
  - name: prod
    path: live/prod
"#;
        let config: TerraceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let reg = EnvironmentRegistry::from_config(&config, Path::new("/repo")).unwrap();
        assert_eq!(reg.resolve("dev").unwrap().path, PathBuf::from("/repo/dev"));
        assert_eq!(reg.resolve("prod").unwrap().path, PathBuf::from("/repo/live/prod"));
    }

    #[test]
    fn test_tr002_from_config_duplicate() {
        let yaml = r#"
version: "1.0"
name: t
default_role: ops
environments: [dev, dev]
"#;
        let config: TerraceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let err = EnvironmentRegistry::from_config(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateEnvironment { .. }));
    }

    #[test]
    fn test_tr002_discover_after_explicit() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["qa", "dev", "sandbox"] {
            std::fs::create_dir_all(dir.path().join("envs").join(name)).unwrap();
        }
        std::fs::write(dir.path().join("envs").join("README.md"), "not an env").unwrap();

        let yaml = r#"
version: "1.0"
name: t
default_role: ops
environments:
  - name: dev
    path: envs/dev
discover: "envs/*"
"#;
        let config: TerraceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let reg = EnvironmentRegistry::from_config(&config, dir.path()).unwrap();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, vec!["dev", "qa", "sandbox"]);
    }

    #[test]
    fn test_tr002_discover_skips_invalid_names() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["qa", "_modules", "my env"] {
            std::fs::create_dir_all(dir.path().join("envs").join(name)).unwrap();
        }
        let yaml = r#"
version: "1.0"
name: t
default_role: ops
discover: "envs/*"
"#;
        let config: TerraceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let reg = EnvironmentRegistry::from_config(&config, dir.path()).unwrap();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, vec!["qa"]);
    }

    #[test]
    fn test_tr002_discover_base_dir_with_glob_chars() {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("infra[1]");
        std::fs::create_dir_all(project.join("envs").join("dev")).unwrap();
        // would match `infra[1]` as a character class if unescaped
        std::fs::create_dir_all(dir.path().join("infra1").join("envs").join("decoy")).unwrap();

        let yaml = r#"
version: "1.0"
name: t
default_role: ops
discover: "envs/*"
"#;
        let config: TerraceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let reg = EnvironmentRegistry::from_config(&config, &project).unwrap();
        let names: Vec<_> = reg.names().collect();
        assert_eq!(names, vec!["dev"]);
        assert_eq!(reg.resolve("dev").unwrap().path, project.join("envs").join("dev"));
    }

    #[test]
    fn test_tr002_discover_bad_pattern() {
        let yaml = r#"
version: "1.0"
name: t
default_role: ops
discover: "envs/[*"
"#;
        let config: TerraceConfig = serde_yaml_ng::from_str(yaml).unwrap();
        let err = EnvironmentRegistry::from_config(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::Discover { .. }));
    }
}
