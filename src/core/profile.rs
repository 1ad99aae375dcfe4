//! TR-003: Identity and role resolution per environment.

use super::error::{ConfigError, ConfigResult};
use super::types::{Environment, Profile};

/// Derives the profile for an environment from the configured default role
/// and optional overrides. Holds no mutable state.
#[derive(Debug, Clone)]
pub struct ProfileResolver {
    default_role: String,
}

impl ProfileResolver {
    pub fn new(default_role: impl Into<String>) -> Self {
        Self {
            default_role: default_role.into(),
        }
    }

    pub fn default_role(&self) -> &str {
        &self.default_role
    }

    /// `role = role_override or default_role`,
    /// `environment = env_override or environment.name`.
    pub fn resolve(
        &self,
        environment: &Environment,
        env_override: Option<&str>,
        role_override: Option<&str>,
    ) -> ConfigResult<Profile> {
        let env = env_override.unwrap_or(&environment.name);
        let role = role_override.unwrap_or(&self.default_role);

        if env.trim().is_empty() {
            return Err(ConfigError::InvalidProfile {
                field: "environment",
            });
        }
        if role.trim().is_empty() {
            return Err(ConfigError::InvalidProfile { field: "role" });
        }

        Ok(Profile {
            environment: env.to_string(),
            role: role.to_string(),
        })
    }
}
