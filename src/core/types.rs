//! TR-001: Core types for configuration schema, environments, profiles,
//! operations, results, and journal events.
//!
//! Config types derive Serialize/Deserialize/JsonSchema so `terrace.yaml`
//! roundtrips and `terrace schema` can describe it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::error::ConfigError;

/// Default `-parallelism` bound handed to the infrastructure tool.
pub const DEFAULT_PARALLELISM: u32 = 50;

// ============================================================================
// Top-level terrace.yaml
// ============================================================================

/// Root configuration: the environments and how to drive the tool across them.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TerraceConfig {
    /// Schema version (must be "1.0")
    pub version: String,

    /// Human-readable project name
    pub name: String,

    /// Infrastructure tool binary (`terraform`, `tofu`, or a path)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Role used when no `--role` override is given
    pub default_role: String,

    /// Resource-level parallelism passed as `-parallelism=<n>`
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,

    /// Format step folded in ahead of `plan`
    #[serde(default)]
    pub plan_format: PlanFormat,

    /// Variable receiving the profile environment (null disables)
    #[serde(default = "default_profile_var")]
    pub profile_var: Option<String>,

    /// Variable receiving the role (null disables)
    #[serde(default = "default_role_var")]
    pub role_var: Option<String>,

    /// Environment variable exported to the child with the profile name
    #[serde(default)]
    pub profile_env: Option<String>,

    /// Pass `-no-color` to every invocation
    #[serde(default)]
    pub no_color: bool,

    /// Local cache directory purged before `init`, relative to each environment
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,

    /// Directory holding the run journal
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,

    /// Append run events to `<state_dir>/events.jsonl`
    #[serde(default = "default_true")]
    pub journal: bool,

    /// Seconds an interrupted command gets to exit before it is killed
    #[serde(default = "default_interrupt_grace_secs")]
    pub interrupt_grace_secs: u64,

    /// Arguments appended to every terminal operation
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Execution policy
    #[serde(default)]
    pub policy: Policy,

    /// Environments in execution order
    #[serde(default)]
    pub environments: Vec<EnvironmentEntry>,

    /// Glob of directories registered as additional environments
    #[serde(default)]
    pub discover: Option<String>,
}

fn default_binary() -> String {
    "terraform".to_string()
}

fn default_parallelism() -> u32 {
    DEFAULT_PARALLELISM
}

fn default_profile_var() -> Option<String> {
    Some("profile".to_string())
}

fn default_role_var() -> Option<String> {
    Some("role".to_string())
}

fn default_cache_dir() -> String {
    ".terraform".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".terrace")
}

fn default_interrupt_grace_secs() -> u64 {
    crate::transport::local::DEFAULT_INTERRUPT_GRACE.as_secs()
}

fn default_true() -> bool {
    true
}

/// An environment declaration, either a bare name or name plus directory.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum EnvironmentEntry {
    Name(String),
    Full { name: String, path: PathBuf },
}

impl EnvironmentEntry {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(n) => n,
            Self::Full { name, .. } => name,
        }
    }

    /// Directory for the environment; a bare name maps to a directory of that name.
    pub fn path(&self) -> PathBuf {
        match self {
            Self::Name(n) => PathBuf::from(n),
            Self::Full { path, .. } => path.clone(),
        }
    }
}

/// Which format action, if any, runs ahead of `plan`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PlanFormat {
    #[default]
    Check,
    Write,
    None,
}

/// Execution policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct Policy {
    /// Failure handling across environments
    #[serde(default)]
    pub failure: FailurePolicy,
}

/// Failure handling strategy across environments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Later environments still run after a failure
    #[default]
    ContinueIndependent,
    /// The first failure skips everything still queued
    StopOnFirst,
}

// ============================================================================
// Environments and profiles
// ============================================================================

/// A named target configuration and its working directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Environment {
    pub name: String,
    pub path: PathBuf,
}

/// Resolved identity/role pair handed to the infrastructure tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub environment: String,
    pub role: String,
}

// ============================================================================
// Actions and operations
// ============================================================================

/// Logical operation category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Init,
    Plan,
    Apply,
    Fmt,
    FmtCheck,
    Refresh,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Self::Init,
        Self::Plan,
        Self::Apply,
        Self::Fmt,
        Self::FmtCheck,
        Self::Refresh,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Plan => "plan",
            Self::Apply => "apply",
            Self::Fmt => "fmt",
            Self::FmtCheck => "fmt-check",
            Self::Refresh => "refresh",
        }
    }

    /// Whether the tool performs resource operations concurrently for this action.
    pub fn supports_parallelism(self) -> bool {
        matches!(self, Self::Plan | Self::Apply | Self::Refresh)
    }

    /// Whether the action evaluates input variables.
    pub fn accepts_vars(self) -> bool {
        matches!(self, Self::Plan | Self::Apply | Self::Refresh)
    }

    /// Whether the local cache directory is removed before the action runs.
    pub fn purges_cache(self) -> bool {
        self == Self::Init
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownAction {
                name: s.to_string(),
            })
    }
}

/// Position of an operation within its environment's sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Inserted ahead of the requested action
    Prerequisite,
    /// The requested action itself
    Terminal,
}

/// One concrete, environment-scoped invocation of an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Operation {
    pub action: Action,
    pub environment: Environment,
    pub profile: Profile,
    pub extra_args: Vec<String>,
    pub step: Step,
    /// Output is kept out of the visible report unless the operation fails
    pub quiet: bool,
}

// ============================================================================
// Results
// ============================================================================

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Succeeded,
    Failed,
    /// Not run: an earlier step failed
    Skipped,
    /// Killed or never started because of an interrupt
    Interrupted,
}

impl OperationStatus {
    /// Machine-readable name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Interrupted => "interrupted",
        }
    }
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "ok"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "skipped"),
            Self::Interrupted => write!(f, "INTERRUPTED"),
        }
    }
}

/// Outcome of executing one operation.
#[derive(Debug, Clone, Serialize)]
pub struct OperationResult {
    pub operation: Operation,
    pub status: OperationStatus,
    /// `None` when the operation never ran or died by signal
    pub exit_code: Option<i32>,
    #[serde(serialize_with = "lossy_utf8")]
    pub stdout: Vec<u8>,
    #[serde(serialize_with = "lossy_utf8")]
    pub stderr: Vec<u8>,
    #[serde(rename = "duration_seconds", serialize_with = "seconds")]
    pub duration: Duration,
}

impl OperationResult {
    /// Result for an operation that was never started.
    pub fn not_run(operation: Operation, status: OperationStatus) -> Self {
        Self {
            operation,
            status,
            exit_code: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

fn lossy_utf8<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&String::from_utf8_lossy(bytes))
}

fn seconds<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

/// Aggregate outcome of one invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub action: Action,
    pub results: Vec<OperationResult>,
    pub overall_success: bool,
    pub interrupted: bool,
}

// ============================================================================
// Journal events
// ============================================================================

/// Event appended to the JSONL run journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        action: String,
        environments: Vec<String>,
        plan_digest: String,
        terrace_version: String,
    },
    OperationStarted {
        run_id: String,
        environment: String,
        action: String,
    },
    OperationFinished {
        run_id: String,
        environment: String,
        action: String,
        status: String,
        exit_code: Option<i32>,
        duration_seconds: f64,
    },
    RunCompleted {
        run_id: String,
        success: bool,
        interrupted: bool,
        failed_environments: Vec<String>,
    },
}

/// Timestamped event wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedEvent {
    pub ts: String,
    #[serde(flatten)]
    pub event: RunEvent,
}

// ============================================================================
// Tests
// ============================================================================
