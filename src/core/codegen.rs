//! TR-005: Invocation generation. One operation maps to one tool command line.
//!
//! Deterministic: the same operation, settings and bound always render the
//! same argv, which is what the plan digest is computed over.

use super::types::{Action, Operation, TerraceConfig};
use crate::provenance::hasher;
use crate::transport::Invocation;

/// How operations are rendered into tool invocations.
#[derive(Debug, Clone)]
pub struct ToolSettings {
    pub binary: String,
    pub profile_var: Option<String>,
    pub role_var: Option<String>,
    pub profile_env: Option<String>,
    pub no_color: bool,
    pub auto_approve: bool,
}

impl ToolSettings {
    pub fn from_config(config: &TerraceConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            profile_var: config.profile_var.clone(),
            role_var: config.role_var.clone(),
            profile_env: config.profile_env.clone(),
            no_color: config.no_color,
            auto_approve: false,
        }
    }
}

/// Subcommand and fixed flags for an action.
fn base_args(action: Action) -> &'static [&'static str] {
    match action {
        Action::Init => &["init", "-input=false"],
        Action::Plan => &["plan", "-input=false"],
        Action::Apply => &["apply"],
        Action::Refresh => &["refresh", "-input=false"],
        Action::Fmt => &["fmt", "-recursive"],
        Action::FmtCheck => &["fmt", "-check", "-recursive", "-diff"],
    }
}

/// Render the invocation for one operation.
pub fn invocation(op: &Operation, tool: &ToolSettings, parallelism: u32) -> Invocation {
    let mut args: Vec<String> = base_args(op.action).iter().map(|s| s.to_string()).collect();

    if op.action == Action::Apply && tool.auto_approve {
        args.push("-auto-approve".to_string());
    }
    if op.action.supports_parallelism() {
        args.push(format!("-parallelism={}", parallelism));
    }
    if op.action.accepts_vars() {
        if let Some(ref var) = tool.profile_var {
            args.push(format!("-var={}={}", var, op.profile.environment));
        }
        if let Some(ref var) = tool.role_var {
            args.push(format!("-var={}={}", var, op.profile.role));
        }
    }
    if tool.no_color {
        args.push("-no-color".to_string());
    }
    args.extend(op.extra_args.iter().cloned());

    let env = tool
        .profile_env
        .as_ref()
        .map(|key| vec![(key.clone(), op.profile.environment.clone())])
        .unwrap_or_default();

    Invocation {
        program: tool.binary.clone(),
        args,
        cwd: op.environment.path.clone(),
        env,
        quiet: op.quiet,
    }
}

/// Render every operation as `[env] program args...`, one per line.
pub fn render(operations: &[Operation], tool: &ToolSettings, parallelism: u32) -> String {
    operations
        .iter()
        .map(|op| {
            let inv = invocation(op, tool, parallelism);
            format!("[{}] {}", op.environment.name, inv.command_line())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// BLAKE3 digest of the rendered command plan.
pub fn plan_digest(operations: &[Operation], tool: &ToolSettings, parallelism: u32) -> String {
    hasher::hash_string(&render(operations, tool, parallelism))
}
