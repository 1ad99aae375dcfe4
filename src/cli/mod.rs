//! TR-017: CLI subcommands: the six actions plus run, validate, list, new,
//! schema, completions.

use crate::core::codegen::{self, ToolSettings};
use crate::core::error::{ConfigError, TerraceError};
use crate::core::executor::Executor;
use crate::core::planner::{CommandPlanner, Overrides};
use crate::core::profile::ProfileResolver;
use crate::core::registry::EnvironmentRegistry;
use crate::core::report::{self, EXIT_OK};
use crate::core::types::{Action, Operation, TerraceConfig};
use crate::core::parser;
use crate::provenance::eventlog::Journal;
use crate::provenance::hasher;
use crate::transport::local::ProcessRunner;
use crate::transport::{interrupt, CancelFlag};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "terrace",
    version,
    about = "Run terraform/tofu actions across a fixed set of environments"
)]
pub struct Cli {
    /// Path to terrace.yaml
    #[arg(short = 'f', long, global = true, default_value = "terrace.yaml")]
    pub file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every action.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Target a single environment
    #[arg(short, long = "env")]
    pub env: Option<String>,

    /// Override the profile environment
    #[arg(long)]
    pub profile: Option<String>,

    /// Override the role
    #[arg(long)]
    pub role: Option<String>,

    /// Override the resource parallelism bound
    #[arg(long)]
    pub parallelism: Option<u32>,

    /// Pass -auto-approve to apply
    #[arg(long)]
    pub auto_approve: bool,

    /// Print the command plan without running anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Extra arguments appended to the terminal command
    #[arg(last = true)]
    pub extra: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize every environment (purges the local cache first)
    Init(RunArgs),

    /// Refresh and show the change plan for every environment
    Plan(RunArgs),

    /// Apply changes to every environment
    Apply(RunArgs),

    /// Rewrite configuration files to canonical format
    Fmt(RunArgs),

    /// Check formatting without rewriting
    #[command(name = "fmt-check")]
    FmtCheck(RunArgs),

    /// Refresh state against real infrastructure
    Refresh(RunArgs),

    /// Run an action given by name
    Run {
        /// init, plan, apply, fmt, fmt-check, or refresh
        action: String,

        #[command(flatten)]
        args: RunArgs,
    },

    /// Validate terrace.yaml, environments, and profiles without running anything
    Validate,

    /// List environments in execution order
    List,

    /// Scaffold a new terrace.yaml
    New {
        /// Directory to create it in (default: current)
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// Print the JSON schema of terrace.yaml
    Schema,

    /// Generate shell completions
    Completions {
        shell: clap_complete::Shell,
    },
}

/// Dispatch a CLI command. Returns the process exit status.
pub fn dispatch(cmd: Commands, file: &Path) -> Result<i32, TerraceError> {
    match cmd {
        Commands::Init(args) => cmd_run(file, Action::Init, &args),
        Commands::Plan(args) => cmd_run(file, Action::Plan, &args),
        Commands::Apply(args) => cmd_run(file, Action::Apply, &args),
        Commands::Fmt(args) => cmd_run(file, Action::Fmt, &args),
        Commands::FmtCheck(args) => cmd_run(file, Action::FmtCheck, &args),
        Commands::Refresh(args) => cmd_run(file, Action::Refresh, &args),
        Commands::Run { action, args } => cmd_run(file, action.parse()?, &args),
        Commands::Validate => cmd_validate(file),
        Commands::List => cmd_list(file),
        Commands::New { path } => cmd_new(&path),
        Commands::Schema => cmd_schema(),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "terrace", &mut std::io::stdout());
            Ok(EXIT_OK)
        }
    }
}

/// Directory relative paths in the config are resolved against.
fn base_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Everything needed to run, resolved before any command is spawned.
struct Prepared {
    config: TerraceConfig,
    base_dir: PathBuf,
    operations: Vec<Operation>,
    tool: ToolSettings,
    parallelism: u32,
}

fn prepare(file: &Path, action: Action, args: &RunArgs) -> Result<Prepared, TerraceError> {
    let config = parser::parse_and_validate(file)?;
    let base_dir = base_dir(file);
    let registry = EnvironmentRegistry::from_config(&config, &base_dir)?;
    let profiles = ProfileResolver::new(config.default_role.clone());

    let parallelism = args.parallelism.unwrap_or(config.parallelism);
    if parallelism == 0 {
        return Err(ConfigError::InvalidParallelism { value: parallelism }.into());
    }

    let mut extra_args = config.extra_args.clone();
    extra_args.extend(args.extra.iter().cloned());

    let operations = CommandPlanner::new(&registry, &profiles)
        .with_plan_format(config.plan_format)
        .with_extra_args(extra_args)
        .with_overrides(Overrides {
            profile: args.profile.clone(),
            role: args.role.clone(),
        })
        .plan(action, args.env.as_deref())?;

    let mut tool = ToolSettings::from_config(&config);
    tool.auto_approve = args.auto_approve;

    Ok(Prepared {
        config,
        base_dir,
        operations,
        tool,
        parallelism,
    })
}

fn cmd_run(file: &Path, action: Action, args: &RunArgs) -> Result<i32, TerraceError> {
    let prepared = prepare(file, action, args)?;
    let digest = codegen::plan_digest(&prepared.operations, &prepared.tool, prepared.parallelism);

    if args.dry_run {
        let rendered = codegen::render(&prepared.operations, &prepared.tool, prepared.parallelism);
        if !rendered.is_empty() {
            println!("{}", rendered);
        }
        println!();
        println!(
            "Dry run: {} operation(s), plan digest {}",
            prepared.operations.len(),
            hasher::short(&digest)
        );
        return Ok(EXIT_OK);
    }

    let config = &prepared.config;
    let journal = if config.journal {
        Journal::new(prepared.base_dir.join(&config.state_dir))
    } else {
        Journal::disabled()
    };

    let cancel = CancelFlag::new();
    if let Err(e) = interrupt::install(cancel.clone()) {
        tracing::warn!(error = %e, "Ctrl-C handling unavailable");
    }

    let mut environments: Vec<String> = Vec::new();
    for op in &prepared.operations {
        if !environments.contains(&op.environment.name) {
            environments.push(op.environment.name.clone());
        }
    }
    journal.run_started(action.as_str(), environments, &digest);
    tracing::info!(run_id = journal.run_id(), %action, "run started");

    // Keep stdout for the report when it has to parse as JSON.
    let runner = ProcessRunner::new()
        .with_grace(Duration::from_secs(config.interrupt_grace_secs))
        .with_echo_to_stderr(args.json);
    let results = Executor::new(&runner, &prepared.tool, &journal)
        .with_cache_dir(&config.cache_dir)
        .with_failure_policy(config.policy.failure)
        .with_cancel(cancel)
        .execute(prepared.operations, prepared.parallelism);

    let report = report::aggregate(action, results);
    journal.run_completed(&report);

    if args.json {
        println!("{}", report::render_json(&report).map_err(TerraceError::Io)?);
    } else {
        println!();
        print!("{}", report::render_human(&report));
    }
    Ok(report.exit_code())
}

fn cmd_validate(file: &Path) -> Result<i32, TerraceError> {
    let config = parser::parse_config_file(file)?;
    let errors = parser::validate_config(&config);
    if !errors.is_empty() {
        for e in &errors {
            eprintln!("  ERROR: {}", e);
        }
        return Err(ConfigError::Validation(errors).into());
    }

    let registry = EnvironmentRegistry::from_config(&config, &base_dir(file))?;
    let profiles = ProfileResolver::new(config.default_role.clone());
    for env in registry.all() {
        profiles.resolve(env, None, None)?;
    }

    println!(
        "OK: {} ({} environments, default role '{}')",
        config.name,
        registry.len(),
        profiles.default_role()
    );
    Ok(EXIT_OK)
}

fn cmd_list(file: &Path) -> Result<i32, TerraceError> {
    let config = parser::parse_and_validate(file)?;
    let registry = EnvironmentRegistry::from_config(&config, &base_dir(file))?;

    let width = registry.names().map(str::len).max().unwrap_or(0);
    for env in registry.all() {
        let missing = if env.path.is_dir() { "" } else { "  (missing)" };
        println!(
            "{:<width$}  {}{}",
            env.name,
            env.path.display(),
            missing,
            width = width
        );
    }
    if registry.is_empty() {
        println!("No environments configured.");
    }
    Ok(EXIT_OK)
}

fn cmd_new(path: &Path) -> Result<i32, TerraceError> {
    let config_path = path.join("terrace.yaml");
    if config_path.exists() {
        return Err(TerraceError::Io(format!(
            "{} already exists",
            config_path.display()
        )));
    }
    std::fs::create_dir_all(path)
        .map_err(|e| TerraceError::Io(format!("cannot create {}: {}", path.display(), e)))?;

    let template = r#"version: "1.0"
name: my-infrastructure
binary: terraform
default_role: deployer
parallelism: 50
plan_format: check
profile_var: profile
role_var: role
state_dir: .terrace

policy:
  failure: continue_independent

environments:
  - dev
  - stage
  - prod
"#;
    std::fs::write(&config_path, template).map_err(|e| {
        TerraceError::Io(format!("cannot write {}: {}", config_path.display(), e))
    })?;

    println!("Created {}", config_path.display());
    Ok(EXIT_OK)
}

fn cmd_schema() -> Result<i32, TerraceError> {
    let schema = schemars::schema_for!(TerraceConfig);
    let json = serde_json::to_string_pretty(&schema)
        .map_err(|e| TerraceError::Io(format!("JSON serialize error: {}", e)))?;
    println!("{}", json);
    Ok(EXIT_OK)
}
