//! TR-004: Command planning. Expands an action into ordered operations.
//!
//! One terminal operation per selected environment, in registry order.
//! Prerequisites from the static table are inserted directly ahead of their
//! dependent, so an environment's steps are never interleaved with another's.

use super::error::ConfigResult;
use super::profile::ProfileResolver;
use super::registry::EnvironmentRegistry;
use super::types::*;

/// Identity overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub profile: Option<String>,
    pub role: Option<String>,
}

/// Static prerequisite table. `Refresh` is always last so it directly
/// precedes `Plan`.
pub fn prerequisites(action: Action, plan_format: PlanFormat) -> &'static [Action] {
    match (action, plan_format) {
        (Action::Plan, PlanFormat::Check) => &[Action::FmtCheck, Action::Refresh],
        (Action::Plan, PlanFormat::Write) => &[Action::Fmt, Action::Refresh],
        (Action::Plan, PlanFormat::None) => &[Action::Refresh],
        _ => &[],
    }
}

/// Output of a prerequisite is hidden when it only refreshes local
/// comparison data.
fn is_quiet(prerequisite: Action) -> bool {
    prerequisite == Action::Refresh
}

pub struct CommandPlanner<'a> {
    registry: &'a EnvironmentRegistry,
    profiles: &'a ProfileResolver,
    plan_format: PlanFormat,
    extra_args: Vec<String>,
    overrides: Overrides,
}

impl<'a> CommandPlanner<'a> {
    pub fn new(registry: &'a EnvironmentRegistry, profiles: &'a ProfileResolver) -> Self {
        Self {
            registry,
            profiles,
            plan_format: PlanFormat::default(),
            extra_args: Vec::new(),
            overrides: Overrides::default(),
        }
    }

    pub fn with_plan_format(mut self, plan_format: PlanFormat) -> Self {
        self.plan_format = plan_format;
        self
    }

    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Expand `action` for one environment (when filtered) or all of them.
    /// Every profile is resolved here, so bad input fails before anything runs.
    pub fn plan(&self, action: Action, filter: Option<&str>) -> ConfigResult<Vec<Operation>> {
        let targets: Vec<&Environment> = match filter {
            Some(name) => vec![self.registry.resolve(name)?],
            None => self.registry.all().collect(),
        };

        let chain = prerequisites(action, self.plan_format);
        let mut operations = Vec::with_capacity(targets.len() * (chain.len() + 1));

        for env in targets {
            let profile = self.profiles.resolve(
                env,
                self.overrides.profile.as_deref(),
                self.overrides.role.as_deref(),
            )?;

            for &pre in chain {
                operations.push(Operation {
                    action: pre,
                    environment: env.clone(),
                    profile: profile.clone(),
                    extra_args: Vec::new(),
                    step: Step::Prerequisite,
                    quiet: is_quiet(pre),
                });
            }
            operations.push(Operation {
                action,
                environment: env.clone(),
                profile,
                extra_args: self.extra_args.clone(),
                step: Step::Terminal,
                quiet: false,
            });
        }

        tracing::debug!(
            %action,
            operations = operations.len(),
            filter = filter.unwrap_or("*"),
            "planned operations"
        );
        Ok(operations)
    }

    /// Like [`plan`](Self::plan) for an action given by name.
    pub fn plan_named(&self, action: &str, filter: Option<&str>) -> ConfigResult<Vec<Operation>> {
        self.plan(action.parse()?, filter)
    }
}
