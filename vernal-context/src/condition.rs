//! Conditional registration of configuration units, scanned components and factory methods.

use crate::environment::Environment;
use derivative::Derivative;
use std::sync::Arc;
use vernal_beans::registry::DefinitionRegistryFacade;

/// Phase in which a condition is evaluated.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum ConfigurationPhase {
    /// Evaluated while the configuration graph is resolved. Failing conditions skip the unit
    /// entirely, as if it was never declared.
    ParseConfiguration,
    /// Evaluated when definitions are registered.
    RegisterBean,
}

/// Information available to conditions.
pub trait ConditionContext {
    fn registry(&self) -> &dyn DefinitionRegistryFacade;

    fn environment(&self) -> &Environment;
}

/// Context over borrowed registry and environment.
pub struct SimpleConditionContext<'a> {
    registry: &'a dyn DefinitionRegistryFacade,
    environment: &'a Environment,
}

impl<'a> SimpleConditionContext<'a> {
    pub fn new(registry: &'a dyn DefinitionRegistryFacade, environment: &'a Environment) -> Self {
        Self {
            registry,
            environment,
        }
    }
}

impl ConditionContext for SimpleConditionContext<'_> {
    #[inline]
    fn registry(&self) -> &dyn DefinitionRegistryFacade {
        self.registry
    }

    #[inline]
    fn environment(&self) -> &Environment {
        self.environment
    }
}

pub type ConditionTest = Arc<dyn Fn(&dyn ConditionContext, &str) -> bool + Send + Sync>;

/// Test deciding if something should be registered. The second test argument is the name of the
/// source the condition is attached to.
#[derive(Derivative, Clone)]
#[derivative(Debug)]
pub struct Condition {
    /// Phase the condition is restricted to. Unrestricted conditions are evaluated in every phase.
    pub phase: Option<ConfigurationPhase>,
    #[derivative(Debug = "ignore")]
    pub test: ConditionTest,
}

impl Condition {
    pub fn new<F>(phase: Option<ConfigurationPhase>, test: F) -> Self
    where
        F: Fn(&dyn ConditionContext, &str) -> bool + Send + Sync + 'static,
    {
        Self {
            phase,
            test: Arc::new(test),
        }
    }

    /// Matches when given property resolves to `expected`, or is present at all if no value is
    /// expected.
    pub fn on_property<K: ToString>(key: K, expected: Option<String>) -> Self {
        let key = key.to_string();
        Self::new(None, move |context, _| {
            match context.environment().resolved_property(&key) {
                Ok(Some(value)) => expected
                    .as_ref()
                    .map(|expected| *expected == value)
                    .unwrap_or(true),
                _ => false,
            }
        })
    }

    /// Matches when no definition with given name has been registered yet.
    pub fn on_missing_definition<N: ToString>(name: N) -> Self {
        let name = name.to_string();
        Self::new(Some(ConfigurationPhase::RegisterBean), move |context, _| {
            !context.registry().is_registered(&name)
        })
    }

    /// Matches when a definition with given name has been registered.
    pub fn on_definition<N: ToString>(name: N) -> Self {
        let name = name.to_string();
        Self::new(Some(ConfigurationPhase::RegisterBean), move |context, _| {
            context.registry().is_registered(&name)
        })
    }

    #[inline]
    pub fn matches(&self, context: &dyn ConditionContext, source_name: &str) -> bool {
        (self.test)(context, source_name)
    }
}

/// Checks if something guarded by given conditions should be skipped in given phase. Conditions
/// restricted to other phases are ignored.
pub fn should_skip(
    conditions: &[Condition],
    source_name: &str,
    phase: ConfigurationPhase,
    context: &dyn ConditionContext,
) -> bool {
    conditions
        .iter()
        .filter(|condition| condition.phase.map(|p| p == phase).unwrap_or(true))
        .any(|condition| !condition.matches(context, source_name))
}
