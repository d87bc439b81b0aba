//! Instance processor replacing eligible beans with proxies.

use crate::advisor::{Advisor, Pointcut};
use crate::proxy::{ProxyFactory, TargetPtr};
use std::sync::Arc;
use tracing::debug;
use vernal_beans::definition::{BeanDefinition, Ordering, Role};
use vernal_beans::error::ErrorPtr;
use vernal_beans::instance_provider::BeanInstanceAnyPtr;
use vernal_beans::processor::{InstancePostProcessor, InstanceProcessorPtr};

/// Name of the auto proxy processor bean registered by [AutoProxyProcessor::definition].
pub const AUTO_PROXY_PROCESSOR_NAME: &str = "vernal_internal_auto_proxy_processor";

/// Wraps object beans of type [TargetPtr] in proxies, if any advisor applies to any of their
/// operations. Infrastructure beans are never proxied.
#[derive(Clone, Default)]
pub struct AutoProxyProcessor {
    advisors: Vec<Advisor>,
    bean_names: Vec<Pointcut>,
    proxy_target_type: bool,
}

impl AutoProxyProcessor {
    pub fn new(advisors: Vec<Advisor>) -> Self {
        Self {
            advisors,
            ..Default::default()
        }
    }

    /// Limits proxying to beans with matching names. Without any, all beans are eligible.
    pub fn with_bean_name(mut self, bean_name: Pointcut) -> Self {
        self.bean_names.push(bean_name);
        self
    }

    pub fn with_proxy_target_type(mut self, proxy_target_type: bool) -> Self {
        self.proxy_target_type = proxy_target_type;
        self
    }

    /// Creates an unordered instance processor definition, so prioritized processors see unwrapped
    /// beans first.
    pub fn definition(self) -> BeanDefinition {
        BeanDefinition::instance_processor(AUTO_PROXY_PROCESSOR_NAME, Ordering::Unordered, move |_| {
            Ok(Arc::new(self.clone()) as InstanceProcessorPtr)
        })
        .with_role(Role::Infrastructure)
    }

    fn is_eligible(&self, definition: &BeanDefinition) -> bool {
        definition.role != Role::Infrastructure
            && (self.bean_names.is_empty()
                || self
                    .bean_names
                    .iter()
                    .any(|pointcut| pointcut.matches(&definition.name)))
    }

    fn advisors_for(&self, target: &TargetPtr) -> Vec<Advisor> {
        let operations = target.operations();
        self.advisors
            .iter()
            .filter(|advisor| {
                operations
                    .iter()
                    .any(|operation| advisor.matches(operation))
            })
            .cloned()
            .collect()
    }
}

impl InstancePostProcessor for AutoProxyProcessor {
    fn after_initialization(
        &self,
        definition: &BeanDefinition,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        if !self.is_eligible(definition) {
            return Ok(instance);
        }

        let target = match instance.downcast::<TargetPtr>() {
            Ok(target) => target,
            Err(instance) => return Ok(instance),
        };

        let advisors = self.advisors_for(&target);
        if advisors.is_empty() {
            return Ok(target as BeanInstanceAnyPtr);
        }

        debug!(
            bean = definition.name.as_str(),
            advisors = advisors.len(),
            "Creating proxy for bean."
        );

        let proxy = advisors
            .into_iter()
            .fold(
                ProxyFactory::new(target.as_ref().clone())
                    .with_proxy_target_type(self.proxy_target_type),
                |factory, advisor| factory.with_advisor(advisor),
            )
            .proxy()
            .map_err(|error| Arc::new(error) as ErrorPtr)?;

        Ok(Arc::new(proxy) as BeanInstanceAnyPtr)
    }
}
