//! Post-processor contracts and their orchestration.
//!
//! Processors are beans with a processor [Capability]. They are executed in three tiers derived
//! from their [Ordering](crate::definition::Ordering): [ProcessorTier::Primary] first, then
//! [ProcessorTier::Secondary], then [ProcessorTier::Unordered]. Within a tier, lower order values
//! go first and ties keep registration order. Registry processors may register further
//! processors - each tier is re-queried until no new names of that tier appear, while a processor
//! discovered after its tier has completed aborts processing with
//! [ProcessorError::LateTierRegistration].

use crate::definition::{Bean, BeanDefinition, Capability, ProcessorTier, Role};
use crate::error::{BeanInstanceProviderError, ErrorPtr, ProcessorError};
use crate::factory::BeanFactory;
use crate::instance_provider::{BeanInstanceAnyPtr, BeanInstanceProvider};
use crate::registry::DefinitionRegistry;
use fxhash::FxHashSet;
use itertools::Itertools;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use tracing::{debug, info, trace};

pub type RegistryProcessorPtr = Arc<dyn RegistryPostProcessor + Send + Sync>;

pub type FactoryProcessorPtr = Arc<dyn FactoryPostProcessor + Send + Sync>;

pub type InstanceProcessorPtr = Arc<dyn InstancePostProcessor + Send + Sync>;

/// Processor allowed to modify the definition registry before any object bean is created. Every
/// registry processor also gets a chance to post-process the factory, after all registry
/// processing has completed.
pub trait RegistryPostProcessor {
    fn process_registry(&self, registry: &mut dyn DefinitionRegistry) -> Result<(), ErrorPtr>;

    fn process_factory(&self, _factory: &mut BeanFactory) -> Result<(), ErrorPtr> {
        Ok(())
    }
}

/// Processor finalizing factory configuration, e.g. modifying definitions or registering scopes.
pub trait FactoryPostProcessor {
    fn process_factory(&self, factory: &mut BeanFactory) -> Result<(), ErrorPtr>;
}

/// Processor applied to every newly created object bean. The returned instance replaces the
/// original one, which allows wrapping beans in proxies.
pub trait InstancePostProcessor {
    fn before_initialization(
        &self,
        _definition: &BeanDefinition,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        Ok(instance)
    }

    fn after_initialization(
        &self,
        _definition: &BeanDefinition,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        Ok(instance)
    }
}

/// Processors supplied directly by the caller, rather than registered as beans. These always run
/// before any registered processor of the same kind.
#[derive(Clone)]
pub enum SuppliedProcessor {
    Registry(String, RegistryProcessorPtr),
    Factory(String, FactoryProcessorPtr),
}

/// Runs all registry and factory processors in their tiers. Any failure aborts processing
/// immediately.
pub fn invoke_factory_processors(
    factory: &mut BeanFactory,
    supplied: &[SuppliedProcessor],
) -> Result<(), ProcessorError> {
    let mut processed = FxHashSet::default();
    let mut executed: Vec<(String, RegistryProcessorPtr)> = supplied
        .iter()
        .filter_map(|processor| match processor {
            SuppliedProcessor::Registry(name, processor) => Some((name.clone(), processor.clone())),
            SuppliedProcessor::Factory(..) => None,
        })
        .collect();

    for (name, processor) in &executed {
        debug!(processor = name.as_str(), "Invoking supplied registry processor.");
        processor
            .process_registry(factory.registry_mut())
            .map_err(|source| ProcessorError::ProcessorFailed {
                name: name.clone(),
                source,
            })?;
    }

    drain_tiers(
        factory,
        Capability::RegistryProcessor,
        &mut processed,
        |factory, name, bean| match bean {
            Bean::RegistryProcessor(processor) => {
                processor.process_registry(factory.registry_mut())?;
                executed.push((name.to_string(), processor));
                Ok(())
            }
            other => Err(incompatible(name, other.capability())),
        },
    )?;

    for (name, processor) in &executed {
        debug!(processor = name.as_str(), "Invoking factory callback of registry processor.");
        processor
            .process_factory(factory)
            .map_err(|source| ProcessorError::ProcessorFailed {
                name: name.clone(),
                source,
            })?;
    }

    for (name, processor) in supplied.iter().filter_map(|processor| match processor {
        SuppliedProcessor::Factory(name, processor) => Some((name, processor)),
        SuppliedProcessor::Registry(..) => None,
    }) {
        debug!(processor = name.as_str(), "Invoking supplied factory processor.");
        processor
            .process_factory(factory)
            .map_err(|source| ProcessorError::ProcessorFailed {
                name: name.clone(),
                source,
            })?;
    }

    drain_tiers(
        factory,
        Capability::FactoryProcessor,
        &mut processed,
        |factory, name, bean| match bean {
            Bean::FactoryProcessor(processor) => processor.process_factory(factory),
            other => Err(incompatible(name, other.capability())),
        },
    )
}

/// Registers all instance processors from the registry in the factory, tier by tier. An
/// [InstanceProcessorChecker] is registered first, to report beans created while processors are
/// still being registered.
pub fn register_instance_processors(factory: &mut BeanFactory) -> Result<(), ProcessorError> {
    let names = factory
        .registry()
        .names_for_capability(Capability::InstanceProcessor);

    let registered = Arc::new(AtomicUsize::new(factory.instance_processor_count() + 1));
    let target_count = registered.load(AtomicOrdering::Relaxed) + names.len();

    factory.add_instance_processor(Arc::new(InstanceProcessorChecker {
        registered: registered.clone(),
        target_count,
    }));

    for tier in ProcessorTier::ALL {
        trace!(?tier, "Registering instance processors.");

        let tier_names = names
            .iter()
            .filter(|name| {
                factory
                    .registry()
                    .definition(name)
                    .map(|definition| definition.ordering.tier() == tier)
                    .unwrap_or(false)
            })
            .cloned()
            .collect_vec();

        for (name, bean) in instantiate_sorted(factory, tier_names)? {
            match bean {
                Bean::InstanceProcessor(processor) => {
                    debug!(processor = name.as_str(), "Registering instance processor.");
                    factory.add_instance_processor(processor);
                    registered.fetch_add(1, AtomicOrdering::Relaxed);
                }
                other => {
                    let source = incompatible(&name, other.capability());
                    return Err(ProcessorError::ProcessorFailed { name, source });
                }
            }
        }
    }

    Ok(())
}

/// Logs object beans created before all instance processors got registered, since such beans
/// are not eligible for processing by all of them.
pub struct InstanceProcessorChecker {
    registered: Arc<AtomicUsize>,
    target_count: usize,
}

impl InstancePostProcessor for InstanceProcessorChecker {
    fn after_initialization(
        &self,
        definition: &BeanDefinition,
        instance: BeanInstanceAnyPtr,
    ) -> Result<BeanInstanceAnyPtr, ErrorPtr> {
        if definition.role != Role::Infrastructure
            && self.registered.load(AtomicOrdering::Relaxed) < self.target_count
        {
            info!(
                bean = definition.name.as_str(),
                "Bean is not eligible for getting processed by all instance processors."
            );
        }

        Ok(instance)
    }
}

fn drain_tiers<F>(
    factory: &mut BeanFactory,
    capability: Capability,
    processed: &mut FxHashSet<String>,
    mut invoke: F,
) -> Result<(), ProcessorError>
where
    F: FnMut(&mut BeanFactory, &str, Bean) -> Result<(), ErrorPtr>,
{
    let mut completed: Vec<ProcessorTier> = Vec::with_capacity(ProcessorTier::ALL.len());

    for tier in ProcessorTier::ALL {
        trace!(?tier, ?capability, "Entering processor tier.");

        loop {
            let mut batch = vec![];
            for name in factory.registry().names_for_capability(capability) {
                if processed.contains(&name) {
                    continue;
                }

                let Some(definition) = factory.registry().definition(&name) else {
                    continue;
                };

                let processor_tier = definition.ordering.tier();
                if completed.contains(&processor_tier) {
                    return Err(ProcessorError::LateTierRegistration {
                        name,
                        capability,
                        tier: processor_tier,
                    });
                }

                if processor_tier == tier {
                    batch.push(name);
                }
            }

            if batch.is_empty() {
                break;
            }

            for (name, bean) in instantiate_sorted(factory, batch)? {
                debug!(processor = name.as_str(), ?tier, "Invoking processor.");

                processed.insert(name.clone());
                invoke(factory, &name, bean)
                    .map_err(|source| ProcessorError::ProcessorFailed { name, source })?;
            }
        }

        completed.push(tier);
    }

    Ok(())
}

fn instantiate_sorted(
    factory: &mut BeanFactory,
    names: Vec<String>,
) -> Result<Vec<(String, Bean)>, ProcessorError> {
    let mut processors = names
        .into_iter()
        .map(|name| {
            let order = factory
                .registry()
                .definition(&name)
                .map(|definition| definition.ordering.order())
                .ok_or_else(|| ProcessorError::Instantiation {
                    name: name.clone(),
                    source: BeanInstanceProviderError::NoDefinition(name.clone()),
                })?;

            factory
                .bean(&name)
                .map(|bean| (order, name.clone(), bean))
                .map_err(|source| ProcessorError::Instantiation { name, source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    // stable - equal orders keep registration order
    processors.sort_by_key(|(order, _, _)| *order);

    Ok(processors
        .into_iter()
        .map(|(_, name, bean)| (name, bean))
        .collect_vec())
}

fn incompatible(name: &str, capability: Capability) -> ErrorPtr {
    Arc::new(BeanInstanceProviderError::IncompatibleBean {
        name: name.to_string(),
        expected: format!("{capability:?}"),
    })
}
