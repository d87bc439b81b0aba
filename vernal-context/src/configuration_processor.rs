//! Registry processor driving configuration resolution and definition materialization.

use crate::environment::{EnvironmentPtr, PropertySourceLoaderPtr};
use crate::error::ContextError;
use crate::materializer::DefinitionMaterializer;
use crate::problem::CollectingProblemReporter;
use crate::resolver::{Candidate, ConfigurationGraphResolver, ResolverContext};
use crate::scanner::ComponentScannerPtr;
use crate::source::SourceReaderPtr;
use fxhash::FxHashSet;
use std::sync::Arc;
use tracing::{debug, info};
use vernal_beans::definition::{
    BeanDefinition, DefinitionSource, Ordering, Role, LOWEST_PRECEDENCE,
};
use vernal_beans::error::ErrorPtr;
use vernal_beans::processor::{RegistryPostProcessor, RegistryProcessorPtr};
use vernal_beans::registry::DefinitionRegistry;

/// Name of the internally registered configuration processor.
pub const CONFIGURATION_PROCESSOR_NAME: &str = "vernal_internal_configuration_processor";

/// Finds configuration candidates among registered definitions, resolves the configuration graph
/// and registers resulting definitions. Repeats until no new candidates appear.
pub struct ConfigurationProcessor {
    reader: SourceReaderPtr,
    scanner: ComponentScannerPtr,
    loader: PropertySourceLoaderPtr,
    environment: EnvironmentPtr,
}

impl ConfigurationProcessor {
    pub fn new(
        reader: SourceReaderPtr,
        scanner: ComponentScannerPtr,
        loader: PropertySourceLoaderPtr,
        environment: EnvironmentPtr,
    ) -> Self {
        Self {
            reader,
            scanner,
            loader,
            environment,
        }
    }

    /// Creates an infrastructure definition for a processor with given collaborators.
    pub fn definition(
        reader: SourceReaderPtr,
        scanner: ComponentScannerPtr,
        loader: PropertySourceLoaderPtr,
        environment: EnvironmentPtr,
    ) -> BeanDefinition {
        BeanDefinition::registry_processor(
            CONFIGURATION_PROCESSOR_NAME,
            Ordering::Priority(LOWEST_PRECEDENCE),
            move |_| {
                Ok(Arc::new(ConfigurationProcessor::new(
                    reader.clone(),
                    scanner.clone(),
                    loader.clone(),
                    environment.clone(),
                )) as RegistryProcessorPtr)
            },
        )
        .with_role(Role::Infrastructure)
        .with_source(DefinitionSource::Infrastructure)
    }

    pub fn process_configuration(
        &self,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<(), ContextError> {
        let mut known_names: FxHashSet<String> = FxHashSet::default();
        let mut already_loaded: FxHashSet<String> = FxHashSet::default();

        let mut candidates = self.find_candidates(registry, &known_names, &already_loaded);
        if candidates.is_empty() {
            debug!("No configuration candidates found.");
            return Ok(());
        }

        known_names.extend(registry.definition_names());

        let mut environment = self.environment.write();
        let mut resolver = ConfigurationGraphResolver::default();

        loop {
            info!(count = candidates.len(), "Processing configuration candidates.");

            let mut reporter = CollectingProblemReporter::default();
            {
                let mut context = ResolverContext {
                    reader: &*self.reader,
                    scanner: &*self.scanner,
                    loader: &*self.loader,
                    environment: &mut *environment,
                    registry: &mut *registry,
                    reporter: &mut reporter,
                };

                resolver.parse(&mut context, &candidates)?;
            }

            resolver.validate(&mut reporter);
            reporter.into_result()?;

            let skipped = DefinitionMaterializer::new(&mut *registry, &*environment)
                .load_definitions(resolver.units(), &already_loaded)?;

            for unit in skipped {
                resolver.import_stack_mut().remove_importing_unit(&unit);
            }

            already_loaded.extend(resolver.units().iter().map(|unit| unit.name().to_string()));

            candidates = self.find_candidates(registry, &known_names, &already_loaded);
            known_names.extend(registry.definition_names());

            if candidates.is_empty() {
                break;
            }
        }

        Ok(())
    }

    fn find_candidates(
        &self,
        registry: &dyn DefinitionRegistry,
        known_names: &FxHashSet<String>,
        already_loaded: &FxHashSet<String>,
    ) -> Vec<Candidate> {
        let mut candidates: Vec<_> = registry
            .definition_names()
            .into_iter()
            .filter(|name| !known_names.contains(name))
            .filter_map(|name| {
                let source_name = registry.definition(&name)?.source_name?;
                if already_loaded.contains(&source_name) {
                    return None;
                }

                match self.reader.read(&source_name) {
                    Ok(source) if source.is_configuration_candidate() => Some((
                        Candidate {
                            source_name,
                            bean_name: name,
                        },
                        source.order.unwrap_or(LOWEST_PRECEDENCE),
                    )),
                    Ok(_) => None,
                    Err(error) => {
                        debug!(%error, bean_name = name, "Cannot read declaration source of definition.");
                        None
                    }
                }
            })
            .collect();

        candidates.sort_by_key(|(_, order)| *order);
        candidates
            .into_iter()
            .map(|(candidate, _)| candidate)
            .collect()
    }
}

impl RegistryPostProcessor for ConfigurationProcessor {
    fn process_registry(&self, registry: &mut dyn DefinitionRegistry) -> Result<(), ErrorPtr> {
        self.process_configuration(registry)
            .map_err(|error| Arc::new(error) as ErrorPtr)
    }
}
