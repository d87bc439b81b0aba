//! Turns resolved [ConfigurationUnit]s into bean definitions.

use crate::condition::{should_skip, ConfigurationPhase, SimpleConditionContext};
use crate::environment::Environment;
use crate::error::ContextError;
use crate::resolver::{ConfigurationUnit, UnitFactoryMethod};
use crate::source::Stereotype;
use fxhash::{FxHashMap, FxHashSet};
use tracing::debug;
use vernal_beans::definition::{DefinitionSource, Role};
use vernal_beans::registry::{DefinitionRegistry, RegistryView};

/// Registers definitions for configuration units.
pub struct DefinitionMaterializer<'a> {
    registry: &'a mut dyn DefinitionRegistry,
    environment: &'a Environment,
    // unit name -> skip
    skipped: FxHashMap<String, bool>,
}

impl<'a> DefinitionMaterializer<'a> {
    pub fn new(registry: &'a mut dyn DefinitionRegistry, environment: &'a Environment) -> Self {
        Self {
            registry,
            environment,
            skipped: Default::default(),
        }
    }

    /// Loads definitions for all `units` not in `already_loaded`, in order. Returns names of
    /// skipped units.
    pub fn load_definitions(
        &mut self,
        units: &[ConfigurationUnit],
        already_loaded: &FxHashSet<String>,
    ) -> Result<Vec<String>, ContextError> {
        let mut skipped_units = vec![];

        for unit in units
            .iter()
            .filter(|unit| !already_loaded.contains(unit.name()))
        {
            if self.should_skip(unit, units) {
                debug!(unit = unit.name(), "Skipping definitions of configuration unit.");

                if let Some(bean_name) = &unit.bean_name {
                    if self.registry.contains_definition(bean_name) {
                        self.registry.remove_definition(bean_name)?;
                    }
                }

                skipped_units.push(unit.name().to_string());
                continue;
            }

            self.load_unit(unit)?;
        }

        Ok(skipped_units)
    }

    fn load_unit(&mut self, unit: &ConfigurationUnit) -> Result<(), ContextError> {
        let unit_bean_name = unit.effective_bean_name();

        if let Some(importing) = unit.imported_by.first() {
            debug!(
                unit = unit.name(),
                bean_name = unit_bean_name.as_str(),
                "Registering imported configuration unit."
            );

            self.registry.register_definition(
                unit.source
                    .to_definition(&unit_bean_name)
                    .with_source(DefinitionSource::Imported {
                        by: importing.clone(),
                    }),
            )?;
        }

        let mut skipped_methods = FxHashSet::default();
        for method in &unit.factory_methods {
            self.load_factory_method(unit, &unit_bean_name, method, &mut skipped_methods)?;
        }

        for entry in &unit.registrars {
            entry
                .registrar
                .register_definitions(&entry.importing, self.registry, self.environment)
                .map_err(|source| ContextError::Registrar {
                    unit: unit.name().to_string(),
                    source,
                })?;
        }

        Ok(())
    }

    fn load_factory_method(
        &mut self,
        unit: &ConfigurationUnit,
        unit_bean_name: &str,
        method: &UnitFactoryMethod,
        skipped_methods: &mut FxHashSet<String>,
    ) -> Result<(), ContextError> {
        let method_name = &method.method.name;

        let skip = {
            let registry = RegistryView::new(&*self.registry);
            let context = SimpleConditionContext::new(&registry, self.environment);
            should_skip(
                &method.method.conditions,
                &method.declaring,
                ConfigurationPhase::RegisterBean,
                &context,
            )
        };

        if skip {
            skipped_methods.insert(method_name.clone());
            return Ok(());
        }

        // overloads of a skipped method are skipped too
        if skipped_methods.contains(method_name) {
            return Ok(());
        }

        let bean_name = method.method.bean_name();

        if self.is_overridden_by_existing(unit, method, bean_name)? {
            if bean_name == unit_bean_name {
                return Err(ContextError::BeanNameClash {
                    bean: bean_name.to_string(),
                    unit: unit.name().to_string(),
                });
            }

            debug!(
                bean_name,
                method = method_name.as_str(),
                "Skipping factory method definition, since an existing definition takes precedence."
            );
        } else if let Some(definition) = method.method.to_definition(unit.name()) {
            self.registry.register_definition(definition)?;
        }

        for alias in method.method.aliases() {
            self.registry.register_alias(bean_name, alias)?;
        }

        Ok(())
    }

    fn is_overridden_by_existing(
        &self,
        unit: &ConfigurationUnit,
        method: &UnitFactoryMethod,
        bean_name: &str,
    ) -> Result<bool, ContextError> {
        if !self.registry.contains_definition(bean_name) {
            return Ok(false);
        }

        let Some(existing) = self.registry.definition(bean_name) else {
            return Ok(false);
        };

        let override_error = || ContextError::DefinitionOverride {
            name: bean_name.to_string(),
            method: method.method.name.clone(),
            unit: unit.name().to_string(),
        };

        match &existing.source {
            DefinitionSource::FactoryMethod {
                unit: existing_unit,
                method: existing_method,
            } => {
                if existing_unit != unit.name() {
                    return Ok(false);
                }

                // overloaded method: the first one wins
                if *existing_method == method.method.name {
                    return Ok(true);
                }

                if unit.source.stereotype == Stereotype::Configuration
                    || !self.registry.allows_definition_overriding()
                {
                    return Err(override_error());
                }

                Ok(true)
            }
            DefinitionSource::Scanned => Ok(false),
            _ if existing.role == Role::Infrastructure => Ok(false),
            _ => {
                if !self.registry.allows_definition_overriding() {
                    return Err(override_error());
                }

                Ok(true)
            }
        }
    }

    fn should_skip(&mut self, unit: &ConfigurationUnit, units: &[ConfigurationUnit]) -> bool {
        if let Some(skip) = self.skipped.get(unit.name()) {
            return *skip;
        }

        // guards against import chains leading back to this unit
        self.skipped.insert(unit.name().to_string(), false);

        let all_importers_skipped = unit.is_imported()
            && unit.imported_by.iter().all(|importing| {
                units
                    .iter()
                    .find(|candidate| candidate.name() == importing)
                    .map(|importing| self.should_skip(importing, units))
                    .unwrap_or(false)
            });

        let skip = all_importers_skipped || {
            let registry = RegistryView::new(&*self.registry);
            let context = SimpleConditionContext::new(&registry, self.environment);
            should_skip(
                &unit.source.conditions,
                unit.name(),
                ConfigurationPhase::RegisterBean,
                &context,
            )
        };

        self.skipped.insert(unit.name().to_string(), skip);
        skip
    }
}
