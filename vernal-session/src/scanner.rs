//! Registration of mapper beans for statically registered mappers, found by their namespace
//! packages. Importing [MAPPER_SCANNER_REGISTRAR] from a configuration unit activates scanning,
//! configured with `mapper_scan.*` attributes of the importing source:
//!
//! * `mapper_scan.base_packages` - packages to scan (required); values can contain placeholders
//!   and comma-separated lists
//! * `mapper_scan.template` - name of the [SqlSessionTemplate](crate::template::SqlSessionTemplate)
//!   bean
//! * `mapper_scan.factory` - name of the session factory bean, used instead of a template
//! * `mapper_scan.add_to_config` - should mappers be added to the session configuration

use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::mapper::{
    static_mappers, MapperDefinition, MapperFactory, SessionSource, MAPPER_NAMESPACE_ATTRIBUTE,
};
use crate::template::SQL_SESSION_TEMPLATE_NAME;
use convert_case::{Case, Casing};
use std::sync::Arc;
use tracing::{debug, warn};
use vernal_beans::definition::{BeanDefinition, DefinitionSource};
use vernal_beans::error::ErrorPtr;
use vernal_beans::registry::DefinitionRegistry;
use vernal_context::environment::Environment;
use vernal_context::import::{ImportRegistrar, ImportRegistrarPtr};
use vernal_context::source::internal::{submit, SourceRegisterer};
use vernal_context::source::SourceDescriptor;

/// Name of the registrar source to import.
pub const MAPPER_SCANNER_REGISTRAR: &str = "vernal_session::MapperScannerRegistrar";

pub const BASE_PACKAGES_ATTRIBUTE: &str = "mapper_scan.base_packages";
pub const TEMPLATE_ATTRIBUTE: &str = "mapper_scan.template";
pub const FACTORY_ATTRIBUTE: &str = "mapper_scan.factory";
pub const ADD_TO_CONFIG_ATTRIBUTE: &str = "mapper_scan.add_to_config";

const PACKAGE_SEPARATOR: &str = "::";

/// Import registrar scanning for mappers.
pub struct MapperScannerRegistrar {
    mappers: Vec<MapperDefinition>,
    add_to_config: bool,
}

impl Default for MapperScannerRegistrar {
    fn default() -> Self {
        let config = SessionConfig::init_from_environment().unwrap_or_else(|error| {
            warn!(%error, "Cannot read session configuration - using defaults.");
            SessionConfig::default()
        });

        Self::new(static_mappers()).with_add_to_config(config.add_mappers_to_registry)
    }
}

impl MapperScannerRegistrar {
    /// Creates a registrar scanning given mappers instead of statically registered ones.
    pub fn new(mappers: Vec<MapperDefinition>) -> Self {
        Self {
            mappers,
            add_to_config: true,
        }
    }

    /// Sets the default for sources without [ADD_TO_CONFIG_ATTRIBUTE].
    pub fn with_add_to_config(mut self, add_to_config: bool) -> Self {
        self.add_to_config = add_to_config;
        self
    }

    fn base_packages(
        importing: &SourceDescriptor,
        environment: &Environment,
    ) -> Result<Vec<String>, SessionError> {
        let base_packages: Vec<_> = importing
            .attribute(BASE_PACKAGES_ATTRIBUTE)
            .unwrap_or_default()
            .iter()
            .flat_map(|value| {
                environment
                    .resolve_placeholders(value)
                    .split(',')
                    .map(|package| package.trim().to_string())
                    .filter(|package| !package.is_empty())
                    .collect::<Vec<_>>()
            })
            .collect();

        if base_packages.is_empty() {
            return Err(SessionError::Config(format!(
                "At least one base package must be specified for mapper scanning in '{}'",
                importing.name
            )));
        }

        Ok(base_packages)
    }

    fn session_source(importing: &SourceDescriptor) -> SessionSource {
        let single = |key| {
            importing
                .attribute(key)
                .and_then(|values| values.first())
                .cloned()
        };

        match (single(FACTORY_ATTRIBUTE), single(TEMPLATE_ATTRIBUTE)) {
            (_, Some(template)) => SessionSource::Template(template),
            (Some(factory), None) => SessionSource::Factory(factory),
            (None, None) => SessionSource::Template(SQL_SESSION_TEMPLATE_NAME.to_string()),
        }
    }

    fn add_to_config(&self, importing: &SourceDescriptor) -> bool {
        importing
            .attribute(ADD_TO_CONFIG_ATTRIBUTE)
            .and_then(|values| values.first())
            .map(|value| value != "false")
            .unwrap_or(self.add_to_config)
    }

    fn is_in_package(mapper: &MapperDefinition, base_package: &str) -> bool {
        let package = mapper.package();
        package == base_package
            || package
                .strip_prefix(base_package)
                .map(|rest| rest.starts_with(PACKAGE_SEPARATOR))
                .unwrap_or(false)
    }

    fn is_compatible(existing: &BeanDefinition, namespace: &str) -> bool {
        existing.source != DefinitionSource::Scanned
            || existing
                .attributes
                .get(MAPPER_NAMESPACE_ATTRIBUTE)
                .map(|existing| existing == namespace)
                .unwrap_or(false)
    }
}

impl ImportRegistrar for MapperScannerRegistrar {
    fn register_definitions(
        &self,
        importing: &SourceDescriptor,
        registry: &mut dyn DefinitionRegistry,
        environment: &Environment,
    ) -> Result<(), ErrorPtr> {
        let base_packages = Self::base_packages(importing, environment)
            .map_err(|error| Arc::new(error) as ErrorPtr)?;
        let session_source = Self::session_source(importing);
        let add_to_config = self.add_to_config(importing);

        let mut found = false;
        for base_package in &base_packages {
            for mapper in self
                .mappers
                .iter()
                .filter(|mapper| Self::is_in_package(mapper, base_package))
            {
                found = true;

                let bean_name = mapper.short_name().to_case(Case::Snake);
                if let Some(existing) = registry.definition(&bean_name) {
                    if Self::is_compatible(&existing, &mapper.namespace) {
                        warn!(
                            bean_name = bean_name.as_str(),
                            namespace = mapper.namespace.as_str(),
                            "Skipping mapper. Bean already defined with the same name!"
                        );
                        continue;
                    }

                    return Err(Arc::new(SessionError::ConflictingMapperDefinition {
                        bean_name,
                        namespace: mapper.namespace.clone(),
                    }) as ErrorPtr);
                }

                debug!(
                    bean_name = bean_name.as_str(),
                    namespace = mapper.namespace.as_str(),
                    "Creating mapper bean definition."
                );

                registry
                    .register_definition(
                        MapperFactory::definition(
                            &bean_name,
                            mapper.clone(),
                            session_source.clone(),
                            add_to_config,
                        )
                        .with_source(DefinitionSource::Scanned),
                    )
                    .map_err(|error| Arc::new(error) as ErrorPtr)?;
            }
        }

        if !found {
            warn!(
                base_packages = base_packages.join(",").as_str(),
                "No mapper was found in the base packages. Please check your configuration."
            );
        }

        Ok(())
    }
}

/// Declares mapper scanning on a configuration source.
pub fn with_mapper_scan<I, P>(source: SourceDescriptor, base_packages: I) -> SourceDescriptor
where
    I: IntoIterator<Item = P>,
    P: ToString,
{
    source
        .with_import(MAPPER_SCANNER_REGISTRAR)
        .with_attribute(BASE_PACKAGES_ATTRIBUTE, base_packages)
}

fn mapper_scanner_registrar() -> SourceDescriptor {
    SourceDescriptor::registrar(MAPPER_SCANNER_REGISTRAR, || {
        Box::new(MapperScannerRegistrar::default()) as ImportRegistrarPtr
    })
}

submit! {
    SourceRegisterer { register: mapper_scanner_registrar }
}

#[cfg(test)]
mod tests {
    use crate::error::SessionError;
    use crate::mapper::{MapperDefinition, MAPPER_NAMESPACE_ATTRIBUTE};
    use crate::scanner::{with_mapper_scan, MapperScannerRegistrar, FACTORY_ATTRIBUTE};
    use fxhash::FxHashMap;
    use vernal_beans::definition::{BeanDefinition, DefinitionSource};
    use vernal_beans::registry::{DefinitionRegistry, OrderedDefinitionRegistry};
    use vernal_context::environment::{Environment, PropertySource};
    use vernal_context::import::ImportRegistrar;
    use vernal_context::source::SourceDescriptor;

    fn registrar() -> MapperScannerRegistrar {
        MapperScannerRegistrar::new(vec![
            MapperDefinition::new("shop::mappers::UserMapper").select_one("find_by_id"),
            MapperDefinition::new("shop::mappers::orders::OrderMapper").select_list("find_all"),
            MapperDefinition::new("shop::mappersextra::OtherMapper").insert("save"),
            MapperDefinition::new("billing::InvoiceMapper").delete("remove"),
        ])
    }

    fn environment() -> Environment {
        let mut environment = Environment::default();
        let mut values = FxHashMap::default();
        values.insert("mapper.package".to_string(), "shop::mappers".to_string());
        environment.add_first(PropertySource::from_map("test", values));
        environment
    }

    #[test]
    fn should_register_mappers_in_base_packages() {
        let source = with_mapper_scan(
            SourceDescriptor::configuration("shop::ShopConfig"),
            ["${mapper.package}, billing"],
        );
        let mut registry = OrderedDefinitionRegistry::new(true);

        registrar()
            .register_definitions(&source, &mut registry, &environment())
            .unwrap();

        assert_eq!(
            registry.definition_names(),
            vec!["user_mapper", "order_mapper", "invoice_mapper"]
        );

        let definition = registry.definition("order_mapper").unwrap();
        assert_eq!(definition.source, DefinitionSource::Scanned);
        assert_eq!(
            definition.attributes.get(MAPPER_NAMESPACE_ATTRIBUTE).unwrap(),
            "shop::mappers::orders::OrderMapper"
        );
    }

    #[test]
    fn should_skip_compatible_existing_definitions() {
        let source = with_mapper_scan(SourceDescriptor::configuration("shop::ShopConfig"), ["billing"])
            .with_attribute(FACTORY_ATTRIBUTE, ["sql_session_factory"]);
        let mut registry = OrderedDefinitionRegistry::new(true);
        registry
            .register_definition(BeanDefinition::object("invoice_mapper", |_| Ok(1_u8)))
            .unwrap();

        registrar()
            .register_definitions(&source, &mut registry, &environment())
            .unwrap();

        assert_eq!(registry.len(), 1);
        assert!(registry.definition("invoice_mapper").unwrap().is_type::<u8>());
    }

    #[test]
    fn should_reject_conflicting_scanned_definitions() {
        let source = with_mapper_scan(SourceDescriptor::configuration("shop::ShopConfig"), ["billing"]);
        let mut registry = OrderedDefinitionRegistry::new(true);
        registry
            .register_definition(
                BeanDefinition::object("invoice_mapper", |_| Ok(1_u8))
                    .with_source(DefinitionSource::Scanned),
            )
            .unwrap();

        let error = registrar()
            .register_definitions(&source, &mut registry, &environment())
            .unwrap_err();
        assert!(matches!(
            error.downcast_ref::<SessionError>(),
            Some(SessionError::ConflictingMapperDefinition { .. })
        ));
    }

    #[test]
    fn should_require_base_packages() {
        let source = with_mapper_scan(
            SourceDescriptor::configuration("shop::ShopConfig"),
            Vec::<String>::new(),
        );
        let mut registry = OrderedDefinitionRegistry::new(true);

        assert!(registrar()
            .register_definitions(&source, &mut registry, &environment())
            .is_err());
    }

    #[test]
    fn should_tolerate_empty_scan_results() {
        let source = with_mapper_scan(SourceDescriptor::configuration("shop::ShopConfig"), ["crm"]);
        let mut registry = OrderedDefinitionRegistry::new(true);

        registrar()
            .register_definitions(&source, &mut registry, &environment())
            .unwrap();
        assert!(registry.is_empty());
    }
}
