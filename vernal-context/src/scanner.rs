//! Component scanning over known declaration sources.

use crate::condition::{should_skip, ConfigurationPhase, SimpleConditionContext};
use crate::environment::Environment;
use crate::error::ContextError;
use crate::source::{ScanDirective, SourceDescriptor, SourceKind, SourceReader, Stereotype, PACKAGE_SEPARATOR};
use convert_case::{Case, Casing};
use fxhash::FxHashSet;
#[cfg(test)]
use mockall::automock;
use std::sync::Arc;
use tracing::debug;
use vernal_beans::definition::DefinitionSource;
use vernal_beans::registry::{DefinitionRegistry, RegistryView};

pub type ComponentScannerPtr = Arc<dyn ComponentScanner + Send + Sync>;

pub type BeanNameGeneratorPtr = Arc<dyn BeanNameGenerator + Send + Sync>;

/// Separator for multiple packages given in a single (resolved) base package entry.
const PACKAGE_LIST_SEPARATOR: char = ',';

/// Generates bean names for sources without an explicit name.
#[cfg_attr(test, automock)]
pub trait BeanNameGenerator {
    fn generate(&self, source: &SourceDescriptor) -> String;
}

/// Uses the snake case version of the source name without packages.
#[derive(Copy, Clone, Debug, Default)]
pub struct SnakeCaseNameGenerator;

impl BeanNameGenerator for SnakeCaseNameGenerator {
    fn generate(&self, source: &SourceDescriptor) -> String {
        source
            .bean_name
            .clone()
            .unwrap_or_else(|| source.short_name().to_case(Case::Snake))
    }
}

/// Definition registered by a scan.
#[derive(Clone, Debug)]
pub struct ScannedComponent {
    pub bean_name: String,
    pub source: SourceDescriptor,
}

/// Finds components in packages and registers definitions for them.
pub trait ComponentScanner {
    /// Scans given packages, skipping the `excluded` source. Returns newly registered components.
    fn scan_packages(
        &self,
        base_packages: &[String],
        excluded: Option<&str>,
        reader: &dyn SourceReader,
        environment: &Environment,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<Vec<ScannedComponent>, ContextError>;

    /// Scans packages given by the directive declared in `declaring`. Without explicit packages,
    /// the package of the declaring source is used.
    fn scan(
        &self,
        directive: &ScanDirective,
        declaring: &SourceDescriptor,
        reader: &dyn SourceReader,
        environment: &Environment,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<Vec<ScannedComponent>, ContextError> {
        if directive.base_packages.is_empty() {
            self.scan_packages(
                &[declaring.package().to_string()],
                Some(&declaring.name),
                reader,
                environment,
                registry,
            )
        } else {
            self.scan_packages(
                &directive.base_packages,
                Some(&declaring.name),
                reader,
                environment,
                registry,
            )
        }
    }
}

/// Scanner looking through all sources known to a [SourceReader].
#[derive(Clone)]
pub struct CatalogScanner {
    name_generator: BeanNameGeneratorPtr,
}

impl Default for CatalogScanner {
    fn default() -> Self {
        Self::new(Arc::new(SnakeCaseNameGenerator))
    }
}

impl CatalogScanner {
    pub fn new(name_generator: BeanNameGeneratorPtr) -> Self {
        Self { name_generator }
    }

    fn do_scan(
        &self,
        base_packages: &[String],
        excluded: Option<&str>,
        reader: &dyn SourceReader,
        environment: &Environment,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<Vec<ScannedComponent>, ContextError> {
        let mut result = vec![];
        let mut seen = FxHashSet::default();

        for base_package in base_packages {
            let resolved = environment.resolve_required_placeholders(base_package)?;

            for package in resolved
                .split(PACKAGE_LIST_SEPARATOR)
                .map(str::trim)
                .filter(|package| !package.is_empty())
            {
                for name in reader.names() {
                    if Some(name.as_str()) == excluded || seen.contains(&name) {
                        continue;
                    }

                    let source = reader.read(&name)?;
                    if !is_in_package(&source, package)
                        || !self.is_candidate(&source, environment, registry)
                    {
                        continue;
                    }

                    seen.insert(name);

                    let bean_name = self.name_generator.generate(&source);
                    if self.check_candidate(&bean_name, &source, registry)? {
                        debug!(
                            bean_name = bean_name.as_str(),
                            source = source.name.as_str(),
                            "Registering scanned component."
                        );

                        registry.register_definition(
                            source
                                .to_definition(&bean_name)
                                .with_source(DefinitionSource::Scanned),
                        )?;

                        result.push(ScannedComponent { bean_name, source });
                    }
                }
            }
        }

        Ok(result)
    }

    fn is_candidate(
        &self,
        source: &SourceDescriptor,
        environment: &Environment,
        registry: &dyn DefinitionRegistry,
    ) -> bool {
        if source.is_interface
            || !matches!(source.kind, SourceKind::Unit)
            || !matches!(
                source.stereotype,
                Stereotype::Component | Stereotype::Configuration
            )
        {
            return false;
        }

        let phase = if source.is_configuration_candidate() {
            ConfigurationPhase::ParseConfiguration
        } else {
            ConfigurationPhase::RegisterBean
        };

        let registry = RegistryView::new(registry);
        let context = SimpleConditionContext::new(&registry, environment);
        !should_skip(&source.conditions, &source.name, phase, &context)
    }

    // true if the candidate should be registered, false if an equivalent one is already there
    fn check_candidate(
        &self,
        bean_name: &str,
        source: &SourceDescriptor,
        registry: &dyn DefinitionRegistry,
    ) -> Result<bool, ContextError> {
        match registry.definition(bean_name) {
            None => Ok(true),
            Some(existing) if existing.source_name.as_deref() == Some(source.name.as_str()) => {
                Ok(false)
            }
            Some(_) => Err(ContextError::ConflictingDefinition {
                name: bean_name.to_string(),
                source_name: source.name.clone(),
            }),
        }
    }
}

impl ComponentScanner for CatalogScanner {
    fn scan_packages(
        &self,
        base_packages: &[String],
        excluded: Option<&str>,
        reader: &dyn SourceReader,
        environment: &Environment,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<Vec<ScannedComponent>, ContextError> {
        if base_packages.is_empty() {
            return Err(ContextError::NoBasePackages);
        }

        self.do_scan(base_packages, excluded, reader, environment, registry)
    }
}

fn is_in_package(source: &SourceDescriptor, package: &str) -> bool {
    let source_package = source.package();
    source_package == package
        || source_package
            .strip_prefix(package)
            .map(|rest| rest.starts_with(PACKAGE_SEPARATOR))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use crate::environment::{Environment, PropertySource};
    use crate::error::ContextError;
    use crate::scanner::{
        CatalogScanner, ComponentScanner, MockBeanNameGenerator, SnakeCaseNameGenerator,
        BeanNameGenerator,
    };
    use crate::condition::Condition;
    use crate::source::{ScanDirective, SourceCatalog, SourceDescriptor};
    use std::sync::Arc;
    use vernal_beans::definition::{BeanDefinition, DefinitionSource};
    use vernal_beans::registry::{DefinitionRegistry, OrderedDefinitionRegistry};

    fn create_catalog() -> SourceCatalog {
        let mut catalog = SourceCatalog::default();
        catalog
            .register(SourceDescriptor::configuration("app::AppConfig"))
            .unwrap();
        catalog
            .register(SourceDescriptor::component("app::services::UserService"))
            .unwrap();
        catalog
            .register(SourceDescriptor::component("app::services::db::Repository"))
            .unwrap();
        catalog
            .register(SourceDescriptor::component("application::Other"))
            .unwrap();
        catalog
            .register(SourceDescriptor::plain("app::services::Helper"))
            .unwrap();
        catalog
            .register(
                SourceDescriptor::component("app::services::Disabled")
                    .with_condition(Condition::on_property("disabled.enabled", None)),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn should_generate_snake_case_names() {
        assert_eq!(
            SnakeCaseNameGenerator.generate(&SourceDescriptor::component("a::UserService")),
            "user_service"
        );
        assert_eq!(
            SnakeCaseNameGenerator
                .generate(&SourceDescriptor::component("a::UserService").with_bean_name("users")),
            "users"
        );
    }

    #[test]
    fn should_scan_declaring_package_by_default() {
        let catalog = create_catalog();
        let mut registry = OrderedDefinitionRegistry::new(true);
        let declaring = SourceDescriptor::configuration("app::AppConfig");

        let components = CatalogScanner::default()
            .scan(
                &ScanDirective::default(),
                &declaring,
                &catalog,
                &Environment::default(),
                &mut registry,
            )
            .unwrap();

        let names: Vec<_> = components
            .iter()
            .map(|component| component.bean_name.as_str())
            .collect();
        assert_eq!(names, vec!["user_service", "repository"]);

        let definition = registry.definition("repository").unwrap();
        assert_eq!(definition.source, DefinitionSource::Scanned);
        assert_eq!(
            definition.source_name.as_deref(),
            Some("app::services::db::Repository")
        );
    }

    #[test]
    fn should_resolve_base_package_placeholders() {
        let catalog = create_catalog();
        let mut registry = OrderedDefinitionRegistry::new(true);
        let mut environment = Environment::default();
        environment.add_last(PropertySource::from_map(
            "test",
            [("scan.packages".to_string(), "app::services::db,application".to_string())]
                .into_iter()
                .collect(),
        ));

        let mut generator = MockBeanNameGenerator::new();
        generator
            .expect_generate()
            .returning(|source| source.name.replace("::", "."));

        let components = CatalogScanner::new(Arc::new(generator))
            .scan(
                &ScanDirective {
                    base_packages: vec!["${scan.packages}".to_string()],
                },
                &SourceDescriptor::configuration("app::AppConfig"),
                &catalog,
                &environment,
                &mut registry,
            )
            .unwrap();

        assert_eq!(components.len(), 2);
        assert!(registry.contains_definition("app.services.db.Repository"));
        assert!(registry.contains_definition("application.Other"));
    }

    #[test]
    fn should_skip_compatible_and_reject_conflicting_definitions() {
        let catalog = create_catalog();
        let scanner = CatalogScanner::default();
        let mut registry = OrderedDefinitionRegistry::new(true);
        let packages = vec!["app::services::db".to_string()];

        assert_eq!(
            scanner
                .scan_packages(&packages, None, &catalog, &Environment::default(), &mut registry)
                .unwrap()
                .len(),
            1
        );
        assert!(scanner
            .scan_packages(&packages, None, &catalog, &Environment::default(), &mut registry)
            .unwrap()
            .is_empty());

        let mut registry = OrderedDefinitionRegistry::new(true);
        registry
            .register_definition(BeanDefinition::object("repository", |_| Ok(1_u8)))
            .unwrap();
        assert!(matches!(
            scanner
                .scan_packages(&packages, None, &catalog, &Environment::default(), &mut registry)
                .unwrap_err(),
            ContextError::ConflictingDefinition { name, .. } if name == "repository"
        ));
    }

    #[test]
    fn should_require_base_packages() {
        assert!(matches!(
            CatalogScanner::default()
                .scan_packages(
                    &[],
                    None,
                    &SourceCatalog::default(),
                    &Environment::default(),
                    &mut OrderedDefinitionRegistry::new(true)
                )
                .unwrap_err(),
            ContextError::NoBasePackages
        ));
    }
}
