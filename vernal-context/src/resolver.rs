//! Resolution of the configuration graph.
//!
//! Starting from candidate sources, the [ConfigurationGraphResolver] walks nested members,
//! property-source directives, scans, imports, factory methods, interfaces and superclasses,
//! producing an ordered list of [ConfigurationUnit]s. Every reachable unit is resolved once.
//! Circular imports are reported to a [ProblemReporter](crate::problem::ProblemReporter) instead
//! of failing immediately, and processing of the offending branch stops there.

use crate::condition::{should_skip, ConfigurationPhase, SimpleConditionContext};
use crate::environment::{Environment, PropertySource, PropertySourceLoader};
use crate::error::ContextError;
use crate::import::{ImportRegistrarPtr, ImportSelector, ImportSelectorPtr, ImportStack, SelectionContext};
use crate::problem::{Problem, ProblemKind, ProblemReporter};
use crate::scanner::ComponentScanner;
use crate::source::{
    FactoryMethod, PropertySourceDirective, SourceDescriptor, SourceKind, SourceReader, Stereotype,
};
use derivative::Derivative;
use fxhash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use tracing::{debug, info, trace};
use vernal_beans::definition::LOWEST_PRECEDENCE;
use vernal_beans::registry::{DefinitionRegistry, RegistryView};

/// Registrar attached to a unit, along with the source which imported it.
#[derive(Derivative)]
#[derivative(Debug)]
pub struct RegistrarEntry {
    #[derivative(Debug = "ignore")]
    pub registrar: ImportRegistrarPtr,
    pub importing: SourceDescriptor,
}

/// Factory method collected for a unit, along with the source declaring it (the unit itself, a
/// superclass or an interface).
#[derive(Clone, Debug)]
pub struct UnitFactoryMethod {
    pub declaring: String,
    pub method: FactoryMethod,
}

/// A resolved configuration unit.
#[derive(Debug)]
pub struct ConfigurationUnit {
    pub source: SourceDescriptor,
    /// Name of the existing definition for explicitly registered units.
    pub bean_name: Option<String>,
    /// Units which imported this one. Empty for explicitly registered units.
    pub imported_by: Vec<String>,
    pub factory_methods: Vec<UnitFactoryMethod>,
    pub registrars: Vec<RegistrarEntry>,
}

impl ConfigurationUnit {
    pub fn explicit(source: SourceDescriptor, bean_name: Option<String>) -> Self {
        Self {
            source,
            bean_name,
            imported_by: vec![],
            factory_methods: vec![],
            registrars: vec![],
        }
    }

    pub fn imported<T: ToString>(source: SourceDescriptor, imported_by: T) -> Self {
        Self {
            source,
            bean_name: None,
            imported_by: vec![imported_by.to_string()],
            factory_methods: vec![],
            registrars: vec![],
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.source.name
    }

    #[inline]
    pub fn is_imported(&self) -> bool {
        !self.imported_by.is_empty()
    }

    /// Name of the definition representing this unit.
    pub fn effective_bean_name(&self) -> String {
        self.bean_name
            .clone()
            .or_else(|| self.source.bean_name.clone())
            .unwrap_or_else(|| self.source.name.clone())
    }

    fn merge_imported_by(&mut self, other: ConfigurationUnit) {
        for importing in other.imported_by {
            if !self.imported_by.contains(&importing) {
                self.imported_by.push(importing);
            }
        }
    }
}

/// Source to resolve, backed by an existing definition.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Candidate {
    pub source_name: String,
    pub bean_name: String,
}

/// Collaborators used during resolution.
pub struct ResolverContext<'a> {
    pub reader: &'a dyn SourceReader,
    pub scanner: &'a dyn ComponentScanner,
    pub loader: &'a dyn PropertySourceLoader,
    pub environment: &'a mut Environment,
    pub registry: &'a mut dyn DefinitionRegistry,
    pub reporter: &'a mut dyn ProblemReporter,
}

impl ResolverContext<'_> {
    fn should_skip(&self, source: &SourceDescriptor, phase: ConfigurationPhase) -> bool {
        let registry = RegistryView::new(&*self.registry);
        let context = SimpleConditionContext::new(&registry, &*self.environment);
        should_skip(&source.conditions, &source.name, phase, &context)
    }
}

struct DeferredSelection {
    unit: String,
    importing: SourceDescriptor,
    selector_name: String,
    selector: ImportSelectorPtr,
    order: i32,
}

/// Resolves configuration units. State is kept between calls to [parse](Self::parse), so units
/// resolved earlier are not resolved again.
pub struct ConfigurationGraphResolver {
    units: Vec<ConfigurationUnit>,
    known_superclasses: FxHashMap<String, String>,
    property_source_names: Vec<String>,
    import_stack: ImportStack,
    deferred: Option<Vec<DeferredSelection>>,
}

impl Default for ConfigurationGraphResolver {
    fn default() -> Self {
        Self {
            units: vec![],
            known_superclasses: Default::default(),
            property_source_names: vec![],
            import_stack: Default::default(),
            deferred: Some(vec![]),
        }
    }
}

impl ConfigurationGraphResolver {
    /// All units resolved so far, in resolution order.
    #[inline]
    pub fn units(&self) -> &[ConfigurationUnit] {
        &self.units
    }

    #[inline]
    pub fn import_stack(&self) -> &ImportStack {
        &self.import_stack
    }

    #[inline]
    pub fn import_stack_mut(&mut self) -> &mut ImportStack {
        &mut self.import_stack
    }

    /// Resolves given candidates, followed by all deferred selections.
    pub fn parse(
        &mut self,
        context: &mut ResolverContext,
        candidates: &[Candidate],
    ) -> Result<(), ContextError> {
        for candidate in candidates {
            trace!(source = candidate.source_name.as_str(), "Parsing configuration candidate.");

            context
                .reader
                .read(&candidate.source_name)
                .map_err(ContextError::from)
                .and_then(|source| {
                    self.process_unit(
                        context,
                        ConfigurationUnit::explicit(source, Some(candidate.bean_name.clone())),
                    )
                })
                .map_err(|error| wrap_parse_failure(&candidate.source_name, error))?;
        }

        self.process_deferred(context)
    }

    /// Reports structural problems of resolved units.
    pub fn validate(&self, reporter: &mut dyn ProblemReporter) {
        for unit in &self.units {
            if unit.source.stereotype == Stereotype::Configuration {
                let mut declared: FxHashMap<&str, &str> = FxHashMap::default();
                for method in &unit.factory_methods {
                    if let Some(existing) =
                        declared.insert(&method.method.name, &method.declaring)
                    {
                        if existing == method.declaring {
                            reporter.error(Problem {
                                kind: ProblemKind::DuplicateFactoryMethod,
                                source_name: unit.name().to_string(),
                                message: format!(
                                    "Configuration unit '{}' declares multiple factory methods named '{}'; use unique method names for separate bean definitions",
                                    unit.name(),
                                    method.method.name
                                ),
                            });
                        }
                    }
                }
            }

            for method in unit
                .factory_methods
                .iter()
                .filter(|method| method.method.is_abstract)
            {
                reporter.error(Problem {
                    kind: ProblemKind::AbstractFactoryMethod,
                    source_name: method.declaring.clone(),
                    message: format!(
                        "Factory method '{}' must not be abstract outside of an interface",
                        method.method.name
                    ),
                });
            }
        }
    }

    fn process_unit(
        &mut self,
        context: &mut ResolverContext,
        mut unit: ConfigurationUnit,
    ) -> Result<(), ContextError> {
        if context.should_skip(&unit.source, ConfigurationPhase::ParseConfiguration) {
            debug!(unit = unit.name(), "Skipping configuration unit due to conditions.");
            return Ok(());
        }

        if let Some(position) = self.position_of(unit.name()) {
            if unit.is_imported() {
                // an explicit unit always takes precedence over an imported one
                if self.units[position].is_imported() {
                    self.units[position].merge_imported_by(unit);
                }
                return Ok(());
            }

            self.units.remove(position);

            let name = unit.name().to_string();
            self.known_superclasses.retain(|_, owner| *owner != name);
        }

        let mut current = Some(unit.source.clone());
        while let Some(source) = current {
            current = self.do_process(context, &mut unit, source)?;
        }

        match self.position_of(unit.name()) {
            Some(position) => self.units[position] = unit,
            None => self.units.push(unit),
        }

        Ok(())
    }

    // returns the superclass to continue with, if any
    fn do_process(
        &mut self,
        context: &mut ResolverContext,
        unit: &mut ConfigurationUnit,
        source: SourceDescriptor,
    ) -> Result<Option<SourceDescriptor>, ContextError> {
        if matches!(
            source.stereotype,
            Stereotype::Component | Stereotype::Configuration
        ) {
            self.process_members(context, unit, &source)?;
        }

        for directive in &source.property_sources {
            self.process_property_source(context, &source, directive)?;
        }

        if !source.scans.is_empty()
            && !context.should_skip(&source, ConfigurationPhase::RegisterBean)
        {
            for directive in &source.scans {
                let components = context.scanner.scan(
                    directive,
                    &source,
                    context.reader,
                    &*context.environment,
                    &mut *context.registry,
                )?;

                for component in components {
                    if component.source.is_configuration_candidate() {
                        self.process_unit(
                            context,
                            ConfigurationUnit::explicit(
                                component.source,
                                Some(component.bean_name),
                            ),
                        )?;
                    }
                }
            }
        }

        let imports = collect_imports(context.reader, &source)?;
        let unit_name = unit.name().to_string();
        let registrars = self.process_imports(context, &unit_name, &source, imports, true)?;
        unit.registrars.extend(registrars);

        unit.factory_methods.extend(
            factory_methods_of(context.reader, &source)
                .into_iter()
                .map(|method| UnitFactoryMethod {
                    declaring: source.name.clone(),
                    method,
                }),
        );

        let mut visited_interfaces = FxHashSet::default();
        process_interfaces(context.reader, unit, &source, &mut visited_interfaces)?;

        if let Some(superclass) = &source.superclass {
            if !self.known_superclasses.contains_key(superclass) {
                self.known_superclasses
                    .insert(superclass.clone(), unit_name);
                return Ok(Some(context.reader.read(superclass)?));
            }
        }

        Ok(None)
    }

    fn process_members(
        &mut self,
        context: &mut ResolverContext,
        unit: &ConfigurationUnit,
        source: &SourceDescriptor,
    ) -> Result<(), ContextError> {
        let mut candidates = vec![];
        for member in &source.members {
            let member = context.reader.read(member)?;
            if member.is_configuration_candidate() && member.name != unit.name() {
                candidates.push(member);
            }
        }

        candidates.sort_by_key(|member| member.order.unwrap_or(LOWEST_PRECEDENCE));

        for member in candidates {
            if self.import_stack.contains(unit.name()) {
                self.report_circular_import(context, unit.name());
                continue;
            }

            self.import_stack.push(unit.name());
            let result = self.process_unit(context, ConfigurationUnit::imported(member, unit.name()));
            self.import_stack.pop();
            result?;
        }

        Ok(())
    }

    fn process_property_source(
        &mut self,
        context: &mut ResolverContext,
        source: &SourceDescriptor,
        directive: &PropertySourceDirective,
    ) -> Result<(), ContextError> {
        if directive.locations.is_empty() {
            return Err(ContextError::MissingPropertySourceLocation(
                source.name.clone(),
            ));
        }

        for location in &directive.locations {
            let loaded = context
                .environment
                .resolve_required_placeholders(location)
                .and_then(|resolved| {
                    context
                        .loader
                        .load(directive.name.clone(), &resolved)
                        .map(|property_source| (resolved, property_source))
                });

            match loaded {
                Ok((resolved, property_source)) => {
                    self.add_property_source(context.environment, property_source, &resolved)?
                }
                Err(error) if directive.ignore_resource_not_found && error.is_resource_not_found() => {
                    info!(location, %error, "Property source location not resolvable.");
                }
                Err(error) => return Err(error.into()),
            }
        }

        Ok(())
    }

    fn add_property_source(
        &mut self,
        environment: &mut Environment,
        property_source: PropertySource,
        resource_name: &str,
    ) -> Result<(), ContextError> {
        let name = property_source.name().to_string();

        if self.property_source_names.contains(&name) {
            if let Some(existing) = environment.get_mut(&name) {
                let property_source = property_source.renamed(resource_name);
                if existing.is_composite() {
                    existing.add_first_source(property_source);
                } else {
                    let previous = std::mem::replace(existing, PropertySource::composite(&name));
                    existing.add_source(property_source);
                    existing.add_source(previous);
                }

                return Ok(());
            }
        }

        match self.property_source_names.last() {
            Some(last) => environment.add_before(last, property_source)?,
            None => environment.add_last(property_source),
        }

        self.property_source_names.push(name);
        Ok(())
    }

    fn process_imports(
        &mut self,
        context: &mut ResolverContext,
        unit_name: &str,
        current: &SourceDescriptor,
        imports: Vec<String>,
        check_for_circular_imports: bool,
    ) -> Result<Vec<RegistrarEntry>, ContextError> {
        if imports.is_empty() {
            return Ok(vec![]);
        }

        if check_for_circular_imports && self.import_stack.is_chained_import(unit_name) {
            self.report_circular_import(context, unit_name);
            return Ok(vec![]);
        }

        self.import_stack.push(unit_name);
        let result = self.process_import_candidates(context, unit_name, current, imports);
        self.import_stack.pop();

        result.map_err(|error| wrap_import_failure(unit_name, error))
    }

    fn process_import_candidates(
        &mut self,
        context: &mut ResolverContext,
        unit_name: &str,
        current: &SourceDescriptor,
        imports: Vec<String>,
    ) -> Result<Vec<RegistrarEntry>, ContextError> {
        let mut registrars = vec![];

        for import in imports {
            let candidate = context.reader.read(&import)?;

            match candidate.kind.clone() {
                SourceKind::Selector(factory) => {
                    let mut selector = factory();
                    selector.aware(
                        &*context.environment,
                        &RegistryView::new(&*context.registry),
                    );

                    if selector.is_deferred() {
                        if let Some(deferred) = &mut self.deferred {
                            deferred.push(DeferredSelection {
                                unit: unit_name.to_string(),
                                importing: current.clone(),
                                selector_name: candidate.name.clone(),
                                order: selector
                                    .order()
                                    .or(candidate.order)
                                    .unwrap_or(LOWEST_PRECEDENCE),
                                selector,
                            });
                            continue;
                        }
                    }

                    let selected = self.select(context, selector.as_ref(), &candidate.name, current)?;
                    registrars.extend(self.process_imports(
                        context, unit_name, current, selected, false,
                    )?);
                }
                SourceKind::Registrar(factory) => {
                    let mut registrar = factory();
                    registrar.aware(
                        &*context.environment,
                        &RegistryView::new(&*context.registry),
                    );

                    registrars.push(RegistrarEntry {
                        registrar,
                        importing: current.clone(),
                    });
                }
                SourceKind::Unit => {
                    self.import_stack
                        .register_import(&current.name, &candidate.name);
                    self.process_unit(context, ConfigurationUnit::imported(candidate, unit_name))?;
                }
            }
        }

        Ok(registrars)
    }

    fn select(
        &self,
        context: &ResolverContext,
        selector: &dyn ImportSelector,
        selector_name: &str,
        importing: &SourceDescriptor,
    ) -> Result<Vec<String>, ContextError> {
        let resolved_units: Vec<_> = self
            .units
            .iter()
            .map(|unit| unit.name().to_string())
            .collect();
        let registry = RegistryView::new(&*context.registry);
        let selection_context = SelectionContext {
            resolved_units: &resolved_units,
            registry: &registry,
            environment: &*context.environment,
        };

        selector
            .select_imports(importing, &selection_context)
            .map_err(|source| ContextError::Selector {
                selector: selector_name.to_string(),
                source,
            })
    }

    fn process_deferred(&mut self, context: &mut ResolverContext) -> Result<(), ContextError> {
        let Some(mut deferred) = self.deferred.take() else {
            return Ok(());
        };

        deferred.sort_by_key(|selection| selection.order);

        let result = self.run_deferred(context, deferred);
        self.deferred = Some(vec![]);
        result
    }

    fn run_deferred(
        &mut self,
        context: &mut ResolverContext,
        deferred: Vec<DeferredSelection>,
    ) -> Result<(), ContextError> {
        for selection in deferred {
            trace!(
                selector = selection.selector_name.as_str(),
                unit = selection.unit.as_str(),
                "Running deferred import selector."
            );

            let registrars = self
                .select(
                    context,
                    selection.selector.as_ref(),
                    &selection.selector_name,
                    &selection.importing,
                )
                .and_then(|selected| {
                    self.process_imports(
                        context,
                        &selection.unit,
                        &selection.importing,
                        selected,
                        false,
                    )
                })
                .map_err(|error| wrap_import_failure(&selection.unit, error))?;

            match self.position_of(&selection.unit) {
                Some(position) => self.units[position].registrars.extend(registrars),
                None if !registrars.is_empty() => {
                    debug!(
                        unit = selection.unit.as_str(),
                        "Dropping registrars for a unit which has not been resolved."
                    );
                }
                None => {}
            }
        }

        Ok(())
    }

    fn report_circular_import(&self, context: &mut ResolverContext, unit_name: &str) {
        context.reporter.error(Problem::circular_import(
            self.import_stack.peek().unwrap_or(unit_name),
            unit_name,
            &self.import_stack.to_string(),
        ));
    }

    fn position_of(&self, name: &str) -> Option<usize> {
        self.units.iter().position(|unit| unit.name() == name)
    }
}

// imports of annotation sources come first, followed by direct imports
fn collect_imports(
    reader: &dyn SourceReader,
    source: &SourceDescriptor,
) -> Result<Vec<String>, ContextError> {
    fn collect(
        reader: &dyn SourceReader,
        source: &SourceDescriptor,
        imports: &mut Vec<String>,
        visited: &mut FxHashSet<String>,
    ) -> Result<(), ContextError> {
        if !visited.insert(source.name.clone()) {
            return Ok(());
        }

        for annotation in &source.annotations {
            collect(reader, &reader.read(annotation)?, imports, visited)?;
        }

        for import in &source.imports {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }

        Ok(())
    }

    let mut imports = vec![];
    let mut visited = FxHashSet::default();
    collect(reader, source, &mut imports, &mut visited)?;
    Ok(imports)
}

fn factory_methods_of(reader: &dyn SourceReader, source: &SourceDescriptor) -> Vec<FactoryMethod> {
    let methods = &source.factory_methods;

    if methods.len() > 1 {
        if let Some(declaration_order) = reader.declaration_order(&source.name) {
            if declaration_order.len() >= methods.len() {
                let mut selected: Vec<usize> = Vec::with_capacity(methods.len());
                for name in &declaration_order {
                    if let Some(index) = methods.iter().position(|method| method.name == *name) {
                        if !selected.contains(&index) {
                            selected.push(index);
                        }
                    }
                }

                if selected.len() == methods.len() {
                    return selected
                        .into_iter()
                        .map(|index| methods[index].clone())
                        .collect();
                }
            }
        }
    }

    methods.clone()
}

fn process_interfaces(
    reader: &dyn SourceReader,
    unit: &mut ConfigurationUnit,
    source: &SourceDescriptor,
    visited: &mut FxHashSet<String>,
) -> Result<(), ContextError> {
    for interface in &source.interfaces {
        if !visited.insert(interface.clone()) {
            continue;
        }

        let interface = reader.read(interface)?;
        unit.factory_methods.extend(
            factory_methods_of(reader, &interface)
                .into_iter()
                .filter(|method| !method.is_abstract)
                .map(|method| UnitFactoryMethod {
                    declaring: interface.name.clone(),
                    method,
                }),
        );

        process_interfaces(reader, unit, &interface, visited)?;
    }

    Ok(())
}

fn wrap_parse_failure(name: &str, error: ContextError) -> ContextError {
    match error {
        ContextError::ImportProcessing { .. }
        | ContextError::ParseFailure { .. }
        | ContextError::ConfigurationProblems(_) => error,
        error => ContextError::ParseFailure {
            name: name.to_string(),
            source: Arc::new(error),
        },
    }
}

fn wrap_import_failure(unit: &str, error: ContextError) -> ContextError {
    match error {
        ContextError::ImportProcessing { .. } | ContextError::ParseFailure { .. } => error,
        error => ContextError::ImportProcessing {
            unit: unit.to_string(),
            source: Arc::new(error),
        },
    }
}

#[cfg(test)]
mod tests {
    use crate::condition::Condition;
    use crate::environment::{Environment, MockPropertySourceLoader, PropertySource};
    use crate::error::{ContextError, EnvironmentError};
    use crate::import::{ImportRegistrar, ImportSelector, SelectionContext};
    use crate::problem::{CollectingProblemReporter, ProblemKind};
    use crate::resolver::{Candidate, ConfigurationGraphResolver, ResolverContext};
    use crate::scanner::CatalogScanner;
    use crate::source::{FactoryMethod, PropertySourceDirective, SourceCatalog, SourceDescriptor};
    use mockall::predicate::*;
    use std::sync::{Arc, Mutex};
    use vernal_beans::error::ErrorPtr;
    use vernal_beans::registry::{DefinitionRegistry, OrderedDefinitionRegistry};

    struct Fixture {
        catalog: SourceCatalog,
        loader: MockPropertySourceLoader,
        environment: Environment,
        registry: OrderedDefinitionRegistry,
        reporter: CollectingProblemReporter,
        resolver: ConfigurationGraphResolver,
    }

    impl Fixture {
        fn new(sources: Vec<SourceDescriptor>) -> Self {
            let mut catalog = SourceCatalog::default();
            for source in sources {
                catalog.register(source).unwrap();
            }

            Self {
                catalog,
                loader: MockPropertySourceLoader::new(),
                environment: Environment::default(),
                registry: OrderedDefinitionRegistry::new(true),
                reporter: CollectingProblemReporter::default(),
                resolver: ConfigurationGraphResolver::default(),
            }
        }

        fn parse(&mut self, names: &[&str]) -> Result<(), ContextError> {
            let scanner = CatalogScanner::default();
            let mut context = ResolverContext {
                reader: &self.catalog,
                scanner: &scanner,
                loader: &self.loader,
                environment: &mut self.environment,
                registry: &mut self.registry,
                reporter: &mut self.reporter,
            };

            let candidates: Vec<_> = names
                .iter()
                .map(|name| Candidate {
                    source_name: name.to_string(),
                    bean_name: name.to_lowercase(),
                })
                .collect();

            self.resolver.parse(&mut context, &candidates)
        }

        fn unit_names(&self) -> Vec<&str> {
            self.resolver.units().iter().map(|unit| unit.name()).collect()
        }
    }

    struct RecordingSelector {
        deferred: bool,
        selected: Vec<String>,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl ImportSelector for RecordingSelector {
        fn select_imports(
            &self,
            _importing: &SourceDescriptor,
            context: &SelectionContext,
        ) -> Result<Vec<String>, ErrorPtr> {
            *self.seen.lock().unwrap() = context.resolved_units.to_vec();
            Ok(self.selected.clone())
        }

        fn is_deferred(&self) -> bool {
            self.deferred
        }
    }

    fn recording_selector(
        name: &str,
        deferred: bool,
        selected: &[&str],
        seen: &Arc<Mutex<Vec<String>>>,
    ) -> SourceDescriptor {
        let selected: Vec<String> = selected.iter().map(|name| name.to_string()).collect();
        let seen = seen.clone();
        SourceDescriptor::selector(name, move || {
            Box::new(RecordingSelector {
                deferred,
                selected: selected.clone(),
                seen: seen.clone(),
            })
        })
    }

    struct NoopRegistrar;

    impl ImportRegistrar for NoopRegistrar {
        fn register_definitions(
            &self,
            _importing: &SourceDescriptor,
            _registry: &mut dyn DefinitionRegistry,
            _environment: &Environment,
        ) -> Result<(), ErrorPtr> {
            Ok(())
        }
    }

    #[test]
    fn should_resolve_each_reachable_unit_once() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A").with_import("B").with_import("C"),
            SourceDescriptor::configuration("B").with_import("D"),
            SourceDescriptor::configuration("C").with_import("D"),
            SourceDescriptor::configuration("D"),
        ]);

        fixture.parse(&["A"]).unwrap();

        assert_eq!(fixture.unit_names(), vec!["D", "B", "C", "A"]);
        assert_eq!(
            fixture.resolver.units()[0].imported_by,
            vec!["B".to_string(), "C".to_string()]
        );
        assert!(!fixture.resolver.units()[3].is_imported());
        assert!(fixture.reporter.errors().is_empty());
    }

    #[test]
    fn should_report_self_import() {
        let mut fixture = Fixture::new(vec![SourceDescriptor::configuration("A").with_import("A")]);

        fixture.parse(&["A"]).unwrap();

        assert_eq!(fixture.unit_names(), vec!["A"]);
        assert!(!fixture.resolver.units()[0].is_imported());
        assert_eq!(fixture.reporter.errors().len(), 1);
        assert_eq!(
            fixture.reporter.errors()[0].kind,
            ProblemKind::CircularImport
        );
    }

    #[test]
    fn should_report_mutual_import() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A").with_import("B"),
            SourceDescriptor::configuration("B").with_import("A"),
        ]);

        fixture.parse(&["A"]).unwrap();

        assert_eq!(fixture.unit_names(), vec!["A", "B"]);
        assert_eq!(fixture.reporter.errors().len(), 1);
        assert_eq!(fixture.reporter.errors()[0].source_name, "A");
        assert!(matches!(
            fixture.reporter.into_result().unwrap_err(),
            ContextError::ConfigurationProblems(problems) if problems.len() == 1
        ));
    }

    #[test]
    fn should_report_independent_cycles_together() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A").with_import("B"),
            SourceDescriptor::configuration("B").with_import("A"),
            SourceDescriptor::configuration("C").with_import("D"),
            SourceDescriptor::configuration("D").with_import("C"),
            SourceDescriptor::configuration("E").with_import("F").with_import("G"),
            SourceDescriptor::configuration("F").with_import("G"),
            SourceDescriptor::configuration("G"),
        ]);

        fixture.parse(&["A", "C", "E"]).unwrap();

        let mut names = fixture.unit_names();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B", "C", "D", "E", "F", "G"]);

        let sources: Vec<_> = fixture
            .reporter
            .errors()
            .iter()
            .map(|problem| problem.source_name.as_str())
            .collect();
        assert_eq!(sources, vec!["A", "C"]);
        assert!(fixture
            .reporter
            .errors()
            .iter()
            .all(|problem| problem.kind == ProblemKind::CircularImport));
    }

    #[test]
    fn should_run_deferred_selectors_after_all_units() {
        let seen = Arc::new(Mutex::new(vec![]));
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("First").with_import("Selector"),
            SourceDescriptor::configuration("Second"),
            SourceDescriptor::configuration("Selected"),
            recording_selector("Selector", true, &["Selected"], &seen),
        ]);

        fixture.parse(&["First", "Second"]).unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec!["First".to_string(), "Second".to_string()]
        );
        assert_eq!(fixture.unit_names(), vec!["First", "Second", "Selected"]);
        assert_eq!(
            fixture.resolver.units()[2].imported_by,
            vec!["First".to_string()]
        );
    }

    #[test]
    fn should_run_regular_selectors_immediately() {
        let seen = Arc::new(Mutex::new(vec![]));
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("First").with_import("Selector"),
            SourceDescriptor::configuration("Second"),
            SourceDescriptor::configuration("Selected"),
            recording_selector("Selector", false, &["Selected"], &seen),
        ]);

        fixture.parse(&["First", "Second"]).unwrap();

        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(fixture.unit_names(), vec!["Selected", "First", "Second"]);
    }

    #[test]
    fn should_wrap_selector_failures_once() {
        struct FailingSelector;

        impl ImportSelector for FailingSelector {
            fn select_imports(
                &self,
                _importing: &SourceDescriptor,
                _context: &SelectionContext,
            ) -> Result<Vec<String>, ErrorPtr> {
                Err(Arc::new(EnvironmentError::MissingPropertySource(
                    "x".to_string(),
                )))
            }
        }

        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A").with_import("B"),
            SourceDescriptor::configuration("B").with_import("Failing"),
            SourceDescriptor::selector("Failing", || Box::new(FailingSelector)),
        ]);

        assert!(matches!(
            fixture.parse(&["A"]).unwrap_err(),
            ContextError::ImportProcessing { unit, .. } if unit == "B"
        ));
    }

    #[test]
    fn should_attach_registrars_and_collect_annotation_imports() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A").with_annotation("EnableThings"),
            SourceDescriptor::plain("EnableThings")
                .with_annotation("EnableThings")
                .with_import("Registrar"),
            SourceDescriptor::registrar("Registrar", || Box::new(NoopRegistrar)),
        ]);

        fixture.parse(&["A"]).unwrap();

        let unit = &fixture.resolver.units()[0];
        assert_eq!(unit.registrars.len(), 1);
        assert_eq!(unit.registrars[0].importing.name, "A");
    }

    #[test]
    fn should_skip_units_failing_parse_conditions() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A").with_import("B"),
            SourceDescriptor::configuration("B")
                .with_condition(Condition::on_property("b.enabled", None)),
        ]);

        fixture.parse(&["A"]).unwrap();

        assert_eq!(fixture.unit_names(), vec!["A"]);
    }

    #[test]
    fn should_collect_factory_methods_in_declaration_order() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A")
                .with_factory_method(FactoryMethod::object("second", |_| Ok(2_u8)))
                .with_factory_method(FactoryMethod::object("first", |_| Ok(1_u8)))
                .with_interface("Defaults")
                .with_superclass("Base"),
            SourceDescriptor::configuration("B").with_superclass("Base"),
            SourceDescriptor::interface("Defaults")
                .with_factory_method(FactoryMethod::object("default", |_| Ok(0_u8)))
                .with_factory_method(FactoryMethod::abstract_method("required")),
            SourceDescriptor::plain("Base")
                .with_factory_method(FactoryMethod::object("inherited", |_| Ok(3_u8))),
        ]);
        fixture
            .catalog
            .set_declaration_order("A", ["helper", "first", "second"]);

        fixture.parse(&["A", "B"]).unwrap();

        let methods: Vec<_> = fixture.resolver.units()[0]
            .factory_methods
            .iter()
            .map(|method| (method.declaring.as_str(), method.method.name.as_str()))
            .collect();
        assert_eq!(
            methods,
            vec![
                ("A", "first"),
                ("A", "second"),
                ("Defaults", "default"),
                ("Base", "inherited"),
            ]
        );
        assert!(fixture.resolver.units()[1].factory_methods.is_empty());
    }

    #[test]
    fn should_validate_factory_methods() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A")
                .with_factory_method(FactoryMethod::object("bean", |_| Ok(1_u8)))
                .with_factory_method(FactoryMethod::object("bean", |_| Ok(2_u8)))
                .with_factory_method(FactoryMethod::abstract_method("missing")),
            SourceDescriptor::component("B")
                .with_factory_method(FactoryMethod::object("bean", |_| Ok(1_u8)))
                .with_factory_method(FactoryMethod::object("bean", |_| Ok(2_u8))),
        ]);

        fixture.parse(&["A", "B"]).unwrap();

        let mut reporter = CollectingProblemReporter::default();
        fixture.resolver.validate(&mut reporter);

        let kinds: Vec<_> = reporter.errors().iter().map(|problem| problem.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ProblemKind::DuplicateFactoryMethod,
                ProblemKind::AbstractFactoryMethod
            ]
        );
    }

    #[test]
    fn should_resolve_nested_members_as_imported() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("A")
                .with_member("A::Late")
                .with_member("A::Early")
                .with_member("A::Plain"),
            SourceDescriptor::configuration("A::Late").with_order(2),
            SourceDescriptor::configuration("A::Early").with_order(1),
            SourceDescriptor::plain("A::Plain"),
        ]);

        fixture.parse(&["A"]).unwrap();

        assert_eq!(fixture.unit_names(), vec!["A::Early", "A::Late", "A"]);
        assert_eq!(
            fixture.resolver.units()[0].imported_by,
            vec!["A".to_string()]
        );
    }

    #[test]
    fn should_add_property_sources_in_declaration_order() {
        let mut fixture = Fixture::new(vec![SourceDescriptor::configuration("A")
            .with_property_source(PropertySourceDirective {
                name: None,
                locations: vec!["first.json".to_string(), "${missing}.json".to_string()],
                ignore_resource_not_found: true,
            })
            .with_property_source(PropertySourceDirective {
                name: Some("shared".to_string()),
                locations: vec!["second.json".to_string(), "third.json".to_string()],
                ignore_resource_not_found: false,
            })]);

        fixture
            .loader
            .expect_load()
            .with(always(), eq("first.json"))
            .times(1)
            .returning(|_, _| Ok(PropertySource::from_map("first.json", Default::default())));
        fixture
            .loader
            .expect_load()
            .with(eq(Some("shared".to_string())), always())
            .times(2)
            .returning(|_, _| Ok(PropertySource::from_map("shared", Default::default())));

        fixture.parse(&["A"]).unwrap();

        let names: Vec<_> = fixture
            .environment
            .property_sources()
            .iter()
            .map(|source| source.name())
            .collect();
        assert_eq!(names, vec!["shared", "first.json"]);

        match fixture.environment.get("shared").unwrap() {
            PropertySource::Composite { sources, .. } => {
                let nested: Vec<_> = sources.iter().map(|source| source.name()).collect();
                assert_eq!(nested, vec!["third.json", "shared"]);
            }
            other => panic!("Expected composite source, got {other:?}"),
        }
    }

    #[test]
    fn should_require_property_source_locations() {
        let mut fixture = Fixture::new(vec![SourceDescriptor::configuration("A")
            .with_property_source(PropertySourceDirective::default())]);

        assert!(matches!(
            fixture.parse(&["A"]).unwrap_err(),
            ContextError::ParseFailure { name, .. } if name == "A"
        ));
    }

    #[test]
    fn should_scan_and_resolve_components() {
        let mut fixture = Fixture::new(vec![
            SourceDescriptor::configuration("app::AppConfig").with_scan("app::nested"),
            SourceDescriptor::configuration("app::nested::NestedConfig").with_import("app::Imported"),
            SourceDescriptor::component("app::nested::Service"),
            SourceDescriptor::configuration("app::Imported"),
        ]);

        fixture.parse(&["app::AppConfig"]).unwrap();

        assert!(fixture.registry.contains_definition("nested_config"));
        assert!(fixture.registry.contains_definition("service"));
        assert_eq!(
            fixture.unit_names(),
            vec![
                "app::Imported",
                "app::nested::NestedConfig",
                "app::nested::Service",
                "app::AppConfig"
            ]
        );
        assert_eq!(
            fixture.resolver.units()[1].bean_name.as_deref(),
            Some("nested_config")
        );
    }
}
