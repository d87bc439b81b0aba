//! Mappers bind named methods to mapped statements. A [MapperProxy] dispatches method calls by
//! name to the session, while a [MapperFactory] produces proxies for a given mapper namespace
//! after making sure it's known to the session configuration.

use crate::error::SessionError;
use crate::session::{SqlSessionFactoryPtr, SqlSessionPtr};
use crate::template::SqlSessionTemplate;
use derive_more::Display;
use fxhash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
pub use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};
use vernal_aop::policy::TargetType;
use vernal_aop::proxy::{Interface, Target};
use vernal_beans::definition::BeanDefinition;
use vernal_beans::error::ErrorPtr;
use vernal_beans::instance_provider::TypedBeanInstanceProvider;

const STATEMENT_SEPARATOR: char = '.';

/// Definition attribute holding the namespace of the mapper produced by the bean.
pub const MAPPER_NAMESPACE_ATTRIBUTE: &str = "mapper.namespace";

/// Kind of statement executed by a mapper method.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Display)]
pub enum MethodKind {
    SelectOne,
    SelectList,
    Insert,
    Update,
    Delete,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MapperMethod {
    pub name: String,
    pub kind: MethodKind,
    /// Statement id. Defaults to `namespace.name`.
    pub statement: Option<String>,
}

impl MapperMethod {
    pub fn new<N: ToString>(name: N, kind: MethodKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            statement: None,
        }
    }

    pub fn with_statement<S: ToString>(mut self, statement: S) -> Self {
        self.statement = Some(statement.to_string());
        self
    }

    pub fn statement_id(&self, namespace: &str) -> String {
        self.statement
            .clone()
            .unwrap_or_else(|| format!("{namespace}{STATEMENT_SEPARATOR}{}", self.name))
    }
}

/// Namespace with its methods.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct MapperDefinition {
    /// Fully qualified name, with packages separated by `::`.
    pub namespace: String,
    pub methods: Vec<MapperMethod>,
}

impl MapperDefinition {
    pub fn new<N: ToString>(namespace: N) -> Self {
        Self {
            namespace: namespace.to_string(),
            methods: vec![],
        }
    }

    pub fn with_method(mut self, method: MapperMethod) -> Self {
        self.methods.push(method);
        self
    }

    #[inline]
    pub fn select_one<N: ToString>(self, name: N) -> Self {
        self.with_method(MapperMethod::new(name, MethodKind::SelectOne))
    }

    #[inline]
    pub fn select_list<N: ToString>(self, name: N) -> Self {
        self.with_method(MapperMethod::new(name, MethodKind::SelectList))
    }

    #[inline]
    pub fn insert<N: ToString>(self, name: N) -> Self {
        self.with_method(MapperMethod::new(name, MethodKind::Insert))
    }

    #[inline]
    pub fn update<N: ToString>(self, name: N) -> Self {
        self.with_method(MapperMethod::new(name, MethodKind::Update))
    }

    #[inline]
    pub fn delete<N: ToString>(self, name: N) -> Self {
        self.with_method(MapperMethod::new(name, MethodKind::Delete))
    }

    pub fn method(&self, name: &str) -> Option<&MapperMethod> {
        self.methods.iter().find(|method| method.name == name)
    }

    /// Package part of the namespace.
    pub fn package(&self) -> &str {
        self.namespace
            .rsplit_once("::")
            .map(|(package, _)| package)
            .unwrap_or("")
    }

    /// Namespace without the package.
    pub fn short_name(&self) -> &str {
        self.namespace
            .rsplit_once("::")
            .map(|(_, name)| name)
            .unwrap_or(&self.namespace)
    }
}

/// Mappers known to a session configuration.
#[derive(Default, Debug)]
pub struct MapperRegistry {
    mappers: FxHashMap<String, Arc<MapperDefinition>>,
}

impl MapperRegistry {
    #[inline]
    pub fn has_mapper(&self, namespace: &str) -> bool {
        self.mappers.contains_key(namespace)
    }

    pub fn add_mapper(&mut self, definition: MapperDefinition) -> Result<(), SessionError> {
        if self.has_mapper(&definition.namespace) {
            return Err(SessionError::DuplicateMapper(definition.namespace));
        }

        debug!(namespace = definition.namespace.as_str(), "Adding mapper.");
        self.mappers
            .insert(definition.namespace.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn mapper(&self, namespace: &str) -> Result<Arc<MapperDefinition>, SessionError> {
        self.mappers
            .get(namespace)
            .cloned()
            .ok_or_else(|| SessionError::UnknownMapper(namespace.to_string()))
    }

    pub fn namespaces(&self) -> Vec<String> {
        self.mappers.keys().cloned().collect()
    }
}

/// Dispatch table from mapper methods to session statements.
#[derive(Clone)]
pub struct MapperProxy {
    definition: Arc<MapperDefinition>,
    session: SqlSessionPtr,
}

impl MapperProxy {
    pub fn new(definition: Arc<MapperDefinition>, session: SqlSessionPtr) -> Self {
        Self {
            definition,
            session,
        }
    }

    #[inline]
    pub fn definition(&self) -> &MapperDefinition {
        &self.definition
    }

    fn method(&self, name: &str) -> Result<&MapperMethod, SessionError> {
        self.definition
            .method(name)
            .ok_or_else(|| SessionError::UnknownMapperMethod {
                namespace: self.definition.namespace.clone(),
                method: name.to_string(),
            })
    }

    /// Invokes a method by name, returning its raw result.
    pub fn invoke(&self, method: &str, parameter: &Value) -> Result<Value, SessionError> {
        let method = self.method(method)?;
        let statement = method.statement_id(&self.definition.namespace);

        match method.kind {
            MethodKind::SelectOne => self
                .session
                .select_one(&statement, parameter)
                .map(|result| result.unwrap_or(Value::Null)),
            MethodKind::SelectList => self
                .session
                .select_list(&statement, parameter)
                .map(Value::Array),
            MethodKind::Insert => self.session.insert(&statement, parameter).map(Value::from),
            MethodKind::Update => self.session.update(&statement, parameter).map(Value::from),
            MethodKind::Delete => self.session.delete(&statement, parameter).map(Value::from),
        }
    }

    pub fn select_one<T: DeserializeOwned>(
        &self,
        method: &str,
        parameter: &Value,
    ) -> Result<Option<T>, SessionError> {
        match self.invoke(method, parameter)? {
            Value::Null => Ok(None),
            value => serde_json::from_value(value).map(Some).map_err(Into::into),
        }
    }

    pub fn select_list<T: DeserializeOwned>(
        &self,
        method: &str,
        parameter: &Value,
    ) -> Result<Vec<T>, SessionError> {
        match self.invoke(method, parameter)? {
            Value::Array(values) => values
                .into_iter()
                .map(|value| serde_json::from_value(value).map_err(Into::into))
                .collect(),
            value => Err(SessionError::Conversion(format!(
                "Expected a list of results, but found: {value}"
            ))),
        }
    }

    /// Executes an insert, update or delete method, returning the number of affected rows.
    pub fn execute(&self, method: &str, parameter: &Value) -> Result<usize, SessionError> {
        self.invoke(method, parameter)?
            .as_u64()
            .map(|count| count as usize)
            .ok_or_else(|| {
                SessionError::Conversion(format!(
                    "Method '{method}' does not return an update count"
                ))
            })
    }
}

impl Target for MapperProxy {
    fn target_type(&self) -> TargetType {
        TargetType::concrete(&self.definition.namespace)
    }

    fn interfaces(&self) -> Vec<Interface> {
        vec![Interface::new(
            &self.definition.namespace,
            self.definition.methods.iter().map(|method| &method.name),
        )]
    }

    fn operations(&self) -> Vec<String> {
        self.definition
            .methods
            .iter()
            .map(|method| method.name.clone())
            .collect()
    }

    fn invoke(&self, operation: &str, arguments: &Value) -> Result<Value, ErrorPtr> {
        MapperProxy::invoke(self, operation, arguments).map_err(|error| Arc::new(error) as ErrorPtr)
    }
}

/// Produces [MapperProxies](MapperProxy) for a single mapper, backed by a session template.
#[derive(Clone)]
pub struct MapperFactory {
    definition: MapperDefinition,
    template: SqlSessionTemplate,
    add_to_config: bool,
}

impl MapperFactory {
    pub fn new(definition: MapperDefinition, template: SqlSessionTemplate) -> Self {
        Self {
            definition,
            template,
            add_to_config: true,
        }
    }

    /// Should the mapper be added to the session configuration if it's not there yet.
    pub fn with_add_to_config(mut self, add_to_config: bool) -> Self {
        self.add_to_config = add_to_config;
        self
    }

    /// Makes sure the mapper is known to the session configuration, if requested.
    pub fn check_config(&self) -> Result<(), SessionError> {
        if !self.add_to_config {
            return Ok(());
        }

        let mut mappers = self.template.factory().configuration().mappers.write();
        if mappers.has_mapper(&self.definition.namespace) {
            return Ok(());
        }

        mappers
            .add_mapper(self.definition.clone())
            .map_err(|error| {
                error!(
                    namespace = self.definition.namespace.as_str(),
                    %error,
                    "Error while adding the mapper to configuration."
                );
                error
            })
    }

    /// Creates a proxy for the configured mapper.
    pub fn object(&self) -> Result<MapperProxy, SessionError> {
        self.check_config()?;

        let definition = self
            .template
            .factory()
            .configuration()
            .mappers
            .read()
            .mapper(&self.definition.namespace)?;

        Ok(MapperProxy::new(definition, self.template.as_session()))
    }

    /// Creates a definition of a [MapperProxy] bean. The session bean is looked up by name when
    /// the bean is created.
    pub fn definition<N: ToString>(
        bean_name: N,
        mapper: MapperDefinition,
        session_source: SessionSource,
        add_to_config: bool,
    ) -> BeanDefinition {
        let namespace = mapper.namespace.clone();

        BeanDefinition::object(bean_name, move |provider| {
            let template = match &session_source {
                SessionSource::Template(name) => provider
                    .instance_typed::<SqlSessionTemplate>(name)
                    .map_err(|error| Arc::new(error) as ErrorPtr)?
                    .as_ref()
                    .clone(),
                SessionSource::Factory(name) => SqlSessionTemplate::new(
                    provider
                        .instance_typed::<SqlSessionFactoryPtr>(name)
                        .map_err(|error| Arc::new(error) as ErrorPtr)?
                        .as_ref()
                        .clone(),
                ),
            };

            MapperFactory::new(mapper.clone(), template)
                .with_add_to_config(add_to_config)
                .object()
                .map_err(|error| Arc::new(error) as ErrorPtr)
        })
        .with_attribute(MAPPER_NAMESPACE_ATTRIBUTE, namespace)
    }
}

/// Bean backing the sessions of a mapper.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum SessionSource {
    /// Name of a [SqlSessionTemplate] bean.
    Template(String),
    /// Name of a session factory bean; a new template is created for the mapper.
    Factory(String),
}

#[doc(hidden)]
pub mod internal {
    use crate::mapper::MapperDefinition;
    use inventory::collect;
    pub use inventory::submit;

    pub struct MapperRegisterer {
        pub register: fn() -> MapperDefinition,
    }

    collect!(MapperRegisterer);
}

/// Converts a method argument into a statement parameter.
pub fn to_parameter<T: Serialize + ?Sized>(value: &T) -> Result<Value, SessionError> {
    serde_json::to_value(value).map_err(Into::into)
}

/// Creates a parameter object from named method arguments.
pub fn named_parameters<I, N>(parameters: I) -> Value
where
    I: IntoIterator<Item = (N, Value)>,
    N: ToString,
{
    Value::Object(
        parameters
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

/// Returns all mappers registered statically.
pub fn static_mappers() -> Vec<MapperDefinition> {
    inventory::iter::<internal::MapperRegisterer>
        .into_iter()
        .map(|registerer| (registerer.register)())
        .collect()
}
