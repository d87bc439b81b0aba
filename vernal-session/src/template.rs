//! Thread-safe, transaction-aware [SqlSession] managed by the framework.
//!
//! Every call obtains a session (reusing the one bound to the current transaction, if any),
//! executes the operation, commits when no transaction is active and releases the session. Errors
//! are translated into data access errors, when a translator is present.

use crate::config::SessionConfig;
use crate::error::{ExceptionTranslatorPtr, SessionError, SqlStateExceptionTranslator};
use crate::mapper::MapperProxy;
use crate::session::{
    BatchResult, ExecutorType, SqlSession, SqlSessionFactoryPtr, SqlSessionPtr,
};
use crate::utils::{close_session, get_session, is_session_transactional};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use vernal_beans::definition::{BeanDefinition, Role};
use vernal_beans::error::ErrorPtr;
use vernal_beans::instance_provider::TypedBeanInstanceProvider;

/// Default name of the template bean.
pub const SQL_SESSION_TEMPLATE_NAME: &str = "sql_session_template";

/// Default name of the session factory bean.
pub const SQL_SESSION_FACTORY_NAME: &str = "sql_session_factory";

#[derive(Clone)]
pub struct SqlSessionTemplate {
    factory: SqlSessionFactoryPtr,
    executor_type: ExecutorType,
    translator: Option<ExceptionTranslatorPtr>,
}

/// Releases the session when leaving the operation scope, regardless of the outcome.
struct SessionGuard<'a> {
    session: Option<SqlSessionPtr>,
    factory: &'a SqlSessionFactoryPtr,
}

impl SessionGuard<'_> {
    fn release(&mut self) {
        if let Some(session) = self.session.take() {
            if let Err(error) = close_session(&session, self.factory) {
                warn!(%error, "Error releasing session.");
            }
        }
    }
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl SqlSessionTemplate {
    /// Creates a template with the default executor type of the factory configuration and SQL
    /// state based error translation.
    pub fn new(factory: SqlSessionFactoryPtr) -> Self {
        let executor_type = factory.configuration().default_executor_type;
        Self::with_executor_type(factory, executor_type)
    }

    pub fn with_executor_type(factory: SqlSessionFactoryPtr, executor_type: ExecutorType) -> Self {
        Self::with_translator(
            factory,
            executor_type,
            Some(Arc::new(SqlStateExceptionTranslator) as ExceptionTranslatorPtr),
        )
    }

    /// Creates a template with a custom translator. Without one, errors are returned untranslated.
    pub fn with_translator(
        factory: SqlSessionFactoryPtr,
        executor_type: ExecutorType,
        translator: Option<ExceptionTranslatorPtr>,
    ) -> Self {
        Self {
            factory,
            executor_type,
            translator,
        }
    }

    #[inline]
    pub fn factory(&self) -> &SqlSessionFactoryPtr {
        &self.factory
    }

    #[inline]
    pub fn executor_type(&self) -> ExecutorType {
        self.executor_type
    }

    #[inline]
    pub fn translator(&self) -> Option<&ExceptionTranslatorPtr> {
        self.translator.as_ref()
    }

    /// Returns this template as a shared session.
    pub fn as_session(&self) -> SqlSessionPtr {
        Arc::new(self.clone())
    }

    /// Returns a mapper proxy backed by this template.
    pub fn mapper(&self, namespace: &str) -> Result<MapperProxy, SessionError> {
        let definition = self.factory.configuration().mappers.read().mapper(namespace)?;
        Ok(MapperProxy::new(definition, self.as_session()))
    }

    /// Runs an operation on a managed session.
    pub fn execute<T, F>(&self, operation: F) -> Result<T, SessionError>
    where
        F: FnOnce(&SqlSessionPtr) -> Result<T, SessionError>,
    {
        let session = get_session(&self.factory, self.executor_type, self.translator.as_ref())?;
        let mut guard = SessionGuard {
            session: Some(session.clone()),
            factory: &self.factory,
        };

        let result = operation(&session).and_then(|result| {
            if !is_session_transactional(&session, &self.factory) {
                // force commit even on non-dirty sessions
                session.commit(true)?;
            }

            Ok(result)
        });

        result.map_err(|error| {
            let error = error.unwrap_invocation();
            match &self.translator {
                Some(translator) if error.is_persistence() => {
                    guard.release();

                    let translated = translator.translate(&error);
                    debug!(
                        translated = translated.is_some(),
                        "Translating persistence error."
                    );
                    translated.unwrap_or(error)
                }
                _ => error,
            }
        })
    }

    /// Creates a definition of a template bean using the session factory with given name. Without
    /// an explicit executor type, the one from [SessionConfig] is used.
    pub fn definition<N: ToString, F: ToString>(
        bean_name: N,
        factory_bean_name: F,
        executor_type: Option<ExecutorType>,
    ) -> BeanDefinition {
        let factory_bean_name = factory_bean_name.to_string();
        BeanDefinition::object(bean_name, move |provider| {
            let factory = provider
                .instance_typed::<SqlSessionFactoryPtr>(&factory_bean_name)
                .map_err(|error| Arc::new(error) as ErrorPtr)?;
            let factory = factory.as_ref().clone();

            let executor_type = match executor_type {
                Some(executor_type) => executor_type,
                None => {
                    SessionConfig::init_from_environment()
                        .map_err(|error| Arc::new(error) as ErrorPtr)?
                        .executor_type
                }
            };

            Ok(SqlSessionTemplate::with_executor_type(factory, executor_type))
        })
        .with_role(Role::Infrastructure)
    }
}

impl SqlSession for SqlSessionTemplate {
    fn select_one(&self, statement: &str, parameter: &Value) -> Result<Option<Value>, SessionError> {
        self.execute(|session| session.select_one(statement, parameter))
    }

    fn select_list(&self, statement: &str, parameter: &Value) -> Result<Vec<Value>, SessionError> {
        self.execute(|session| session.select_list(statement, parameter))
    }

    fn insert(&self, statement: &str, parameter: &Value) -> Result<usize, SessionError> {
        self.execute(|session| session.insert(statement, parameter))
    }

    fn update(&self, statement: &str, parameter: &Value) -> Result<usize, SessionError> {
        self.execute(|session| session.update(statement, parameter))
    }

    fn delete(&self, statement: &str, parameter: &Value) -> Result<usize, SessionError> {
        self.execute(|session| session.delete(statement, parameter))
    }

    fn commit(&self, _force: bool) -> Result<(), SessionError> {
        Err(SessionError::UnsupportedOperation(
            "Manual commit is not allowed over a managed SqlSession".to_string(),
        ))
    }

    fn rollback(&self, _force: bool) -> Result<(), SessionError> {
        Err(SessionError::UnsupportedOperation(
            "Manual rollback is not allowed over a managed SqlSession".to_string(),
        ))
    }

    fn close(&self) -> Result<(), SessionError> {
        Err(SessionError::UnsupportedOperation(
            "Manual close is not allowed over a managed SqlSession".to_string(),
        ))
    }

    fn clear_cache(&self) -> Result<(), SessionError> {
        self.execute(|session| session.clear_cache())
    }

    fn flush_statements(&self) -> Result<Vec<BatchResult>, SessionError> {
        self.execute(|session| session.flush_statements())
    }
}
