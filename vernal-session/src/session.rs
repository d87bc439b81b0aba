//! Session contracts. A [SqlSession] executes named statements with JSON parameters, while a
//! [SqlSessionFactory] opens new sessions and holds the shared [SessionConfiguration].

use crate::error::SessionError;
use crate::mapper::MapperRegistry;
use derive_more::Display;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub type SqlSessionPtr = Arc<dyn SqlSession + Send + Sync>;

pub type SqlSessionFactoryPtr = Arc<dyn SqlSessionFactory + Send + Sync>;

/// Statement execution strategy of a session.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug, Default, Display, Deserialize)]
pub enum ExecutorType {
    #[default]
    Simple,
    Reuse,
    Batch,
}

/// Result of flushing batched statements.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct BatchResult {
    pub statement: String,
    pub update_counts: Vec<usize>,
}

/// Single unit of work against a data store.
#[cfg_attr(test, automock)]
pub trait SqlSession {
    /// Returns at most one result. More than one is an error.
    fn select_one(&self, statement: &str, parameter: &Value) -> Result<Option<Value>, SessionError>;

    fn select_list(&self, statement: &str, parameter: &Value) -> Result<Vec<Value>, SessionError>;

    /// Returns the number of affected rows.
    fn insert(&self, statement: &str, parameter: &Value) -> Result<usize, SessionError>;

    fn update(&self, statement: &str, parameter: &Value) -> Result<usize, SessionError>;

    fn delete(&self, statement: &str, parameter: &Value) -> Result<usize, SessionError>;

    /// Commits pending changes. Without `force`, a session might skip committing if nothing
    /// changed. Committing also clears the session cache.
    fn commit(&self, force: bool) -> Result<(), SessionError>;

    fn rollback(&self, force: bool) -> Result<(), SessionError>;

    fn close(&self) -> Result<(), SessionError>;

    fn clear_cache(&self) -> Result<(), SessionError>;

    fn flush_statements(&self) -> Result<Vec<BatchResult>, SessionError>;
}

/// Configuration shared by all sessions from one factory.
#[derive(Debug, Default)]
pub struct SessionConfiguration {
    pub default_executor_type: ExecutorType,
    pub mappers: RwLock<MapperRegistry>,
}

impl SessionConfiguration {
    pub fn new(default_executor_type: ExecutorType) -> Self {
        Self {
            default_executor_type,
            mappers: Default::default(),
        }
    }
}

/// Opens sessions.
#[cfg_attr(test, automock)]
pub trait SqlSessionFactory {
    fn open_session(&self, executor_type: ExecutorType) -> Result<SqlSessionPtr, SessionError>;

    fn configuration(&self) -> &SessionConfiguration;
}

/// Key identifying a factory in thread-scoped resources.
pub fn factory_key(factory: &SqlSessionFactoryPtr) -> usize {
    Arc::as_ptr(factory) as *const () as usize
}

/// Checks if both pointers refer to the same session, ignoring vtables.
pub fn same_session(first: &SqlSessionPtr, second: &SqlSessionPtr) -> bool {
    Arc::as_ptr(first) as *const () == Arc::as_ptr(second) as *const ()
}
