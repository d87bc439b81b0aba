//! Obtaining and releasing sessions with respect to the current transaction. Sessions opened while
//! synchronization is active are bound to the thread and reused until the transaction completes.

use crate::error::{ExceptionTranslatorPtr, SessionError};
use crate::session::{factory_key, same_session, ExecutorType, SqlSessionFactoryPtr, SqlSessionPtr};
use crate::transaction::{
    bind_resource, is_synchronization_active, register_synchronization, resource, SessionHolder,
    SessionSynchronization,
};
use std::sync::Arc;
use tracing::{debug, warn};

fn session_holder(factory: &SqlSessionFactoryPtr) -> Option<Arc<SessionHolder>> {
    resource::<SessionHolder>(factory_key(factory))
}

/// Returns a session bound to the current transaction, or opens a new one. A bound session must
/// use the same executor type as requested.
pub fn get_session(
    factory: &SqlSessionFactoryPtr,
    executor_type: ExecutorType,
    translator: Option<&ExceptionTranslatorPtr>,
) -> Result<SqlSessionPtr, SessionError> {
    if let Some(holder) = session_holder(factory) {
        if holder.is_synchronized_with_transaction() {
            if holder.executor_type() != executor_type {
                return Err(SessionError::ExecutorTypeChange {
                    current: holder.executor_type().to_string(),
                    requested: executor_type.to_string(),
                });
            }

            holder.requested();

            debug!("Fetched session from current transaction.");
            return Ok(holder.session().clone());
        }
    }

    debug!("Creating a new session.");
    let session = factory.open_session(executor_type)?;

    if let Err(error) = register_session_holder(factory, executor_type, translator, &session) {
        if let Err(close_error) = session.close() {
            warn!(error = %close_error, "Error closing session after failed registration.");
        }

        return Err(error);
    }

    Ok(session)
}

/// Binds the session to the current transaction, if synchronization is active.
pub fn register_session_holder(
    factory: &SqlSessionFactoryPtr,
    executor_type: ExecutorType,
    translator: Option<&ExceptionTranslatorPtr>,
    session: &SqlSessionPtr,
) -> Result<(), SessionError> {
    if !is_synchronization_active() {
        debug!("Session was not registered for synchronization because synchronization is not active.");
        return Ok(());
    }

    debug!("Registering transaction synchronization for session.");

    let holder = Arc::new(SessionHolder::new(
        session.clone(),
        executor_type,
        translator.cloned(),
    ));

    bind_resource(factory_key(factory), holder.clone())?;
    register_synchronization(Box::new(SessionSynchronization::new(holder.clone(), factory)))?;

    holder.set_synchronized_with_transaction(true);
    holder.requested();

    Ok(())
}

/// Releases a transactional session, or closes a non-transactional one.
pub fn close_session(
    session: &SqlSessionPtr,
    factory: &SqlSessionFactoryPtr,
) -> Result<(), SessionError> {
    match session_holder(factory) {
        Some(holder) if same_session(holder.session(), session) => {
            debug!("Releasing transactional session.");
            holder.released();
            Ok(())
        }
        _ => {
            debug!("Closing non transactional session.");
            session.close()
        }
    }
}

/// Checks if the session is bound to the current transaction.
pub fn is_session_transactional(session: &SqlSessionPtr, factory: &SqlSessionFactoryPtr) -> bool {
    session_holder(factory)
        .map(|holder| same_session(holder.session(), session))
        .unwrap_or(false)
}
