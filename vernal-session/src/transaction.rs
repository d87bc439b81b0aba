//! Thread-scoped transaction synchronization.
//!
//! Resources (like session holders) are bound to the current thread under a key, so that
//! consecutive operations within one transaction reuse them. Synchronization callbacks registered
//! during a transaction get notified when it completes. A transaction is delimited by a
//! [TransactionScope], which rolls back unless explicitly committed.

use crate::error::{ExceptionTranslatorPtr, SessionError};
use crate::session::{ExecutorType, SqlSessionFactoryPtr, SqlSessionPtr, factory_key};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use fxhash::FxHashMap;
use tracing::{debug, trace, warn};

pub type ResourcePtr = Arc<dyn Any + Send + Sync>;

pub type SynchronizationPtr = Box<dyn TransactionSynchronization>;

thread_local! {
    static RESOURCES: RefCell<FxHashMap<usize, ResourcePtr>> = RefCell::new(FxHashMap::default());
    static SYNCHRONIZATIONS: RefCell<Option<Vec<SynchronizationPtr>>> = RefCell::new(None);
    static ACTUAL_TRANSACTION_ACTIVE: Cell<bool> = Cell::new(false);
}

/// Outcome of a transaction, as seen by synchronizations.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum CompletionStatus {
    Committed,
    RolledBack,
}

/// Callbacks for transaction completion. All are called on the transaction thread.
pub trait TransactionSynchronization {
    /// Called before commit. An error causes a rollback.
    fn before_commit(&mut self) -> Result<(), SessionError> {
        Ok(())
    }

    /// Called before commit or rollback.
    fn before_completion(&mut self) {}

    fn after_commit(&mut self) {}

    fn after_completion(&mut self, _status: CompletionStatus) {}
}

/// Binds a resource to the current thread.
pub fn bind_resource(key: usize, resource: ResourcePtr) -> Result<(), SessionError> {
    RESOURCES.with(|resources| {
        let mut resources = resources.borrow_mut();
        if resources.contains_key(&key) {
            return Err(SessionError::ResourceAlreadyBound(key));
        }

        trace!(key, "Bound resource to thread.");
        resources.insert(key, resource);
        Ok(())
    })
}

pub fn unbind_resource(key: usize) -> Option<ResourcePtr> {
    RESOURCES.with(|resources| resources.borrow_mut().remove(&key))
}

pub fn has_resource(key: usize) -> bool {
    RESOURCES.with(|resources| resources.borrow().contains_key(&key))
}

/// Returns a bound resource of given type.
pub fn resource<T: Any + Send + Sync>(key: usize) -> Option<Arc<T>> {
    RESOURCES
        .with(|resources| resources.borrow().get(&key).cloned())
        .and_then(|resource| resource.downcast::<T>().ok())
}

#[inline]
pub fn is_synchronization_active() -> bool {
    SYNCHRONIZATIONS.with(|synchronizations| synchronizations.borrow().is_some())
}

pub fn init_synchronization() -> Result<(), SessionError> {
    SYNCHRONIZATIONS.with(|synchronizations| {
        let mut synchronizations = synchronizations.borrow_mut();
        if synchronizations.is_some() {
            return Err(SessionError::SynchronizationAlreadyActive);
        }

        trace!("Initializing transaction synchronization.");
        *synchronizations = Some(vec![]);
        Ok(())
    })
}

pub fn register_synchronization(synchronization: SynchronizationPtr) -> Result<(), SessionError> {
    SYNCHRONIZATIONS.with(|synchronizations| match synchronizations.borrow_mut().as_mut() {
        Some(synchronizations) => {
            synchronizations.push(synchronization);
            Ok(())
        }
        None => Err(SessionError::SynchronizationInactive),
    })
}

/// Deactivates synchronization, returning registered callbacks.
pub fn clear_synchronization() -> Vec<SynchronizationPtr> {
    trace!("Clearing transaction synchronization.");
    SYNCHRONIZATIONS.with(|synchronizations| synchronizations.borrow_mut().take().unwrap_or_default())
}

#[inline]
pub fn is_actual_transaction_active() -> bool {
    ACTUAL_TRANSACTION_ACTIVE.with(Cell::get)
}

fn set_actual_transaction_active(active: bool) {
    ACTUAL_TRANSACTION_ACTIVE.with(|flag| flag.set(active));
}

/// Session bound to a transaction. Reference counting tracks how many operations currently use
/// the session.
pub struct SessionHolder {
    session: SqlSessionPtr,
    executor_type: ExecutorType,
    translator: Option<ExceptionTranslatorPtr>,
    reference_count: AtomicUsize,
    synchronized_with_transaction: AtomicBool,
}

impl SessionHolder {
    pub fn new(
        session: SqlSessionPtr,
        executor_type: ExecutorType,
        translator: Option<ExceptionTranslatorPtr>,
    ) -> Self {
        Self {
            session,
            executor_type,
            translator,
            reference_count: AtomicUsize::new(0),
            synchronized_with_transaction: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn session(&self) -> &SqlSessionPtr {
        &self.session
    }

    #[inline]
    pub fn executor_type(&self) -> ExecutorType {
        self.executor_type
    }

    #[inline]
    pub fn translator(&self) -> Option<&ExceptionTranslatorPtr> {
        self.translator.as_ref()
    }

    pub fn requested(&self) {
        self.reference_count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn released(&self) {
        // saturating, since a reset holder might still get released
        let _ = self
            .reference_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                count.checked_sub(1)
            });
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.reference_count.load(Ordering::Acquire) > 0
    }

    #[inline]
    pub fn is_synchronized_with_transaction(&self) -> bool {
        self.synchronized_with_transaction.load(Ordering::Acquire)
    }

    pub fn set_synchronized_with_transaction(&self, synchronized: bool) {
        self.synchronized_with_transaction
            .store(synchronized, Ordering::Release);
    }

    pub fn reset(&self) {
        self.synchronized_with_transaction
            .store(false, Ordering::Release);
        self.reference_count.store(0, Ordering::Release);
    }
}

/// Commits the bound session with the transaction and closes it afterwards.
pub struct SessionSynchronization {
    holder: Arc<SessionHolder>,
    key: usize,
    holder_active: bool,
}

impl SessionSynchronization {
    pub fn new(holder: Arc<SessionHolder>, factory: &SqlSessionFactoryPtr) -> Self {
        Self {
            holder,
            key: factory_key(factory),
            holder_active: true,
        }
    }

    fn translate(&self, error: SessionError) -> SessionError {
        self.holder
            .translator()
            .and_then(|translator| translator.translate(&error))
            .unwrap_or(error)
    }

    fn close_session(&self) {
        if let Err(error) = self.holder.session().close() {
            warn!(%error, "Error closing transactional session.");
        }
    }
}

impl TransactionSynchronization for SessionSynchronization {
    fn before_commit(&mut self) -> Result<(), SessionError> {
        if is_actual_transaction_active() {
            debug!("Transaction synchronization committing session.");
            self.holder
                .session()
                .commit(false)
                .map_err(|error| self.translate(error))?;
        }

        Ok(())
    }

    fn before_completion(&mut self) {
        // an unused session can be released from the thread right away
        if !self.holder.is_open() {
            debug!("Transaction synchronization deregistering session.");
            unbind_resource(self.key);
            self.holder_active = false;
        }
    }

    fn after_completion(&mut self, status: CompletionStatus) {
        if status == CompletionStatus::RolledBack {
            debug!("Transaction synchronization rolling back session.");
            if let Err(error) = self.holder.session().rollback(false) {
                warn!(%error, "Error rolling back transactional session.");
            }
        }

        if self.holder_active {
            debug!("Transaction synchronization deregistering session.");
            unbind_resource(self.key);
            self.holder_active = false;
        }

        debug!("Transaction synchronization closing session.");
        self.close_session();

        self.holder.reset();
    }
}

/// Transaction demarcation for the current thread. Dropping an uncompleted scope rolls back.
pub struct TransactionScope {
    completed: bool,
    // bound to the thread which started it
    _not_send: PhantomData<*const ()>,
}

impl TransactionScope {
    pub fn begin() -> Result<Self, SessionError> {
        init_synchronization()?;
        set_actual_transaction_active(true);

        debug!("Transaction started.");

        Ok(Self {
            completed: false,
            _not_send: PhantomData,
        })
    }

    /// Commits the transaction. If any synchronization fails before committing, the transaction
    /// is rolled back and the error returned.
    pub fn commit(mut self) -> Result<(), SessionError> {
        self.completed = true;

        let mut synchronizations = clear_synchronization();

        let mut failure = None;
        for synchronization in synchronizations.iter_mut() {
            if let Err(error) = synchronization.before_commit() {
                failure = Some(error);
                break;
            }
        }

        for synchronization in synchronizations.iter_mut() {
            synchronization.before_completion();
        }

        let status = if failure.is_some() {
            CompletionStatus::RolledBack
        } else {
            for synchronization in synchronizations.iter_mut() {
                synchronization.after_commit();
            }

            CompletionStatus::Committed
        };

        set_actual_transaction_active(false);

        for synchronization in synchronizations.iter_mut() {
            synchronization.after_completion(status);
        }

        debug!(?status, "Transaction completed.");

        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    pub fn rollback(mut self) {
        self.completed = true;
        roll_back();
    }
}

impl Drop for TransactionScope {
    fn drop(&mut self) {
        if !self.completed {
            debug!("Rolling back uncompleted transaction.");
            roll_back();
        }
    }
}

fn roll_back() {
    let mut synchronizations = clear_synchronization();

    for synchronization in synchronizations.iter_mut() {
        synchronization.before_completion();
    }

    set_actual_transaction_active(false);

    for synchronization in synchronizations.iter_mut() {
        synchronization.after_completion(CompletionStatus::RolledBack);
    }

    debug!("Transaction rolled back.");
}
