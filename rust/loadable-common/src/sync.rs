//! Bounds and shared state for values that a handle and its settlement task
//! both hold.
//!
//! A loadable handle stays with the caller while the task that settles it
//! is handed to the executor. Natively that executor is Tokio's, which may
//! move the task to another worker; in the browser it is the single event
//! loop, where payloads such as `JsValue` can never cross threads.
//!
//! [ConditionalSend] and [ConditionalSync] let one signature serve both: they
//! require `Send` (and `Sync`) natively and nothing on `wasm32`.
//! [SharedCell] is the cell the snapshot lives in.

/// `Send` on native targets, no bound on `wasm32`
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSend: Send {}

#[cfg(not(target_arch = "wasm32"))]
impl<S> ConditionalSend for S where S: Send {}

/// `Send + Sync` on native targets, no bound on `wasm32`
#[cfg(not(target_arch = "wasm32"))]
pub trait ConditionalSync: Send + Sync {}

#[cfg(not(target_arch = "wasm32"))]
impl<S> ConditionalSync for S where S: Send + Sync {}

/// `Send` on native targets, no bound on `wasm32`
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSend {}

#[cfg(target_arch = "wasm32")]
impl<S> ConditionalSend for S {}

/// `Send + Sync` on native targets, no bound on `wasm32`
#[cfg(target_arch = "wasm32")]
pub trait ConditionalSync {}

#[cfg(target_arch = "wasm32")]
impl<S> ConditionalSync for S {}

/// A value read by many handles and replaced by one writer.
///
/// Natively this is a `RwLock`. A writer that panics does not poison it:
/// writes through the cell replace whole fields, so the last finished write
/// is always consistent. On `wasm32` it is a `RefCell`, and overlapping a
/// write with any outstanding guard panics.
///
/// [SharedCell::try_write] never waits, which lets a reader that may already
/// hold a guard on the same thread skip an update instead of deadlocking.
///
/// ```
/// use loadable_common::SharedCell;
///
/// let phase = SharedCell::new("loading");
///
/// {
///     let seen = phase.read();
///     assert!(phase.try_write().is_none());
///     assert_eq!(*seen, "loading");
/// }
///
/// *phase.write() = "ready";
/// assert_eq!(*phase.read(), "ready");
/// ```
#[cfg(not(target_arch = "wasm32"))]
#[derive(Debug, Default)]
pub struct SharedCell<T>(std::sync::RwLock<T>);

#[cfg(not(target_arch = "wasm32"))]
impl<T> SharedCell<T> {
    /// Wrap `value`
    pub fn new(value: T) -> Self {
        Self(std::sync::RwLock::new(value))
    }

    /// Shared access, waiting for a writer to finish
    pub fn read(&self) -> std::sync::RwLockReadGuard<'_, T> {
        self.0
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Exclusive access, waiting for every guard to be released
    pub fn write(&self) -> std::sync::RwLockWriteGuard<'_, T> {
        self.0
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Exclusive access if no guard is outstanding right now
    pub fn try_write(&self) -> Option<std::sync::RwLockWriteGuard<'_, T>> {
        match self.0.try_write() {
            Ok(guard) => Some(guard),
            Err(std::sync::TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner()),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

/// A value read by many handles and replaced by one writer.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Default)]
pub struct SharedCell<T>(std::cell::RefCell<T>);

#[cfg(target_arch = "wasm32")]
impl<T> SharedCell<T> {
    /// Wrap `value`
    pub fn new(value: T) -> Self {
        Self(std::cell::RefCell::new(value))
    }

    /// Shared access
    ///
    /// # Panics
    /// Panics while a write guard is alive
    pub fn read(&self) -> std::cell::Ref<'_, T> {
        self.0.borrow()
    }

    /// Exclusive access
    ///
    /// # Panics
    /// Panics while any guard is alive
    pub fn write(&self) -> std::cell::RefMut<'_, T> {
        self.0.borrow_mut()
    }

    /// Exclusive access if no guard is alive
    pub fn try_write(&self) -> Option<std::cell::RefMut<'_, T>> {
        self.0.try_borrow_mut().ok()
    }
}
