use futures::FutureExt;
use loadable_common::{ConditionalSend, ConditionalSync, SharedCell, spawn_detached};
use serde::{Serialize, Serializer};
use std::{
    any::Any,
    fmt::Display,
    future::Future,
    ops::{Deref, DerefMut},
    panic::AssertUnwindSafe,
    sync::Arc,
};
use tokio::sync::watch;

use crate::{LoadOptions, Phase, Snapshot, States, default_error_message};

struct Shared<T> {
    snapshot: SharedCell<Snapshot<T>>,
    gate: SharedCell<Gate<T>>,
    /// Publishes the phase after every change to `snapshot`. Absent for
    /// handles that were created without a source.
    phase: Option<watch::Sender<Phase>>,
}

/// Holds back an outcome that arrives before anyone has looked at the
/// handle, so the first look always finds it loading.
struct Gate<T> {
    observed: bool,
    parked: Option<Outcome<T>>,
}

enum Outcome<T> {
    Ready(T),
    Error(String),
}

impl<T> Outcome<T> {
    /// The phase the snapshot moved to, or `None` if it was not loading
    fn apply(self, snapshot: &mut Snapshot<T>) -> Option<Phase> {
        match self {
            Outcome::Ready(data) => snapshot.resolve(data).then_some(Phase::Ready),
            Outcome::Error(message) => snapshot.reject(message).then_some(Phase::Error),
        }
    }
}

impl<T> Shared<T> {
    fn new(initial: T, phase: Phase, sender: Option<watch::Sender<Phase>>) -> Self {
        Self {
            snapshot: SharedCell::new(Snapshot::new(initial, phase)),
            gate: SharedCell::new(Gate {
                observed: false,
                parked: None,
            }),
            phase: sender,
        }
    }

    /// Record a look at the handle. True when an earlier look happened and
    /// an outcome is waiting to be released.
    fn observe(&self) -> bool {
        let mut gate = self.gate.write();
        let seen_before = std::mem::replace(&mut gate.observed, true);
        seen_before && gate.parked.is_some()
    }

    fn release(&self, mut snapshot: impl DerefMut<Target = Snapshot<T>>) {
        let Some(outcome) = self.gate.write().parked.take() else {
            return;
        };

        let phase = outcome.apply(&mut snapshot);
        drop(snapshot);
        self.publish(phase);
    }

    fn publish(&self, phase: Option<Phase>) {
        let Some(phase) = phase else {
            tracing::debug!("Ignoring settlement of a loadable that is not loading");
            return;
        };

        tracing::trace!(%phase, "Settled loadable");

        if let Some(sender) = &self.phase {
            sender.send_replace(phase);
        }
    }
}

/// A handle to the loading state of an asynchronous source.
///
/// Every clone of a [Loadable] observes the same [Snapshot]. A handle that
/// was created from a source starts out [Phase::Loading] and is settled
/// exactly once, in the background, when the source completes. The first
/// look at a handle always finds it loading, even when the source finished
/// on another worker before the constructor returned:
///
/// ```rust
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// use loadable::{Loadable, Phase};
///
/// let user = Loadable::<Option<String>>::from_future(async {
///     Ok::<_, String>(Some(String::from("Ada")))
/// });
///
/// assert_eq!(user.phase(), Phase::Loading);
/// assert_eq!(user.data(), None);
///
/// assert_eq!(user.settled().await, Phase::Ready);
/// assert_eq!(user.data(), Some(String::from("Ada")));
/// # }
/// ```
pub struct Loadable<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for Loadable<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T> Loadable<T> {
    /// A handle with no source. It holds `initial` and stays at
    /// [Phase::None].
    pub fn empty(initial: T) -> Self {
        Self {
            shared: Arc::new(Shared::new(initial, Phase::None, None)),
        }
    }

    fn loading(initial: T) -> (Self, Settler<T>) {
        let (sender, _) = watch::channel(Phase::Loading);
        let shared = Arc::new(Shared::new(initial, Phase::Loading, Some(sender)));

        (
            Self {
                shared: shared.clone(),
            },
            Settler { shared },
        )
    }

    /// A loading handle for `source`, together with the future that settles
    /// it. Nothing happens to the handle until that future is driven to
    /// completion; use this to settle on an executor of your choosing.
    /// [Loadable::from_future_with] is this plus [spawn_detached].
    ///
    /// A source that panics settles the handle as [Phase::Error] with
    /// [default_error_message] of the panic message.
    pub fn deferred<F, E>(source: F, options: LoadOptions<T, E>) -> (Self, impl Future<Output = ()>)
    where
        F: Future<Output = Result<T, E>>,
        E: 'static,
    {
        let (initial, format_error) = options.into_parts();
        let (loadable, settler) = Self::loading(initial);

        let settle = async move {
            let outcome = match AssertUnwindSafe(source).catch_unwind().await {
                Ok(Ok(data)) => Outcome::Ready(data),
                Ok(Err(reason)) => Outcome::Error(format_error.format(reason)),
                Err(panic) => Outcome::Error(default_error_message(panic_reason(panic.as_ref()))),
            };
            settler.settle(outcome);
        };

        (loadable, settle)
    }

    /// The current phase
    pub fn phase(&self) -> Phase {
        self.read().phase()
    }

    /// The current phase as flags
    pub fn states(&self) -> States {
        self.phase().into()
    }

    /// True while there is no source
    pub fn is_none(&self) -> bool {
        self.phase() == Phase::None
    }

    /// True while the source is pending
    pub fn is_loading(&self) -> bool {
        self.phase() == Phase::Loading
    }

    /// True once the source produced a value
    pub fn is_ready(&self) -> bool {
        self.phase() == Phase::Ready
    }

    /// True once the source failed
    pub fn is_error(&self) -> bool {
        self.phase() == Phase::Error
    }

    /// The formatted failure reason; empty unless [Loadable::is_error]
    pub fn error_message(&self) -> String {
        self.read().error_message().to_owned()
    }

    /// Borrow the current snapshot.
    ///
    /// The guard blocks settlement while it is alive (and on `wasm32`
    /// settling while it is alive panics), so do not hold it across an
    /// `.await`, nor while calling [Loadable::source].
    pub fn read(&self) -> impl Deref<Target = Snapshot<T>> + '_ {
        // The guard is taken before the look is recorded, so a settler that
        // sees the record has to wait for this guard to go.
        let snapshot = self.shared.snapshot.read();
        if !self.shared.observe() {
            return snapshot;
        }
        drop(snapshot);

        // Another guard on this thread may be alive; the outcome then waits
        // for the next look.
        if let Some(snapshot) = self.shared.snapshot.try_write() {
            self.shared.release(snapshot);
        }

        self.shared.snapshot.read()
    }

    fn observe_and_release(&self) {
        self.shared.observe();

        if self.shared.gate.read().parked.is_some() {
            self.shared.release(self.shared.snapshot.write());
        }
    }

    /// Subscribe to phase changes. Returns `None` for a handle created by
    /// [Loadable::empty], which has no source and never changes.
    ///
    /// The receiver starts out having seen [Phase::Loading], so subscribing
    /// counts as a look at the handle.
    pub fn source(&self) -> Option<watch::Receiver<Phase>> {
        let receiver = self.shared.phase.as_ref().map(watch::Sender::subscribe);
        self.observe_and_release();
        receiver
    }

    /// Wait until the source has settled and return the terminal phase.
    ///
    /// Resolves immediately for a handle without a source (with
    /// [Phase::None]) and for one that has already settled. If the
    /// settlement future is dropped before the source completes, this never
    /// resolves.
    pub async fn settled(&self) -> Phase {
        let Some(mut receiver) = self.source() else {
            return self.phase();
        };

        match receiver.wait_for(Phase::is_settled).await {
            Ok(phase) => *phase,
            // The sender lives in `shared`, which `self` keeps alive
            Err(_) => self.phase(),
        }
    }
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("The source panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("The source panicked: {message}")
    } else {
        String::from("The source panicked")
    }
}

impl<T: Clone> Loadable<T> {
    /// A copy of the current payload
    pub fn data(&self) -> T {
        self.read().data().clone()
    }

    /// A copy of the current snapshot
    pub fn snapshot(&self) -> Snapshot<T> {
        self.read().clone()
    }
}

impl<T> Loadable<T>
where
    T: ConditionalSync + 'static,
{
    /// Project `source` into a handle that holds `T::default()` until it
    /// settles, and reports failures with
    /// [default_error_message](crate::default_error_message).
    ///
    /// # Panics
    ///
    /// On native targets this must be called from within a Tokio runtime.
    pub fn from_future<F, E>(source: F) -> Self
    where
        T: Default,
        F: Future<Output = Result<T, E>> + ConditionalSend + 'static,
        E: Display + 'static,
    {
        Self::from_future_with(source, LoadOptions::default())
    }

    /// Project `source` into a handle using the given initial value and
    /// error formatter. The handle is returned in [Phase::Loading]; the
    /// source is driven by a background task which settles the handle once.
    ///
    /// # Panics
    ///
    /// On native targets this must be called from within a Tokio runtime.
    pub fn from_future_with<F, E>(source: F, options: LoadOptions<T, E>) -> Self
    where
        F: Future<Output = Result<T, E>> + ConditionalSend + 'static,
        E: 'static,
    {
        let (loadable, settle) = Self::deferred(source, options);
        spawn_detached(settle);
        loadable
    }
}

impl<T: Serialize> Serialize for Loadable<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.read().serialize(serializer)
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Loadable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loadable")
            .field("snapshot", &*self.read())
            .field("has_source", &self.shared.phase.is_some())
            .finish()
    }
}

/// The write side of a loading handle. Settling consumes it, so a handle is
/// settled at most once.
struct Settler<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Settler<T> {
    fn settle(self, outcome: Outcome<T>) {
        {
            let mut gate = self.shared.gate.write();
            if !gate.observed {
                tracing::trace!("Holding back an outcome until the loadable is observed");
                gate.parked = Some(outcome);
                return;
            }
        }

        let phase = outcome.apply(&mut self.shared.snapshot.write());
        self.shared.publish(phase);
    }
}
