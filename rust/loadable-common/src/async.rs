use std::future::Future;

/// Schedule a future with the ambient executor without waiting for it.
///
/// The future is queued rather than polled inline. On a single-threaded
/// executor nothing it does can be observed before this function returns.
/// On native targets it runs as a Tokio task; on `wasm32` it runs on the
/// browser event loop through [wasm_bindgen_futures::spawn_local]. No handle
/// is returned, so the scheduled work cannot be cancelled.
///
/// # Panics
///
/// On native targets this panics when called outside of a Tokio runtime, as
/// [tokio::spawn] does.
#[cfg(not(target_arch = "wasm32"))]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    // The JoinHandle is dropped on purpose; the task keeps running.
    drop(tokio::spawn(future));
}

/// Schedule a future with the ambient executor without waiting for it.
///
/// The future is queued on the browser event loop rather than polled inline.
#[cfg(target_arch = "wasm32")]
pub fn spawn_detached<F>(future: F)
where
    F: Future<Output = ()> + 'static,
{
    wasm_bindgen_futures::spawn_local(future);
}
