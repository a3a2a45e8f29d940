#![warn(missing_docs)]

//! Light weight helpers shared by the loadable crates. They paper over the
//! differences between native targets, where work may be moved across
//! threads, and `wasm32-unknown-unknown`, where everything runs on a single
//! event loop.

mod sync;
pub use sync::*;

mod r#async;
pub use r#async::*;
