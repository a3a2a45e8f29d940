#![warn(missing_docs)]

//! Observable loading state for asynchronous work.
//!
//! A [Loadable] wraps a future, or an HTTP resource, and exposes how far it
//! has come as a [Snapshot]: the data, one of four mutually exclusive
//! [Phase]s, and an error message. The handle is returned immediately in
//! [Phase::Loading] and is settled in the background, exactly once, when the
//! source completes. UI code can render a loading, error or ready view
//! straight from it, or serialize it:
//!
//! ```rust
//! use loadable::{Loadable, LoadOptions, Phase};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> anyhow::Result<()> {
//! let greeting = Loadable::from_future_with(
//!     async { Err::<String, _>("offline") },
//!     LoadOptions::starting_with(String::from("..."))
//!         .with_error_formatter(|reason: &str| format!("Could not greet: {reason}")),
//! );
//!
//! assert!(greeting.is_loading());
//!
//! greeting.settled().await;
//!
//! assert_eq!(greeting.phase(), Phase::Error);
//! assert_eq!(greeting.data(), "...");
//! assert_eq!(greeting.error_message(), "Could not greet: offline");
//! assert_eq!(
//!     serde_json::to_string(&greeting)?,
//!     r#"{"data":"...","state":{"none":false,"loading":false,"ready":false,"error":true},"errorMessage":"Could not greet: offline"}"#
//! );
//! # Ok(())
//! # }
//! ```
//!
//! HTTP resources are loaded with [Loadable::from_url] or a configured
//! [ResourceLoader].

mod error;
pub use error::*;

mod phase;
pub use phase::*;

mod snapshot;
pub use snapshot::*;

mod format;
pub use format::*;

mod loadable;
pub use loadable::*;

mod resource;
pub use resource::*;
