//! How a failed source is turned into an error message, and what a handle
//! holds before its source succeeds.

use loadable_common::ConditionalSend;
use std::fmt::Display;

/// The text every default error message starts with
pub const DEFAULT_ERROR_PREFIX: &str = "Failed to load data. ";

/// Format `reason` the way handles do when no [ErrorFormatter] is given:
/// `"Failed to load data. "` followed by the reason's [Display] text.
pub fn default_error_message(reason: impl Display) -> String {
    format!("{DEFAULT_ERROR_PREFIX}{reason}")
}

#[cfg(not(target_arch = "wasm32"))]
type FormatFn<E> = Box<dyn FnOnce(E) -> String + Send>;

#[cfg(target_arch = "wasm32")]
type FormatFn<E> = Box<dyn FnOnce(E) -> String>;

/// Turns the failure reason of a source into the message stored on its
/// handle. It is called at most once, by the task that settles the handle.
pub struct ErrorFormatter<E>(FormatFn<E>);

impl<E: 'static> ErrorFormatter<E> {
    /// Wrap a formatting function
    pub fn new<F>(format: F) -> Self
    where
        F: FnOnce(E) -> String + ConditionalSend + 'static,
    {
        Self(Box::new(format))
    }

    /// Produce the message for `reason`
    pub fn format(self, reason: E) -> String {
        (self.0)(reason)
    }
}

impl<E> Default for ErrorFormatter<E>
where
    E: Display + 'static,
{
    fn default() -> Self {
        Self::new(|reason: E| default_error_message(reason))
    }
}

impl<E> std::fmt::Debug for ErrorFormatter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ErrorFormatter").finish_non_exhaustive()
    }
}

/// The optional arguments of the source-backed constructors: the value a
/// handle holds until its source succeeds, and the [ErrorFormatter] used if
/// it fails.
///
/// ```rust
/// use loadable::LoadOptions;
///
/// let options = LoadOptions::<String, String>::default()
///     .with_initial(String::from("My initial data"))
///     .with_error_formatter(|error| format!("Custom error: {error}"));
/// ```
#[derive(Debug)]
pub struct LoadOptions<T, E> {
    initial: T,
    format_error: ErrorFormatter<E>,
}

impl<T, E: 'static> LoadOptions<T, E> {
    /// Options with an explicit initial value and formatter
    pub fn new(initial: T, format_error: ErrorFormatter<E>) -> Self {
        Self {
            initial,
            format_error,
        }
    }

    /// Options with an explicit initial value and the default formatter
    pub fn starting_with(initial: T) -> Self
    where
        E: Display,
    {
        Self::new(initial, ErrorFormatter::default())
    }

    /// Replace the initial value
    pub fn with_initial(mut self, initial: T) -> Self {
        self.initial = initial;
        self
    }

    /// Replace the formatter
    pub fn with_error_formatter<F>(mut self, format: F) -> Self
    where
        F: FnOnce(E) -> String + ConditionalSend + 'static,
    {
        self.format_error = ErrorFormatter::new(format);
        self
    }

    pub(crate) fn into_parts(self) -> (T, ErrorFormatter<E>) {
        (self.initial, self.format_error)
    }
}

impl<T, E> Default for LoadOptions<T, E>
where
    T: Default,
    E: Display + 'static,
{
    fn default() -> Self {
        Self::starting_with(T::default())
    }
}
