//! Error types.

use thiserror::Error;

/// Boxed error produced by an effect body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by the reactive engine.
#[derive(Debug, Error)]
pub enum DeepSignalError {
    /// The value cannot be wrapped (primitives and shallow containers).
    #[error("this value can't be observed: {kind} is not an object, array or set")]
    NotObservable { kind: &'static str },

    /// `watch` was handed something that is not a reactive root.
    #[error("watch() expects a deep signal root or root id, got {kind}")]
    NotADeepSignal { kind: &'static str },

    /// A write or delete hit a property configured as read-only.
    #[error("cannot modify readonly property '{key}'")]
    ReadOnlyProperty { key: String },

    /// An array write beyond the end of the array.
    #[error("index {index} is out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// An effect body returned an error.
    #[error("effect failed: {0}")]
    Effect(#[source] BoxError),

    /// Several effects failed while draining one flush, in rerun order.
    #[error("{} effects failed: {}", .0.len(), joined(.0))]
    Effects(Vec<DeepSignalError>),
}

impl DeepSignalError {
    /// Wrap an effect failure.
    pub fn effect(err: impl Into<BoxError>) -> Self {
        Self::Effect(err.into())
    }

    /// Fold the failures of one flush into a single result. A lone failure
    /// is returned as is.
    pub(crate) fn from_failures(mut errors: Vec<DeepSignalError>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Effects(errors)),
        }
    }

    /// Every individual failure carried by this error.
    pub fn failures(&self) -> Vec<&DeepSignalError> {
        match self {
            Self::Effects(errors) => errors.iter().flat_map(|err| err.failures()).collect(),
            other => vec![other],
        }
    }
}

fn joined(errors: &[DeepSignalError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type used across the crate.
pub type Result<T, E = DeepSignalError> = std::result::Result<T, E>;
