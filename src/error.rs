//! Error taxonomy for the render graph backend.
//!
//! Resource-level errors (drawable acquisition, per-resource allocation) propagate to the pass
//! that depends on them: the pass is skipped and the error is attached to the frame's result.
//! Structural errors (pipeline, shader reload) propagate up to the [`queue::Context`](crate::queue::Context)
//! and abort the frame.

use crate::handle::Resource;
use thiserror::Error;

/// Errors produced while scheduling or executing a frame.
#[derive(Debug, Error)]
pub enum Error {
    /// A drawable could not be retrieved from the swapchain, or came back smaller than requested.
    #[error("invalid drawable: {0}")]
    InvalidDrawable(#[from] DrawableError),

    /// The device refused a native allocation after growth and retry.
    #[error("resource allocation failed for {resource:?}: {reason}")]
    ResourceAllocationFailure {
        resource: Resource,
        reason: String,
    },

    /// Shader compilation or pipeline linking failed.
    #[error("pipeline creation failed: {0}")]
    PipelineCreationFailure(String),

    /// The shader library's bytes were unreadable or rejected by the driver.
    #[error("shader library reload failed: {0}")]
    ShaderReloadFailure(String),

    /// An invariant the generator relies on was violated (e.g. a second write to a resource
    /// marked `immutableOnceInitialised`). Fatal in debug builds; logged and the offending
    /// access is skipped in release builds.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The GPU reported an error through a command buffer's completion handler.
    #[error("command buffer completion error: {0}")]
    CompletionError(String),
}

/// Reasons a swapchain drawable could not be used this frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DrawableError {
    #[error("drawable size ({actual_width}x{actual_height}) is smaller than requested ({requested_width}x{requested_height})")]
    InvalidSizeDrawable {
        requested_width: u32,
        requested_height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("unable to retrieve a drawable from the swapchain")]
    UnableToRetrieveDrawable,
}

/// Convenience alias for fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Raises an [`Error::InvariantViolation`]: panics in debug builds, logs and returns the error
/// in release builds.
pub fn invariant_violation<T>(message: impl Into<String>) -> Result<T> {
    let message = message.into();
    if cfg!(debug_assertions) {
        panic!("invariant violation: {message}");
    }
    error!("invariant violation (skipped): {message}");
    Err(Error::InvariantViolation(message))
}
