//! Render error taxonomy
//!
//! Every fallible operation in the render layer returns [`RenderResult`].
//! Errors are plain values; callers match on [`RenderError::kind`] to decide
//! whether to retry, discard the frame or tear everything down.

use ash::vk;
use thiserror::Error;

/// Error categories, independent of the message they carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Requested component, material or resource is not present
    NotFound,
    /// Pipeline or layout configuration is inconsistent
    BadConfig,
    /// The GPU device was lost; nothing can be recovered in the core
    DeviceLost,
    /// A descriptor or buffer allocator is exhausted
    AllocationFailed,
    /// Model vertex layout does not contain the material's layout
    LayoutMismatch,
    /// Operation called outside the state it requires
    WrongState,
    /// The frame loop was ended early
    Cancelled,
    /// Unclassified driver result
    Api,
}

/// Errors produced by the render layer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Requested component, material or resource is not present
    #[error("Not found: {0}")]
    NotFound(String),

    /// Pipeline or layout configuration is inconsistent
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// The GPU device was lost
    #[error("Device lost: {0}")]
    DeviceLost(String),

    /// Descriptor or buffer allocation failed
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    /// Model vertex layout does not contain the material's layout
    #[error("Vertex layout mismatch: {0}")]
    LayoutMismatch(String),

    /// Operation called in the wrong state
    #[error("Wrong state: {0}")]
    WrongState(String),

    /// The frame loop ended before its configured frame count
    #[error("Frame loop cancelled after {frames} frames")]
    Cancelled {
        /// Frames completed before the loop ended
        frames: u64,
    },

    /// Vulkan API error that fits no other category
    #[error("Vulkan API error during {context}: {result:?}")]
    Api {
        /// What was being attempted
        context: String,
        /// The raw result code
        result: vk::Result,
    },
}

/// Result type for rendering operations
pub type RenderResult<T> = Result<T, RenderError>;

impl RenderError {
    /// Classify a Vulkan result code
    pub fn from_vk(result: vk::Result, context: impl Into<String>) -> Self {
        let context = context.into();
        match result {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost(context),
            vk::Result::ERROR_OUT_OF_POOL_MEMORY
            | vk::Result::ERROR_FRAGMENTED_POOL
            | vk::Result::ERROR_OUT_OF_HOST_MEMORY
            | vk::Result::ERROR_OUT_OF_DEVICE_MEMORY => {
                Self::AllocationFailed(format!("{context}: {result:?}"))
            }
            _ => Self::Api { context, result },
        }
    }

    /// The category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::BadConfig(_) => ErrorKind::BadConfig,
            Self::DeviceLost(_) => ErrorKind::DeviceLost,
            Self::AllocationFailed(_) => ErrorKind::AllocationFailed,
            Self::LayoutMismatch(_) => ErrorKind::LayoutMismatch,
            Self::WrongState(_) => ErrorKind::WrongState,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Api { .. } => ErrorKind::Api,
        }
    }

    /// Device loss ends rendering; everything else only costs a frame
    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::DeviceLost
    }

    /// Whether growing a pool and trying again may help
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::AllocationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vk_results_are_classified() {
        assert_eq!(
            RenderError::from_vk(vk::Result::ERROR_DEVICE_LOST, "submit").kind(),
            ErrorKind::DeviceLost
        );
        assert_eq!(
            RenderError::from_vk(vk::Result::ERROR_OUT_OF_POOL_MEMORY, "alloc").kind(),
            ErrorKind::AllocationFailed
        );
        assert_eq!(
            RenderError::from_vk(vk::Result::ERROR_FRAGMENTED_POOL, "alloc").kind(),
            ErrorKind::AllocationFailed
        );
        assert_eq!(
            RenderError::from_vk(vk::Result::ERROR_INITIALIZATION_FAILED, "init").kind(),
            ErrorKind::Api
        );
    }

    #[test]
    fn test_fatal_and_retryable() {
        assert!(RenderError::DeviceLost(String::new()).is_fatal());
        assert!(!RenderError::LayoutMismatch(String::new()).is_fatal());
        assert!(RenderError::AllocationFailed(String::new()).is_retryable());
        assert!(!RenderError::WrongState(String::new()).is_retryable());
    }
}
