//! Error types for capture-session operations.
//!
//! The controller's lifecycle methods never return these directly: per the
//! capture contract, a failed operation is refused with state unchanged and
//! the error is surfaced through the status handler. Platform implementations
//! and internal helpers use them as ordinary `Result` errors.

use crate::permissions::Capability;
use crate::types::CameraPosition;

/// Errors that can occur while configuring or driving a capture session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// The user denied (or the system restricts) access to a capability.
    #[error("{0} permission denied")]
    PermissionDenied(Capability),

    /// No physical camera matches the requested position.
    #[error("no {0} camera available on this device")]
    DeviceUnavailable(CameraPosition),

    /// The attached camera has no torch. Absorbed as a no-op by the
    /// controller; platforms report it so callers can tell why nothing
    /// happened.
    #[error("torch not supported on the {0} camera")]
    TorchUnsupported(CameraPosition),

    /// The platform rejected a configuration request for its own reasons.
    #[error("capture platform error: {0}")]
    Platform(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_denied_display() {
        let err = SessionError::PermissionDenied(Capability::Camera);
        assert_eq!(err.to_string(), "camera permission denied");
        let err = SessionError::PermissionDenied(Capability::Microphone);
        assert_eq!(err.to_string(), "microphone permission denied");
    }

    #[test]
    fn test_device_unavailable_display() {
        let err = SessionError::DeviceUnavailable(CameraPosition::Front);
        assert_eq!(err.to_string(), "no front camera available on this device");
    }

    #[test]
    fn test_torch_unsupported_display() {
        let err = SessionError::TorchUnsupported(CameraPosition::Front);
        assert_eq!(err.to_string(), "torch not supported on the front camera");
    }

    #[test]
    fn test_platform_error_display() {
        let err = SessionError::Platform("input busy".to_string());
        assert_eq!(err.to_string(), "capture platform error: input busy");
    }
}
