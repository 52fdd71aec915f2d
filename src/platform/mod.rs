//! The capture platform abstraction.
//!
//! Everything the controller needs from the device layer lives behind two
//! traits: [`CapturePlatform`] answers questions that exist before any
//! capture starts (permissions, which cameras exist), and [`CaptureSession`]
//! is one configured capture graph with attachable inputs. Production code
//! implements these over the OS capture API; tests and headless hosts use
//! [`simulated::SimulatedPlatform`].

pub mod simulated;

use futures_util::future::BoxFuture;

use crate::consumer::FrameSink;
use crate::error::SessionError;
use crate::permissions::{Authorization, Capability};
use crate::types::{AudioSettings, CameraPosition, ResolutionPreset, VideoOrientation};

/// A physical camera the platform can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDeviceInfo {
    /// Platform-unique identifier, stable across enumerations.
    pub id: String,
    /// Human-readable name for logs and pickers.
    pub name: String,
    /// Which side of the device the camera faces.
    pub position: CameraPosition,
    /// Whether the camera has a controllable torch.
    pub has_torch: bool,
}

/// Entry point into the device layer.
///
/// Implementations must be cheap to query; the controller calls these on
/// its own thread while holding its session lock.
pub trait CapturePlatform: Send + Sync {
    /// Current authorization for a capability, without prompting.
    fn authorization_status(&self, capability: Capability) -> Authorization;

    /// Ask the user for access to a capability.
    ///
    /// The returned future resolves once the user has answered the system
    /// prompt (or immediately, if the platform already knows the answer).
    fn request_access(&self, capability: Capability) -> BoxFuture<'static, Authorization>;

    /// All cameras currently attached, in platform order.
    fn cameras(&self) -> Vec<CameraDeviceInfo>;

    /// First camera facing `position`, if the device has one.
    fn camera_at(&self, position: CameraPosition) -> Option<CameraDeviceInfo> {
        self.cameras()
            .into_iter()
            .find(|device| device.position == position)
    }

    /// Build a new, empty capture session that delivers into `sink`.
    fn create_session(&self, sink: FrameSink) -> Box<dyn CaptureSession>;
}

/// One capture graph: at most one video input and one audio input.
///
/// Attach and detach are synchronous from the controller's point of view;
/// an implementation that configures hardware asynchronously must block
/// until the input is committed or failed. Dropping a session tears down
/// everything it still holds.
pub trait CaptureSession: Send {
    /// Open `device` at (or below) `preset` and start delivering frames.
    ///
    /// # Errors
    ///
    /// [`SessionError::DeviceUnavailable`] if the device disappeared, or
    /// [`SessionError::Platform`] for any other configuration failure. On
    /// error the session is left without a video input.
    fn attach_video_input(
        &mut self,
        device: &CameraDeviceInfo,
        preset: ResolutionPreset,
    ) -> Result<(), SessionError>;

    /// Remove the video input if one is attached. Idempotent.
    fn detach_video_input(&mut self);

    /// Open the default microphone and start delivering audio.
    ///
    /// # Errors
    ///
    /// [`SessionError::Platform`] if the input cannot be configured. On
    /// error the session is left without an audio input.
    fn attach_audio_input(&mut self, settings: AudioSettings) -> Result<(), SessionError>;

    /// Remove the audio input if one is attached. Idempotent.
    fn detach_audio_input(&mut self);

    /// Update the orientation hint on the video connection.
    fn set_orientation(&mut self, orientation: VideoOrientation);

    /// Switch the torch of the current video device.
    ///
    /// # Errors
    ///
    /// [`SessionError::TorchUnsupported`] if the attached camera has no
    /// torch, [`SessionError::Platform`] if no video input is attached or
    /// the hardware refuses.
    fn set_torch(&mut self, on: bool) -> Result<(), SessionError>;
}
