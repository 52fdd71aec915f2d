//! camkit: camera session control for AR capture hosts.
//!
//! The crate sits between a host application and the device capture stack.
//! [`CameraController`] owns permissions, device selection, and the capture
//! lifecycle; the host implements [`FrameConsumer`] to receive frames and
//! [`platform::CapturePlatform`] to bind a real device layer (tests use the
//! bundled [`platform::simulated::SimulatedPlatform`]).

pub mod config;
pub mod consumer;
pub mod controller;
pub mod error;
pub mod permissions;
pub mod platform;
pub mod types;

pub use config::{CameraConfig, CaptureConfig, ConfigError};
pub use consumer::{FrameConsumer, FrameSink};
pub use controller::{CameraController, StatusEvent};
pub use error::SessionError;
pub use permissions::{Authorization, Capability};
pub use platform::{CameraDeviceInfo, CapturePlatform, CaptureSession};
pub use types::{
    AudioChunk, AudioSettings, CameraPosition, PixelFormat, ResolutionPreset, SessionState,
    VideoFrame, VideoOrientation,
};
